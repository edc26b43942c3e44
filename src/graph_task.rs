//! Ordering of the nodes reachable from a backward root.

use crate::error::Result;
use crate::graph::Graph;
use crate::tensor::{Element, Node, TensorId};

/// Nodes reachable from a root, ordered so that every node comes after all
/// of its inputs. The root is last.
pub(crate) struct GraphTask {
    pub(crate) order: Vec<usize>,
}

impl GraphTask {
    /// Depth-first post-order from `root`.
    ///
    /// Uses an explicit stack instead of recursion; a frame is revisited once
    /// its inputs are done and only then emitted. Nodes are tracked by arena
    /// index, so a node shared by several consumers is emitted once.
    pub(crate) fn new<T>(nodes: &[Node<T>], root: usize) -> Self {
        let mut seen = vec![false; nodes.len()];
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];

        while let Some((index, expanded)) = stack.pop() {
            if expanded {
                order.push(index);
                continue;
            }
            if seen[index] {
                continue;
            }
            seen[index] = true;
            stack.push((index, true));

            // reversed so the first operand is explored first
            for input in nodes[index].op.inputs().into_iter().rev() {
                if !seen[input.index] {
                    stack.push((input.index, false));
                }
            }
        }

        log::trace!("graph task from node {}: {} nodes", root, order.len());
        GraphTask { order }
    }
}

impl<T: Element> Graph<T> {
    /// Every node reachable from `root`, inputs before the nodes that use
    /// them, `root` last. A leaf yields just itself.
    pub fn topological_order(&self, root: TensorId) -> Result<Vec<TensorId>> {
        self.node(root)?;
        let task = GraphTask::new(&self.nodes, root.index);
        Ok(task.order.into_iter().map(|index| self.id_at(index)).collect())
    }
}
