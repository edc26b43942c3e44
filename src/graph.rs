//! Arena that owns every node of an expression graph.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::Array2;

use crate::error::{GradError, Result};
use crate::operation::Op;
use crate::tensor::{Data, Element, Node, Shape, TensorId};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(0);

/// Expression graph built eagerly from primitive operations.
///
/// Nodes are appended in creation order and never removed, so every node's
/// inputs have smaller indices than the node itself. Forward values are
/// computed as soon as an operation is applied; gradients are filled in by
/// [`Graph::backward`].
///
/// Gradients accumulate across passes. Call [`Graph::zero_grads`] between
/// independent passes over overlapping subgraphs.
pub struct Graph<T = f32> {
    id: u64,
    pub(crate) nodes: Vec<Node<T>>,
}

impl<T: Element> Graph<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Graph {
            id: NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Creates a leaf from raw data, lifting it to two dimensions.
    pub fn tensor(&mut self, data: impl Into<Data<T>>) -> Result<TensorId> {
        let data = data.into().lift()?;
        Ok(self.push(data, Op::Leaf))
    }

    /// Creates a 1x1 leaf.
    pub fn constant(&mut self, value: T) -> TensorId {
        self.push(Array2::from_elem((1, 1), value), Op::Leaf)
    }

    pub(crate) fn push(&mut self, data: Array2<T>, op: Op) -> TensorId {
        let id = TensorId {
            graph: self.id,
            index: self.nodes.len(),
        };
        log::trace!("{} = {} {:?}", id, op.tag(), data.dim());
        self.nodes.push(Node::new(data, op));
        id
    }

    pub(crate) fn node(&self, id: TensorId) -> Result<&Node<T>> {
        if id.graph != self.id {
            return Err(GradError::UnknownTensor(id));
        }
        self.nodes.get(id.index).ok_or(GradError::UnknownTensor(id))
    }

    pub(crate) fn node_mut(&mut self, id: TensorId) -> Result<&mut Node<T>> {
        if id.graph != self.id {
            return Err(GradError::UnknownTensor(id));
        }
        self.nodes
            .get_mut(id.index)
            .ok_or(GradError::UnknownTensor(id))
    }

    pub(crate) fn id_at(&self, index: usize) -> TensorId {
        TensorId {
            graph: self.id,
            index,
        }
    }

    /// Read-only view of a node.
    pub fn get(&self, id: TensorId) -> Result<TensorRef<'_, T>> {
        let node = self.node(id)?;
        Ok(TensorRef { id, node })
    }

    pub fn data(&self, id: TensorId) -> Result<&Array2<T>> {
        Ok(&self.node(id)?.data)
    }

    pub fn grad(&self, id: TensorId) -> Result<&Array2<T>> {
        Ok(&self.node(id)?.grad)
    }

    pub fn shape(&self, id: TensorId) -> Result<Shape> {
        Ok(self.node(id)?.shape())
    }

    /// Value of a 1x1 node.
    pub fn item(&self, id: TensorId) -> Result<T> {
        let node = self.node(id)?;
        match node.shape() {
            (1, 1) => Ok(node.data[[0, 0]]),
            shape => Err(GradError::NotScalar { shape }),
        }
    }

    /// Resets one node's gradient to zeros.
    pub fn zero_grad(&mut self, id: TensorId) -> Result<()> {
        self.node_mut(id)?.grad.fill(T::zero());
        Ok(())
    }

    /// Resets every gradient in the graph to zeros.
    pub fn zero_grads(&mut self) {
        for node in &mut self.nodes {
            node.grad.fill(T::zero());
        }
    }

    /// Handles of all nodes, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = TensorId> + '_ {
        (0..self.nodes.len()).map(move |index| self.id_at(index))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<T: Element> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Graph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

/// Borrowed view of a single node.
#[derive(Clone, Copy)]
pub struct TensorRef<'a, T> {
    id: TensorId,
    node: &'a Node<T>,
}

impl<'a, T: Element> TensorRef<'a, T> {
    pub fn id(&self) -> TensorId {
        self.id
    }

    pub fn data(&self) -> &'a Array2<T> {
        &self.node.data
    }

    pub fn grad(&self) -> &'a Array2<T> {
        &self.node.grad
    }

    pub fn shape(&self) -> Shape {
        self.node.shape()
    }

    pub fn op(&self) -> &'a Op {
        &self.node.op
    }

    /// Label of the producing operation, empty for leaves.
    pub fn op_tag(&self) -> String {
        self.node.op.tag()
    }

    /// Distinct nodes this one was computed from.
    pub fn inputs(&self) -> Vec<TensorId> {
        let mut inputs = self.node.op.inputs();
        inputs.dedup();
        inputs
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.node.op, Op::Leaf)
    }
}

impl<T: Element> fmt::Display for TensorRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Tensor(shape={:?}, grad={}, _op={},",
            self.shape(),
            self.node.grad,
            self.op_tag()
        )?;
        writeln!(f, "{}", self.node.data)?;
        write!(f, ")")
    }
}
