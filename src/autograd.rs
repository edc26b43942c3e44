use ndarray::Array2;

use crate::engine::Engine;
use crate::error::{GradError, Result};
use crate::graph::Graph;
use crate::graph_task::GraphTask;
use crate::tensor::{Element, TensorId};

impl<T: Element> Graph<T> {
    /// Backpropagates from a 1x1 node into every node it depends on.
    ///
    /// The root's gradient is set to ones; every other reachable gradient is
    /// accumulated into, not overwritten. Nodes run in reverse topological
    /// order, so each node's gradient holds the contributions of all its
    /// consumers before its own rule runs.
    pub fn backward(&mut self, root: TensorId) -> Result<()> {
        let shape = self.node(root)?.shape();
        if shape != (1, 1) {
            return Err(GradError::NonScalarBackward { shape });
        }

        let task = GraphTask::new(&self.nodes, root.index);
        log::debug!("backward from {} over {} nodes", root, task.order.len());

        self.nodes[root.index].grad = Array2::ones(shape);
        for &index in task.order.iter().rev() {
            log::trace!("evaluating {} ({})", index, self.nodes[index].op.tag());
            let contributions = Engine::evaluate_function(&self.nodes, index)?;
            for (input, grad) in contributions {
                self.nodes[input].grad += &grad;
            }
        }

        log::debug!("backward from {} finished", root);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use ndarray::arr2;

    #[test]
    fn test_backward_requires_scalar() {
        let mut graph = Graph::<f32>::new();
        let a = graph.tensor(vec![1.0, 2.0]).unwrap();
        let err = graph.backward(a).unwrap_err();
        assert!(matches!(err, GradError::NonScalarBackward { shape: (1, 2) }));
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert!(err
            .to_string()
            .starts_with("backward() can only be called on a scalar tensor"));

        let s = graph.sum(a).unwrap();
        graph.backward(s).unwrap();
        assert_eq!(graph.grad(a).unwrap(), &arr2(&[[1.0, 1.0]]));
    }

    #[test]
    fn test_backward_on_leaf_sets_ones() {
        let mut graph = Graph::<f32>::new();
        let a = graph.tensor(3.0).unwrap();
        graph.backward(a).unwrap();
        assert_eq!(graph.grad(a).unwrap(), &arr2(&[[1.0]]));
    }

    #[test]
    fn test_self_multiply_accumulates_both_sides() {
        let mut graph = Graph::<f64>::new();
        let a = graph.tensor(3.0).unwrap();
        let b = graph.mul(a, a).unwrap();
        graph.backward(b).unwrap();
        assert_eq!(graph.grad(a).unwrap(), &arr2(&[[6.0]]));
    }

    #[test]
    fn test_exp_accumulates() {
        let mut graph = Graph::<f64>::new();
        let a = graph.tensor(0.5).unwrap();
        let e = graph.exp(a).unwrap();
        let out = graph.add(e, a).unwrap();
        graph.backward(out).unwrap();
        // d/da (exp(a) + a) = exp(a) + 1
        let expected = 0.5f64.exp() + 1.0;
        assert!((graph.grad(a).unwrap()[[0, 0]] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_repeated_backward_accumulates_until_zeroed() {
        let mut graph = Graph::<f64>::new();
        let a = graph.tensor(2.0).unwrap();
        let b = graph.mul_scalar(a, 5.0).unwrap();

        graph.backward(b).unwrap();
        graph.backward(b).unwrap();
        assert_eq!(graph.grad(a).unwrap(), &arr2(&[[10.0]]));
        // the root itself is reset to ones each pass
        assert_eq!(graph.grad(b).unwrap(), &arr2(&[[1.0]]));

        graph.zero_grads();
        graph.backward(b).unwrap();
        assert_eq!(graph.grad(a).unwrap(), &arr2(&[[5.0]]));
    }

    #[test]
    fn test_backward_leaves_data_untouched() {
        let mut graph = Graph::<f32>::new();
        let a = graph.tensor([[1.0, -2.0]]).unwrap();
        let r = graph.relu(a).unwrap();
        let s = graph.sum(r).unwrap();
        let before = graph.data(a).unwrap().clone();
        graph.backward(s).unwrap();
        assert_eq!(graph.data(a).unwrap(), &before);
    }
}
