//! Per-operation gradient rules.

use ndarray::Array2;

use crate::broadcast::{reduce_to, zip_broadcast};
use crate::error::Result;
use crate::operation::{cast, raise, zip_with, Op};
use crate::tensor::{Element, Node};

/// Gradient contribution for one operand: arena index and the array to add
/// into that operand's accumulator.
pub(crate) type Contribution<T> = (usize, Array2<T>);

pub(crate) struct Engine;

impl Engine {
    /// Computes what the node at `index` pushes into each of its operands,
    /// given its own fully accumulated gradient. Nothing is written here; the
    /// caller adds the contributions so an operand appearing twice receives
    /// both.
    pub(crate) fn evaluate_function<T: Element>(
        nodes: &[Node<T>],
        index: usize,
    ) -> Result<Vec<Contribution<T>>> {
        let node = &nodes[index];
        let grad = &node.grad;

        let contributions = match node.op {
            Op::Leaf => Vec::new(),
            Op::Add { lhs, rhs } => {
                let (a, b) = (&nodes[lhs.index], &nodes[rhs.index]);
                vec![
                    (lhs.index, reduce_to(grad.clone(), a.shape())),
                    (rhs.index, reduce_to(grad.clone(), b.shape())),
                ]
            }
            Op::Mul { lhs, rhs } => {
                let (a, b) = (&nodes[lhs.index], &nodes[rhs.index]);
                let grad_a = zip_broadcast("*", grad, &b.data, |g, y| g * y)?;
                let grad_b = zip_broadcast("*", grad, &a.data, |g, x| g * x)?;
                vec![
                    (lhs.index, reduce_to(grad_a, a.shape())),
                    (rhs.index, reduce_to(grad_b, b.shape())),
                ]
            }
            Op::Pow { input, exponent } => {
                let k: T = cast(exponent)?;
                let k_minus_one: T = cast(exponent - 1.0)?;
                let local = nodes[input.index]
                    .data
                    .mapv(|x| k * raise(x, exponent - 1.0, k_minus_one));
                vec![(input.index, zip_with(&local, grad, |d, g| d * g))]
            }
            // out.data already holds exp(input)
            Op::Exp { input } => vec![(input.index, zip_with(&node.data, grad, |e, g| e * g))],
            Op::Dot { lhs, rhs } => {
                let (a, b) = (&nodes[lhs.index].data, &nodes[rhs.index].data);
                vec![
                    (lhs.index, grad.dot(&b.t())),
                    (rhs.index, a.t().dot(grad)),
                ]
            }
            Op::Transpose { input } => vec![(input.index, grad.t().to_owned())],
            Op::Relu { input } => {
                let zero = T::zero();
                let masked = zip_with(&node.data, grad, |o, g| if o > zero { g } else { zero });
                vec![(input.index, masked)]
            }
            Op::Sum { input } => {
                let shape = nodes[input.index].shape();
                vec![(input.index, Array2::from_elem(shape, grad[[0, 0]]))]
            }
        };

        Ok(contributions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use ndarray::arr2;

    fn seeded(graph: &mut Graph<f64>, index: usize, grad: Array2<f64>) {
        graph.nodes[index].grad = grad;
    }

    #[test]
    fn test_mul_rule_reduces_broadcast_operand() {
        let mut graph = Graph::<f64>::new();
        let a = graph.tensor([[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let s = graph.constant(3.0);
        let c = graph.mul(a, s).unwrap();
        seeded(&mut graph, c.index(), arr2(&[[1.0, 1.0], [1.0, 1.0]]));

        let out = Engine::evaluate_function(&graph.nodes, c.index()).unwrap();
        assert_eq!(out[0], (a.index(), arr2(&[[3.0, 3.0], [3.0, 3.0]])));
        assert_eq!(out[1], (s.index(), arr2(&[[10.0]])));
    }

    #[test]
    fn test_pow_rule() {
        let mut graph = Graph::<f64>::new();
        let a = graph.tensor(vec![2.0, -3.0]).unwrap();
        let p = graph.pow(a, 3.0).unwrap();
        seeded(&mut graph, p.index(), arr2(&[[1.0, 2.0]]));

        let out = Engine::evaluate_function(&graph.nodes, p.index()).unwrap();
        // 3 * x^2 * g
        assert_eq!(out, vec![(a.index(), arr2(&[[12.0, 54.0]]))]);
    }

    #[test]
    fn test_dot_rule_shapes() {
        let mut graph = Graph::<f64>::new();
        let a = graph.tensor(Array2::<f64>::ones((2, 3))).unwrap();
        let b = graph.tensor(Array2::<f64>::ones((3, 4))).unwrap();
        let c = graph.dot(a, b).unwrap();
        seeded(&mut graph, c.index(), Array2::ones((2, 4)));

        let out = Engine::evaluate_function(&graph.nodes, c.index()).unwrap();
        assert_eq!(out[0].1, Array2::from_elem((2, 3), 4.0));
        assert_eq!(out[1].1, Array2::from_elem((3, 4), 2.0));
    }

    #[test]
    fn test_relu_rule_masks_zero() {
        let mut graph = Graph::<f64>::new();
        let a = graph.tensor([[-1.0, 0.0, 2.0]]).unwrap();
        let r = graph.relu(a).unwrap();
        seeded(&mut graph, r.index(), arr2(&[[5.0, 5.0, 5.0]]));

        let out = Engine::evaluate_function(&graph.nodes, r.index()).unwrap();
        assert_eq!(out, vec![(a.index(), arr2(&[[0.0, 0.0, 5.0]]))]);
    }

    #[test]
    fn test_leaf_contributes_nothing() {
        let mut graph = Graph::<f64>::new();
        let a = graph.tensor(1.0).unwrap();
        let out = Engine::evaluate_function(&graph.nodes, a.index()).unwrap();
        assert!(out.is_empty());
    }
}
