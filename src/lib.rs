//! Reverse-mode automatic differentiation over 2-D `ndarray` matrices.
//!
//! A [`Graph`] owns every node of an expression. Operations are evaluated
//! eagerly and return a [`TensorId`] handle; [`Graph::backward`] then fills
//! the gradient of a 1x1 output into every node it depends on.
//!
//! ```rust
//! use matgrad_rs::Graph;
//!
//! # fn main() -> matgrad_rs::Result<()> {
//! let mut graph = Graph::<f64>::new();
//! let w = graph.tensor([[1.0, 2.0], [3.0, 4.0]])?;
//! let x = graph.tensor([[1.0], [-1.0]])?;
//! let y = graph.dot(w, x)?;
//! let h = graph.relu(y)?;
//! let loss = graph.sum(h)?;
//!
//! graph.backward(loss)?;
//! assert_eq!(graph.shape(w)?, graph.grad(w)?.dim());
//! # Ok(())
//! # }
//! ```

mod autograd;
mod broadcast;
mod engine;
pub mod error;
pub mod gradcheck;
mod graph;
mod graph_task;
mod init;
mod operation;
mod tensor;

pub use error::{ErrorKind, GradError, Result};
pub use graph::{Graph, TensorRef};
pub use init::UniformInit;
pub use operation::Op;
pub use tensor::{Data, Element, Shape, TensorId};
