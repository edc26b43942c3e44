use std::fmt;
use std::ops::AddAssign;

use ndarray::{Array1, Array2, ArrayD, Axis, Ix0, Ix1, Ix2, LinalgScalar, ScalarOperand};
use num_traits::Float;
use rand::distributions::uniform::SampleUniform;

use crate::error::{GradError, Result};
use crate::operation::Op;

/// `(rows, cols)` of a node.
pub type Shape = (usize, usize);

/// Scalar types a graph can hold.
pub trait Element:
    Float
    + LinalgScalar
    + ScalarOperand
    + AddAssign
    + SampleUniform
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
{
}

impl<T> Element for T where
    T: Float
        + LinalgScalar
        + ScalarOperand
        + AddAssign
        + SampleUniform
        + fmt::Debug
        + fmt::Display
        + Send
        + Sync
        + 'static
{
}

/// Handle to a node stored in a [`Graph`](crate::Graph).
///
/// Handles are cheap to copy and only valid for the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId {
    pub(crate) graph: u64,
    pub(crate) index: usize,
}

impl TensorId {
    /// Position of the node in its graph's arena, in creation order.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({}@graph{})", self.index, self.graph)
    }
}

/// Raw input accepted when creating a leaf.
///
/// Everything is lifted to a matrix: a scalar becomes 1x1, a row of
/// length n becomes 1xn, and anything with more than two axes is rejected.
#[derive(Debug, Clone)]
pub enum Data<T> {
    Scalar(T),
    Row(Vec<T>),
    Matrix(Vec<Vec<T>>),
    Array(ArrayD<T>),
}

impl<T: Element> Data<T> {
    pub fn lift(self) -> Result<Array2<T>> {
        let array = match self {
            Data::Scalar(value) => Array2::from_elem((1, 1), value),
            Data::Row(values) => Array1::from(values).insert_axis(Axis(0)),
            Data::Matrix(rows) => {
                let expected = rows.first().map_or(0, Vec::len);
                if let Some((row, values)) = rows
                    .iter()
                    .enumerate()
                    .find(|(_, values)| values.len() != expected)
                {
                    return Err(GradError::RaggedRows {
                        row,
                        expected,
                        actual: values.len(),
                    });
                }
                let nrows = rows.len();
                let flat: Vec<T> = rows.into_iter().flatten().collect();
                Array2::from_shape_vec((nrows, expected), flat).map_err(|_| {
                    GradError::NotTwoDimensional {
                        shape: vec![nrows, expected],
                    }
                })?
            }
            Data::Array(array) => lift_array(array)?,
        };

        let shape = array.dim();
        if shape.0 == 0 || shape.1 == 0 {
            return Err(GradError::EmptyDimension { shape });
        }
        Ok(array)
    }
}

fn lift_array<T: Element>(array: ArrayD<T>) -> Result<Array2<T>> {
    let shape = array.shape().to_vec();
    let not_2d = |_: ndarray::ShapeError| GradError::NotTwoDimensional {
        shape: shape.clone(),
    };
    match array.ndim() {
        0 => {
            let value = array.into_dimensionality::<Ix0>().map_err(not_2d)?;
            Ok(Array2::from_elem((1, 1), value.into_scalar()))
        }
        1 => Ok(array
            .into_dimensionality::<Ix1>()
            .map_err(not_2d)?
            .insert_axis(Axis(0))),
        2 => array.into_dimensionality::<Ix2>().map_err(not_2d),
        _ => Err(GradError::NotTwoDimensional { shape }),
    }
}

macro_rules! impl_data_from {
    ($($t:ty),*) => {$(
        impl From<$t> for Data<$t> {
            fn from(value: $t) -> Self {
                Data::Scalar(value)
            }
        }

        impl From<Vec<$t>> for Data<$t> {
            fn from(values: Vec<$t>) -> Self {
                Data::Row(values)
            }
        }

        impl From<&[$t]> for Data<$t> {
            fn from(values: &[$t]) -> Self {
                Data::Row(values.to_vec())
            }
        }

        impl<const N: usize> From<[$t; N]> for Data<$t> {
            fn from(values: [$t; N]) -> Self {
                Data::Row(values.to_vec())
            }
        }

        impl From<Vec<Vec<$t>>> for Data<$t> {
            fn from(rows: Vec<Vec<$t>>) -> Self {
                Data::Matrix(rows)
            }
        }

        impl<const R: usize, const C: usize> From<[[$t; C]; R]> for Data<$t> {
            fn from(rows: [[$t; C]; R]) -> Self {
                Data::Matrix(rows.iter().map(|row| row.to_vec()).collect())
            }
        }
    )*};
}

impl_data_from!(f32, f64);

impl<T> From<Array1<T>> for Data<T> {
    fn from(array: Array1<T>) -> Self {
        Data::Array(array.into_dyn())
    }
}

impl<T> From<Array2<T>> for Data<T> {
    fn from(array: Array2<T>) -> Self {
        Data::Array(array.into_dyn())
    }
}

impl<T> From<ArrayD<T>> for Data<T> {
    fn from(array: ArrayD<T>) -> Self {
        Data::Array(array)
    }
}

/// Arena slot: forward value, gradient accumulator and the rule that produced it.
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    pub(crate) data: Array2<T>,
    pub(crate) grad: Array2<T>,
    pub(crate) op: Op,
}

impl<T: Element> Node<T> {
    pub(crate) fn new(data: Array2<T>, op: Op) -> Self {
        let grad = Array2::zeros(data.raw_dim());
        Node { data, grad, op }
    }

    pub(crate) fn shape(&self) -> Shape {
        self.data.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array3, IxDyn};

    #[test]
    fn test_scalar_lifts_to_1x1() {
        let array = Data::from(3.5f32).lift().unwrap();
        assert_eq!(array.dim(), (1, 1));
        assert_eq!(array[[0, 0]], 3.5);
    }

    #[test]
    fn test_row_lifts_to_1xn() {
        let array = Data::from(vec![1.0f64, 2.0, 3.0]).lift().unwrap();
        assert_eq!(array, arr2(&[[1.0, 2.0, 3.0]]));
    }

    #[test]
    fn test_matrix_kept() {
        let array = Data::from([[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]])
            .lift()
            .unwrap();
        assert_eq!(array.dim(), (3, 2));
        assert_eq!(array[[2, 1]], 6.0);
    }

    #[test]
    fn test_zero_dim_array_lifts() {
        let array = Data::from(ArrayD::from_elem(IxDyn(&[]), 7.0f64))
            .lift()
            .unwrap();
        assert_eq!(array, arr2(&[[7.0]]));
    }

    #[test]
    fn test_three_dims_rejected() {
        let err = Data::from(Array3::<f32>::zeros((2, 2, 2)).into_dyn())
            .lift()
            .unwrap_err();
        assert!(matches!(err, GradError::NotTwoDimensional { ref shape } if shape == &[2, 2, 2]));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Data::from(vec![vec![1.0f32, 2.0], vec![3.0]])
            .lift()
            .unwrap_err();
        assert!(matches!(
            err,
            GradError::RaggedRows {
                row: 1,
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_empty_rejected() {
        let err = Data::<f32>::Row(Vec::new()).lift().unwrap_err();
        assert!(matches!(err, GradError::EmptyDimension { shape: (1, 0) }));
    }

    #[test]
    fn test_node_grad_starts_zeroed() {
        let node = Node::new(arr2(&[[1.0f32, -1.0]]), Op::Leaf);
        assert_eq!(node.shape(), (1, 2));
        assert!(node.grad.iter().all(|g| *g == 0.0));
    }
}
