//! Broadcasting for elementwise operands and the matching gradient reduction.

use ndarray::{Array2, Axis, Zip};

use crate::error::{GradError, Result};
use crate::tensor::{Element, Shape};

/// Shape two operands broadcast to, following the usual rules per axis:
/// equal extents, or one of them is 1.
pub(crate) fn broadcast_shape(op: &'static str, lhs: Shape, rhs: Shape) -> Result<Shape> {
    let axis = |a: usize, b: usize| match (a, b) {
        (a, b) if a == b => Some(a),
        (1, b) => Some(b),
        (a, 1) => Some(a),
        _ => None,
    };
    match (axis(lhs.0, rhs.0), axis(lhs.1, rhs.1)) {
        (Some(rows), Some(cols)) => Ok((rows, cols)),
        _ => Err(GradError::Broadcast { op, lhs, rhs }),
    }
}

/// Applies `f` elementwise after broadcasting both operands to a common shape.
pub(crate) fn zip_broadcast<T, F>(
    op: &'static str,
    lhs: &Array2<T>,
    rhs: &Array2<T>,
    f: F,
) -> Result<Array2<T>>
where
    T: Element,
    F: Fn(T, T) -> T,
{
    let shape = broadcast_shape(op, lhs.dim(), rhs.dim())?;
    let mismatch = || GradError::Broadcast {
        op,
        lhs: lhs.dim(),
        rhs: rhs.dim(),
    };
    let lhs = lhs.broadcast(shape).ok_or_else(mismatch)?;
    let rhs = rhs.broadcast(shape).ok_or_else(mismatch)?;
    Ok(Zip::from(&lhs).and(&rhs).map_collect(|&a, &b| f(a, b)))
}

/// Sums a gradient back down to the shape of an operand that was broadcast
/// up to it. Axes where the operand has extent 1 are collapsed.
pub(crate) fn reduce_to<T: Element>(grad: Array2<T>, shape: Shape) -> Array2<T> {
    let mut grad = grad;
    if shape.0 == 1 && grad.nrows() != 1 {
        grad = grad.sum_axis(Axis(0)).insert_axis(Axis(0));
    }
    if shape.1 == 1 && grad.ncols() != 1 {
        grad = grad.sum_axis(Axis(1)).insert_axis(Axis(1));
    }
    debug_assert_eq!(grad.dim(), shape);
    grad
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_broadcast_shape_rules() {
        assert_eq!(broadcast_shape("+", (3, 3), (1, 1)).unwrap(), (3, 3));
        assert_eq!(broadcast_shape("+", (1, 4), (3, 1)).unwrap(), (3, 4));
        assert_eq!(broadcast_shape("*", (2, 3), (2, 3)).unwrap(), (2, 3));

        let err = broadcast_shape("*", (2, 3), (3, 2)).unwrap_err();
        assert!(matches!(
            err,
            GradError::Broadcast {
                op: "*",
                lhs: (2, 3),
                rhs: (3, 2)
            }
        ));
    }

    #[test]
    fn test_zip_broadcast_row_against_matrix() {
        let a = arr2(&[[1.0f64, 2.0], [3.0, 4.0]]);
        let b = arr2(&[[10.0f64, 20.0]]);
        let sum = zip_broadcast("+", &a, &b, |x, y| x + y).unwrap();
        assert_eq!(sum, arr2(&[[11.0, 22.0], [13.0, 24.0]]));
    }

    #[test]
    fn test_reduce_to_sums_broadcast_axes() {
        let grad = arr2(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(reduce_to(grad.clone(), (1, 1)), arr2(&[[21.0]]));
        assert_eq!(reduce_to(grad.clone(), (1, 3)), arr2(&[[5.0, 7.0, 9.0]]));
        assert_eq!(reduce_to(grad.clone(), (2, 1)), arr2(&[[6.0], [15.0]]));
        assert_eq!(reduce_to(grad.clone(), (2, 3)), grad);
    }
}
