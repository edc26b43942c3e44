//! Error types for graph construction, operations and the backward pass.

use thiserror::Error;

use crate::tensor::{Shape, TensorId};

/// Broad classification of a [`GradError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Data or operands with the wrong shape.
    Shape,
    /// Values that are not a usable numeric constant or array.
    Type,
    /// Operation that deliberately has no implementation.
    NotImplemented,
    /// Bad handle or argument outside the accepted range.
    InvalidArgument,
}

/// Errors raised by graph construction and operations.
#[derive(Debug, Error)]
pub enum GradError {
    /// Input data does not reduce to exactly two dimensions.
    #[error("shape doesn't seem to be 2D, got {shape:?}")]
    NotTwoDimensional { shape: Vec<usize> },

    /// A dimension of zero length.
    #[error("tensor dimensions must be at least 1, got {shape:?}")]
    EmptyDimension { shape: Shape },

    /// `backward()` on something that is not 1x1.
    #[error("backward() can only be called on a scalar tensor, got shape: {shape:?}")]
    NonScalarBackward { shape: Shape },

    /// Value read as a scalar that is not 1x1.
    #[error("expected a 1x1 tensor, got shape: {shape:?}")]
    NotScalar { shape: Shape },

    /// Elementwise operands that cannot be broadcast together.
    #[error("operands for `{op}` could not be broadcast together with shapes {lhs:?} and {rhs:?}")]
    Broadcast {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// Matrix product with mismatched inner dimensions.
    #[error("matmul inner dimensions do not match: {lhs:?} x {rhs:?}")]
    MatmulMismatch { lhs: Shape, rhs: Shape },

    /// Nested rows of differing lengths.
    #[error("row {row} has length {actual}, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Exponent that is not a finite constant of the element type.
    #[error("power implemented only for finite float and int exponents, got {exponent}")]
    InvalidExponent { exponent: f64 },

    /// Value that cannot be represented in the element type.
    #[error("value {value} is not representable in the tensor element type")]
    NotRepresentable { value: f64 },

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// Empty or non-finite sampling range.
    #[error("invalid uniform range [{low}, {high})")]
    InvalidRange { low: f64, high: f64 },

    /// Handle that does not refer to a node of this graph.
    #[error("{0} does not belong to this graph")]
    UnknownTensor(TensorId),
}

impl GradError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GradError::NotTwoDimensional { .. }
            | GradError::EmptyDimension { .. }
            | GradError::NonScalarBackward { .. }
            | GradError::NotScalar { .. }
            | GradError::Broadcast { .. }
            | GradError::MatmulMismatch { .. } => ErrorKind::Shape,
            GradError::RaggedRows { .. }
            | GradError::InvalidExponent { .. }
            | GradError::NotRepresentable { .. } => ErrorKind::Type,
            GradError::NotImplemented(_) => ErrorKind::NotImplemented,
            GradError::InvalidRange { .. } | GradError::UnknownTensor(_) => {
                ErrorKind::InvalidArgument
            }
        }
    }
}

pub type Result<T, E = GradError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = GradError::NonScalarBackward { shape: (1, 2) };
        assert_eq!(err.kind(), ErrorKind::Shape);
        assert!(err.to_string().contains("(1, 2)"));

        let err = GradError::InvalidExponent { exponent: f64::NAN };
        assert_eq!(err.kind(), ErrorKind::Type);

        assert_eq!(
            GradError::NotImplemented("softmax").kind(),
            ErrorKind::NotImplemented
        );
    }
}
