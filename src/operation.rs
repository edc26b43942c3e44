use ndarray::{Array2, Zip};

use crate::broadcast::zip_broadcast;
use crate::error::{GradError, Result};
use crate::graph::Graph;
use crate::tensor::{Element, TensorId};

/// Primitive operation that produced a node, with the handles of its operands.
///
/// The engine dispatches on this to compute each node's gradient contribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    /// Constructed directly from data.
    Leaf,
    /// Elementwise sum with broadcasting.
    Add { lhs: TensorId, rhs: TensorId },
    /// Elementwise product with broadcasting.
    Mul { lhs: TensorId, rhs: TensorId },
    /// Elementwise power by a constant exponent.
    Pow { input: TensorId, exponent: f64 },
    Exp { input: TensorId },
    /// Matrix product.
    Dot { lhs: TensorId, rhs: TensorId },
    Transpose { input: TensorId },
    Relu { input: TensorId },
    /// Sum of all elements into a 1x1 node.
    Sum { input: TensorId },
}

impl Op {
    /// Operands in argument order. The same handle may appear twice.
    pub fn inputs(&self) -> Vec<TensorId> {
        match *self {
            Op::Leaf => Vec::new(),
            Op::Add { lhs, rhs } | Op::Mul { lhs, rhs } | Op::Dot { lhs, rhs } => vec![lhs, rhs],
            Op::Pow { input, .. }
            | Op::Exp { input }
            | Op::Transpose { input }
            | Op::Relu { input }
            | Op::Sum { input } => vec![input],
        }
    }

    pub fn tag(&self) -> String {
        match self {
            Op::Leaf => String::new(),
            Op::Add { .. } => "+".to_string(),
            Op::Mul { .. } => "*".to_string(),
            Op::Pow { exponent, .. } => format!("**{}", exponent),
            Op::Exp { .. } => "exp".to_string(),
            Op::Dot { .. } => "matmul".to_string(),
            Op::Transpose { .. } => "T".to_string(),
            Op::Relu { .. } => "ReLU".to_string(),
            Op::Sum { .. } => "sum".to_string(),
        }
    }
}

/// Converts a constant into the element type. Values that overflow to
/// infinity in `T` are rejected.
pub(crate) fn cast<T: Element>(value: f64) -> Result<T> {
    T::from(value)
        .filter(|v| v.is_finite())
        .ok_or(GradError::NotRepresentable { value })
}

/// Validates a power exponent, returning it in the element type.
pub(crate) fn check_exponent<T: Element>(exponent: f64) -> Result<T> {
    cast(exponent).map_err(|_| GradError::InvalidExponent { exponent })
}

/// `value ** exponent`, exact for integral exponents.
pub(crate) fn raise<T: Element>(value: T, exponent: f64, k: T) -> T {
    if exponent.fract() == 0.0 && exponent.abs() <= i32::MAX as f64 {
        value.powi(exponent as i32)
    } else {
        value.powf(k)
    }
}

impl<T: Element> Graph<T> {
    pub fn add(&mut self, lhs: TensorId, rhs: TensorId) -> Result<TensorId> {
        let data = zip_broadcast(
            "+",
            &self.node(lhs)?.data,
            &self.node(rhs)?.data,
            |a, b| a + b,
        )?;
        Ok(self.push(data, Op::Add { lhs, rhs }))
    }

    pub fn mul(&mut self, lhs: TensorId, rhs: TensorId) -> Result<TensorId> {
        let data = zip_broadcast(
            "*",
            &self.node(lhs)?.data,
            &self.node(rhs)?.data,
            |a, b| a * b,
        )?;
        Ok(self.push(data, Op::Mul { lhs, rhs }))
    }

    /// Elementwise `input ** exponent`.
    ///
    /// Fails with a type error when the exponent is NaN, infinite, or not
    /// representable in the element type.
    pub fn pow(&mut self, input: TensorId, exponent: f64) -> Result<TensorId> {
        let k = check_exponent::<T>(exponent)?;
        let data = self
            .node(input)?
            .data
            .mapv(|value| raise(value, exponent, k));
        Ok(self.push(data, Op::Pow { input, exponent }))
    }

    pub fn exp(&mut self, input: TensorId) -> Result<TensorId> {
        let data = self.node(input)?.data.mapv(T::exp);
        Ok(self.push(data, Op::Exp { input }))
    }

    /// Matrix product; `lhs` columns must equal `rhs` rows.
    pub fn dot(&mut self, lhs: TensorId, rhs: TensorId) -> Result<TensorId> {
        let a = &self.node(lhs)?.data;
        let b = &self.node(rhs)?.data;
        if a.ncols() != b.nrows() {
            return Err(GradError::MatmulMismatch {
                lhs: a.dim(),
                rhs: b.dim(),
            });
        }
        let data = a.dot(b);
        Ok(self.push(data, Op::Dot { lhs, rhs }))
    }

    pub fn transpose(&mut self, input: TensorId) -> Result<TensorId> {
        let data = self.node(input)?.data.t().to_owned();
        Ok(self.push(data, Op::Transpose { input }))
    }

    pub fn relu(&mut self, input: TensorId) -> Result<TensorId> {
        let data = self
            .node(input)?
            .data
            .mapv(|value| if value > T::zero() { value } else { T::zero() });
        Ok(self.push(data, Op::Relu { input }))
    }

    pub fn sum(&mut self, input: TensorId) -> Result<TensorId> {
        let total = self.node(input)?.data.sum();
        Ok(self.push(Array2::from_elem((1, 1), total), Op::Sum { input }))
    }

    // Composite operations, built from the primitives above.

    pub fn neg(&mut self, input: TensorId) -> Result<TensorId> {
        self.mul_scalar(input, -T::one())
    }

    pub fn sub(&mut self, lhs: TensorId, rhs: TensorId) -> Result<TensorId> {
        let negated = self.neg(rhs)?;
        self.add(lhs, negated)
    }

    pub fn div(&mut self, lhs: TensorId, rhs: TensorId) -> Result<TensorId> {
        let reciprocal = self.pow(rhs, -1.0)?;
        self.mul(lhs, reciprocal)
    }

    pub fn add_scalar(&mut self, input: TensorId, value: T) -> Result<TensorId> {
        self.node(input)?;
        let constant = self.constant(value);
        self.add(input, constant)
    }

    pub fn mul_scalar(&mut self, input: TensorId, value: T) -> Result<TensorId> {
        self.node(input)?;
        let constant = self.constant(value);
        self.mul(input, constant)
    }

    /// `input - value`
    pub fn sub_scalar(&mut self, input: TensorId, value: T) -> Result<TensorId> {
        self.add_scalar(input, -value)
    }

    /// `value - input`
    pub fn rsub_scalar(&mut self, value: T, input: TensorId) -> Result<TensorId> {
        let negated = self.neg(input)?;
        self.add_scalar(negated, value)
    }

    /// `input / value`
    pub fn div_scalar(&mut self, input: TensorId, value: T) -> Result<TensorId> {
        self.mul_scalar(input, value.recip())
    }

    /// `value / input`
    pub fn rdiv_scalar(&mut self, value: T, input: TensorId) -> Result<TensorId> {
        let reciprocal = self.pow(input, -1.0)?;
        self.mul_scalar(reciprocal, value)
    }

    /// `1 / (1 + exp(-input))`, composed from primitives.
    pub fn sigmoid(&mut self, input: TensorId) -> Result<TensorId> {
        let negated = self.neg(input)?;
        let exp = self.exp(negated)?;
        let denominator = self.add_scalar(exp, T::one())?;
        self.rdiv_scalar(T::one(), denominator)
    }

    pub fn softmax(&mut self, _input: TensorId) -> Result<TensorId> {
        Err(GradError::NotImplemented("softmax"))
    }
}

/// Elementwise `f(a, b)` over two arrays of identical shape.
pub(crate) fn zip_with<T, F>(a: &Array2<T>, b: &Array2<T>, f: F) -> Array2<T>
where
    T: Element,
    F: Fn(T, T) -> T,
{
    Zip::from(a).and(b).map_collect(|&x, &y| f(x, y))
}
