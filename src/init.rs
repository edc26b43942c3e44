//! Random leaf initialization.

use ndarray::Array2;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{GradError, Result};
use crate::graph::Graph;
use crate::operation::{cast, Op};
use crate::tensor::{Element, Shape, TensorId};

/// Range and seed for uniformly initialized leaves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniformInit {
    /// Inclusive lower bound.
    pub low: f64,
    /// Exclusive upper bound.
    pub high: f64,
    /// Fixed seed for reproducible draws; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for UniformInit {
    fn default() -> Self {
        UniformInit {
            low: -1.0,
            high: 1.0,
            seed: None,
        }
    }
}

impl UniformInit {
    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Draws a `shape` matrix from `[low, high)`.
    ///
    /// The bounds are converted to the element type first and sampling
    /// happens there, so a range that collapses after rounding is rejected.
    pub fn sample<T: Element>(&self, shape: Shape) -> Result<Array2<T>> {
        let invalid = || GradError::InvalidRange {
            low: self.low,
            high: self.high,
        };
        let low: T = cast(self.low).map_err(|_| invalid())?;
        let high: T = cast(self.high).map_err(|_| invalid())?;
        if !(low < high && (high - low).is_finite()) {
            return Err(invalid());
        }
        if shape.0 == 0 || shape.1 == 0 {
            return Err(GradError::EmptyDimension { shape });
        }

        let dist = Uniform::new(low, high);
        let mut rng = self.rng();
        let values: Vec<T> = (0..shape.0 * shape.1)
            .map(|_| dist.sample(&mut rng))
            .collect();
        Array2::from_shape_vec(shape, values).map_err(|_| GradError::NotTwoDimensional {
            shape: vec![shape.0, shape.1],
        })
    }
}

impl<T: Element> Graph<T> {
    /// Leaf with values drawn uniformly from `[low, high)`.
    pub fn uniform(
        &mut self,
        shape: Shape,
        low: f64,
        high: f64,
        seed: Option<u64>,
    ) -> Result<TensorId> {
        self.uniform_with(shape, &UniformInit { low, high, seed })
    }

    pub fn uniform_with(&mut self, shape: Shape, init: &UniformInit) -> Result<TensorId> {
        let data = init.sample(shape)?;
        Ok(self.push(data, Op::Leaf))
    }
}
