//! Finite-difference verification of gradients produced by `backward()`.
//!
//! The expression under test is supplied as a closure that builds it on a
//! fresh graph from leaf handles and returns the 1x1 output. The checker
//! runs it once with `backward()` for the analytical gradient, then once per
//! perturbed input element in each direction for the central difference
//! `[f(x+h) - f(x-h)] / 2h`.
//!
//! ```rust
//! use matgrad_rs::gradcheck::{check_gradients, GradCheckConfig};
//! use ndarray::arr2;
//!
//! # fn main() -> matgrad_rs::Result<()> {
//! let a = arr2(&[[0.5, -1.0, 2.0], [1.5, 0.25, -0.75]]);
//! let b = arr2(&[[1.0, 2.0, -0.5], [0.3, -1.2, 0.8]]);
//! let c = arr2(&[[0.2, -0.4], [1.1, 0.6], [-0.9, 0.7]]);
//!
//! let report = check_gradients(
//!     |graph, x| {
//!         let y = graph.mul(x[0], x[1])?;
//!         let z = graph.dot(y, x[2])?;
//!         graph.sum(z)
//!     },
//!     &[a, b, c],
//!     &GradCheckConfig::default(),
//! )?;
//! assert!(report.passed);
//! # Ok(())
//! # }
//! ```

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::Graph;
use crate::tensor::TensorId;

/// Step size and tolerances for gradient checking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradCheckConfig {
    /// Perturbation applied to each element.
    pub epsilon: f64,
    /// Relative tolerance against the numerical gradient.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        GradCheckConfig {
            epsilon: 1e-6,
            rtol: 1e-4,
            atol: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradCheckReport {
    /// Largest `|analytical - numerical|` over all elements.
    pub max_abs_diff: f64,
    /// Largest difference relative to the larger magnitude of the two.
    pub max_rel_diff: f64,
    pub num_elements: usize,
    pub num_failures: usize,
    pub passed: bool,
}

/// Compares `backward()` against central differences for every element of
/// every input.
pub fn check_gradients<F>(
    build: F,
    inputs: &[Array2<f64>],
    config: &GradCheckConfig,
) -> Result<GradCheckReport>
where
    F: Fn(&mut Graph<f64>, &[TensorId]) -> Result<TensorId>,
{
    let analytical = analytical_gradients(&build, inputs)?;

    let mut report = GradCheckReport {
        max_abs_diff: 0.0,
        max_rel_diff: 0.0,
        num_elements: 0,
        num_failures: 0,
        passed: true,
    };

    let mut perturbed = inputs.to_vec();
    for (input, grads) in analytical.iter().enumerate() {
        for (position, &expected) in grads.indexed_iter() {
            let original = perturbed[input][position];

            perturbed[input][position] = original + config.epsilon;
            let plus = evaluate(&build, &perturbed)?;
            perturbed[input][position] = original - config.epsilon;
            let minus = evaluate(&build, &perturbed)?;
            perturbed[input][position] = original;

            let numerical = (plus - minus) / (2.0 * config.epsilon);
            let abs_diff = (expected - numerical).abs();
            let scale = expected.abs().max(numerical.abs());
            let rel_diff = if scale > 0.0 { abs_diff / scale } else { 0.0 };

            report.num_elements += 1;
            report.max_abs_diff = report.max_abs_diff.max(abs_diff);
            report.max_rel_diff = report.max_rel_diff.max(rel_diff);
            if abs_diff > config.atol + config.rtol * numerical.abs() {
                log::debug!(
                    "gradient mismatch at input {} {:?}: analytical {}, numerical {}",
                    input,
                    position,
                    expected,
                    numerical
                );
                report.num_failures += 1;
            }
        }
    }

    report.passed = report.num_failures == 0;
    Ok(report)
}

fn build_graph<F>(
    build: &F,
    inputs: &[Array2<f64>],
) -> Result<(Graph<f64>, Vec<TensorId>, TensorId)>
where
    F: Fn(&mut Graph<f64>, &[TensorId]) -> Result<TensorId>,
{
    let mut graph = Graph::new();
    let leaves = inputs
        .iter()
        .map(|input| graph.tensor(input.clone()))
        .collect::<Result<Vec<_>>>()?;
    let output = build(&mut graph, &leaves)?;
    Ok((graph, leaves, output))
}

fn evaluate<F>(build: &F, inputs: &[Array2<f64>]) -> Result<f64>
where
    F: Fn(&mut Graph<f64>, &[TensorId]) -> Result<TensorId>,
{
    let (graph, _, output) = build_graph(build, inputs)?;
    graph.item(output)
}

fn analytical_gradients<F>(build: &F, inputs: &[Array2<f64>]) -> Result<Vec<Array2<f64>>>
where
    F: Fn(&mut Graph<f64>, &[TensorId]) -> Result<TensorId>,
{
    let (mut graph, leaves, output) = build_graph(build, inputs)?;
    graph.backward(output)?;
    leaves
        .iter()
        .map(|leaf| graph.grad(*leaf).cloned())
        .collect()
}
