//! Gradient checking: analytic vs. numeric Jacobians.
//!
//! [`compute_gradient`] evaluates, for every input of an operation, two
//! estimates of the Jacobian d(output)/d(input):
//!
//! - **analytic**: one backward pass over a freshly recorded tape per
//!   output element, seeded with a one-hot output gradient;
//! - **numeric**: central finite differences, perturbing one input element
//!   at a time by a fixed step.
//!
//! [`check_gradient`] gates the entrywise maximum deviation against a
//! fixed tolerance. Step size and tolerance are owned here and are not
//! configurable by callers.
//!
//! Zero-sized inputs are the interesting case: with no input elements and
//! no output elements both loops are vacuous and the Jacobians come back
//! 0x0. The probe pins down that this completes cleanly instead of
//! erroring somewhere inside the perturbation or reshaping logic.

use serde::Serialize;

use crate::autograd::{clear_graph, get_grad, no_grad, Tensor};
use crate::error::{Result, SondeoError};

/// Perturbation step for the central finite-difference estimate.
const STEP: f32 = 1e-3;

/// Largest tolerated entrywise |analytic - numeric| deviation.
const TOLERANCE: f32 = 1e-2;

/// Analytic and numeric Jacobian estimates for one input.
///
/// Both matrices are row-major with `rows` input elements and `cols`
/// output elements; for a zero-sized input or output they are empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JacobianPair {
    /// Position of the input in the operation's argument list
    pub input_index: usize,
    /// Input element count (Jacobian rows)
    pub rows: usize,
    /// Output element count (Jacobian columns)
    pub cols: usize,
    /// Tape-derived Jacobian, row-major
    pub analytic: Vec<f32>,
    /// Finite-difference Jacobian, row-major
    pub numeric: Vec<f32>,
    /// Largest entrywise deviation between the two
    pub max_error: f32,
}

/// Outcome of a gradient check across all inputs of an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradientCheckReport {
    /// Shape of the operation's output
    pub output_shape: Vec<usize>,
    /// Tolerance the check was gated against
    pub tolerance: f32,
    /// Largest deviation across all inputs
    pub max_error: f32,
    /// Per-input Jacobian estimates
    pub jacobians: Vec<JacobianPair>,
}

/// Compute analytic and numeric Jacobians for every input of `op`.
///
/// `op` is evaluated repeatedly: once per output element for the analytic
/// side (each time on a fresh tape) and twice per input element for the
/// numeric side (with recording disabled). The operation must be
/// deterministic; a changing output element count is reported as a
/// [`SondeoError::ComputationFailure`].
///
/// # Errors
///
/// Propagates any error the operation itself returns, unchanged.
pub fn compute_gradient<F>(op: F, inputs: &[Tensor]) -> Result<GradientCheckReport>
where
    F: Fn(&[Tensor]) -> Result<Tensor>,
{
    let baseline = no_grad(|| op(inputs))?;
    let y_size = baseline.numel();
    let output_shape = baseline.shape().to_vec();

    // Analytic: d(output_j)/d(input_i) via one backward pass per j.
    let mut analytic: Vec<Vec<f32>> = inputs
        .iter()
        .map(|t| vec![0.0f32; t.numel() * y_size])
        .collect();

    for j in 0..y_size {
        clear_graph();
        let leaves: Vec<Tensor> = inputs.iter().map(|t| t.detach().requires_grad()).collect();
        let ids: Vec<_> = leaves.iter().map(Tensor::id).collect();

        let out = op(&leaves)?;
        if out.numel() != y_size {
            clear_graph();
            return Err(shape_drift(out.numel(), y_size));
        }

        let mut seed = vec![0.0f32; y_size];
        seed[j] = 1.0;
        out.backward_with_grad(Tensor::new(&seed, out.shape()));

        for (idx, id) in ids.iter().enumerate() {
            // An input the output doesn't depend on keeps its zero column.
            if let Some(grad) = get_grad(*id) {
                for (i, g) in grad.data().iter().enumerate() {
                    analytic[idx][i * y_size + j] = *g;
                }
            }
        }
        clear_graph();
    }

    // Numeric: central differences, one input element at a time.
    let mut jacobians = Vec::with_capacity(inputs.len());
    let mut overall = 0.0f32;

    for (idx, input) in inputs.iter().enumerate() {
        let x_size = input.numel();
        let mut numeric = vec![0.0f32; x_size * y_size];

        for i in 0..x_size {
            let plus = perturbed(inputs, idx, i, STEP);
            let y_plus = no_grad(|| op(&plus))?;
            let minus = perturbed(inputs, idx, i, -STEP);
            let y_minus = no_grad(|| op(&minus))?;
            if y_plus.numel() != y_size || y_minus.numel() != y_size {
                return Err(shape_drift(y_plus.numel(), y_size));
            }

            for j in 0..y_size {
                numeric[i * y_size + j] =
                    (y_plus.data()[j] - y_minus.data()[j]) / (2.0 * STEP);
            }
        }

        let analytic_jac = std::mem::take(&mut analytic[idx]);
        let max_error = analytic_jac
            .iter()
            .zip(numeric.iter())
            .map(|(a, n)| (a - n).abs())
            .fold(0.0f32, |acc, d| if d.is_nan() { f32::NAN } else { acc.max(d) });
        overall = overall.max(max_error);

        jacobians.push(JacobianPair {
            input_index: idx,
            rows: x_size,
            cols: y_size,
            analytic: analytic_jac,
            numeric,
            max_error,
        });
    }

    Ok(GradientCheckReport {
        output_shape,
        tolerance: TOLERANCE,
        max_error: overall,
        jacobians,
    })
}

/// Compute Jacobians and fail if any input's deviation exceeds tolerance.
///
/// # Errors
///
/// [`SondeoError::GradientMismatch`] for the first input whose deviation
/// exceeds (or is not comparable to) the tolerance, plus anything
/// [`compute_gradient`] can return.
pub fn check_gradient<F>(op: F, inputs: &[Tensor]) -> Result<GradientCheckReport>
where
    F: Fn(&[Tensor]) -> Result<Tensor>,
{
    let report = compute_gradient(op, inputs)?;
    for pair in &report.jacobians {
        // Written so a NaN deviation counts as a mismatch.
        if !(pair.max_error <= report.tolerance) {
            return Err(SondeoError::GradientMismatch {
                input: pair.input_index,
                max_error: pair.max_error,
                tolerance: report.tolerance,
            });
        }
    }
    Ok(report)
}

fn shape_drift(actual: usize, expected: usize) -> SondeoError {
    SondeoError::ComputationFailure {
        context: "gradient check".to_string(),
        message: format!(
            "operation output element count changed between evaluations ({actual} vs {expected})"
        ),
    }
}

/// Clone the inputs, nudging one element of one input by `step`.
fn perturbed(inputs: &[Tensor], target: usize, element: usize, step: f32) -> Vec<Tensor> {
    inputs
        .iter()
        .enumerate()
        .map(|(idx, t)| {
            if idx == target {
                let mut data = t.data().to_vec();
                data[element] += step;
                Tensor::new(&data, t.shape())
            } else {
                t.detach()
            }
        })
        .collect()
}
