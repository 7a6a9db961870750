//! Empty-tensor builder and the two probe scenarios.
//!
//! The probe feeds deliberately zero-sized inputs through
//! [`check_gradient`] and lets any failure propagate. Historically this
//! class of input has broken gradient checkers whose perturbation or
//! reshaping logic assumes at least one element, so the scenarios here pin
//! the degenerate behavior down: either the check completes (Jacobians are
//! 0x0) or the error surfaces at the process boundary.
//!
//! Two scenarios exist, preserved exactly from the originating diagnostic:
//!
//! 1. **bias-add**: a rank-3 all-zero-shaped value with a rank-1
//!    zero-length bias;
//! 2. **matmul**: a rank-2 all-zero-shaped left operand against a rank-3
//!    all-zero-shaped right operand. The asymmetric ranks are deliberate:
//!    they exercise the batch-broadcast path with a degenerate batch.
//!
//! Running both in one process can interact (the tape is shared per
//! thread), so each scenario is independently runnable and the suite
//! asserts the outcomes match either way.

use std::fmt;

use serde::Serialize;

use crate::autograd::{clear_graph, Tensor};
use crate::error::{Result, SondeoError};
use crate::gradcheck::{check_gradient, GradientCheckReport};

/// Build a tensor whose shape is `rank` zero-length dimensions.
///
/// The result has exactly `rank` dimensions, each of length 0, and zero
/// elements total, in the crate's default `f32` element type.
///
/// # Errors
///
/// [`SondeoError::InvalidRank`] for `rank == 0`: the product of an empty
/// shape is one, so a rank-0 tensor always holds a single element and can
/// never be empty.
///
/// # Example
///
/// ```
/// let t = sondeo::probe::empty(3).unwrap();
/// assert_eq!(t.shape(), &[0, 0, 0]);
/// assert_eq!(t.numel(), 0);
/// ```
pub fn empty(rank: usize) -> Result<Tensor> {
    if rank == 0 {
        return Err(SondeoError::InvalidRank { rank });
    }
    Ok(Tensor::zeros(&vec![0; rank]))
}

/// The closed set of probed operations.
///
/// Selection is by explicit variant, not by name lookup; there is nothing
/// else to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scenario {
    /// Bias addition with a rank-3 empty value and a rank-1 empty bias.
    #[serde(rename = "bias-add")]
    BiasAdd,
    /// Matrix multiplication of a rank-2 empty operand by a rank-3 one.
    #[serde(rename = "matmul")]
    MatMul,
}

impl Scenario {
    /// Every scenario, in the fixed sequence order.
    #[must_use]
    pub fn all() -> [Scenario; 2] {
        [Scenario::BiasAdd, Scenario::MatMul]
    }

    /// Number of inputs the scenario's operation takes.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Scenario::BiasAdd | Scenario::MatMul => 2,
        }
    }

    /// Apply the scenario's operation to a slice of inputs.
    ///
    /// # Errors
    ///
    /// [`SondeoError::InvalidArgument`] when the input count doesn't match
    /// [`arity`](Self::arity); shape compatibility beyond that is the
    /// operation's own concern and is exactly what the probe exercises.
    pub fn apply(&self, inputs: &[Tensor]) -> Result<Tensor> {
        if inputs.len() != self.arity() {
            return Err(SondeoError::InvalidArgument {
                argument: "inputs".to_string(),
                value: inputs.len().to_string(),
                constraint: format!("{} tensors for {self}", self.arity()),
            });
        }
        match self {
            Scenario::BiasAdd => inputs[0].bias_add(&inputs[1]),
            Scenario::MatMul => inputs[0].matmul(&inputs[1]),
        }
    }

    /// Construct the scenario's literal empty-shaped inputs.
    ///
    /// # Errors
    ///
    /// Only what [`empty`] can return; the ranks here are all positive.
    pub fn inputs(&self) -> Result<Vec<Tensor>> {
        Ok(match self {
            Scenario::BiasAdd => vec![empty(3)?, empty(1)?],
            Scenario::MatMul => vec![empty(2)?, empty(3)?],
        })
    }

    /// Build the inputs, run the gradient check, and return its report.
    ///
    /// The tape is cleared first so consecutive scenario runs cannot
    /// observe each other.
    ///
    /// # Errors
    ///
    /// Everything from [`check_gradient`] propagates unhandled; surfacing
    /// such failures is the probe's purpose.
    pub fn run(&self) -> Result<GradientCheckReport> {
        clear_graph();
        let inputs = self.inputs()?;
        check_gradient(|xs: &[Tensor]| self.apply(xs), &inputs)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::BiasAdd => write!(f, "bias-add"),
            Scenario::MatMul => write!(f, "matmul"),
        }
    }
}

/// Run the fixed sequence: bias-add probe, then matmul probe.
///
/// Stops at the first failure and propagates it.
///
/// # Errors
///
/// The first error any scenario produces.
pub fn run_all() -> Result<Vec<(Scenario, GradientCheckReport)>> {
    let mut reports = Vec::with_capacity(Scenario::all().len());
    for scenario in Scenario::all() {
        let report = scenario.run()?;
        reports.push((scenario, report));
    }
    Ok(reports)
}
