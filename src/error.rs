//! Error types for sondeo operations.
//!
//! Nothing in this crate catches its own errors: the probe exists to make
//! failures visible, so every variant is expected to travel all the way to
//! the process boundary.

use std::fmt;

/// Main error type for sondeo operations.
///
/// Covers malformed probe requests, operand shapes an operation refuses,
/// and the two ways a gradient check itself can fail.
///
/// # Examples
///
/// ```
/// use sondeo::error::SondeoError;
///
/// let err = SondeoError::InvalidRank { rank: 0 };
/// assert!(err.to_string().contains("rank 0"));
/// ```
#[derive(Debug)]
pub enum SondeoError {
    /// The requested rank cannot describe an empty tensor.
    InvalidRank {
        /// Rank that was requested
        rank: usize,
    },

    /// A probe request was malformed (e.g. wrong number of inputs).
    InvalidArgument {
        /// Argument name
        argument: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// An operation rejected the shapes of its operands.
    ShapeMismatch {
        /// Operation name
        operation: &'static str,
        /// Left operand shape
        lhs: Vec<usize>,
        /// Right operand shape
        rhs: Vec<usize>,
        /// What disagreed
        detail: String,
    },

    /// Analytic and numeric gradients differ beyond tolerance.
    GradientMismatch {
        /// Index of the offending input
        input: usize,
        /// Largest entrywise deviation observed
        max_error: f32,
        /// Tolerance the deviation exceeded
        tolerance: f32,
    },

    /// The checker or an operation failed while computing.
    ComputationFailure {
        /// Where the failure happened
        context: String,
        /// Underlying message
        message: String,
    },
}

impl fmt::Display for SondeoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SondeoError::InvalidRank { rank } => {
                write!(
                    f,
                    "invalid rank {rank}: a rank-0 tensor holds one element and cannot be empty"
                )
            }
            SondeoError::InvalidArgument {
                argument,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "invalid argument: {argument} = {value}, expected {constraint}"
                )
            }
            SondeoError::ShapeMismatch {
                operation,
                lhs,
                rhs,
                detail,
            } => {
                write!(
                    f,
                    "{operation} shape mismatch: {lhs:?} vs {rhs:?} ({detail})"
                )
            }
            SondeoError::GradientMismatch {
                input,
                max_error,
                tolerance,
            } => {
                write!(
                    f,
                    "gradient mismatch on input {input}: max |analytic - numeric| = {max_error}, tolerance = {tolerance}"
                )
            }
            SondeoError::ComputationFailure { context, message } => {
                write!(f, "computation failure in {context}: {message}")
            }
        }
    }
}

impl std::error::Error for SondeoError {}

impl From<trueno::TruenoError> for SondeoError {
    fn from(err: trueno::TruenoError) -> Self {
        SondeoError::ComputationFailure {
            context: "trueno kernel".to_string(),
            message: err.to_string(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, SondeoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rank_display() {
        let err = SondeoError::InvalidRank { rank: 0 };
        assert!(err.to_string().contains("invalid rank 0"));
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_invalid_argument_display() {
        let err = SondeoError::InvalidArgument {
            argument: "inputs".to_string(),
            value: "3".to_string(),
            constraint: "2".to_string(),
        };
        assert!(err.to_string().contains("invalid argument"));
        assert!(err.to_string().contains("inputs"));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = SondeoError::ShapeMismatch {
            operation: "matmul",
            lhs: vec![2, 3],
            rhs: vec![4, 5],
            detail: "inner dimensions 3 and 4 must match".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("matmul"));
        assert!(msg.contains("[2, 3]"));
        assert!(msg.contains("inner dimensions"));
    }

    #[test]
    fn test_gradient_mismatch_display() {
        let err = SondeoError::GradientMismatch {
            input: 1,
            max_error: 0.5,
            tolerance: 0.01,
        };
        let msg = err.to_string();
        assert!(msg.contains("input 1"));
        assert!(msg.contains("0.5"));
        assert!(msg.contains("0.01"));
    }

    #[test]
    fn test_computation_failure_display() {
        let err = SondeoError::ComputationFailure {
            context: "gradient check".to_string(),
            message: "output shape changed".to_string(),
        };
        assert!(err.to_string().contains("gradient check"));
        assert!(err.to_string().contains("output shape changed"));
    }
}
