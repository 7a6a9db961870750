//! Sondeo: an empty-tensor gradient probe.
//!
//! Sondeo reproduces, in a self-contained workspace, a class of numerical
//! defect where gradient-checking machinery mishandles zero-sized tensors
//! (arrays with at least one dimension of length zero). It carries the
//! minimal pieces needed to make that probe real:
//!
//! - a dense `f32` [`Tensor`](autograd::Tensor) with tape-based reverse-mode
//!   automatic differentiation,
//! - two differentiable operations, bias addition and batch-broadcast
//!   matrix multiplication,
//! - a [`gradcheck`] utility that compares the tape-derived Jacobian
//!   against a central-finite-difference estimate,
//! - a [`probe`] harness that feeds deliberately empty-shaped inputs to the
//!   checker and lets any failure propagate.
//!
//! # Quick Start
//!
//! ```
//! use sondeo::prelude::*;
//!
//! // Build an all-zero-shaped rank-3 tensor: shape [0, 0, 0], 0 elements.
//! let t = empty(3).unwrap();
//! assert_eq!(t.shape(), &[0, 0, 0]);
//! assert_eq!(t.numel(), 0);
//!
//! // Gradient-check bias addition on empty inputs. The degenerate case
//! // must complete cleanly: both Jacobians are 0x0.
//! let report = Scenario::BiasAdd.run().unwrap();
//! assert_eq!(report.max_error, 0.0);
//! ```
//!
//! # Modules
//!
//! - [`autograd`]: tensor type, computation tape, differentiable operations
//! - [`gradcheck`]: analytic vs. numeric Jacobian comparison
//! - [`probe`]: empty-tensor builder and the two probe scenarios
//! - [`error`]: error taxonomy shared by all of the above

#![warn(missing_docs)]

pub mod autograd;
pub mod error;
pub mod gradcheck;
pub mod prelude;
pub mod probe;

pub use error::{Result, SondeoError};
