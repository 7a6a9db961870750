//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use sondeo::prelude::*;
//! ```

pub use crate::autograd::{clear_graph, no_grad, Tensor};
pub use crate::error::{Result, SondeoError};
pub use crate::gradcheck::{check_gradient, compute_gradient, GradientCheckReport};
pub use crate::probe::{empty, run_all, Scenario};
