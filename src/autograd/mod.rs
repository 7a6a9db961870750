//! Reverse-mode automatic differentiation for the probed operations.
//!
//! The engine is tape-based and define-by-run: each differentiable
//! operation computes its forward result and records a [`GradFn`] to a
//! per-thread tape; [`Tensor::backward_with_grad`] replays the tape in
//! reverse, accumulating gradients into leaf tensors.
//!
//! The tape is thread-local on purpose. The probe runs one scenario at a
//! time and clears the tape between scenarios, which is what makes
//! consecutive gradient checks independent of each other.
//!
//! # Example
//!
//! ```
//! use sondeo::autograd::{clear_graph, get_grad, Tensor};
//!
//! clear_graph();
//! let x = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]).requires_grad();
//! let x_id = x.id();
//! let bias = Tensor::new(&[10.0, 20.0], &[2]);
//!
//! let y = x.bias_add(&bias).unwrap().sum();
//! y.backward();
//!
//! let grad = get_grad(x_id).unwrap();
//! assert_eq!(grad.data(), &[1.0, 1.0, 1.0, 1.0]);
//! ```

pub(crate) mod grad_fn;
mod graph;
mod ops;
mod tensor;

pub use grad_fn::GradFn;
pub use graph::ComputationGraph;
pub use tensor::{Tensor, TensorId};

use std::cell::RefCell;

thread_local! {
    /// Tape for the current thread.
    static GRAPH: RefCell<ComputationGraph> = RefCell::new(ComputationGraph::new());

    /// Flag to disable gradient recording (numeric probe passes).
    static GRAD_ENABLED: RefCell<bool> = const { RefCell::new(true) };
}

/// Execute a closure without recording operations to the tape.
///
/// The gradient checker wraps its finite-difference evaluations in this so
/// the perturbed forward passes do not pollute the tape under inspection.
///
/// # Example
///
/// ```
/// use sondeo::autograd::{is_grad_enabled, no_grad};
///
/// assert!(is_grad_enabled());
/// no_grad(|| assert!(!is_grad_enabled()));
/// assert!(is_grad_enabled());
/// ```
pub fn no_grad<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    GRAD_ENABLED.with(|enabled| {
        let prev = *enabled.borrow();
        *enabled.borrow_mut() = false;
        let result = f();
        *enabled.borrow_mut() = prev;
        result
    })
}

/// Check whether gradient recording is currently enabled.
#[must_use]
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(|enabled| *enabled.borrow())
}

/// Run a closure against the thread-local tape.
pub(crate) fn with_graph<F, R>(f: F) -> R
where
    F: FnOnce(&mut ComputationGraph) -> R,
{
    GRAPH.with(|graph| f(&mut graph.borrow_mut()))
}

/// Clear the thread-local tape and all registered tensors.
pub fn clear_graph() {
    GRAPH.with(|graph| graph.borrow_mut().clear());
}

/// Get the accumulated gradient for a tensor by ID, if backward reached it.
#[must_use]
pub fn get_grad(id: TensorId) -> Option<Tensor> {
    with_graph(|graph| graph.get_grad(id))
}
