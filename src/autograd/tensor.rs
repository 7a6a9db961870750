//! Tensor with automatic differentiation support.
//!
//! The tensor is deliberately small: dense `f32` storage, a shape, and the
//! metadata the tape needs. Zero-sized shapes (any dimension of length
//! zero) are first-class citizens; every constructor and accessor must
//! behave for a tensor with no elements at all.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::grad_fn::GradFn;
use super::with_graph;

/// Unique identifier for tensors registered on the tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorId(u64);

impl TensorId {
    /// Generate a new unique tensor ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        TensorId(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TensorId {
    fn default() -> Self {
        Self::new()
    }
}

/// A dense `f32` tensor with optional gradient tracking.
///
/// Stores the values, the shape, the accumulated gradient (populated by the
/// backward pass), whether the tensor participates in differentiation, and
/// the operation that created it.
#[derive(Clone)]
pub struct Tensor {
    /// Row-major element storage
    data: Vec<f32>,

    /// Per-dimension lengths
    shape: Vec<usize>,

    /// Gradient (populated after backward)
    grad: Option<Box<Tensor>>,

    /// Whether this tensor requires gradient computation
    requires_grad: bool,

    /// Whether this is a leaf tensor (created by the user, not an op)
    is_leaf: bool,

    /// Operation that produced this tensor, for the backward pass
    grad_fn: Option<Arc<dyn GradFn>>,

    /// Unique identifier for tape bookkeeping
    id: TensorId,
}

impl Tensor {
    /// Create a tensor from a slice with the given shape.
    ///
    /// Gradient tracking is disabled by default.
    ///
    /// # Panics
    ///
    /// Panics if the data length doesn't match the product of the shape
    /// dimensions. Note the product of an empty shape is one: a rank-0
    /// tensor needs exactly one element.
    #[must_use]
    pub fn new(data: &[f32], shape: &[usize]) -> Self {
        let expected_len: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            expected_len,
            "data length {} doesn't match shape {:?} (expected {})",
            data.len(),
            shape,
            expected_len
        );

        Self {
            data: data.to_vec(),
            shape: shape.to_vec(),
            grad: None,
            requires_grad: false,
            is_leaf: true,
            grad_fn: None,
            id: TensorId::new(),
        }
    }

    /// Create a rank-1 tensor from a slice.
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self::new(data, &[data.len()])
    }

    /// Create a tensor filled with zeros.
    ///
    /// With a shape containing a zero-length dimension this allocates
    /// nothing and yields a tensor with zero elements.
    #[must_use]
    pub fn zeros(shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self::new(&vec![0.0; len], shape)
    }

    /// Create a tensor filled with ones.
    #[must_use]
    pub fn ones(shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self::new(&vec![1.0; len], shape)
    }

    /// Enable gradient tracking, consuming and returning self.
    #[must_use]
    pub fn requires_grad(mut self) -> Self {
        self.requires_grad = true;
        self
    }

    /// Enable or disable gradient tracking in place.
    pub fn requires_grad_(&mut self, requires: bool) -> &mut Self {
        self.requires_grad = requires;
        self
    }

    /// Check whether this tensor participates in gradient computation.
    #[must_use]
    pub fn requires_grad_enabled(&self) -> bool {
        self.requires_grad
    }

    /// Check whether this is a leaf tensor (not produced by an operation).
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// Get the tensor's unique identifier.
    #[must_use]
    pub fn id(&self) -> TensorId {
        self.id
    }

    /// Get the shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements (the product of the shape).
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Whether the tensor holds no elements, i.e. some dimension is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    /// Get the underlying element storage.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Get the accumulated gradient, if backward has produced one.
    #[must_use]
    pub fn grad(&self) -> Option<&Tensor> {
        self.grad.as_deref()
    }

    /// Drop the accumulated gradient.
    pub fn clear_grad(&mut self) {
        self.grad = None;
    }

    /// Accumulate a gradient contribution (used by the backward pass).
    pub(crate) fn accumulate_grad(&mut self, grad: Tensor) {
        match &mut self.grad {
            Some(existing) => {
                let summed: Vec<f32> = existing
                    .data()
                    .iter()
                    .zip(grad.data().iter())
                    .map(|(a, b)| a + b)
                    .collect();
                **existing = Tensor::new(&summed, &self.shape);
            }
            None => {
                self.grad = Some(Box::new(grad));
            }
        }
    }

    /// Attach the producing operation (set by ops when recording).
    pub(crate) fn set_grad_fn(&mut self, grad_fn: Arc<dyn GradFn>) {
        self.grad_fn = Some(grad_fn);
        self.is_leaf = false;
    }

    /// Detach from the tape: same data, fresh identity, no tracking.
    #[must_use]
    pub fn detach(&self) -> Tensor {
        Tensor {
            data: self.data.clone(),
            shape: self.shape.clone(),
            grad: None,
            requires_grad: false,
            is_leaf: true,
            grad_fn: None,
            id: TensorId::new(),
        }
    }

    /// Get the single value of a one-element tensor.
    ///
    /// # Panics
    ///
    /// Panics if the tensor has any other element count, including zero:
    /// an empty tensor has no item.
    #[must_use]
    pub fn item(&self) -> f32 {
        assert_eq!(
            self.numel(),
            1,
            "item() only works on tensors with exactly 1 element, got {}",
            self.numel()
        );
        self.data[0]
    }

    /// Backpropagate from a scalar output with seed gradient 1.
    ///
    /// # Panics
    ///
    /// Panics if the tensor has more than one element; use
    /// [`backward_with_grad`](Self::backward_with_grad) for non-scalar
    /// outputs.
    pub fn backward(&self) {
        assert_eq!(
            self.numel(),
            1,
            "backward() requires a scalar output, got shape {:?}; use backward_with_grad()",
            self.shape
        );

        self.backward_with_grad(Tensor::ones(&self.shape));
    }

    /// Backpropagate with an explicit output gradient.
    ///
    /// `grad_output` holds dL/d(self); the tape replays in reverse and
    /// leaf tensors registered on it accumulate their gradients.
    pub fn backward_with_grad(&self, grad_output: Tensor) {
        with_graph(|graph| {
            graph.backward(self.id, grad_output);
        });
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("requires_grad", &self.requires_grad)
            .field("is_leaf", &self.is_leaf)
            .field("has_grad", &self.grad.is_some())
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_creation() {
        let t = Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.numel(), 4);
        assert_eq!(t.ndim(), 2);
        assert!(!t.is_empty());
    }

    #[test]
    fn test_zero_sized_tensor() {
        let t = Tensor::new(&[], &[0, 0, 0]);
        assert_eq!(t.shape(), &[0, 0, 0]);
        assert_eq!(t.numel(), 0);
        assert_eq!(t.ndim(), 3);
        assert!(t.is_empty());
        assert!(t.data().is_empty());
    }

    #[test]
    fn test_zeros_with_zero_dim() {
        let t = Tensor::zeros(&[3, 0]);
        assert_eq!(t.numel(), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn test_rank_zero_holds_one_element() {
        // The product of an empty shape is one, not zero.
        let t = Tensor::new(&[42.0], &[]);
        assert_eq!(t.ndim(), 0);
        assert_eq!(t.numel(), 1);
        assert_eq!(t.item(), 42.0);
    }

    #[test]
    #[should_panic(expected = "doesn't match shape")]
    fn test_rank_zero_rejects_empty_data() {
        let _ = Tensor::new(&[], &[]);
    }

    #[test]
    fn test_requires_grad() {
        let t = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
        assert!(t.requires_grad_enabled());

        let t2 = Tensor::from_slice(&[1.0, 2.0]);
        assert!(!t2.requires_grad_enabled());
    }

    #[test]
    fn test_detach() {
        let t = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
        let d = t.detach();

        assert!(t.requires_grad_enabled());
        assert!(!d.requires_grad_enabled());
        assert!(d.is_leaf());
        assert_ne!(t.id(), d.id());
        assert_eq!(t.data(), d.data());
    }

    #[test]
    #[should_panic(expected = "exactly 1 element")]
    fn test_item_panics_on_empty() {
        let t = Tensor::zeros(&[0]);
        let _ = t.item();
    }

    #[test]
    fn test_tensor_id_unique() {
        let t1 = Tensor::from_slice(&[1.0]);
        let t2 = Tensor::from_slice(&[1.0]);
        assert_ne!(t1.id(), t2.id());
    }

    #[test]
    fn test_gradient_accumulation() {
        let mut t = Tensor::from_slice(&[1.0, 2.0, 3.0]).requires_grad();

        t.accumulate_grad(Tensor::from_slice(&[0.1, 0.2, 0.3]));
        let first = t.grad().expect("grad after accumulate").data().to_vec();
        assert_eq!(first, vec![0.1, 0.2, 0.3]);

        t.accumulate_grad(Tensor::from_slice(&[0.1, 0.2, 0.3]));
        let second = t.grad().expect("grad after second accumulate").data().to_vec();
        assert_eq!(second, vec![0.2, 0.4, 0.6]);
    }

    #[test]
    fn test_accumulate_grad_on_empty_tensor() {
        let mut t = Tensor::zeros(&[0, 2]).requires_grad();
        t.accumulate_grad(Tensor::zeros(&[0, 2]));
        let grad = t.grad().expect("empty grad is still a grad");
        assert_eq!(grad.shape(), &[0, 2]);
        assert!(grad.is_empty());
    }
}
