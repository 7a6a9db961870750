//! Computation tape and the backward pass.
//!
//! Operations append [`TapeEntry`]s in execution order; `backward` walks
//! the tape in reverse, asking each entry's [`GradFn`] for input gradients
//! and accumulating them per tensor. Tensors used more than once get the
//! sum of their contributions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::grad_fn::GradFn;
use super::tensor::{Tensor, TensorId};

/// One recorded operation.
#[derive(Clone)]
pub(crate) struct TapeEntry {
    /// ID of the output tensor
    pub output_id: TensorId,

    /// Function that maps the output gradient to input gradients
    pub grad_fn: Arc<dyn GradFn>,

    /// IDs of the input tensors, in forward-call order
    pub input_ids: Vec<TensorId>,
}

/// Tape of recorded operations plus the tensors that want gradients.
///
/// One instance lives per thread (see the parent module); the probe clears
/// it between scenarios so consecutive gradient checks cannot observe each
/// other.
#[allow(missing_debug_implementations)]
pub struct ComputationGraph {
    /// Recorded operations, oldest first
    tape: Vec<TapeEntry>,

    /// Registered tensors by ID (leaves that may receive gradients)
    tensors: HashMap<TensorId, Tensor>,

    /// IDs of tensors that require gradients
    requires_grad: HashSet<TensorId>,
}

impl ComputationGraph {
    /// Create an empty tape.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tape: Vec::new(),
            tensors: HashMap::new(),
            requires_grad: HashSet::new(),
        }
    }

    /// Drop every recorded operation and registered tensor.
    pub fn clear(&mut self) {
        self.tape.clear();
        self.tensors.clear();
        self.requires_grad.clear();
    }

    /// Register a tensor so the backward pass can reach it.
    pub fn register_tensor(&mut self, tensor: Tensor) {
        if tensor.requires_grad_enabled() {
            self.requires_grad.insert(tensor.id());
        }
        self.tensors.insert(tensor.id(), tensor);
    }

    /// Append an operation to the tape.
    pub fn record(
        &mut self,
        output_id: TensorId,
        grad_fn: Arc<dyn GradFn>,
        input_ids: Vec<TensorId>,
    ) {
        self.tape.push(TapeEntry {
            output_id,
            grad_fn,
            input_ids,
        });
    }

    /// Replay the tape in reverse from `output_id`.
    ///
    /// `grad_output` seeds the output tensor's gradient. With an empty
    /// output (zero elements) the seed is itself empty and every
    /// accumulation below is vacuous; the walk still completes normally,
    /// which is exactly the behavior the empty-tensor probe pins down.
    pub fn backward(&mut self, output_id: TensorId, grad_output: Tensor) {
        let mut grads: HashMap<TensorId, Tensor> = HashMap::new();
        grads.insert(output_id, grad_output);

        for entry in self.tape.iter().rev() {
            // Entries off the path from the output carry no gradient.
            let grad_out = match grads.get(&entry.output_id) {
                Some(g) => g.clone(),
                None => continue,
            };

            let input_grads = entry.grad_fn.backward(&grad_out);

            for (input_id, input_grad) in entry.input_ids.iter().zip(input_grads) {
                grads
                    .entry(*input_id)
                    .and_modify(|existing| {
                        let summed: Vec<f32> = existing
                            .data()
                            .iter()
                            .zip(input_grad.data().iter())
                            .map(|(a, b)| a + b)
                            .collect();
                        *existing = Tensor::new(&summed, existing.shape());
                    })
                    .or_insert(input_grad);
            }
        }

        for (id, grad) in grads {
            if let Some(tensor) = self.tensors.get_mut(&id) {
                if tensor.requires_grad_enabled() && tensor.is_leaf() {
                    tensor.accumulate_grad(grad);
                }
            }
        }
    }

    /// Number of recorded operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tape.len()
    }

    /// Whether the tape has no recorded operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tape.is_empty()
    }

    /// Get the accumulated gradient for a registered tensor.
    #[must_use]
    pub fn get_grad(&self, id: TensorId) -> Option<Tensor> {
        self.tensors.get(&id).and_then(|t| t.grad().cloned())
    }
}

impl Default for ComputationGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::grad_fn::SumBackward;

    #[test]
    fn test_graph_starts_empty() {
        let graph = ComputationGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
    }

    #[test]
    fn test_graph_clear() {
        let mut graph = ComputationGraph::new();
        let t = Tensor::from_slice(&[1.0, 2.0]).requires_grad();
        graph.register_tensor(t);
        assert!(!graph.tensors.is_empty());

        graph.clear();
        assert!(graph.is_empty());
        assert!(graph.tensors.is_empty());
    }

    #[test]
    fn test_tensor_registration_tracks_requires_grad() {
        let mut graph = ComputationGraph::new();

        let wants = Tensor::from_slice(&[1.0]).requires_grad();
        let plain = Tensor::from_slice(&[2.0]);
        let wants_id = wants.id();
        let plain_id = plain.id();

        graph.register_tensor(wants);
        graph.register_tensor(plain);

        assert!(graph.requires_grad.contains(&wants_id));
        assert!(!graph.requires_grad.contains(&plain_id));
    }

    #[test]
    fn test_backward_through_sum() {
        let mut graph = ComputationGraph::new();

        let input = Tensor::from_slice(&[1.0, 2.0, 3.0]).requires_grad();
        let input_id = input.id();
        graph.register_tensor(input);

        let output = Tensor::from_slice(&[6.0]);
        let output_id = output.id();
        graph.record(
            output_id,
            Arc::new(SumBackward {
                input_shape: vec![3],
            }),
            vec![input_id],
        );

        graph.backward(output_id, Tensor::from_slice(&[1.0]));

        let grad = graph.get_grad(input_id).expect("grad reached the leaf");
        assert_eq!(grad.data(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_backward_with_empty_tape() {
        let mut graph = ComputationGraph::new();

        let t = Tensor::from_slice(&[1.0]).requires_grad();
        let id = t.id();
        graph.register_tensor(t);

        graph.backward(id, Tensor::from_slice(&[1.0]));
        // The seed reaches the leaf even with nothing recorded.
        assert!(graph.get_grad(id).is_some());
    }

    #[test]
    fn test_backward_unknown_output_is_harmless() {
        let mut graph = ComputationGraph::new();
        let orphan_id = Tensor::from_slice(&[1.0]).id();
        graph.backward(orphan_id, Tensor::from_slice(&[1.0]));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_backward_with_empty_gradient() {
        let mut graph = ComputationGraph::new();

        let input = Tensor::zeros(&[0, 0]).requires_grad();
        let input_id = input.id();
        graph.register_tensor(input);

        let output = Tensor::zeros(&[1]);
        let output_id = output.id();
        graph.record(
            output_id,
            Arc::new(SumBackward {
                input_shape: vec![0, 0],
            }),
            vec![input_id],
        );

        graph.backward(output_id, Tensor::from_slice(&[1.0]));

        let grad = graph.get_grad(input_id).expect("empty grad accumulates");
        assert_eq!(grad.shape(), &[0, 0]);
        assert!(grad.is_empty());
    }
}
