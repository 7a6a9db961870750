//! Differentiable operations for tensors.
//!
//! Each operation:
//! 1. Validates operand shapes, returning `ShapeMismatch` on refusal
//! 2. Computes the forward result
//! 3. Records a `GradFn` to the tape (if gradient tracking is enabled)
//!
//! The matmul kernels are trueno's SIMD implementations: the plain 2-D
//! multiply, its batched 3-D variant, and a per-batch 2-D loop for the
//! broadcast cases. All paths are written so that zero-sized operands
//! degenerate to empty loops instead of special cases.

use std::sync::Arc;

use crate::error::{Result, SondeoError};

use super::grad_fn::{BiasAddBackward, MatmulBackward, SumBackward};
use super::tensor::Tensor;
use super::{is_grad_enabled, with_graph};

impl Tensor {
    /// Bias addition along the last axis: z[..., j] = self[..., j] + bias[j].
    ///
    /// `self` may have any rank of at least 1; `bias` must be rank 1 with
    /// length equal to `self`'s last dimension. A zero-length last
    /// dimension is accepted and produces an output with zero elements.
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::ShapeMismatch`] when `self` is rank 0, when
    /// `bias` is not rank 1, or when the bias length disagrees with the
    /// last dimension.
    pub fn bias_add(&self, bias: &Tensor) -> Result<Tensor> {
        if self.ndim() == 0 {
            return Err(SondeoError::ShapeMismatch {
                operation: "bias_add",
                lhs: self.shape().to_vec(),
                rhs: bias.shape().to_vec(),
                detail: "value must have rank >= 1".to_string(),
            });
        }
        if bias.ndim() != 1 {
            return Err(SondeoError::ShapeMismatch {
                operation: "bias_add",
                lhs: self.shape().to_vec(),
                rhs: bias.shape().to_vec(),
                detail: "bias must have rank 1".to_string(),
            });
        }
        let cols = bias.shape()[0];
        let last = *self.shape().last().expect("rank checked above");
        if cols != last {
            return Err(SondeoError::ShapeMismatch {
                operation: "bias_add",
                lhs: self.shape().to_vec(),
                rhs: bias.shape().to_vec(),
                detail: format!("bias length {cols} must match last dimension {last}"),
            });
        }

        let mut data = self.data().to_vec();
        if cols > 0 {
            for (i, v) in data.iter_mut().enumerate() {
                *v += bias.data()[i % cols];
            }
        }

        let mut result = Tensor::new(&data, self.shape());

        if is_grad_enabled() && (self.requires_grad_enabled() || bias.requires_grad_enabled()) {
            result.requires_grad_(true);
            let grad_fn = Arc::new(BiasAddBackward {
                value_shape: self.shape().to_vec(),
                bias_len: cols,
            });
            result.set_grad_fn(grad_fn.clone());

            with_graph(|graph| {
                graph.register_tensor(self.clone());
                graph.register_tensor(bias.clone());
                graph.record(result.id(), grad_fn, vec![self.id(), bias.id()]);
            });
        }

        Ok(result)
    }

    /// Matrix multiplication: z = self @ other.
    ///
    /// Supports rank-2 x rank-2, plus batch-broadcast combinations where
    /// either operand is rank 3; a rank-2 operand is reused across the
    /// other's batch dimension. Inner dimensions must agree, and rank-3 x
    /// rank-3 requires equal batch sizes.
    ///
    /// # Errors
    ///
    /// Returns [`SondeoError::ShapeMismatch`] for unsupported ranks or
    /// disagreeing dimensions, and [`SondeoError::ComputationFailure`] if
    /// the underlying kernel rejects the multiply.
    pub fn matmul(&self, other: &Tensor) -> Result<Tensor> {
        let mismatch = |detail: String| SondeoError::ShapeMismatch {
            operation: "matmul",
            lhs: self.shape().to_vec(),
            rhs: other.shape().to_vec(),
            detail,
        };

        let (data, out_shape) = match (self.ndim(), other.ndim()) {
            (2, 2) => {
                let (m, k) = (self.shape()[0], self.shape()[1]);
                let (k2, n) = (other.shape()[0], other.shape()[1]);
                if k != k2 {
                    return Err(mismatch(format!(
                        "inner dimensions {k} and {k2} must match"
                    )));
                }
                (matmul_2d(self.data(), m, k, other.data(), n)?, vec![m, n])
            }
            (2, 3) => {
                let (m, k) = (self.shape()[0], self.shape()[1]);
                let (batch, k2, n) = (other.shape()[0], other.shape()[1], other.shape()[2]);
                if k != k2 {
                    return Err(mismatch(format!(
                        "inner dimensions {k} and {k2} must match"
                    )));
                }
                let mut out = vec![0.0f32; batch * m * n];
                for bi in 0..batch {
                    let rhs = &other.data()[bi * k * n..(bi + 1) * k * n];
                    let z = matmul_2d(self.data(), m, k, rhs, n)?;
                    out[bi * m * n..(bi + 1) * m * n].copy_from_slice(&z);
                }
                (out, vec![batch, m, n])
            }
            (3, 2) => {
                let (batch, m, k) = (self.shape()[0], self.shape()[1], self.shape()[2]);
                let (k2, n) = (other.shape()[0], other.shape()[1]);
                if k != k2 {
                    return Err(mismatch(format!(
                        "inner dimensions {k} and {k2} must match"
                    )));
                }
                let mut out = vec![0.0f32; batch * m * n];
                for bi in 0..batch {
                    let lhs = &self.data()[bi * m * k..(bi + 1) * m * k];
                    let z = matmul_2d(lhs, m, k, other.data(), n)?;
                    out[bi * m * n..(bi + 1) * m * n].copy_from_slice(&z);
                }
                (out, vec![batch, m, n])
            }
            (3, 3) => {
                let (batch, m, k) = (self.shape()[0], self.shape()[1], self.shape()[2]);
                let (batch2, k2, n) = (other.shape()[0], other.shape()[1], other.shape()[2]);
                if batch != batch2 {
                    return Err(mismatch(format!(
                        "batch dimensions {batch} and {batch2} must match"
                    )));
                }
                if k != k2 {
                    return Err(mismatch(format!(
                        "inner dimensions {k} and {k2} must match"
                    )));
                }
                let out =
                    trueno::Matrix::batched_matmul(self.data(), other.data(), batch, m, k, n)?;
                (out, vec![batch, m, n])
            }
            _ => {
                return Err(mismatch(
                    "operands must have rank 2 or rank 3".to_string(),
                ))
            }
        };

        let mut result = Tensor::new(&data, &out_shape);

        if is_grad_enabled() && (self.requires_grad_enabled() || other.requires_grad_enabled()) {
            result.requires_grad_(true);
            let grad_fn = Arc::new(MatmulBackward {
                lhs: self.clone(),
                rhs: other.clone(),
            });
            result.set_grad_fn(grad_fn.clone());

            with_graph(|graph| {
                graph.register_tensor(self.clone());
                graph.register_tensor(other.clone());
                graph.record(result.id(), grad_fn, vec![self.id(), other.id()]);
            });
        }

        Ok(result)
    }

    /// Sum all elements into a one-element tensor: z = sum(self).
    ///
    /// The sum of an empty tensor is 0.
    #[must_use]
    pub fn sum(&self) -> Tensor {
        let total: f32 = self.data().iter().sum();
        let mut result = Tensor::new(&[total], &[1]);

        if is_grad_enabled() && self.requires_grad_enabled() {
            result.requires_grad_(true);
            let grad_fn = Arc::new(SumBackward {
                input_shape: self.shape().to_vec(),
            });
            result.set_grad_fn(grad_fn.clone());

            with_graph(|graph| {
                graph.register_tensor(self.clone());
                graph.record(result.id(), grad_fn, vec![self.id()]);
            });
        }

        result
    }
}

/// Row-major 2-D matmul via trueno: (m,k) @ (k,n) -> (m,n).
pub(crate) fn matmul_2d(lhs: &[f32], m: usize, k: usize, rhs: &[f32], n: usize) -> Result<Vec<f32>> {
    let a = trueno::Matrix::from_vec(m, k, lhs.to_vec())?;
    let b = trueno::Matrix::from_vec(k, n, rhs.to_vec())?;
    let z = a.matmul(&b)?;
    Ok(z.as_slice().to_vec())
}

/// Row-major 2-D transpose: (rows,cols) -> (cols,rows).
pub(crate) fn transpose_2d(data: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = data[i * cols + j];
        }
    }
    out
}
