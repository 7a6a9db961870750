//! Gradient function trait and implementations.
//!
//! Each differentiable operation records a `GradFn` that knows how to map
//! the output gradient back onto the operation's inputs. Every
//! implementation here must tolerate zero-element gradients: the reduction
//! loops simply run zero iterations.

use super::ops::{matmul_2d, transpose_2d};
use super::tensor::Tensor;

/// Trait for functions that compute gradients during the backward pass.
///
/// Implementations capture whatever forward-pass context they need (input
/// shapes or the operand values themselves).
pub trait GradFn: Send + Sync {
    /// Compute gradients with respect to the operation's inputs.
    ///
    /// `grad_output` is the gradient flowing back from downstream. The
    /// returned vector holds one gradient per input, in forward-call
    /// order.
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor>;

    /// Human-readable name for debugging.
    fn name(&self) -> &'static str;
}

/// Gradient for bias addition: z[..., j] = x[..., j] + b[j].
pub(crate) struct BiasAddBackward {
    pub(crate) value_shape: Vec<usize>,
    pub(crate) bias_len: usize,
}

impl GradFn for BiasAddBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // dz/dx = 1 elementwise; dz/db sums over all leading axes.
        let grad_value = Tensor::new(grad_output.data(), &self.value_shape);

        let cols = self.bias_len;
        let mut grad_bias = vec![0.0f32; cols];
        if cols > 0 {
            for row in grad_output.data().chunks_exact(cols) {
                for (j, g) in row.iter().enumerate() {
                    grad_bias[j] += g;
                }
            }
        }

        vec![grad_value, Tensor::new(&grad_bias, &[cols])]
    }

    fn name(&self) -> &'static str {
        "BiasAddBackward"
    }
}

/// Gradient for matrix multiplication: z = x @ y.
///
/// Captures both operands; which batch layout applies is recovered from
/// their ranks, mirroring the forward dispatch. A rank-2 operand that was
/// broadcast across the batch dimension receives the sum of its per-batch
/// gradients.
pub(crate) struct MatmulBackward {
    pub(crate) lhs: Tensor,
    pub(crate) rhs: Tensor,
}

impl GradFn for MatmulBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        let l = self.lhs.shape();
        let r = self.rhs.shape();
        let a = self.lhs.data();
        let b = self.rhs.data();
        let g = grad_output.data();

        match (l.len(), r.len()) {
            (2, 2) => {
                let (m, k) = (l[0], l[1]);
                let n = r[1];
                // dx = dz @ y^T, dy = x^T @ dz
                let grad_lhs = matmul_2d(g, m, n, &transpose_2d(b, k, n), k)
                    .expect("operand shapes validated during forward");
                let grad_rhs = matmul_2d(&transpose_2d(a, m, k), k, m, g, n)
                    .expect("operand shapes validated during forward");
                vec![
                    Tensor::new(&grad_lhs, &[m, k]),
                    Tensor::new(&grad_rhs, &[k, n]),
                ]
            }
            (2, 3) => {
                // x (m,k) broadcast across y's batch dimension.
                let (m, k) = (l[0], l[1]);
                let (batch, n) = (r[0], r[2]);
                let mut grad_lhs = vec![0.0f32; m * k];
                let mut grad_rhs = vec![0.0f32; batch * k * n];
                for bi in 0..batch {
                    let gz = &g[bi * m * n..(bi + 1) * m * n];
                    let yb = &b[bi * k * n..(bi + 1) * k * n];
                    let da = matmul_2d(gz, m, n, &transpose_2d(yb, k, n), k)
                        .expect("operand shapes validated during forward");
                    for (acc, v) in grad_lhs.iter_mut().zip(da) {
                        *acc += v;
                    }
                    let db = matmul_2d(&transpose_2d(a, m, k), k, m, gz, n)
                        .expect("operand shapes validated during forward");
                    grad_rhs[bi * k * n..(bi + 1) * k * n].copy_from_slice(&db);
                }
                vec![
                    Tensor::new(&grad_lhs, &[m, k]),
                    Tensor::new(&grad_rhs, &[batch, k, n]),
                ]
            }
            (3, 2) => {
                // y (k,n) broadcast across x's batch dimension.
                let (batch, m, k) = (l[0], l[1], l[2]);
                let n = r[1];
                let mut grad_lhs = vec![0.0f32; batch * m * k];
                let mut grad_rhs = vec![0.0f32; k * n];
                let bt = transpose_2d(b, k, n);
                for bi in 0..batch {
                    let gz = &g[bi * m * n..(bi + 1) * m * n];
                    let xb = &a[bi * m * k..(bi + 1) * m * k];
                    let da = matmul_2d(gz, m, n, &bt, k)
                        .expect("operand shapes validated during forward");
                    grad_lhs[bi * m * k..(bi + 1) * m * k].copy_from_slice(&da);
                    let db = matmul_2d(&transpose_2d(xb, m, k), k, m, gz, n)
                        .expect("operand shapes validated during forward");
                    for (acc, v) in grad_rhs.iter_mut().zip(db) {
                        *acc += v;
                    }
                }
                vec![
                    Tensor::new(&grad_lhs, &[batch, m, k]),
                    Tensor::new(&grad_rhs, &[k, n]),
                ]
            }
            (3, 3) => {
                let (batch, m, k) = (l[0], l[1], l[2]);
                let n = r[2];
                let mut grad_lhs = vec![0.0f32; batch * m * k];
                let mut grad_rhs = vec![0.0f32; batch * k * n];
                for bi in 0..batch {
                    let gz = &g[bi * m * n..(bi + 1) * m * n];
                    let xb = &a[bi * m * k..(bi + 1) * m * k];
                    let yb = &b[bi * k * n..(bi + 1) * k * n];
                    let da = matmul_2d(gz, m, n, &transpose_2d(yb, k, n), k)
                        .expect("operand shapes validated during forward");
                    grad_lhs[bi * m * k..(bi + 1) * m * k].copy_from_slice(&da);
                    let db = matmul_2d(&transpose_2d(xb, m, k), k, m, gz, n)
                        .expect("operand shapes validated during forward");
                    grad_rhs[bi * k * n..(bi + 1) * k * n].copy_from_slice(&db);
                }
                vec![
                    Tensor::new(&grad_lhs, &[batch, m, k]),
                    Tensor::new(&grad_rhs, &[batch, k, n]),
                ]
            }
            _ => unreachable!("matmul forward accepts rank-2 and rank-3 operands only"),
        }
    }

    fn name(&self) -> &'static str {
        "MatmulBackward"
    }
}

/// Gradient for the scalar sum reduction: z = sum(x).
pub(crate) struct SumBackward {
    pub(crate) input_shape: Vec<usize>,
}

impl GradFn for SumBackward {
    fn backward(&self, grad_output: &Tensor) -> Vec<Tensor> {
        // dz/dx_i = 1 for all i; broadcast the scalar seed to the input
        // shape. An empty input gets an empty gradient.
        let g = grad_output.item();
        let numel: usize = self.input_shape.iter().product();
        vec![Tensor::new(&vec![g; numel], &self.input_shape)]
    }

    fn name(&self) -> &'static str {
        "SumBackward"
    }
}
