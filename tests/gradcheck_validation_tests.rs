//! Checker validation on non-degenerate inputs.
//!
//! Before trusting the empty-tensor probes' clean pass, establish that the
//! gradient checker can both accept correct gradients and reject wrong
//! ones on inputs that actually have elements.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sondeo::prelude::*;

fn random_tensor(rng: &mut StdRng, shape: &[usize]) -> Tensor {
    let numel: usize = shape.iter().product();
    let data: Vec<f32> = (0..numel).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Tensor::new(&data, shape)
}

#[test]
fn bias_add_gradient_checks_out() {
    let mut rng = StdRng::seed_from_u64(7);
    let value = random_tensor(&mut rng, &[4, 3]);
    let bias = random_tensor(&mut rng, &[3]);

    let report = check_gradient(
        |xs: &[Tensor]| xs[0].bias_add(&xs[1]),
        &[value, bias],
    )
    .expect("bias_add gradients agree");

    assert_eq!(report.jacobians[0].rows, 12);
    assert_eq!(report.jacobians[1].rows, 3);
    assert!(report.max_error <= report.tolerance);
}

#[test]
fn bias_add_rank3_gradient_checks_out() {
    let mut rng = StdRng::seed_from_u64(11);
    let value = random_tensor(&mut rng, &[2, 2, 3]);
    let bias = random_tensor(&mut rng, &[3]);

    check_gradient(|xs: &[Tensor]| xs[0].bias_add(&xs[1]), &[value, bias])
        .expect("rank-3 bias_add gradients agree");
}

#[test]
fn matmul_gradient_checks_out() {
    let mut rng = StdRng::seed_from_u64(13);
    let lhs = random_tensor(&mut rng, &[3, 4]);
    let rhs = random_tensor(&mut rng, &[4, 2]);

    let report = check_gradient(|xs: &[Tensor]| xs[0].matmul(&xs[1]), &[lhs, rhs])
        .expect("matmul gradients agree");
    assert_eq!(report.output_shape, vec![3, 2]);
}

#[test]
fn broadcast_matmul_gradient_checks_out() {
    // The same rank pairing as the degenerate probe, with real elements:
    // a rank-2 left operand broadcast across a rank-3 batch.
    let mut rng = StdRng::seed_from_u64(17);
    let lhs = random_tensor(&mut rng, &[3, 4]);
    let rhs = random_tensor(&mut rng, &[2, 4, 2]);

    let report = check_gradient(|xs: &[Tensor]| xs[0].matmul(&xs[1]), &[lhs, rhs])
        .expect("broadcast matmul gradients agree");
    assert_eq!(report.output_shape, vec![2, 3, 2]);
}

#[test]
fn batched_matmul_gradient_checks_out() {
    let mut rng = StdRng::seed_from_u64(19);
    let lhs = random_tensor(&mut rng, &[2, 3, 4]);
    let rhs = random_tensor(&mut rng, &[2, 4, 2]);

    check_gradient(|xs: &[Tensor]| xs[0].matmul(&xs[1]), &[lhs, rhs])
        .expect("batched matmul gradients agree");
}

#[test]
fn checker_rejects_a_severed_gradient() {
    // Detaching the bias inside the operation zeroes its analytic
    // gradient while the numeric estimate still sees slope one, so the
    // check must fail on input 1 and only input 1.
    let mut rng = StdRng::seed_from_u64(23);
    let value = random_tensor(&mut rng, &[2, 3]);
    let bias = random_tensor(&mut rng, &[3]);

    let err = check_gradient(
        |xs: &[Tensor]| xs[0].bias_add(&xs[1].detach()),
        &[value, bias],
    )
    .expect_err("severed bias gradient must be caught");

    match err {
        SondeoError::GradientMismatch { input, .. } => assert_eq!(input, 1),
        other => panic!("expected GradientMismatch, got {other}"),
    }
}

#[test]
fn checker_propagates_operation_errors() {
    let lhs = Tensor::zeros(&[2, 3]);
    let rhs = Tensor::zeros(&[5, 2]);

    let err = check_gradient(|xs: &[Tensor]| xs[0].matmul(&xs[1]), &[lhs, rhs])
        .expect_err("incompatible shapes must propagate");
    assert!(matches!(err, SondeoError::ShapeMismatch { .. }));
}

#[test]
fn arity_mismatch_is_an_invalid_argument() {
    let only_one = vec![Tensor::zeros(&[2, 2])];
    let err = check_gradient(
        |xs: &[Tensor]| Scenario::BiasAdd.apply(xs),
        &only_one,
    )
    .expect_err("one input for a two-input operation");
    assert!(matches!(err, SondeoError::InvalidArgument { .. }));
}
