//! Adam dense and row-sparse behavior

mod common;

use common::*;
use optimr::prelude::*;

#[test]
fn test_adam_first_step_scenario() {
    let (client, _) = create_cpu_client();
    let mut weight = dense_f32(&[0.0]);
    let grad = dense_f32(&[1.0]);
    let mut mean = dense_f32(&[0.0]);
    let mut var = dense_f32(&[0.0]);

    client
        .adam_update(
            &mut weight,
            &grad,
            &mut mean,
            &mut var,
            None,
            &AdamParams::new(0.001),
            WriteMode::InPlace,
        )
        .unwrap();

    // uncorrected moments: mean = 0.1, var = 0.001
    assert_allclose_f32(&mean.to_vec::<f32>().unwrap(), &[0.1], 1e-4, 0.0, "mean");
    assert_allclose_f32(&var.to_vec::<f32>().unwrap(), &[0.001], 1e-4, 0.0, "var");
    // out = -0.001*0.1/(sqrt(0.001)+1e-8)
    assert_allclose_f32(
        &weight.to_vec::<f32>().unwrap(),
        &[-0.003162277],
        1e-4,
        1e-6,
        "adam step",
    );
}

#[test]
fn test_adam_moments_are_not_bias_corrected() {
    // a bias-corrected first step from zero state would move the weight by
    // roughly lr; the uncorrected form moves it by ~lr*0.1/sqrt(0.001)
    let (client, _) = create_cpu_client();
    let mut weight = DenseTensor::from_slice(&[0.0f64], &[1]).unwrap();
    let grad = DenseTensor::from_slice(&[1.0f64], &[1]).unwrap();
    let mut mean = DenseTensor::zeros(&[1], DType::F64);
    let mut var = DenseTensor::zeros(&[1], DType::F64);
    let params = AdamParams::new(0.001);

    client
        .adam_update(&mut weight, &grad, &mut mean, &mut var, None, &params, WriteMode::InPlace)
        .unwrap();

    // expectation computed with the f32-cast coefficients the kernel uses
    let beta1 = 0.9f32 as f64;
    let beta2 = 0.999f32 as f64;
    let lr = 0.001f32 as f64;
    let eps = 1e-8f32 as f64;
    let m = (1.0 - beta1) * 1.0;
    let v = (1.0 - beta2) * 1.0;
    let expected = 0.0 - lr * m / (v.sqrt() + eps);
    assert_allclose_f64(
        &weight.to_vec::<f64>().unwrap(),
        &[expected],
        1e-12,
        0.0,
        "uncorrected adam",
    );
}

#[test]
fn test_adam_weight_decay_is_additive() {
    let (client, _) = create_cpu_client();
    let mut weight = DenseTensor::from_slice(&[2.0f64], &[1]).unwrap();
    let grad = DenseTensor::from_slice(&[0.0f64], &[1]).unwrap();
    let mut mean = DenseTensor::zeros(&[1], DType::F64);
    let mut var = DenseTensor::zeros(&[1], DType::F64);
    let params = AdamParams::new(0.001).with_wd(0.5);

    client
        .adam_update(&mut weight, &grad, &mut mean, &mut var, None, &params, WriteMode::InPlace)
        .unwrap();

    // grad' = 0 + wd*w = 1.0, so mean = (1-beta1)*1.0
    let beta1 = 0.9f32 as f64;
    let wd = 0.5f32 as f64;
    let expected_mean = (1.0 - beta1) * (wd * 2.0);
    assert_allclose_f64(
        &mean.to_vec::<f64>().unwrap(),
        &[expected_mean],
        1e-12,
        0.0,
        "additive decay mean",
    );
}

#[test]
fn test_adam_clip_applies_after_rescale_and_decay() {
    let (client, _) = create_cpu_client();
    let mut weight = DenseTensor::from_slice(&[0.0f64], &[1]).unwrap();
    let grad = DenseTensor::from_slice(&[100.0f64], &[1]).unwrap();
    let mut mean = DenseTensor::zeros(&[1], DType::F64);
    let mut var = DenseTensor::zeros(&[1], DType::F64);
    let params = AdamParams::new(0.001).with_clip_gradient(1.0);

    client
        .adam_update(&mut weight, &grad, &mut mean, &mut var, None, &params, WriteMode::InPlace)
        .unwrap();

    let beta1 = 0.9f32 as f64;
    let expected_mean = (1.0 - beta1) * 1.0;
    assert_allclose_f64(
        &mean.to_vec::<f64>().unwrap(),
        &[expected_mean],
        1e-12,
        0.0,
        "clipped mean",
    );
}

#[test]
fn test_adam_skip_advances_moments_only() {
    let (client, _) = create_cpu_client();
    let mut weight = dense_f32(&[1.0]);
    let grad = dense_f32(&[1.0]);
    let mut mean = dense_f32(&[0.0]);
    let mut var = dense_f32(&[0.0]);

    client
        .adam_update(
            &mut weight,
            &grad,
            &mut mean,
            &mut var,
            None,
            &AdamParams::new(0.001),
            WriteMode::Skip,
        )
        .unwrap();

    assert_eq!(weight.to_vec::<f32>().unwrap(), vec![1.0]);
    assert!(mean.to_vec::<f32>().unwrap()[0] > 0.0);
    assert!(var.to_vec::<f32>().unwrap()[0] > 0.0);
}

#[test]
fn test_adam_sparse_grad_touches_only_listed_rows() {
    let (client, _) = create_cpu_client();
    let w_data = [1.0f32, 2.0, 3.0, 4.0];
    let mut weight = dense_f32_2d(&w_data, 2, 2);
    let mut mean = DenseTensor::zeros(&[2, 2], DType::F32);
    let mut var = DenseTensor::zeros(&[2, 2], DType::F32);
    let grad = rowsparse_f32(&[2, 2], &[1], &[1.0, 1.0]);
    let params = AdamParams::new(0.001).with_wd(0.5);

    client
        .adam_update_any(
            TensorArgMut::Dense(&mut weight),
            TensorArg::RowSparse(&grad),
            TensorArgMut::Dense(&mut mean),
            TensorArgMut::Dense(&mut var),
            None,
            &params,
            WriteMode::InPlace,
        )
        .unwrap();

    let got_w = weight.to_vec::<f32>().unwrap();
    let got_mean = mean.to_vec::<f32>().unwrap();
    let got_var = var.to_vec::<f32>().unwrap();
    // row 0 untouched, moments included: no decay on absent rows
    assert_eq!(&got_w[0..2], &w_data[0..2]);
    assert_eq!(&got_mean[0..2], &[0.0, 0.0]);
    assert_eq!(&got_var[0..2], &[0.0, 0.0]);
    // row 1 moved against the gradient (+ decay pushes the same way for
    // positive weights)
    assert!(got_w[2] < w_data[2]);
    assert!(got_w[3] < w_data[3]);
    assert!(got_mean[2] > 0.0 && got_var[2] > 0.0);
}

#[test]
fn test_adam_all_sparse_matches_dense_addressed_run() {
    let (client, _) = create_cpu_client();
    let w_data = [1.0f32, 2.0, 3.0, 4.0];
    let mut sparse_weight = rowsparse_f32(&[2, 2], &[0, 1], &w_data);
    let mut sparse_mean = RowSparseTensor::uninitialized(&[2, 2], DType::F32, DType::I64);
    let mut sparse_var = RowSparseTensor::uninitialized(&[2, 2], DType::F32, DType::I64);
    let grad = rowsparse_f32(&[2, 2], &[0], &[0.5, -0.5]);

    let mut dense_weight = dense_f32_2d(&w_data, 2, 2);
    let mut dense_mean = DenseTensor::zeros(&[2, 2], DType::F32);
    let mut dense_var = DenseTensor::zeros(&[2, 2], DType::F32);

    let params = AdamParams::new(0.01);

    client
        .adam_update_any(
            TensorArgMut::RowSparse(&mut sparse_weight),
            TensorArg::RowSparse(&grad),
            TensorArgMut::RowSparse(&mut sparse_mean),
            TensorArgMut::RowSparse(&mut sparse_var),
            None,
            &params,
            WriteMode::InPlace,
        )
        .unwrap();
    client
        .adam_update_any(
            TensorArgMut::Dense(&mut dense_weight),
            TensorArg::RowSparse(&grad),
            TensorArgMut::Dense(&mut dense_mean),
            TensorArgMut::Dense(&mut dense_var),
            None,
            &params,
            WriteMode::InPlace,
        )
        .unwrap();

    // lazy mean/var materialized on the weight's rows
    assert!(sparse_mean.is_initialized());
    assert!(sparse_var.is_initialized());
    assert_eq!(
        sparse_weight.values().to_vec::<f32>().unwrap(),
        dense_weight.to_vec::<f32>().unwrap()
    );
    assert_eq!(
        sparse_mean.values().to_vec::<f32>().unwrap(),
        dense_mean.to_vec::<f32>().unwrap()
    );
}

#[test]
fn test_adam_sparse_weight_dense_grad_skips_zero_rows() {
    let (client, _) = create_cpu_client();
    let w_data = [1.0f32, 2.0, 3.0, 4.0];
    let mut weight = rowsparse_f32(&[2, 2], &[0, 1], &w_data);
    let mut mean = RowSparseTensor::uninitialized(&[2, 2], DType::F32, DType::I64);
    let mut var = RowSparseTensor::uninitialized(&[2, 2], DType::F32, DType::I64);
    // row 0 all-zero gradient
    let grad = dense_f32_2d(&[0.0, 0.0, 1.0, 1.0], 2, 2);
    let params = AdamParams::new(0.01).with_wd(0.5);

    client
        .adam_update_any(
            TensorArgMut::RowSparse(&mut weight),
            TensorArg::Dense(&grad),
            TensorArgMut::RowSparse(&mut mean),
            TensorArgMut::RowSparse(&mut var),
            None,
            &params,
            WriteMode::InPlace,
        )
        .unwrap();

    let got = weight.values().to_vec::<f32>().unwrap();
    assert_eq!(&got[0..2], &w_data[0..2]);
    assert!(got[2] < w_data[2]);
    // moments on the skipped row stay zero
    assert_eq!(&mean.values().to_vec::<f32>().unwrap()[0..2], &[0.0, 0.0]);
}

#[test]
fn test_adam_state_storage_mismatch_is_fatal() {
    let (client, _) = create_cpu_client();
    let mut weight = dense_f32(&[1.0]);
    let grad = dense_f32(&[0.5]);
    let mut mean = RowSparseTensor::uninitialized(&[1], DType::F32, DType::I64);
    let mut var = dense_f32(&[0.0]);

    let err = client
        .adam_update_any(
            TensorArgMut::Dense(&mut weight),
            TensorArg::Dense(&grad),
            TensorArgMut::RowSparse(&mut mean),
            TensorArgMut::Dense(&mut var),
            None,
            &AdamParams::new(0.001),
            WriteMode::InPlace,
        )
        .unwrap_err();

    assert!(matches!(
        err,
        Error::StorageMismatch {
            arg: "mean",
            expected: StorageKind::Dense,
            got: StorageKind::RowSparse,
        }
    ));
    // nothing moved
    assert_eq!(weight.to_vec::<f32>().unwrap(), vec![1.0]);
}

#[test]
fn test_adam_uninitialized_sparse_grad_is_noop() {
    let (client, _) = create_cpu_client();
    let mut weight = dense_f32_2d(&[1.0, 2.0], 1, 2);
    let mut mean = DenseTensor::zeros(&[1, 2], DType::F32);
    let mut var = DenseTensor::zeros(&[1, 2], DType::F32);
    let grad = RowSparseTensor::uninitialized(&[1, 2], DType::F32, DType::I64);

    client
        .adam_update_any(
            TensorArgMut::Dense(&mut weight),
            TensorArg::RowSparse(&grad),
            TensorArgMut::Dense(&mut mean),
            TensorArgMut::Dense(&mut var),
            None,
            &AdamParams::new(0.001),
            WriteMode::InPlace,
        )
        .unwrap();

    assert_eq!(weight.to_vec::<f32>().unwrap(), vec![1.0, 2.0]);
    assert_eq!(mean.to_vec::<f32>().unwrap(), vec![0.0, 0.0]);
}
