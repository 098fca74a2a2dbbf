//! Mixed-precision SGD: f32 master copy behind narrow weights
#![cfg(feature = "f16")]

mod common;

use common::*;
use half::f16;
use optimr::prelude::*;

fn dense_f16(data: &[f32]) -> DenseTensor {
    let half_data: Vec<f16> = data.iter().map(|&v| f16::from_f32(v)).collect();
    DenseTensor::from_slice(&half_data, &[half_data.len()]).unwrap()
}

#[test]
fn test_mp_sgd_updates_master_and_output() {
    let (client, _) = create_cpu_client();
    let mut weight = dense_f16(&[1.0]);
    let grad = dense_f16(&[0.5]);
    let mut weight32 = dense_f32(&[1.0]);

    client
        .mp_sgd_update(
            &mut weight,
            &grad,
            &mut weight32,
            None,
            &SgdParams::new(0.1),
            WriteMode::InPlace,
        )
        .unwrap();

    let master = weight32.to_vec::<f32>().unwrap();
    assert_allclose_f32(&master, &[0.95], 1e-6, 0.0, "master");
    // narrow output is the down-cast master value
    let narrow = weight.to_vec::<f16>().unwrap();
    assert_eq!(narrow[0], f16::from_f32(master[0]));
}

#[test]
fn test_mp_sgd_master_matches_full_precision_run() {
    // same scalar inputs: N mp steps on the master equal N f32 SGD steps
    let (client, _) = create_cpu_client();
    let params = SgdParams::new(0.05).with_wd(0.01);

    let mut weight = dense_f16(&[1.0, -0.5]);
    let grad = dense_f16(&[0.25, 0.125]);
    let mut weight32 = dense_f32(&[1.0, -0.5]);

    // reference run entirely at f32, with the same (exactly representable)
    // gradient values
    let mut reference = dense_f32(&[1.0, -0.5]);
    let ref_grad = dense_f32(&[0.25, 0.125]);

    for _ in 0..5 {
        client
            .mp_sgd_update(
                &mut weight,
                &grad,
                &mut weight32,
                None,
                &params,
                WriteMode::InPlace,
            )
            .unwrap();
        client
            .sgd_update(&mut reference, &ref_grad, None, &params, WriteMode::InPlace)
            .unwrap();
    }

    assert_eq!(
        weight32.to_vec::<f32>().unwrap(),
        reference.to_vec::<f32>().unwrap()
    );
    // and the narrow weights track the master within f16 rounding
    let narrow = weight.to_vec::<f16>().unwrap();
    for (w, m) in narrow.iter().zip(weight32.to_vec::<f32>().unwrap()) {
        assert_eq!(*w, f16::from_f32(m));
    }
}

#[test]
fn test_mp_sgd_zero_grad_fixed_point() {
    let (client, _) = create_cpu_client();
    let mut weight = dense_f16(&[0.75]);
    let grad = dense_f16(&[0.0]);
    let mut weight32 = dense_f32(&[0.75]);

    for _ in 0..3 {
        client
            .mp_sgd_update(
                &mut weight,
                &grad,
                &mut weight32,
                None,
                &SgdParams::new(0.1),
                WriteMode::InPlace,
            )
            .unwrap();
    }

    assert_eq!(weight32.to_vec::<f32>().unwrap(), vec![0.75]);
    assert_eq!(weight.to_vec::<f16>().unwrap(), vec![f16::from_f32(0.75)]);
}

#[test]
fn test_mp_sgd_skip_advances_master_only() {
    let (client, _) = create_cpu_client();
    let mut weight = dense_f16(&[1.0]);
    let grad = dense_f16(&[0.5]);
    let mut weight32 = dense_f32(&[1.0]);

    client
        .mp_sgd_update(
            &mut weight,
            &grad,
            &mut weight32,
            None,
            &SgdParams::new(0.1),
            WriteMode::Skip,
        )
        .unwrap();

    assert_allclose_f32(&weight32.to_vec::<f32>().unwrap(), &[0.95], 1e-6, 0.0, "master");
    assert_eq!(weight.to_vec::<f16>().unwrap(), vec![f16::from_f32(1.0)]);
}

#[test]
fn test_mp_sgd_mom_tracks_f32_momentum() {
    let (client, _) = create_cpu_client();
    let mut weight = dense_f16(&[1.0]);
    let grad = dense_f16(&[1.0]);
    let mut mom32 = dense_f32(&[0.0]);
    let mut weight32 = dense_f32(&[1.0]);
    let params = SgdMomParams::new(0.1).with_momentum(0.9);

    client
        .mp_sgd_mom_update(
            &mut weight,
            &grad,
            &mut mom32,
            &mut weight32,
            None,
            &params,
            WriteMode::InPlace,
        )
        .unwrap();
    client
        .mp_sgd_mom_update(
            &mut weight,
            &grad,
            &mut mom32,
            &mut weight32,
            None,
            &params,
            WriteMode::InPlace,
        )
        .unwrap();

    // f32 momentum: -0.1 then -0.19; master 0.9 then 0.71
    assert_allclose_f32(&mom32.to_vec::<f32>().unwrap(), &[-0.19], 1e-6, 0.0, "mom32");
    assert_allclose_f32(&weight32.to_vec::<f32>().unwrap(), &[0.71], 1e-6, 0.0, "master");
    assert_eq!(
        weight.to_vec::<f16>().unwrap(),
        vec![f16::from_f32(weight32.to_vec::<f32>().unwrap()[0])]
    );
}

#[test]
fn test_mp_sgd_master_must_be_f32() {
    let (client, _) = create_cpu_client();
    let mut weight = dense_f16(&[1.0]);
    let grad = dense_f16(&[0.5]);
    let mut weight32 = dense_f16(&[1.0]);

    let err = client
        .mp_sgd_update(
            &mut weight,
            &grad,
            &mut weight32,
            None,
            &SgdParams::new(0.1),
            WriteMode::InPlace,
        )
        .unwrap_err();
    assert!(matches!(err, Error::DTypeMismatch { .. }));
}

#[test]
fn test_mp_sgd_f32_weights_also_supported() {
    // the wide path works too: weight and master both f32
    let (client, _) = create_cpu_client();
    let mut weight = dense_f32(&[1.0]);
    let grad = dense_f32(&[0.5]);
    let mut weight32 = dense_f32(&[1.0]);

    client
        .mp_sgd_update(
            &mut weight,
            &grad,
            &mut weight32,
            None,
            &SgdParams::new(0.1),
            WriteMode::InPlace,
        )
        .unwrap();

    assert_allclose_f32(&weight.to_vec::<f32>().unwrap(), &[0.95], 1e-6, 0.0, "f32 mp");
}
