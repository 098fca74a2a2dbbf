//! Common test utilities
#![allow(dead_code)]

use optimr::prelude::*;

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuClient::new(device.clone());
    (client, device)
}

/// Assert two f32 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Dense f32 tensor from data with a flat shape
pub fn dense_f32(data: &[f32]) -> DenseTensor {
    DenseTensor::from_slice(data, &[data.len()]).unwrap()
}

/// Dense f32 matrix
pub fn dense_f32_2d(data: &[f32], rows: usize, cols: usize) -> DenseTensor {
    DenseTensor::from_slice(data, &[rows, cols]).unwrap()
}

/// Row-sparse f32 matrix with i64 indices
pub fn rowsparse_f32(shape: &[usize], indices: &[i64], values: &[f32]) -> RowSparseTensor {
    RowSparseTensor::from_slices::<f32, i64>(shape, indices, values).unwrap()
}
