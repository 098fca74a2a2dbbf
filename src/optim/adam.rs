//! Adam update rule
//!
//! Weight decay is added into the gradient before the moment updates (L2
//! regularization form, unlike SGD's multiplicative shrink), and no bias
//! correction is applied to the moment estimates. Both are load-bearing
//! numeric choices: changing either changes trained results, so they are
//! part of the rule's contract rather than something to "fix".
//!
//! Storage routing mirrors SGD, with one difference: mean/var storage kinds
//! must match the weight's, and a mismatch is fatal. Adam has no densify
//! fallback path.

use super::params::AdamParams;
use super::{
    check_dense_operand, check_sparse_grad, check_weight_rows, clip, reject_sparse_out,
    resolve_dense_out, store, RawView, RawViewMut, WriteMode,
};
use crate::dtype::{Element, Real, RowIndex};
use crate::error::{Error, Result};
use crate::runtime::Launcher;
use crate::tensor::{DenseTensor, RowSparseTensor, TensorArg, TensorArgMut};
use crate::{dispatch_index_dtype, dispatch_real_dtype};

/// One Adam element; returns `(next_mean, next_var, next_weight)`.
#[inline]
#[allow(clippy::too_many_arguments)]
fn adam_step<T: Real>(
    w: T,
    g: T,
    mean: T,
    var: T,
    lr: T,
    beta1: T,
    beta2: T,
    epsilon: T,
    wd: T,
    rescale_grad: T,
    clip_gradient: T,
) -> (T, T, T) {
    let one = T::one();
    let grad_rescaled = rescale_grad * g + wd * w;
    let (next_mean, next_var) = if clip_gradient >= T::zero() {
        let c = clip(grad_rescaled, clip_gradient);
        (
            beta1 * mean + (one - beta1) * c,
            beta2 * var + (one - beta2) * (c * c),
        )
    } else {
        (
            beta1 * mean + (one - beta1) * grad_rescaled,
            beta2 * var + (one - beta2) * grad_rescaled * grad_rescaled,
        )
    };
    let next_w = w - lr * next_mean / (next_var.sqrt() + epsilon);
    (next_mean, next_var, next_w)
}

// ============================================================================
// Dense driver
// ============================================================================

#[allow(clippy::too_many_arguments)]
pub(super) fn update_dense(
    client: &impl Launcher,
    weight: &mut DenseTensor,
    grad: &DenseTensor,
    mean: &mut DenseTensor,
    var: &mut DenseTensor,
    out: Option<&mut DenseTensor>,
    params: &AdamParams,
    mode: WriteMode,
) -> Result<()> {
    if weight.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "weight" });
    }
    check_dense_operand(weight, grad)?;
    check_dense_operand(weight, mean)?;
    check_dense_operand(weight, var)?;
    let out = resolve_dense_out(weight, out, mode)?;
    let n = weight.numel();
    dispatch_real_dtype!(weight.dtype(), T => {
        let lr = T::from_f32(params.lr);
        let beta1 = T::from_f32(params.beta1);
        let beta2 = T::from_f32(params.beta2);
        let epsilon = T::from_f32(params.epsilon);
        let wd = T::from_f32(params.wd);
        let rescale_grad = T::from_f32(params.rescale_grad);
        let clip_gradient = T::from_f32(params.clip_gradient);
        let g = RawView::new(grad.as_slice::<T>()?);
        let mn = RawViewMut::new(mean.as_mut_slice::<T>()?);
        let vr = RawViewMut::new(var.as_mut_slice::<T>()?);
        let w_out = RawViewMut::new(weight.as_mut_slice::<T>()?);
        let o = match out {
            Some(o) => RawViewMut::new(o.as_mut_slice::<T>()?),
            None => w_out,
        };
        let w = w_out.as_const();
        client.for_each(n, move |i| unsafe {
            let (next_mean, next_var, value) = adam_step(
                w.get(i), g.get(i), mn.get(i), vr.get(i),
                lr, beta1, beta2, epsilon, wd, rescale_grad, clip_gradient,
            );
            *mn.slot(i) = next_mean;
            *vr.slot(i) = next_var;
            store(mode, o.slot(i), value);
        });
        Ok(())
    }, "adam_update")
}

// ============================================================================
// Sparse drivers
// ============================================================================

/// Row-sparse gradient against dense-addressed weight/mean/var buffers.
/// For each listed gradient row the moments and weight update across the
/// whole row; unlisted rows keep weight and moments untouched.
#[allow(clippy::too_many_arguments)]
pub(super) fn update_dns_rsp(
    client: &impl Launcher,
    weight: &mut DenseTensor,
    grad: &RowSparseTensor,
    mean: &mut DenseTensor,
    var: &mut DenseTensor,
    params: &AdamParams,
    mode: WriteMode,
) -> Result<()> {
    if !grad.is_initialized() || mode == WriteMode::Skip {
        return Ok(());
    }
    if mode != WriteMode::InPlace {
        return Err(Error::WriteModeMismatch {
            op: "adam_update",
            expected: WriteMode::InPlace,
            got: mode,
        });
    }
    if weight.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "weight" });
    }
    if mean.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "mean" });
    }
    if var.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "var" });
    }
    check_dense_operand(weight, mean)?;
    check_dense_operand(weight, var)?;
    check_sparse_grad(weight.rows(), weight.row_length(), weight.dtype(), grad)?;
    let row_length = weight.row_length();
    let num_rows = grad.num_sparse_rows();
    dispatch_real_dtype!(weight.dtype(), T => {
        dispatch_index_dtype!(grad.index_dtype(), I => {
            let lr = T::from_f32(params.lr);
            let beta1 = T::from_f32(params.beta1);
            let beta2 = T::from_f32(params.beta2);
            let epsilon = T::from_f32(params.epsilon);
            let wd = T::from_f32(params.wd);
            let rescale_grad = T::from_f32(params.rescale_grad);
            let clip_gradient = T::from_f32(params.clip_gradient);
            let idx = RawView::new(grad.indices().as_slice::<I>()?);
            let gv = RawView::new(grad.values().as_slice::<T>()?);
            let mn = RawViewMut::new(mean.as_mut_slice::<T>()?);
            let vr = RawViewMut::new(var.as_mut_slice::<T>()?);
            let w_out = RawViewMut::new(weight.as_mut_slice::<T>()?);
            let w = w_out.as_const();
            client.for_each(num_rows, move |i| unsafe {
                let row_offset = idx.get(i).to_usize() * row_length;
                for j in 0..row_length {
                    let data_i = row_offset + j;
                    let grad_i = i * row_length + j;
                    let (next_mean, next_var, value) = adam_step(
                        w.get(data_i), gv.get(grad_i), mn.get(data_i), vr.get(data_i),
                        lr, beta1, beta2, epsilon, wd, rescale_grad, clip_gradient,
                    );
                    *mn.slot(data_i) = next_mean;
                    *vr.slot(data_i) = next_var;
                    store(WriteMode::InPlace, w_out.slot(data_i), value);
                }
            });
            Ok(())
        }, "adam_update")
    }, "adam_update")
}

/// Row-sparse weight/mean/var against a dense gradient, skipping rows whose
/// gradient is entirely zero.
#[allow(clippy::too_many_arguments)]
pub(super) fn update_rsp_dns(
    client: &impl Launcher,
    weight: &mut RowSparseTensor,
    grad: &DenseTensor,
    mean: &mut RowSparseTensor,
    var: &mut RowSparseTensor,
    params: &AdamParams,
    mode: WriteMode,
) -> Result<()> {
    check_weight_rows(weight)?;
    if mode == WriteMode::Skip {
        return Ok(());
    }
    if mode != WriteMode::InPlace {
        return Err(Error::WriteModeMismatch {
            op: "adam_update",
            expected: WriteMode::InPlace,
            got: mode,
        });
    }
    if !weight.is_initialized() {
        return Err(Error::EmptyTensor { arg: "weight" });
    }
    if grad.dtype() != weight.dtype() {
        return Err(Error::DTypeMismatch {
            lhs: weight.dtype(),
            rhs: grad.dtype(),
        });
    }
    if grad.rows() != weight.rows() || grad.row_length() != weight.row_length() {
        return Err(Error::ShapeMismatch {
            expected: weight.shape().to_vec(),
            got: grad.shape().to_vec(),
        });
    }
    if !mean.is_initialized() {
        mean.fill_zero_rows_like(weight)?;
    }
    if !var.is_initialized() {
        var.fill_zero_rows_like(weight)?;
    }
    for state in [&*mean, &*var] {
        if state.dtype() != weight.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: weight.dtype(),
                rhs: state.dtype(),
            });
        }
        if state.num_sparse_rows() != weight.num_sparse_rows()
            || state.row_length() != weight.row_length()
        {
            return Err(Error::ShapeMismatch {
                expected: weight.shape().to_vec(),
                got: state.shape().to_vec(),
            });
        }
    }
    let num_rows = weight.num_sparse_rows();
    let num_cols = weight.row_length();
    dispatch_real_dtype!(weight.dtype(), T => {
        let lr = T::from_f32(params.lr);
        let beta1 = T::from_f32(params.beta1);
        let beta2 = T::from_f32(params.beta2);
        let epsilon = T::from_f32(params.epsilon);
        let wd = T::from_f32(params.wd);
        let rescale_grad = T::from_f32(params.rescale_grad);
        let clip_gradient = T::from_f32(params.clip_gradient);
        let g = RawView::new(grad.as_slice::<T>()?);
        let mn = RawViewMut::new(mean.values_mut().as_mut_slice::<T>()?);
        let vr = RawViewMut::new(var.values_mut().as_mut_slice::<T>()?);
        let w_out = RawViewMut::new(weight.values_mut().as_mut_slice::<T>()?);
        let w = w_out.as_const();
        client.for_each(num_rows, move |i| unsafe {
            let offset = i * num_cols;
            let mut contains_non_zeros = false;
            for j in 0..num_cols {
                if g.get(offset + j) != T::zero() {
                    contains_non_zeros = true;
                    break;
                }
            }
            if !contains_non_zeros {
                return;
            }
            for j in 0..num_cols {
                let index = offset + j;
                let (next_mean, next_var, value) = adam_step(
                    w.get(index), g.get(index), mn.get(index), vr.get(index),
                    lr, beta1, beta2, epsilon, wd, rescale_grad, clip_gradient,
                );
                *mn.slot(index) = next_mean;
                *vr.slot(index) = next_var;
                store(WriteMode::InPlace, w_out.slot(index), value);
            }
        });
        Ok(())
    }, "adam_update")
}

/// Row-sparse everything: lazily materialize mean/var on the weight's row
/// structure, then run the dense-addressed row kernel on the value buffers.
#[allow(clippy::too_many_arguments)]
pub(super) fn update_rsp_rsp(
    client: &impl Launcher,
    weight: &mut RowSparseTensor,
    grad: &RowSparseTensor,
    mean: &mut RowSparseTensor,
    var: &mut RowSparseTensor,
    params: &AdamParams,
    mode: WriteMode,
) -> Result<()> {
    check_weight_rows(weight)?;
    if !mean.is_initialized() {
        mean.fill_zero_rows_like(weight)?;
    }
    if !var.is_initialized() {
        var.fill_zero_rows_like(weight)?;
    }
    update_dns_rsp(
        client,
        weight.values_mut(),
        grad,
        mean.values_mut(),
        var.values_mut(),
        params,
        mode,
    )
}

// ============================================================================
// Dispatch entry point
// ============================================================================

#[allow(clippy::too_many_arguments)]
pub(super) fn update_any(
    client: &impl Launcher,
    weight: TensorArgMut<'_>,
    grad: TensorArg<'_>,
    mean: TensorArgMut<'_>,
    var: TensorArgMut<'_>,
    out: Option<&mut DenseTensor>,
    params: &AdamParams,
    mode: WriteMode,
) -> Result<()> {
    // mean/var must live in the same storage as the weight; unlike the SGD
    // family there is no densify recovery for Adam
    let weight_kind = weight.storage_kind();
    if mean.storage_kind() != weight_kind {
        return Err(Error::StorageMismatch {
            arg: "mean",
            expected: weight_kind,
            got: mean.storage_kind(),
        });
    }
    if var.storage_kind() != weight_kind {
        return Err(Error::StorageMismatch {
            arg: "var",
            expected: weight_kind,
            got: var.storage_kind(),
        });
    }
    match (weight, grad, mean, var) {
        (
            TensorArgMut::Dense(w),
            TensorArg::Dense(g),
            TensorArgMut::Dense(mn),
            TensorArgMut::Dense(vr),
        ) => update_dense(client, w, g, mn, vr, out, params, mode),
        (
            TensorArgMut::RowSparse(w),
            TensorArg::RowSparse(g),
            TensorArgMut::RowSparse(mn),
            TensorArgMut::RowSparse(vr),
        ) => {
            reject_sparse_out(&out, mode)?;
            update_rsp_rsp(client, w, g, mn, vr, params, mode)
        }
        (
            TensorArgMut::RowSparse(w),
            TensorArg::Dense(g),
            TensorArgMut::RowSparse(mn),
            TensorArgMut::RowSparse(vr),
        ) => {
            reject_sparse_out(&out, mode)?;
            update_rsp_dns(client, w, g, mn, vr, params, mode)
        }
        (
            TensorArgMut::Dense(w),
            TensorArg::RowSparse(g),
            TensorArgMut::Dense(mn),
            TensorArgMut::Dense(vr),
        ) => {
            reject_sparse_out(&out, mode)?;
            update_dns_rsp(client, w, g, mn, vr, params, mode)
        }
        (weight, grad, _, _) => Err(Error::UnsupportedStorage {
            op: "adam_update",
            weight: weight.storage_kind(),
            grad: grad.storage_kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adam_step_uncorrected_moments() {
        // beta1=0.9, beta2=0.999: first step from zero state keeps the
        // uncorrected magnitudes 0.1*g and 0.001*g^2
        let (mean, var, w) = adam_step(
            0.0f64, 1.0, 0.0, 0.0, 0.001, 0.9, 0.999, 1e-8, 0.0, 1.0, -1.0,
        );
        assert!((mean - 0.1).abs() < 1e-12);
        assert!((var - 0.001).abs() < 1e-12);
        let expected = -0.001 * 0.1 / (0.001f64.sqrt() + 1e-8);
        assert!((w - expected).abs() < 1e-12);
    }

    #[test]
    fn test_adam_step_decay_adds_into_gradient() {
        // wd folds additively: grad' = g + wd*w
        let (mean, _, _) = adam_step(
            2.0f64, 0.0, 0.0, 0.0, 0.001, 0.9, 0.999, 1e-8, 0.5, 1.0, -1.0,
        );
        assert!((mean - 0.1).abs() < 1e-12);
    }
}
