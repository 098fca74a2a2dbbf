//! SGD and SGD-momentum update rules
//!
//! Plain SGD applies weight decay as a multiplicative shrink of the weight;
//! the momentum variant folds decay into the momentum accumulator instead.
//! The two forms differ in long-run numeric behavior and are kept exactly
//! as-is.
//!
//! Both rules run over every dense/row-sparse storage combination:
//! element-wise on dense inputs, per-gradient-row when the gradient is
//! row-sparse (rows absent from the gradient are left untouched), and
//! per-weight-row with an all-zero row scan when the weight is row-sparse
//! and the gradient dense.

use super::fallback::DensifyFallback;
use super::params::{SgdMomParams, SgdParams};
use super::{
    check_dense_operand, check_sparse_grad, check_weight_rows, clip, reject_sparse_out,
    resolve_dense_out, store, RawView, RawViewMut, WriteMode,
};
use crate::dtype::{Element, Real, RowIndex};
use crate::error::{Error, Result};
use crate::runtime::Launcher;
use crate::tensor::{DenseTensor, RowSparseTensor, TensorArg, TensorArgMut};
use crate::{dispatch_index_dtype, dispatch_real_dtype};

/// One SGD element: `(1 - lr*wd)*w - lr*clip(rescale*g)`.
#[inline]
fn sgd_step<T: Real>(w: T, g: T, lr: T, wd: T, rescale_grad: T, clip_gradient: T) -> T {
    if clip_gradient >= T::zero() {
        (T::one() - lr * wd) * w - lr * clip(rescale_grad * g, clip_gradient)
    } else {
        (T::one() - lr * wd) * w - (lr * rescale_grad) * g
    }
}

/// One SGD-momentum element; returns `(next_mom, next_weight)`.
#[inline]
#[allow(clippy::too_many_arguments)]
fn sgd_mom_step<T: Real>(
    w: T,
    g: T,
    mom: T,
    lr: T,
    wd: T,
    momentum: T,
    rescale_grad: T,
    clip_gradient: T,
) -> (T, T) {
    let next = if clip_gradient >= T::zero() {
        momentum * mom - lr * wd * w - lr * clip(rescale_grad * g, clip_gradient)
    } else {
        momentum * mom - lr * wd * w - lr * rescale_grad * g
    };
    (next, w + next)
}

// ============================================================================
// Dense drivers
// ============================================================================

pub(super) fn update_dense(
    client: &impl Launcher,
    weight: &mut DenseTensor,
    grad: &DenseTensor,
    out: Option<&mut DenseTensor>,
    params: &SgdParams,
    mode: WriteMode,
) -> Result<()> {
    if weight.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "weight" });
    }
    check_dense_operand(weight, grad)?;
    let out = resolve_dense_out(weight, out, mode)?;
    if mode == WriteMode::Skip {
        return Ok(());
    }
    let n = weight.numel();
    dispatch_real_dtype!(weight.dtype(), T => {
        let lr = T::from_f32(params.lr);
        let wd = T::from_f32(params.wd);
        let rescale_grad = T::from_f32(params.rescale_grad);
        let clip_gradient = T::from_f32(params.clip_gradient);
        let g = RawView::new(grad.as_slice::<T>()?);
        let w_out = RawViewMut::new(weight.as_mut_slice::<T>()?);
        let o = match out {
            Some(o) => RawViewMut::new(o.as_mut_slice::<T>()?),
            None => w_out,
        };
        let w = w_out.as_const();
        client.for_each(n, move |i| unsafe {
            let value = sgd_step(w.get(i), g.get(i), lr, wd, rescale_grad, clip_gradient);
            store(mode, o.slot(i), value);
        });
        Ok(())
    }, "sgd_update")
}

pub(super) fn mom_update_dense(
    client: &impl Launcher,
    weight: &mut DenseTensor,
    grad: &DenseTensor,
    mom: &mut DenseTensor,
    out: Option<&mut DenseTensor>,
    params: &SgdMomParams,
    mode: WriteMode,
) -> Result<()> {
    if weight.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "weight" });
    }
    check_dense_operand(weight, grad)?;
    check_dense_operand(weight, mom)?;
    let out = resolve_dense_out(weight, out, mode)?;
    let n = weight.numel();
    dispatch_real_dtype!(weight.dtype(), T => {
        let lr = T::from_f32(params.lr);
        let wd = T::from_f32(params.wd);
        let momentum = T::from_f32(params.momentum);
        let rescale_grad = T::from_f32(params.rescale_grad);
        let clip_gradient = T::from_f32(params.clip_gradient);
        let g = RawView::new(grad.as_slice::<T>()?);
        let m = RawViewMut::new(mom.as_mut_slice::<T>()?);
        let w_out = RawViewMut::new(weight.as_mut_slice::<T>()?);
        let o = match out {
            Some(o) => RawViewMut::new(o.as_mut_slice::<T>()?),
            None => w_out,
        };
        let w = w_out.as_const();
        client.for_each(n, move |i| unsafe {
            let (next_mom, value) = sgd_mom_step(
                w.get(i), g.get(i), m.get(i), lr, wd, momentum, rescale_grad, clip_gradient,
            );
            *m.slot(i) = next_mom;
            store(mode, o.slot(i), value);
        });
        Ok(())
    }, "sgd_mom_update")
}

// ============================================================================
// Sparse drivers
// ============================================================================

/// Row-sparse gradient against a dense-addressed weight buffer. Rows absent
/// from the gradient are not touched at all, weight decay included.
pub(super) fn update_dns_rsp(
    client: &impl Launcher,
    weight: &mut DenseTensor,
    grad: &RowSparseTensor,
    params: &SgdParams,
    mode: WriteMode,
) -> Result<()> {
    // a gradient with no rows carries no updates
    if !grad.is_initialized() || mode == WriteMode::Skip {
        return Ok(());
    }
    if mode != WriteMode::InPlace {
        return Err(Error::WriteModeMismatch {
            op: "sgd_update",
            expected: WriteMode::InPlace,
            got: mode,
        });
    }
    if weight.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "weight" });
    }
    check_sparse_grad(weight.rows(), weight.row_length(), weight.dtype(), grad)?;
    let row_length = weight.row_length();
    let num_rows = grad.num_sparse_rows();
    dispatch_real_dtype!(weight.dtype(), T => {
        dispatch_index_dtype!(grad.index_dtype(), I => {
            let lr = T::from_f32(params.lr);
            let wd = T::from_f32(params.wd);
            let rescale_grad = T::from_f32(params.rescale_grad);
            let clip_gradient = T::from_f32(params.clip_gradient);
            let idx = RawView::new(grad.indices().as_slice::<I>()?);
            let gv = RawView::new(grad.values().as_slice::<T>()?);
            let w_out = RawViewMut::new(weight.as_mut_slice::<T>()?);
            let w = w_out.as_const();
            client.for_each(num_rows, move |i| unsafe {
                let row = idx.get(i).to_usize();
                for j in 0..row_length {
                    let data_i = row * row_length + j;
                    let grad_i = i * row_length + j;
                    let value =
                        sgd_step(w.get(data_i), gv.get(grad_i), lr, wd, rescale_grad, clip_gradient);
                    store(WriteMode::InPlace, w_out.slot(data_i), value);
                }
            });
            Ok(())
        }, "sgd_update")
    }, "sgd_update")
}

/// Row-sparse weight against a dense gradient. Rows whose gradient is
/// entirely zero are skipped whole.
pub(super) fn update_rsp_dns(
    client: &impl Launcher,
    weight: &mut RowSparseTensor,
    grad: &DenseTensor,
    params: &SgdParams,
    mode: WriteMode,
) -> Result<()> {
    check_weight_rows(weight)?;
    if mode == WriteMode::Skip {
        return Ok(());
    }
    if mode != WriteMode::InPlace {
        return Err(Error::WriteModeMismatch {
            op: "sgd_update",
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
    let num_rows = weight.num_sparse_rows();
    let num_cols = weight.row_length();
    dispatch_real_dtype!(weight.dtype(), T => {
        let lr = T::from_f32(params.lr);
        let wd = T::from_f32(params.wd);
        let rescale_grad = T::from_f32(params.rescale_grad);
        let clip_gradient = T::from_f32(params.clip_gradient);
        let g = RawView::new(grad.as_slice::<T>()?);
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
                let value = sgd_step(w.get(index), g.get(index), lr, wd, rescale_grad, clip_gradient);
                store(WriteMode::InPlace, w_out.slot(index), value);
            }
        });
        Ok(())
    }, "sgd_update")
}

/// Row-sparse weight and gradient: with every weight row present the value
/// buffer is the dense tensor, so the row-sparse-gradient kernel applies
/// directly.
pub(super) fn update_rsp_rsp(
    client: &impl Launcher,
    weight: &mut RowSparseTensor,
    grad: &RowSparseTensor,
    params: &SgdParams,
    mode: WriteMode,
) -> Result<()> {
    check_weight_rows(weight)?;
    update_dns_rsp(client, weight.values_mut(), grad, params, mode)
}

pub(super) fn mom_update_dns_rsp(
    client: &impl Launcher,
    weight: &mut DenseTensor,
    grad: &RowSparseTensor,
    mom: &mut DenseTensor,
    params: &SgdMomParams,
    mode: WriteMode,
) -> Result<()> {
    if !grad.is_initialized() || mode == WriteMode::Skip {
        return Ok(());
    }
    if mode != WriteMode::InPlace {
        return Err(Error::WriteModeMismatch {
            op: "sgd_mom_update",
            expected: WriteMode::InPlace,
            got: mode,
        });
    }
    if weight.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "weight" });
    }
    if mom.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "mom" });
    }
    check_dense_operand(weight, mom)?;
    check_sparse_grad(weight.rows(), weight.row_length(), weight.dtype(), grad)?;
    let row_length = weight.row_length();
    let num_rows = grad.num_sparse_rows();
    dispatch_real_dtype!(weight.dtype(), T => {
        dispatch_index_dtype!(grad.index_dtype(), I => {
            let lr = T::from_f32(params.lr);
            let wd = T::from_f32(params.wd);
            let momentum = T::from_f32(params.momentum);
            let rescale_grad = T::from_f32(params.rescale_grad);
            let clip_gradient = T::from_f32(params.clip_gradient);
            let idx = RawView::new(grad.indices().as_slice::<I>()?);
            let gv = RawView::new(grad.values().as_slice::<T>()?);
            let m = RawViewMut::new(mom.as_mut_slice::<T>()?);
            let w_out = RawViewMut::new(weight.as_mut_slice::<T>()?);
            let w = w_out.as_const();
            client.for_each(num_rows, move |i| unsafe {
                let row = idx.get(i).to_usize();
                for j in 0..row_length {
                    let data_i = row * row_length + j;
                    let grad_i = i * row_length + j;
                    let (next_mom, value) = sgd_mom_step(
                        w.get(data_i), gv.get(grad_i), m.get(data_i),
                        lr, wd, momentum, rescale_grad, clip_gradient,
                    );
                    *m.slot(data_i) = next_mom;
                    store(WriteMode::InPlace, w_out.slot(data_i), value);
                }
            });
            Ok(())
        }, "sgd_mom_update")
    }, "sgd_mom_update")
}

pub(super) fn mom_update_rsp_dns(
    client: &impl Launcher,
    weight: &mut RowSparseTensor,
    grad: &DenseTensor,
    mom: &mut RowSparseTensor,
    params: &SgdMomParams,
    mode: WriteMode,
) -> Result<()> {
    check_weight_rows(weight)?;
    if mode == WriteMode::Skip {
        return Ok(());
    }
    if mode != WriteMode::InPlace {
        return Err(Error::WriteModeMismatch {
            op: "sgd_mom_update",
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
    // momentum joins the weight's row structure on first touch
    if !mom.is_initialized() {
        mom.fill_zero_rows_like(weight)?;
    }
    if mom.dtype() != weight.dtype() {
        return Err(Error::DTypeMismatch {
            lhs: weight.dtype(),
            rhs: mom.dtype(),
        });
    }
    if mom.num_sparse_rows() != weight.num_sparse_rows()
        || mom.row_length() != weight.row_length()
    {
        return Err(Error::ShapeMismatch {
            expected: weight.shape().to_vec(),
            got: mom.shape().to_vec(),
        });
    }
    let num_rows = weight.num_sparse_rows();
    let num_cols = weight.row_length();
    dispatch_real_dtype!(weight.dtype(), T => {
        let lr = T::from_f32(params.lr);
        let wd = T::from_f32(params.wd);
        let momentum = T::from_f32(params.momentum);
        let rescale_grad = T::from_f32(params.rescale_grad);
        let clip_gradient = T::from_f32(params.clip_gradient);
        let g = RawView::new(grad.as_slice::<T>()?);
        let m = RawViewMut::new(mom.values_mut().as_mut_slice::<T>()?);
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
                let (next_mom, value) = sgd_mom_step(
                    w.get(index), g.get(index), m.get(index),
                    lr, wd, momentum, rescale_grad, clip_gradient,
                );
                *m.slot(index) = next_mom;
                store(WriteMode::InPlace, w_out.slot(index), value);
            }
        });
        Ok(())
    }, "sgd_mom_update")
}

pub(super) fn mom_update_rsp_rsp(
    client: &impl Launcher,
    weight: &mut RowSparseTensor,
    grad: &RowSparseTensor,
    mom: &mut RowSparseTensor,
    params: &SgdMomParams,
    mode: WriteMode,
) -> Result<()> {
    check_weight_rows(weight)?;
    if !mom.is_initialized() {
        mom.fill_zero_rows_like(weight)?;
    }
    mom_update_dns_rsp(client, weight.values_mut(), grad, mom.values_mut(), params, mode)
}

// ============================================================================
// Dispatch entry points
// ============================================================================

pub(super) fn update_any(
    client: &impl Launcher,
    weight: TensorArgMut<'_>,
    grad: TensorArg<'_>,
    out: Option<&mut DenseTensor>,
    params: &SgdParams,
    mode: WriteMode,
) -> Result<()> {
    match (weight, grad) {
        (TensorArgMut::Dense(w), TensorArg::Dense(g)) => {
            update_dense(client, w, g, out, params, mode)
        }
        (TensorArgMut::RowSparse(w), TensorArg::RowSparse(g)) => {
            reject_sparse_out(&out, mode)?;
            update_rsp_rsp(client, w, g, params, mode)
        }
        (TensorArgMut::RowSparse(w), TensorArg::Dense(g)) => {
            reject_sparse_out(&out, mode)?;
            update_rsp_dns(client, w, g, params, mode)
        }
        (TensorArgMut::Dense(w), TensorArg::RowSparse(g)) => {
            reject_sparse_out(&out, mode)?;
            update_dns_rsp(client, w, g, params, mode)
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub(super) fn mom_update_any(
    client: &impl Launcher,
    weight: TensorArgMut<'_>,
    grad: TensorArg<'_>,
    mom: TensorArgMut<'_>,
    out: Option<&mut DenseTensor>,
    params: &SgdMomParams,
    mode: WriteMode,
    fallback: &dyn DensifyFallback,
) -> Result<()> {
    match (weight, grad, mom) {
        (TensorArgMut::Dense(w), TensorArg::Dense(g), TensorArgMut::Dense(m)) => {
            mom_update_dense(client, w, g, m, out, params, mode)
        }
        (TensorArgMut::RowSparse(w), TensorArg::RowSparse(g), TensorArgMut::RowSparse(m)) => {
            reject_sparse_out(&out, mode)?;
            mom_update_rsp_rsp(client, w, g, m, params, mode)
        }
        (TensorArgMut::RowSparse(w), TensorArg::Dense(g), TensorArgMut::RowSparse(m)) => {
            reject_sparse_out(&out, mode)?;
            mom_update_rsp_dns(client, w, g, m, params, mode)
        }
        (TensorArgMut::Dense(w), TensorArg::RowSparse(g), TensorArgMut::Dense(m)) => {
            reject_sparse_out(&out, mode)?;
            mom_update_dns_rsp(client, w, g, m, params, mode)
        }
        // weight and momentum storage disagree: hand the call to the
        // densify collaborator
        (weight, grad, mom) => fallback.sgd_mom(weight, grad, mom, out, params, mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sgd_step_disabled_clip() {
        // wd = 0, clip disabled: plain w - lr*rescale*g
        let v = sgd_step(1.0f64, 0.5, 0.1, 0.0, 1.0, -1.0);
        assert!((v - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_sgd_step_clip_bounds_gradient() {
        // rescale*g = 10 clipped to 1 -> w - lr*1
        let v = sgd_step(1.0f64, 10.0, 0.1, 0.0, 1.0, 1.0);
        assert!((v - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_sgd_mom_step_folds_decay_into_momentum() {
        // zero grad, nonzero wd: momentum absorbs -lr*wd*w
        let (mom, w) = sgd_mom_step(2.0f64, 0.0, 0.0, 0.1, 0.5, 0.9, 1.0, -1.0);
        assert!((mom - (-0.1)).abs() < 1e-12);
        assert!((w - 1.9).abs() < 1e-12);
    }
}
