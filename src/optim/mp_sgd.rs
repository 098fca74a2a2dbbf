//! Mixed-precision SGD and SGD-momentum
//!
//! The weight, gradient, and output tensors may be a narrower float type;
//! an f32 master copy (`weight32`) holds the authoritative value. Each step
//! reads the master, applies the plain SGD formulas entirely at f32,
//! hyperparameters included, writes the master back, and down-casts the
//! result into the output element type. The momentum buffer of the momentum
//! variant is f32 as well.
//!
//! Note the master copy advances even under a `Skip` write mode; only the
//! narrow output store is suppressed.

use super::params::{SgdMomParams, SgdParams};
use super::{check_dense_operand, clip, resolve_dense_out, store, RawView, RawViewMut, WriteMode};
use crate::dispatch_real_dtype;
use crate::dtype::{DType, Real};
use crate::error::{Error, Result};
use crate::runtime::Launcher;
use crate::tensor::DenseTensor;

#[inline]
fn mp_sgd_step(w32: f32, g: f32, lr: f32, wd: f32, rescale_grad: f32, clip_gradient: f32) -> f32 {
    if clip_gradient >= 0.0 {
        (1.0 - lr * wd) * w32 - lr * clip(rescale_grad * g, clip_gradient)
    } else {
        (1.0 - lr * wd) * w32 - (lr * rescale_grad) * g
    }
}

#[inline]
#[allow(clippy::too_many_arguments)]
fn mp_sgd_mom_step(
    w32: f32,
    g: f32,
    mom: f32,
    lr: f32,
    wd: f32,
    momentum: f32,
    rescale_grad: f32,
    clip_gradient: f32,
) -> (f32, f32) {
    let next = if clip_gradient >= 0.0 {
        momentum * mom - lr * wd * w32 - lr * clip(rescale_grad * g, clip_gradient)
    } else {
        momentum * mom - lr * wd * w32 - lr * rescale_grad * g
    };
    (next, w32 + next)
}

fn check_master(weight: &DenseTensor, master: &DenseTensor) -> Result<()> {
    if master.dtype() != DType::F32 {
        return Err(Error::DTypeMismatch {
            lhs: DType::F32,
            rhs: master.dtype(),
        });
    }
    if master.numel() != weight.numel() {
        return Err(Error::ShapeMismatch {
            expected: weight.shape().to_vec(),
            got: master.shape().to_vec(),
        });
    }
    Ok(())
}

pub(super) fn update_dense(
    client: &impl Launcher,
    weight: &mut DenseTensor,
    grad: &DenseTensor,
    weight32: &mut DenseTensor,
    out: Option<&mut DenseTensor>,
    params: &SgdParams,
    mode: WriteMode,
) -> Result<()> {
    if weight.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "weight" });
    }
    check_dense_operand(weight, grad)?;
    check_master(weight, weight32)?;
    let out = resolve_dense_out(weight, out, mode)?;
    let n = weight.numel();
    let lr = params.lr;
    let wd = params.wd;
    let rescale_grad = params.rescale_grad;
    let clip_gradient = params.clip_gradient;
    dispatch_real_dtype!(weight.dtype(), T => {
        let g = RawView::new(grad.as_slice::<T>()?);
        let master = RawViewMut::new(weight32.as_mut_slice::<f32>()?);
        let w_out = RawViewMut::new(weight.as_mut_slice::<T>()?);
        let o = match out {
            Some(o) => RawViewMut::new(o.as_mut_slice::<T>()?),
            None => w_out,
        };
        client.for_each(n, move |i| unsafe {
            let w = mp_sgd_step(
                master.get(i), g.get(i).to_f32(), lr, wd, rescale_grad, clip_gradient,
            );
            *master.slot(i) = w;
            store(mode, o.slot(i), T::from_f32(w));
        });
        Ok(())
    }, "mp_sgd_update")
}

#[allow(clippy::too_many_arguments)]
pub(super) fn mom_update_dense(
    client: &impl Launcher,
    weight: &mut DenseTensor,
    grad: &DenseTensor,
    mom32: &mut DenseTensor,
    weight32: &mut DenseTensor,
    out: Option<&mut DenseTensor>,
    params: &SgdMomParams,
    mode: WriteMode,
) -> Result<()> {
    if weight.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "weight" });
    }
    check_dense_operand(weight, grad)?;
    check_master(weight, mom32)?;
    check_master(weight, weight32)?;
    let out = resolve_dense_out(weight, out, mode)?;
    let n = weight.numel();
    let lr = params.lr;
    let wd = params.wd;
    let momentum = params.momentum;
    let rescale_grad = params.rescale_grad;
    let clip_gradient = params.clip_gradient;
    dispatch_real_dtype!(weight.dtype(), T => {
        let g = RawView::new(grad.as_slice::<T>()?);
        let m = RawViewMut::new(mom32.as_mut_slice::<f32>()?);
        let master = RawViewMut::new(weight32.as_mut_slice::<f32>()?);
        let w_out = RawViewMut::new(weight.as_mut_slice::<T>()?);
        let o = match out {
            Some(o) => RawViewMut::new(o.as_mut_slice::<T>()?),
            None => w_out,
        };
        client.for_each(n, move |i| unsafe {
            let (next_mom, w) = mp_sgd_mom_step(
                master.get(i), g.get(i).to_f32(), m.get(i),
                lr, wd, momentum, rescale_grad, clip_gradient,
            );
            *m.slot(i) = next_mom;
            *master.slot(i) = w;
            store(mode, o.slot(i), T::from_f32(w));
        });
        Ok(())
    }, "mp_sgd_mom_update")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mp_step_matches_f32_sgd() {
        let v = mp_sgd_step(1.0, 0.5, 0.1, 0.0, 1.0, -1.0);
        assert!((v - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_mp_mom_step() {
        let (mom, w) = mp_sgd_mom_step(1.0, 1.0, 0.0, 0.1, 0.0, 0.9, 1.0, -1.0);
        assert!((mom - (-0.1)).abs() < 1e-6);
        assert!((w - 0.9).abs() < 1e-6);
    }
}
