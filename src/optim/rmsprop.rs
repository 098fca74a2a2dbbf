//! RMSProp update rules
//!
//! Two variants are implemented:
//!
//! - **RMSProp** follows Tieleman & Hinton, 2012
//!   (<http://www.cs.toronto.edu/~tijmen/csc321/slides/lecture_slides_lec6.pdf>):
//!   one running squared-gradient statistic.
//! - **RMSPropAlex** follows Alex Graves, 2013
//!   (<http://arxiv.org/pdf/1308.0850v5.pdf>, Eq. 38-45): running squared
//!   and first-moment statistics plus a momentum-style delta buffer.
//!
//! In both variants epsilon sits inside the square root, and an optional
//! `clip_weights` bound clamps the updated weight after the step. Only
//! dense compute exists for this family; the mixed-storage entries accept
//! the dense/dense combination and report anything else as unsupported.

use super::params::{RmsPropAlexParams, RmsPropParams};
use super::{
    check_dense_operand, clip, resolve_dense_out, store, RawView, RawViewMut, WriteMode,
};
use crate::dispatch_real_dtype;
use crate::dtype::Real;
use crate::error::{Error, Result};
use crate::runtime::Launcher;
use crate::tensor::{DenseTensor, TensorArg, TensorArgMut};

/// One RMSProp element; returns `(next_state_n, next_weight)`.
#[inline]
#[allow(clippy::too_many_arguments)]
fn rmsprop_step<T: Real>(
    w: T,
    g: T,
    state_n: T,
    lr: T,
    gamma1: T,
    epsilon: T,
    wd: T,
    rescale_grad: T,
    clip_gradient: T,
    clip_weights: T,
) -> (T, T) {
    let one = T::one();
    let grad_rescaled = rescale_grad * g + wd * w;
    let (next_n, num) = if clip_gradient >= T::zero() {
        let c = clip(grad_rescaled, clip_gradient);
        ((one - gamma1) * (c * c) + gamma1 * state_n, c)
    } else {
        (
            (one - gamma1) * (grad_rescaled * grad_rescaled) + gamma1 * state_n,
            grad_rescaled,
        )
    };
    let next_w = w - lr * (num / (next_n + epsilon).sqrt());
    let next_w = if clip_weights >= T::zero() {
        clip(next_w, clip_weights)
    } else {
        next_w
    };
    (next_n, next_w)
}

/// One RMSPropAlex element; returns
/// `(next_state_n, next_state_g, next_delta, next_weight)`.
#[inline]
#[allow(clippy::too_many_arguments)]
fn rmsprop_alex_step<T: Real>(
    w: T,
    g: T,
    state_n: T,
    state_g: T,
    delta: T,
    lr: T,
    gamma1: T,
    gamma2: T,
    epsilon: T,
    wd: T,
    rescale_grad: T,
    clip_gradient: T,
    clip_weights: T,
) -> (T, T, T, T) {
    let one = T::one();
    let grad_rescaled = rescale_grad * g + wd * w;
    let c = if clip_gradient >= T::zero() {
        clip(grad_rescaled, clip_gradient)
    } else {
        grad_rescaled
    };
    let next_n = (one - gamma1) * (c * c) + gamma1 * state_n;
    let next_g = (one - gamma1) * c + gamma1 * state_g;
    let next_delta = gamma2 * delta - lr * (c / (next_n - next_g * next_g + epsilon).sqrt());
    let next_w = w + next_delta;
    let next_w = if clip_weights >= T::zero() {
        clip(next_w, clip_weights)
    } else {
        next_w
    };
    (next_n, next_g, next_delta, next_w)
}

// ============================================================================
// Dense drivers
// ============================================================================

pub(super) fn update_dense(
    client: &impl Launcher,
    weight: &mut DenseTensor,
    grad: &DenseTensor,
    state_n: &mut DenseTensor,
    out: Option<&mut DenseTensor>,
    params: &RmsPropParams,
    mode: WriteMode,
) -> Result<()> {
    if weight.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "weight" });
    }
    check_dense_operand(weight, grad)?;
    check_dense_operand(weight, state_n)?;
    let out = resolve_dense_out(weight, out, mode)?;
    let n = weight.numel();
    dispatch_real_dtype!(weight.dtype(), T => {
        let lr = T::from_f32(params.lr);
        let gamma1 = T::from_f32(params.gamma1);
        let epsilon = T::from_f32(params.epsilon);
        let wd = T::from_f32(params.wd);
        let rescale_grad = T::from_f32(params.rescale_grad);
        let clip_gradient = T::from_f32(params.clip_gradient);
        let clip_weights = T::from_f32(params.clip_weights);
        let g = RawView::new(grad.as_slice::<T>()?);
        let sn = RawViewMut::new(state_n.as_mut_slice::<T>()?);
        let w_out = RawViewMut::new(weight.as_mut_slice::<T>()?);
        let o = match out {
            Some(o) => RawViewMut::new(o.as_mut_slice::<T>()?),
            None => w_out,
        };
        let w = w_out.as_const();
        client.for_each(n, move |i| unsafe {
            let (next_n, value) = rmsprop_step(
                w.get(i), g.get(i), sn.get(i),
                lr, gamma1, epsilon, wd, rescale_grad, clip_gradient, clip_weights,
            );
            *sn.slot(i) = next_n;
            store(mode, o.slot(i), value);
        });
        Ok(())
    }, "rmsprop_update")
}

#[allow(clippy::too_many_arguments)]
pub(super) fn alex_update_dense(
    client: &impl Launcher,
    weight: &mut DenseTensor,
    grad: &DenseTensor,
    state_n: &mut DenseTensor,
    state_g: &mut DenseTensor,
    delta: &mut DenseTensor,
    out: Option<&mut DenseTensor>,
    params: &RmsPropAlexParams,
    mode: WriteMode,
) -> Result<()> {
    if weight.numel() == 0 {
        return Err(Error::EmptyTensor { arg: "weight" });
    }
    check_dense_operand(weight, grad)?;
    check_dense_operand(weight, state_n)?;
    check_dense_operand(weight, state_g)?;
    check_dense_operand(weight, delta)?;
    let out = resolve_dense_out(weight, out, mode)?;
    let n = weight.numel();
    dispatch_real_dtype!(weight.dtype(), T => {
        let lr = T::from_f32(params.lr);
        let gamma1 = T::from_f32(params.gamma1);
        let gamma2 = T::from_f32(params.gamma2);
        let epsilon = T::from_f32(params.epsilon);
        let wd = T::from_f32(params.wd);
        let rescale_grad = T::from_f32(params.rescale_grad);
        let clip_gradient = T::from_f32(params.clip_gradient);
        let clip_weights = T::from_f32(params.clip_weights);
        let g = RawView::new(grad.as_slice::<T>()?);
        let sn = RawViewMut::new(state_n.as_mut_slice::<T>()?);
        let sg = RawViewMut::new(state_g.as_mut_slice::<T>()?);
        let d = RawViewMut::new(delta.as_mut_slice::<T>()?);
        let w_out = RawViewMut::new(weight.as_mut_slice::<T>()?);
        let o = match out {
            Some(o) => RawViewMut::new(o.as_mut_slice::<T>()?),
            None => w_out,
        };
        let w = w_out.as_const();
        client.for_each(n, move |i| unsafe {
            let (next_n, next_g, next_delta, value) = rmsprop_alex_step(
                w.get(i), g.get(i), sn.get(i), sg.get(i), d.get(i),
                lr, gamma1, gamma2, epsilon, wd, rescale_grad, clip_gradient, clip_weights,
            );
            *sn.slot(i) = next_n;
            *sg.slot(i) = next_g;
            *d.slot(i) = next_delta;
            store(mode, o.slot(i), value);
        });
        Ok(())
    }, "rmsprop_alex_update")
}

// ============================================================================
// Dispatch entry points
// ============================================================================

pub(super) fn update_any(
    client: &impl Launcher,
    weight: TensorArgMut<'_>,
    grad: TensorArg<'_>,
    state_n: TensorArgMut<'_>,
    out: Option<&mut DenseTensor>,
    params: &RmsPropParams,
    mode: WriteMode,
) -> Result<()> {
    match (weight, grad, state_n) {
        (TensorArgMut::Dense(w), TensorArg::Dense(g), TensorArgMut::Dense(sn)) => {
            update_dense(client, w, g, sn, out, params, mode)
        }
        (weight, grad, _) => Err(Error::UnsupportedStorage {
            op: "rmsprop_update",
            weight: weight.storage_kind(),
            grad: grad.storage_kind(),
        }),
    }
}

#[allow(clippy::too_many_arguments)]
pub(super) fn alex_update_any(
    client: &impl Launcher,
    weight: TensorArgMut<'_>,
    grad: TensorArg<'_>,
    state_n: TensorArgMut<'_>,
    state_g: TensorArgMut<'_>,
    delta: TensorArgMut<'_>,
    out: Option<&mut DenseTensor>,
    params: &RmsPropAlexParams,
    mode: WriteMode,
) -> Result<()> {
    match (weight, grad, state_n, state_g, delta) {
        (
            TensorArgMut::Dense(w),
            TensorArg::Dense(g),
            TensorArgMut::Dense(sn),
            TensorArgMut::Dense(sg),
            TensorArgMut::Dense(d),
        ) => alex_update_dense(client, w, g, sn, sg, d, out, params, mode),
        (weight, grad, ..) => Err(Error::UnsupportedStorage {
            op: "rmsprop_alex_update",
            weight: weight.storage_kind(),
            grad: grad.storage_kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmsprop_step_epsilon_inside_sqrt() {
        // state_n' = 0.05*4 = 0.2; out = 1 - 0.1*2/sqrt(0.2 + 1e-8)
        let (n, w) = rmsprop_step(
            1.0f64, 2.0, 0.0, 0.1, 0.95, 1e-8, 0.0, 1.0, -1.0, -1.0,
        );
        assert!((n - 0.2).abs() < 1e-12);
        let expected = 1.0 - 0.1 * (2.0 / (0.2f64 + 1e-8).sqrt());
        assert!((w - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rmsprop_step_weight_clamp() {
        let (_, w) = rmsprop_step(
            1.0f64, 2.0, 0.0, 0.1, 0.95, 1e-8, 0.0, 1.0, -1.0, 0.5,
        );
        assert_eq!(w, 0.5);
    }

    #[test]
    fn test_rmsprop_alex_step_uses_centered_second_moment() {
        let (n, sg, d, w) = rmsprop_alex_step(
            1.0f64, 2.0, 0.0, 0.0, 0.0, 0.1, 0.95, 0.9, 1e-8, 0.0, 1.0, -1.0, -1.0,
        );
        assert!((n - 0.2).abs() < 1e-12);
        assert!((sg - 0.1).abs() < 1e-12);
        let expected_delta = -0.1 * (2.0 / (0.2f64 - 0.01 + 1e-8).sqrt());
        assert!((d - expected_delta).abs() < 1e-12);
        assert!((w - (1.0 + expected_delta)).abs() < 1e-12);
    }
}
