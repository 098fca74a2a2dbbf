//! In-place parameter-update rules
//!
//! This module implements the update kernels and their storage-combination
//! drivers. Each rule family lives in its own file:
//!
//! - `sgd`: SGD and SGD with momentum, dense and row-sparse
//! - `mp_sgd`: mixed-precision SGD / SGD-momentum with an f32 master copy
//! - `adam`: Adam (uncorrected first/second moments), dense and row-sparse
//! - `rmsprop`: RMSProp (Tieleman & Hinton, 2012) and RMSPropAlex
//!   (Graves, 2013), dense
//!
//! The public surface is the [`OptimizerOps`] trait, implemented for every
//! [`Launcher`]. Per rule there is a dense entry point and a mixed-storage
//! entry point (`*_any`) that inspects storage kinds and routes to the
//! matching kernel family.
//!
//! # Write modes
//!
//! Every output store goes through [`WriteMode`]: overwrite a separate
//! output, accumulate into it, update the weight in place, or skip the
//! store entirely. State tensors (momentum, moments, running statistics)
//! are always written in place, independent of the output mode; a `Skip`
//! call against a dense rule still advances its state. Row-sparse paths
//! accept only `InPlace` (or `Skip`, which returns without computing
//! anything).

mod adam;
pub mod fallback;
mod mp_sgd;
mod params;
mod rmsprop;
mod sgd;

pub use fallback::DensifyFallback;
pub use params::{AdamParams, RmsPropAlexParams, RmsPropParams, SgdMomParams, SgdParams};

use crate::dtype::{Element, Real};
use crate::error::{Error, Result};
use crate::runtime::Launcher;
use crate::tensor::{DenseTensor, RowSparseTensor, TensorArg, TensorArgMut};

use std::fmt;

/// How a computed value is stored into the output tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Replace the output element
    Overwrite,
    /// Add the computed value onto the output element
    Accumulate,
    /// Write into the weight tensor itself; required for all sparse paths
    InPlace,
    /// Do not store the output value (state tensors still update on dense
    /// paths)
    Skip,
}

impl WriteMode {
    /// Returns the write mode name as a string
    pub fn name(&self) -> &'static str {
        match self {
            WriteMode::Overwrite => "overwrite",
            WriteMode::Accumulate => "accumulate",
            WriteMode::InPlace => "in_place",
            WriteMode::Skip => "skip",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Store one computed value according to the write mode.
///
/// Shared by every kernel so the mode branching exists in exactly one
/// place.
#[inline]
pub(crate) fn store<T: Element>(mode: WriteMode, slot: &mut T, value: T) {
    match mode {
        WriteMode::Overwrite | WriteMode::InPlace => *slot = value,
        WriteMode::Accumulate => *slot = *slot + value,
        WriteMode::Skip => {}
    }
}

/// Clamp `x` to `[-bound, bound]`.
#[inline]
pub(crate) fn clip<T: Real>(x: T, bound: T) -> T {
    if x < -bound {
        -bound
    } else if x > bound {
        bound
    } else {
        x
    }
}

// ============================================================================
// Lane pointers
// ============================================================================
//
// Kernels address tensors through raw pointers so one code path serves both
// a separate output buffer and the in-place case where output and weight
// alias. Each work item reads and writes only indices it owns, which is
// what makes sharing these across launch lanes sound.

/// Read-only tensor view shared across launch lanes.
#[derive(Clone, Copy)]
pub(crate) struct RawView<T> {
    ptr: *const T,
}

unsafe impl<T: Send + Sync> Send for RawView<T> {}
unsafe impl<T: Send + Sync> Sync for RawView<T> {}

impl<T: Copy> RawView<T> {
    #[inline]
    pub fn new(data: &[T]) -> Self {
        Self { ptr: data.as_ptr() }
    }

    #[inline]
    pub fn from_ptr(ptr: *const T) -> Self {
        Self { ptr }
    }

    /// # Safety
    /// `i` must be in bounds of the viewed buffer.
    #[inline]
    pub unsafe fn get(self, i: usize) -> T {
        unsafe { *self.ptr.add(i) }
    }
}

/// Mutable tensor view shared across launch lanes; distinct work items must
/// touch distinct indices.
#[derive(Clone, Copy)]
pub(crate) struct RawViewMut<T> {
    ptr: *mut T,
}

unsafe impl<T: Send + Sync> Send for RawViewMut<T> {}
unsafe impl<T: Send + Sync> Sync for RawViewMut<T> {}

impl<T: Copy> RawViewMut<T> {
    #[inline]
    pub fn new(data: &mut [T]) -> Self {
        Self {
            ptr: data.as_mut_ptr(),
        }
    }

    #[inline]
    pub fn as_const(self) -> RawView<T> {
        RawView::from_ptr(self.ptr.cast_const())
    }

    /// # Safety
    /// `i` must be in bounds of the viewed buffer.
    #[inline]
    pub unsafe fn get(self, i: usize) -> T {
        unsafe { *self.ptr.add(i) }
    }

    /// # Safety
    /// `i` must be in bounds, and no other lane may access index `i` while
    /// the returned reference lives.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slot<'a>(self, i: usize) -> &'a mut T {
        unsafe { &mut *self.ptr.add(i) }
    }
}

// ============================================================================
// Shared driver checks
// ============================================================================

/// Validate that a dense operand matches the weight's element count and
/// dtype.
pub(crate) fn check_dense_operand(weight: &DenseTensor, t: &DenseTensor) -> Result<()> {
    if t.dtype() != weight.dtype() {
        return Err(Error::DTypeMismatch {
            lhs: weight.dtype(),
            rhs: t.dtype(),
        });
    }
    if t.numel() != weight.numel() {
        return Err(Error::shape_mismatch(weight.shape(), t.shape()));
    }
    Ok(())
}

/// Validate a row-sparse gradient against the flatten-to-2D view of the
/// weight it updates.
pub(crate) fn check_sparse_grad(
    rows: usize,
    row_length: usize,
    dtype: crate::dtype::DType,
    grad: &RowSparseTensor,
) -> Result<()> {
    if grad.dtype() != dtype {
        return Err(Error::DTypeMismatch {
            lhs: dtype,
            rhs: grad.dtype(),
        });
    }
    if grad.rows() != rows || grad.row_length() != row_length {
        return Err(Error::ShapeMismatch {
            expected: vec![rows, row_length],
            got: grad.shape().to_vec(),
        });
    }
    Ok(())
}

/// Validate the all-rows invariant for a row-sparse weight.
pub(crate) fn check_weight_rows(weight: &RowSparseTensor) -> Result<()> {
    if !weight.all_rows_present() {
        return Err(Error::MissingWeightRows {
            present: weight.num_sparse_rows(),
            total: weight.rows(),
        });
    }
    Ok(())
}

/// Resolve the output target for a dense update.
///
/// `Overwrite`/`Accumulate` require a separate output tensor matching the
/// weight; `InPlace` forbids one (the weight is the output); `Skip` ignores
/// whatever was passed.
pub(crate) fn resolve_dense_out<'a>(
    weight: &DenseTensor,
    out: Option<&'a mut DenseTensor>,
    mode: WriteMode,
) -> Result<Option<&'a mut DenseTensor>> {
    match mode {
        WriteMode::Overwrite | WriteMode::Accumulate => {
            let out = out.ok_or_else(|| {
                Error::invalid_argument("out", format!("{mode} requires an output tensor"))
            })?;
            check_dense_operand(weight, out)?;
            Ok(Some(out))
        }
        WriteMode::InPlace => {
            if out.is_some() {
                return Err(Error::invalid_argument(
                    "out",
                    "in_place writes into the weight; no output tensor is accepted",
                ));
            }
            Ok(None)
        }
        WriteMode::Skip => Ok(None),
    }
}

/// Reject a separate output tensor on a row-sparse path (sparse updates
/// write in place). `Skip` calls pass through so they can no-op downstream.
pub(crate) fn reject_sparse_out(out: &Option<&mut DenseTensor>, mode: WriteMode) -> Result<()> {
    if mode != WriteMode::Skip && out.is_some() {
        return Err(Error::invalid_argument(
            "out",
            "row-sparse updates write into the weight; no output tensor is accepted",
        ));
    }
    Ok(())
}

// ============================================================================
// Public operation surface
// ============================================================================

/// Parameter-update operations, implemented for every kernel [`Launcher`].
///
/// Per rule there are two entry points. The dense one takes concrete
/// [`DenseTensor`] arguments. The `*_any` one takes storage-tagged views,
/// inspects the storage kind of each input and routes to the dense kernel,
/// one of the sparse row-kernel families, or, depending on the rule, a
/// densify fallback collaborator or an unsupported-storage error.
///
/// Input order per call is fixed: weight, gradient, then the rule's state
/// tensors. The output is controlled by [`WriteMode`]; see the module docs
/// for the in-place and skip semantics.
pub trait OptimizerOps {
    /// SGD over dense tensors:
    /// `out = (1 - lr*wd)*weight - lr*clip(rescale_grad*grad)`.
    fn sgd_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &SgdParams,
        mode: WriteMode,
    ) -> Result<()>;

    /// SGD over any dense/row-sparse storage combination.
    ///
    /// With dense and row-sparse storage every weight/gradient pairing has
    /// a kernel, so this entry never needs a fallback collaborator.
    fn sgd_update_any(
        &self,
        weight: TensorArgMut<'_>,
        grad: TensorArg<'_>,
        out: Option<&mut DenseTensor>,
        params: &SgdParams,
        mode: WriteMode,
    ) -> Result<()>;

    /// SGD with momentum over dense tensors. Weight decay folds into the
    /// momentum accumulator:
    /// `mom = momentum*mom - lr*wd*weight - lr*clip(rescale_grad*grad)`;
    /// `out = weight + mom`.
    fn sgd_mom_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        mom: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &SgdMomParams,
        mode: WriteMode,
    ) -> Result<()>;

    /// SGD with momentum over any storage combination.
    ///
    /// Weight/momentum storage-kind mismatches are delegated to `fallback`
    /// instead of failing; this is the rule family with a densifying
    /// recovery path (Adam has none).
    #[allow(clippy::too_many_arguments)]
    fn sgd_mom_update_any(
        &self,
        weight: TensorArgMut<'_>,
        grad: TensorArg<'_>,
        mom: TensorArgMut<'_>,
        out: Option<&mut DenseTensor>,
        params: &SgdMomParams,
        mode: WriteMode,
        fallback: &dyn DensifyFallback,
    ) -> Result<()>;

    /// Mixed-precision SGD. `weight32` is the authoritative f32 master
    /// copy; arithmetic and hyperparameters run at f32 and the result is
    /// down-cast into the output element type.
    fn mp_sgd_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        weight32: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &SgdParams,
        mode: WriteMode,
    ) -> Result<()>;

    /// Mixed-precision SGD with momentum; both the momentum buffer and the
    /// master copy are f32.
    #[allow(clippy::too_many_arguments)]
    fn mp_sgd_mom_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        mom32: &mut DenseTensor,
        weight32: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &SgdMomParams,
        mode: WriteMode,
    ) -> Result<()>;

    /// Adam over dense tensors. Weight decay is added into the gradient
    /// (L2 form) before the moment updates; no bias correction is applied:
    /// `out = weight - lr*mean/(sqrt(var) + epsilon)`.
    #[allow(clippy::too_many_arguments)]
    fn adam_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        mean: &mut DenseTensor,
        var: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &AdamParams,
        mode: WriteMode,
    ) -> Result<()>;

    /// Adam over any storage combination. Mean/var storage kinds must match
    /// the weight's; a mismatch is fatal; Adam has no densifying fallback.
    #[allow(clippy::too_many_arguments)]
    fn adam_update_any(
        &self,
        weight: TensorArgMut<'_>,
        grad: TensorArg<'_>,
        mean: TensorArgMut<'_>,
        var: TensorArgMut<'_>,
        out: Option<&mut DenseTensor>,
        params: &AdamParams,
        mode: WriteMode,
    ) -> Result<()>;

    /// RMSProp (Tieleman & Hinton, 2012) over dense tensors.
    fn rmsprop_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        state_n: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &RmsPropParams,
        mode: WriteMode,
    ) -> Result<()>;

    /// RMSProp over storage-tagged views. Only the dense/dense combination
    /// has compute; everything else is an unsupported-storage error.
    fn rmsprop_update_any(
        &self,
        weight: TensorArgMut<'_>,
        grad: TensorArg<'_>,
        state_n: TensorArgMut<'_>,
        out: Option<&mut DenseTensor>,
        params: &RmsPropParams,
        mode: WriteMode,
    ) -> Result<()>;

    /// RMSPropAlex (Graves, 2013) over dense tensors: two running
    /// statistics plus a momentum-style delta buffer.
    #[allow(clippy::too_many_arguments)]
    fn rmsprop_alex_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        state_n: &mut DenseTensor,
        state_g: &mut DenseTensor,
        delta: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &RmsPropAlexParams,
        mode: WriteMode,
    ) -> Result<()>;

    /// RMSPropAlex over storage-tagged views; dense/dense only, like
    /// [`OptimizerOps::rmsprop_update_any`].
    #[allow(clippy::too_many_arguments)]
    fn rmsprop_alex_update_any(
        &self,
        weight: TensorArgMut<'_>,
        grad: TensorArg<'_>,
        state_n: TensorArgMut<'_>,
        state_g: TensorArgMut<'_>,
        delta: TensorArgMut<'_>,
        out: Option<&mut DenseTensor>,
        params: &RmsPropAlexParams,
        mode: WriteMode,
    ) -> Result<()>;
}

#[allow(clippy::too_many_arguments)]
impl<L: Launcher> OptimizerOps for L {
    fn sgd_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &SgdParams,
        mode: WriteMode,
    ) -> Result<()> {
        sgd::update_dense(self, weight, grad, out, params, mode)
    }

    fn sgd_update_any(
        &self,
        weight: TensorArgMut<'_>,
        grad: TensorArg<'_>,
        out: Option<&mut DenseTensor>,
        params: &SgdParams,
        mode: WriteMode,
    ) -> Result<()> {
        sgd::update_any(self, weight, grad, out, params, mode)
    }

    fn sgd_mom_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        mom: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &SgdMomParams,
        mode: WriteMode,
    ) -> Result<()> {
        sgd::mom_update_dense(self, weight, grad, mom, out, params, mode)
    }

    fn sgd_mom_update_any(
        &self,
        weight: TensorArgMut<'_>,
        grad: TensorArg<'_>,
        mom: TensorArgMut<'_>,
        out: Option<&mut DenseTensor>,
        params: &SgdMomParams,
        mode: WriteMode,
        fallback: &dyn DensifyFallback,
    ) -> Result<()> {
        sgd::mom_update_any(self, weight, grad, mom, out, params, mode, fallback)
    }

    fn mp_sgd_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        weight32: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &SgdParams,
        mode: WriteMode,
    ) -> Result<()> {
        mp_sgd::update_dense(self, weight, grad, weight32, out, params, mode)
    }

    fn mp_sgd_mom_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        mom32: &mut DenseTensor,
        weight32: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &SgdMomParams,
        mode: WriteMode,
    ) -> Result<()> {
        mp_sgd::mom_update_dense(self, weight, grad, mom32, weight32, out, params, mode)
    }

    fn adam_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        mean: &mut DenseTensor,
        var: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &AdamParams,
        mode: WriteMode,
    ) -> Result<()> {
        adam::update_dense(self, weight, grad, mean, var, out, params, mode)
    }

    fn adam_update_any(
        &self,
        weight: TensorArgMut<'_>,
        grad: TensorArg<'_>,
        mean: TensorArgMut<'_>,
        var: TensorArgMut<'_>,
        out: Option<&mut DenseTensor>,
        params: &AdamParams,
        mode: WriteMode,
    ) -> Result<()> {
        adam::update_any(self, weight, grad, mean, var, out, params, mode)
    }

    fn rmsprop_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        state_n: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &RmsPropParams,
        mode: WriteMode,
    ) -> Result<()> {
        rmsprop::update_dense(self, weight, grad, state_n, out, params, mode)
    }

    fn rmsprop_update_any(
        &self,
        weight: TensorArgMut<'_>,
        grad: TensorArg<'_>,
        state_n: TensorArgMut<'_>,
        out: Option<&mut DenseTensor>,
        params: &RmsPropParams,
        mode: WriteMode,
    ) -> Result<()> {
        rmsprop::update_any(self, weight, grad, state_n, out, params, mode)
    }

    fn rmsprop_alex_update(
        &self,
        weight: &mut DenseTensor,
        grad: &DenseTensor,
        state_n: &mut DenseTensor,
        state_g: &mut DenseTensor,
        delta: &mut DenseTensor,
        out: Option<&mut DenseTensor>,
        params: &RmsPropAlexParams,
        mode: WriteMode,
    ) -> Result<()> {
        rmsprop::alex_update_dense(self, weight, grad, state_n, state_g, delta, out, params, mode)
    }

    fn rmsprop_alex_update_any(
        &self,
        weight: TensorArgMut<'_>,
        grad: TensorArg<'_>,
        state_n: TensorArgMut<'_>,
        state_g: TensorArgMut<'_>,
        delta: TensorArgMut<'_>,
        out: Option<&mut DenseTensor>,
        params: &RmsPropAlexParams,
        mode: WriteMode,
    ) -> Result<()> {
        rmsprop::alex_update_any(self, weight, grad, state_n, state_g, delta, out, params, mode)
    }
}
