//! # optimr
//!
//! **In-place parameter-update kernels for tensor-compute operator
//! libraries.**
//!
//! optimr implements the numeric update rules a training framework invokes
//! after backpropagation: given a weight tensor, a gradient tensor, and the
//! rule's auxiliary state, compute the next weight values in place.
//!
//! ## Update rules
//!
//! - **SGD** (multiplicative weight decay)
//! - **SGD with momentum** (decay folded into the momentum accumulator)
//! - **Mixed-precision SGD / SGD-momentum** (f32 master copy for narrow
//!   weights)
//! - **Adam** (additive L2 decay, uncorrected moment estimates)
//! - **RMSProp** (Tieleman & Hinton) and **RMSPropAlex** (Graves)
//!
//! ## Dense and row-sparse execution
//!
//! Every rule runs against dense buffers, and the SGD/Adam families also
//! run against row-sparse tensors: when the gradient is row-sparse only the
//! listed rows are touched (a deliberate lazy-update approximation that
//! skips weight decay on absent rows), and when the weight is row-sparse,
//! rows with an all-zero gradient are skipped whole. Row-sparse state is
//! zero-initialized lazily on first use.
//!
//! ## Quick start
//!
//! ```
//! use optimr::prelude::*;
//!
//! let client = CpuClient::new(CpuDevice::new());
//! let mut weight = DenseTensor::from_slice(&[1.0f32, 2.0], &[2])?;
//! let grad = DenseTensor::from_slice(&[0.5f32, 0.5], &[2])?;
//!
//! client.sgd_update(
//!     &mut weight,
//!     &grad,
//!     None,
//!     &SgdParams::new(0.1),
//!     WriteMode::InPlace,
//! )?;
//!
//! assert_eq!(weight.to_vec::<f32>()?, vec![0.95, 1.95]);
//! # Ok::<(), optimr::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): multi-threaded kernel launch on CPU
//! - `f16` (default): half-precision element types (F16, BF16)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dtype;
pub mod error;
pub mod optim;
pub mod runtime;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::optim::{
        AdamParams, DensifyFallback, OptimizerOps, RmsPropAlexParams, RmsPropParams,
        SgdMomParams, SgdParams, WriteMode,
    };
    pub use crate::runtime::{CpuClient, CpuDevice, Launcher};
    pub use crate::tensor::{
        DenseTensor, RowSparseTensor, StorageKind, TensorArg, TensorArgMut,
    };
}
