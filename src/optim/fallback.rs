//! Densify-and-retry collaborator interface
//!
//! Some storage combinations have no sparse kernel. For SGD with momentum
//! the dispatch entry recovers by handing the call to an external
//! collaborator that densifies whatever is row-sparse, runs the dense
//! update, and scatters results back. The conversion itself is framework
//! territory; this crate only defines the seam and never densifies on its
//! own. Adam deliberately has no such path; its unsupported combinations
//! fail instead.

use super::params::SgdMomParams;
use super::WriteMode;
use crate::error::Result;
use crate::tensor::{DenseTensor, TensorArg, TensorArgMut};

/// Collaborator that converts row-sparse inputs to dense buffers and
/// re-invokes the dense update path.
///
/// Implementations receive the original mixed-storage arguments untouched,
/// after the driver determined that no sparse kernel applies.
pub trait DensifyFallback {
    /// Densify and run a dense SGD-momentum update.
    #[allow(clippy::too_many_arguments)]
    fn sgd_mom(
        &self,
        weight: TensorArgMut<'_>,
        grad: TensorArg<'_>,
        mom: TensorArgMut<'_>,
        out: Option<&mut DenseTensor>,
        params: &SgdMomParams,
        mode: WriteMode,
    ) -> Result<()>;
}
