//! Tensor containers for optimr
//!
//! This module provides the two storage representations update kernels
//! operate on, plus the capability-tagged views the dispatch layer branches
//! on:
//!
//! - **`DenseTensor`**: a flat addressable array with a logical shape.
//! - **`RowSparseTensor`**: an ascending list of populated row indices plus
//!   their values; unlisted rows are implicitly zero.
//! - **`StorageKind` / `TensorArg` / `TensorArgMut`**: how entry points see
//!   their inputs. Drivers query `storage_kind()` rather than branching on
//!   container types ad hoc.

mod dense;
mod rowsparse;
mod storage;

pub use dense::DenseTensor;
pub use rowsparse::RowSparseTensor;

use std::fmt;

/// Storage representation of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Contiguous dense storage
    Dense,
    /// Row-compressed sparse storage
    RowSparse,
}

impl StorageKind {
    /// Returns the storage kind name as a string
    pub fn name(&self) -> &'static str {
        match self {
            StorageKind::Dense => "dense",
            StorageKind::RowSparse => "row_sparse",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Read-only view of a dense or row-sparse tensor, as handed to a
/// mixed-storage entry point.
pub enum TensorArg<'a> {
    /// Dense tensor
    Dense(&'a DenseTensor),
    /// Row-sparse tensor
    RowSparse(&'a RowSparseTensor),
}

/// Mutable view of a dense or row-sparse tensor. Weight and state tensors
/// arrive through this view since sparse updates write them in place.
pub enum TensorArgMut<'a> {
    /// Dense tensor
    Dense(&'a mut DenseTensor),
    /// Row-sparse tensor
    RowSparse(&'a mut RowSparseTensor),
}

impl TensorArg<'_> {
    /// The storage kind this view wraps
    #[inline]
    pub fn storage_kind(&self) -> StorageKind {
        match self {
            TensorArg::Dense(_) => StorageKind::Dense,
            TensorArg::RowSparse(_) => StorageKind::RowSparse,
        }
    }
}

impl TensorArgMut<'_> {
    /// The storage kind this view wraps
    #[inline]
    pub fn storage_kind(&self) -> StorageKind {
        match self {
            TensorArgMut::Dense(_) => StorageKind::Dense,
            TensorArgMut::RowSparse(_) => StorageKind::RowSparse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;

    #[test]
    fn test_storage_kind_display() {
        assert_eq!(StorageKind::Dense.to_string(), "dense");
        assert_eq!(StorageKind::RowSparse.to_string(), "row_sparse");
    }

    #[test]
    fn test_arg_storage_kind() {
        let d = DenseTensor::zeros(&[2, 2], DType::F32);
        let s = RowSparseTensor::uninitialized(&[2, 2], DType::F32, DType::I64);
        assert_eq!(TensorArg::Dense(&d).storage_kind(), StorageKind::Dense);
        assert_eq!(
            TensorArg::RowSparse(&s).storage_kind(),
            StorageKind::RowSparse
        );
    }
}
