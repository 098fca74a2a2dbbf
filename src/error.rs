//! Error types for optimr

use crate::dtype::DType;
use crate::optim::WriteMode;
use crate::tensor::StorageKind;
use thiserror::Error;

/// Result type alias using optimr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in optimr operations
#[derive(Error, Debug)]
pub enum Error {
    /// Shape mismatch between tensors in an update call
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// DType mismatch between operands
    #[error("DType mismatch: {lhs:?} vs {rhs:?}")]
    DTypeMismatch {
        /// Left-hand side dtype
        lhs: DType,
        /// Right-hand side dtype
        rhs: DType,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// Storage-kind combination not implemented for a rule
    #[error("Unsupported storage for '{op}': weight.storage = {weight}, grad.storage = {grad}")]
    UnsupportedStorage {
        /// The operation name
        op: &'static str,
        /// Storage kind of the weight tensor
        weight: StorageKind,
        /// Storage kind of the gradient tensor
        grad: StorageKind,
    },

    /// State tensor storage kind does not match the weight's
    #[error("Inconsistent storage detected: {arg}.storage = {got}, weight.storage = {expected}")]
    StorageMismatch {
        /// The state tensor name
        arg: &'static str,
        /// Storage kind of the weight tensor
        expected: StorageKind,
        /// Storage kind of the state tensor
        got: StorageKind,
    },

    /// Write mode not satisfied by a storage combination
    #[error("Write mode {expected} is expected for '{op}', got {got}")]
    WriteModeMismatch {
        /// The operation name
        op: &'static str,
        /// The mode the storage combination requires
        expected: WriteMode,
        /// The mode that was requested
        got: WriteMode,
    },

    /// A tensor that must carry data is empty
    #[error("Empty tensor for argument '{arg}'")]
    EmptyTensor {
        /// The argument name
        arg: &'static str,
    },

    /// Row-sparse weight does not have all rows present
    #[error(
        "Row-sparse weight must have all rows non-zero: {present} of {total} rows are present"
    )]
    MissingWeightRows {
        /// Number of rows stored in the sparse tensor
        present: usize,
        /// Number of rows in the full tensor
        total: usize,
    },

    /// Index out of bounds
    #[error("Index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Size of the dimension
        size: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an unsupported dtype error
    pub fn unsupported_dtype(dtype: DType, op: &'static str) -> Self {
        Self::UnsupportedDType { dtype, op }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }
}
