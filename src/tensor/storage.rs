//! Dtype-erased flat buffer backing dense and row-sparse tensors

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};

/// Flat, dtype-tagged element buffer.
///
/// Data is held in 8-byte words so every supported element type is aligned,
/// and viewed through `bytemuck` casts. Buffers are zero-initialized on
/// allocation, matching the framework contract that state tensors start at
/// zero.
#[derive(Debug, Clone)]
pub(crate) struct Storage {
    words: Vec<u64>,
    len: usize,
    dtype: DType,
}

impl Storage {
    /// Allocate a zeroed buffer of `len` elements.
    pub fn zeros(len: usize, dtype: DType) -> Self {
        let bytes = len * dtype.size_in_bytes();
        Self {
            words: vec![0u64; bytes.div_ceil(8)],
            len,
            dtype,
        }
    }

    /// Allocate a buffer holding a copy of `data`.
    pub fn from_slice<T: Element>(data: &[T]) -> Self {
        let mut storage = Self::zeros(data.len(), T::DTYPE);
        let dst: &mut [T] = bytemuck::cast_slice_mut(&mut storage.words);
        dst[..data.len()].copy_from_slice(data);
        storage
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Element type tag
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// View the buffer as a typed slice.
    ///
    /// # Errors
    ///
    /// Returns `DTypeMismatch` if `T` does not match the buffer's tag.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        if T::DTYPE != self.dtype {
            return Err(Error::DTypeMismatch {
                lhs: T::DTYPE,
                rhs: self.dtype,
            });
        }
        let full: &[T] = bytemuck::cast_slice(&self.words);
        Ok(&full[..self.len])
    }

    /// View the buffer as a mutable typed slice.
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        if T::DTYPE != self.dtype {
            return Err(Error::DTypeMismatch {
                lhs: T::DTYPE,
                rhs: self.dtype,
            });
        }
        let full: &mut [T] = bytemuck::cast_slice_mut(&mut self.words);
        Ok(&mut full[..self.len])
    }
}
