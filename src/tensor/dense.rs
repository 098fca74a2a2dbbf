//! Dense tensor container

use super::storage::Storage;
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};

/// Dense tensor: a flat element buffer with a logical shape.
///
/// Update kernels address a dense tensor in one of two ways:
/// - element-wise, over the contiguous index range `[0, numel)`;
/// - row-wise, through the flatten-to-2D view `rows() x row_length()`,
///   where `rows()` is the leading dimension and `row_length()` the product
///   of the remaining ones.
#[derive(Debug, Clone)]
pub struct DenseTensor {
    data: Storage,
    shape: Vec<usize>,
}

impl DenseTensor {
    /// Create a zero-filled tensor.
    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        let numel = shape.iter().product();
        Self {
            data: Storage::zeros(numel, dtype),
            shape: shape.to_vec(),
        }
    }

    /// Create a tensor from host data.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `data.len()` differs from the shape's
    /// element count.
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize]) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if data.len() != numel {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Self {
            data: Storage::from_slice(data),
            shape: shape.to_vec(),
        })
    }

    /// Element type tag
    #[inline]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Logical shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Leading dimension of the flatten-to-2D view
    #[inline]
    pub fn rows(&self) -> usize {
        if self.shape.is_empty() {
            1
        } else {
            self.shape[0]
        }
    }

    /// Trailing element count per row of the flatten-to-2D view
    #[inline]
    pub fn row_length(&self) -> usize {
        if self.shape.is_empty() {
            1
        } else {
            self.shape[1..].iter().product()
        }
    }

    /// View the elements as a typed slice.
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        self.data.as_slice::<T>()
    }

    /// View the elements as a mutable typed slice.
    pub fn as_mut_slice<T: Element>(&mut self) -> Result<&mut [T]> {
        self.data.as_mut_slice::<T>()
    }

    /// Copy the elements out as a `Vec`.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        Ok(self.as_slice::<T>()?.to_vec())
    }
}
