//! Row-sparse tensor container

use super::dense::DenseTensor;
use crate::dtype::{DType, Element, RowIndex};
use crate::error::{Error, Result};
use crate::{dispatch_index_dtype, dispatch_real_dtype};

/// Row-sparse tensor: an ascending list of populated row indices paired with
/// their values.
///
/// The index array is 1-D with dtype `i32` or `i64`, strictly increasing,
/// and every entry addresses a row of the conceptual dense tensor. The
/// values tensor has storage shape `[num_sparse_rows, row_length]`; all
/// unlisted rows are implicitly zero.
///
/// A row-sparse tensor with zero stored rows is *uninitialized*, which is distinct
/// from an all-zero tensor. State tensors start out uninitialized and are
/// lazily filled by the drivers on first use.
#[derive(Debug, Clone)]
pub struct RowSparseTensor {
    shape: Vec<usize>,
    indices: DenseTensor,
    values: DenseTensor,
}

impl RowSparseTensor {
    /// Create a row-sparse tensor from its components.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `shape` has no dimensions or the index tensor is not 1-D
    /// - the index dtype is not `i32`/`i64` or the value dtype is not float
    /// - the value tensor's leading dimension differs from the index count,
    ///   or its row length differs from the full shape's
    /// - indices are not strictly increasing or address rows out of bounds
    pub fn new(shape: &[usize], indices: DenseTensor, values: DenseTensor) -> Result<Self> {
        if shape.is_empty() {
            return Err(Error::invalid_argument(
                "shape",
                "row-sparse tensors need at least one dimension",
            ));
        }
        if indices.shape().len() != 1 {
            return Err(Error::invalid_argument(
                "indices",
                format!("expected a 1-D index tensor, got {}-D", indices.shape().len()),
            ));
        }
        if !indices.dtype().is_int() {
            return Err(Error::unsupported_dtype(indices.dtype(), "row_sparse"));
        }
        if !values.dtype().is_float() {
            return Err(Error::unsupported_dtype(values.dtype(), "row_sparse"));
        }

        let row_length: usize = shape[1..].iter().product();
        if values.rows() != indices.numel() || values.row_length() != row_length {
            return Err(Error::ShapeMismatch {
                expected: vec![indices.numel(), row_length],
                got: values.shape().to_vec(),
            });
        }

        let tensor = Self {
            shape: shape.to_vec(),
            indices,
            values,
        };
        tensor.check_indices()?;
        Ok(tensor)
    }

    /// Create a row-sparse tensor from host data.
    pub fn from_slices<T: Element, I: RowIndex>(
        shape: &[usize],
        indices: &[I],
        values: &[T],
    ) -> Result<Self> {
        let indices = DenseTensor::from_slice(indices, &[indices.len()])?;
        let mut vshape = vec![indices.numel()];
        vshape.extend_from_slice(shape.get(1..).unwrap_or(&[]));
        let values = DenseTensor::from_slice(values, &vshape)?;
        Self::new(shape, indices, values)
    }

    /// Create an uninitialized row-sparse tensor (zero stored rows).
    pub fn uninitialized(shape: &[usize], dtype: DType, index_dtype: DType) -> Self {
        let mut vshape = vec![0];
        vshape.extend_from_slice(shape.get(1..).unwrap_or(&[]));
        Self {
            shape: shape.to_vec(),
            indices: DenseTensor::zeros(&[0], index_dtype),
            values: DenseTensor::zeros(&vshape, dtype),
        }
    }

    fn check_indices(&self) -> Result<()> {
        let rows = self.rows();
        dispatch_index_dtype!(self.indices.dtype(), I => {
            let idx = self.indices.as_slice::<I>()?;
            let mut prev: Option<usize> = None;
            for &i in idx {
                let i = i.to_usize();
                if i >= rows {
                    return Err(Error::IndexOutOfBounds { index: i, size: rows });
                }
                if let Some(p) = prev {
                    if i <= p {
                        return Err(Error::invalid_argument(
                            "indices",
                            "row indices must be strictly increasing",
                        ));
                    }
                }
                prev = Some(i);
            }
            Ok(())
        }, "row_sparse")
    }

    /// Full logical shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of rows in the conceptual dense tensor
    #[inline]
    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    /// Element count per row
    #[inline]
    pub fn row_length(&self) -> usize {
        self.shape[1..].iter().product()
    }

    /// Number of rows actually stored
    #[inline]
    pub fn num_sparse_rows(&self) -> usize {
        self.indices.numel()
    }

    /// Whether any rows are stored. Zero stored rows means the tensor holds
    /// no data yet, which drivers treat differently from "all values zero".
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.num_sparse_rows() > 0
    }

    /// Whether every row of the full tensor is stored.
    ///
    /// With strictly increasing in-range indices this implies `indices[i] ==
    /// i`, which is what lets drivers address the values buffer as if it
    /// were the dense tensor.
    #[inline]
    pub fn all_rows_present(&self) -> bool {
        self.num_sparse_rows() == self.rows()
    }

    /// Value dtype tag
    #[inline]
    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    /// Index dtype tag
    #[inline]
    pub fn index_dtype(&self) -> DType {
        self.indices.dtype()
    }

    /// The stored row index array
    #[inline]
    pub fn indices(&self) -> &DenseTensor {
        &self.indices
    }

    /// The stored row values, shaped `[num_sparse_rows, row_length]`
    #[inline]
    pub fn values(&self) -> &DenseTensor {
        &self.values
    }

    /// Mutable access to the stored row values
    #[inline]
    pub fn values_mut(&mut self) -> &mut DenseTensor {
        &mut self.values
    }

    /// Fill an uninitialized tensor with all-zero rows matching `src`'s row
    /// structure. Drivers call this once per state tensor before the first
    /// sparse update touches it.
    ///
    /// # Errors
    ///
    /// Returns an error if `self` is already initialized or the shapes
    /// differ.
    pub fn fill_zero_rows_like(&mut self, src: &RowSparseTensor) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::invalid_argument(
                "state",
                "cannot re-initialize a row-sparse tensor that already holds rows",
            ));
        }
        if self.shape != src.shape {
            return Err(Error::shape_mismatch(&src.shape, &self.shape));
        }
        let mut vshape = vec![src.num_sparse_rows()];
        vshape.extend_from_slice(&self.shape[1..]);
        self.indices = src.indices.clone();
        self.values = DenseTensor::zeros(&vshape, self.values.dtype());
        Ok(())
    }

    /// Materialize the conceptual dense tensor (unlisted rows zero).
    ///
    /// This is a convenience for callers and tests; the update drivers never
    /// densify on their own.
    pub fn to_dense(&self) -> Result<DenseTensor> {
        let mut out = DenseTensor::zeros(&self.shape, self.dtype());
        let row_length = self.row_length();
        dispatch_real_dtype!(self.dtype(), T => {
            dispatch_index_dtype!(self.indices.dtype(), I => {
                let idx = self.indices.as_slice::<I>()?;
                let values = self.values.as_slice::<T>()?;
                let dst = out.as_mut_slice::<T>()?;
                for (i, &row) in idx.iter().enumerate() {
                    let row = row.to_usize();
                    dst[row * row_length..(row + 1) * row_length]
                        .copy_from_slice(&values[i * row_length..(i + 1) * row_length]);
                }
                Ok(out)
            }, "to_dense")
        }, "to_dense")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rowsparse_creation() {
        let t = RowSparseTensor::from_slices::<f32, i64>(
            &[4, 2],
            &[0, 2],
            &[1.0, 2.0, 3.0, 4.0],
        )
        .unwrap();
        assert_eq!(t.rows(), 4);
        assert_eq!(t.row_length(), 2);
        assert_eq!(t.num_sparse_rows(), 2);
        assert!(t.is_initialized());
        assert!(!t.all_rows_present());
    }

    #[test]
    fn test_rowsparse_uninitialized() {
        let t = RowSparseTensor::uninitialized(&[4, 2], DType::F32, DType::I64);
        assert!(!t.is_initialized());
        assert_eq!(t.num_sparse_rows(), 0);
    }

    #[test]
    fn test_rowsparse_rejects_unsorted_indices() {
        let r = RowSparseTensor::from_slices::<f32, i64>(&[4, 1], &[2, 1], &[1.0, 2.0]);
        assert!(r.is_err());
        let r = RowSparseTensor::from_slices::<f32, i64>(&[4, 1], &[1, 1], &[1.0, 2.0]);
        assert!(r.is_err());
    }

    #[test]
    fn test_rowsparse_rejects_out_of_bounds() {
        let r = RowSparseTensor::from_slices::<f32, i64>(&[2, 1], &[0, 5], &[1.0, 2.0]);
        assert!(matches!(r, Err(Error::IndexOutOfBounds { .. })));
    }

    #[test]
    fn test_rowsparse_fill_zero_rows_like() {
        let w =
            RowSparseTensor::from_slices::<f32, i64>(&[3, 2], &[0, 1, 2], &[1.0; 6]).unwrap();
        let mut state = RowSparseTensor::uninitialized(&[3, 2], DType::F32, DType::I64);
        state.fill_zero_rows_like(&w).unwrap();
        assert!(state.is_initialized());
        assert_eq!(state.num_sparse_rows(), 3);
        assert_eq!(state.values().to_vec::<f32>().unwrap(), vec![0.0; 6]);

        // second fill is rejected
        assert!(state.fill_zero_rows_like(&w).is_err());
    }

    #[test]
    fn test_rowsparse_to_dense() {
        let t = RowSparseTensor::from_slices::<f32, i32>(
            &[3, 2],
            &[0, 2],
            &[1.0, 2.0, 5.0, 6.0],
        )
        .unwrap();
        let d = t.to_dense().unwrap();
        assert_eq!(
            d.to_vec::<f32>().unwrap(),
            vec![1.0, 2.0, 0.0, 0.0, 5.0, 6.0]
        );
    }
}
