//! Data type system for optimr tensors
//!
//! This module provides the `DType` enum representing all supported element
//! types, the `Element` trait connecting Rust types to runtime tags, and the
//! dispatch macros that turn a runtime tag into a concrete generic
//! instantiation.
//!
//! Update kernels are generic over two independent type parameters: the real
//! element type of weight/gradient/state values, and the integer type of
//! row-sparse index arrays. The dispatch layer selects both by runtime tag
//! lookup (`dispatch_real_dtype!` nested with `dispatch_index_dtype!`), so
//! each kernel is instantiated once per supported pair.

mod element;

pub use element::{Element, Real, RowIndex};

use std::fmt;

/// Data types supported by optimr tensors
///
/// This enum represents the element type of a tensor at runtime. Using an
/// enum (rather than generics on the containers) allows mixed-precision
/// updates and runtime type selection at the dispatch layer.
///
/// # Discriminant Values (Serialization Stability)
///
/// The discriminant values are **stable**:
/// - Floats: 0-9 (F64=0, F32=1, F16=2, BF16=3)
/// - Signed ints: 10-19 (I64=10, I32=11)
///
/// New types will use reserved ranges. Existing values are NEVER changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point (most common)
    F32 = 1,
    /// 16-bit floating point (IEEE 754), requires the "f16" feature
    F16 = 2,
    /// 16-bit brain floating point, requires the "f16" feature
    BF16 = 3,

    /// 64-bit signed integer (row-sparse index arrays)
    I64 = 10,
    /// 32-bit signed integer (row-sparse index arrays)
    I32 = 11,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 | Self::I64 => 8,
            Self::F32 | Self::I32 => 4,
            Self::F16 | Self::BF16 => 2,
        }
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32 | Self::F16 | Self::BF16)
    }

    /// Returns true if this is a signed integer type
    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::I64 | Self::I32)
    }

    /// Short name for display (e.g., "f32", "i64")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::I64 => "i64",
            Self::I32 => "i32",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Dispatch a real (floating point) dtype to a concrete generic type.
///
/// Executes `$body` with `$T` bound to the Rust type corresponding to
/// `$dtype`. Returns an `UnsupportedDType` error from the enclosing function
/// for integer dtypes, and for F16/BF16 when the "f16" feature is disabled.
///
/// # Example
///
/// ```ignore
/// dispatch_real_dtype!(weight.dtype(), T => {
///     let data = weight.as_slice::<T>()?;
///     // ...
///     Ok(())
/// }, "sgd_update")
/// ```
#[macro_export]
macro_rules! dispatch_real_dtype {
    ($dtype:expr, $T:ident => $body:expr, $op:expr) => {
        match $dtype {
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            #[cfg(feature = "f16")]
            $crate::dtype::DType::F16 => {
                type $T = half::f16;
                $body
            }
            #[cfg(feature = "f16")]
            $crate::dtype::DType::BF16 => {
                type $T = half::bf16;
                $body
            }
            other => {
                return Err($crate::error::Error::UnsupportedDType {
                    dtype: other,
                    op: $op,
                })
            }
        }
    };
}

/// Dispatch a row-sparse index dtype to a concrete generic type.
///
/// Executes `$body` with `$I` bound to `i32` or `i64`. Returns an
/// `UnsupportedDType` error from the enclosing function for any other dtype.
#[macro_export]
macro_rules! dispatch_index_dtype {
    ($dtype:expr, $I:ident => $body:expr, $op:expr) => {
        match $dtype {
            $crate::dtype::DType::I64 => {
                type $I = i64;
                $body
            }
            $crate::dtype::DType::I32 => {
                type $I = i32;
                $body
            }
            other => {
                return Err($crate::error::Error::UnsupportedDType {
                    dtype: other,
                    op: $op,
                })
            }
        }
    };
}

pub use {dispatch_index_dtype, dispatch_real_dtype};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::F16.size_in_bytes(), 2);
        assert_eq!(DType::BF16.size_in_bytes(), 2);
        assert_eq!(DType::I64.size_in_bytes(), 8);
        assert_eq!(DType::I32.size_in_bytes(), 4);
    }

    #[test]
    fn test_dtype_categories() {
        assert!(DType::F32.is_float());
        assert!(DType::F16.is_float());
        assert!(!DType::I32.is_float());
        assert!(DType::I64.is_int());
        assert!(!DType::F64.is_int());
    }

    #[test]
    fn test_dtype_display() {
        assert_eq!(DType::F32.to_string(), "f32");
        assert_eq!(DType::BF16.to_string(), "bf16");
        assert_eq!(DType::I64.to_string(), "i64");
    }
}
