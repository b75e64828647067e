//! Dense local arrays.

use bytes::{BufMut, BytesMut};

use crate::dtype::{CastRule, ElementType};
use crate::error::{CodecError, Result};

/// Typed, row-major element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! for_each_variant {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            ArrayData::Bool($values) => $body,
            ArrayData::U8($values) => $body,
            ArrayData::U16($values) => $body,
            ArrayData::U32($values) => $body,
            ArrayData::U64($values) => $body,
            ArrayData::I8($values) => $body,
            ArrayData::I16($values) => $body,
            ArrayData::I32($values) => $body,
            ArrayData::I64($values) => $body,
            ArrayData::F32($values) => $body,
            ArrayData::F64($values) => $body,
        }
    };
}

impl ArrayData {
    /// Element type of the stored values.
    pub fn element_type(&self) -> ElementType {
        match self {
            ArrayData::Bool(_) => ElementType::Bool,
            ArrayData::U8(_) => ElementType::U8,
            ArrayData::U16(_) => ElementType::U16,
            ArrayData::U32(_) => ElementType::U32,
            ArrayData::U64(_) => ElementType::U64,
            ArrayData::I8(_) => ElementType::I8,
            ArrayData::I16(_) => ElementType::I16,
            ArrayData::I32(_) => ElementType::I32,
            ArrayData::I64(_) => ElementType::I64,
            ArrayData::F32(_) => ElementType::F32,
            ArrayData::F64(_) => ElementType::F64,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        for_each_variant!(self, values => values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at flat index `idx`, widened to `f64`.
    pub fn get_f64(&self, idx: usize) -> Option<f64> {
        for_each_variant!(self, values => values.get(idx).map(|v| v.to_f64()))
    }

    /// All elements widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        for_each_variant!(self, values => values.iter().map(|v| v.to_f64()).collect())
    }

    /// Append the elements to `dst` in wire layout (little-endian).
    ///
    /// `CastRule::PassThrough` is only honoured for the natively tagged
    /// types; everything else is written as `f64`.
    pub(crate) fn put_wire(&self, cast: CastRule, dst: &mut BytesMut) {
        match (self, cast) {
            (ArrayData::U8(values), CastRule::PassThrough) => dst.put_slice(values),
            (ArrayData::I32(values), CastRule::PassThrough) => {
                for v in values {
                    dst.put_i32_le(*v);
                }
            }
            (ArrayData::F32(values), CastRule::PassThrough) => {
                for v in values {
                    dst.put_f32_le(*v);
                }
            }
            (data, _) => for_each_variant!(data, values => {
                for v in values {
                    dst.put_f64_le(v.to_f64());
                }
            }),
        }
    }
}

/// Scalar types that can populate a [`LocalArray`].
pub trait Element: Copy + sealed::Sealed {
    /// Element type tag for this scalar.
    const TYPE: ElementType;

    /// Widen to `f64` the way the wire fallback does.
    fn to_f64(self) -> f64;

    #[doc(hidden)]
    fn wrap(values: Vec<Self>) -> ArrayData;
}

mod sealed {
    pub trait Sealed {}
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident, $conv:expr) => {
        impl sealed::Sealed for $ty {}

        impl Element for $ty {
            const TYPE: ElementType = ElementType::$variant;

            #[inline]
            fn to_f64(self) -> f64 {
                let conv: fn($ty) -> f64 = $conv;
                conv(self)
            }

            fn wrap(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }
        }
    };
}

impl_element!(bool, Bool, |v| if v { 1.0 } else { 0.0 });
impl_element!(u8, U8, f64::from);
impl_element!(u16, U16, f64::from);
impl_element!(u32, U32, f64::from);
impl_element!(u64, U64, |v| v as f64);
impl_element!(i8, I8, f64::from);
impl_element!(i16, I16, f64::from);
impl_element!(i32, I32, f64::from);
impl_element!(i64, I64, |v| v as f64);
impl_element!(f32, F32, f64::from);
impl_element!(f64, F64, |v| v);

/// A dense numeric array owned by the caller.
///
/// Elements are stored row-major. The codec accepts arrays of rank 0, 1 or 2
/// and rejects anything higher at encode time; construction itself only
/// checks that the shape and element count agree.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl LocalArray {
    /// Build an array from an explicit shape and row-major data.
    pub fn new(shape: impl Into<Vec<usize>>, data: ArrayData) -> Result<Self> {
        let shape = shape.into();
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim));
        if expected != Some(data.len()) {
            return Err(CodecError::ShapeMismatch {
                shape,
                len: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// One-dimensional array.
    pub fn from_vec<T: Element>(values: Vec<T>) -> Self {
        Self {
            shape: vec![values.len()],
            data: T::wrap(values),
        }
    }

    /// Two-dimensional array from row-major values.
    pub fn from_shape_vec<T: Element>(rows: usize, cols: usize, values: Vec<T>) -> Result<Self> {
        Self::new(vec![rows, cols], T::wrap(values))
    }

    /// Coerce nested rows into a dense `f64` matrix.
    ///
    /// An empty slice yields a 0x0 matrix.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |row| row.as_ref().len());
        let mut values = Vec::with_capacity(rows.len().saturating_mul(cols));
        for (idx, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(CodecError::RaggedRows {
                    row: idx,
                    len: row.len(),
                    expected: cols,
                });
            }
            values.extend_from_slice(row);
        }
        Self::new(vec![rows.len(), cols], ArrayData::F64(values))
    }

    pub(crate) fn from_parts(shape: Vec<usize>, data: ArrayData) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        Self { shape, data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Rows and columns as seen on the wire.
    ///
    /// A 1-D array of length N is an N x 1 column and a 0-D scalar is 1 x 1.
    pub fn matrix_dims(&self) -> Result<(usize, usize)> {
        match self.shape.as_slice() {
            [] => Ok((1, 1)),
            [rows] => Ok((*rows, 1)),
            [rows, cols] => Ok((*rows, *cols)),
            shape => Err(CodecError::TooManyDimensions {
                ndim: shape.len(),
                shape: shape.to_vec(),
            }),
        }
    }

    /// Borrow the values if this is an `f64` array.
    pub fn as_f64_slice(&self) -> Option<&[f64]> {
        match &self.data {
            ArrayData::F64(values) => Some(values),
            _ => None,
        }
    }

    /// Element at `(row, col)` of a matrix, widened to `f64`.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        let (rows, cols) = self.matrix_dims().ok()?;
        if row >= rows || col >= cols {
            return None;
        }
        self.data.get_f64(row * cols + col)
    }

    /// Row-major copy of the values, widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.data.to_f64_vec()
    }
}

impl<T: Element> From<Vec<T>> for LocalArray {
    fn from(values: Vec<T>) -> Self {
        Self::from_vec(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_mismatched_shape() {
        let err = LocalArray::new(vec![2, 3], ArrayData::F64(vec![0.0; 5])).unwrap_err();
        assert!(matches!(err, CodecError::ShapeMismatch { len: 5, .. }));
    }

    #[test]
    fn new_rejects_overflowing_shape() {
        let err = LocalArray::new(vec![usize::MAX, 2], ArrayData::U8(Vec::new())).unwrap_err();
        assert!(matches!(err, CodecError::ShapeMismatch { .. }));
    }

    #[test]
    fn one_dimensional_is_a_column() {
        let arr = LocalArray::from_vec(vec![1i64, 2, 3]);
        assert_eq!(arr.shape(), &[3]);
        assert_eq!(arr.matrix_dims().unwrap(), (3, 1));
        assert_eq!(arr.get(2, 0), Some(3.0));
        assert_eq!(arr.get(0, 1), None);
    }

    #[test]
    fn scalar_is_one_by_one() {
        let arr = LocalArray::new(Vec::<usize>::new(), ArrayData::F64(vec![4.5])).unwrap();
        assert_eq!(arr.matrix_dims().unwrap(), (1, 1));
    }

    #[test]
    fn three_dimensions_rejected() {
        let arr = LocalArray::new(vec![2, 2, 2], ArrayData::I32(vec![0; 8])).unwrap();
        let err = arr.matrix_dims().unwrap_err();
        assert!(matches!(err, CodecError::TooManyDimensions { ndim: 3, .. }));
    }

    #[test]
    fn from_rows_coerces_to_f64() {
        let arr = LocalArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(arr.shape(), &[2, 2]);
        assert_eq!(arr.element_type(), ElementType::F64);
        assert_eq!(arr.get(1, 0), Some(3.0));
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = LocalArray::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::RaggedRows {
                row: 1,
                len: 1,
                expected: 2
            }
        ));
    }

    #[test]
    fn from_rows_empty() {
        let arr = LocalArray::from_rows::<Vec<f64>>(&[]).unwrap();
        assert_eq!(arr.shape(), &[0, 0]);
        assert!(arr.is_empty());
    }

    #[test]
    fn wire_bytes_pass_through_native_types() {
        let mut dst = BytesMut::new();
        ArrayData::I32(vec![-1, 2]).put_wire(CastRule::PassThrough, &mut dst);
        assert_eq!(dst.as_ref(), &[0xFF, 0xFF, 0xFF, 0xFF, 2, 0, 0, 0]);
    }

    #[test]
    fn wire_bytes_widen_fallback_types() {
        let mut dst = BytesMut::new();
        ArrayData::I16(vec![-2]).put_wire(CastRule::ToF64, &mut dst);
        assert_eq!(dst.as_ref(), &(-2.0f64).to_le_bytes());

        let mut dst = BytesMut::new();
        ArrayData::Bool(vec![true, false]).put_wire(CastRule::ToF64, &mut dst);
        assert_eq!(&dst[..8], &1.0f64.to_le_bytes());
        assert_eq!(&dst[8..], &0.0f64.to_le_bytes());
    }
}
