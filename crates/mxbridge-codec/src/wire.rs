use bytes::{Buf, Bytes};

use crate::dtype::ValueType;
use crate::error::{CodecError, Result};

/// Largest buffer either side can allocate.
pub const MAX_BUFFER_LEN: usize = isize::MAX as usize;

/// Byte length of a `rows x cols` buffer of `value_type`.
///
/// Fails with `UnsupportedRange` if the product overflows or exceeds `limit`.
pub fn checked_byte_len(
    rows: usize,
    cols: usize,
    value_type: ValueType,
    limit: usize,
) -> Result<usize> {
    let limit = limit.min(MAX_BUFFER_LEN);
    rows.checked_mul(cols)
        .and_then(|n| n.checked_mul(value_type.width()))
        .filter(|&len| len <= limit)
        .ok_or(CodecError::UnsupportedRange {
            rows,
            cols,
            value_type,
            limit,
        })
}

/// Check that `actual` bytes hold exactly `rows x cols` elements.
pub fn validate_buffer_len(
    rows: usize,
    cols: usize,
    value_type: ValueType,
    actual: usize,
) -> Result<()> {
    let expected = checked_byte_len(rows, cols, value_type, MAX_BUFFER_LEN)?;
    if expected != actual {
        return Err(CodecError::ElementCountMismatch {
            rows,
            cols,
            value_type,
            expected,
            actual,
        });
    }
    Ok(())
}

/// A matrix in transit: raw bytes plus the shape and tag that describe them.
///
/// The byte length always equals `rows * cols * value_type.width()`.
#[derive(Debug, Clone, PartialEq)]
pub struct WireBuffer {
    bytes: Bytes,
    rows: usize,
    cols: usize,
    value_type: ValueType,
}

impl WireBuffer {
    /// Wrap `bytes`, validating the length against the declared shape.
    pub fn new(
        bytes: impl Into<Bytes>,
        rows: usize,
        cols: usize,
        value_type: ValueType,
    ) -> Result<Self> {
        let bytes = bytes.into();
        validate_buffer_len(rows, cols, value_type, bytes.len())?;
        Ok(Self {
            bytes,
            rows,
            cols,
            value_type,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn element_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// Interpret the elements under the buffer's tag, widened to `f64`.
    pub fn to_f64_values(&self) -> Vec<f64> {
        let mut src = self.bytes.clone();
        let mut values = Vec::with_capacity(self.element_count());
        match self.value_type {
            ValueType::Uint8 => values.extend(src.iter().map(|&b| f64::from(b))),
            ValueType::Int32 => {
                while src.has_remaining() {
                    values.push(f64::from(src.get_i32_le()));
                }
            }
            ValueType::Fp32 => {
                while src.has_remaining() {
                    values.push(f64::from(src.get_f32_le()));
                }
            }
            ValueType::Fp64 => {
                while src.has_remaining() {
                    values.push(src.get_f64_le());
                }
            }
        }
        values
    }
}
