//! Value-type table shared by the encoder and decoder.
//!
//! Every local element type resolves to exactly one wire [`ValueType`] and a
//! [`CastRule`]. Only `u8`, `i32` and `f32` travel in their native width;
//! every other element type is widened to `f64` before it leaves the process.

use std::fmt;

/// Element encoding of a matrix buffer on the wire.
///
/// Discriminants are the codes understood by the remote engine and must not
/// be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// Unsigned 8-bit integer.
    Uint8 = 0,
    /// IEEE-754 single precision.
    Fp32 = 1,
    /// IEEE-754 double precision.
    Fp64 = 2,
    /// Signed 32-bit integer.
    Int32 = 3,
}

impl ValueType {
    /// All wire value types, in code order.
    pub const ALL: [ValueType; 4] = [
        ValueType::Uint8,
        ValueType::Fp32,
        ValueType::Fp64,
        ValueType::Int32,
    ];

    /// Wire code for this value type.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Resolve a wire code. Returns `None` for codes the engine does not know.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ValueType::Uint8),
            1 => Some(ValueType::Fp32),
            2 => Some(ValueType::Fp64),
            3 => Some(ValueType::Int32),
            _ => None,
        }
    }

    /// Byte width of one element.
    pub const fn width(self) -> usize {
        match self {
            ValueType::Uint8 => 1,
            ValueType::Int32 | ValueType::Fp32 => 4,
            ValueType::Fp64 => 8,
        }
    }

    /// Canonical upper-case name (`UINT8`, `INT32`, `FP32`, `FP64`).
    pub const fn name(self) -> &'static str {
        match self {
            ValueType::Uint8 => "UINT8",
            ValueType::Fp32 => "FP32",
            ValueType::Fp64 => "FP64",
            ValueType::Int32 => "INT32",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element types a [`LocalArray`](crate::LocalArray) can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ElementType {
    /// In-memory size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            ElementType::Bool | ElementType::U8 | ElementType::I8 => 1,
            ElementType::U16 | ElementType::I16 => 2,
            ElementType::U32 | ElementType::I32 | ElementType::F32 => 4,
            ElementType::U64 | ElementType::I64 | ElementType::F64 => 8,
        }
    }
}

/// How local elements become wire elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastRule {
    /// Bytes are written in the element's own width.
    PassThrough,
    /// Every element is converted to `f64` first.
    ToF64,
}

/// Result of resolving an element type against the value-type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub value_type: ValueType,
    pub width: usize,
    pub cast: CastRule,
}

impl Dispatch {
    const fn native(value_type: ValueType) -> Self {
        Self {
            value_type,
            width: value_type.width(),
            cast: CastRule::PassThrough,
        }
    }

    /// The catch-all entry: widen to double precision.
    pub const FALLBACK: Dispatch = Dispatch {
        value_type: ValueType::Fp64,
        width: 8,
        cast: CastRule::ToF64,
    };
}

/// Resolve the wire encoding for an element type.
///
/// Never fails. Element types without a native wire tag use
/// [`Dispatch::FALLBACK`].
pub const fn dispatch(element: ElementType) -> Dispatch {
    match element {
        ElementType::U8 => Dispatch::native(ValueType::Uint8),
        ElementType::I32 => Dispatch::native(ValueType::Int32),
        ElementType::F32 => Dispatch::native(ValueType::Fp32),
        ElementType::Bool
        | ElementType::U16
        | ElementType::U32
        | ElementType::U64
        | ElementType::I8
        | ElementType::I16
        | ElementType::I64
        | ElementType::F64 => Dispatch::FALLBACK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVERY_ELEMENT: [ElementType; 11] = [
        ElementType::Bool,
        ElementType::U8,
        ElementType::U16,
        ElementType::U32,
        ElementType::U64,
        ElementType::I8,
        ElementType::I16,
        ElementType::I32,
        ElementType::I64,
        ElementType::F32,
        ElementType::F64,
    ];

    #[test]
    fn native_types_pass_through() {
        assert_eq!(
            dispatch(ElementType::U8),
            Dispatch {
                value_type: ValueType::Uint8,
                width: 1,
                cast: CastRule::PassThrough,
            }
        );
        assert_eq!(
            dispatch(ElementType::I32),
            Dispatch {
                value_type: ValueType::Int32,
                width: 4,
                cast: CastRule::PassThrough,
            }
        );
        assert_eq!(
            dispatch(ElementType::F32),
            Dispatch {
                value_type: ValueType::Fp32,
                width: 4,
                cast: CastRule::PassThrough,
            }
        );
    }

    #[test]
    fn everything_else_falls_back_to_fp64() {
        for element in EVERY_ELEMENT {
            let resolved = dispatch(element);
            match element {
                ElementType::U8 | ElementType::I32 | ElementType::F32 => {
                    assert_eq!(resolved.cast, CastRule::PassThrough, "{element:?}");
                }
                _ => assert_eq!(resolved, Dispatch::FALLBACK, "{element:?}"),
            }
        }
    }

    #[test]
    fn dispatch_width_matches_value_type() {
        for element in EVERY_ELEMENT {
            let resolved = dispatch(element);
            assert_eq!(resolved.width, resolved.value_type.width());
        }
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ValueType::Uint8.code(), 0);
        assert_eq!(ValueType::Fp32.code(), 1);
        assert_eq!(ValueType::Fp64.code(), 2);
        assert_eq!(ValueType::Int32.code(), 3);
        for vt in ValueType::ALL {
            assert_eq!(ValueType::from_code(vt.code()), Some(vt));
        }
        assert_eq!(ValueType::from_code(4), None);
        assert_eq!(ValueType::from_code(0xFF), None);
    }

    #[test]
    fn display_uses_engine_names() {
        assert_eq!(ValueType::Fp64.to_string(), "FP64");
        assert_eq!(ValueType::Int32.to_string(), "INT32");
    }
}
