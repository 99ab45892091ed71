//! Value types understood by the codec.

use std::fmt;
use std::str::FromStr;

use crate::error::{InspectError, InspectResult};

/// Parameterless value kind, as picked from a type selector
///
/// The ordering matches the selector the interactive surfaces present:
/// the six fixed-width numeric kinds first, then the two kinds that need a
/// caller-supplied length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind
{
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    ByteArray,
}

impl ValueKind
{
    /// All kinds in selector order
    pub const ALL: [ValueKind; 8] = [
        ValueKind::Int8,
        ValueKind::Int16,
        ValueKind::Int32,
        ValueKind::Int64,
        ValueKind::Float32,
        ValueKind::Float64,
        ValueKind::String,
        ValueKind::ByteArray,
    ];

    /// Human-readable label shown in watch tables
    #[must_use]
    pub const fn label(self) -> &'static str
    {
        match self {
            ValueKind::Int8 => "Byte",
            ValueKind::Int16 => "2 Bytes",
            ValueKind::Int32 => "4 Bytes",
            ValueKind::Int64 => "8 Bytes",
            ValueKind::Float32 => "Float",
            ValueKind::Float64 => "Double",
            ValueKind::String => "String",
            ValueKind::ByteArray => "Array of Bytes",
        }
    }

    /// Whether this kind needs a caller-supplied length
    #[must_use]
    pub const fn needs_length(self) -> bool
    {
        matches!(self, ValueKind::String | ValueKind::ByteArray)
    }

    /// Whether the unicode toggle applies to this kind
    #[must_use]
    pub const fn supports_unicode(self) -> bool
    {
        matches!(self, ValueKind::String)
    }
}

impl fmt::Display for ValueKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.label())
    }
}

impl FromStr for ValueKind
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "i8" | "int8" | "byte" => Ok(ValueKind::Int8),
            "i16" | "int16" => Ok(ValueKind::Int16),
            "i32" | "int32" | "int" => Ok(ValueKind::Int32),
            "i64" | "int64" => Ok(ValueKind::Int64),
            "f32" | "float" | "float32" => Ok(ValueKind::Float32),
            "f64" | "double" | "float64" => Ok(ValueKind::Float64),
            "str" | "string" => Ok(ValueKind::String),
            "bytes" | "aob" | "bytearray" => Ok(ValueKind::ByteArray),
            _ => Err(format!(
                "Unknown value type: {s}. Use i8, i16, i32, i64, f32, f64, string, or bytes"
            )),
        }
    }
}

/// Fully parameterised value type
///
/// The string and byte-array variants carry their length. For strings the
/// length counts characters: one byte each when `unicode` is false, one
/// UTF-16 code unit (two bytes) each when it is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType
{
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String
    {
        length: usize, unicode: bool
    },
    ByteArray
    {
        length: usize
    },
}

impl ValueType
{
    /// Build a value type from a selector kind plus the optional fields
    ///
    /// `length` is ignored for numeric kinds and required (and `> 0`) for
    /// string and byte-array kinds; a missing length is an error, never a
    /// silent default. `unicode` only matters for strings.
    ///
    /// ```rust
    /// use memscope_core::types::{ValueKind, ValueType};
    ///
    /// assert_eq!(ValueType::new(ValueKind::Int32, Some(99), true).unwrap(), ValueType::Int32);
    /// assert!(ValueType::new(ValueKind::String, None, false).is_err());
    /// assert!(ValueType::new(ValueKind::ByteArray, Some(0), false).is_err());
    /// ```
    ///
    /// ## Errors
    ///
    /// `InvalidLength` when a length-carrying kind has no length or a zero one.
    pub fn new(kind: ValueKind, length: Option<usize>, unicode: bool) -> InspectResult<Self>
    {
        let ty = match kind {
            ValueKind::Int8 => ValueType::Int8,
            ValueKind::Int16 => ValueType::Int16,
            ValueKind::Int32 => ValueType::Int32,
            ValueKind::Int64 => ValueType::Int64,
            ValueKind::Float32 => ValueType::Float32,
            ValueKind::Float64 => ValueType::Float64,
            ValueKind::String => ValueType::String {
                length: length.ok_or(InspectError::InvalidLength(kind.label()))?,
                unicode,
            },
            ValueKind::ByteArray => ValueType::ByteArray {
                length: length.ok_or(InspectError::InvalidLength(kind.label()))?,
            },
        };
        ty.validate()?;
        Ok(ty)
    }

    /// Selector kind of this type
    #[must_use]
    pub const fn kind(self) -> ValueKind
    {
        match self {
            ValueType::Int8 => ValueKind::Int8,
            ValueType::Int16 => ValueKind::Int16,
            ValueType::Int32 => ValueKind::Int32,
            ValueType::Int64 => ValueKind::Int64,
            ValueType::Float32 => ValueKind::Float32,
            ValueType::Float64 => ValueKind::Float64,
            ValueType::String { .. } => ValueKind::String,
            ValueType::ByteArray { .. } => ValueKind::ByteArray,
        }
    }

    /// Number of bytes a value of this type occupies in memory
    #[must_use]
    pub const fn width(self) -> usize
    {
        match self {
            ValueType::Int8 => 1,
            ValueType::Int16 => 2,
            ValueType::Int32 | ValueType::Float32 => 4,
            ValueType::Int64 | ValueType::Float64 => 8,
            ValueType::String { length, unicode: true } => length.saturating_mul(2),
            ValueType::String { length, unicode: false } | ValueType::ByteArray { length } => length,
        }
    }

    /// Reject length-carrying types with a zero length
    ///
    /// ## Errors
    ///
    /// `InvalidLength` for a zero-length string or byte array.
    pub fn validate(self) -> InspectResult<()>
    {
        match self {
            ValueType::String { length: 0, .. } | ValueType::ByteArray { length: 0 } => {
                Err(InspectError::InvalidLength(self.kind().label()))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ValueType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            ValueType::String { length, unicode: true } => write!(f, "String[{length}] (UTF-16)"),
            ValueType::String { length, unicode: false } => write!(f, "String[{length}]"),
            ValueType::ByteArray { length } => write!(f, "Array of Bytes[{length}]"),
            other => f.write_str(other.kind().label()),
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn width_of_unicode_string_counts_code_units()
    {
        let ty = ValueType::new(ValueKind::String, Some(5), true).unwrap();
        assert_eq!(ty.width(), 10);
        let ty = ValueType::new(ValueKind::String, Some(5), false).unwrap();
        assert_eq!(ty.width(), 5);
    }

    #[test]
    fn numeric_kinds_ignore_length()
    {
        assert_eq!(ValueType::new(ValueKind::Float64, None, false).unwrap().width(), 8);
        assert_eq!(ValueType::new(ValueKind::Int16, Some(0), false).unwrap().width(), 2);
    }

    #[test]
    fn kind_round_trips_through_type()
    {
        for kind in ValueKind::ALL {
            let ty = ValueType::new(kind, Some(3), false).unwrap();
            assert_eq!(ty.kind(), kind);
        }
    }

    #[test]
    fn value_kind_from_str()
    {
        assert_eq!("i32".parse::<ValueKind>().unwrap(), ValueKind::Int32);
        assert_eq!("Double".parse::<ValueKind>().unwrap(), ValueKind::Float64);
        assert_eq!("aob".parse::<ValueKind>().unwrap(), ValueKind::ByteArray);
        assert!("u128".parse::<ValueKind>().is_err());
    }
}
