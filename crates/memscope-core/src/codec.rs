//! # Value Codec
//!
//! Pure conversion between raw target bytes and display strings.
//!
//! Numbers use the host's native byte order, which is the target's: the
//! backend only reads processes on the same machine. Integers display as
//! signed decimal, floats with Rust's shortest round-trip formatting, byte
//! arrays as space-separated lowercase hex pairs.
//!
//! Nothing here performs I/O.

use crate::error::{InspectError, InspectResult};
use crate::types::ValueType;

/// Decode `bytes` as a value of type `ty` and render it for display
///
/// ```rust
/// use memscope_core::codec;
/// use memscope_core::types::ValueType;
///
/// assert_eq!(codec::decode(&(-7i32).to_ne_bytes(), ValueType::Int32).unwrap(), "-7");
/// assert_eq!(codec::decode(&[0xde, 0xad], ValueType::ByteArray { length: 2 }).unwrap(), "de ad");
/// ```
///
/// ## Errors
///
/// `MalformedData` if `bytes.len()` differs from `ty.width()`; `InvalidLength`
/// for a zero-length string or byte array.
pub fn decode(bytes: &[u8], ty: ValueType) -> InspectResult<String>
{
    ty.validate()?;
    let expected = ty.width();
    if bytes.len() != expected {
        return Err(InspectError::MalformedData {
            expected,
            actual: bytes.len(),
        });
    }

    let text = match ty {
        ValueType::Int8 => i8::from_ne_bytes([bytes[0]]).to_string(),
        ValueType::Int16 => i16::from_ne_bytes(fixed(bytes)?).to_string(),
        ValueType::Int32 => i32::from_ne_bytes(fixed(bytes)?).to_string(),
        ValueType::Int64 => i64::from_ne_bytes(fixed(bytes)?).to_string(),
        ValueType::Float32 => f32::from_ne_bytes(fixed(bytes)?).to_string(),
        ValueType::Float64 => f64::from_ne_bytes(fixed(bytes)?).to_string(),
        ValueType::String { unicode: false, .. } => decode_narrow(bytes),
        ValueType::String { unicode: true, .. } => decode_wide(bytes),
        ValueType::ByteArray { .. } => bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" "),
    };
    Ok(text)
}

/// Encode display text as the raw bytes of a `ty` value
///
/// The inverse of [`decode`] for every value `decode` can produce. Integers
/// also accept their unsigned spelling (`255` for an `Int8` is `0xff`), and
/// `0x`-prefixed hex. Strings shorter than the type's length are padded with
/// terminators.
///
/// ## Errors
///
/// `InvalidValue` if the text does not parse or does not fit, `InvalidLength`
/// for a zero-length string or byte array.
pub fn encode(text: &str, ty: ValueType) -> InspectResult<Vec<u8>>
{
    ty.validate()?;
    let invalid = || InspectError::InvalidValue {
        kind: ty.kind().label(),
        text: text.to_string(),
    };
    let trimmed = text.trim();

    let bytes = match ty {
        ValueType::Int8 => {
            let v = parse_int(trimmed, i64::from(i8::MIN), u64::from(u8::MAX)).ok_or_else(invalid)?;
            narrow::<1>(v)
        }
        ValueType::Int16 => {
            let v = parse_int(trimmed, i64::from(i16::MIN), u64::from(u16::MAX)).ok_or_else(invalid)?;
            narrow::<2>(v)
        }
        ValueType::Int32 => {
            let v = parse_int(trimmed, i64::from(i32::MIN), u64::from(u32::MAX)).ok_or_else(invalid)?;
            narrow::<4>(v)
        }
        ValueType::Int64 => parse_int(trimmed, i64::MIN, u64::MAX).ok_or_else(invalid)?.to_ne_bytes().to_vec(),
        ValueType::Float32 => trimmed.parse::<f32>().map_err(|_| invalid())?.to_ne_bytes().to_vec(),
        ValueType::Float64 => trimmed.parse::<f64>().map_err(|_| invalid())?.to_ne_bytes().to_vec(),
        ValueType::String { length, unicode: false } => {
            if !text.is_ascii() || text.len() > length {
                return Err(invalid());
            }
            let mut out = text.as_bytes().to_vec();
            out.resize(length, 0);
            out
        }
        ValueType::String { length, unicode: true } => {
            let units: Vec<u16> = text.encode_utf16().collect();
            if units.len() > length {
                return Err(invalid());
            }
            let mut out: Vec<u8> = units.iter().flat_map(|u| u.to_ne_bytes()).collect();
            out.resize(length * 2, 0);
            out
        }
        ValueType::ByteArray { length } => {
            let out = trimmed
                .split_whitespace()
                .map(|pair| u8::from_str_radix(pair, 16))
                .collect::<Result<Vec<u8>, _>>()
                .map_err(|_| invalid())?;
            if out.len() != length {
                return Err(invalid());
            }
            out
        }
    };
    Ok(bytes)
}

fn fixed<const N: usize>(bytes: &[u8]) -> InspectResult<[u8; N]>
{
    bytes.try_into().map_err(|_| InspectError::MalformedData {
        expected: N,
        actual: bytes.len(),
    })
}

/// Low `N` bytes of a two's-complement `u64`, in native order
fn narrow<const N: usize>(value: u64) -> Vec<u8>
{
    if cfg!(target_endian = "little") {
        value.to_le_bytes()[..N].to_vec()
    } else {
        value.to_be_bytes()[8 - N..].to_vec()
    }
}

/// Parse a signed or unsigned integer into its two's-complement bit pattern,
/// rejecting anything outside `[min, max_unsigned]`.
fn parse_int(text: &str, min: i64, max_unsigned: u64) -> Option<u64>
{
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok().filter(|v| *v <= max_unsigned);
    }
    if let Ok(signed) = text.parse::<i64>() {
        if signed < min || (signed > 0 && signed.unsigned_abs() > max_unsigned) {
            return None;
        }
        return Some(u64::from_ne_bytes(signed.to_ne_bytes()));
    }
    text.parse::<u64>().ok().filter(|v| *v <= max_unsigned)
}

/// Single-byte characters up to the first NUL; non-ASCII bytes become U+FFFD
fn decode_narrow(bytes: &[u8]) -> String
{
    bytes
        .iter()
        .take_while(|b| **b != 0)
        .map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER })
        .collect()
}

/// UTF-16 code units up to the first zero unit
fn decode_wide(bytes: &[u8]) -> String
{
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0);
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn decode_rejects_wrong_width()
    {
        let err = decode(&[1, 2, 3], ValueType::Int32).unwrap_err();
        assert!(matches!(err, InspectError::MalformedData { expected: 4, actual: 3 }));
    }

    #[test]
    fn decode_narrow_string_stops_at_terminator()
    {
        let ty = ValueType::String {
            length: 8,
            unicode: false,
        };
        assert_eq!(decode(b"health\0x", ty).unwrap(), "health");
    }

    #[test]
    fn decode_wide_string_stops_at_terminator()
    {
        let ty = ValueType::String {
            length: 4,
            unicode: true,
        };
        let bytes = encode("hp", ty).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode(&bytes, ty).unwrap(), "hp");
    }

    #[test]
    fn decode_narrow_replaces_high_bytes()
    {
        let ty = ValueType::String {
            length: 2,
            unicode: false,
        };
        assert_eq!(decode(&[b'a', 0xff], ty).unwrap(), "a\u{fffd}");
    }

    #[test]
    fn encode_int8_accepts_unsigned_spelling()
    {
        assert_eq!(encode("255", ValueType::Int8).unwrap(), vec![0xff]);
        assert_eq!(decode(&[0xff], ValueType::Int8).unwrap(), "-1");
        assert!(encode("256", ValueType::Int8).is_err());
        assert!(encode("-129", ValueType::Int8).is_err());
    }

    #[test]
    fn encode_int16_hex_literal()
    {
        assert_eq!(encode("0x1234", ValueType::Int16).unwrap(), 0x1234u16.to_ne_bytes().to_vec());
    }

    #[test]
    fn encode_byte_array_requires_exact_count()
    {
        let ty = ValueType::ByteArray { length: 3 };
        assert_eq!(encode("90 90 cc", ty).unwrap(), vec![0x90, 0x90, 0xcc]);
        assert!(encode("90 90", ty).is_err());
        assert!(encode("90 zz cc", ty).is_err());
    }

    #[test]
    fn encode_string_rejects_overflow()
    {
        let ty = ValueType::String {
            length: 2,
            unicode: false,
        };
        assert!(encode("abc", ty).is_err());
    }

    #[test]
    fn zero_length_types_are_rejected()
    {
        let ty = ValueType::ByteArray { length: 0 };
        assert!(matches!(decode(&[], ty), Err(InspectError::InvalidLength(_))));
    }
}
