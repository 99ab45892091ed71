//! Tests for the value codec

use memscope_core::codec::{decode, encode};
use memscope_core::error::InspectError;
use memscope_core::types::{ValueKind, ValueType};

#[test]
fn test_numeric_values_survive_encode_decode()
{
    let cases: [(ValueType, &[&str]); 6] = [
        (ValueType::Int8, &["-128", "-1", "0", "127"]),
        (ValueType::Int16, &["-32768", "0", "32767"]),
        (ValueType::Int32, &["-2147483648", "1337", "2147483647"]),
        (ValueType::Int64, &["-9223372036854775808", "9223372036854775807"]),
        (ValueType::Float32, &["0", "-1.5", "0.1", "1024.25"]),
        (ValueType::Float64, &["2.718281828459045", "-0.5", "123456.789"]),
    ];

    for (ty, values) in cases {
        for &value in values {
            let bytes = encode(value, ty).unwrap();
            assert_eq!(bytes.len(), ty.width(), "{ty} width");
            assert_eq!(decode(&bytes, ty).unwrap(), value, "{ty} {value}");
        }
    }
}

#[test]
fn test_float_special_values()
{
    assert_eq!(decode(&f32::NAN.to_ne_bytes(), ValueType::Float32).unwrap(), "NaN");
    assert_eq!(decode(&f64::INFINITY.to_ne_bytes(), ValueType::Float64).unwrap(), "inf");
}

#[test]
fn test_malformed_iff_length_differs()
{
    let types = [
        ValueType::ByteArray { length: 4 },
        ValueType::String {
            length: 4,
            unicode: false,
        },
        ValueType::String {
            length: 4,
            unicode: true,
        },
    ];

    for ty in types {
        for len in 0..=12 {
            let bytes = vec![0x41; len];
            let result = decode(&bytes, ty);
            if len == ty.width() {
                assert!(result.is_ok(), "{ty} with {len} bytes");
            } else {
                assert!(
                    matches!(result, Err(InspectError::MalformedData { expected, actual }) if expected == ty.width() && actual == len),
                    "{ty} with {len} bytes"
                );
            }
        }
    }
}

#[test]
fn test_byte_array_display()
{
    let ty = ValueType::ByteArray { length: 4 };
    assert_eq!(decode(&[0x00, 0x0f, 0xa0, 0xff], ty).unwrap(), "00 0f a0 ff");
}

#[test]
fn test_wide_string_without_terminator_uses_full_length()
{
    let ty = ValueType::String {
        length: 3,
        unicode: true,
    };
    let bytes: Vec<u8> = "héé".encode_utf16().flat_map(u16::to_ne_bytes).collect();
    assert_eq!(decode(&bytes, ty).unwrap(), "héé");
}

#[test]
fn test_invalid_text_is_rejected()
{
    assert!(matches!(
        encode("twelve", ValueType::Int32),
        Err(InspectError::InvalidValue { .. })
    ));
    assert!(encode("1.5.2", ValueType::Float64).is_err());
}

#[test]
fn test_value_type_requires_length()
{
    assert!(matches!(
        ValueType::new(ValueKind::String, None, false),
        Err(InspectError::InvalidLength(_))
    ));
    assert!(matches!(
        ValueType::new(ValueKind::ByteArray, Some(0), false),
        Err(InspectError::InvalidLength(_))
    ));
    assert_eq!(ValueType::new(ValueKind::Int32, Some(99), true).unwrap(), ValueType::Int32);
    assert_eq!(
        ValueType::new(ValueKind::String, Some(6), true).unwrap().width(),
        12
    );
}
