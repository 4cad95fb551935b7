//! Avro binary decoding of primitive and complex values.
//!
//! Decoders consume from a `&mut &[u8]` cursor and follow the Avro binary
//! encoding: zigzag varints for ints and longs, little-endian IEEE 754 for
//! floats and doubles, length-prefixed bytes and strings, and the block
//! protocol for arrays and maps. A short read anywhere is
//! [`DecodeError::UnexpectedEof`].

use std::collections::HashMap;

use crate::error::DecodeError;

use super::schema::{AvroType, Primitive};

/// A decoded Avro value.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    /// Enum symbol resolved through the schema's symbol table.
    Enum(String),
    /// Map entries; duplicate keys overwrite, last write wins.
    Map(HashMap<String, AvroValue>),
    /// Record fields in schema order, tagged with the record's schema name.
    Record {
        name: String,
        fields: Vec<(String, AvroValue)>,
    },
}

impl AvroValue {
    /// Borrow the inner string, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AvroValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&AvroValue> {
        match self {
            AvroValue::Record { fields, .. } => {
                fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }
}

/// Read exactly `len` bytes, or fail if the stream ends first.
#[inline]
pub fn read_fixed<'a>(data: &mut &'a [u8], len: usize) -> Result<&'a [u8], DecodeError> {
    if data.len() < len {
        return Err(DecodeError::UnexpectedEof);
    }
    let (head, rest) = data.split_at(len);
    *data = rest;
    Ok(head)
}

#[inline]
fn read_byte(data: &mut &[u8]) -> Result<u8, DecodeError> {
    Ok(read_fixed(data, 1)?[0])
}

/// Decode a zigzag-encoded variable-length long.
///
/// 7 data bits per byte, little-endian, continuation bit in the MSB.
/// Magnitudes beyond 64 accumulated bits are an overflow error.
#[inline]
pub fn read_long(data: &mut &[u8]) -> Result<i64, DecodeError> {
    let mut encoded: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = read_byte(data)?;
        if shift >= 64 || (shift == 63 && (byte & 0x7F) > 1) {
            return Err(DecodeError::IntegerOverflow);
        }
        encoded |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            // Zigzag decode: (n >> 1) ^ -(n & 1)
            return Ok(((encoded >> 1) as i64) ^ (-((encoded & 1) as i64)));
        }
        shift += 7;
    }
}

/// Decode an int. Avro does not distinguish int from long on the wire, but
/// a value outside the i32 range is an overflow error.
#[inline]
pub fn read_int(data: &mut &[u8]) -> Result<i32, DecodeError> {
    let long = read_long(data)?;
    i32::try_from(long).map_err(|_| DecodeError::IntOutOfRange(long))
}

/// Decode a boolean from a single byte; anything but 0 or 1 is an error.
#[inline]
pub fn read_boolean(data: &mut &[u8]) -> Result<bool, DecodeError> {
    match read_byte(data)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DecodeError::InvalidBoolean(other)),
    }
}

/// Decode a 32-bit IEEE 754 float (little-endian).
#[inline]
pub fn read_float(data: &mut &[u8]) -> Result<f32, DecodeError> {
    let bytes = read_fixed(data, 4)?;
    Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode a 64-bit IEEE 754 double (little-endian).
#[inline]
pub fn read_double(data: &mut &[u8]) -> Result<f64, DecodeError> {
    let bytes = read_fixed(data, 8)?;
    Ok(f64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ]))
}

/// Decode a length-prefixed byte array. Negative lengths are an error.
#[inline]
pub fn read_bytes(data: &mut &[u8]) -> Result<Vec<u8>, DecodeError> {
    let len = read_long(data)?;
    if len < 0 {
        return Err(DecodeError::NegativeLength(len));
    }
    Ok(read_fixed(data, len as usize)?.to_vec())
}

/// Decode a length-prefixed UTF-8 string.
#[inline]
pub fn read_string(data: &mut &[u8]) -> Result<String, DecodeError> {
    let bytes = read_bytes(data)?;
    String::from_utf8(bytes).map_err(DecodeError::from)
}

/// Decode a block-encoded array with a caller-supplied item decoder.
///
/// Blocks repeat until a zero count. A negative count carries a byte-size
/// hint in the following long (read and discarded) and the true item count
/// is the count's absolute value.
pub fn read_array<T>(
    data: &mut &[u8],
    mut read_item: impl FnMut(&mut &[u8]) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    let mut items = Vec::new();
    loop {
        let count = read_long(data)?;
        if count == 0 {
            return Ok(items);
        }
        let count = if count < 0 {
            let _byte_size = read_long(data)?;
            count.unsigned_abs()
        } else {
            count as u64
        };
        for _ in 0..count {
            items.push(read_item(data)?);
        }
    }
}

/// Decode a block-encoded map of string keys to decoded values.
///
/// Same block protocol as [`read_array`]; duplicate keys silently
/// overwrite, last write wins.
pub fn read_map<T>(
    data: &mut &[u8],
    mut read_item: impl FnMut(&mut &[u8]) -> Result<T, DecodeError>,
) -> Result<HashMap<String, T>, DecodeError> {
    let pairs = read_array(data, |d| {
        let key = read_string(d)?;
        let value = read_item(d)?;
        Ok((key, value))
    })?;
    Ok(pairs.into_iter().collect())
}

impl AvroType {
    /// Decode one value described by this schema node.
    ///
    /// Recurses through the decoder tree; `null` consumes no bytes.
    pub fn decode(&self, data: &mut &[u8]) -> Result<AvroValue, DecodeError> {
        match self {
            AvroType::Primitive(primitive) => match primitive {
                Primitive::Null => Ok(AvroValue::Null),
                Primitive::Boolean => read_boolean(data).map(AvroValue::Boolean),
                Primitive::Int => read_int(data).map(AvroValue::Int),
                Primitive::Long => read_long(data).map(AvroValue::Long),
                Primitive::Float => read_float(data).map(AvroValue::Float),
                Primitive::Double => read_double(data).map(AvroValue::Double),
                Primitive::Bytes => read_bytes(data).map(AvroValue::Bytes),
                Primitive::String => read_string(data).map(AvroValue::String),
            },
            AvroType::Enum(symbols) => {
                let index = read_int(data)?;
                let symbol = usize::try_from(index)
                    .ok()
                    .and_then(|i| symbols.get(i))
                    .ok_or(DecodeError::EnumIndexOutOfRange {
                        index,
                        len: symbols.len(),
                    })?;
                Ok(AvroValue::Enum(symbol.clone()))
            }
            AvroType::Union(members) => {
                let index = read_int(data)?;
                let member = usize::try_from(index)
                    .ok()
                    .and_then(|i| members.get(i))
                    .ok_or(DecodeError::UnionIndexOutOfRange {
                        index,
                        len: members.len(),
                    })?;
                member.decode(data)
            }
            AvroType::Map(value_type) => {
                read_map(data, |d| value_type.decode(d)).map(AvroValue::Map)
            }
            AvroType::Record(record) => {
                let mut fields = Vec::with_capacity(record.fields.len());
                for (name, field_type) in &record.fields {
                    fields.push((name.clone(), field_type.decode(data)?));
                }
                Ok(AvroValue::Record {
                    name: record.name.clone(),
                    fields,
                })
            }
        }
    }
}

/// Encode an unsigned varint. Used by tests and fixture builders.
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return out;
        }
    }
}

/// Encode a zigzag varint long. Used by tests and fixture builders.
pub fn encode_zigzag(value: i64) -> Vec<u8> {
    encode_varint(((value << 1) ^ (value >> 63)) as u64)
}

/// Encode a length-prefixed string. Used by tests and fixture builders.
pub fn encode_string(s: &str) -> Vec<u8> {
    let mut out = encode_zigzag(s.len() as i64);
    out.extend_from_slice(s.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avro::schema::{parse_schema, RecordType};

    #[test]
    fn test_read_fixed_short_read() {
        let data: &[u8] = &[0x01, 0x02];
        let mut cursor = data;
        assert!(matches!(
            read_fixed(&mut cursor, 3),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_read_long_small_values() {
        for (bytes, expected) in [
            (vec![0x00], 0i64),
            (vec![0x01], -1),
            (vec![0x02], 1),
            (vec![0x03], -2),
            (vec![0x04], 2),
        ] {
            let mut cursor = &bytes[..];
            assert_eq!(read_long(&mut cursor).unwrap(), expected);
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn test_read_long_across_28_bit_boundary() {
        // The boundary where 32-bit accumulation would overflow.
        for value in [
            -1i64,
            0,
            1,
            (1 << 28) - 1,
            1 << 28,
            (1 << 53) - 1,
            i64::MAX,
            i64::MIN,
        ] {
            let encoded = encode_zigzag(value);
            let mut cursor = &encoded[..];
            assert_eq!(read_long(&mut cursor).unwrap(), value, "value {value}");
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn test_read_long_overflow() {
        // 11 continuation bytes exceed the 64-bit accumulator.
        let data = [0xFF; 11];
        let mut cursor = &data[..];
        assert!(matches!(
            read_long(&mut cursor),
            Err(DecodeError::IntegerOverflow)
        ));

        // 10 bytes whose top byte carries more than the single remaining bit.
        let data: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        let mut cursor = data;
        assert!(matches!(
            read_long(&mut cursor),
            Err(DecodeError::IntegerOverflow)
        ));
    }

    #[test]
    fn test_read_long_truncated() {
        let data: &[u8] = &[0x80];
        let mut cursor = data;
        assert!(matches!(
            read_long(&mut cursor),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_read_int_range_check() {
        let encoded = encode_zigzag(i64::from(i32::MAX) + 1);
        let mut cursor = &encoded[..];
        assert!(matches!(
            read_int(&mut cursor),
            Err(DecodeError::IntOutOfRange(_))
        ));

        let encoded = encode_zigzag(i64::from(i32::MIN));
        let mut cursor = &encoded[..];
        assert_eq!(read_int(&mut cursor).unwrap(), i32::MIN);
    }

    #[test]
    fn test_read_boolean() {
        let mut cursor: &[u8] = &[0x01, 0x00, 0x02];
        assert!(read_boolean(&mut cursor).unwrap());
        assert!(!read_boolean(&mut cursor).unwrap());
        assert!(matches!(
            read_boolean(&mut cursor),
            Err(DecodeError::InvalidBoolean(2))
        ));
    }

    #[test]
    fn test_read_float_and_double() {
        let mut cursor: &[u8] = &1.5f32.to_le_bytes();
        assert_eq!(read_float(&mut cursor).unwrap(), 1.5);

        let mut cursor: &[u8] = &(-2.25f64).to_le_bytes();
        assert_eq!(read_double(&mut cursor).unwrap(), -2.25);
    }

    #[test]
    fn test_read_bytes_negative_length() {
        let encoded = encode_zigzag(-5);
        let mut cursor = &encoded[..];
        assert!(matches!(
            read_bytes(&mut cursor),
            Err(DecodeError::NegativeLength(-5))
        ));
    }

    #[test]
    fn test_read_string() {
        let encoded = encode_string("changefeed");
        let mut cursor = &encoded[..];
        assert_eq!(read_string(&mut cursor).unwrap(), "changefeed");
    }

    #[test]
    fn test_read_string_invalid_utf8() {
        let mut encoded = encode_zigzag(2);
        encoded.extend_from_slice(&[0xFF, 0xFE]);
        let mut cursor = &encoded[..];
        assert!(matches!(
            read_string(&mut cursor),
            Err(DecodeError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_read_array_single_block() {
        let mut encoded = encode_zigzag(3);
        for v in [10i64, 20, 30] {
            encoded.extend_from_slice(&encode_zigzag(v));
        }
        encoded.extend_from_slice(&encode_zigzag(0));

        let mut cursor = &encoded[..];
        let items = read_array(&mut cursor, read_long).unwrap();
        assert_eq!(items, vec![10, 20, 30]);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_read_array_negative_count_discards_size_hint() {
        // Block of 2 items announced as -2 with a byte-size hint.
        let mut encoded = encode_zigzag(-2);
        encoded.extend_from_slice(&encode_zigzag(2)); // size hint, ignored
        encoded.extend_from_slice(&encode_zigzag(7));
        encoded.extend_from_slice(&encode_zigzag(8));
        encoded.extend_from_slice(&encode_zigzag(0));

        let mut cursor = &encoded[..];
        let items = read_array(&mut cursor, read_long).unwrap();
        assert_eq!(items, vec![7, 8]);
    }

    #[test]
    fn test_read_array_multiple_blocks() {
        let mut encoded = encode_zigzag(1);
        encoded.extend_from_slice(&encode_zigzag(1));
        encoded.extend_from_slice(&encode_zigzag(2));
        encoded.extend_from_slice(&encode_zigzag(2));
        encoded.extend_from_slice(&encode_zigzag(3));
        encoded.extend_from_slice(&encode_zigzag(0));

        let mut cursor = &encoded[..];
        let items = read_array(&mut cursor, read_long).unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn test_read_map_duplicate_keys_last_wins() {
        let mut encoded = encode_zigzag(2);
        encoded.extend_from_slice(&encode_string("k"));
        encoded.extend_from_slice(&encode_zigzag(1));
        encoded.extend_from_slice(&encode_string("k"));
        encoded.extend_from_slice(&encode_zigzag(2));
        encoded.extend_from_slice(&encode_zigzag(0));

        let mut cursor = &encoded[..];
        let map = read_map(&mut cursor, read_long).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["k"], 2);
    }

    #[test]
    fn test_decode_null_consumes_nothing() {
        let schema = parse_schema(r#""null""#).unwrap();
        let data: &[u8] = &[0x42];
        let mut cursor = data;
        assert_eq!(schema.decode(&mut cursor).unwrap(), AvroValue::Null);
        assert_eq!(cursor.len(), 1);
    }

    #[test]
    fn test_decode_enum() {
        let schema =
            parse_schema(r#"{"type": "enum", "name": "E", "symbols": ["A", "B", "C"]}"#).unwrap();

        let encoded = encode_zigzag(1);
        let mut cursor = &encoded[..];
        assert_eq!(
            schema.decode(&mut cursor).unwrap(),
            AvroValue::Enum("B".to_string())
        );

        let encoded = encode_zigzag(3);
        let mut cursor = &encoded[..];
        assert!(matches!(
            schema.decode(&mut cursor),
            Err(DecodeError::EnumIndexOutOfRange { index: 3, len: 3 })
        ));

        let encoded = encode_zigzag(-1);
        let mut cursor = &encoded[..];
        assert!(matches!(
            schema.decode(&mut cursor),
            Err(DecodeError::EnumIndexOutOfRange { index: -1, .. })
        ));
    }

    #[test]
    fn test_decode_union() {
        let schema = parse_schema(r#"["null", "long"]"#).unwrap();

        let encoded = encode_zigzag(0);
        let mut cursor = &encoded[..];
        assert_eq!(schema.decode(&mut cursor).unwrap(), AvroValue::Null);

        let mut encoded = encode_zigzag(1);
        encoded.extend_from_slice(&encode_zigzag(99));
        let mut cursor = &encoded[..];
        assert_eq!(schema.decode(&mut cursor).unwrap(), AvroValue::Long(99));

        let encoded = encode_zigzag(2);
        let mut cursor = &encoded[..];
        assert!(matches!(
            schema.decode(&mut cursor),
            Err(DecodeError::UnionIndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_decode_record_tags_schema_name() {
        let schema = AvroType::Record(RecordType {
            name: "ChangeEvent".to_string(),
            fields: vec![
                ("id".to_string(), parse_schema(r#""long""#).unwrap()),
                ("subject".to_string(), parse_schema(r#""string""#).unwrap()),
            ],
        });

        let mut encoded = encode_zigzag(7);
        encoded.extend_from_slice(&encode_string("blob.txt"));
        let mut cursor = &encoded[..];

        let value = schema.decode(&mut cursor).unwrap();
        let AvroValue::Record { name, fields } = &value else {
            panic!("expected record");
        };
        assert_eq!(name, "ChangeEvent");
        assert_eq!(fields[0], ("id".to_string(), AvroValue::Long(7)));
        assert_eq!(
            value.field("subject").and_then(AvroValue::as_str),
            Some("blob.txt")
        );
    }

    #[test]
    fn test_decode_map_of_union() {
        let schema = parse_schema(r#"{"type": "map", "values": ["null", "string"]}"#).unwrap();

        let mut encoded = encode_zigzag(1);
        encoded.extend_from_slice(&encode_string("key"));
        encoded.extend_from_slice(&encode_zigzag(1));
        encoded.extend_from_slice(&encode_string("value"));
        encoded.extend_from_slice(&encode_zigzag(0));

        let mut cursor = &encoded[..];
        let AvroValue::Map(map) = schema.decode(&mut cursor).unwrap() else {
            panic!("expected map");
        };
        assert_eq!(map["key"], AvroValue::String("value".to_string()));
    }

    #[test]
    fn test_zigzag_roundtrip() {
        for value in [0i64, 1, -1, 63, -64, 8192, -8193, i64::MAX, i64::MIN] {
            let encoded = encode_zigzag(value);
            let mut cursor = &encoded[..];
            assert_eq!(read_long(&mut cursor).unwrap(), value);
        }
    }
}
