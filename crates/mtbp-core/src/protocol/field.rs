//! Field types, field values and the scalar / variable-width field codec.
//!
//! Wire encoding of the non-composite types (all multi-byte integers are
//! big-endian, signed values are two's complement):
//!
//! ```text
//! UInt8 / Int8 / Bool / Enum      1 byte
//! UInt16 / Int16                  2 bytes
//! UInt32 / Int32                  4 bytes
//! UInt64 / Int64                  8 bytes
//! Utf8String / Bytes              [len:2][len bytes]
//! ```
//!
//! `Array` and `Message` fields contain other fields; they are framed by
//! [`crate::protocol::element`] and [`crate::protocol::codec`] respectively.
//!
//! # Reading untrusted input
//!
//! Every read goes through [`take`], which checks `offset + len` against the
//! buffer *before* slicing.  A truncated buffer therefore always yields
//! [`ParseError::InvalidSize`] rather than a panic or an out-of-bounds read.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::element::Element;
use crate::protocol::error::ParseError;
use crate::protocol::message::Message;

/// Largest length a 2-byte length prefix can express.
pub const MAX_VARIABLE_LENGTH: usize = u16::MAX as usize;

/// Size of the big-endian length prefix used by strings, byte blobs, arrays
/// and elements.
pub const LENGTH_PREFIX_SIZE: usize = 2;

// ── Field types ───────────────────────────────────────────────────────────────

/// Declared type of a field, as found in a schema entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Bool,
    Utf8String,
    Bytes,
    Enum,
    /// Array of indexed elements; the list is the layout of every element.
    Array(Vec<FieldDef>),
    /// A complete nested frame, decoded through the schema registry.
    Message,
}

impl FieldType {
    /// Encoded width in bytes for fixed-width types, `None` otherwise.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            FieldType::UInt8 | FieldType::Int8 | FieldType::Bool | FieldType::Enum => Some(1),
            FieldType::UInt16 | FieldType::Int16 => Some(2),
            FieldType::UInt32 | FieldType::Int32 => Some(4),
            FieldType::UInt64 | FieldType::Int64 => Some(8),
            FieldType::Utf8String | FieldType::Bytes | FieldType::Array(_) | FieldType::Message => {
                None
            }
        }
    }

    /// `true` for types that contain other fields.
    pub fn is_composite(&self) -> bool {
        matches!(self, FieldType::Array(_) | FieldType::Message)
    }

    /// Checks that `value` carries the tag this type expects and fits its width.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidFieldValue`] on a tag mismatch or an
    /// out-of-range integer, and propagates element layout errors for arrays.
    pub fn check_value(&self, value: &FieldValue) -> Result<(), ParseError> {
        let fits = match (self, value) {
            (FieldType::UInt8, FieldValue::UInt(v)) => *v <= u64::from(u8::MAX),
            (FieldType::UInt16, FieldValue::UInt(v)) => *v <= u64::from(u16::MAX),
            (FieldType::UInt32, FieldValue::UInt(v)) => *v <= u64::from(u32::MAX),
            (FieldType::UInt64, FieldValue::UInt(_)) => true,
            (FieldType::Int8, FieldValue::Int(v)) => i8::try_from(*v).is_ok(),
            (FieldType::Int16, FieldValue::Int(v)) => i16::try_from(*v).is_ok(),
            (FieldType::Int32, FieldValue::Int(v)) => i32::try_from(*v).is_ok(),
            (FieldType::Int64, FieldValue::Int(_)) => true,
            (FieldType::Bool, FieldValue::Bool(_))
            | (FieldType::Utf8String, FieldValue::Utf8String(_))
            | (FieldType::Bytes, FieldValue::Bytes(_))
            | (FieldType::Enum, FieldValue::Enum(_))
            | (FieldType::Message, FieldValue::Message(_)) => true,
            (FieldType::Array(defs), FieldValue::Array(elements)) => {
                for element in elements {
                    conform_fields(defs, element.fields())
                        .map_err(|e| e.within(format_args!("element {}", element.index())))?;
                }
                true
            }
            _ => false,
        };

        if fits {
            Ok(())
        } else {
            Err(ParseError::InvalidFieldValue(format!(
                "{value} does not fit field type {self}"
            )))
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::UInt8 => "uint8",
            FieldType::UInt16 => "uint16",
            FieldType::UInt32 => "uint32",
            FieldType::UInt64 => "uint64",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Bool => "bool",
            FieldType::Utf8String => "utf8string",
            FieldType::Bytes => "bytes",
            FieldType::Enum => "enum",
            FieldType::Array(_) => "array",
            FieldType::Message => "message",
        };
        f.write_str(name)
    }
}

/// One declared field of a message or array element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Optional fields may be absent when the payload ends before them.
    #[serde(default)]
    pub optional: bool,
}

impl FieldDef {
    /// A field every payload must carry.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            optional: false,
        }
    }

    /// A field that may be cut off at the end of the payload.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            optional: true,
        }
    }
}

// ── Field values ──────────────────────────────────────────────────────────────

/// A decoded or application-supplied field value.
///
/// Integer widths are carried by the owning [`Field`]'s [`FieldType`], so one
/// `UInt` / `Int` variant covers all four widths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldValue {
    UInt(u64),
    Int(i64),
    Bool(bool),
    Utf8String(String),
    Bytes(Vec<u8>),
    Enum(u8),
    Array(Vec<Element>),
    Message(Box<Message>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::UInt(v) => write!(f, "uint value {v}"),
            FieldValue::Int(v) => write!(f, "int value {v}"),
            FieldValue::Bool(v) => write!(f, "bool value {v}"),
            FieldValue::Utf8String(s) => write!(f, "string value of {} bytes", s.len()),
            FieldValue::Bytes(b) => write!(f, "bytes value of {} bytes", b.len()),
            FieldValue::Enum(v) => write!(f, "enum value {v}"),
            FieldValue::Array(elements) => write!(f, "array of {} elements", elements.len()),
            FieldValue::Message(m) => {
                write!(f, "message {}:{}", m.service_id(), m.message_id())
            }
        }
    }
}

// ── Field ─────────────────────────────────────────────────────────────────────

/// A typed field.  The value's tag always matches the field type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawField")]
pub struct Field {
    field_type: FieldType,
    value: FieldValue,
}

#[derive(Deserialize)]
struct RawField {
    field_type: FieldType,
    value: FieldValue,
}

impl TryFrom<RawField> for Field {
    type Error = ParseError;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        Field::new(raw.field_type, raw.value)
    }
}

impl Field {
    /// Builds a field, rejecting a value that does not match `field_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidFieldValue`] if the value's tag or range
    /// does not fit the type; array elements must follow the element layout.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mtbp_core::protocol::field::{Field, FieldType, FieldValue};
    ///
    /// assert!(Field::new(FieldType::UInt8, FieldValue::UInt(255)).is_ok());
    /// assert!(Field::new(FieldType::UInt8, FieldValue::UInt(256)).is_err());
    /// assert!(Field::new(FieldType::Bool, FieldValue::UInt(1)).is_err());
    /// ```
    pub fn new(field_type: FieldType, value: FieldValue) -> Result<Self, ParseError> {
        field_type.check_value(&value)?;
        Ok(Self { field_type, value })
    }

    /// Skips the check; only for values the decoder produced for this type.
    pub(crate) fn from_decoded(field_type: FieldType, value: FieldValue) -> Self {
        Self { field_type, value }
    }

    /// `UInt8` field.
    pub fn uint8(v: u8) -> Self {
        Self::from_decoded(FieldType::UInt8, FieldValue::UInt(u64::from(v)))
    }

    /// `UInt16` field.
    pub fn uint16(v: u16) -> Self {
        Self::from_decoded(FieldType::UInt16, FieldValue::UInt(u64::from(v)))
    }

    /// `UInt32` field.
    pub fn uint32(v: u32) -> Self {
        Self::from_decoded(FieldType::UInt32, FieldValue::UInt(u64::from(v)))
    }

    /// `UInt64` field.
    pub fn uint64(v: u64) -> Self {
        Self::from_decoded(FieldType::UInt64, FieldValue::UInt(v))
    }

    /// `Int8` field.
    pub fn int8(v: i8) -> Self {
        Self::from_decoded(FieldType::Int8, FieldValue::Int(i64::from(v)))
    }

    /// `Int16` field.
    pub fn int16(v: i16) -> Self {
        Self::from_decoded(FieldType::Int16, FieldValue::Int(i64::from(v)))
    }

    /// `Int32` field.
    pub fn int32(v: i32) -> Self {
        Self::from_decoded(FieldType::Int32, FieldValue::Int(i64::from(v)))
    }

    /// `Int64` field.
    pub fn int64(v: i64) -> Self {
        Self::from_decoded(FieldType::Int64, FieldValue::Int(v))
    }

    /// `Bool` field, encoded as 0 or 1.
    pub fn boolean(v: bool) -> Self {
        Self::from_decoded(FieldType::Bool, FieldValue::Bool(v))
    }

    /// `Utf8String` field.
    pub fn string(v: impl Into<String>) -> Self {
        Self::from_decoded(FieldType::Utf8String, FieldValue::Utf8String(v.into()))
    }

    /// `Bytes` field.
    pub fn bytes(v: impl Into<Vec<u8>>) -> Self {
        Self::from_decoded(FieldType::Bytes, FieldValue::Bytes(v.into()))
    }

    /// `Enum` field holding a raw one-byte discriminant.
    pub fn enumeration(v: u8) -> Self {
        Self::from_decoded(FieldType::Enum, FieldValue::Enum(v))
    }

    /// `Message` field; `v` is encoded as a complete nested frame.
    pub fn message(v: Message) -> Self {
        Self::from_decoded(FieldType::Message, FieldValue::Message(Box::new(v)))
    }

    /// Builds an array field whose elements follow `element_layout`.
    ///
    /// # Errors
    ///
    /// Returns an error if any element does not follow the layout.
    pub fn array(
        element_layout: Vec<FieldDef>,
        elements: Vec<Element>,
    ) -> Result<Self, ParseError> {
        Self::new(FieldType::Array(element_layout), FieldValue::Array(elements))
    }

    /// Declared type of the field.
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// The value, whose tag matches [`Field::field_type`].
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Consumes the field, returning its value.
    pub fn into_value(self) -> FieldValue {
        self.value
    }
}

/// Checks a positional field list against its declared layout.
///
/// Fields are matched to definitions by position.  Trailing definitions may
/// be absent only when they are optional.
pub(crate) fn conform_fields(defs: &[FieldDef], fields: &[Field]) -> Result<(), ParseError> {
    if fields.len() > defs.len() {
        return Err(ParseError::InvalidStructure(format!(
            "{} fields present but only {} declared",
            fields.len(),
            defs.len()
        )));
    }
    for (position, def) in defs.iter().enumerate() {
        match fields.get(position) {
            Some(field) if field.field_type != def.field_type => {
                return Err(ParseError::InvalidFieldValue(format!(
                    "field '{}' is declared {} but holds {}",
                    def.name, def.field_type, field.field_type
                )));
            }
            Some(_) => {}
            None if def.optional => {}
            None => return Err(ParseError::MissingField(format!("'{}'", def.name))),
        }
    }
    Ok(())
}

// ── Scalar / variable-width codec ─────────────────────────────────────────────

/// Appends the wire encoding of a non-composite value to `buf`.
///
/// # Errors
///
/// - [`ParseError::InvalidFieldValue`] – tag mismatch or value out of range.
/// - [`ParseError::InvalidSize`] – string or byte blob longer than 65535 bytes.
/// - [`ParseError::InvalidFieldType`] – `field_type` is `Array` or `Message`.
pub fn encode_scalar(
    field_type: &FieldType,
    value: &FieldValue,
    buf: &mut Vec<u8>,
) -> Result<(), ParseError> {
    if field_type.is_composite() {
        return Err(ParseError::InvalidFieldType(format!(
            "{field_type} is not a scalar or variable-width type"
        )));
    }
    field_type.check_value(value)?;

    // The range check above makes the narrowing casts below lossless.
    match (field_type, value) {
        (FieldType::UInt8, FieldValue::UInt(v)) => buf.push(*v as u8),
        (FieldType::UInt16, FieldValue::UInt(v)) => {
            buf.extend_from_slice(&(*v as u16).to_be_bytes());
        }
        (FieldType::UInt32, FieldValue::UInt(v)) => {
            buf.extend_from_slice(&(*v as u32).to_be_bytes());
        }
        (FieldType::UInt64, FieldValue::UInt(v)) => buf.extend_from_slice(&v.to_be_bytes()),
        (FieldType::Int8, FieldValue::Int(v)) => buf.extend_from_slice(&(*v as i8).to_be_bytes()),
        (FieldType::Int16, FieldValue::Int(v)) => buf.extend_from_slice(&(*v as i16).to_be_bytes()),
        (FieldType::Int32, FieldValue::Int(v)) => buf.extend_from_slice(&(*v as i32).to_be_bytes()),
        (FieldType::Int64, FieldValue::Int(v)) => buf.extend_from_slice(&v.to_be_bytes()),
        (FieldType::Bool, FieldValue::Bool(v)) => buf.push(u8::from(*v)),
        (FieldType::Enum, FieldValue::Enum(v)) => buf.push(*v),
        (FieldType::Utf8String, FieldValue::Utf8String(s)) => {
            write_length_prefixed(buf, s.as_bytes(), "string")?;
        }
        (FieldType::Bytes, FieldValue::Bytes(b)) => write_length_prefixed(buf, b, "bytes")?,
        _ => {
            return Err(ParseError::InvalidFieldValue(format!(
                "{value} does not fit field type {field_type}"
            )))
        }
    }
    Ok(())
}

/// Decodes one non-composite value of type `field_type` starting at `offset`.
///
/// Returns the value and the offset of the first byte after it.
///
/// # Errors
///
/// - [`ParseError::InvalidSize`] – the value (or its length prefix) runs past
///   the end of `buf`.
/// - [`ParseError::DecodeFailed`] – a string is not valid UTF-8.
/// - [`ParseError::InvalidFieldType`] – `field_type` is `Array` or `Message`.
pub fn decode_scalar(
    buf: &[u8],
    offset: usize,
    field_type: &FieldType,
) -> Result<(FieldValue, usize), ParseError> {
    let value = match field_type {
        FieldType::UInt8 => {
            let [b] = read_array::<1>(buf, offset, "uint8")?;
            FieldValue::UInt(u64::from(b))
        }
        FieldType::UInt16 => {
            let raw = read_array(buf, offset, "uint16")?;
            FieldValue::UInt(u64::from(u16::from_be_bytes(raw)))
        }
        FieldType::UInt32 => {
            let raw = read_array(buf, offset, "uint32")?;
            FieldValue::UInt(u64::from(u32::from_be_bytes(raw)))
        }
        FieldType::UInt64 => {
            let raw = read_array(buf, offset, "uint64")?;
            FieldValue::UInt(u64::from_be_bytes(raw))
        }
        FieldType::Int8 => {
            let raw = read_array(buf, offset, "int8")?;
            FieldValue::Int(i64::from(i8::from_be_bytes(raw)))
        }
        FieldType::Int16 => {
            let raw = read_array(buf, offset, "int16")?;
            FieldValue::Int(i64::from(i16::from_be_bytes(raw)))
        }
        FieldType::Int32 => {
            let raw = read_array(buf, offset, "int32")?;
            FieldValue::Int(i64::from(i32::from_be_bytes(raw)))
        }
        FieldType::Int64 => {
            let raw = read_array(buf, offset, "int64")?;
            FieldValue::Int(i64::from_be_bytes(raw))
        }
        FieldType::Bool => {
            let [b] = read_array::<1>(buf, offset, "bool")?;
            FieldValue::Bool(b != 0)
        }
        FieldType::Enum => {
            let [b] = read_array::<1>(buf, offset, "enum")?;
            FieldValue::Enum(b)
        }
        FieldType::Utf8String => {
            let (raw, next) = read_length_prefixed(buf, offset, "string")?;
            let s = std::str::from_utf8(raw).map_err(|e| {
                ParseError::DecodeFailed(format!(
                    "invalid UTF-8 in string at offset {}: {e}",
                    offset + LENGTH_PREFIX_SIZE
                ))
            })?;
            return Ok((FieldValue::Utf8String(s.to_owned()), next));
        }
        FieldType::Bytes => {
            let (raw, next) = read_length_prefixed(buf, offset, "bytes")?;
            return Ok((FieldValue::Bytes(raw.to_vec()), next));
        }
        FieldType::Array(_) | FieldType::Message => {
            return Err(ParseError::InvalidFieldType(format!(
                "{field_type} is not a scalar or variable-width type"
            )));
        }
    };

    // Fixed-width branches only; `read_array` already proved the bytes exist.
    let width = field_type.fixed_width().unwrap_or_default();
    Ok((value, offset + width))
}

// ── Byte helpers ──────────────────────────────────────────────────────────────

/// Returns `buf[offset..offset + len]`, or `InvalidSize` if that range is not
/// entirely inside `buf`.
pub(crate) fn take<'a>(
    buf: &'a [u8],
    offset: usize,
    len: usize,
    what: &str,
) -> Result<&'a [u8], ParseError> {
    match offset.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(&buf[offset..end]),
        _ => Err(ParseError::InvalidSize(format!(
            "{what}: need {len} bytes at offset {offset}, {} available",
            buf.len().saturating_sub(offset)
        ))),
    }
}

pub(crate) fn read_array<const N: usize>(
    buf: &[u8],
    offset: usize,
    what: &str,
) -> Result<[u8; N], ParseError> {
    let mut out = [0u8; N];
    out.copy_from_slice(take(buf, offset, N, what)?);
    Ok(out)
}

/// Reads a 2-byte big-endian length at `offset`.
pub(crate) fn read_length(buf: &[u8], offset: usize, what: &str) -> Result<usize, ParseError> {
    Ok(usize::from(u16::from_be_bytes(read_array(buf, offset, what)?)))
}

/// Reads `[len:2][len bytes]` at `offset`; returns the bytes and the next offset.
fn read_length_prefixed<'a>(
    buf: &'a [u8],
    offset: usize,
    what: &str,
) -> Result<(&'a [u8], usize), ParseError> {
    let len = read_length(buf, offset, what)?;
    let start = offset + LENGTH_PREFIX_SIZE;
    let data = take(buf, start, len, what)?;
    Ok((data, start + len))
}

/// Appends a 2-byte big-endian length prefix.
pub(crate) fn write_length(buf: &mut Vec<u8>, len: usize, what: &str) -> Result<(), ParseError> {
    let len = u16::try_from(len).map_err(|_| {
        ParseError::InvalidSize(format!(
            "{what} of {len} bytes exceeds the {MAX_VARIABLE_LENGTH}-byte limit"
        ))
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn write_length_prefixed(buf: &mut Vec<u8>, data: &[u8], what: &str) -> Result<(), ParseError> {
    write_length(buf, data.len(), what)?;
    buf.extend_from_slice(data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(field: &Field) -> Field {
        let mut buf = Vec::new();
        encode_scalar(field.field_type(), field.value(), &mut buf).expect("encode failed");
        let (value, next) = decode_scalar(&buf, 0, field.field_type()).expect("decode failed");
        assert_eq!(next, buf.len(), "decoder must consume exactly the encoded bytes");
        Field::new(field.field_type().clone(), value).expect("decoded value must fit its type")
    }

    // ── Round trips ──────────────────────────────────────────────────────────

    #[test]
    fn test_unsigned_boundaries_round_trip() {
        for field in [
            Field::uint8(0),
            Field::uint8(u8::MAX),
            Field::uint16(u16::MAX),
            Field::uint32(u32::MAX),
            Field::uint64(u64::MAX),
        ] {
            assert_eq!(round_trip(&field), field);
        }
    }

    #[test]
    fn test_signed_boundaries_round_trip() {
        for field in [
            Field::int8(i8::MIN),
            Field::int8(i8::MAX),
            Field::int16(i16::MIN),
            Field::int32(-1),
            Field::int32(i32::MIN),
            Field::int64(i64::MIN),
            Field::int64(i64::MAX),
        ] {
            assert_eq!(round_trip(&field), field);
        }
    }

    #[test]
    fn test_variable_width_round_trip() {
        for field in [
            Field::string(""),
            Field::string("test"),
            Field::string("Grüße, 世界 🛰"),
            Field::bytes(Vec::new()),
            Field::bytes(vec![0x00, 0xFF, 0x7F]),
        ] {
            assert_eq!(round_trip(&field), field);
        }
    }

    #[test]
    fn test_bool_and_enum_round_trip() {
        assert_eq!(round_trip(&Field::boolean(true)), Field::boolean(true));
        assert_eq!(round_trip(&Field::boolean(false)), Field::boolean(false));
        assert_eq!(round_trip(&Field::enumeration(7)), Field::enumeration(7));
    }

    // ── Exact wire layout ────────────────────────────────────────────────────

    #[test]
    fn test_integers_are_big_endian() {
        let mut buf = Vec::new();
        encode_scalar(&FieldType::UInt32, &FieldValue::UInt(0x0102_0304), &mut buf).unwrap();
        encode_scalar(&FieldType::Int16, &FieldValue::Int(-2), &mut buf).unwrap();
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04, 0xFF, 0xFE]);
    }

    #[test]
    fn test_string_has_two_byte_length_prefix() {
        let mut buf = Vec::new();
        encode_scalar(&FieldType::Utf8String, &FieldValue::Utf8String("test".into()), &mut buf)
            .unwrap();
        assert_eq!(buf, [0x00, 0x04, b't', b'e', b's', b't']);
    }

    #[test]
    fn test_any_nonzero_byte_decodes_as_true() {
        let (value, next) = decode_scalar(&[0x00, 0x80], 1, &FieldType::Bool).unwrap();
        assert_eq!(value, FieldValue::Bool(true));
        assert_eq!(next, 2);
    }

    #[test]
    fn test_decode_at_offset() {
        let buf = [0xAA, 0xBB, 0x00, 0x2A];
        let (value, next) = decode_scalar(&buf, 2, &FieldType::UInt16).unwrap();
        assert_eq!(value, FieldValue::UInt(42));
        assert_eq!(next, 4);
    }

    // ── Error conditions ─────────────────────────────────────────────────────

    #[test]
    fn test_truncated_fixed_width_returns_invalid_size() {
        let result = decode_scalar(&[0x00, 0x01, 0x02], 0, &FieldType::UInt32);
        assert!(matches!(result, Err(ParseError::InvalidSize(_))));
    }

    #[test]
    fn test_offset_past_end_returns_invalid_size() {
        let result = decode_scalar(&[0x01], 5, &FieldType::UInt8);
        assert!(matches!(result, Err(ParseError::InvalidSize(_))));
    }

    #[test]
    fn test_declared_length_beyond_buffer_returns_invalid_size() {
        // Declares 10 bytes of string content, provides 3.
        let buf = [0x00, 0x0A, b'a', b'b', b'c'];
        let result = decode_scalar(&buf, 0, &FieldType::Utf8String);
        assert!(matches!(result, Err(ParseError::InvalidSize(_))));
    }

    #[test]
    fn test_invalid_utf8_returns_decode_failed() {
        let buf = [0x00, 0x02, 0xC3, 0x28];
        let result = decode_scalar(&buf, 0, &FieldType::Utf8String);
        assert!(matches!(result, Err(ParseError::DecodeFailed(_))));
    }

    #[test]
    fn test_invalid_utf8_is_accepted_as_bytes() {
        let buf = [0x00, 0x02, 0xC3, 0x28];
        let (value, _) = decode_scalar(&buf, 0, &FieldType::Bytes).unwrap();
        assert_eq!(value, FieldValue::Bytes(vec![0xC3, 0x28]));
    }

    #[test]
    fn test_encode_tag_mismatch_returns_invalid_field_value() {
        let mut buf = Vec::new();
        let result = encode_scalar(&FieldType::Bool, &FieldValue::UInt(1), &mut buf);
        assert!(matches!(result, Err(ParseError::InvalidFieldValue(_))));
        assert!(buf.is_empty(), "nothing may be written on failure");
    }

    #[test]
    fn test_encode_out_of_range_returns_invalid_field_value() {
        let mut buf = Vec::new();
        assert!(matches!(
            encode_scalar(&FieldType::UInt8, &FieldValue::UInt(256), &mut buf),
            Err(ParseError::InvalidFieldValue(_))
        ));
        assert!(matches!(
            encode_scalar(&FieldType::Int8, &FieldValue::Int(-129), &mut buf),
            Err(ParseError::InvalidFieldValue(_))
        ));
        assert!(matches!(
            encode_scalar(&FieldType::UInt16, &FieldValue::Int(-1), &mut buf),
            Err(ParseError::InvalidFieldValue(_))
        ));
    }

    #[test]
    fn test_encode_oversized_string_returns_invalid_size() {
        let mut buf = Vec::new();
        let long = "x".repeat(MAX_VARIABLE_LENGTH + 1);
        let result = encode_scalar(&FieldType::Utf8String, &FieldValue::Utf8String(long), &mut buf);
        assert!(matches!(result, Err(ParseError::InvalidSize(_))));
    }

    #[test]
    fn test_max_length_bytes_round_trip() {
        let field = Field::bytes(vec![0x5A; MAX_VARIABLE_LENGTH]);
        assert_eq!(round_trip(&field), field);
    }

    #[test]
    fn test_composite_types_are_rejected_by_scalar_codec() {
        let mut buf = Vec::new();
        assert!(matches!(
            encode_scalar(&FieldType::Array(Vec::new()), &FieldValue::Array(Vec::new()), &mut buf),
            Err(ParseError::InvalidFieldType(_))
        ));
        assert!(matches!(
            decode_scalar(&[0; 8], 0, &FieldType::Message),
            Err(ParseError::InvalidFieldType(_))
        ));
    }

    // ── Construction invariant ───────────────────────────────────────────────

    #[test]
    fn test_field_new_rejects_mismatched_tag() {
        let result = Field::new(FieldType::Utf8String, FieldValue::Bytes(vec![1]));
        assert!(matches!(result, Err(ParseError::InvalidFieldValue(_))));
    }

    #[test]
    fn test_field_new_rejects_out_of_range_value() {
        assert!(Field::new(FieldType::UInt16, FieldValue::UInt(65_536)).is_err());
        assert!(Field::new(FieldType::Int32, FieldValue::Int(i64::from(i32::MAX) + 1)).is_err());
        assert!(Field::new(FieldType::UInt16, FieldValue::UInt(65_535)).is_ok());
    }

    #[test]
    fn test_array_field_rejects_element_with_wrong_layout() {
        let layout = vec![FieldDef::required("id", FieldType::UInt8)];
        let elements = vec![Element::new(0, vec![Field::string("not a uint8")])];

        let result = Field::array(layout, elements);

        assert!(matches!(result, Err(ParseError::InvalidFieldValue(_))));
    }

    #[test]
    fn test_array_field_accepts_omitted_trailing_optional() {
        let layout = vec![
            FieldDef::required("id", FieldType::UInt8),
            FieldDef::optional("label", FieldType::Utf8String),
        ];
        let elements = vec![
            Element::new(0, vec![Field::uint8(1), Field::string("a")]),
            Element::new(1, vec![Field::uint8(2)]),
        ];
        assert!(Field::array(layout, elements).is_ok());
    }

    #[test]
    fn test_conform_rejects_extra_and_missing_fields() {
        let defs = vec![FieldDef::required("a", FieldType::UInt8)];
        assert!(matches!(
            conform_fields(&defs, &[Field::uint8(1), Field::uint8(2)]),
            Err(ParseError::InvalidStructure(_))
        ));
        assert!(matches!(conform_fields(&defs, &[]), Err(ParseError::MissingField(_))));
    }

    #[test]
    fn test_field_deserialize_enforces_invariant() {
        let ok: Result<Field, _> =
            serde_json::from_str(r#"{"field_type":"uint8","value":{"uint":200}}"#);
        let bad: Result<Field, _> =
            serde_json::from_str(r#"{"field_type":"uint8","value":{"uint":300}}"#);
        assert_eq!(ok.unwrap(), Field::uint8(200));
        assert!(bad.is_err());
    }
}
