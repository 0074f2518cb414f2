//! Array elements and array framing.
//!
//! ```text
//! Array field:   [array_len:2][element][element]...
//! Element:       [index:1][element_len:2][field][field]...
//! ```
//!
//! Fields inside an element are not individually length-tagged; the element
//! layout (the `Vec<FieldDef>` carried by [`FieldType::Array`]) says what to
//! read next, and `element_len` must be consumed exactly.

use serde::{Deserialize, Serialize};

use crate::protocol::codec::{self, Decoder};
use crate::protocol::error::ParseError;
use crate::protocol::field::{self, Field, FieldDef, LENGTH_PREFIX_SIZE};

/// Bytes in front of every element's field list: index + length.
pub const ELEMENT_HEADER_SIZE: usize = 1 + LENGTH_PREFIX_SIZE;

/// One indexed entry of an array field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    index: u8,
    fields: Vec<Field>,
}

impl Element {
    /// Creates an element; `fields` follow the array's element layout.
    pub fn new(index: u8, fields: Vec<Field>) -> Self {
        Self { index, fields }
    }

    /// Index byte written in front of the element.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Fields in layout order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Consumes the element, returning its fields.
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

/// Appends one framed element to `buf`.
///
/// # Errors
///
/// Propagates field encoding errors; [`ParseError::InvalidSize`] if the
/// encoded field list does not fit the 2-byte element length.
pub fn encode_element(element: &Element, buf: &mut Vec<u8>) -> Result<(), ParseError> {
    let mut body = Vec::new();
    codec::encode_fields(element.fields(), &mut body)?;

    buf.push(element.index);
    field::write_length(buf, body.len(), "element")?;
    buf.extend_from_slice(&body);
    Ok(())
}

/// Appends a framed array (length prefix plus every element) to `buf`.
pub fn encode_array(elements: &[Element], buf: &mut Vec<u8>) -> Result<(), ParseError> {
    let mut body = Vec::new();
    for element in elements {
        encode_element(element, &mut body)
            .map_err(|e| e.within(format_args!("element {}", element.index)))?;
    }
    field::write_length(buf, body.len(), "array")?;
    buf.extend_from_slice(&body);
    Ok(())
}

/// Decodes one element at `offset`, returning it and the offset after it.
///
/// # Errors
///
/// - [`ParseError::InvalidSize`] – the element header or body runs past
///   `buf`, or the fields do not consume exactly `element_len` bytes.
/// - [`ParseError::MissingField`] – the element ends before a required field.
pub(crate) fn decode_element(
    decoder: &Decoder<'_>,
    buf: &[u8],
    offset: usize,
    layout: &[FieldDef],
    depth: usize,
) -> Result<(Element, usize), ParseError> {
    let [index] = field::read_array::<1>(buf, offset, "element index")?;
    let len = field::read_length(buf, offset + 1, "element length")?;
    let body_start = offset + ELEMENT_HEADER_SIZE;
    let body = field::take(buf, body_start, len, "element body")?;

    let scope = |e: ParseError| e.within(format_args!("element {index}"));
    let (fields, consumed) = decoder.decode_fields(body, layout, depth).map_err(scope)?;
    if consumed != len {
        return Err(scope(ParseError::InvalidSize(format!(
            "declared length {len} but fields occupy {consumed} bytes"
        ))));
    }

    Ok((Element::new(index, fields), body_start + len))
}

/// Decodes a framed array at `offset`, returning its elements and the offset
/// after it.
pub(crate) fn decode_array(
    decoder: &Decoder<'_>,
    buf: &[u8],
    offset: usize,
    layout: &[FieldDef],
    depth: usize,
) -> Result<(Vec<Element>, usize), ParseError> {
    let len = field::read_length(buf, offset, "array length")?;
    let body_start = offset + LENGTH_PREFIX_SIZE;
    let body = field::take(buf, body_start, len, "array body")?;

    let mut elements = Vec::new();
    let mut cursor = 0;
    while cursor < body.len() {
        let (element, next) = decode_element(decoder, body, cursor, layout, depth)
            .map_err(|e| e.within(format_args!("array element #{}", elements.len())))?;
        elements.push(element);
        cursor = next;
    }

    Ok((elements, body_start + len))
}
