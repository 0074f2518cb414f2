//! Schema-driven message codec.
//!
//! Decode path:
//!
//! ```text
//! bytes ─► FrameHeader::parse ─► SchemaRegistry::lookup(sin, min)
//!       ─► decode each declared field in order ─► Message
//! ```
//!
//! Encoding is the mirror image: fields are encoded in order, then the header
//! is built around the payload with its length and checksum filled in last.
//!
//! # Nesting
//!
//! `Array` and `Message` fields recurse into the codec.  A [`Decoder`] counts
//! how many composite levels it is inside and refuses to go deeper than its
//! limit, so a hostile frame cannot drive unbounded recursion.

use tracing::trace;

use crate::protocol::element;
use crate::protocol::error::ParseError;
use crate::protocol::field::{decode_scalar, encode_scalar, Field, FieldDef, FieldType, FieldValue};
use crate::protocol::header::{self, FrameHeader};
use crate::protocol::message::{Message, MessageCategory};
use crate::protocol::schema::{Direction, SchemaRegistry};

/// Default limit on nested `Array` / `Message` levels.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 8;

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes a buffer holding exactly one frame.
///
/// # Errors
///
/// Any [`ParseError`] from the header, schema lookup or field decoding;
/// [`ParseError::InvalidSize`] if bytes follow the frame.
///
/// # Examples
///
/// ```rust
/// use mtbp_core::protocol::codec::{decode_frame, encode_message};
/// use mtbp_core::protocol::field::{Field, FieldDef, FieldType};
/// use mtbp_core::protocol::message::{Message, MessageCategory};
/// use mtbp_core::protocol::schema::{Direction, SchemaEntry, SchemaRegistry};
///
/// let registry = SchemaRegistry::from_entries(vec![SchemaEntry {
///     service_id: 1,
///     message_id: 1,
///     name: "Ping".to_string(),
///     direction: Direction::Forward,
///     field_defs: vec![FieldDef::required("count", FieldType::UInt32)],
/// }])
/// .unwrap();
///
/// let msg = Message::new(1, 1, MessageCategory::Data, true, vec![Field::uint32(7)]);
/// let bytes = encode_message(&msg).unwrap();
/// let decoded = decode_frame(&bytes, &registry).unwrap();
/// assert_eq!(decoded.fields(), msg.fields());
/// assert_eq!(decoded.name(), Some("Ping"));
/// ```
pub fn decode_frame(bytes: &[u8], registry: &SchemaRegistry) -> Result<Message, ParseError> {
    Decoder::new(registry).decode_frame(bytes)
}

/// Decodes one frame from the front of `bytes`, returning the message and the
/// number of bytes it occupied.
pub fn decode_frame_prefix(
    bytes: &[u8],
    registry: &SchemaRegistry,
) -> Result<(Message, usize), ParseError> {
    Decoder::new(registry).decode_frame_prefix(bytes)
}

/// Encodes `message` into a complete frame.
///
/// Field values are written as they are; use [`encode_checked`] to also
/// check them against the schema first.
///
/// # Errors
///
/// Any field encoding error, or [`ParseError::InvalidSize`] if the payload
/// does not fit a frame.
pub fn encode_message(message: &Message) -> Result<Vec<u8>, ParseError> {
    let mut payload = Vec::new();
    encode_fields(message.fields(), &mut payload).map_err(|e| {
        e.within(format_args!(
            "message {}:{}",
            message.service_id(),
            message.message_id()
        ))
    })?;
    let frame = header::assemble_frame(message.service_id(), message.message_id(), &payload)?;
    trace!(
        "encoded frame {}:{} ({} bytes)",
        message.service_id(),
        message.message_id(),
        frame.len()
    );
    Ok(frame)
}

/// Checks `message` against its schema entry, then encodes it.
pub fn encode_checked(message: &Message, registry: &SchemaRegistry) -> Result<Vec<u8>, ParseError> {
    registry.conform(message)?;
    encode_message(message)
}

// ── Encoding helpers ──────────────────────────────────────────────────────────

pub(crate) fn encode_fields(fields: &[Field], buf: &mut Vec<u8>) -> Result<(), ParseError> {
    for (position, field) in fields.iter().enumerate() {
        encode_field(field, buf).map_err(|e| e.within(format_args!("field #{position}")))?;
    }
    Ok(())
}

fn encode_field(field: &Field, buf: &mut Vec<u8>) -> Result<(), ParseError> {
    match field.value() {
        FieldValue::Array(elements) => element::encode_array(elements, buf),
        FieldValue::Message(inner) => {
            buf.extend_from_slice(&encode_message(inner)?);
            Ok(())
        }
        value => encode_scalar(field.field_type(), value, buf),
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// A decoder bound to a schema registry and a nesting limit.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'r> {
    registry: &'r SchemaRegistry,
    max_depth: usize,
}

impl<'r> Decoder<'r> {
    /// Decoder with the default nesting limit.
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            max_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    /// Sets how many `Array` / `Message` levels may be nested.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// See [`decode_frame`].
    pub fn decode_frame(&self, bytes: &[u8]) -> Result<Message, ParseError> {
        let (message, consumed) = self.decode_frame_prefix(bytes)?;
        if consumed != bytes.len() {
            return Err(ParseError::InvalidSize(format!(
                "{} bytes follow the {consumed}-byte frame",
                bytes.len() - consumed
            )));
        }
        Ok(message)
    }

    /// See [`decode_frame_prefix`].
    pub fn decode_frame_prefix(&self, bytes: &[u8]) -> Result<(Message, usize), ParseError> {
        self.decode_at_depth(bytes, 0)
    }

    fn decode_at_depth(&self, bytes: &[u8], depth: usize) -> Result<(Message, usize), ParseError> {
        let (header, payload) = FrameHeader::parse(bytes)?;
        let entry = self.registry.lookup(header.service_id, header.message_id)?;
        let scope = |e: ParseError| e.within(format_args!("message '{}'", entry.name));

        let (fields, consumed) = self
            .decode_fields(payload, &entry.field_defs, depth)
            .map_err(scope)?;
        if consumed != payload.len() {
            return Err(scope(ParseError::InvalidSize(format!(
                "{} bytes left after the last declared field",
                payload.len() - consumed
            ))));
        }

        trace!(
            "decoded frame {}:{} '{}' with {} fields",
            header.service_id,
            header.message_id,
            entry.name,
            fields.len()
        );
        let message = Message::new(
            header.service_id,
            header.message_id,
            MessageCategory::Data,
            entry.direction == Direction::Forward,
            fields,
        )
        .with_name(entry.name.clone());
        Ok((message, header.frame_len()))
    }

    /// Decodes `defs` in order from the front of `buf`.
    ///
    /// Returns the fields and the number of bytes consumed.  When `buf` runs
    /// out, the remaining definitions must all be optional.
    pub(crate) fn decode_fields(
        &self,
        buf: &[u8],
        defs: &[FieldDef],
        depth: usize,
    ) -> Result<(Vec<Field>, usize), ParseError> {
        let mut fields = Vec::with_capacity(defs.len());
        let mut offset = 0;
        for def in defs {
            if offset >= buf.len() {
                if def.optional {
                    continue;
                }
                return Err(ParseError::MissingField(format!(
                    "'{}' ({}) expected at offset {offset}, data ends",
                    def.name, def.field_type
                )));
            }
            let (field, next) = self
                .decode_field(buf, offset, &def.field_type, depth)
                .map_err(|e| e.within(format_args!("field '{}'", def.name)))?;
            fields.push(field);
            offset = next;
        }
        Ok((fields, offset))
    }

    fn decode_field(
        &self,
        buf: &[u8],
        offset: usize,
        field_type: &FieldType,
        depth: usize,
    ) -> Result<(Field, usize), ParseError> {
        match field_type {
            FieldType::Array(layout) => {
                self.check_depth(depth)?;
                let (elements, next) = element::decode_array(self, buf, offset, layout, depth + 1)?;
                Ok((Field::from_decoded(field_type.clone(), FieldValue::Array(elements)), next))
            }
            FieldType::Message => {
                self.check_depth(depth)?;
                let rest = buf.get(offset..).unwrap_or_default();
                let (inner, consumed) = self.decode_at_depth(rest, depth + 1)?;
                Ok((Field::message(inner), offset + consumed))
            }
            scalar => {
                let (value, next) = decode_scalar(buf, offset, scalar)?;
                Ok((Field::from_decoded(scalar.clone(), value), next))
            }
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), ParseError> {
        if depth >= self.max_depth {
            return Err(ParseError::InvalidStructure(format!(
                "nesting exceeds {} levels",
                self.max_depth
            )));
        }
        Ok(())
    }
}
