//! Frame header codec.
//!
//! ```text
//! ┌─────────────┬─────────────┬──────────────────┬──────────────┐
//! │ service_id  │ message_id  │ payload_length   │ checksum     │
//! │ (1 byte)    │ (1 byte)    │ (2 bytes, BE)    │ (2 bytes, BE)│
//! └─────────────┴─────────────┴──────────────────┴──────────────┘
//!  followed by `payload_length` payload bytes
//! ```
//!
//! The checksum is [`crc16`](crate::protocol::checksum::crc16) over the first
//! four header bytes followed by the whole payload, i.e. every byte of the
//! frame except the checksum field itself.

use tracing::trace;

use crate::protocol::checksum::Crc16;
use crate::protocol::error::ParseError;
use crate::protocol::field::{take, MAX_VARIABLE_LENGTH};

/// Size of the fixed frame header in bytes.
pub const HEADER_SIZE: usize = 6;

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_SIZE: usize = MAX_VARIABLE_LENGTH;

/// Bytes covered by the checksum at the front of the header.
const CHECKED_HEADER_SIZE: usize = 4;

/// The decoded 6-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub service_id: u8,
    pub message_id: u8,
    pub payload_length: u16,
    pub checksum: u16,
}

impl FrameHeader {
    /// Builds the header for `payload`, computing its length and checksum.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidSize`] if the payload is longer than
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn for_payload(service_id: u8, message_id: u8, payload: &[u8]) -> Result<Self, ParseError> {
        let payload_length = u16::try_from(payload.len()).map_err(|_| {
            ParseError::InvalidSize(format!(
                "payload of {} bytes exceeds the {MAX_PAYLOAD_SIZE}-byte frame limit",
                payload.len()
            ))
        })?;
        let checksum = frame_checksum(service_id, message_id, payload_length, payload);
        Ok(Self {
            service_id,
            message_id,
            payload_length,
            checksum,
        })
    }

    /// Total frame length: header plus payload.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + usize::from(self.payload_length)
    }

    /// The six header bytes in wire order.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let [len_hi, len_lo] = self.payload_length.to_be_bytes();
        let [crc_hi, crc_lo] = self.checksum.to_be_bytes();
        [self.service_id, self.message_id, len_hi, len_lo, crc_hi, crc_lo]
    }

    /// Reads the header at the front of `bytes` and returns it with its
    /// payload slice.  Anything after the payload is ignored.
    ///
    /// # Errors
    ///
    /// - [`ParseError::InvalidSize`] – fewer than [`HEADER_SIZE`] bytes, or
    ///   the declared payload runs past the end of `bytes`.
    /// - [`ParseError::InvalidChecksum`] – the recomputed checksum differs.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), ParseError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ParseError::InvalidSize(format!(
                "frame header needs {HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        let header = Self {
            service_id: bytes[0],
            message_id: bytes[1],
            payload_length: u16::from_be_bytes([bytes[2], bytes[3]]),
            checksum: u16::from_be_bytes([bytes[4], bytes[5]]),
        };

        let payload_len = usize::from(header.payload_length);
        let payload = take(bytes, HEADER_SIZE, payload_len, "payload").map_err(|_| {
            ParseError::InvalidSize(format!(
                "header declares {payload_len} payload bytes, {} present",
                bytes.len() - HEADER_SIZE
            ))
        })?;

        let computed = frame_checksum(
            header.service_id,
            header.message_id,
            header.payload_length,
            payload,
        );
        if computed != header.checksum {
            return Err(ParseError::InvalidChecksum(format!(
                "frame {}:{} carries 0x{:04X}, computed 0x{computed:04X}",
                header.service_id, header.message_id, header.checksum
            )));
        }

        trace!(
            "frame header {}:{} payload {payload_len} bytes",
            header.service_id,
            header.message_id
        );
        Ok((header, payload))
    }
}

/// Checksum of a frame with the given header values and payload.
pub fn frame_checksum(service_id: u8, message_id: u8, payload_length: u16, payload: &[u8]) -> u16 {
    let [len_hi, len_lo] = payload_length.to_be_bytes();
    let checked: [u8; CHECKED_HEADER_SIZE] = [service_id, message_id, len_hi, len_lo];
    Crc16::new().update(&checked).update(payload).finish()
}

/// Builds a complete frame (header + payload) around `payload`.
///
/// # Errors
///
/// Returns [`ParseError::InvalidSize`] if the payload is too long for the
/// 2-byte length field.
pub fn assemble_frame(
    service_id: u8,
    message_id: u8,
    payload: &[u8],
) -> Result<Vec<u8>, ParseError> {
    let header = FrameHeader::for_payload(service_id, message_id, payload)?;
    let mut frame = Vec::with_capacity(header.frame_len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}
