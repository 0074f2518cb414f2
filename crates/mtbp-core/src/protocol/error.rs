//! Error kinds shared by every layer of the protocol engine.
//!
//! Two families are kept apart on purpose:
//!
//! - [`ParseError`] – something is wrong with the bytes or structure of a
//!   *single* frame or message (bad length, bad checksum, unknown schema key).
//! - [`ProtocolError`] – a frame was fine on its own but violates the state of
//!   the *session* it arrived in (out-of-order sequence number, a message
//!   category that is not allowed in the current connection state).
//!
//! Every variant carries a human-readable context string (field name, byte
//! offset, expected vs. actual value).  The numeric codes returned by
//! [`ParseError::code`] and [`ProtocolError::code`] are the ones in the
//! device messaging error tables, so they can be reported to the upstream
//! gateway unchanged.

use std::fmt;

use thiserror::Error;

/// Errors raised while decoding, encoding or validating a single frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Message format is invalid or cannot be parsed.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// Service identification number (SIN) is not known.
    #[error("invalid SIN: {0}")]
    InvalidSin(String),

    /// Message identification number (MIN) is not known for a known SIN.
    #[error("invalid MIN: {0}")]
    InvalidMin(String),

    /// A field type is not valid where it was used.
    #[error("invalid field type: {0}")]
    InvalidFieldType(String),

    /// A field value does not match its declared type or width.
    #[error("invalid field value: {0}")]
    InvalidFieldValue(String),

    /// A required field is missing.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A length is out of bounds: truncated buffer, oversized value or
    /// leftover bytes.
    #[error("invalid size: {0}")]
    InvalidSize(String),

    /// The frame checksum does not match its contents.
    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),

    /// Message version is not supported.
    #[error("unsupported message version: {0}")]
    UnsupportedVersion(String),

    /// Content could not be decoded (e.g. a string that is not UTF-8).
    #[error("message decoding failed: {0}")]
    DecodeFailed(String),

    /// Message structure does not match its definition.
    #[error("invalid message structure: {0}")]
    InvalidStructure(String),

    /// Message failed a validation rule.
    #[error("message validation failed: {0}")]
    ValidationFailed(String),

    /// Sequence number in a message is invalid.
    #[error("invalid sequence number: {0}")]
    InvalidSequence(String),
}

impl ParseError {
    /// Numeric error code as listed in the device messaging error table.
    pub fn code(&self) -> u8 {
        match self {
            ParseError::InvalidFormat(_) => 3,
            ParseError::InvalidSin(_) => 4,
            ParseError::InvalidMin(_) => 5,
            ParseError::InvalidFieldType(_) => 6,
            ParseError::InvalidFieldValue(_) => 7,
            ParseError::MissingField(_) => 8,
            ParseError::InvalidSize(_) => 9,
            ParseError::InvalidChecksum(_) => 10,
            ParseError::UnsupportedVersion(_) => 11,
            ParseError::DecodeFailed(_) => 12,
            ParseError::InvalidStructure(_) => 13,
            ParseError::ValidationFailed(_) => 14,
            ParseError::InvalidSequence(_) => 15,
        }
    }

    /// The human-readable context attached to this error.
    pub fn context(&self) -> &str {
        match self {
            ParseError::InvalidFormat(c)
            | ParseError::InvalidSin(c)
            | ParseError::InvalidMin(c)
            | ParseError::InvalidFieldType(c)
            | ParseError::InvalidFieldValue(c)
            | ParseError::MissingField(c)
            | ParseError::InvalidSize(c)
            | ParseError::InvalidChecksum(c)
            | ParseError::UnsupportedVersion(c)
            | ParseError::DecodeFailed(c)
            | ParseError::InvalidStructure(c)
            | ParseError::ValidationFailed(c)
            | ParseError::InvalidSequence(c) => c,
        }
    }

    /// Returns the same error kind with `scope` prepended to its context.
    ///
    /// Used while an error bubbles out of nested elements and messages, so
    /// the final message reads like a path: `field 'items': element 2: ...`.
    pub fn within(self, scope: impl fmt::Display) -> Self {
        let (kind, context) = self.into_parts();
        kind(format!("{scope}: {context}"))
    }

    fn into_parts(self) -> (fn(String) -> ParseError, String) {
        match self {
            ParseError::InvalidFormat(c) => (ParseError::InvalidFormat, c),
            ParseError::InvalidSin(c) => (ParseError::InvalidSin, c),
            ParseError::InvalidMin(c) => (ParseError::InvalidMin, c),
            ParseError::InvalidFieldType(c) => (ParseError::InvalidFieldType, c),
            ParseError::InvalidFieldValue(c) => (ParseError::InvalidFieldValue, c),
            ParseError::MissingField(c) => (ParseError::MissingField, c),
            ParseError::InvalidSize(c) => (ParseError::InvalidSize, c),
            ParseError::InvalidChecksum(c) => (ParseError::InvalidChecksum, c),
            ParseError::UnsupportedVersion(c) => (ParseError::UnsupportedVersion, c),
            ParseError::DecodeFailed(c) => (ParseError::DecodeFailed, c),
            ParseError::InvalidStructure(c) => (ParseError::InvalidStructure, c),
            ParseError::ValidationFailed(c) => (ParseError::ValidationFailed, c),
            ParseError::InvalidSequence(c) => (ParseError::InvalidSequence, c),
        }
    }
}

/// Errors raised when a message violates cross-message session state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Peer speaks a different protocol version.
    #[error("protocol version mismatch: {0}")]
    VersionMismatch(String),

    /// Sequence number is not the expected successor.
    #[error("sequence error: {0}")]
    SequenceError(String),

    /// Protocol handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// A protocol operation timed out.
    #[error("protocol timeout: {0}")]
    ProtocolTimeout(String),

    /// Session synchronisation was lost.
    #[error("synchronization error: {0}")]
    SyncError(String),

    /// The message is not allowed in the current connection state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl ProtocolError {
    /// Numeric error code as listed in the device messaging error table.
    pub fn code(&self) -> u8 {
        match self {
            ProtocolError::VersionMismatch(_) => 100,
            ProtocolError::SequenceError(_) => 101,
            ProtocolError::HandshakeFailed(_) => 102,
            ProtocolError::ProtocolTimeout(_) => 103,
            ProtocolError::SyncError(_) => 104,
            ProtocolError::ProtocolViolation(_) => 105,
        }
    }
}

/// Either kind of failure, returned by the combined session operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl SessionError {
    /// Numeric error code of the wrapped error.
    pub fn code(&self) -> u8 {
        match self {
            SessionError::Parse(e) => e.code(),
            SessionError::Protocol(e) => e.code(),
        }
    }
}
