//! # mtbp-core
//!
//! Binary wire-protocol engine of the satellite messaging gateway.
//!
//! The crate turns raw satellite frames into structured messages and back, and
//! tracks the per-session state that frames must respect.  It performs no I/O:
//! no sockets, no files, no clocks.  The gateway's transport layer feeds it
//! bytes and acts on the results.
//!
//! # Architecture overview
//!
//! - **`protocol::checksum`, `protocol::header`** – the 6-byte frame header
//!   and its CRC-16.
//! - **`protocol::field`, `protocol::element`** – how each typed field, and
//!   each element of an array field, is laid out on the wire.
//! - **`protocol::schema`** – the table that says which fields a
//!   `(service_id, message_id)` pair carries.  Decoding is driven entirely by
//!   this table.
//! - **`protocol::codec`** – frame ⇄ [`Message`] using the three above.
//! - **`protocol::sequence`, `protocol::size`, `protocol::connection`** –
//!   per-session rules: strict sequence ordering, size ceilings per power mode
//!   and the connection lifecycle.
//! - **`protocol::session`** – one [`ProtocolSession`] combining all of the
//!   above, committing state only when a frame passes every check.
//! - **`config`** – [`ProtocolConfig`], the tunable limits.

pub mod config;
pub mod protocol;

pub use config::ProtocolConfig;
pub use protocol::{
    decode_frame, decode_frame_prefix, encode_checked, encode_message, ConnectionState,
    ConnectionStateMachine, Field, FieldDef, FieldType, FieldValue, Message, MessageCategory,
    ParseError, PowerMode, ProtocolError, ProtocolSession, SchemaEntry, SchemaRegistry,
    SequenceValidator, SessionError,
};
