//! The binary wire protocol: framing, field codec, schema lookup, sequencing
//! and connection state.

pub mod checksum;
pub mod codec;
pub mod connection;
pub mod element;
pub mod error;
pub mod field;
pub mod header;
pub mod message;
pub mod schema;
pub mod sequence;
pub mod session;
pub mod size;

pub use checksum::crc16;
pub use codec::{decode_frame, decode_frame_prefix, encode_checked, encode_message, Decoder};
pub use connection::{ConnectionState, ConnectionStateMachine, Transition};
pub use element::Element;
pub use error::{ParseError, ProtocolError, SessionError};
pub use field::{Field, FieldDef, FieldType, FieldValue};
pub use header::{FrameHeader, HEADER_SIZE};
pub use message::{Message, MessageCategory};
pub use schema::{
    Direction, SchemaEntry, SchemaError, SchemaRegistry, SchemaSource, StaticSchemaSource,
};
pub use sequence::{SequenceCounter, SequenceState, SequenceValidator};
pub use session::ProtocolSession;
pub use size::{MessageSizeLimits, PowerMode};
