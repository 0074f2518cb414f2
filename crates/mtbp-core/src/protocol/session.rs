//! One protocol session: codec, sequencing, size ceilings and connection
//! state behind two calls.
//!
//! ```text
//! receive: size check ─► decode ─► sequence check ─► transition check ─► commit
//! send:    Connected? ─► conform ─► encode ─► size check ─► commit ─► next seq
//! ```
//!
//! Nothing is committed until every check of a call has passed, so a bad
//! frame never disturbs the sequence state or the connection state.
//!
//! The binary header carries no message category.  A decoded message is
//! `Data` unless the session's classifier says otherwise; gateways that map
//! certain `(service_id, message_id)` pairs to acknowledgements install one
//! with [`ProtocolSession::with_classifier`].

use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::config::ProtocolConfig;
use crate::protocol::codec::{encode_message, Decoder};
use crate::protocol::connection::{ConnectionState, ConnectionStateMachine};
use crate::protocol::error::SessionError;
use crate::protocol::message::{Message, MessageCategory};
use crate::protocol::schema::SchemaRegistry;
use crate::protocol::sequence::{SequenceCounter, SequenceState, SequenceValidator};
use crate::protocol::size::{MessageSizeLimits, PowerMode};

/// Picks the category of a decoded inbound message.
pub type Classifier = Box<dyn Fn(&Message) -> MessageCategory + Send + Sync>;

/// Per-session protocol state over a shared schema registry.
pub struct ProtocolSession {
    registry: Arc<SchemaRegistry>,
    limits: MessageSizeLimits,
    max_nesting_depth: usize,
    sequence: SequenceValidator,
    connection: ConnectionStateMachine,
    outbound: SequenceCounter,
    classifier: Classifier,
}

impl fmt::Debug for ProtocolSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolSession")
            .field("schema_entries", &self.registry.len())
            .field("limits", &self.limits)
            .field("max_nesting_depth", &self.max_nesting_depth)
            .field("sequence", &self.sequence.state())
            .field("connection", &self.connection)
            .field("next_outbound", &self.outbound.current())
            .finish_non_exhaustive()
    }
}

impl ProtocolSession {
    /// A fresh session in `Disconnected` with no sequence history.
    pub fn new(registry: Arc<SchemaRegistry>, config: &ProtocolConfig) -> Self {
        Self {
            registry,
            limits: config.size_limits,
            max_nesting_depth: config.max_nesting_depth,
            sequence: SequenceValidator::new(),
            connection: ConnectionStateMachine::new(),
            outbound: SequenceCounter::new(),
            classifier: Box::new(Message::category),
        }
    }

    /// Replaces the inbound classifier.
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Message) -> MessageCategory + Send + Sync + 'static,
    {
        self.classifier = Box::new(classifier);
        self
    }

    /// Validates and decodes one inbound frame carrying `sequence`.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Parse`] – the frame is too large for `mode` or does
    ///   not decode.
    /// - [`SessionError::Protocol`] – the sequence number is out of order, or
    ///   the message's category is not allowed in the current state.
    ///
    /// On any error the session state is unchanged.
    pub fn receive(
        &mut self,
        frame: &[u8],
        sequence: u16,
        mode: PowerMode,
    ) -> Result<Message, SessionError> {
        self.limits.check(frame.len(), mode)?;
        let decoded = Decoder::new(&self.registry)
            .with_max_depth(self.max_nesting_depth)
            .decode_frame(frame)?;
        let category = (self.classifier)(&decoded);

        self.sequence.check(sequence)?;
        let next = self.connection.next_state(category).map_err(|e| {
            warn!("inbound frame {}:{} rejected: {e}", decoded.service_id(), decoded.message_id());
            e
        })?;

        self.sequence.commit(sequence);
        self.connection.enter(category, next);
        trace!(
            "received frame {}:{} seq {sequence} as {category:?}",
            decoded.service_id(),
            decoded.message_id()
        );
        Ok(decoded.with_category(category))
    }

    /// Conforms and encodes `message` for sending.
    ///
    /// Returns the outbound sequence number assigned to the frame and the
    /// frame bytes.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Protocol`] – the session is not `Connected`.
    /// - [`SessionError::Parse`] – the message does not match its schema, fails
    ///   to encode or is too large for `mode`.
    pub fn send(
        &mut self,
        message: &Message,
        mode: PowerMode,
    ) -> Result<(u16, Vec<u8>), SessionError> {
        self.connection.require(ConnectionState::Connected, "send data")?;
        self.registry.conform(message)?;
        let frame = encode_message(message)?;
        self.limits.check(frame.len(), mode)?;

        self.connection.send_data()?;
        let sequence = self.outbound.next();
        trace!(
            "sending frame {}:{} seq {sequence} ({} bytes)",
            message.service_id(),
            message.message_id(),
            frame.len()
        );
        Ok((sequence, frame))
    }

    /// Clears the inbound sequence history, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.sequence.reset();
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Inbound sequence history.
    pub fn sequence_state(&self) -> SequenceState {
        self.sequence.state()
    }

    /// The underlying connection state machine.
    pub fn connection(&self) -> &ConnectionStateMachine {
        &self.connection
    }

    /// For callback registration and explicit `connect` / `disconnect`.
    pub fn connection_mut(&mut self) -> &mut ConnectionStateMachine {
        &mut self.connection
    }

    /// Shared schema registry used for decode and send.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::error::{ParseError, ProtocolError};
    use crate::protocol::field::{Field, FieldDef, FieldType};
    use crate::protocol::schema::{Direction, SchemaEntry};

    const ACK_SERVICE: u8 = 0;

    fn registry() -> Arc<SchemaRegistry> {
        let entries = vec![
            SchemaEntry {
                service_id: 1,
                message_id: 1,
                name: "Report".to_string(),
                direction: Direction::Return,
                field_defs: vec![
                    FieldDef::required("value", FieldType::UInt32),
                    FieldDef::optional("blob", FieldType::Bytes),
                ],
            },
            SchemaEntry {
                service_id: ACK_SERVICE,
                message_id: 1,
                name: "Ack".to_string(),
                direction: Direction::Both,
                field_defs: Vec::new(),
            },
        ];
        Arc::new(SchemaRegistry::from_entries(entries).unwrap())
    }

    fn session() -> ProtocolSession {
        ProtocolSession::new(registry(), &ProtocolConfig::default()).with_classifier(|m| {
            if m.service_id() == ACK_SERVICE {
                MessageCategory::Ack
            } else {
                MessageCategory::Data
            }
        })
    }

    fn report(value: u32) -> Message {
        Message::new(1, 1, MessageCategory::Data, false, vec![Field::uint32(value)])
    }

    fn ack_frame() -> Vec<u8> {
        encode_message(&Message::new(ACK_SERVICE, 1, MessageCategory::Ack, false, Vec::new()))
            .unwrap()
    }

    fn connected_session() -> ProtocolSession {
        let mut session = session();
        session
            .receive(&encode_message(&report(1)).unwrap(), 0, PowerMode::Normal)
            .unwrap();
        session.receive(&ack_frame(), 1, PowerMode::Normal).unwrap();
        session
    }

    // ── Receive ──────────────────────────────────────────────────────────────

    #[test]
    fn test_receive_drives_connection_and_sequence() {
        // Arrange
        let mut session = session();

        // Act
        let first = session
            .receive(&encode_message(&report(7)).unwrap(), 100, PowerMode::Normal)
            .unwrap();
        let ack = session.receive(&ack_frame(), 101, PowerMode::Normal).unwrap();

        // Assert
        assert_eq!(first.fields(), &[Field::uint32(7)]);
        assert_eq!(first.name(), Some("Report"));
        assert_eq!(ack.category(), MessageCategory::Ack);
        assert_eq!(session.state(), ConnectionState::Connected);
        assert_eq!(session.sequence_state().last_sequence(), Some(101));
    }

    #[test]
    fn test_out_of_order_frame_leaves_state_untouched() {
        let mut session = connected_session();
        let before = session.sequence_state();

        let result = session.receive(&encode_message(&report(2)).unwrap(), 5, PowerMode::Normal);

        assert!(matches!(
            result,
            Err(SessionError::Protocol(ProtocolError::SequenceError(_)))
        ));
        assert_eq!(session.sequence_state(), before);
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_category_violation_does_not_consume_sequence_number() {
        // Disconnected + Ack is not in the table.
        let mut session = session();

        let result = session.receive(&ack_frame(), 9, PowerMode::Normal);

        assert!(matches!(
            result,
            Err(SessionError::Protocol(ProtocolError::ProtocolViolation(_)))
        ));
        assert_eq!(session.sequence_state().last_sequence(), None);
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_corrupt_frame_leaves_state_untouched() {
        let mut session = connected_session();
        let mut frame = encode_message(&report(3)).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        let result = session.receive(&frame, 2, PowerMode::Normal);

        assert!(matches!(
            result,
            Err(SessionError::Parse(ParseError::InvalidChecksum(_)))
        ));
        assert_eq!(session.sequence_state().last_sequence(), Some(1));
        let frame = encode_message(&report(3)).unwrap();
        assert!(session.receive(&frame, 2, PowerMode::Normal).is_ok());
    }

    #[test]
    fn test_low_power_ceiling_applies_before_decode() {
        let mut session = session();
        let big = report(1).with_fields(vec![Field::uint32(1), Field::bytes(vec![0u8; 6_000])]);
        let frame = encode_message(&big).unwrap();

        let rejected = session.receive(&frame, 0, PowerMode::LowPower);
        let accepted = session.receive(&frame, 0, PowerMode::Normal);

        assert!(matches!(rejected, Err(SessionError::Parse(ParseError::InvalidSize(_)))));
        assert!(accepted.is_ok());
    }

    #[test]
    fn test_reset_accepts_new_sequence_start() {
        let mut session = connected_session();
        session.reset();

        let frame = encode_message(&report(4)).unwrap();
        let result = session.receive(&frame, 40_000, PowerMode::Normal);

        assert!(result.is_ok());
    }

    // ── Send ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_send_requires_connected() {
        let mut session = session();

        let result = session.send(&report(1), PowerMode::Normal);

        assert!(matches!(
            result,
            Err(SessionError::Protocol(ProtocolError::ProtocolViolation(_)))
        ));
    }

    #[test]
    fn test_send_numbers_frames_in_order() {
        let mut session = connected_session();

        let (first, frame) = session.send(&report(10), PowerMode::Normal).unwrap();
        let (second, _) = session.send(&report(11), PowerMode::Normal).unwrap();

        assert_eq!((first, second), (0, 1));
        let decoded = crate::protocol::codec::decode_frame(&frame, session.registry()).unwrap();
        assert_eq!(decoded.fields(), &[Field::uint32(10)]);
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_send_rejects_nonconforming_message_without_consuming_sequence() {
        let mut session = connected_session();
        let bad = Message::new(1, 1, MessageCategory::Data, false, vec![Field::string("x")]);

        let result = session.send(&bad, PowerMode::Normal);
        let (next, _) = session.send(&report(1), PowerMode::Normal).unwrap();

        assert!(matches!(
            result,
            Err(SessionError::Parse(ParseError::InvalidFieldValue(_)))
        ));
        assert_eq!(next, 0);
    }

    #[test]
    fn test_send_rejects_oversized_frame_in_low_power() {
        let mut session = connected_session();
        let big = report(1).with_fields(vec![Field::uint32(1), Field::bytes(vec![0u8; 6_000])]);

        let result = session.send(&big, PowerMode::LowPower);

        assert!(matches!(result, Err(SessionError::Parse(ParseError::InvalidSize(_)))));
    }

    #[test]
    fn test_connection_mut_allows_explicit_disconnect() {
        let mut session = connected_session();

        session.connection_mut().disconnect().unwrap();

        assert_eq!(session.state(), ConnectionState::Disconnecting);
        assert!(session.send(&report(1), PowerMode::Normal).is_err());
    }
}
