//! The structured message exchanged with the codec.

use serde::{Deserialize, Serialize};

use crate::protocol::field::Field;

/// Lifecycle category of a message; drives the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageCategory {
    #[default]
    Data,
    Control,
    Ack,
    Nack,
}

/// A decoded frame, or an outbound message built by the application.
///
/// Immutable once built; the `with_*` methods consume `self` and return a
/// modified copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    service_id: u8,
    message_id: u8,
    #[serde(default)]
    category: MessageCategory,
    #[serde(default)]
    is_forward: bool,
    #[serde(default)]
    fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl Message {
    /// Creates an unnamed message; the name is filled in by the decoder.
    pub fn new(
        service_id: u8,
        message_id: u8,
        category: MessageCategory,
        is_forward: bool,
        fields: Vec<Field>,
    ) -> Self {
        Self {
            service_id,
            message_id,
            category,
            is_forward,
            fields,
            name: None,
        }
    }

    /// Sets the schema entry name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Replaces the whole field list.
    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    /// Replaces the category used by the connection state machine.
    pub fn with_category(mut self, category: MessageCategory) -> Self {
        self.category = category;
        self
    }

    /// Service identification number (SIN).
    pub fn service_id(&self) -> u8 {
        self.service_id
    }

    /// Message identification number (MIN) within the service.
    pub fn message_id(&self) -> u8 {
        self.message_id
    }

    /// Schema key `(service_id, message_id)`.
    pub fn key(&self) -> (u8, u8) {
        (self.service_id, self.message_id)
    }

    /// Category that drives connection state transitions.
    pub fn category(&self) -> MessageCategory {
        self.category
    }

    /// `true` for gateway to terminal traffic.
    pub fn is_forward(&self) -> bool {
        self.is_forward
    }

    /// Fields in schema order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Schema entry name, set on decoded messages.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_replace_only_their_part() {
        // Arrange
        let original = Message::new(1, 2, MessageCategory::Data, true, vec![Field::uint8(1)]);

        // Act
        let changed = original
            .clone()
            .with_category(MessageCategory::Ack)
            .with_fields(vec![Field::boolean(false)])
            .with_name("Status");

        // Assert
        assert_eq!(changed.key(), (1, 2));
        assert!(changed.is_forward());
        assert_eq!(changed.category(), MessageCategory::Ack);
        assert_eq!(changed.fields(), &[Field::boolean(false)]);
        assert_eq!(changed.name(), Some("Status"));
        assert_eq!(original.name(), None);
    }

    #[test]
    fn test_json_defaults_for_omitted_metadata() {
        let message: Message =
            serde_json::from_str(r#"{"service_id":5,"message_id":6}"#).unwrap();

        assert_eq!(message.category(), MessageCategory::Data);
        assert!(!message.is_forward());
        assert!(message.fields().is_empty());
        assert_eq!(message.name(), None);
    }

    #[test]
    fn test_json_rejects_field_violating_its_type() {
        let json = r#"{
            "service_id": 1, "message_id": 1,
            "fields": [{"field_type": "bool", "value": {"uint": 1}}]
        }"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }
}
