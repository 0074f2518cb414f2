//! Message schema registry.
//!
//! A schema entry lists, in wire order, the fields a `(service_id,
//! message_id)` pair carries.  The registry is filled once from a
//! [`SchemaSource`] and is read-only afterwards, so one instance can be shared
//! (e.g. behind an `Arc`) by any number of sessions without locking.
//! Re-reading the source is always an explicit [`SchemaRegistry::reload`]; a
//! lookup never touches the source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::protocol::error::ParseError;
use crate::protocol::field::{conform_fields, Field, FieldDef, FieldType, FieldValue};
use crate::protocol::message::Message;

/// Which way a message type travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Gateway to terminal.
    Forward,
    /// Terminal to gateway.
    Return,
    #[default]
    Both,
}

/// Layout of one message type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub service_id: u8,
    pub message_id: u8,
    pub name: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default, rename = "fields")]
    pub field_defs: Vec<FieldDef>,
}

/// Failure to build a registry from a schema source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate schema entry {service_id}:{message_id} ('{first}' and '{second}')")]
    Duplicate {
        service_id: u8,
        message_id: u8,
        first: String,
        second: String,
    },

    #[error("schema source failed: {0}")]
    Source(String),
}

/// Where schema entries come from (a config file, a database table, ...).
#[cfg_attr(test, mockall::automock)]
pub trait SchemaSource {
    /// Returns every schema entry the source knows about.
    fn load_all(&self) -> Result<Vec<SchemaEntry>, SchemaError>;
}

/// A schema source over an in-memory list.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaSource {
    entries: Vec<SchemaEntry>,
}

impl StaticSchemaSource {
    /// Serves `entries` on every `load_all` call.
    pub fn new(entries: Vec<SchemaEntry>) -> Self {
        Self { entries }
    }
}

impl SchemaSource for StaticSchemaSource {
    fn load_all(&self) -> Result<Vec<SchemaEntry>, SchemaError> {
        Ok(self.entries.clone())
    }
}

/// Lookup table from `(service_id, message_id)` to [`SchemaEntry`].
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entries: BTreeMap<(u8, u8), SchemaEntry>,
}

impl SchemaRegistry {
    /// A registry with no entries; every lookup fails with `InvalidSin`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Calls `source.load_all()` once and indexes the result.
    ///
    /// # Errors
    ///
    /// Propagates the source's error, or returns [`SchemaError::Duplicate`] if
    /// two entries share a key.
    pub fn load<S: SchemaSource + ?Sized>(source: &S) -> Result<Self, SchemaError> {
        Self::from_entries(source.load_all()?)
    }

    /// Indexes an already-loaded entry list.
    pub fn from_entries(entries: Vec<SchemaEntry>) -> Result<Self, SchemaError> {
        let mut map: BTreeMap<(u8, u8), SchemaEntry> = BTreeMap::new();
        for entry in entries {
            let key = (entry.service_id, entry.message_id);
            if let Some(existing) = map.get(&key) {
                return Err(SchemaError::Duplicate {
                    service_id: key.0,
                    message_id: key.1,
                    first: existing.name.clone(),
                    second: entry.name,
                });
            }
            map.insert(key, entry);
        }
        debug!("schema registry loaded with {} entries", map.len());
        Ok(Self { entries: map })
    }

    /// Re-reads `source` and replaces the table.  On error the current table
    /// is kept.
    pub fn reload<S: SchemaSource + ?Sized>(&mut self, source: &S) -> Result<(), SchemaError> {
        let fresh = Self::load(source)?;
        debug!(
            "schema registry reloaded: {} -> {} entries",
            self.entries.len(),
            fresh.entries.len()
        );
        *self = fresh;
        Ok(())
    }

    /// Finds the entry for `(service_id, message_id)`.
    ///
    /// # Errors
    ///
    /// - [`ParseError::InvalidSin`] – no entry has this service id.
    /// - [`ParseError::InvalidMin`] – the service id is known but this message
    ///   id is not.
    pub fn lookup(&self, service_id: u8, message_id: u8) -> Result<&SchemaEntry, ParseError> {
        if let Some(entry) = self.entries.get(&(service_id, message_id)) {
            return Ok(entry);
        }
        let service_known = self
            .entries
            .range((service_id, u8::MIN)..=(service_id, u8::MAX))
            .next()
            .is_some();
        if service_known {
            Err(ParseError::InvalidMin(format!(
                "message id {message_id} is not defined for service {service_id}"
            )))
        } else {
            Err(ParseError::InvalidSin(format!("service id {service_id} is not defined")))
        }
    }

    /// Checks an application-built message against its schema entry.
    ///
    /// # Errors
    ///
    /// - [`ParseError::InvalidSin`] / [`ParseError::InvalidMin`] – unknown key.
    /// - [`ParseError::MissingField`] – a required field is absent.
    /// - [`ParseError::InvalidFieldValue`] – a field's type differs from the
    ///   declared type.
    /// - [`ParseError::InvalidStructure`] – more fields than declared.
    ///
    /// Nested messages, including those inside array elements, are checked
    /// against their own entries.
    pub fn conform(&self, message: &Message) -> Result<&SchemaEntry, ParseError> {
        let entry = self.lookup(message.service_id(), message.message_id())?;
        self.conform_nested(&entry.field_defs, message.fields())
            .map_err(|e| e.within(format_args!("message '{}'", entry.name)))?;
        Ok(entry)
    }

    fn conform_nested(&self, defs: &[FieldDef], fields: &[Field]) -> Result<(), ParseError> {
        conform_fields(defs, fields)?;
        for (def, field) in defs.iter().zip(fields) {
            let scope = |e: ParseError| e.within(format_args!("field '{}'", def.name));
            match (&def.field_type, field.value()) {
                (_, FieldValue::Message(inner)) => {
                    self.conform(inner).map_err(scope)?;
                }
                (FieldType::Array(layout), FieldValue::Array(elements)) => {
                    for element in elements {
                        self.conform_nested(layout, element.fields())
                            .map_err(|e| e.within(format_args!("element {}", element.index())))
                            .map_err(scope)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Number of registered message types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no message type is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, ordered by key.
    pub fn entries(&self) -> impl Iterator<Item = &SchemaEntry> {
        self.entries.values()
    }
}
