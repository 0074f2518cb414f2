//! TOML configuration for `mtbp-inspect`.
//!
//! The file holds the protocol settings and the schema table the tool
//! decodes against:
//!
//! ```toml
//! log_level = "debug"
//!
//! [protocol]
//! max_nesting_depth = 4
//!
//! [protocol.size_limits]
//! normal = 10240
//! low_power = 5120
//!
//! [[messages]]
//! service_id = 19
//! message_id = 2
//! name = "PositionBatch"
//! direction = "return"
//! fields = [
//!     { name = "terminal", type = "utf8string" },
//!     { name = "positions", type = { array = [
//!         { name = "latitude", type = "int32" },
//!         { name = "longitude", type = "int32" },
//!     ] } },
//!     { name = "comment", type = "utf8string", optional = true },
//! ]
//! ```
//!
//! Every key is optional; an absent key takes its default.

use std::path::{Path, PathBuf};

use mtbp_core::protocol::schema::{SchemaEntry, SchemaError, SchemaRegistry, SchemaSource};
use mtbp_core::ProtocolConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level tool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectConfig {
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Schema table.
    #[serde(default)]
    pub messages: Vec<SchemaEntry>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            protocol: ProtocolConfig::default(),
            messages: Vec::new(),
        }
    }
}

impl InspectConfig {
    /// Parses a configuration document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Builds the schema registry from the `[[messages]]` table.
    pub fn registry(&self) -> Result<SchemaRegistry, SchemaError> {
        SchemaRegistry::load(self)
    }
}

impl SchemaSource for InspectConfig {
    fn load_all(&self) -> Result<Vec<SchemaEntry>, SchemaError> {
        Ok(self.messages.clone())
    }
}

/// Loads the config at `path`, or the default config when no path is given.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<InspectConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(InspectConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    InspectConfig::from_toml(&content)
}
