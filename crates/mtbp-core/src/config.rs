//! Protocol settings shared by every session of a gateway.
//!
//! Every field has a serde default, so a partial (or empty) `[protocol]`
//! table in a config file yields a working configuration:
//!
//! ```toml
//! [protocol]
//! max_nesting_depth = 4
//!
//! [protocol.size_limits]
//! low_power = 4096
//! ```

use serde::{Deserialize, Serialize};

use crate::protocol::codec::DEFAULT_MAX_NESTING_DEPTH;
use crate::protocol::size::MessageSizeLimits;

/// Codec and session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Frame size ceilings per power mode.
    #[serde(default)]
    pub size_limits: MessageSizeLimits,
    /// Deepest allowed nesting of `Array` / `Message` fields.
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,
}

fn default_max_nesting_depth() -> usize {
    DEFAULT_MAX_NESTING_DEPTH
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            size_limits: MessageSizeLimits::default(),
            max_nesting_depth: default_max_nesting_depth(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProtocolConfig::default();
        assert_eq!(config.max_nesting_depth, 8);
        assert_eq!(config.size_limits.normal, 10_240);
        assert_eq!(config.size_limits.low_power, 5_120);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: ProtocolConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ProtocolConfig::default());
    }

    #[test]
    fn test_partial_document_overrides_only_given_keys() {
        let config: ProtocolConfig =
            serde_json::from_str(r#"{"size_limits": {"normal": 2048}}"#).unwrap();
        assert_eq!(config.size_limits.normal, 2048);
        assert_eq!(config.size_limits.low_power, 5_120);
        assert_eq!(config.max_nesting_depth, 8);
    }
}
