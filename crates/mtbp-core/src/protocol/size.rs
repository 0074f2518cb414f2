//! Message-size ceilings.
//!
//! A terminal in reduced-power mode accepts smaller frames than one running
//! normally.  The power mode is supplied by the caller for every check; this
//! module does not track it.

use serde::{Deserialize, Serialize};

use crate::protocol::error::ParseError;

/// Frame size ceiling in normal mode (header + payload, bytes).
pub const DEFAULT_NORMAL_LIMIT: usize = 10_240;

/// Frame size ceiling in reduced-power mode.
pub const DEFAULT_LOW_POWER_LIMIT: usize = 5_120;

/// Power mode reported by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerMode {
    #[default]
    Normal,
    LowPower,
}

/// Size ceilings per power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSizeLimits {
    #[serde(default = "default_normal")]
    pub normal: usize,
    #[serde(default = "default_low_power")]
    pub low_power: usize,
}

fn default_normal() -> usize {
    DEFAULT_NORMAL_LIMIT
}

fn default_low_power() -> usize {
    DEFAULT_LOW_POWER_LIMIT
}

impl Default for MessageSizeLimits {
    fn default() -> Self {
        Self {
            normal: default_normal(),
            low_power: default_low_power(),
        }
    }
}

impl MessageSizeLimits {
    /// The ceiling that applies in `mode`.
    pub fn limit(&self, mode: PowerMode) -> usize {
        match mode {
            PowerMode::Normal => self.normal,
            PowerMode::LowPower => self.low_power,
        }
    }

    /// Checks a frame's total encoded length against the ceiling for `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidSize`] if `frame_len` exceeds it.
    pub fn check(&self, frame_len: usize, mode: PowerMode) -> Result<(), ParseError> {
        let limit = self.limit(mode);
        if frame_len > limit {
            return Err(ParseError::InvalidSize(format!(
                "{frame_len}-byte frame exceeds the {limit}-byte {mode:?} limit"
            )));
        }
        Ok(())
    }
}
