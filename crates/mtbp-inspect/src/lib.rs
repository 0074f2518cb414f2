//! Library half of the `mtbp-inspect` operator tool.
//!
//! The binary in `main.rs` only parses arguments and wires stdin/stdout; the
//! pipelines live here so they can be tested against in-memory buffers.

pub mod app;
pub mod config;

pub use app::{Inspector, LineError, RunSummary};
pub use config::{load_config, ConfigError, InspectConfig};
