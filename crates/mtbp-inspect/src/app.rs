//! Decode and encode pipelines.
//!
//! Both pipelines work line by line over any `BufRead` / `Write` pair, so the
//! binary wires them to files or stdin/stdout and the tests to byte buffers.
//!
//! A bad line never stops a run: it is logged, counted and skipped.  Only a
//! failure to write output aborts.

use std::io::{BufRead, Write};

use anyhow::Context;
use mtbp_core::protocol::codec::Decoder;
use mtbp_core::protocol::schema::SchemaError;
use mtbp_core::{
    encode_checked, Message, ParseError, PowerMode, ProtocolConfig, ProtocolError, SchemaRegistry,
    SequenceValidator,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::InspectConfig;

/// Why one input line was rejected.
#[derive(Debug, Error)]
pub enum LineError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid sequence number '{0}'")]
    Sequence(String),

    #[error("invalid JSON message: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Outcome of one pipeline run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Serialize)]
struct DecodedLine<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence: Option<u16>,
    #[serde(flatten)]
    message: &'a Message,
}

/// Decodes and encodes frames against one schema table.
#[derive(Debug)]
pub struct Inspector {
    registry: SchemaRegistry,
    protocol: ProtocolConfig,
    mode: PowerMode,
}

impl Inspector {
    /// Inspector checking frames against `registry` and the `mode` size ceiling.
    pub fn new(registry: SchemaRegistry, protocol: ProtocolConfig, mode: PowerMode) -> Self {
        Self {
            registry,
            protocol,
            mode,
        }
    }

    /// Builds an inspector from a loaded config file.
    pub fn from_config(config: &InspectConfig, mode: PowerMode) -> Result<Self, SchemaError> {
        let registry = config.registry()?;
        debug!("inspector ready with {} schema entries", registry.len());
        Ok(Self::new(registry, config.protocol.clone(), mode))
    }

    /// Reads `<hex>` or `<sequence> <hex>` lines and writes one JSON line per
    /// decoded frame.
    ///
    /// Sequence numbers, when present, are validated across the whole run.
    pub fn decode<R: BufRead, W: Write>(
        &self,
        input: R,
        mut output: W,
    ) -> anyhow::Result<RunSummary> {
        let mut validator = SequenceValidator::new();
        let mut summary = RunSummary::default();

        for (index, line) in input.lines().enumerate() {
            let line = line.context("failed to read input")?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.decode_line(line, &mut validator) {
                Ok((sequence, message)) => {
                    let json = serde_json::to_string(&DecodedLine {
                        sequence,
                        message: &message,
                    })
                    .context("failed to serialize decoded message")?;
                    writeln!(output, "{json}").context("failed to write output")?;
                    summary.succeeded += 1;
                }
                Err(e) => {
                    warn!("line {}: {e}", index + 1);
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Reads JSON messages, one per line, and writes each as a hex frame.
    pub fn encode<R: BufRead, W: Write>(
        &self,
        input: R,
        mut output: W,
    ) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();

        for (index, line) in input.lines().enumerate() {
            let line = line.context("failed to read input")?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.encode_line(line) {
                Ok(frame) => {
                    writeln!(output, "{}", hex::encode(frame)).context("failed to write output")?;
                    summary.succeeded += 1;
                }
                Err(e) => {
                    warn!("line {}: {e}", index + 1);
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    fn decode_line(
        &self,
        line: &str,
        validator: &mut SequenceValidator,
    ) -> Result<(Option<u16>, Message), LineError> {
        let (sequence, hex_frame) = match line.split_once(char::is_whitespace) {
            Some((seq, rest)) => {
                let seq = seq
                    .parse::<u16>()
                    .map_err(|_| LineError::Sequence(seq.to_string()))?;
                (Some(seq), rest.trim())
            }
            None => (None, line),
        };
        let frame = hex::decode(hex_frame)?;

        self.protocol.size_limits.check(frame.len(), self.mode)?;
        let message = Decoder::new(&self.registry)
            .with_max_depth(self.protocol.max_nesting_depth)
            .decode_frame(&frame)?;
        if let Some(seq) = sequence {
            validator.validate(seq)?;
        }
        Ok((sequence, message))
    }

    fn encode_line(&self, line: &str) -> Result<Vec<u8>, LineError> {
        let message: Message = serde_json::from_str(line)?;
        let frame = encode_checked(&message, &self.registry)?;
        self.protocol.size_limits.check(frame.len(), self.mode)?;
        Ok(frame)
    }
}
