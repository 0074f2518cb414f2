//! MTBP inspector: entry point.
//!
//! Decodes hex-encoded MTBP frames into JSON lines, or encodes JSON messages
//! into hex frames, against a schema table loaded from a TOML file.
//!
//! # Usage
//!
//! ```text
//! mtbp-inspect [OPTIONS] <COMMAND>
//!
//! Commands:
//!   decode  Hex frames in, JSON lines out
//!   encode  JSON lines in, hex frames out
//!
//! Options:
//!   --config <PATH>   Schema and protocol settings [env: MTBP_CONFIG]
//!   --low-power       Apply the low-power size ceiling
//! ```
//!
//! Decode input lines are either `<hex>` or `<sequence> <hex>`.  When sequence
//! numbers are given they must follow each other in wrap-around order.
//!
//! Logs go to stderr; `RUST_LOG` overrides the `log_level` from the config.
//! The process exits non-zero if any line failed.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mtbp_core::PowerMode;
use mtbp_inspect::{load_config, Inspector};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Decode and encode MTBP satellite frames.
#[derive(Debug, Parser)]
#[command(name = "mtbp-inspect", about = "Decode and encode MTBP satellite frames", version)]
struct Cli {
    /// TOML file holding the schema table and protocol settings.
    ///
    /// Without it the schema table is empty and every frame is rejected as
    /// an unknown service.
    #[arg(long, global = true, env = "MTBP_CONFIG")]
    config: Option<PathBuf>,

    /// Check frames against the low-power size ceiling instead of the normal one.
    #[arg(long, global = true)]
    low_power: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Hex frames in, JSON lines out.
    Decode {
        /// Input file; stdin when omitted.
        #[arg(long, short)]
        input: Option<PathBuf>,
    },
    /// JSON lines in, hex frames out.
    Encode {
        /// Input file; stdin when omitted.
        #[arg(long, short)]
        input: Option<PathBuf>,
    },
}

impl Cli {
    fn power_mode(&self) -> PowerMode {
        if self.low_power {
            PowerMode::LowPower
        } else {
            PowerMode::Normal
        }
    }
}

fn open_input(path: Option<&Path>) -> anyhow::Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open input '{}'", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let inspector =
        Inspector::from_config(&config, cli.power_mode()).context("invalid schema table")?;
    let output = io::stdout().lock();

    let summary = match &cli.command {
        Command::Decode { input } => inspector.decode(open_input(input.as_deref())?, output)?,
        Command::Encode { input } => inspector.encode(open_input(input.as_deref())?, output)?,
    };

    info!(
        "{} line(s) processed, {} failed",
        summary.succeeded + summary.failed,
        summary.failed
    );
    if summary.failed > 0 {
        bail!("{} line(s) could not be processed", summary.failed);
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
