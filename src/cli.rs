//! Command-line interface for pcmchunk
//!
//! Provides argument parsing using clap derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Stream audio as 16 kHz s16le PCM chunks
#[derive(Parser, Debug)]
#[command(name = "pcmchunk", version, about = "Stream audio as 16 kHz s16le PCM chunks")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// What to write for each chunk.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Raw s16le bytes
    #[default]
    Raw,
    /// 16 kHz mono 16-bit WAV file
    Wav,
    /// One FROM_OPTION JSON line per chunk
    Events,
}

/// Where and how chunks are written.
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output path, or '-' for stdout
    #[arg(long, short = 'o', value_name = "PATH", default_value = "-")]
    pub output: PathBuf,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Raw)]
    pub format: OutputFormat,
}

/// Per-run overrides of the [pipeline] config section.
#[derive(Args, Debug, Clone, Default)]
pub struct ChunkArgs {
    /// Emit a chunk once this many bytes are buffered
    #[arg(long, short = 't', value_name = "BYTES")]
    pub threshold: Option<usize>,

    /// Emit the partial last chunk on stop instead of discarding it
    #[arg(long)]
    pub flush: bool,
}

/// Parse a duration string.
///
/// Supports any duration format accepted by `humantime`: bare numbers (seconds),
/// single-unit (`30s`, `5m`, `2h`), and compound (`1h30m`, `2m30s`).
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record from an audio input device
    #[cfg(feature = "cpal-audio")]
    Record {
        /// Audio input device (see `pcmchunk devices`)
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,

        /// Stop after this long (default: until Enter is pressed). Examples: 30s, 5m
        #[arg(long, short = 'd', value_name = "DURATION", value_parser = parse_duration)]
        duration: Option<Duration>,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        chunk: ChunkArgs,
    },

    /// Convert a WAV file (or WAV on stdin) into chunks
    Convert {
        /// Input WAV file, or '-' for stdin
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Samples per frame read from the file
        #[arg(long, value_name = "SAMPLES")]
        frame_len: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        chunk: ChunkArgs,
    },

    /// Record sessions driven by JSON control messages on stdin
    Serve {
        /// Replay this WAV file for every session instead of capturing live audio
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        chunk: ChunkArgs,
    },

    /// Summarise FROM_OPTION chunk events read from stdin
    Watch,

    /// List available audio input devices
    #[cfg(feature = "cpal-audio")]
    Devices,

    /// Manage configuration
    Config {
        /// Action to perform
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
