//! pcmchunk - Streaming audio to 16 kHz PCM chunks
//!
//! Resamples captured float audio to 16 kHz, encodes it as signed 16-bit
//! little-endian PCM and hands it on in fixed-threshold chunks.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod control;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod recorder;
pub mod session;

#[cfg(feature = "cli")]
pub mod app;

// Core traits (source → process → sink)
pub use audio::source::FrameSource;
pub use pipeline::sink::{ChunkSink, CollectorSink};

// Synchronous core
pub use pipeline::pcm::{encode_pcm16, encode_pcm16_into};
pub use pipeline::processor::{ChunkStream, FrameProcessor};
pub use pipeline::resample::resample;
pub use pipeline::types::{AudioFrame, Chunk};

// Pipeline
pub use pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use recorder::Recorder;
pub use session::SessionContext;

// Error handling
pub use error::{PcmChunkError, Result};

// Config
pub use config::Config;

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_has_hash_suffix_only_with_git_hash() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
