use crate::defaults::{CHUNK_BUFFER, CHUNK_THRESHOLD_BYTES, FILE_FRAME_LEN, FRAME_BUFFER};
use crate::error::{PcmChunkError, Result};
use crate::pipeline::accumulator::StopPolicy;
use crate::pipeline::orchestrator::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineSection,
    pub source: SourceSection,
}

/// Chunking and channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineSection {
    pub chunk_threshold_bytes: usize,
    pub stop_policy: StopPolicy,
    pub frame_buffer: usize,
    pub chunk_buffer: usize,
}

/// Frame source configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceSection {
    /// Capture device name; the best default device when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Samples per frame when reading files.
    pub frame_len: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            chunk_threshold_bytes: CHUNK_THRESHOLD_BYTES,
            stop_policy: StopPolicy::default(),
            frame_buffer: FRAME_BUFFER,
            chunk_buffer: CHUNK_BUFFER,
        }
    }
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            device: None,
            frame_len: FILE_FRAME_LEN,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::parse(&contents)?)
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false) =>
            {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - PCMCHUNK_CHUNK_THRESHOLD → pipeline.chunk_threshold_bytes
    /// - PCMCHUNK_STOP_POLICY → pipeline.stop_policy
    /// - PCMCHUNK_AUDIO_DEVICE → source.device
    ///
    /// Unparseable values are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(threshold) = std::env::var("PCMCHUNK_CHUNK_THRESHOLD")
            && !threshold.is_empty()
        {
            match threshold.parse() {
                Ok(value) => self.pipeline.chunk_threshold_bytes = value,
                Err(e) => tracing::warn!("ignoring PCMCHUNK_CHUNK_THRESHOLD={threshold}: {e}"),
            }
        }

        if let Ok(policy) = std::env::var("PCMCHUNK_STOP_POLICY")
            && !policy.is_empty()
        {
            match policy.parse() {
                Ok(value) => self.pipeline.stop_policy = value,
                Err(e) => tracing::warn!("ignoring PCMCHUNK_STOP_POLICY: {e}"),
            }
        }

        if let Ok(device) = std::env::var("PCMCHUNK_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.source.device = Some(device);
        }

        self
    }

    /// Reject sizes that would stall the pipeline.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("pipeline.chunk_threshold_bytes", self.pipeline.chunk_threshold_bytes),
            ("pipeline.frame_buffer", self.pipeline.frame_buffer),
            ("pipeline.chunk_buffer", self.pipeline.chunk_buffer),
            ("source.frame_len", self.source.frame_len),
        ];
        for (key, value) in checks {
            if value == 0 {
                return Err(PcmChunkError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            chunk_threshold_bytes: self.pipeline.chunk_threshold_bytes,
            stop_policy: self.pipeline.stop_policy,
            frame_buffer: self.pipeline.frame_buffer,
            chunk_buffer: self.pipeline.chunk_buffer,
        }
    }

    /// Serialize as TOML, as written by `config init`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PcmChunkError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/pcmchunk/config.toml on Linux, or a path relative to
    /// the working directory when no config directory is known.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pcmchunk")
            .join("config.toml")
    }
}
