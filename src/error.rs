//! Error types for pcmchunk.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PcmChunkError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Stream errors
    #[error("Invalid audio frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("Chunk sink unavailable: {message}")]
    SinkUnavailable { message: String },

    // Control protocol errors
    #[error("Control message error: {message}")]
    Control { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, PcmChunkError>;
