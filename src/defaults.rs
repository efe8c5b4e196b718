//! Default configuration constants for pcmchunk.
//!
//! Shared by the config layer, the pipeline and the CLI so every entry point
//! agrees on the same numbers.

/// Output sample rate in Hz. Fixed; not a configuration option.
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Bytes per encoded PCM sample (signed 16-bit).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Default chunk emission threshold in bytes.
///
/// 1280 bytes is 640 samples, i.e. 40ms of 16kHz mono audio.
pub const CHUNK_THRESHOLD_BYTES: usize = 1280;

/// Default number of frames buffered between the source and the encoder.
pub const FRAME_BUFFER: usize = 64;

/// Default number of chunks buffered between the encoder and the sink.
pub const CHUNK_BUFFER: usize = 32;

/// Samples per frame when reading from a file source.
///
/// Matches the 4096-sample buffer a browser script processor typically hands out.
pub const FILE_FRAME_LEN: usize = 4096;

/// Poll interval of the source thread in milliseconds.
pub const SOURCE_POLL_MS: u64 = 10;

/// Number of consecutive source read errors before the polling thread gives up.
pub const MAX_CONSECUTIVE_SOURCE_ERRORS: u32 = 10;
