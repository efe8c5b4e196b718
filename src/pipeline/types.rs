//! Data types for the resample-and-encode pipeline.

use crate::defaults::{BYTES_PER_SAMPLE, TARGET_SAMPLE_RATE};
use std::time::Instant;

/// A frame of raw float audio as delivered by a capture callback.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono float samples, nominally in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate the frame was captured at, in Hz.
    pub sample_rate: f64,
    /// Timestamp when this frame was captured.
    pub timestamp: Instant,
    /// Sequence number for ordering and gap detection.
    pub sequence: u64,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(samples: Vec<f32>, sample_rate: f64, timestamp: Instant, sequence: u64) -> Self {
        Self {
            samples,
            sample_rate,
            timestamp,
            sequence,
        }
    }

    /// Duration of the frame at its native rate, in milliseconds.
    ///
    /// Returns 0 for frames with a non-positive rate.
    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.samples.len() as f64 * 1000.0 / self.sample_rate
        } else {
            0.0
        }
    }
}

/// An emitted batch of 16 kHz signed 16-bit little-endian PCM bytes.
///
/// Immutable once built: the bytes are only reachable through shared
/// accessors or by consuming the chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    bytes: Vec<u8>,
    sequence: u64,
}

impl Chunk {
    pub(crate) fn new(bytes: Vec<u8>, sequence: u64) -> Self {
        Self { bytes, sequence }
    }

    /// Position of this chunk in the session's emission order, starting at 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the chunk and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of whole PCM samples in the chunk.
    pub fn sample_count(&self) -> usize {
        self.bytes.len() / BYTES_PER_SAMPLE
    }

    /// Audio duration covered by the chunk at the target rate.
    pub fn duration_ms(&self) -> u32 {
        (self.sample_count() as u64 * 1000 / TARGET_SAMPLE_RATE as u64) as u32
    }
}
