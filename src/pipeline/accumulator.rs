//! Byte accumulator that cuts the encoded stream into chunks.
//!
//! Bytes are appended in order. As soon as the buffer holds at least the
//! threshold, the whole buffer is emitted as one [`Chunk`] (oversized appends
//! are not split) and the buffer starts over empty.

use crate::error::{PcmChunkError, Result};
use crate::pipeline::types::Chunk;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// What to do with a sub-threshold remainder when a session stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopPolicy {
    /// Drop the remainder.
    #[default]
    Discard,
    /// Emit the remainder as a final, short chunk.
    Flush,
}

impl std::str::FromStr for StopPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discard" => Ok(StopPolicy::Discard),
            "flush" => Ok(StopPolicy::Flush),
            _ => Err(format!(
                "unknown stop policy '{}': expected 'discard' or 'flush'",
                s
            )),
        }
    }
}

/// Owns the chunk buffer for one session.
#[derive(Debug)]
pub struct ChunkAccumulator {
    buffer: Vec<u8>,
    threshold: usize,
    next_sequence: u64,
}

impl ChunkAccumulator {
    /// Creates an empty accumulator.
    ///
    /// # Errors
    /// Returns `ConfigInvalidValue` if `threshold` is zero.
    pub fn new(threshold: usize) -> Result<Self> {
        if threshold == 0 {
            return Err(PcmChunkError::ConfigInvalidValue {
                key: "chunk_threshold_bytes".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(Self {
            buffer: Vec::with_capacity(threshold),
            threshold,
            next_sequence: 0,
        })
    }

    /// Append `bytes`; returns the whole buffer as a chunk once it reaches the threshold.
    pub fn push(&mut self, bytes: &[u8]) -> Option<Chunk> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() >= self.threshold {
            Some(self.emit())
        } else {
            None
        }
    }

    /// Emit whatever is buffered, even below the threshold.
    ///
    /// Returns `None` when the buffer is empty.
    pub fn take_remainder(&mut self) -> Option<Chunk> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.emit())
        }
    }

    /// Drop whatever is buffered. Returns the number of discarded bytes.
    pub fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }

    /// Apply an end-of-session policy to the remainder.
    pub fn finish(&mut self, policy: StopPolicy) -> Option<Chunk> {
        match policy {
            StopPolicy::Flush => self.take_remainder(),
            StopPolicy::Discard => {
                self.discard();
                None
            }
        }
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Number of chunks emitted so far.
    pub fn emitted(&self) -> u64 {
        self.next_sequence
    }

    fn emit(&mut self) -> Chunk {
        let bytes = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.threshold));
        let chunk = Chunk::new(bytes, self.next_sequence);
        self.next_sequence += 1;
        chunk
    }
}

/// A [`ChunkAccumulator`] behind one mutex, for hosts that append from more
/// than one thread.
///
/// Append, threshold check, emission and reset happen under a single lock
/// acquisition, so the sequence is atomic with respect to other callers.
#[derive(Debug)]
pub struct SharedAccumulator {
    inner: Mutex<ChunkAccumulator>,
}

impl SharedAccumulator {
    pub fn new(threshold: usize) -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(ChunkAccumulator::new(threshold)?),
        })
    }

    /// Atomic append-check-emit-reset.
    pub fn push(&self, bytes: &[u8]) -> Result<Option<Chunk>> {
        Ok(self.lock()?.push(bytes))
    }

    pub fn finish(&self, policy: StopPolicy) -> Result<Option<Chunk>> {
        Ok(self.lock()?.finish(policy))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChunkAccumulator>> {
        self.inner.lock().map_err(|e| {
            PcmChunkError::Other(format!("chunk accumulator lock poisoned: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn zero_threshold_is_rejected() {
        match ChunkAccumulator::new(0) {
            Err(PcmChunkError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "chunk_threshold_bytes");
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn starts_empty() {
        let acc = ChunkAccumulator::new(1280).unwrap();
        assert!(acc.is_empty());
        assert_eq!(acc.threshold(), 1280);
        assert_eq!(acc.emitted(), 0);
    }

    #[test]
    fn below_threshold_emits_nothing() {
        let mut acc = ChunkAccumulator::new(1280).unwrap();
        assert!(acc.push(&[0u8; 700]).is_none());
        assert_eq!(acc.len(), 700);
    }

    #[test]
    fn overshoot_emits_everything_as_one_chunk() {
        let mut acc = ChunkAccumulator::new(1280).unwrap();
        assert!(acc.push(&[1u8; 700]).is_none());

        let chunk = acc.push(&[2u8; 700]).expect("should emit");
        assert_eq!(chunk.len(), 1400);
        assert_eq!(&chunk.as_bytes()[..700], &[1u8; 700][..]);
        assert_eq!(&chunk.as_bytes()[700..], &[2u8; 700][..]);
        assert!(acc.is_empty());
    }

    #[test]
    fn exact_threshold_emits() {
        let mut acc = ChunkAccumulator::new(4).unwrap();
        let chunk = acc.push(&[1, 2, 3, 4]).expect("should emit at threshold");
        assert_eq!(chunk.as_bytes(), &[1, 2, 3, 4]);
        assert!(acc.is_empty());
    }

    #[test]
    fn single_huge_append_yields_one_chunk() {
        let mut acc = ChunkAccumulator::new(1280).unwrap();
        let chunk = acc.push(&[0u8; 10_000]).expect("should emit");
        assert_eq!(chunk.len(), 10_000);
        assert!(acc.push(&[]).is_none());
    }

    #[test]
    fn two_byte_appends_emit_on_each_multiple_of_threshold() {
        let mut acc = ChunkAccumulator::new(1280).unwrap();
        let mut cumulative = 0usize;
        let mut emissions = Vec::new();

        for _ in 0..(1280 * 5 / 2) {
            cumulative += 2;
            if let Some(chunk) = acc.push(&[0xAB, 0xCD]) {
                assert_eq!(chunk.len(), 1280);
                emissions.push(cumulative);
            }
        }

        assert_eq!(emissions, vec![1280, 2560, 3840, 5120, 6400]);
    }

    #[test]
    fn sequence_numbers_increase() {
        let mut acc = ChunkAccumulator::new(2).unwrap();
        let a = acc.push(&[0, 0]).unwrap();
        let b = acc.push(&[0, 0, 0]).unwrap();
        assert_eq!(a.sequence(), 0);
        assert_eq!(b.sequence(), 1);
        assert_eq!(acc.emitted(), 2);
    }

    #[test]
    fn piecewise_and_whole_feeds_concatenate_identically() {
        let a: Vec<u8> = (0..500).map(|i| i as u8).collect();
        let b: Vec<u8> = (0..900).map(|i| (i * 3) as u8).collect();
        let c: Vec<u8> = (0..2000).map(|i| (i * 7) as u8).collect();

        let mut piecewise = ChunkAccumulator::new(1280).unwrap();
        let mut out_piecewise = Vec::new();
        for part in [&a, &b, &c] {
            if let Some(chunk) = piecewise.push(part) {
                out_piecewise.extend(chunk.into_bytes());
            }
        }
        if let Some(chunk) = piecewise.take_remainder() {
            out_piecewise.extend(chunk.into_bytes());
        }

        let whole: Vec<u8> = [a, b, c].concat();
        let mut at_once = ChunkAccumulator::new(1280).unwrap();
        let mut out_at_once = Vec::new();
        if let Some(chunk) = at_once.push(&whole) {
            out_at_once.extend(chunk.into_bytes());
        }
        if let Some(chunk) = at_once.take_remainder() {
            out_at_once.extend(chunk.into_bytes());
        }

        assert_eq!(out_piecewise, whole);
        assert_eq!(out_at_once, whole);
    }

    #[test]
    fn flush_policy_emits_remainder() {
        let mut acc = ChunkAccumulator::new(1280).unwrap();
        acc.push(&[9u8; 100]);
        let chunk = acc.finish(StopPolicy::Flush).expect("remainder");
        assert_eq!(chunk.len(), 100);
        assert!(acc.is_empty());
    }

    #[test]
    fn discard_policy_drops_remainder() {
        let mut acc = ChunkAccumulator::new(1280).unwrap();
        acc.push(&[9u8; 100]);
        assert!(acc.finish(StopPolicy::Discard).is_none());
        assert!(acc.is_empty());
    }

    #[test]
    fn flush_of_empty_buffer_emits_nothing() {
        let mut acc = ChunkAccumulator::new(1280).unwrap();
        assert!(acc.finish(StopPolicy::Flush).is_none());
    }

    #[test]
    fn stop_policy_parses() {
        assert_eq!("flush".parse::<StopPolicy>().unwrap(), StopPolicy::Flush);
        assert_eq!("Discard".parse::<StopPolicy>().unwrap(), StopPolicy::Discard);
        assert!("keep".parse::<StopPolicy>().is_err());
        assert_eq!(StopPolicy::default(), StopPolicy::Discard);
    }

    #[test]
    fn shared_accumulator_keeps_every_byte_across_threads() {
        let shared = Arc::new(SharedAccumulator::new(64).unwrap());
        let emitted = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..4u8)
            .map(|id| {
                let shared = shared.clone();
                let emitted = emitted.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        if let Some(chunk) = shared.push(&[id, id]).unwrap() {
                            emitted.lock().unwrap().push(chunk);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut chunks = emitted.lock().unwrap().clone();
        chunks.sort_by_key(|c| c.sequence());
        let total: usize = chunks.iter().map(|c| c.len()).sum::<usize>() + shared.len().unwrap();
        assert_eq!(total, 4 * 100 * 2);
        assert!(chunks.iter().all(|c| c.len() == 64));
        // Samples are never torn: every 2-byte pair comes from one append.
        for chunk in &chunks {
            for pair in chunk.as_bytes().chunks_exact(2) {
                assert_eq!(pair[0], pair[1]);
            }
        }
    }
}
