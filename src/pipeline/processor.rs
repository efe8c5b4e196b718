//! Per-frame processing step and the lazy chunk iterator built on it.

use crate::error::Result;
use crate::pipeline::accumulator::{ChunkAccumulator, StopPolicy};
use crate::pipeline::pcm::encode_pcm16_into;
use crate::pipeline::resample::resample;
use crate::pipeline::types::{AudioFrame, Chunk};
use tracing::{debug, warn};

/// Running totals for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Frames that went through resample and encode.
    pub frames: u64,
    /// Frames rejected as invalid.
    pub rejected_frames: u64,
    /// Samples received at the source rate.
    pub input_samples: u64,
    /// Samples produced at the target rate.
    pub output_samples: u64,
    /// NaN/infinite samples encoded as silence.
    pub non_finite_samples: u64,
    /// Chunks emitted, including a flushed remainder.
    pub chunks: u64,
}

/// Resample, encode and accumulate one frame at a time.
///
/// All work for a frame happens synchronously inside [`process`](Self::process),
/// so the cost per call is proportional to the frame length.
pub struct FrameProcessor {
    accumulator: ChunkAccumulator,
    scratch: Vec<u8>,
    stats: ProcessorStats,
}

impl FrameProcessor {
    /// Creates a processor emitting chunks of at least `threshold` bytes.
    pub fn new(threshold: usize) -> Result<Self> {
        Ok(Self {
            accumulator: ChunkAccumulator::new(threshold)?,
            scratch: Vec::new(),
            stats: ProcessorStats::default(),
        })
    }

    /// Push one frame through the pipeline.
    ///
    /// Returns a chunk when this frame brought the buffer to the threshold.
    ///
    /// # Errors
    /// `InvalidFrame` when the frame's sample rate is unusable. The frame
    /// contributes nothing and the buffered bytes are left untouched.
    pub fn process(&mut self, frame: &AudioFrame) -> Result<Option<Chunk>> {
        let resampled = match resample(&frame.samples, frame.sample_rate) {
            Ok(resampled) => resampled,
            Err(e) => {
                self.stats.rejected_frames += 1;
                return Err(e);
            }
        };

        self.scratch.clear();
        let encoded = encode_pcm16_into(&resampled, &mut self.scratch);
        if encoded.non_finite > 0 {
            debug!(
                sequence = frame.sequence,
                count = encoded.non_finite,
                "replaced non-finite samples with silence"
            );
        }

        self.stats.frames += 1;
        self.stats.input_samples += frame.samples.len() as u64;
        self.stats.output_samples += encoded.samples as u64;
        self.stats.non_finite_samples += encoded.non_finite as u64;

        let chunk = self.accumulator.push(&self.scratch);
        if chunk.is_some() {
            self.stats.chunks += 1;
        }
        Ok(chunk)
    }

    /// Apply the stop policy to whatever is still buffered.
    pub fn finish(&mut self, policy: StopPolicy) -> Option<Chunk> {
        let buffered = self.accumulator.len();
        let chunk = self.accumulator.finish(policy);
        match &chunk {
            Some(chunk) => {
                self.stats.chunks += 1;
                debug!(bytes = chunk.len(), "flushed final partial chunk");
            }
            None if buffered > 0 => {
                debug!(bytes = buffered, "discarded partial chunk on stop");
            }
            None => {}
        }
        chunk
    }

    /// Bytes waiting for the next emission.
    pub fn buffered(&self) -> usize {
        self.accumulator.len()
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }
}

/// Lazily turns a sequence of frames into a sequence of chunks.
///
/// Invalid frames are skipped with a warning. When the frames run out, the
/// stop policy decides whether a final short chunk is yielded.
pub struct ChunkStream<I> {
    frames: I,
    processor: FrameProcessor,
    policy: StopPolicy,
    done: bool,
}

impl<I: Iterator<Item = AudioFrame>> ChunkStream<I> {
    pub fn new<F>(frames: F, threshold: usize, policy: StopPolicy) -> Result<Self>
    where
        F: IntoIterator<IntoIter = I>,
    {
        Ok(Self {
            frames: frames.into_iter(),
            processor: FrameProcessor::new(threshold)?,
            policy,
            done: false,
        })
    }

    pub fn stats(&self) -> ProcessorStats {
        self.processor.stats()
    }
}

impl<I: Iterator<Item = AudioFrame>> Iterator for ChunkStream<I> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        for frame in self.frames.by_ref() {
            match self.processor.process(&frame) {
                Ok(Some(chunk)) => return Some(chunk),
                Ok(None) => {}
                Err(e) => warn!(sequence = frame.sequence, "skipping frame: {}", e),
            }
        }

        self.done = true;
        self.processor.finish(self.policy)
    }
}
