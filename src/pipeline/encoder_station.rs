//! Station that turns audio frames into PCM chunks.

use crate::error::PcmChunkError;
use crate::pipeline::accumulator::StopPolicy;
use crate::pipeline::error::StationError;
use crate::pipeline::processor::{FrameProcessor, ProcessorStats};
use crate::pipeline::station::Station;
use crate::pipeline::types::{AudioFrame, Chunk};
use std::sync::{Arc, Mutex};

/// Station wrapping a [`FrameProcessor`].
///
/// This station:
/// - Resamples, encodes and accumulates each frame synchronously
/// - Skips invalid frames (reported as recoverable errors)
/// - Applies the stop policy to the remainder on shutdown
/// - Publishes its running stats for the pipeline handle
pub struct EncoderStation {
    processor: FrameProcessor,
    policy: StopPolicy,
    /// Output channel for the flushed remainder on shutdown.
    flush_tx: Option<crossbeam_channel::Sender<Chunk>>,
    stats: Option<Arc<Mutex<ProcessorStats>>>,
    last_sample_rate: Option<f64>,
}

impl EncoderStation {
    pub fn new(processor: FrameProcessor, policy: StopPolicy) -> Self {
        Self {
            processor,
            policy,
            flush_tx: None,
            stats: None,
            last_sample_rate: None,
        }
    }

    /// Set the output channel used to flush remaining audio on shutdown.
    pub fn with_flush_tx(mut self, tx: crossbeam_channel::Sender<Chunk>) -> Self {
        self.flush_tx = Some(tx);
        self
    }

    /// Share running stats through `stats`, updated after every frame.
    pub fn with_stats(mut self, stats: Arc<Mutex<ProcessorStats>>) -> Self {
        self.stats = Some(stats);
        self
    }

    fn publish_stats(&self) {
        if let Some(ref shared) = self.stats
            && let Ok(mut stats) = shared.lock()
        {
            *stats = self.processor.stats();
        }
    }

    fn note_rate(&mut self, rate: f64) {
        if self.last_sample_rate != Some(rate) {
            if let Some(previous) = self.last_sample_rate {
                tracing::info!(previous, current = rate, "source sample rate changed");
            } else {
                tracing::debug!(rate, "first frame received");
            }
            self.last_sample_rate = Some(rate);
        }
    }
}

impl Station for EncoderStation {
    type Input = AudioFrame;
    type Output = Chunk;

    fn name(&self) -> &'static str {
        "encoder"
    }

    fn process(&mut self, frame: AudioFrame) -> Result<Option<Chunk>, StationError> {
        let result = self.processor.process(&frame);
        self.publish_stats();

        match result {
            Ok(chunk) => {
                self.note_rate(frame.sample_rate);
                if let Some(ref chunk) = chunk {
                    tracing::trace!(
                        sequence = chunk.sequence(),
                        bytes = chunk.len(),
                        "chunk emitted"
                    );
                }
                Ok(chunk)
            }
            Err(e @ PcmChunkError::InvalidFrame { .. }) => Err(StationError::Recoverable(
                format!("frame {} skipped: {}", frame.sequence, e),
            )),
            Err(e) => Err(StationError::Fatal(e.to_string())),
        }
    }

    fn shutdown(&mut self) {
        let remainder = self.processor.finish(self.policy);
        self.publish_stats();

        if let Some(chunk) = remainder
            && let Some(tx) = self.flush_tx.take()
            && tx.send(chunk).is_err()
        {
            tracing::warn!("encoder shutdown: sink already gone, final chunk dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn make_station(threshold: usize, policy: StopPolicy) -> EncoderStation {
        EncoderStation::new(FrameProcessor::new(threshold).unwrap(), policy)
    }

    fn frame(len: usize, rate: f64, sequence: u64) -> AudioFrame {
        AudioFrame::new(vec![0.25; len], rate, Instant::now(), sequence)
    }

    #[test]
    fn test_buffers_until_threshold() {
        let mut station = make_station(1280, StopPolicy::Discard);

        assert!(station.process(frame(350, 16000.0, 0)).unwrap().is_none());
        let chunk = station
            .process(frame(350, 16000.0, 1))
            .unwrap()
            .expect("1400 bytes crosses threshold");
        assert_eq!(chunk.len(), 1400);
    }

    #[test]
    fn test_invalid_frame_is_recoverable() {
        let mut station = make_station(1280, StopPolicy::Discard);

        match station.process(frame(100, 0.0, 9)) {
            Err(StationError::Recoverable(msg)) => {
                assert!(msg.contains("frame 9"), "msg: {}", msg);
            }
            other => panic!("Expected Recoverable, got {:?}", other),
        }

        // The session continues normally.
        assert!(station.process(frame(100, 16000.0, 10)).is_ok());
    }

    #[test]
    fn test_shutdown_flushes_remainder_when_asked() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut station = make_station(1280, StopPolicy::Flush).with_flush_tx(tx);

        station.process(frame(100, 16000.0, 0)).unwrap();
        station.shutdown();

        let chunk = rx.try_recv().expect("remainder flushed");
        assert_eq!(chunk.len(), 200);
    }

    #[test]
    fn test_shutdown_discards_remainder_by_default() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut station = make_station(1280, StopPolicy::default()).with_flush_tx(tx);

        station.process(frame(100, 16000.0, 0)).unwrap();
        station.shutdown();

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stats_are_published() {
        let stats = Arc::new(Mutex::new(ProcessorStats::default()));
        let mut station = make_station(1280, StopPolicy::Discard).with_stats(stats.clone());

        station.process(frame(4410, 44100.0, 0)).unwrap();
        assert!(station.process(frame(10, -5.0, 1)).is_err());

        let snapshot = *stats.lock().unwrap();
        assert_eq!(snapshot.frames, 1);
        assert_eq!(snapshot.rejected_frames, 1);
        assert_eq!(snapshot.input_samples, 4410);
        assert_eq!(snapshot.output_samples, 1600);
    }
}
