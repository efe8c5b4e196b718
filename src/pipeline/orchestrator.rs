//! Threaded pipeline: FrameSource → EncoderStation → SinkStation.

use crate::audio::source::FrameSource;
use crate::defaults::{
    CHUNK_BUFFER, CHUNK_THRESHOLD_BYTES, FRAME_BUFFER, MAX_CONSECUTIVE_SOURCE_ERRORS,
    SOURCE_POLL_MS,
};
use crate::error::{PcmChunkError, Result};
use crate::pipeline::accumulator::StopPolicy;
use crate::pipeline::encoder_station::EncoderStation;
use crate::pipeline::error::{ErrorReporter, LogReporter};
use crate::pipeline::processor::{FrameProcessor, ProcessorStats};
use crate::pipeline::sink::{ChunkSink, SinkStation, SinkSummary};
use crate::pipeline::station::{Delivery, StationRunner};
use crate::pipeline::types::AudioFrame;
use crate::session::SessionContext;
use crossbeam_channel::{Receiver, TrySendError, bounded};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Bytes that must accumulate before a chunk is emitted.
    pub chunk_threshold_bytes: usize,
    /// What happens to a partial chunk when the session stops.
    pub stop_policy: StopPolicy,
    /// Channel buffer sizes
    pub frame_buffer: usize,
    pub chunk_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_threshold_bytes: CHUNK_THRESHOLD_BYTES,
            stop_policy: StopPolicy::default(),
            frame_buffer: FRAME_BUFFER,
            chunk_buffer: CHUNK_BUFFER,
        }
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    /// Flag to signal shutdown
    running: Arc<AtomicBool>,
    /// Join handles for spawned threads
    threads: Vec<JoinHandle<()>>,
    /// Receiver for the sink's summary, sent once the sink has finished
    result_rx: Receiver<SinkSummary>,
    stats: Arc<Mutex<ProcessorStats>>,
    dropped_frames: Arc<AtomicU64>,
    /// Set by the polling thread when a finite source is exhausted.
    source_done: Arc<AtomicBool>,
    session: SessionContext,
}

impl PipelineHandle {
    /// Stops the pipeline gracefully and returns what the sink received.
    ///
    /// Waits up to 5s for the sink to finish, then 1s for threads to exit.
    /// After the deadline, remaining threads are detached.
    pub fn stop(mut self) -> SinkSummary {
        self.running.store(false, Ordering::SeqCst);

        let summary = match self.result_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(session = self.session.id(), "no sink summary: {}", e);
                SinkSummary::default()
            }
        };

        let deadline = Instant::now() + Duration::from_secs(1);
        let poll_interval = Duration::from_millis(20);

        loop {
            let mut remaining = Vec::new();
            for handle in self.threads.drain(..) {
                if handle.is_finished() {
                    if let Err(panic_info) = handle.join() {
                        let msg = panic_info
                            .downcast_ref::<&str>()
                            .copied()
                            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                            .unwrap_or("unknown panic");
                        tracing::error!("pipeline thread panicked: {msg}");
                    }
                } else {
                    remaining.push(handle);
                }
            }
            self.threads = remaining;

            if self.threads.is_empty() {
                break;
            }

            if Instant::now() >= deadline {
                tracing::warn!(
                    threads = self.threads.len(),
                    "shutdown timeout, detaching pipeline threads"
                );
                break;
            }

            thread::sleep(poll_interval);
        }

        tracing::info!(
            session = self.session.id(),
            chunks = summary.chunks,
            bytes = summary.bytes,
            failed = summary.failed,
            dropped_frames = self.dropped_frames(),
            "session stopped"
        );
        summary
    }

    /// Blocks until a finite source is exhausted, then stops the pipeline.
    ///
    /// For live sources this only returns once another thread clears the
    /// running flag, so callers should use [`stop`](Self::stop) instead.
    pub fn wait(self) -> SinkSummary {
        while self.is_running() && !self.source_done.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(SOURCE_POLL_MS));
        }
        self.stop()
    }

    /// Returns true if the pipeline is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the encoder's counters.
    pub fn stats(&self) -> ProcessorStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }

    /// Frames dropped because the encoder fell behind.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }
}

/// Audio pipeline: FrameSource → Encoder → ChunkSink.
pub struct Pipeline {
    config: PipelineConfig,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl Pipeline {
    /// Creates a new pipeline with default error reporter.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Starts the pipeline for one session.
    ///
    /// # Arguments
    /// * `source` - Frame source (capture device, file, mock)
    /// * `sink` - Chunk consumer
    /// * `session` - Context handed to the sink before the first chunk, with
    ///   the source's native rate filled in when the source reports one
    ///
    /// # Returns
    /// Handle to control and stop the pipeline
    pub fn start(
        self,
        mut source: Box<dyn FrameSource>,
        mut sink: Box<dyn ChunkSink>,
        session: &SessionContext,
    ) -> Result<PipelineHandle> {
        if self.config.frame_buffer == 0 || self.config.chunk_buffer == 0 {
            return Err(PcmChunkError::ConfigInvalidValue {
                key: "pipeline".to_string(),
                message: "channel buffers must be greater than 0".to_string(),
            });
        }
        let processor = FrameProcessor::new(self.config.chunk_threshold_bytes)?;

        source.start()?;
        let session = match source.native_rate() {
            Some(rate) => session.clone().with_source_rate(rate),
            None => session.clone(),
        };
        if let Err(e) = sink.begin(&session) {
            if let Err(stop_err) = source.stop() {
                tracing::warn!("failed to stop source after sink error: {stop_err}");
            }
            return Err(e);
        }
        tracing::info!(
            %session,
            source_rate = ?session.source_rate(),
            threshold = self.config.chunk_threshold_bytes,
            policy = ?self.config.stop_policy,
            "session started"
        );

        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(Mutex::new(ProcessorStats::default()));
        let dropped_frames = Arc::new(AtomicU64::new(0));
        let source_done = Arc::new(AtomicBool::new(false));

        let (frame_tx, frame_rx) = bounded::<AudioFrame>(self.config.frame_buffer);
        let (chunk_tx, chunk_rx) = bounded(self.config.chunk_buffer);
        let (result_tx, result_rx) = bounded(1);

        let encoder = EncoderStation::new(processor, self.config.stop_policy)
            .with_flush_tx(chunk_tx.clone())
            .with_stats(stats.clone());
        let encoder_runner = StationRunner::spawn_with_delivery(
            encoder,
            frame_rx,
            chunk_tx,
            self.error_reporter.clone(),
            Delivery::NonBlocking,
        );

        // Terminal station: the output channel is never written to.
        let (sink_out_tx, _sink_out_rx) = bounded::<()>(1);
        let sink_runner = StationRunner::spawn(
            SinkStation::new(sink, result_tx),
            chunk_rx,
            sink_out_tx,
            self.error_reporter.clone(),
        );

        let source_is_finite = source.is_finite();
        let source_label = source.label();
        let poll_running = running.clone();
        let poll_dropped = dropped_frames.clone();
        let poll_done = source_done.clone();
        let poll_handle = thread::Builder::new()
            .name("source-poll".to_string())
            .spawn(move || {
                let poll_interval = Duration::from_millis(SOURCE_POLL_MS);
                let mut consecutive_errors: u32 = 0;
                let mut sequence: u64 = 0;

                while poll_running.load(Ordering::SeqCst) {
                    let frame = match source.read_frame() {
                        Ok(frame) => {
                            consecutive_errors = 0;
                            frame
                        }
                        Err(e) => {
                            consecutive_errors += 1;
                            if consecutive_errors >= MAX_CONSECUTIVE_SOURCE_ERRORS {
                                tracing::error!(
                                    source = %source_label,
                                    "capture failed {consecutive_errors} times in a row: {e}"
                                );
                                break;
                            }
                            thread::sleep(poll_interval);
                            continue;
                        }
                    };

                    let Some(frame) = frame else {
                        if source_is_finite {
                            break;
                        }
                        thread::sleep(poll_interval);
                        continue;
                    };

                    let frame =
                        AudioFrame::new(frame.samples, frame.sample_rate, Instant::now(), sequence);
                    sequence += 1;

                    match frame_tx.try_send(frame) {
                        Ok(()) => {}
                        Err(TrySendError::Full(frame)) => {
                            poll_dropped.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(
                                sequence = frame.sequence,
                                "encoder behind, frame dropped"
                            );
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }

                if sequence == 0 && !source_is_finite {
                    tracing::warn!(source = %source_label, "no audio frames captured");
                }

                if let Err(e) = source.stop() {
                    tracing::warn!(source = %source_label, "failed to stop source: {e}");
                }
                poll_done.store(true, Ordering::SeqCst);
                // frame_tx drops here, letting the encoder drain and shut down
            })?;

        let mut threads = vec![poll_handle];
        threads.push(thread::spawn(move || {
            if let Err(msg) = encoder_runner.join() {
                tracing::error!("{msg}");
            }
        }));
        threads.push(thread::spawn(move || {
            if let Err(msg) = sink_runner.join() {
                tracing::error!("{msg}");
            }
        }));

        Ok(PipelineHandle {
            running,
            threads,
            result_rx,
            stats,
            dropped_frames,
            source_done,
            session,
        })
    }
}
