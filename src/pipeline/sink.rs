use crate::control::{ChunkReport, ControlMessage};
use crate::defaults::TARGET_SAMPLE_RATE;
use crate::error::{PcmChunkError, Result};
use crate::pipeline::error::StationError;
use crate::pipeline::pcm::pcm16_to_i16;
use crate::pipeline::station::Station;
use crate::pipeline::types::Chunk;
use crate::session::SessionContext;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Pluggable chunk consumer for the pipeline.
/// Pairs with FrameSource for input - this handles encoded output.
pub trait ChunkSink: Send + 'static {
    /// Called once before the first chunk of a session.
    fn begin(&mut self, _session: &SessionContext) -> Result<()> {
        Ok(())
    }

    /// Accept one chunk. Chunks arrive in emission order.
    ///
    /// An error drops this chunk only; later chunks are still delivered.
    fn accept(&mut self, chunk: Chunk) -> Result<()>;

    /// Called on pipeline shutdown after the last chunk.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// What a sink received over a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkSummary {
    /// Chunks accepted.
    pub chunks: u64,
    /// Bytes accepted.
    pub bytes: u64,
    /// Chunks the sink refused.
    pub failed: u64,
}

impl SinkSummary {
    /// Audio duration accepted, in milliseconds at the target rate.
    pub fn duration_ms(&self) -> u64 {
        self.bytes / 2 * 1000 / TARGET_SAMPLE_RATE as u64
    }
}

/// Station wrapper for any ChunkSink implementation.
pub(crate) struct SinkStation {
    sink: Box<dyn ChunkSink>,
    summary: SinkSummary,
    result_tx: Option<crossbeam_channel::Sender<SinkSummary>>,
}

impl SinkStation {
    pub(crate) fn new(
        sink: Box<dyn ChunkSink>,
        result_tx: crossbeam_channel::Sender<SinkSummary>,
    ) -> Self {
        Self {
            sink,
            summary: SinkSummary::default(),
            result_tx: Some(result_tx),
        }
    }
}

impl Station for SinkStation {
    type Input = Chunk;
    type Output = ();

    fn name(&self) -> &'static str {
        self.sink.name()
    }

    fn process(&mut self, chunk: Chunk) -> std::result::Result<Option<()>, StationError> {
        let sequence = chunk.sequence();
        let len = chunk.len() as u64;
        match self.sink.accept(chunk) {
            Ok(()) => {
                self.summary.chunks += 1;
                self.summary.bytes += len;
                Ok(None)
            }
            Err(e) => {
                self.summary.failed += 1;
                let e = PcmChunkError::SinkUnavailable {
                    message: e.to_string(),
                };
                Err(StationError::Recoverable(format!(
                    "chunk {} dropped: {}",
                    sequence, e
                )))
            }
        }
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.sink.finish() {
            tracing::warn!(sink = self.sink.name(), "finishing sink failed: {}", e);
        }
        if let Some(tx) = self.result_tx.take()
            && tx.send(self.summary).is_err()
        {
            tracing::debug!("sink shutdown: summary receiver already dropped");
        }
    }
}

/// Collects chunks in memory. Clone the handle before moving the sink into a pipeline.
#[derive(Default)]
pub struct CollectorSink {
    chunks: Arc<Mutex<Vec<Chunk>>>,
    finished: Arc<Mutex<bool>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the collected chunks.
    pub fn chunks_handle(&self) -> Arc<Mutex<Vec<Chunk>>> {
        self.chunks.clone()
    }

    /// Shared flag set once `finish` has run.
    pub fn finished_handle(&self) -> Arc<Mutex<bool>> {
        self.finished.clone()
    }
}

impl ChunkSink for CollectorSink {
    fn accept(&mut self, chunk: Chunk) -> Result<()> {
        self.chunks
            .lock()
            .map_err(|e| PcmChunkError::SinkUnavailable {
                message: format!("collector lock poisoned: {}", e),
            })?
            .push(chunk);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Ok(mut finished) = self.finished.lock() {
            *finished = true;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Writes raw s16le bytes to any writer (file, stdout, socket).
pub struct WriterSink<W: Write + Send + 'static> {
    writer: W,
}

impl<W: Write + Send + 'static> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl WriterSink<BufWriter<File>> {
    /// Create (or truncate) a raw PCM file.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl WriterSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send + 'static> ChunkSink for WriterSink<W> {
    fn accept(&mut self, chunk: Chunk) -> Result<()> {
        self.writer.write_all(chunk.as_bytes())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}

/// Writes a 16 kHz mono 16-bit WAV file.
pub struct WavFileSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavFileSink {
    pub fn create(path: &Path) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: TARGET_SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec).map_err(|e| {
            PcmChunkError::SinkUnavailable {
                message: format!("Failed to create WAV file {}: {}", path.display(), e),
            }
        })?;
        Ok(Self {
            writer: Some(writer),
        })
    }
}

impl ChunkSink for WavFileSink {
    fn accept(&mut self, chunk: Chunk) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PcmChunkError::SinkUnavailable {
                message: "WAV file already finalized".to_string(),
            })?;
        for sample in pcm16_to_i16(chunk.as_bytes()) {
            writer
                .write_sample(sample)
                .map_err(|e| PcmChunkError::SinkUnavailable {
                    message: format!("Failed to write WAV sample: {}", e),
                })?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| PcmChunkError::SinkUnavailable {
                    message: format!("Failed to finalize WAV file: {}", e),
                })?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "wav"
    }
}

/// Emits one `FROM_OPTION` JSON line per chunk instead of the audio itself.
pub struct EventSink<W: Write + Send + 'static> {
    writer: W,
}

impl<W: Write + Send + 'static> EventSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send + 'static> ChunkSink for EventSink<W> {
    fn begin(&mut self, session: &SessionContext) -> Result<()> {
        tracing::debug!(%session, "event sink attached");
        Ok(())
    }

    fn accept(&mut self, chunk: Chunk) -> Result<()> {
        let message = ControlMessage::FromOption(ChunkReport {
            chunk_len: chunk.len(),
            sequence: chunk.sequence(),
        });
        let line = message.to_json().map_err(|e| PcmChunkError::Control {
            message: e.to_string(),
        })?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "events"
    }
}
