//! Streaming audio pipeline: resample to 16 kHz, encode s16le, cut into chunks.
//!
//! The synchronous core (`resample`, `pcm`, `accumulator`, `processor`) is
//! usable on its own. The threaded pipeline runs it in stations connected by
//! bounded crossbeam channels.

pub mod accumulator;
pub mod encoder_station;
pub mod error;
pub mod orchestrator;
pub mod pcm;
pub mod processor;
pub mod resample;
pub mod sink;
pub mod station;
pub mod types;

pub use accumulator::{ChunkAccumulator, SharedAccumulator, StopPolicy};
pub use encoder_station::EncoderStation;
pub use error::{ErrorReporter, LogReporter, StationError};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use processor::{ChunkStream, FrameProcessor, ProcessorStats};
pub use sink::{ChunkSink, CollectorSink, EventSink, SinkSummary, WavFileSink, WriterSink};
pub use station::{Delivery, Station, StationRunner};
pub use types::{AudioFrame, Chunk};
