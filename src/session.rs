//! Recording session state.
//!
//! A session runs from `START_RECORD` to stop. Which source is being captured
//! and who consumes the chunks is carried here and handed explicitly to the
//! pipeline and sinks.

use std::time::{Duration, Instant, SystemTime};

/// Identity and lifetime of one recording session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    id: u64,
    source_id: String,
    consumer_id: Option<String>,
    source_rate: Option<f64>,
    started_at: Instant,
    started_wall: SystemTime,
}

impl SessionContext {
    /// Creates a session capturing `source_id`.
    pub fn new(id: u64, source_id: impl Into<String>) -> Self {
        Self {
            id,
            source_id: source_id.into(),
            consumer_id: None,
            source_rate: None,
            started_at: Instant::now(),
            started_wall: SystemTime::now(),
        }
    }

    /// Names the consumer receiving this session's chunks.
    pub fn with_consumer(mut self, consumer_id: impl Into<String>) -> Self {
        self.consumer_id = Some(consumer_id.into());
        self
    }

    /// Records the native sample rate of the captured source.
    pub fn with_source_rate(mut self, rate: f64) -> Self {
        self.source_rate = Some(rate);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Identifier of the captured source (tab, device or file).
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn consumer_id(&self) -> Option<&str> {
        self.consumer_id.as_deref()
    }

    /// Native rate of the source in Hz, once known.
    pub fn source_rate(&self) -> Option<f64> {
        self.source_rate
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Wall-clock start time, for logs and file metadata.
    pub fn started_wall(&self) -> SystemTime {
        self.started_wall
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl std::fmt::Display for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session {} ({})", self.id, self.source_id)?;
        if let Some(ref consumer) = self.consumer_id {
            write!(f, " -> {}", consumer)?;
        }
        Ok(())
    }
}
