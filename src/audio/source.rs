use crate::error::{PcmChunkError, Result};
use std::collections::VecDeque;

/// One capture callback's worth of mono float audio.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFrame {
    pub samples: Vec<f32>,
    /// Rate the samples were captured at, in Hz.
    pub sample_rate: f64,
}

impl SourceFrame {
    pub fn new(samples: Vec<f32>, sample_rate: f64) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }
}

/// Trait for frame sources (capture devices, files, mocks).
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait FrameSource: Send {
    /// Start capturing.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing.
    fn stop(&mut self) -> Result<()>;

    /// Take the next captured frame.
    ///
    /// # Returns
    /// `Ok(None)` when nothing is available yet (live sources) or the source
    /// is exhausted (finite sources).
    fn read_frame(&mut self) -> Result<Option<SourceFrame>>;

    /// Whether `Ok(None)` from [`read_frame`](Self::read_frame) means end of stream.
    fn is_finite(&self) -> bool {
        false
    }

    /// Human-readable source identifier.
    fn label(&self) -> String {
        "source".to_string()
    }

    /// Native sample rate in Hz, when known before the first frame.
    fn native_rate(&self) -> Option<f64> {
        None
    }
}

/// Mock frame source for testing
#[derive(Debug, Clone, Default)]
pub struct MockFrameSource {
    is_started: bool,
    frames: VecDeque<SourceFrame>,
    finite: bool,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockFrameSource {
    /// Create a finite mock source that yields `frames` and then ends.
    pub fn new(frames: Vec<SourceFrame>) -> Self {
        Self {
            frames: frames.into(),
            finite: true,
            error_message: "mock audio error".to_string(),
            ..Default::default()
        }
    }

    /// Behave like a live device: running out of frames is not end of stream.
    pub fn live(mut self) -> Self {
        self.finite = false;
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }

    /// Frames not yet read.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for MockFrameSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(PcmChunkError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        self.is_started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<SourceFrame>> {
        if self.should_fail_read {
            return Err(PcmChunkError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        Ok(self.frames.pop_front())
    }

    fn is_finite(&self) -> bool {
        self.finite
    }

    fn label(&self) -> String {
        "mock".to_string()
    }

    fn native_rate(&self) -> Option<f64> {
        self.frames.front().map(|frame| frame.sample_rate)
    }
}
