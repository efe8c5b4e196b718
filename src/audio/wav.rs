//! WAV file frame source for file and pipe mode.

use crate::audio::source::{FrameSource, SourceFrame};
use crate::error::{PcmChunkError, Result};
use crate::pipeline::types::AudioFrame;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

/// Frame source that reads from WAV data.
/// Supports integer and float WAV at any rate and channel count, downmixed to mono.
pub struct WavFrameSource {
    samples: Vec<f32>,
    sample_rate: f64,
    position: usize,
    frame_len: usize,
    label: String,
}

impl WavFrameSource {
    /// Create from any reader (for testing/flexibility).
    pub fn from_reader(reader: Box<dyn Read + Send>, frame_len: usize) -> Result<Self> {
        if frame_len == 0 {
            return Err(PcmChunkError::ConfigInvalidValue {
                key: "frame_len".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        let wav_reader = hound::WavReader::new(reader).map_err(|e| PcmChunkError::AudioCapture {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        let interleaved = read_normalized(wav_reader)?;
        let samples = downmix(&interleaved, spec.channels as usize);

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate as f64,
            position: 0,
            frame_len,
            label: "wav".to_string(),
        })
    }

    /// Open a WAV file.
    pub fn from_path(path: &Path, frame_len: usize) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut source = Self::from_reader(Box::new(std::io::BufReader::new(file)), frame_len)?;
        source.label = path.display().to_string();
        Ok(source)
    }

    /// Create from stdin.
    pub fn from_stdin(frame_len: usize) -> Result<Self> {
        use std::io::Cursor;

        // Read all data from stdin into memory first (StdinLock is not Send)
        let mut buffer = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut buffer)
            .map_err(|e| PcmChunkError::AudioCapture {
                message: format!("Failed to read from stdin: {}", e),
            })?;

        let mut source = Self::from_reader(Box::new(Cursor::new(buffer)), frame_len)?;
        source.label = "stdin".to_string();
        Ok(source)
    }

    /// Native sample rate of the file.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Total mono samples in the file.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Consume the source as a sequence of numbered pipeline frames.
    pub fn into_audio_frames(mut self) -> impl Iterator<Item = AudioFrame> {
        let mut sequence = 0u64;
        std::iter::from_fn(move || {
            let frame = self.next_frame()?;
            let audio = AudioFrame::new(frame.samples, frame.sample_rate, Instant::now(), sequence);
            sequence += 1;
            Some(audio)
        })
    }

    fn next_frame(&mut self) -> Option<SourceFrame> {
        if self.position >= self.samples.len() {
            return None;
        }
        let end = std::cmp::min(self.position + self.frame_len, self.samples.len());
        let frame = SourceFrame::new(self.samples[self.position..end].to_vec(), self.sample_rate);
        self.position = end;
        Some(frame)
    }
}

impl FrameSource for WavFrameSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<SourceFrame>> {
        Ok(self.next_frame())
    }

    fn is_finite(&self) -> bool {
        true
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn native_rate(&self) -> Option<f64> {
        Some(self.sample_rate)
    }
}

/// Read every sample as a float in [-1.0, 1.0].
fn read_normalized<R: Read>(mut reader: hound::WavReader<R>) -> Result<Vec<f32>> {
    let spec = reader.spec();
    let read_err = |e: hound::Error| PcmChunkError::AudioCapture {
        message: format!("Failed to read WAV samples: {}", e),
    };

    match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(read_err),
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(PcmChunkError::AudioCapture {
                    message: format!("Unsupported bit depth: {}", spec.bits_per_sample),
                });
            }
            let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(read_err)
        }
    }
}

/// Average interleaved channels into mono.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
