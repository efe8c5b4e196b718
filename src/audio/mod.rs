//! Frame sources: live capture, WAV files and test mocks.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod source;
pub mod wav;

pub use source::{FrameSource, MockFrameSource, SourceFrame};
pub use wav::WavFrameSource;
