//! Live audio capture using CPAL (Cross-Platform Audio Library).

use crate::audio::source::{FrameSource, SourceFrame};
use crate::error::{PcmChunkError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Captured frames kept while the consumer is not reading.
///
/// Roughly 10s of audio at typical callback sizes; older frames are dropped first.
const MAX_QUEUED_FRAMES: usize = 1024;

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Preferred device names for PipeWire/PulseAudio desktops.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Check if a device is a preferred device.
fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List all available audio input devices.
///
/// Preferred devices are marked with "\[recommended\]".
pub fn list_devices() -> Result<Vec<String>> {
    let devices = with_suppressed_stderr(|| cpal::default_host().input_devices());
    let devices = devices.map_err(|e| PcmChunkError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Get the best default input device, preferring PipeWire/PulseAudio.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| PcmChunkError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

fn find_device(name: &str) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let devices =
            cpal::default_host()
                .input_devices()
                .map_err(|e| PcmChunkError::AudioCapture {
                    message: format!("Failed to enumerate devices: {}", e),
                })?;

        for dev in devices {
            if let Ok(dev_name) = dev.name()
                && dev_name == name
            {
                return Ok(dev);
            }
        }

        Err(PcmChunkError::AudioDeviceNotFound {
            device: name.to_string(),
        })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: The stream is only touched through the Mutex in CpalFrameSource,
/// one thread at a time.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

type FrameQueue = Arc<Mutex<VecDeque<SourceFrame>>>;

/// Live capture at the device's native format.
///
/// The audio callback only downmixes to mono and queues the frame; resampling
/// and encoding happen on the pipeline side.
pub struct CpalFrameSource {
    device: cpal::Device,
    device_name: String,
    stream: Arc<Mutex<Option<SendableStream>>>,
    queue: FrameQueue,
    /// Rate of the open stream; set by `start`.
    native_rate: Option<f64>,
}

impl CpalFrameSource {
    /// Open a capture device by name, or the best default when `None`.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = match device_name {
            Some(name) => find_device(name)?,
            None => get_best_default_device()?,
        };
        let device_name = device
            .name()
            .unwrap_or_else(|_| device_name.unwrap_or("default").to_string());

        Ok(Self {
            device,
            device_name,
            stream: Arc::new(Mutex::new(None)),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            native_rate: None,
        })
    }

    /// Open the input stream; returns it with its sample rate.
    fn build_stream(&self) -> Result<(cpal::Stream, f64)> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| PcmChunkError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let rate = default_config.sample_rate().0 as f64;
        let channels = default_config.channels() as usize;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        tracing::info!(
            device = %self.device_name,
            channels,
            rate,
            format = ?default_config.sample_format(),
            "opening capture stream"
        );

        let err_callback = |err| {
            tracing::error!("audio stream error: {}", err);
        };

        let queue = Arc::clone(&self.queue);
        let stream = match default_config.sample_format() {
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        enqueue(&queue, downmix(data, channels), rate);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| PcmChunkError::AudioCapture {
                    message: format!("Failed to build f32 stream: {}", e),
                }),
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                        enqueue(&queue, downmix(&floats, channels), rate);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| PcmChunkError::AudioCapture {
                    message: format!("Failed to build i16 stream: {}", e),
                }),
            fmt => Err(PcmChunkError::AudioCapture {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try specifying a device with --device.",
                    fmt
                ),
            }),
        }?;
        Ok((stream, rate))
    }
}

fn enqueue(queue: &FrameQueue, samples: Vec<f32>, rate: f64) {
    if let Ok(mut queue) = queue.lock() {
        if queue.len() >= MAX_QUEUED_FRAMES {
            queue.pop_front();
        }
        queue.push_back(SourceFrame::new(samples, rate));
    }
}

/// Average interleaved channels into mono.
fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

impl FrameSource for CpalFrameSource {
    fn start(&mut self) -> Result<()> {
        let mut stream_guard = self.stream.lock().map_err(|e| PcmChunkError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;
        if stream_guard.is_some() {
            return Ok(()); // Already started
        }

        let (stream, rate) = self.build_stream()?;
        stream.play().map_err(|e| PcmChunkError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;
        *stream_guard = Some(SendableStream(stream));
        drop(stream_guard);
        self.native_rate = Some(rate);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut stream_guard = self.stream.lock().map_err(|e| PcmChunkError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;

        if let Some(sendable_stream) = stream_guard.take() {
            sendable_stream
                .0
                .pause()
                .map_err(|e| PcmChunkError::AudioCapture {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<SourceFrame>> {
        let mut queue = self.queue.lock().map_err(|e| PcmChunkError::AudioCapture {
            message: format!("Failed to lock frame queue: {}", e),
        })?;
        Ok(queue.pop_front())
    }

    fn label(&self) -> String {
        self.device_name.clone()
    }

    fn native_rate(&self) -> Option<f64> {
        self.native_rate
    }
}
