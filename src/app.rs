//! Command implementations behind the CLI.
//!
//! Each `run_*` function takes an already-loaded [`Config`] and returns
//! once its command is done. Status lines go to stderr; stdout carries
//! chunk output when `--output -` is used.

use crate::audio::source::FrameSource;
use crate::audio::wav::WavFrameSource;
use crate::cli::{ChunkArgs, OutputArgs, OutputFormat};
use crate::config::Config;
use crate::control::{ControlMessage, StartRecord, report_event};
use crate::error::{PcmChunkError, Result};
use crate::pipeline::accumulator::StopPolicy;
use crate::pipeline::processor::ChunkStream;
use crate::pipeline::sink::{ChunkSink, EventSink, SinkSummary, WavFileSink, WriterSink};
use crate::recorder::{DispatchOutcome, Recorder};
use crate::session::SessionContext;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Apply `--threshold` and `--flush` on top of the loaded config.
pub fn apply_chunk_args(mut config: Config, chunk: &ChunkArgs) -> Config {
    if let Some(threshold) = chunk.threshold {
        config.pipeline.chunk_threshold_bytes = threshold;
    }
    if chunk.flush {
        config.pipeline.stop_policy = StopPolicy::Flush;
    }
    config
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Build the sink for `--output`/`--format`.
pub fn build_sink(output: &OutputArgs) -> Result<Box<dyn ChunkSink>> {
    build_sink_at(output.format, &output.output)
}

fn build_sink_at(format: OutputFormat, path: &Path) -> Result<Box<dyn ChunkSink>> {
    let stdout = is_stdio(path);
    Ok(match format {
        OutputFormat::Raw if stdout => Box::new(WriterSink::stdout()),
        OutputFormat::Raw => Box::new(WriterSink::create(path)?),
        OutputFormat::Wav if stdout => {
            return Err(PcmChunkError::Other(
                "WAV output needs a file path (use --output FILE)".to_string(),
            ));
        }
        OutputFormat::Wav => Box::new(WavFileSink::create(path)?),
        OutputFormat::Events if stdout => Box::new(EventSink::new(std::io::stdout())),
        OutputFormat::Events => Box::new(EventSink::new(std::io::BufWriter::new(
            std::fs::File::create(path)?,
        ))),
    })
}

/// `out.raw` → `out-3.raw` for session 3.
fn session_output_path(path: &Path, session: u64) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, session, ext.to_string_lossy()),
        None => format!("{}-{}", stem, session),
    };
    path.with_file_name(name)
}

fn print_summary(summary: &SinkSummary) {
    eprintln!(
        "{} chunk(s), {} bytes ({} ms of 16 kHz audio){}",
        summary.chunks,
        summary.bytes,
        summary.duration_ms(),
        if summary.failed > 0 {
            format!(", {} dropped by sink", summary.failed)
        } else {
            String::new()
        }
    );
}

/// Run the convert command: WAV file → chunks, synchronously.
pub fn run_convert(
    config: &Config,
    input: &Path,
    frame_len: Option<usize>,
    output: &OutputArgs,
    quiet: bool,
) -> Result<SinkSummary> {
    config.validate()?;
    let frame_len = frame_len.unwrap_or(config.source.frame_len);
    let source = if is_stdio(input) {
        WavFrameSource::from_stdin(frame_len)?
    } else {
        WavFrameSource::from_path(input, frame_len)?
    };

    if !quiet {
        eprintln!(
            "Converting {} ({} samples at {} Hz)...",
            source.label(),
            source.len(),
            source.sample_rate()
        );
    }

    let session = SessionContext::new(1, source.label());
    let mut sink = build_sink(output)?;
    sink.begin(&session)?;

    let mut stream = ChunkStream::new(
        source.into_audio_frames(),
        config.pipeline.chunk_threshold_bytes,
        config.pipeline.stop_policy,
    )?;

    let mut summary = SinkSummary::default();
    for chunk in stream.by_ref() {
        let sequence = chunk.sequence();
        let len = chunk.len() as u64;
        match sink.accept(chunk) {
            Ok(()) => {
                summary.chunks += 1;
                summary.bytes += len;
            }
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(sequence, "chunk dropped: {}", e);
            }
        }
    }
    sink.finish()?;

    let stats = stream.stats();
    tracing::debug!(?stats, "conversion finished");
    if !quiet {
        if stats.rejected_frames > 0 {
            eprintln!("Skipped {} invalid frame(s)", stats.rejected_frames);
        }
        print_summary(&summary);
    }
    Ok(summary)
}

/// Run the record command: live capture until Enter or `duration`.
#[cfg(feature = "cpal-audio")]
pub fn run_record(
    config: &Config,
    device: Option<String>,
    duration: Option<std::time::Duration>,
    output: &OutputArgs,
    quiet: bool,
) -> Result<SinkSummary> {
    use crate::audio::capture::CpalFrameSource;
    use crate::pipeline::orchestrator::Pipeline;

    config.validate()?;
    let device = device.or_else(|| config.source.device.clone());
    let source = CpalFrameSource::new(device.as_deref())?;
    let session = SessionContext::new(1, source.label());
    let sink = build_sink(output)?;

    let handle =
        Pipeline::new(config.to_pipeline_config()).start(Box::new(source), sink, &session)?;

    match duration {
        Some(duration) => {
            if !quiet {
                eprintln!("Recording for {}...", humantime::format_duration(duration));
            }
            std::thread::sleep(duration);
        }
        None => {
            if !quiet {
                eprintln!("Recording from {}. Press Enter to stop.", session.source_id());
            }
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
        }
    }

    let dropped = handle.dropped_frames();
    let summary = handle.stop();
    if !quiet {
        if dropped > 0 {
            eprintln!("Dropped {} frame(s) while the encoder was behind", dropped);
        }
        print_summary(&summary);
    }
    Ok(summary)
}

#[cfg(feature = "cpal-audio")]
fn live_source(config: &Config) -> Result<Box<dyn FrameSource>> {
    let source = crate::audio::capture::CpalFrameSource::new(config.source.device.as_deref())?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "cpal-audio"))]
fn live_source(_config: &Config) -> Result<Box<dyn FrameSource>> {
    Err(PcmChunkError::AudioCapture {
        message: "built without live capture; pass --input FILE to replay a WAV file".to_string(),
    })
}

/// Run the serve command: one session per `START_RECORD`/`STOP_RECORD` pair.
///
/// Control messages are read line by line from `control`. Malformed lines are
/// logged and skipped. Any running session is stopped at end of input.
pub fn run_serve<R: BufRead>(
    config: &Config,
    input: Option<PathBuf>,
    output: &OutputArgs,
    control: R,
    quiet: bool,
) -> Result<()> {
    config.validate()?;

    let source_config = config.clone();
    let frame_len = config.source.frame_len;
    let source_factory = Box::new(
        move |request: &StartRecord| -> Result<Box<dyn FrameSource>> {
            tracing::debug!(source_id = %request.source_id, "opening source");
            match input {
                Some(ref path) => Ok(Box::new(WavFrameSource::from_path(path, frame_len)?)),
                None => live_source(&source_config),
            }
        },
    );

    let format = output.format;
    let base_path = output.output.clone();
    let sink_factory = Box::new(move |session: &SessionContext| -> Result<Box<dyn ChunkSink>> {
        let path = if is_stdio(&base_path) {
            base_path.clone()
        } else {
            session_output_path(&base_path, session.id())
        };
        build_sink_at(format, &path)
    });

    let mut recorder = Recorder::new(config.to_pipeline_config(), source_factory, sink_factory)
        .with_consumer(output.output.display().to_string());

    for line in control.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match ControlMessage::from_json(line) {
            Ok(message) => message,
            Err(e) => {
                let e = PcmChunkError::Control {
                    message: e.to_string(),
                };
                tracing::warn!("skipping line: {}", e);
                continue;
            }
        };

        match recorder.dispatch(message) {
            Ok(DispatchOutcome::Started { session, replaced }) => {
                if !quiet {
                    if let Some(summary) = replaced {
                        eprint!("Previous session replaced: ");
                        print_summary(&summary);
                    }
                    eprintln!("Session {} started", session);
                }
            }
            Ok(DispatchOutcome::Stopped { session, summary }) => {
                if !quiet {
                    eprint!("Session {} stopped: ", session);
                    print_summary(&summary);
                }
            }
            Ok(DispatchOutcome::NotRecording) => {
                tracing::info!("STOP_RECORD with no active session");
            }
            Ok(DispatchOutcome::Ignored) => {}
            Err(e) => {
                tracing::error!("could not start session: {}", e);
                if !quiet {
                    eprintln!("Error: {}", e);
                }
            }
        }
    }

    if let Some(summary) = recorder.shutdown()
        && !quiet
    {
        eprint!("Input closed, session stopped: ");
        print_summary(&summary);
    }
    Ok(())
}

/// Totals gathered by the watch command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub chunks: u64,
    pub bytes: u64,
    /// Well-formed messages that were not chunk notifications.
    pub ignored: u64,
    pub malformed: u64,
}

/// Run the watch command: tally `FROM_OPTION` notifications from `events`.
pub fn run_watch<R: BufRead>(events: R) -> Result<WatchSummary> {
    let mut summary = WatchSummary::default();
    for line in events.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match ControlMessage::from_json(line) {
            Ok(message) => match report_event(&message) {
                Some(report) => {
                    summary.chunks += 1;
                    summary.bytes += report.chunk_len as u64;
                }
                None => summary.ignored += 1,
            },
            Err(e) => {
                summary.malformed += 1;
                tracing::warn!("skipping line: {}", e);
            }
        }
    }
    Ok(summary)
}
