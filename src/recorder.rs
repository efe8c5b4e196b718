//! Control-message driven recorder.
//!
//! Owns at most one running pipeline. `START_RECORD` opens a session (stopping
//! any session already running), `STOP_RECORD` closes it.

use crate::audio::source::FrameSource;
use crate::control::{ControlMessage, StartRecord};
use crate::error::Result;
use crate::pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
use crate::pipeline::sink::{ChunkSink, SinkSummary};
use crate::session::SessionContext;

/// Builds the frame source for a `START_RECORD` request.
pub type SourceFactory = Box<dyn FnMut(&StartRecord) -> Result<Box<dyn FrameSource>> + Send>;
/// Builds the sink for a new session.
pub type SinkFactory = Box<dyn FnMut(&SessionContext) -> Result<Box<dyn ChunkSink>> + Send>;

/// What a dispatched message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A session started; `replaced` summarises the session it superseded.
    Started {
        session: u64,
        replaced: Option<SinkSummary>,
    },
    /// The active session stopped.
    Stopped {
        session: u64,
        summary: SinkSummary,
    },
    /// `STOP_RECORD` with nothing recording.
    NotRecording,
    /// Message not meant for the recorder.
    Ignored,
}

pub struct Recorder {
    config: PipelineConfig,
    source_factory: SourceFactory,
    sink_factory: SinkFactory,
    consumer: Option<String>,
    active: Option<PipelineHandle>,
    next_session: u64,
}

impl Recorder {
    pub fn new(
        config: PipelineConfig,
        source_factory: SourceFactory,
        sink_factory: SinkFactory,
    ) -> Self {
        Self {
            config,
            source_factory,
            sink_factory,
            consumer: None,
            active: None,
            next_session: 1,
        }
    }

    /// Name the consumer recorded on every session.
    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = Some(consumer.into());
        self
    }

    /// Handle one control message.
    pub fn dispatch(&mut self, message: ControlMessage) -> Result<DispatchOutcome> {
        match message {
            ControlMessage::StartRecord(request) => {
                let replaced = self.stop_active().map(|(_, summary)| summary);
                let session = self.start(&request)?;
                Ok(DispatchOutcome::Started { session, replaced })
            }
            ControlMessage::StopRecord => Ok(match self.stop_active() {
                Some((session, summary)) => DispatchOutcome::Stopped { session, summary },
                None => DispatchOutcome::NotRecording,
            }),
            ControlMessage::FromOption(_) | ControlMessage::Other(_) => {
                tracing::debug!(kind = message.kind(), "recorder ignoring message");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    /// Id of the running session, if any.
    pub fn active_session(&self) -> Option<u64> {
        self.active.as_ref().map(|handle| handle.session().id())
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Stop whatever is running; used when the control stream closes.
    pub fn shutdown(&mut self) -> Option<SinkSummary> {
        self.stop_active().map(|(_, summary)| summary)
    }

    fn start(&mut self, request: &StartRecord) -> Result<u64> {
        let id = self.next_session;
        self.next_session += 1;

        let mut session = SessionContext::new(id, request.source_id.as_str());
        if let Some(ref consumer) = self.consumer {
            session = session.with_consumer(consumer.as_str());
        }

        let source = (self.source_factory)(request)?;
        let sink = (self.sink_factory)(&session)?;
        let handle = Pipeline::new(self.config.clone()).start(source, sink, &session)?;
        self.active = Some(handle);
        Ok(id)
    }

    fn stop_active(&mut self) -> Option<(u64, SinkSummary)> {
        let handle = self.active.take()?;
        let session = handle.session().id();
        Some((session, handle.stop()))
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some((session, _)) = self.stop_active() {
            tracing::debug!(session, "recorder dropped while recording");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::{MockFrameSource, SourceFrame};
    use crate::error::PcmChunkError;
    use crate::pipeline::accumulator::StopPolicy;
    use crate::pipeline::sink::CollectorSink;
    use crate::pipeline::types::Chunk;
    use std::sync::{Arc, Mutex};

    type Sessions = Arc<Mutex<Vec<(SessionContext, Arc<Mutex<Vec<Chunk>>>)>>>;

    fn recorder(frames_per_session: usize) -> (Recorder, Sessions) {
        let sessions: Sessions = Arc::new(Mutex::new(Vec::new()));
        let seen = sessions.clone();
        let recorder = Recorder::new(
            PipelineConfig {
                stop_policy: StopPolicy::Flush,
                ..Default::default()
            },
            Box::new(move |_request: &StartRecord| -> Result<Box<dyn FrameSource>> {
                let frames = (0..frames_per_session)
                    .map(|_| SourceFrame::new(vec![0.25; 400], 16000.0))
                    .collect();
                Ok(Box::new(MockFrameSource::new(frames).live()))
            }),
            Box::new(move |session: &SessionContext| -> Result<Box<dyn ChunkSink>> {
                let sink = CollectorSink::new();
                seen.lock()
                    .unwrap()
                    .push((session.clone(), sink.chunks_handle()));
                Ok(Box::new(sink))
            }),
        )
        .with_consumer("test-consumer");
        (recorder, sessions)
    }

    fn start(source_id: &str) -> ControlMessage {
        ControlMessage::StartRecord(StartRecord {
            source_id: source_id.to_string(),
        })
    }

    #[test]
    fn start_then_stop_produces_summary() {
        let (mut recorder, sessions) = recorder(4);

        let outcome = recorder.dispatch(start("tab-1")).unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Started {
                session: 1,
                replaced: None
            }
        );
        assert!(recorder.is_recording());
        assert_eq!(recorder.active_session(), Some(1));

        // Let the live mock drain before stopping.
        std::thread::sleep(std::time::Duration::from_millis(200));

        match recorder.dispatch(ControlMessage::StopRecord).unwrap() {
            DispatchOutcome::Stopped { session, summary } => {
                assert_eq!(session, 1);
                // Four 800-byte frames: two 1600-byte chunks, nothing left to flush
                assert_eq!(summary.bytes, 3200);
            }
            other => panic!("expected Stopped, got {:?}", other),
        }
        assert!(!recorder.is_recording());

        let sessions = sessions.lock().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].0.source_id(), "tab-1");
        assert_eq!(sessions[0].0.consumer_id(), Some("test-consumer"));
    }

    #[test]
    fn second_start_replaces_active_session() {
        let (mut recorder, sessions) = recorder(0);

        recorder.dispatch(start("tab-1")).unwrap();
        match recorder.dispatch(start("tab-2")).unwrap() {
            DispatchOutcome::Started { session, replaced } => {
                assert_eq!(session, 2);
                assert_eq!(replaced, Some(SinkSummary::default()));
            }
            other => panic!("expected Started, got {:?}", other),
        }
        assert_eq!(recorder.active_session(), Some(2));
        assert_eq!(sessions.lock().unwrap().len(), 2);
        assert!(recorder.shutdown().is_some());
    }

    #[test]
    fn stop_without_session_is_not_recording() {
        let (mut recorder, _) = recorder(0);
        assert_eq!(
            recorder.dispatch(ControlMessage::StopRecord).unwrap(),
            DispatchOutcome::NotRecording
        );
        assert_eq!(recorder.shutdown(), None);
    }

    #[test]
    fn other_messages_are_ignored() {
        let (mut recorder, _) = recorder(0);
        assert_eq!(
            recorder
                .dispatch(ControlMessage::Other("PING".to_string()))
                .unwrap(),
            DispatchOutcome::Ignored
        );
        assert!(!recorder.is_recording());
    }

    #[test]
    fn source_factory_error_propagates() {
        let mut recorder = Recorder::new(
            PipelineConfig::default(),
            Box::new(|_: &StartRecord| -> Result<Box<dyn FrameSource>> {
                Err(PcmChunkError::AudioDeviceNotFound {
                    device: "nope".to_string(),
                })
            }),
            Box::new(|_: &SessionContext| -> Result<Box<dyn ChunkSink>> {
                Ok(Box::new(CollectorSink::new()))
            }),
        );

        assert!(recorder.dispatch(start("tab-1")).is_err());
        assert!(!recorder.is_recording());
    }
}
