//! Typed control messages exchanged between the recorder and its consumers.
//!
//! On the wire every message is a JSON object `{"type": TAG, "data": PAYLOAD}`.
//! Unknown tags are preserved as [`ControlMessage::Other`] so each dispatcher
//! can match exhaustively and decide explicitly what to ignore.

use serde::{Deserialize, Serialize};

pub const START_RECORD: &str = "START_RECORD";
pub const STOP_RECORD: &str = "STOP_RECORD";
pub const FROM_OPTION: &str = "FROM_OPTION";

/// Payload of `START_RECORD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRecord {
    /// Identifier of the source to capture (tab id, device name, file path).
    pub source_id: String,
}

/// Payload of `FROM_OPTION`: notification that a chunk was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReport {
    pub chunk_len: usize,
    #[serde(default)]
    pub sequence: u64,
}

/// A control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    StartRecord(StartRecord),
    StopRecord,
    FromOption(ChunkReport),
    /// Any other tag; carries the tag for logging.
    Other(String),
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    data: serde_json::Value,
}

impl ControlMessage {
    /// Tag used on the wire.
    pub fn kind(&self) -> &str {
        match self {
            ControlMessage::StartRecord(_) => START_RECORD,
            ControlMessage::StopRecord => STOP_RECORD,
            ControlMessage::FromOption(_) => FROM_OPTION,
            ControlMessage::Other(kind) => kind,
        }
    }

    /// Serialize message to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let data = match self {
            ControlMessage::StartRecord(payload) => serde_json::to_value(payload)?,
            ControlMessage::FromOption(payload) => serde_json::to_value(payload)?,
            ControlMessage::StopRecord | ControlMessage::Other(_) => serde_json::Value::Null,
        };
        serde_json::to_string(&Envelope {
            kind: self.kind().to_string(),
            data,
        })
    }

    /// Deserialize message from a JSON string.
    ///
    /// Fails on malformed JSON or on a known tag with a malformed payload.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_str(s)?;
        Ok(match envelope.kind.as_str() {
            START_RECORD => ControlMessage::StartRecord(serde_json::from_value(envelope.data)?),
            STOP_RECORD => ControlMessage::StopRecord,
            FROM_OPTION => ControlMessage::FromOption(serde_json::from_value(envelope.data)?),
            _ => ControlMessage::Other(envelope.kind),
        })
    }
}

/// Consumer-side dispatcher: handles chunk notifications, ignores the rest.
pub fn report_event(message: &ControlMessage) -> Option<ChunkReport> {
    match message {
        ControlMessage::FromOption(report) => {
            tracing::info!(
                sequence = report.sequence,
                chunk_len = report.chunk_len,
                "chunk received"
            );
            Some(*report)
        }
        other => {
            tracing::debug!(kind = other.kind(), "ignoring message");
            None
        }
    }
}
