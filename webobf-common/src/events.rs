//! Real-time channel event types
//!
//! Every frame on the channel is a JSON text message of the form
//! `{"event": "<name>", "data": { ... }}`.
//!
//! Inbound (client → server): `start`.
//! Outbound (server → client): `progress`, `done`, `error`.

use serde::{Deserialize, Serialize};

/// Payload of an inbound `start` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    /// Stored upload filename, as returned by `POST /upload`
    pub file: String,
    /// Preset name; unknown or absent selects the default preset
    #[serde(default)]
    pub preset: Option<String>,
    /// Optional passphrase for access-gate wrapping
    #[serde(default)]
    pub password: Option<String>,
}

/// Events a client may send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum InboundEvent {
    /// Begin a transformation job on this connection
    Start(StartRequest),
}

/// Events the server sends to the connection that owns a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ChannelEvent {
    /// Job entered a new state
    Progress {
        /// Completion percentage (0-100), never lower than a previous value for the same job
        percent: u8,
        /// Human-readable stage description
        status: String,
        /// Download path, only on the final progress event
        #[serde(default, skip_serializing_if = "Option::is_none")]
        download: Option<String>,
    },

    /// Job completed; emitted exactly once
    Done {
        /// `/download/<artifact filename>`
        download: String,
        /// Artifact filename
        filename: String,
    },

    /// Job failed or the request was rejected
    Error {
        /// Reason, transmitted as-is
        message: String,
    },
}

impl ChannelEvent {
    /// Event name as it appears on the wire
    pub fn event_type(&self) -> &'static str {
        match self {
            ChannelEvent::Progress { .. } => "progress",
            ChannelEvent::Done { .. } => "done",
            ChannelEvent::Error { .. } => "error",
        }
    }

    /// Shorthand for an error event
    pub fn error(message: impl Into<String>) -> Self {
        ChannelEvent::Error {
            message: message.into(),
        }
    }

    /// Serialize to a JSON text frame
    pub fn to_frame(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl InboundEvent {
    /// Parse a JSON text frame
    pub fn from_frame(frame: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(frame)?)
    }
}
