//! Channel wire messages — one JSON object per line
//!
//! The wire unit is a `type` discriminator plus an opaque payload. The
//! heartbeat types are reserved for the channel itself and never reach
//! application-level handlers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved keep-alive request type. Answered internally with a pong.
pub const HEARTBEAT_PING: &str = "heartbeat-ping";

/// Reserved keep-alive response type.
pub const HEARTBEAT_PONG: &str = "heartbeat-pong";

/// Errors encoding or decoding a wire frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The unit of exchange over the transport channel.
///
/// The payload round-trips losslessly: it is carried as an untyped JSON
/// value and only interpreted by the application layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ChannelMessage {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    pub fn heartbeat_ping() -> Self {
        Self::new(HEARTBEAT_PING, serde_json::Value::Null)
    }

    pub fn heartbeat_pong() -> Self {
        Self::new(HEARTBEAT_PONG, serde_json::Value::Null)
    }

    pub fn is_heartbeat_ping(&self) -> bool {
        self.kind == HEARTBEAT_PING
    }

    pub fn is_heartbeat_pong(&self) -> bool {
        self.kind == HEARTBEAT_PONG
    }

    /// Encode as a single-line frame (no trailing newline).
    pub fn to_frame(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a received line. Malformed frames are dropped by the
    /// channel (logged, never surfaced), so this error stays internal.
    pub fn from_frame(line: &str) -> Result<Self, FrameError> {
        Ok(serde_json::from_str(line.trim())?)
    }
}
