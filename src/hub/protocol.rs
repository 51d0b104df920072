//! Hub wire protocol — typed payloads behind the channel's opaque frames
//!
//! Inbound operations come from field devices and observers; outbound
//! broadcasts fan out to a service's subscribers. Payloads are plain
//! serde structs carried inside [`ChannelMessage::payload`].

use crate::channel::ChannelMessage;
use crate::types::{DerivedStatus, PositionSample, ServiceStage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Inbound message kinds.
pub const SUBSCRIBE_SERVICE: &str = "subscribe_service";
pub const REGISTER_DRIVER: &str = "register_driver";
pub const UPDATE_LOCATION: &str = "update_location";

// Outbound broadcast kinds.
pub const POSITION_UPDATE: &str = "position_update";
pub const STATUS_UPDATE: &str = "status_update";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// An observer asking to follow one service's live updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscribeService {
    pub service_id: String,
}

/// A driver device announcing itself on connect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterDriver {
    pub driver_id: String,
}

/// A driver position report for an active service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateLocation {
    pub service_id: String,
    pub driver_id: String,
    #[serde(flatten)]
    pub position: PositionSample,
}

/// Raw position broadcast to a service's subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionUpdate {
    pub service_id: String,
    #[serde(flatten)]
    pub position: PositionSample,
}

/// Derived status broadcast, sent right after its position update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    pub service_id: String,
    pub stage: ServiceStage,
    #[serde(flatten)]
    pub status: DerivedStatus,
}

/// An inbound operation, decoded from a channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Subscribe(SubscribeService),
    RegisterDriver(RegisterDriver),
    UpdateLocation(UpdateLocation),
}

impl Inbound {
    /// Decode a channel message into a typed operation. Heartbeats never
    /// reach this point; the session loop consumes them first.
    pub fn decode(msg: &ChannelMessage) -> Result<Self, ProtocolError> {
        let payload = |kind: &str| {
            let kind = kind.to_string();
            move |e: serde_json::Error| ProtocolError::InvalidPayload { kind, source: e }
        };
        match msg.kind.as_str() {
            SUBSCRIBE_SERVICE => Ok(Self::Subscribe(
                serde_json::from_value(msg.payload.clone()).map_err(payload(SUBSCRIBE_SERVICE))?,
            )),
            REGISTER_DRIVER => Ok(Self::RegisterDriver(
                serde_json::from_value(msg.payload.clone()).map_err(payload(REGISTER_DRIVER))?,
            )),
            UPDATE_LOCATION => Ok(Self::UpdateLocation(
                serde_json::from_value(msg.payload.clone()).map_err(payload(UPDATE_LOCATION))?,
            )),
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }
}

// The payload types here serialize infallibly; a failure would be a
// type-level bug and collapses to Null rather than poisoning the stream.
fn encode<T: Serialize>(kind: &str, payload: &T) -> ChannelMessage {
    let value = serde_json::to_value(payload).unwrap_or(serde_json::Value::Null);
    ChannelMessage::new(kind, value)
}

impl SubscribeService {
    pub fn into_message(self) -> ChannelMessage {
        encode(SUBSCRIBE_SERVICE, &self)
    }
}

impl RegisterDriver {
    pub fn into_message(self) -> ChannelMessage {
        encode(REGISTER_DRIVER, &self)
    }
}

impl UpdateLocation {
    pub fn into_message(self) -> ChannelMessage {
        encode(UPDATE_LOCATION, &self)
    }
}

impl PositionUpdate {
    pub fn into_message(self) -> ChannelMessage {
        encode(POSITION_UPDATE, &self)
    }
}

impl StatusUpdate {
    pub fn into_message(self) -> ChannelMessage {
        encode(STATUS_UPDATE, &self)
    }
}
