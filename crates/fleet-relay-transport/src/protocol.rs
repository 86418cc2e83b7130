//! Wire protocol for the browser-facing channel.
//!
//! Frames are JSON envelopes `{"event": <name>, "data": <payload>}`.

use fleet_relay_core::{RelayMessage, UpstreamEvent, UpstreamStatus};
use serde::{Deserialize, Serialize};

/// Event name carrying upstream connection status.
pub const STATUS_EVENT: &str = "traccar-status";
/// Event name carrying forwarded upstream events.
pub const FEED_EVENT: &str = "traccar-event";

/// Message from client to relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Liveness check, answered with `pong`.
    Ping,
}

/// Message from relay to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Upstream connection status.
    #[serde(rename = "traccar-status")]
    Status(UpstreamStatus),
    /// Raw upstream event.
    #[serde(rename = "traccar-event")]
    Event(UpstreamEvent),
    /// Reply to `ping`.
    #[serde(rename = "pong")]
    Pong,
    /// Client sent something the relay does not understand.
    #[serde(rename = "error")]
    Error { message: String },
}

impl From<RelayMessage> for ServerMessage {
    fn from(msg: RelayMessage) -> Self {
        match msg {
            RelayMessage::Status(status) => Self::Status(status),
            RelayMessage::Event(event) => Self::Event(event),
        }
    }
}
