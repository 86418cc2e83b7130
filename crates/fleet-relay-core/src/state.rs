//! Upstream connection state and the status payload sent to clients.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle state of the upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection open; a reconnect is pending or the connector is stopped.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The upstream feed is open and delivering events.
    Connected,
    /// The last attempt or open connection failed.
    Error,
}

impl ConnectionState {
    /// Whether the upstream feed is currently open.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Status notification delivered to every session when upstream changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpstreamStatus {
    /// Whether the upstream feed is open.
    pub connected: bool,
    /// Error text, present only when the change was caused by a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpstreamStatus {
    /// Status for an open upstream connection.
    #[must_use]
    pub const fn connected() -> Self {
        Self {
            connected: true,
            error: None,
        }
    }

    /// Status for a cleanly closed upstream connection.
    #[must_use]
    pub const fn disconnected() -> Self {
        Self {
            connected: false,
            error: None,
        }
    }

    /// Status for a failed upstream connection.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            error: Some(error.into()),
        }
    }
}

/// Read-only view of the connector's state.
///
/// Cheap to clone; handed to the health endpoints.
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    rx: watch::Receiver<ConnectionState>,
}

impl ConnectionMonitor {
    pub(crate) const fn new(rx: watch::Receiver<ConnectionState>) -> Self {
        Self { rx }
    }

    /// Last state published by the connector.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.rx.borrow()
    }

    /// Whether the upstream feed is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Wait until the connector publishes a state matching `pred`.
    ///
    /// Returns `None` if the connector was dropped first.
    pub async fn wait_for(
        &mut self,
        pred: impl FnMut(&ConnectionState) -> bool,
    ) -> Option<ConnectionState> {
        self.rx.wait_for(pred).await.ok().map(|s| *s)
    }
}

/// A monitor pinned to a fixed state, for wiring handlers without a connector.
impl From<ConnectionState> for ConnectionMonitor {
    fn from(state: ConnectionState) -> Self {
        let (tx, rx) = watch::channel(state);
        // Keep the value readable after the sender is gone.
        drop(tx);
        Self::new(rx)
    }
}
