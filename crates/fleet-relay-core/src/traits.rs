//! Transport seam between the connector and the upstream socket.

use async_trait::async_trait;
use thiserror::Error;

/// Transport error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
    #[error("Connect failed: {0}")]
    Connect(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle events produced by an open upstream link.
///
/// This is the closed set the connector state machine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A text payload arrived.
    Message(String),
    /// The peer closed the connection.
    Closed,
    /// The connection failed.
    Error(String),
}

/// Opens connections to the upstream feed.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Open a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn UpstreamLink>, TransportError>;
}

/// One open upstream connection.
#[async_trait]
pub trait UpstreamLink: Send {
    /// Wait for the next lifecycle event.
    ///
    /// After `Closed` or `Error` the link is finished and must not be polled
    /// again.
    async fn next_event(&mut self) -> LinkEvent;

    /// Close the connection. Best effort.
    async fn close(&mut self);
}
