//! Core of the fleet relay.
//!
//! This crate provides the fundamental building blocks:
//! - `UpstreamConnector` - single upstream connection with fixed-delay reconnect
//! - `BroadcastHub` - fan-out to attached sessions, session registry
//! - `UpstreamEvent` - opaque events decoded from the feed
//! - `UpstreamTransport` / `UpstreamLink` - socket seam for the connector
//! - `RelayConfig` - environment configuration

pub mod config;
pub mod connector;
pub mod event;
pub mod hub;
pub mod state;
pub mod traits;

pub use config::{ConfigError, RelayConfig};
pub use connector::{ConnectorConfig, ConnectorHandle, UpstreamConnector};
pub use event::{EventError, UpstreamEvent};
pub use hub::{Attachment, BroadcastHub, RelayMessage, SessionId};
pub use state::{ConnectionMonitor, ConnectionState, UpstreamStatus};
pub use traits::{LinkEvent, TransportError, UpstreamLink, UpstreamTransport};
