//! Upstream transport for the fleet relay.
//!
//! Provides the `tokio-tungstenite` implementation of the connector's
//! `UpstreamTransport` seam. Enable the `tls` feature for `wss://` feeds.

pub mod websocket;

pub use websocket::{DEFAULT_CONNECT_TIMEOUT, TLS_ENABLED, WsTransport};
