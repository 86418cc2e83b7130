//! Browser-facing transport for the fleet relay.
//!
//! Provides:
//! - Wire protocol (JSON envelopes)
//! - WebSocket session handler (`/ws`)
//! - Health probes (`/health`, `/status`)

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{Router, routing::get};
use fleet_relay_core::{BroadcastHub, ConnectionMonitor};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod health;
pub mod protocol;
pub mod websocket;

pub use protocol::{ClientMessage, ServerMessage};

/// State shared by all handlers.
#[derive(Clone)]
pub struct RelayState {
    /// Hub the sessions attach to.
    pub hub: Arc<BroadcastHub>,
    /// Upstream connection state.
    pub monitor: ConnectionMonitor,
    started_at: Instant,
}

impl RelayState {
    /// Create handler state; uptime is measured from this call.
    #[must_use]
    pub fn new(hub: Arc<BroadcastHub>, monitor: ConnectionMonitor) -> Self {
        Self {
            hub,
            monitor,
            started_at: Instant::now(),
        }
    }

    /// Time since the state was created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Create the relay router.
///
/// # Example
/// ```ignore
/// let app = create_router(RelayState::new(hub, handle.monitor()));
/// axum::serve(listener, app).await?;
/// ```
#[must_use]
pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route("/ws", get(websocket::ws_handler))
        .route("/health", get(health::health_handler))
        .route("/status", get(health::status_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
