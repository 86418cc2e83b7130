//! Upstream connector: owns the single connection to the tracking server.
//!
//! State machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//! Connected  -> Disconnected              (peer closed)
//! Connected  -> Error -> Disconnected     (link failed)
//! Connecting -> Error -> Disconnected     (connect failed)
//! Disconnected -> Connecting              (after the fixed reconnect delay)
//! ```
//!
//! Every transition out of an open connection is broadcast to all sessions
//! exactly once, and exactly one reconnect is scheduled. Retries never stop.

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle, time::sleep};

use crate::{
    BroadcastHub, ConnectionMonitor, ConnectionState, UpstreamEvent,
    traits::{LinkEvent, UpstreamTransport},
};

/// Delay between losing the upstream and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Connector settings.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Upstream feed URL.
    pub url: String,
    /// Constant delay before each reconnect attempt.
    pub reconnect_delay: Duration,
}

impl ConnectorConfig {
    /// Config for `url` with the default reconnect delay.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// How a single connection attempt ended.
enum Outcome {
    /// Connection failed or was lost; schedule a reconnect.
    Lost,
    /// Shutdown was requested.
    Shutdown,
}

/// Maintains one upstream connection and feeds the hub.
pub struct UpstreamConnector {
    transport: Arc<dyn UpstreamTransport>,
    hub: Arc<BroadcastHub>,
    config: ConnectorConfig,
    state_tx: watch::Sender<ConnectionState>,
}

impl UpstreamConnector {
    /// Create a stopped connector in the `Disconnected` state.
    #[must_use]
    pub fn new(
        transport: Arc<dyn UpstreamTransport>,
        hub: Arc<BroadcastHub>,
        config: ConnectorConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            transport,
            hub,
            config,
            state_tx,
        }
    }

    /// Read-only view of the connection state.
    #[must_use]
    pub fn monitor(&self) -> ConnectionMonitor {
        ConnectionMonitor::new(self.state_tx.subscribe())
    }

    /// Spawn the connection loop.
    ///
    /// Dropping the returned handle also stops the loop.
    #[must_use]
    pub fn start(self) -> ConnectorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = self.monitor();
        let task = tokio::spawn(self.run(shutdown_rx));
        ConnectorHandle {
            shutdown_tx,
            task,
            monitor,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(url = %self.config.url, "Upstream connector started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Outcome::Shutdown = self.connect_and_run(&mut shutdown).await {
                break;
            }

            let delay = self.config.reconnect_delay;
            tracing::info!(delay_ms = delay.as_millis(), "Scheduling upstream reconnect");

            tokio::select! {
                () = sleep(delay) => {}
                _ = shutdown.changed() => {
                    tracing::debug!("Reconnect cancelled by shutdown");
                    break;
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::info!("Upstream connector stopped");
    }

    async fn connect_and_run(&self, shutdown: &mut watch::Receiver<bool>) -> Outcome {
        self.set_state(ConnectionState::Connecting);
        tracing::info!(url = %self.config.url, "Connecting to upstream");

        let mut link = tokio::select! {
            result = self.transport.connect(&self.config.url) => match result {
                Ok(link) => link,
                Err(e) => {
                    self.on_error(&e.to_string());
                    return Outcome::Lost;
                }
            },
            _ = shutdown.changed() => return Outcome::Shutdown,
        };

        self.on_open();

        loop {
            tokio::select! {
                event = link.next_event() => match event {
                    LinkEvent::Message(text) => self.on_message(&text),
                    LinkEvent::Closed => {
                        self.on_close();
                        return Outcome::Lost;
                    }
                    LinkEvent::Error(e) => {
                        self.on_error(&e);
                        return Outcome::Lost;
                    }
                },
                _ = shutdown.changed() => {
                    link.close().await;
                    self.set_state(ConnectionState::Disconnected);
                    tracing::info!("Upstream connection closed for shutdown");
                    self.hub.broadcast_status(false, None);
                    return Outcome::Shutdown;
                }
            }
        }
    }

    fn on_open(&self) {
        self.set_state(ConnectionState::Connected);
        tracing::info!("Connected to upstream");
        self.hub.broadcast_status(true, None);
    }

    fn on_message(&self, text: &str) {
        for decoded in UpstreamEvent::decode_frame(text) {
            match decoded {
                Ok(event) => {
                    tracing::debug!(kind = event.kind().unwrap_or("unknown"), "Upstream event");
                    self.hub.broadcast_event(event);
                }
                Err(e) => tracing::warn!("Dropping upstream message: {e}"),
            }
        }
    }

    fn on_close(&self) {
        self.set_state(ConnectionState::Disconnected);
        tracing::warn!("Upstream connection closed");
        self.hub.broadcast_status(false, None);
    }

    fn on_error(&self, error: &str) {
        self.set_state(ConnectionState::Error);
        tracing::error!("Upstream connection error: {error}");
        self.hub.broadcast_status(false, Some(error.to_string()));
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Upstream state changed");
        }
    }
}

/// Handle to a running connector.
pub struct ConnectorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    monitor: ConnectionMonitor,
}

impl ConnectorHandle {
    /// Read-only view of the connection state.
    #[must_use]
    pub fn monitor(&self) -> ConnectionMonitor {
        self.monitor.clone()
    }

    /// Cancel any pending reconnect, close the open connection and wait for
    /// the loop to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Upstream connector task failed: {e}");
        }
    }
}
