//! Fleet relay server.
//!
//! Keeps one connection to the tracking server's event feed and fans it out
//! to browser clients over WebSocket.
//!
//! Run with: cargo run -p fleet-relay
//!
//! Environment: `TRACCAR_WS_URL`, `PORT`, `RUST_LOG`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use fleet_relay_core::{BroadcastHub, RelayConfig, UpstreamConnector};
use fleet_relay_transport::{RelayState, create_router};
use fleet_relay_upstream::WsTransport;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = RelayConfig::from_env().context("invalid relay configuration")?;
    WsTransport::check_url(&config.upstream_url).context("unusable upstream feed URL")?;

    let hub = Arc::new(BroadcastHub::new());
    let connector = UpstreamConnector::new(
        Arc::new(WsTransport::new()),
        Arc::clone(&hub),
        config.connector(),
    );
    let upstream = connector.start();

    let app = create_router(RelayState::new(hub, upstream.monitor()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Relay listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    upstream.stop().await;
    tracing::info!("Relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
