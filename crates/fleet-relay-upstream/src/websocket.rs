//! WebSocket client for the tracking server's event feed.

use std::time::Duration;

use async_trait::async_trait;
use fleet_relay_core::{LinkEvent, TransportError, UpstreamLink, UpstreamTransport};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message},
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default bound on the TCP + handshake phase of a connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether this build can open `wss://` feeds.
pub const TLS_ENABLED: bool = cfg!(feature = "tls");

/// Opens upstream connections with `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WsTransport {
    /// Create a transport with the default connect timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Check that `url` is a feed this build can open.
    ///
    /// # Errors
    /// Returns `InvalidUrl` for non-WebSocket schemes, and for `wss://` when
    /// the `tls` feature is off.
    pub fn check_url(url: &str) -> Result<(), TransportError> {
        if url.starts_with("wss://") {
            if TLS_ENABLED {
                return Ok(());
            }
            return Err(TransportError::InvalidUrl(format!(
                "{url}: wss:// requires the `tls` feature"
            )));
        }
        if url.starts_with("ws://") {
            return Ok(());
        }
        Err(TransportError::InvalidUrl(format!(
            "{url}: expected a ws:// or wss:// URL"
        )))
    }
}

#[async_trait]
impl UpstreamTransport for WsTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn UpstreamLink>, TransportError> {
        Self::check_url(url)?;
        let (ws, response) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                TransportError::Connect(format!(
                    "timed out after {}ms",
                    self.connect_timeout.as_millis()
                ))
            })?
            .map_err(connect_error)?;

        tracing::debug!(status = %response.status(), "Upstream handshake complete");
        Ok(Box::new(WsLink { ws }))
    }
}

fn connect_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Url(e) => TransportError::InvalidUrl(e.to_string()),
        tungstenite::Error::HttpFormat(e) => TransportError::InvalidUrl(e.to_string()),
        tungstenite::Error::Io(e) => TransportError::Io(e),
        other => TransportError::Connect(other.to_string()),
    }
}

/// One open upstream WebSocket.
struct WsLink {
    ws: WsStream,
}

#[async_trait]
impl UpstreamLink for WsLink {
    async fn next_event(&mut self) -> LinkEvent {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return LinkEvent::Message(text.as_str().to_owned());
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return LinkEvent::Message(text),
                    Err(_) => {
                        tracing::warn!(len = data.len(), "Ignoring non-UTF-8 binary frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    if let Some(frame) = frame {
                        tracing::debug!(
                            code = ?frame.code,
                            reason = frame.reason.as_str(),
                            "Upstream sent close frame"
                        );
                    }
                    return LinkEvent::Closed;
                }
                // Ping replies are queued by tungstenite and flushed on the next read.
                Some(Ok(_)) => {}
                Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed))
                | None => return LinkEvent::Closed,
                Some(Err(e)) => return LinkEvent::Error(e.to_string()),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!("Error closing upstream socket: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let transport = WsTransport::new();
        for url in ["not a url", "ftp://tracker.test/api/socket"] {
            let err = transport.connect(url).await.err().unwrap();
            assert!(matches!(err, TransportError::InvalidUrl(_)), "{url}: {err}");
        }
    }

    #[test]
    fn test_check_url() {
        assert!(WsTransport::check_url("ws://localhost:8082/api/socket").is_ok());
        assert!(matches!(
            WsTransport::check_url("http://localhost:8082"),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[cfg(feature = "tls")]
    #[test]
    fn test_secure_url_accepted_with_tls() {
        assert!(WsTransport::check_url("wss://tracker.example.com/api/socket").is_ok());
    }

    #[cfg(not(feature = "tls"))]
    #[tokio::test]
    async fn test_secure_url_rejected_without_tls() {
        let url = "wss://tracker.example.com/api/socket";
        let err = WsTransport::check_url(url).unwrap_err();
        assert!(err.to_string().contains("tls"), "{err}");

        let err = WsTransport::new().connect(url).await.err().unwrap();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = WsTransport::new().with_connect_timeout(Duration::from_secs(2));
        let result = transport.connect(&format!("ws://127.0.0.1:{port}/api/socket")).await;
        assert!(result.is_err());
    }
}
