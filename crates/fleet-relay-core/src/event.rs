//! Events decoded from the upstream feed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upstream decode error.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Malformed upstream message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// An opaque event from the tracking server, forwarded verbatim.
///
/// The payload is shared so that fan-out to many sessions does not copy it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpstreamEvent(Arc<Value>);

impl UpstreamEvent {
    /// Wrap an already decoded JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    /// The raw JSON payload.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.0
    }

    /// Short label for logging.
    ///
    /// Uses the `type` field when present, otherwise the first top-level key
    /// (Traccar sends `{"positions": [...]}`, `{"devices": [...]}`, ...).
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        let obj = self.0.as_object()?;
        match obj.get("type").and_then(Value::as_str) {
            Some(kind) => Some(kind),
            None => obj.keys().next().map(String::as_str),
        }
    }

    /// Decode one upstream frame.
    ///
    /// A frame may hold several JSON documents separated by whitespace or
    /// newlines. Documents are yielded in order; decoding stops at the first
    /// malformed document since the rest of the frame cannot be resynced.
    pub fn decode_frame(frame: &str) -> impl Iterator<Item = Result<Self, EventError>> + '_ {
        let mut stream = serde_json::Deserializer::from_str(frame).into_iter::<Value>();
        let mut failed = false;
        std::iter::from_fn(move || {
            if failed {
                return None;
            }
            match stream.next()? {
                Ok(value) => Some(Ok(Self::new(value))),
                Err(e) => {
                    failed = true;
                    Some(Err(EventError::Malformed(e)))
                }
            }
        })
    }
}

impl From<Value> for UpstreamEvent {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
