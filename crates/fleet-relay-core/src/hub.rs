//! Fan-out of upstream events and status changes to attached sessions.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{UpstreamEvent, UpstreamStatus};

/// Identifier of one attached client session.
pub type SessionId = Uuid;

/// Item delivered to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    /// Upstream connection status changed (or initial status on attach).
    Status(UpstreamStatus),
    /// Event forwarded from the upstream feed.
    Event(UpstreamEvent),
}

/// A freshly attached session.
///
/// `receiver` already holds the current status as its first item.
#[derive(Debug)]
pub struct Attachment {
    /// Session identifier, used to detach.
    pub id: SessionId,
    /// Queue of messages for this session.
    pub receiver: mpsc::UnboundedReceiver<RelayMessage>,
}

struct Inner {
    sessions: HashMap<SessionId, mpsc::UnboundedSender<RelayMessage>>,
    status: UpstreamStatus,
}

/// Broadcast hub and session registry.
///
/// Every session owns an unbounded queue: delivery never blocks the upstream
/// reader and a slow client is never dropped for lagging.
pub struct BroadcastHub {
    inner: RwLock<Inner>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    /// Create an empty hub with a disconnected status.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                sessions: HashMap::new(),
                status: UpstreamStatus::disconnected(),
            }),
        }
    }

    /// Attach a new session.
    ///
    /// The session receives the current status immediately and only events
    /// broadcast after this call.
    #[must_use]
    pub fn attach(&self) -> Attachment {
        let (tx, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let mut inner = self.inner.write();
        // The receiver is still in scope, so this cannot fail.
        let _ = tx.send(RelayMessage::Status(inner.status.clone()));
        inner.sessions.insert(id, tx);
        let clients = inner.sessions.len();
        drop(inner);

        tracing::info!(session = %id, clients, "Client attached");
        Attachment { id, receiver }
    }

    /// Discard a session. Unknown ids are ignored.
    pub fn detach(&self, id: SessionId) {
        let mut inner = self.inner.write();
        if inner.sessions.remove(&id).is_some() {
            let clients = inner.sessions.len();
            drop(inner);
            tracing::info!(session = %id, clients, "Client detached");
        }
    }

    /// Deliver an upstream event to every attached session.
    pub fn broadcast_event(&self, event: UpstreamEvent) {
        self.send_all(&RelayMessage::Event(event));
    }

    /// Record a new upstream status and deliver it to every attached session.
    pub fn broadcast_status(&self, connected: bool, error: Option<String>) {
        let status = UpstreamStatus { connected, error };
        let msg = RelayMessage::Status(status.clone());

        // Write lock orders this against `attach`: a session sees either the
        // old status followed by this broadcast, or the new status only.
        let mut inner = self.inner.write();
        inner.status = status;
        Self::deliver(&inner.sessions, &msg);
    }

    /// Number of currently attached sessions.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.inner.read().sessions.len()
    }

    /// Last status broadcast.
    #[must_use]
    pub fn current_status(&self) -> UpstreamStatus {
        self.inner.read().status.clone()
    }

    fn send_all(&self, msg: &RelayMessage) {
        let inner = self.inner.read();
        Self::deliver(&inner.sessions, msg);
    }

    fn deliver(
        sessions: &HashMap<SessionId, mpsc::UnboundedSender<RelayMessage>>,
        msg: &RelayMessage,
    ) {
        for (id, tx) in sessions {
            // A closed queue means the session is tearing down; it detaches itself.
            if tx.send(msg.clone()).is_err() {
                tracing::debug!(session = %id, "Dropping message for closing session");
            }
        }
    }
}
