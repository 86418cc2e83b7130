//! Browser-facing WebSocket sessions.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use fleet_relay_core::Attachment;
use futures::{Sink, SinkExt, Stream, StreamExt, stream};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    RelayState,
    protocol::{ClientMessage, ServerMessage},
};

/// WebSocket upgrade handler.
///
/// Use this as an Axum route handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<RelayState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: RelayState) {
    let (sender, receiver) = socket.split();
    run_session(sender, receiver, state).await;
}

/// Drive one client session until either direction ends, then detach it.
async fn run_session<S, R>(mut sender: S, mut receiver: R, state: RelayState)
where
    S: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    // Attach first: the session queue already holds the current status.
    let Attachment { id, receiver: relay_rx } = state.hub.attach();

    // Replies to this client only (pong, protocol errors)
    let (tx, rx) = mpsc::unbounded_channel::<ServerMessage>();

    let outgoing = stream::select(
        UnboundedReceiverStream::new(relay_rx).map(ServerMessage::from),
        UnboundedReceiverStream::new(rx),
    );

    // Spawn task to forward messages to WebSocket
    let mut send_task = tokio::spawn(async move {
        let mut outgoing = outgoing;
        while let Some(msg) = outgoing.next().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {e}");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Handle incoming messages
    let recv_loop = async {
        while let Some(msg) = receiver.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(s) => s.into(),
                    Err(_) => continue,
                },
                Ok(Message::Close(_)) => break,
                // Protocol pings are answered by axum.
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(session = %id, "WebSocket error: {e}");
                    break;
                }
            };

            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => {
                    let _ = tx.send(ServerMessage::Pong);
                }
                Err(e) => {
                    tracing::warn!(session = %id, "Invalid client message: {e}");
                    let _ = tx.send(ServerMessage::Error {
                        message: format!("Invalid message: {e}"),
                    });
                }
            }
        }
    };

    // A failed write ends the session as surely as a closed read.
    tokio::select! {
        () = recv_loop => {}
        _ = &mut send_task => {
            tracing::debug!(session = %id, "Client write failed");
        }
    }

    state.hub.detach(id);
    send_task.abort();
}
