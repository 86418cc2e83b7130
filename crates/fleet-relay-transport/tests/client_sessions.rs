//! End-to-end tests using a real WebSocket client against the relay router.

use std::{sync::Arc, time::Duration};

use fleet_relay_core::{BroadcastHub, ConnectionState, UpstreamEvent};
use fleet_relay_transport::{RelayState, create_router};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::{net::TcpListener, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Boot the router on an ephemeral port and return the WS URL and the hub.
async fn boot(upstream: ConnectionState) -> (String, Arc<BroadcastHub>) {
    let hub = Arc::new(BroadcastHub::new());
    hub.broadcast_status(upstream.is_connected(), None);
    let app = create_router(RelayState::new(Arc::clone(&hub), upstream.into()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{addr}/ws"), hub)
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

/// Read the next text message as sent on the wire.
async fn read_text(ws: &mut WsStream) -> String {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return text.as_str().to_owned();
        }
    }
}

/// Read the next text message as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    serde_json::from_str(&read_text(ws).await).unwrap()
}

/// Assert nothing else is queued for this client.
async fn assert_quiet(ws: &mut WsStream) {
    let next = timeout(Duration::from_millis(200), ws.next()).await;
    assert!(next.is_err(), "unexpected message: {next:?}");
}

async fn wait_for_clients(hub: &BroadcastHub, expected: usize) {
    timeout(TIMEOUT, async {
        while hub.client_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client count never settled");
}

#[tokio::test]
async fn attach_receives_current_status() {
    let (url, _hub) = boot(ConnectionState::Connected).await;
    let mut ws = connect(&url).await;

    let msg = read_json(&mut ws).await;
    assert_eq!(msg, json!({"event": "traccar-status", "data": {"connected": true}}));
    assert_quiet(&mut ws).await;
}

#[tokio::test]
async fn event_reaches_attached_clients_only() {
    let (url, hub) = boot(ConnectionState::Connected).await;

    let mut ws1 = connect(&url).await;
    let mut ws2 = connect(&url).await;
    let _ = read_json(&mut ws1).await;
    let _ = read_json(&mut ws2).await;
    assert_eq!(hub.client_count(), 2);

    let frame = r#"{"type":"devicePosition","id":1}"#;
    let event = UpstreamEvent::decode_frame(frame).next().unwrap().unwrap();
    hub.broadcast_event(event);

    let expected = format!(r#"{{"event":"traccar-event","data":{frame}}}"#);
    assert_eq!(read_text(&mut ws1).await, expected);
    assert_eq!(read_text(&mut ws2).await, expected);

    let mut ws3 = connect(&url).await;
    assert_eq!(read_json(&mut ws3).await["event"], "traccar-status");
    assert_quiet(&mut ws3).await;
}

#[tokio::test]
async fn status_changes_reach_every_client() {
    let (url, hub) = boot(ConnectionState::Connected).await;
    let mut ws1 = connect(&url).await;
    let mut ws2 = connect(&url).await;
    let _ = read_json(&mut ws1).await;
    let _ = read_json(&mut ws2).await;

    hub.broadcast_status(false, None);
    hub.broadcast_status(true, None);

    for ws in [&mut ws1, &mut ws2] {
        assert_eq!(read_json(ws).await["data"], json!({"connected": false}));
        assert_eq!(read_json(ws).await["data"], json!({"connected": true}));
        assert_quiet(ws).await;
    }
}

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (url, _hub) = boot(ConnectionState::Disconnected).await;
    let mut ws = connect(&url).await;
    let _ = read_json(&mut ws).await;

    ws.send(Message::text(r#"{"event":"ping"}"#)).await.unwrap();
    assert_eq!(read_json(&mut ws).await, json!({"event": "pong"}));
}

#[tokio::test]
async fn invalid_message_keeps_session() {
    let (url, hub) = boot(ConnectionState::Connected).await;
    let mut ws = connect(&url).await;
    let _ = read_json(&mut ws).await;

    ws.send(Message::text("not valid json")).await.unwrap();
    let reply = read_json(&mut ws).await;
    assert_eq!(reply["event"], "error");
    assert!(reply["data"]["message"].is_string());

    hub.broadcast_event(UpstreamEvent::new(json!({"type": "deviceOnline"})));
    assert_eq!(read_json(&mut ws).await["event"], "traccar-event");
}

#[tokio::test]
async fn closing_client_detaches() {
    let (url, hub) = boot(ConnectionState::Connected).await;
    let mut ws1 = connect(&url).await;
    let mut ws2 = connect(&url).await;
    let _ = read_json(&mut ws1).await;
    let _ = read_json(&mut ws2).await;
    assert_eq!(hub.client_count(), 2);

    ws1.close(None).await.unwrap();
    wait_for_clients(&hub, 1).await;

    hub.broadcast_event(UpstreamEvent::new(json!({"type": "deviceOffline"})));
    assert_eq!(read_json(&mut ws2).await["event"], "traccar-event");
}
