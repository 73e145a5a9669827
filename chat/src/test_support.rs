//! In-process hub used by the connection and client tests.
//!
//! Each fake hub accepts a single WebSocket client and runs a script
//! against it, so tests can assert on exactly what the client sent.

use std::future::Future;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use hub::{HubMessage, RECORD_SEPARATOR};
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use crate::connection::HubOptions;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

pub type ServerSocket = WebSocketStream<TcpStream>;

/// Accept one client and hand its socket to `script`. Returns the hub URL.
pub async fn spawn_hub<F, Fut>(script: F) -> String
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake hub");
    let addr = listener.local_addr().expect("fake hub address");
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.expect("accept client");
        let ws = tokio_tungstenite::accept_async(tcp).await.expect("websocket upgrade");
        script(ws).await;
    });
    format!("http://{addr}/signalhub")
}

/// Listener that accepts TCP connections and never answers on them.
/// Returns the hub URL.
pub async fn spawn_silent_listener() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind silent listener");
    let addr = listener.local_addr().expect("silent listener address");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });
    format!("http://{addr}/signalhub")
}

pub fn local_options(hub_url: &str) -> HubOptions {
    HubOptions {
        skip_negotiation: true,
        connect_timeout: Duration::from_secs(2),
        ..HubOptions::new(hub_url)
    }
}

/// Read the client's handshake and accept it, packing `extra` into the
/// same frame as the reply.
pub async fn accept_handshake(ws: &mut ServerSocket, extra: &[HubMessage]) {
    let request = next_text(ws).await.expect("handshake request");
    assert!(request.ends_with(RECORD_SEPARATOR), "{request:?}");
    let parsed: serde_json::Value =
        serde_json::from_str(request.trim_end_matches(RECORD_SEPARATOR)).expect("handshake json");
    assert_eq!(parsed, json!({ "protocol": "json", "version": 1 }));

    let mut reply = format!("{{}}{RECORD_SEPARATOR}");
    for message in extra {
        reply.push_str(&hub::encode_message(message));
    }
    ws.send(Message::Text(reply.into())).await.expect("handshake reply");
}

/// Next text frame, or `None` once the client closed.
pub async fn next_text(ws: &mut ServerSocket) -> Option<String> {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("client frame within timeout")?;
        match frame {
            Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Next non-ping hub message from the client.
pub async fn next_hub_message(ws: &mut ServerSocket) -> Option<HubMessage> {
    loop {
        let text = next_text(ws).await?;
        let messages = hub::decode_messages(&text).expect("client frames decode");
        if let Some(message) = messages.into_iter().find(|m| *m != HubMessage::Ping) {
            return Some(message);
        }
    }
}

pub async fn push(ws: &mut ServerSocket, message: &HubMessage) {
    ws.send(Message::Text(hub::encode_message(message).into()))
        .await
        .expect("push to client");
}

/// Server-side invocation as the hub would push it.
pub fn server_call(target: &str, arguments: &[&str]) -> HubMessage {
    HubMessage::invocation(target, arguments.iter().map(|a| json!(a)).collect())
}
