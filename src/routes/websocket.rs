// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Websocket echo channel with heartbeats.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Idle time after which the server sends a heartbeat.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/ws", get(ws_handler))
}

/// Reply for one inbound text frame.
pub fn respond(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(message) if message.get("type").and_then(Value::as_str) == Some("ping") => {
            json!({ "type": "pong" })
        }
        Ok(message) => json!({ "type": "ack", "data": message }),
        Err(_) => json!({ "type": "ack", "data": text }),
    }
}

pub fn heartbeat() -> Value {
    json!({ "type": "heartbeat" })
}

/// Registry of live connections, used for server-initiated broadcasts.
#[derive(Clone, Default)]
pub struct ConnectionManager {
    connections: Arc<DashMap<u64, mpsc::UnboundedSender<Message>>>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection. Broadcasts arrive on the returned receiver.
    pub fn register(&self) -> (u64, mpsc::UnboundedReceiver<Message>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(id, tx);
        (id, rx)
    }

    pub fn unregister(&self, id: u64) {
        self.connections.remove(&id);
    }

    /// Queue `message` for every tracked connection.
    ///
    /// Each connection is attempted independently; connections whose
    /// receiver is gone are dropped. Returns the number of successful
    /// enqueues.
    pub fn broadcast(&self, message: &Value) -> usize {
        let text = message.to_string();
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.connections.iter() {
            match entry.value().send(Message::Text(text.clone().into())) {
                Ok(()) => delivered += 1,
                Err(_) => closed.push(*entry.key()),
            }
        }

        for id in closed {
            self.connections.remove(&id);
        }

        delivered
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// GET /api/ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    tracing::debug!("WebSocket upgrade request received");
    let manager = state.connections.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, manager))
}

async fn handle_socket(socket: WebSocket, manager: ConnectionManager) {
    let (sink, stream) = socket.split();
    serve_connection(stream, sink, manager).await;
}

async fn send_json<W>(sink: &mut W, value: &Value) -> Result<(), axum::Error>
where
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    sink.send(Message::Text(value.to_string().into())).await
}

/// Run one connection until the client goes away or a send fails.
///
/// The connection is tracked in `manager` for exactly as long as this runs.
pub(crate) async fn serve_connection<R, W>(mut inbound: R, mut sink: W, manager: ConnectionManager)
where
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
    W: Sink<Message, Error = axum::Error> + Unpin,
{
    let (id, mut outbound) = manager.register();
    tracing::info!(connection_id = id, active = manager.len(), "WebSocket connection established");

    let mut idle_deadline = Instant::now() + HEARTBEAT_INTERVAL;

    loop {
        tokio::select! {
            frame = inbound.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        idle_deadline = Instant::now() + HEARTBEAT_INTERVAL;
                        if let Err(e) = send_json(&mut sink, &respond(text.as_str())).await {
                            tracing::warn!(connection_id = id, error = %e, "Failed to send reply");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(connection_id = id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary and control frames only count as activity.
                        idle_deadline = Instant::now() + HEARTBEAT_INTERVAL;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(connection_id = id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            Some(message) = outbound.recv() => {
                if let Err(e) = sink.send(message).await {
                    tracing::warn!(connection_id = id, error = %e, "Failed to send broadcast");
                    break;
                }
            }

            _ = tokio::time::sleep_until(idle_deadline) => {
                idle_deadline = Instant::now() + HEARTBEAT_INTERVAL;
                if let Err(e) = send_json(&mut sink, &heartbeat()).await {
                    tracing::warn!(connection_id = id, error = %e, "Failed to send heartbeat");
                    break;
                }
            }
        }
    }

    manager.unregister(id);
    tracing::info!(connection_id = id, active = manager.len(), "WebSocket connection closed");
}
