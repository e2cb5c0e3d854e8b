//! WebSocket support for real-time job and engine updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use reelsmith_core::JobSnapshot;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// WebSocket message sent to clients for real-time updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A job was created or its state/progress changed.
    JobUpdate { job: JobSnapshot },
    /// A job was removed.
    JobRemoved { job_id: String },
    /// Engine session phase changed (the global banner state).
    EngineStatus {
        phase: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// One engine log line, from initialization or the active run.
    EngineLog { line: String },
    /// Server heartbeat (sent periodically to keep the connection alive).
    Heartbeat { timestamp: i64 },
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    /// Convenience method to broadcast a job update.
    pub fn job_updated(&self, job: &JobSnapshot) {
        self.broadcast(WsMessage::JobUpdate { job: job.clone() });
    }

    /// Convenience method to broadcast a job removal.
    pub fn job_removed(&self, job_id: &str) {
        self.broadcast(WsMessage::JobRemoved {
            job_id: job_id.to_string(),
        });
    }

    /// Convenience method to broadcast the engine session phase.
    pub fn engine_status(&self, phase: &str, detail: Option<String>) {
        self.broadcast(WsMessage::EngineStatus {
            phase: phase.to_string(),
            detail,
        });
    }

    /// Convenience method to broadcast an engine log line.
    pub fn engine_log(&self, line: &str) {
        self.broadcast(WsMessage::EngineLog {
            line: line.to_string(),
        });
    }

    /// Convenience method to broadcast a heartbeat.
    pub fn heartbeat(&self) {
        self.broadcast(WsMessage::Heartbeat {
            timestamp: chrono::Utc::now().timestamp(),
        });
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe to broadcast messages
    let mut rx = state.ws_broadcaster().subscribe();

    // Track connection metrics
    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    // Spawn task to forward broadcast messages to this client
    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    let msg_type = match &msg {
                        WsMessage::JobUpdate { .. } => "job_update",
                        WsMessage::JobRemoved { .. } => "job_removed",
                        WsMessage::EngineStatus { .. } => "engine_status",
                        WsMessage::EngineLog { .. } => "engine_log",
                        WsMessage::Heartbeat { .. } => "heartbeat",
                    };
                    WS_MESSAGES_SENT.with_label_values(&[msg_type]).inc();

                    match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                debug!("WebSocket send failed, client disconnected");
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to serialize WsMessage: {}", e);
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} messages", n);
                    WS_LAG_EVENTS.inc();
                    // Continue receiving - the client will catch up
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // Handle incoming messages from client (ping/pong, close)
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by axum
                debug!("Received ping: {:?}", data);
            }
            Ok(Message::Text(text)) => {
                // We don't expect any client messages, but log them
                debug!("Received text message: {}", text);
            }
            Ok(_) => {
                // Ignore other message types
            }
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // Clean up
    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
