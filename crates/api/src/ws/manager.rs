use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use huddle_core::protocol::ServerMessage;
use huddle_core::types::{Timestamp, UserId, WorkspaceId};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Manages all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the sender (for tasks that push to this connection) and the
    /// receiver the caller forwards to the WebSocket sink.
    pub async fn add(
        &self,
        conn_id: String,
        workspace_id: WorkspaceId,
        user_id: UserId,
    ) -> (WsSender, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            workspace_id,
            user_id,
            sender: tx.clone(),
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        (tx, rx)
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Send a message to every connection in a workspace.
    ///
    /// Connections whose send channels are closed are silently skipped
    /// (they are removed when their receive loop ends). Returns the number
    /// of connections the message was queued for.
    pub async fn send_to_workspace(&self, workspace_id: WorkspaceId, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values().filter(|c| c.workspace_id == workspace_id) {
            if conn.sender.send(message.clone()).is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Send a message to all connections belonging to a specific user.
    pub async fn send_to_user(&self, user_id: UserId, message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values().filter(|c| c.user_id == user_id) {
            if conn.sender.send(message.clone()).is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn workspace_connection_count(&self, workspace_id: WorkspaceId) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| c.workspace_id == workspace_id)
            .count()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a protocol message into a text frame.
pub fn to_frame(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server message");
            None
        }
    }
}

/// Queue a protocol message on one connection. Returns `false` once the
/// connection is gone.
pub fn send_message(sender: &WsSender, message: &ServerMessage) -> bool {
    match to_frame(message) {
        Some(frame) => sender.send(frame).is_ok(),
        None => true,
    }
}
