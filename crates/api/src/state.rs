use std::sync::Arc;

use huddle_collab::{CollabServices, Coordinator};
use huddle_db::AuditStore;

use crate::config::ServerConfig;
use crate::middleware::auth::AuthUser;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database pool, when running against Postgres. Only the health
    /// check touches it directly.
    pub pool: Option<huddle_db::DbPool>,
    pub config: Arc<ServerConfig>,
    /// Locks, presence, field sync, event bus and audit queue.
    pub services: Arc<CollabServices>,
    /// Read side of the activity log and change history.
    pub audit_store: Arc<dyn AuditStore>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
}

impl AppState {
    /// A coordinator acting for the request's user.
    pub fn coordinator(&self, user: &AuthUser) -> Coordinator {
        Coordinator::new(Arc::clone(&self.services), user.identity())
    }
}
