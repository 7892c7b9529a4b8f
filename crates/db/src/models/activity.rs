//! Activity log models and DTOs.
//!
//! Activity rows are append-only: no `updated_at`, never deleted.

use huddle_core::types::{DbId, Timestamp, UserId, WorkspaceId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `activity_logs` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: DbId,
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub user_name: String,
    pub session_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub details: Option<serde_json::Value>,
    pub page_path: String,
    pub created_at: Timestamp,
}

/// An audit entry waiting to be written. `created_at` is stamped when the
/// entry is produced, not when the writer gets to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivityLog {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub user_name: String,
    pub session_id: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub details: Option<serde_json::Value>,
    pub page_path: String,
    pub created_at: Timestamp,
}

/// Filters for listing a workspace's activity.
#[derive(Debug, Clone, Default)]
pub struct ActivityQuery {
    pub workspace_id: WorkspaceId,
    pub user_id: Option<UserId>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ActivityQuery {
    pub fn matches(&self, row: &ActivityLog) -> bool {
        row.workspace_id == self.workspace_id
            && self.user_id.map_or(true, |u| row.user_id == u)
            && self.action.as_ref().map_or(true, |a| &row.action == a)
            && self
                .resource_type
                .as_ref()
                .map_or(true, |t| &row.resource_type == t)
            && self
                .resource_id
                .as_ref()
                .map_or(true, |id| row.resource_id.as_ref() == Some(id))
    }
}
