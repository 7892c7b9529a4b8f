//! Field-level change history models and DTOs.

use huddle_core::types::{DbId, Timestamp, UserId, WorkspaceId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `change_history` table. Values are opaque strings.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChangeHistory {
    pub id: DbId,
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub user_name: String,
    pub resource_type: String,
    pub resource_id: String,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChangeHistory {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub user_name: String,
    pub resource_type: String,
    pub resource_id: String,
    pub field_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: Timestamp,
}

/// Filters for one resource's change trail.
#[derive(Debug, Clone)]
pub struct ChangeHistoryQuery {
    pub workspace_id: WorkspaceId,
    pub resource_type: String,
    pub resource_id: String,
    pub field_name: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ChangeHistoryQuery {
    pub fn matches(&self, row: &ChangeHistory) -> bool {
        row.workspace_id == self.workspace_id
            && row.resource_type == self.resource_type
            && row.resource_id == self.resource_id
            && self.field_name.as_ref().map_or(true, |f| &row.field_name == f)
    }
}
