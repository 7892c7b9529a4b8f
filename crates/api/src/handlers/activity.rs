//! Handlers for the activity log and field change history.
//!
//! Writes are fire-and-forget: they enqueue and answer `202 Accepted`
//! whether or not the entry is eventually persisted. Reads go straight to
//! the [`AuditStore`](huddle_db::AuditStore).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use huddle_collab::ActionLog;
use huddle_core::types::UserId;
use huddle_db::models::activity::{ActivityLog, ActivityQuery};
use huddle_db::models::change_history::{ChangeHistory, ChangeHistoryQuery};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FieldChangeRequest {
    pub resource_type: String,
    pub resource_id: String,
    pub field: String,
    #[serde(default)]
    pub old_value: serde_json::Value,
    #[serde(default)]
    pub new_value: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityParams {
    pub user_id: Option<UserId>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeHistoryParams {
    pub field: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// POST /api/v1/activity
pub async fn log_action(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<ActionLog>,
) -> StatusCode {
    state.coordinator(&auth).log_action(input).await;
    StatusCode::ACCEPTED
}

/// POST /api/v1/activity/changes
pub async fn log_field_change(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<FieldChangeRequest>,
) -> StatusCode {
    state.coordinator(&auth).log_field_change(
        &input.resource_type,
        &input.resource_id,
        &input.field,
        &input.old_value,
        &input.new_value,
    );
    StatusCode::ACCEPTED
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/activity
///
/// Newest first; `limit` defaults to 50 and is capped at 500.
pub async fn list_activity(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<ActivityParams>,
) -> AppResult<Json<DataResponse<Vec<ActivityLog>>>> {
    let query = ActivityQuery {
        workspace_id: auth.workspace_id,
        user_id: params.user_id,
        action: params.action,
        resource_type: params.resource_type,
        resource_id: params.resource_id,
        limit: params.limit,
        offset: params.offset,
    };
    let rows = state.audit_store.list_activity(&query).await?;
    Ok(Json(DataResponse { data: rows }))
}

/// GET /api/v1/activity/changes/{resource_type}/{resource_id}
pub async fn list_changes(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((resource_type, resource_id)): Path<(String, String)>,
    Query(params): Query<ChangeHistoryParams>,
) -> AppResult<Json<DataResponse<Vec<ChangeHistory>>>> {
    let query = ChangeHistoryQuery {
        workspace_id: auth.workspace_id,
        resource_type,
        resource_id,
        field_name: params.field,
        limit: params.limit,
        offset: params.offset,
    };
    let rows = state.audit_store.list_changes(&query).await?;
    Ok(Json(DataResponse { data: rows }))
}
