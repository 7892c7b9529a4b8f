//! Read-only presence queries. Presence itself is written over the
//! WebSocket.

use axum::extract::{Path, Query, State};
use axum::Json;
use huddle_core::presence::PresenceUser;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub path: String,
}

/// GET /api/v1/collaboration/presence
pub async fn list_online(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<PresenceUser>>>> {
    let users = state.coordinator(&auth).online().await;
    Ok(Json(DataResponse { data: users }))
}

/// GET /api/v1/collaboration/presence/page?path=
pub async fn users_on_page(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<DataResponse<Vec<PresenceUser>>>> {
    if query.path.is_empty() {
        return Err(AppError::BadRequest("path must not be empty".into()));
    }
    let users = state.coordinator(&auth).users_on_page(&query.path).await;
    Ok(Json(DataResponse { data: users }))
}

/// GET /api/v1/collaboration/presence/{resource_type}/{resource_id}
pub async fn users_on_resource(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((resource_type, resource_id)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<Vec<PresenceUser>>>> {
    let users = state
        .coordinator(&auth)
        .users_on_resource(&resource_type, &resource_id)
        .await;
    Ok(Json(DataResponse { data: users }))
}
