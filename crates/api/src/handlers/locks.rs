//! Handlers for resource locks and conflict resolution.
//!
//! A conflict is not an error: `acquire` answers `200` with
//! `granted: false` and the current holder, and the client offers
//! collaborate / wait / takeover from there.

use axum::extract::{Path, State};
use axum::Json;
use huddle_collab::{AcquireOutcome, ReleaseOutcome, Resolution, ResolutionOutcome};
use huddle_core::collaboration::LockState;
use huddle_db::models::lock::ResourceLock;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireSuperAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Identifies a resource within the caller's workspace.
#[derive(Debug, Deserialize)]
pub struct LockRequest {
    pub resource_type: String,
    pub resource_id: String,
}

#[derive(Debug, Serialize)]
pub struct AcquireResponse {
    #[serde(flatten)]
    pub outcome: AcquireOutcome,
    pub state: LockState,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
    pub outcome: ReleaseOutcome,
}

#[derive(Debug, Serialize)]
pub struct ExtendResponse {
    pub extended: u64,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub lock: Option<ResourceLock>,
}

// ---------------------------------------------------------------------------
// Lock endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/collaboration/locks/acquire
pub async fn acquire_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockRequest>,
) -> AppResult<Json<DataResponse<AcquireResponse>>> {
    let outcome = state
        .coordinator(&auth)
        .acquire_lock(&input.resource_type, &input.resource_id)
        .await?;
    let lock_state = outcome.state();
    Ok(Json(DataResponse {
        data: AcquireResponse {
            outcome,
            state: lock_state,
        },
    }))
}

/// POST /api/v1/collaboration/locks/release
///
/// Releasing a lock the caller does not hold is a no-op, not an error.
pub async fn release_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockRequest>,
) -> AppResult<Json<DataResponse<ReleaseResponse>>> {
    let outcome = state
        .coordinator(&auth)
        .release_lock(&input.resource_type, &input.resource_id)
        .await?;
    Ok(Json(DataResponse {
        data: ReleaseResponse {
            released: outcome != ReleaseOutcome::NotHeld,
            outcome,
        },
    }))
}

/// POST /api/v1/collaboration/locks/extend
///
/// Renews every lock the caller holds in their workspace.
pub async fn extend_locks(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<ExtendResponse>>> {
    let extended = state.coordinator(&auth).extend_locks().await?;
    Ok(Json(DataResponse {
        data: ExtendResponse { extended },
    }))
}

/// POST /api/v1/collaboration/locks/collaborate
pub async fn collaborate(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockRequest>,
) -> AppResult<Json<DataResponse<ResolutionOutcome>>> {
    let outcome = state
        .coordinator(&auth)
        .resolve(
            Resolution::Collaborate,
            &input.resource_type,
            &input.resource_id,
        )
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /api/v1/collaboration/locks/leave
pub async fn leave_collaboration(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<LockRequest>,
) -> AppResult<Json<DataResponse<LeaveResponse>>> {
    let lock = state
        .coordinator(&auth)
        .leave_collaboration(&input.resource_type, &input.resource_id)
        .await?;
    Ok(Json(DataResponse {
        data: LeaveResponse { lock },
    }))
}

/// POST /api/v1/collaboration/locks/takeover
pub async fn takeover(
    RequireSuperAdmin(auth): RequireSuperAdmin,
    State(state): State<AppState>,
    Json(input): Json<LockRequest>,
) -> AppResult<Json<DataResponse<ResolutionOutcome>>> {
    let outcome = state
        .coordinator(&auth)
        .takeover(&input.resource_type, &input.resource_id)
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// GET /api/v1/collaboration/locks
pub async fn list_locks(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<ResourceLock>>>> {
    let locks = state.coordinator(&auth).list_locks().await?;
    Ok(Json(DataResponse { data: locks }))
}

/// GET /api/v1/collaboration/locks/{resource_type}/{resource_id}
///
/// `data` is `null` when the resource is free or its lease has run out.
pub async fn get_lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((resource_type, resource_id)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<Option<ResourceLock>>>> {
    let lock = state
        .coordinator(&auth)
        .get_lock(&resource_type, &resource_id)
        .await?;
    Ok(Json(DataResponse { data: lock }))
}
