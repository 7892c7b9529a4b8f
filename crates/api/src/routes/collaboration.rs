//! Route definitions for locks and presence.
//!
//! All endpoints require authentication via the `AuthUser` extractor.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{locks, presence};
use crate::state::AppState;

/// Collaboration routes mounted at `/collaboration`.
///
/// ```text
/// POST /locks/acquire                              -> acquire_lock
/// POST /locks/release                              -> release_lock
/// POST /locks/extend                               -> extend_locks
/// POST /locks/collaborate                          -> collaborate
/// POST /locks/leave                                -> leave_collaboration
/// POST /locks/takeover                             -> takeover (super_admin)
/// GET  /locks                                      -> list_locks
/// GET  /locks/{resource_type}/{resource_id}        -> get_lock
/// GET  /presence                                   -> list_online
/// GET  /presence/page?path=                        -> users_on_page
/// GET  /presence/{resource_type}/{resource_id}     -> users_on_resource
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/locks", get(locks::list_locks))
        .route("/locks/acquire", post(locks::acquire_lock))
        .route("/locks/release", post(locks::release_lock))
        .route("/locks/extend", post(locks::extend_locks))
        .route("/locks/collaborate", post(locks::collaborate))
        .route("/locks/leave", post(locks::leave_collaboration))
        .route("/locks/takeover", post(locks::takeover))
        .route(
            "/locks/{resource_type}/{resource_id}",
            get(locks::get_lock),
        )
        .route("/presence", get(presence::list_online))
        .route("/presence/page", get(presence::users_on_page))
        .route(
            "/presence/{resource_type}/{resource_id}",
            get(presence::users_on_resource),
        )
}
