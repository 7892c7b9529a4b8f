use axum::routing::{get, post};
use axum::Router;

use crate::handlers::activity;
use crate::state::AppState;

/// Activity routes, merged at the `/api/v1` root.
///
/// ```text
/// GET, POST /activity                                         -> list_activity, log_action
/// POST      /activity/changes                                 -> log_field_change
/// GET       /activity/changes/{resource_type}/{resource_id}   -> list_changes
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/activity",
            get(activity::list_activity).post(activity::log_action),
        )
        .route("/activity/changes", post(activity::log_field_change))
        .route(
            "/activity/changes/{resource_type}/{resource_id}",
            get(activity::list_changes),
        )
}
