pub mod activity;
pub mod collaboration;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                               WebSocket (?token=<jwt>)
///
/// /collaboration/locks                              list active locks (GET)
/// /collaboration/locks/acquire                      acquire (POST)
/// /collaboration/locks/release                      release (POST)
/// /collaboration/locks/extend                       extend all my locks (POST)
/// /collaboration/locks/collaborate                  join as co-editor (POST)
/// /collaboration/locks/leave                        leave roster (POST)
/// /collaboration/locks/takeover                     forced takeover (POST, super_admin)
/// /collaboration/locks/{type}/{id}                  lock status (GET)
/// /collaboration/presence                           online users (GET)
/// /collaboration/presence/page?path=                users on a page (GET)
/// /collaboration/presence/{type}/{id}               users on a resource (GET)
///
/// /activity                                         log action (POST), query (GET)
/// /activity/changes                                 log field change (POST)
/// /activity/changes/{type}/{id}                     change history (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/collaboration", collaboration::router())
        .merge(activity::router())
}
