//! HTTP surface of the coordinator.
//!
//! [`build_app_router`] is shared by `main.rs` and the integration tests,
//! so both see the same layers and the same JSON 404 fallback.

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::routes;
use crate::state::AppState;

const REQUEST_ID: &str = "x-request-id";

/// Assemble `/health`, the `/api/v1` tree and the middleware around them.
///
/// Outermost first: CORS, request-id assignment, an `http` span carrying
/// that id, request-id echo, timeout, panic recovery.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID);

    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http",
                method = %request.method(),
                uri = %request.uri(),
                request_id,
            )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .fallback(route_not_found)
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(trace)
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(build_cors_layer(config))
        .with_state(state)
}

/// Unknown paths answer in the same `{error, code}` shape as `AppError`.
async fn route_not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": format!("No route for {}", uri.path()),
            "code": "NOT_FOUND",
        })),
    )
        .into_response()
}

/// Parse configured origins into header values, naming the first bad one.
fn parse_origins(origins: &[String]) -> Result<Vec<HeaderValue>, String> {
    origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o.trim()).map_err(|e| format!("Invalid CORS origin '{o}': {e}"))
        })
        .collect()
}

/// Browser clients call the lock and activity endpoints with a bearer token
/// and read back the request id for support logs.
///
/// Panics at startup on a malformed `CORS_ORIGINS` entry.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins = parse_origins(&config.cors_origins).unwrap_or_else(|e| panic!("{e}"));

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .expose_headers([HeaderName::from_static(REQUEST_ID)])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_parse_into_header_values() {
        let parsed = parse_origins(&[
            "http://localhost:5173".to_string(),
            " https://app.example.com ".to_string(),
        ])
        .unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1], "https://app.example.com");
    }

    #[test]
    fn malformed_origin_is_named_in_the_error() {
        let err = parse_origins(&["http://ok".to_string(), "bad\norigin".to_string()]).unwrap_err();

        assert!(err.contains("bad\norigin"), "unexpected error: {err}");
    }
}
