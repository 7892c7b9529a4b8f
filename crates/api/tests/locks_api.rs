//! HTTP-level integration tests for lock, collaboration and takeover
//! endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, lock_body, post_json, TestApp};

const ACQUIRE: &str = "/api/v1/collaboration/locks/acquire";
const RELEASE: &str = "/api/v1/collaboration/locks/release";

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = TestApp::new();
    let response = post_json(app.router.clone(), ACQUIRE, lock_body("task", "t-1")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn malformed_token_is_unauthorized() {
    let app = TestApp::new();
    let response = get(app.router.clone(), "/api/v1/collaboration/locks").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = common::get_auth(
        app.router.clone(),
        "/api/v1/collaboration/locks",
        "not-a-jwt",
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Acquire / release
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquire_grants_a_free_resource() {
    let app = TestApp::new();
    let ann = app.member("Ann");

    let response = app.post(ACQUIRE, &ann, lock_body("contact", "c-42")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["granted"], true);
    assert_eq!(json["data"]["state"], "owned");
    assert_eq!(json["data"]["lock"]["locked_by_name"], "Ann");
    assert_eq!(json["data"]["lock"]["lock_mode"], "exclusive");
    assert!(json["data"]["conflict"].is_null());
}

#[tokio::test]
async fn conflict_is_a_successful_response_naming_the_holder() {
    let app = TestApp::new();
    let ann = app.member("Ann");
    let bob = app.member("Bob");

    app.post(ACQUIRE, &ann, lock_body("contact", "c-42")).await;
    let response = app.post(ACQUIRE, &bob, lock_body("contact", "c-42")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["granted"], false);
    assert_eq!(json["data"]["state"], "locked");
    assert_eq!(json["data"]["conflict"]["locked_by"], ann.user_id.to_string());
    assert_eq!(json["data"]["conflict"]["locked_by_name"], "Ann");
}

#[tokio::test]
async fn release_frees_the_resource_for_the_next_user() {
    let app = TestApp::new();
    let ann = app.member("Ann");
    let bob = app.member("Bob");

    app.post(ACQUIRE, &ann, lock_body("task", "t-1")).await;
    let response = app.post(RELEASE, &ann, lock_body("task", "t-1")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["released"], true);
    assert_eq!(json["data"]["outcome"], "released");

    let json = body_json(app.post(ACQUIRE, &bob, lock_body("task", "t-1")).await).await;
    assert_eq!(json["data"]["granted"], true);
}

#[tokio::test]
async fn releasing_an_unheld_lock_is_a_no_op() {
    let app = TestApp::new();
    let ann = app.member("Ann");
    let bob = app.member("Bob");

    app.post(ACQUIRE, &ann, lock_body("task", "t-1")).await;
    let response = app.post(RELEASE, &bob, lock_body("task", "t-1")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["released"], false);
    assert_eq!(json["data"]["outcome"], "not_held");

    // Ann still holds it.
    let json = body_json(app.get("/api/v1/collaboration/locks/task/t-1", &ann).await).await;
    assert_eq!(json["data"]["locked_by_name"], "Ann");
}

#[tokio::test]
async fn invalid_resource_type_is_a_validation_error() {
    let app = TestApp::new();
    let ann = app.member("Ann");

    let response = app.post(ACQUIRE, &ann, lock_body("Not A Type", "x")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn extend_reports_renewed_count() {
    let app = TestApp::new();
    let ann = app.member("Ann");

    app.post(ACQUIRE, &ann, lock_body("task", "t-1")).await;
    app.post(ACQUIRE, &ann, lock_body("task", "t-2")).await;

    let response = app
        .post("/api/v1/collaboration/locks/extend", &ann, serde_json::json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["extended"], 2);
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_lock_is_null_for_a_free_resource() {
    let app = TestApp::new();
    let ann = app.member("Ann");

    let response = app.get("/api/v1/collaboration/locks/task/nobody", &ann).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"].is_null());
}

#[tokio::test]
async fn list_locks_is_scoped_to_the_callers_workspace() {
    let app = TestApp::new();
    let ann = app.member("Ann");
    let outsider = app.user_in(uuid::Uuid::new_v4(), "Zed", "member");

    app.post(ACQUIRE, &ann, lock_body("task", "t-1")).await;
    app.post(ACQUIRE, &outsider, lock_body("task", "t-1")).await;

    let json = body_json(app.get("/api/v1/collaboration/locks", &ann).await).await;
    let locks = json["data"].as_array().unwrap();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0]["locked_by_name"], "Ann");

    // Same resource id in another workspace is a different lock.
    let json = body_json(app.get("/api/v1/collaboration/locks", &outsider).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Conflict resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn collaborate_adds_the_caller_to_the_roster() {
    let app = TestApp::new();
    let ann = app.member("Ann");
    let bob = app.member("Bob");

    app.post(ACQUIRE, &ann, lock_body("pipeline_card", "p-7")).await;
    let response = app
        .post(
            "/api/v1/collaboration/locks/collaborate",
            &bob,
            lock_body("pipeline_card", "p-7"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["state"], "collaborative");
    assert_eq!(json["data"]["lock"]["lock_mode"], "collaborative");
    assert_eq!(json["data"]["lock"]["locked_by_name"], "Ann");
    let roster = json["data"]["lock"]["collaborators"].as_array().unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["user_name"], "Bob");
}

#[tokio::test]
async fn collaborate_on_a_free_resource_is_not_found() {
    let app = TestApp::new();
    let bob = app.member("Bob");

    let response = app
        .post(
            "/api/v1/collaboration/locks/collaborate",
            &bob,
            lock_body("task", "t-404"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn leave_keeps_the_lock_collaborative() {
    let app = TestApp::new();
    let ann = app.member("Ann");
    let bob = app.member("Bob");

    app.post(ACQUIRE, &ann, lock_body("task", "t-1")).await;
    app.post(
        "/api/v1/collaboration/locks/collaborate",
        &bob,
        lock_body("task", "t-1"),
    )
    .await;

    let response = app
        .post("/api/v1/collaboration/locks/leave", &bob, lock_body("task", "t-1"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["lock"]["lock_mode"], "collaborative");
    assert!(json["data"]["lock"]["collaborators"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn takeover_requires_super_admin() {
    let app = TestApp::new();
    let ann = app.member("Ann");
    let bob = app.member("Bob");

    app.post(ACQUIRE, &ann, lock_body("task", "t-1")).await;
    let response = app
        .post("/api/v1/collaboration/locks/takeover", &bob, lock_body("task", "t-1"))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], "FORBIDDEN");
}

#[tokio::test]
async fn super_admin_takeover_replaces_the_holder() {
    let app = TestApp::new();
    let ann = app.member("Ann");
    let root = app.super_admin("Root");

    app.post(ACQUIRE, &ann, lock_body("task", "t-1")).await;
    let response = app
        .post(
            "/api/v1/collaboration/locks/takeover",
            &root,
            lock_body("task", "t-1"),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["state"], "owned");
    assert_eq!(json["data"]["previous_holder"], ann.user_id.to_string());
    assert_eq!(json["data"]["lock"]["locked_by_name"], "Root");

    // Ann's heartbeat no longer renews anything.
    let json = body_json(
        app.post("/api/v1/collaboration/locks/extend", &ann, serde_json::json!({}))
            .await,
    )
    .await;
    assert_eq!(json["data"]["extended"], 0);
}

// ---------------------------------------------------------------------------
// Store outage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquire_during_outage_is_undetermined_not_an_error() {
    let app = TestApp::new();
    let ann = app.member("Ann");
    app.lock_store.set_unavailable(true);

    let response = app.post(ACQUIRE, &ann, lock_body("task", "t-1")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["granted"], false);
    assert!(json["data"]["conflict"].is_null());
    assert_eq!(json["data"]["state"], "none");
}

#[tokio::test]
async fn extend_during_outage_is_service_unavailable() {
    let app = TestApp::new();
    let ann = app.member("Ann");
    app.lock_store.set_unavailable(true);

    let response = app
        .post("/api/v1/collaboration/locks/extend", &ann, serde_json::json!({}))
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "SERVICE_UNAVAILABLE");
}
