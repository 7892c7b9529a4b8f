//! HTTP-level integration tests for the activity log and change history.
//!
//! Writes go through the fire-and-forget queue, so reads poll until the
//! background writer has caught up.

mod common;

use axum::http::StatusCode;
use common::{body_json, lock_body, TestApp};
use serde_json::json;

#[tokio::test]
async fn logged_action_is_accepted_and_queryable() {
    let app = TestApp::new();
    let ann = app.member("Ann");

    let response = app
        .post(
            "/api/v1/activity",
            &ann,
            json!({
                "action": "export",
                "resource_type": "contact",
                "resource_id": "c-1",
                "resource_name": "Acme Corp",
                "page_path": "/contacts/c-1",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    app.wait_for_activity(1).await;
    let json = body_json(app.get("/api/v1/activity", &ann).await).await;
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["action"], "export");
    assert_eq!(rows[0]["user_name"], "Ann");
    assert_eq!(rows[0]["resource_name"], "Acme Corp");
    assert_eq!(rows[0]["page_path"], "/contacts/c-1");
    assert!(rows[0]["session_id"].is_string());
}

#[tokio::test]
async fn invalid_action_is_accepted_but_dropped() {
    let app = TestApp::new();
    let ann = app.member("Ann");

    let response = app
        .post(
            "/api/v1/activity",
            &ann,
            json!({ "action": "  ", "resource_type": "contact" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    app.post(
        "/api/v1/activity",
        &ann,
        json!({ "action": "export", "resource_type": "contact" }),
    )
    .await;

    app.wait_for_activity(1).await;
    let json = body_json(app.get("/api/v1/activity", &ann).await).await;
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["action"], "export");
}

#[tokio::test]
async fn credentials_in_details_are_redacted() {
    let app = TestApp::new();
    let ann = app.member("Ann");

    app.post(
        "/api/v1/activity",
        &ann,
        json!({
            "action": "connect_integration",
            "resource_type": "integration",
            "details": { "api_key": "sk-live-123", "provider": "crm" },
        }),
    )
    .await;

    app.wait_for_activity(1).await;
    let json = body_json(app.get("/api/v1/activity", &ann).await).await;
    let details = &json["data"][0]["details"];
    assert_eq!(details["api_key"], "[REDACTED]");
    assert_eq!(details["provider"], "crm");
}

#[tokio::test]
async fn lock_actions_are_logged_automatically() {
    let app = TestApp::new();
    let ann = app.member("Ann");

    app.post(
        "/api/v1/collaboration/locks/acquire",
        &ann,
        lock_body("task", "t-1"),
    )
    .await;
    app.post(
        "/api/v1/collaboration/locks/release",
        &ann,
        lock_body("task", "t-1"),
    )
    .await;

    app.wait_for_activity(2).await;
    let json = body_json(app.get("/api/v1/activity?action=lock", &ann).await).await;
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["resource_type"], "task");
    assert_eq!(rows[0]["resource_id"], "t-1");

    let json = body_json(app.get("/api/v1/activity?resource_id=t-1", &ann).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn activity_is_scoped_to_the_callers_workspace() {
    let app = TestApp::new();
    let ann = app.member("Ann");
    let outsider = app.user_in(uuid::Uuid::new_v4(), "Zed", "member");

    app.post(
        "/api/v1/activity",
        &outsider,
        json!({ "action": "export", "resource_type": "contact" }),
    )
    .await;

    app.wait_for_activity(1).await;
    let json = body_json(app.get("/api/v1/activity", &ann).await).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn field_changes_are_stored_stringified() {
    let app = TestApp::new();
    let ann = app.member("Ann");

    let response = app
        .post(
            "/api/v1/activity/changes",
            &ann,
            json!({
                "resource_type": "contact",
                "resource_id": "c-42",
                "field": "status",
                "old_value": "lead",
                "new_value": "customer",
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    app.post(
        "/api/v1/activity/changes",
        &ann,
        json!({
            "resource_type": "contact",
            "resource_id": "c-42",
            "field": "score",
            "old_value": null,
            "new_value": 7,
        }),
    )
    .await;

    app.wait_for_changes(2).await;
    let json = body_json(
        app.get("/api/v1/activity/changes/contact/c-42", &ann)
            .await,
    )
    .await;
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let status = rows.iter().find(|r| r["field_name"] == "status").unwrap();
    assert_eq!(status["old_value"], "lead");
    assert_eq!(status["new_value"], "customer");

    let score = rows.iter().find(|r| r["field_name"] == "score").unwrap();
    assert!(score["old_value"].is_null());
    assert_eq!(score["new_value"], "7");

    let json = body_json(
        app.get("/api/v1/activity/changes/contact/c-42?field=score", &ann)
            .await,
    )
    .await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}
