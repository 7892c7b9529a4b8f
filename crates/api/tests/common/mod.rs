//! Shared helpers for HTTP-level integration tests.
//!
//! The router is built exactly as `main.rs` builds it, but over the
//! in-memory stores, so no database is needed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use huddle_api::auth::jwt::{mint_token, JwtConfig};
use huddle_api::config::{CollabConfig, ServerConfig};
use huddle_api::router::build_app_router;
use huddle_api::state::AppState;
use huddle_api::ws::WsManager;
use huddle_collab::{CollabServices, Coordinator, Identity};
use huddle_core::roles::{ROLE_MEMBER, ROLE_SUPER_ADMIN};
use huddle_core::types::{UserId, WorkspaceId};
use huddle_db::{MemoryAuditStore, MemoryLockStore};
use huddle_events::{AuditLogger, AuditWriter};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
        },
        collab: CollabConfig::default(),
    }
}

/// A signed-in user.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub user_id: UserId,
    pub name: String,
    pub token: String,
}

pub struct TestApp {
    pub router: Router,
    pub lock_store: Arc<MemoryLockStore>,
    pub audit_store: Arc<MemoryAuditStore>,
    pub services: Arc<CollabServices>,
    pub ws_manager: Arc<WsManager>,
    pub workspace_id: WorkspaceId,
    pub config: ServerConfig,
    /// Stops the audit writer when dropped.
    _writer: tokio_util::sync::DropGuard,
}

impl TestApp {
    pub fn new() -> Self {
        let config = test_config();
        let lock_store = Arc::new(MemoryLockStore::new());
        let audit_store = Arc::new(MemoryAuditStore::new());

        let (logger, rx) = AuditLogger::channel(config.collab.audit_buffer_size);
        let cancel = CancellationToken::new();
        tokio::spawn(AuditWriter::run(audit_store.clone(), rx, cancel.clone()));

        let services = Arc::new(CollabServices::new(
            lock_store.clone(),
            Arc::new(logger),
            config.collab.lock_ttl,
        ));
        let ws_manager = Arc::new(WsManager::new());

        let state = AppState {
            pool: None,
            config: Arc::new(config.clone()),
            services: services.clone(),
            audit_store: audit_store.clone(),
            ws_manager: ws_manager.clone(),
        };

        Self {
            router: build_app_router(state, &config),
            lock_store,
            audit_store,
            services,
            ws_manager,
            workspace_id: Uuid::new_v4(),
            config,
            _writer: cancel.drop_guard(),
        }
    }

    pub fn member(&self, name: &str) -> TestUser {
        self.user_in(self.workspace_id, name, ROLE_MEMBER)
    }

    pub fn super_admin(&self, name: &str) -> TestUser {
        self.user_in(self.workspace_id, name, ROLE_SUPER_ADMIN)
    }

    pub fn user_in(&self, workspace_id: WorkspaceId, name: &str, role: &str) -> TestUser {
        let user_id = Uuid::new_v4();
        let token = mint_token(user_id, name, workspace_id, role, 15, &self.config.jwt)
            .expect("minting a test token should succeed");
        TestUser {
            user_id,
            name: name.to_string(),
            token,
        }
    }

    /// A coordinator for `user`, standing in for their WebSocket session.
    pub fn coordinator(&self, user: &TestUser) -> Coordinator {
        Coordinator::new(
            self.services.clone(),
            Identity {
                workspace_id: self.workspace_id,
                user_id: user.user_id,
                user_name: user.name.clone(),
                contact: None,
                role: ROLE_MEMBER.to_string(),
                session_id: None,
            },
        )
    }

    pub async fn get(&self, uri: &str, user: &TestUser) -> Response<Body> {
        get_auth(self.router.clone(), uri, &user.token).await
    }

    pub async fn post(&self, uri: &str, user: &TestUser, body: serde_json::Value) -> Response<Body> {
        post_json_auth(self.router.clone(), uri, &user.token, body).await
    }

    /// Poll until the audit writer has persisted at least `count` activity
    /// rows, or give up after a second.
    pub async fn wait_for_activity(&self, count: usize) {
        for _ in 0..100 {
            if self.audit_store.activity_count().await >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn wait_for_changes(&self, count: usize) {
        for _ in 0..100 {
            if self.audit_store.change_count().await >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn lock_body(resource_type: &str, resource_id: &str) -> serde_json::Value {
    serde_json::json!({ "resource_type": resource_type, "resource_id": resource_id })
}
