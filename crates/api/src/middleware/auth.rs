//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use huddle_collab::Identity;
use huddle_core::error::CoreError;
use huddle_core::types::{UserId, WorkspaceId};

use crate::auth::jwt::{validate_token, Claims, JwtConfig};
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT Bearer token in the `Authorization` header.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub user_name: String,
    pub contact: Option<String>,
    pub workspace_id: WorkspaceId,
    pub role: String,
    /// The token's `jti`.
    pub session_id: String,
}

impl AuthUser {
    /// Verify a raw token. Used by the WebSocket upgrade, which carries the
    /// token in the query string.
    pub fn from_token(token: &str, config: &JwtConfig) -> Result<Self, AppError> {
        let claims = validate_token(token, config).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;
        Ok(claims.into())
    }

    pub fn identity(&self) -> Identity {
        Identity {
            workspace_id: self.workspace_id,
            user_id: self.user_id,
            user_name: self.user_name.clone(),
            contact: self.contact.clone(),
            role: self.role.clone(),
            session_id: Some(self.session_id.clone()),
        }
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            user_name: claims.name,
            contact: claims.contact,
            workspace_id: claims.workspace_id,
            role: claims.role,
            session_id: claims.jti,
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        Self::from_token(token, &state.config.jwt)
    }
}
