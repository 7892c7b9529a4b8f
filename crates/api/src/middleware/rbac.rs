//! Role-based access control (RBAC) extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects requests whose role does not
//! meet the minimum requirement.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use huddle_core::error::CoreError;
use huddle_core::roles::can_force_takeover;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `super_admin` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn takeover(RequireSuperAdmin(user): RequireSuperAdmin) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireSuperAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !can_force_takeover(&user.role) {
            return Err(AppError::Core(CoreError::Forbidden(
                "Super admin role required".into(),
            )));
        }
        Ok(RequireSuperAdmin(user))
    }
}
