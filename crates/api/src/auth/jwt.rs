//! JWT access-token validation.
//!
//! Tokens are issued by the external identity service and signed with a
//! shared HS256 secret. This server only verifies them; [`mint_token`]
//! exists for tests and local tooling.

use huddle_core::types::{UserId, WorkspaceId};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims carried by every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's uuid.
    pub sub: UserId,
    /// Display name shown to other users.
    pub name: String,
    /// Contact e-mail, shown on lock badges.
    #[serde(default)]
    pub contact: Option<String>,
    /// Tenant the user is signed in to.
    pub workspace_id: WorkspaceId,
    /// Role name (`"super_admin"`, `"admin"`, `"member"`).
    pub role: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token id; recorded as the audit session id.
    pub jti: String,
}

/// Configuration for JWT validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to verify tokens.
    pub secret: String,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var      | Required | Default |
    /// |--------------|----------|---------|
    /// | `JWT_SECRET` | **yes**  | --      |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");
        Self { secret }
    }
}

/// Validate and decode an access token, returning the embedded [`Claims`].
///
/// Validates the signature and expiration.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    Ok(token_data.claims)
}

/// Sign a token for the given identity, valid for `ttl_mins`.
pub fn mint_token(
    user_id: UserId,
    name: &str,
    workspace_id: WorkspaceId,
    role: &str,
    ttl_mins: i64,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        contact: None,
        workspace_id,
        role: role.to_string(),
        exp: now + ttl_mins * 60,
        iat: now,
        jti: Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
        }
    }

    #[test]
    fn test_mint_and_validate_token() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let workspace_id = Uuid::new_v4();
        let token = mint_token(user_id, "Ann", workspace_id, "member", 15, &config)
            .expect("token generation should succeed");

        let claims = validate_token(&token, &config).expect("token validation should succeed");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.name, "Ann");
        assert_eq!(claims.workspace_id, workspace_id);
        assert_eq!(claims.role, "member");
        assert!(claims.exp > claims.iat);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_expired_token_fails() {
        let config = test_config();
        // Well past the default 60-second leeway.
        let token = mint_token(Uuid::new_v4(), "Ann", Uuid::new_v4(), "member", -10, &config)
            .expect("encoding should succeed");

        assert!(validate_token(&token, &config).is_err());
    }

    #[test]
    fn test_different_secrets_fail() {
        let config_a = JwtConfig {
            secret: "secret-alpha".to_string(),
        };
        let config_b = JwtConfig {
            secret: "secret-bravo".to_string(),
        };

        let token = mint_token(Uuid::new_v4(), "Ann", Uuid::new_v4(), "member", 15, &config_a)
            .expect("token generation should succeed");

        assert!(
            validate_token(&token, &config_b).is_err(),
            "token signed with a different secret must fail"
        );
    }
}
