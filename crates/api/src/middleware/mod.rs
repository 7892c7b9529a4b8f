//! Authentication and authorization middleware extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//! - [`rbac::RequireSuperAdmin`] -- Requires the `super_admin` role.

pub mod auth;
pub mod rbac;
