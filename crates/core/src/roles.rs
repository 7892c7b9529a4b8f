//! Well-known role name constants carried in access-token claims.

pub const ROLE_SUPER_ADMIN: &str = "super_admin";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MEMBER: &str = "member";

/// Only super-admins may force a takeover of a lock held by someone else.
pub fn can_force_takeover(role: &str) -> bool {
    role == ROLE_SUPER_ADMIN
}
