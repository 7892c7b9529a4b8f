//! Resource locking constants, types, and the per-user lock state machine.
//!
//! Lives in `core` so the store layer, the coordinator services and the
//! HTTP/WebSocket surface all share the same lease durations, lock modes,
//! resource keys and validation rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, UserId, WorkspaceId};

// ---------------------------------------------------------------------------
// Lease constants
// ---------------------------------------------------------------------------

/// Default lock lease in minutes.
pub const DEFAULT_LOCK_TTL_MINS: i64 = 30;

/// Maximum configurable lock lease in minutes (4 hours).
pub const MAX_LOCK_TTL_MINS: i64 = 240;

/// Minimum configurable lock lease in minutes.
pub const MIN_LOCK_TTL_MINS: i64 = 1;

/// Client heartbeat cadence. Each heartbeat refreshes presence and extends
/// every lock the user holds.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 25;

/// How often the expired-lock sweep runs.
pub const LOCK_CLEANUP_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Resource types
// ---------------------------------------------------------------------------

/// Resource types the dashboard locks today. Business code may lock any
/// type that passes [`validate_resource_type`].
pub mod resource_types {
    pub const CONTACT: &str = "contact";
    pub const TASK: &str = "task";
    pub const PIPELINE_CARD: &str = "pipeline_card";
    pub const MEETING: &str = "meeting";
}

const MAX_RESOURCE_TYPE_LEN: usize = 64;
const MAX_RESOURCE_ID_LEN: usize = 128;

/// Resource types are lowercase snake_case identifiers.
pub fn validate_resource_type(resource_type: &str) -> Result<(), String> {
    if resource_type.is_empty() {
        return Err("resource_type must not be empty".to_string());
    }
    if resource_type.len() > MAX_RESOURCE_TYPE_LEN {
        return Err(format!(
            "resource_type must be at most {MAX_RESOURCE_TYPE_LEN} characters"
        ));
    }
    if !resource_type
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(format!(
            "Invalid resource_type '{resource_type}'. Use lowercase letters, digits and '_'"
        ));
    }
    Ok(())
}

/// Resource ids are opaque but must be non-blank and bounded.
pub fn validate_resource_id(resource_id: &str) -> Result<(), String> {
    if resource_id.trim().is_empty() {
        return Err("resource_id must not be empty".to_string());
    }
    if resource_id.len() > MAX_RESOURCE_ID_LEN {
        return Err(format!(
            "resource_id must be at most {MAX_RESOURCE_ID_LEN} characters"
        ));
    }
    Ok(())
}

/// Validate a lease length in minutes.
pub fn validate_lock_ttl(minutes: i64) -> Result<(), String> {
    if minutes < MIN_LOCK_TTL_MINS {
        return Err(format!(
            "Lock TTL must be at least {MIN_LOCK_TTL_MINS} minute(s), got {minutes}"
        ));
    }
    if minutes > MAX_LOCK_TTL_MINS {
        return Err(format!(
            "Lock TTL must be at most {MAX_LOCK_TTL_MINS} minutes, got {minutes}"
        ));
    }
    Ok(())
}

/// A lease length that has passed [`validate_lock_ttl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseTtl(i64);

impl LeaseTtl {
    pub fn from_mins(minutes: i64) -> Result<Self, String> {
        validate_lock_ttl(minutes)?;
        Ok(Self(minutes))
    }

    pub fn mins(self) -> i64 {
        self.0
    }

    /// When a lease taken or renewed at `now` runs out.
    pub fn expiry_from(self, now: Timestamp) -> Timestamp {
        lease_expiry(now, self.0)
    }
}

impl Default for LeaseTtl {
    fn default() -> Self {
        Self(DEFAULT_LOCK_TTL_MINS)
    }
}

impl fmt::Display for LeaseTtl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

// ---------------------------------------------------------------------------
// ResourceKey
// ---------------------------------------------------------------------------

/// Composite identity of a lockable resource. Unique per lock row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub workspace_id: WorkspaceId,
    pub resource_type: String,
    pub resource_id: String,
}

impl ResourceKey {
    pub fn new(
        workspace_id: WorkspaceId,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_resource_type(&self.resource_type)?;
        validate_resource_id(&self.resource_id)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.workspace_id, self.resource_type, self.resource_id
        )
    }
}

// ---------------------------------------------------------------------------
// Lock mode, holder, collaborators
// ---------------------------------------------------------------------------

/// How a lock row is being used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Exactly one editor: the holder.
    Exclusive,
    /// The holder plus every rostered collaborator may edit.
    Collaborative,
}

impl LockMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LockMode::Exclusive => "exclusive",
            LockMode::Collaborative => "collaborative",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exclusive" => Ok(LockMode::Exclusive),
            "collaborative" => Ok(LockMode::Collaborative),
            other => Err(format!("Unknown lock mode '{other}'")),
        }
    }
}

/// Identity of the user asking for a lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub user_id: UserId,
    pub user_name: String,
    pub contact: Option<String>,
}

impl LockHolder {
    pub fn new(user_id: UserId, user_name: impl Into<String>) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            contact: None,
        }
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }
}

/// One entry of a collaborative lock's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub user_id: UserId,
    pub user_name: String,
    pub joined_at: Timestamp,
}

/// Compute the expiry for a lease starting at `now`.
pub fn lease_expiry(now: Timestamp, ttl_mins: i64) -> Timestamp {
    now + chrono::Duration::minutes(ttl_mins)
}

// ---------------------------------------------------------------------------
// Per-user lock state machine
// ---------------------------------------------------------------------------

/// Where one user stands with respect to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    /// No lock involvement.
    None,
    /// The user holds the lock.
    Owned,
    /// Someone else holds the lock; the user is read-only.
    Locked,
    /// The user is a rostered co-editor of someone else's lock.
    Collaborative,
}

/// Events that move a [`LockState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTransition {
    /// `Acquire` returned `granted = true`.
    Acquired,
    /// `Acquire` returned a conflict.
    Conflicted,
    /// The user released the lock or left the roster.
    Released,
    /// The lease ran out.
    Expired,
    /// The user chose to co-edit.
    Collaborate,
    /// The user chose to wait read-only.
    Wait,
    /// The user forcibly took the lock over.
    Takeover,
}

impl LockState {
    /// Apply a transition, rejecting combinations the coordinator never
    /// produces.
    pub fn apply(self, transition: LockTransition) -> Result<LockState, String> {
        use LockState::*;
        use LockTransition::*;

        let next = match (self, transition) {
            (None | Owned | Locked, Acquired) => Owned,
            (None | Owned | Locked, Conflicted) => Locked,
            (Owned | Collaborative, Released) => None,
            (Owned | Collaborative | Locked, Expired) => None,
            (Locked | Collaborative, Collaborate) => Collaborative,
            (Locked, Wait) => Locked,
            (Locked, Takeover) => Owned,
            (state, t) => {
                return Err(format!("Invalid lock transition {t:?} from state {state:?}"));
            }
        };
        Ok(next)
    }

    /// Whether the user may edit the resource in this state.
    pub fn is_editable(self) -> bool {
        matches!(self, LockState::Owned | LockState::Collaborative)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn known_resource_types_are_valid() {
        assert!(validate_resource_type(resource_types::CONTACT).is_ok());
        assert!(validate_resource_type(resource_types::TASK).is_ok());
        assert!(validate_resource_type(resource_types::PIPELINE_CARD).is_ok());
        assert!(validate_resource_type(resource_types::MEETING).is_ok());
    }

    #[test]
    fn malformed_resource_types_are_rejected() {
        assert!(validate_resource_type("").is_err());
        assert!(validate_resource_type("Contact").is_err());
        assert!(validate_resource_type("pipeline-card").is_err());
        assert!(validate_resource_type(&"x".repeat(65)).is_err());
    }

    #[test]
    fn blank_resource_id_is_rejected() {
        assert!(validate_resource_id("c1").is_ok());
        assert!(validate_resource_id("").is_err());
        assert!(validate_resource_id("   ").is_err());
        assert!(validate_resource_id(&"9".repeat(129)).is_err());
    }

    #[test]
    fn lock_ttl_bounds() {
        assert!(validate_lock_ttl(DEFAULT_LOCK_TTL_MINS).is_ok());
        assert!(validate_lock_ttl(MAX_LOCK_TTL_MINS).is_ok());
        assert!(validate_lock_ttl(0).unwrap_err().contains("at least"));
        assert!(validate_lock_ttl(241).unwrap_err().contains("at most"));
    }

    #[test]
    fn lease_ttl_only_holds_valid_lengths() {
        assert_eq!(LeaseTtl::default().mins(), DEFAULT_LOCK_TTL_MINS);
        assert_eq!(LeaseTtl::from_mins(90).unwrap().mins(), 90);
        assert_matches!(LeaseTtl::from_mins(0), Err(msg) if msg.contains("at least"));

        let now = chrono::Utc::now();
        let ttl = LeaseTtl::from_mins(5).unwrap();
        assert_eq!(ttl.expiry_from(now) - now, chrono::Duration::minutes(5));
    }

    #[test]
    fn lock_mode_parses_and_serializes_lowercase() {
        assert_eq!("exclusive".parse::<LockMode>(), Ok(LockMode::Exclusive));
        assert_eq!(
            "collaborative".parse::<LockMode>(),
            Ok(LockMode::Collaborative)
        );
        assert!("shared".parse::<LockMode>().is_err());
        assert_eq!(
            serde_json::to_string(&LockMode::Collaborative).unwrap(),
            r#""collaborative""#
        );
    }

    #[test]
    fn resource_key_display_and_validation() {
        let ws = uuid::Uuid::nil();
        let key = ResourceKey::new(ws, "contact", "c1");
        assert_eq!(key.to_string(), format!("{ws}/contact/c1"));
        assert!(key.validate().is_ok());
        assert!(ResourceKey::new(ws, "", "c1").validate().is_err());
    }

    #[test]
    fn lease_expiry_adds_ttl() {
        let now = chrono::Utc::now();
        assert_eq!(lease_expiry(now, 30) - now, chrono::Duration::minutes(30));
    }

    #[test]
    fn happy_path_owned_then_released() {
        let state = LockState::None.apply(LockTransition::Acquired).unwrap();
        assert_eq!(state, LockState::Owned);
        assert!(state.is_editable());
        assert_eq!(
            state.apply(LockTransition::Released).unwrap(),
            LockState::None
        );
    }

    #[test]
    fn conflict_branches() {
        let locked = LockState::None.apply(LockTransition::Conflicted).unwrap();
        assert_eq!(locked, LockState::Locked);
        assert!(!locked.is_editable());

        assert_eq!(locked.apply(LockTransition::Wait).unwrap(), LockState::Locked);
        assert_eq!(
            locked.apply(LockTransition::Collaborate).unwrap(),
            LockState::Collaborative
        );
        assert_eq!(
            locked.apply(LockTransition::Takeover).unwrap(),
            LockState::Owned
        );
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        assert_matches!(
            LockState::None.apply(LockTransition::Wait),
            Err(msg) if msg.contains("Wait")
        );
        assert!(LockState::None.apply(LockTransition::Takeover).is_err());
        assert!(LockState::Owned.apply(LockTransition::Collaborate).is_err());
        assert!(LockState::Collaborative
            .apply(LockTransition::Takeover)
            .is_err());
    }

    #[test]
    fn expiry_always_returns_to_none() {
        for state in [LockState::Owned, LockState::Locked, LockState::Collaborative] {
            assert_eq!(state.apply(LockTransition::Expired).unwrap(), LockState::None);
        }
    }
}
