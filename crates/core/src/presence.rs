//! Presence records and staleness rules.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Timestamp, UserId};

/// A presence record not refreshed for this long is stale: two missed
/// heartbeats plus ten seconds of slack.
pub const PRESENCE_STALE_TIMEOUT_SECS: i64 = 60;

/// Colours handed out to avatars. Indexed by a hash of the user id so a
/// user keeps the same colour on every client.
pub const AVATAR_PALETTE: &[&str] = &[
    "#ef4444", "#f97316", "#f59e0b", "#84cc16", "#10b981", "#06b6d4", "#3b82f6", "#6366f1",
    "#8b5cf6", "#d946ef", "#ec4899", "#14b8a6",
];

/// Deterministic avatar colour for a user.
pub fn avatar_color(user_id: UserId) -> &'static str {
    let digest = Sha256::digest(user_id.as_bytes());
    let idx = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize;
    AVATAR_PALETTE[idx % AVATAR_PALETTE.len()]
}

/// The resource a user currently has open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_type: String,
    pub resource_id: String,
    pub name: Option<String>,
}

/// One connected session's presence in a workspace. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUser {
    pub user_id: UserId,
    pub user_name: String,
    pub avatar_color: String,
    pub page_path: String,
    pub resource: Option<ResourceRef>,
    pub online_at: Timestamp,
    pub last_seen: Timestamp,
}

impl PresenceUser {
    pub fn new(user_id: UserId, user_name: impl Into<String>, now: Timestamp) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            avatar_color: avatar_color(user_id).to_string(),
            page_path: "/".to_string(),
            resource: None,
            online_at: now,
            last_seen: now,
        }
    }

    pub fn on_page(mut self, page_path: impl Into<String>) -> Self {
        self.page_path = page_path.into();
        self
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.last_seen = now;
    }

    pub fn is_stale(&self, now: Timestamp, timeout_secs: i64) -> bool {
        now - self.last_seen > chrono::Duration::seconds(timeout_secs)
    }

    pub fn is_on_page(&self, page_path: &str) -> bool {
        self.page_path == page_path
    }

    pub fn is_on_resource(&self, resource_type: &str, resource_id: &str) -> bool {
        self.resource
            .as_ref()
            .is_some_and(|r| r.resource_type == resource_type && r.resource_id == resource_id)
    }
}
