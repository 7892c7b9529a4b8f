//! Resource lock row model.

use huddle_core::collaboration::{Collaborator, LockHolder, LockMode, ResourceKey};
use huddle_core::types::{DbId, Timestamp, UserId, WorkspaceId};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `resource_locks` table.
///
/// While `expires_at` is in the future the row is the authoritative record
/// of who may edit the resource.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ResourceLock {
    pub id: DbId,
    pub workspace_id: WorkspaceId,
    pub resource_type: String,
    pub resource_id: String,
    pub locked_by: UserId,
    pub locked_by_name: String,
    pub locked_by_contact: Option<String>,
    pub lock_mode: String,
    pub collaborators: Json<Vec<Collaborator>>,
    pub locked_at: Timestamp,
    pub heartbeat_at: Timestamp,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ResourceLock {
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(
            self.workspace_id,
            self.resource_type.clone(),
            self.resource_id.clone(),
        )
    }

    /// Unknown values read back from the table are treated as exclusive.
    pub fn mode(&self) -> LockMode {
        self.lock_mode.parse().unwrap_or(LockMode::Exclusive)
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }

    pub fn is_held_by(&self, user_id: UserId) -> bool {
        self.locked_by == user_id
    }

    pub fn has_collaborator(&self, user_id: UserId) -> bool {
        self.collaborators.iter().any(|c| c.user_id == user_id)
    }

    /// Holder, or rostered collaborator of a collaborative lock.
    pub fn can_edit(&self, user_id: UserId) -> bool {
        self.is_held_by(user_id)
            || (self.mode() == LockMode::Collaborative && self.has_collaborator(user_id))
    }
}

/// Input for an acquire attempt.
#[derive(Debug, Clone)]
pub struct NewLock {
    pub key: ResourceKey,
    pub holder: LockHolder,
    pub expires_at: Timestamp,
}
