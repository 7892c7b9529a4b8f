//! Collaborative co-editing on top of an existing lock.

use std::sync::Arc;

use huddle_core::collaboration::{Collaborator, ResourceKey};
use huddle_core::types::UserId;
use huddle_db::models::lock::ResourceLock;
use huddle_db::LockStore;

use crate::clock::{system_clock, Clock};
use crate::error::{CollabError, CollabResult};

/// Roster operations on collaborative locks.
///
/// Once a lock is collaborative the holder and every rostered user are
/// equal editors. Leaving never demotes the lock back to exclusive; it
/// stays collaborative until released or expired.
pub struct CollaborationSession {
    store: Arc<dyn LockStore>,
    clock: Clock,
}

impl CollaborationSession {
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Join the roster of the unexpired lock on `key`, switching it to
    /// collaborative mode.
    ///
    /// Joining twice does not duplicate the entry, and the holder joining
    /// their own lock changes nothing.
    pub async fn join(
        &self,
        key: &ResourceKey,
        user_id: UserId,
        user_name: &str,
    ) -> CollabResult<ResourceLock> {
        key.validate().map_err(CollabError::Validation)?;
        let now = (self.clock)();
        let collaborator = Collaborator {
            user_id,
            user_name: user_name.to_string(),
            joined_at: now,
        };

        let lock = self
            .store
            .add_collaborator(key, &collaborator, now)
            .await?
            .ok_or_else(|| CollabError::LockNotFound(key.clone()))?;

        tracing::info!(
            workspace_id = %key.workspace_id,
            resource_type = %key.resource_type,
            resource_id = %key.resource_id,
            user_id = %user_id,
            collaborators = lock.collaborators.len(),
            "Joined collaboration"
        );
        Ok(lock)
    }

    /// Leave the roster. Returns the updated lock, or `None` when there is
    /// no unexpired lock on `key` any more.
    pub async fn leave(
        &self,
        key: &ResourceKey,
        user_id: UserId,
    ) -> CollabResult<Option<ResourceLock>> {
        let lock = self
            .store
            .remove_collaborator(key, user_id, (self.clock)())
            .await?;
        tracing::info!(key = %key, user_id = %user_id, "Left collaboration");
        Ok(lock)
    }
}
