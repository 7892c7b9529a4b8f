//! Lease-based resource locks.
//!
//! [`LockManager`] owns no state of its own. Every decision is made by a
//! single conditional write in the [`LockStore`], so concurrent acquires
//! resolve to exactly one winner and a stale heartbeat can never extend a
//! lock that has since been taken over.

use std::sync::Arc;

use huddle_core::collaboration::{LeaseTtl, LockHolder, LockState, ResourceKey};
use huddle_core::types::{Timestamp, UserId, WorkspaceId};
use huddle_db::models::lock::{NewLock, ResourceLock};
use huddle_db::LockStore;
use serde::Serialize;

use crate::clock::{system_clock, Clock};
use crate::error::{CollabError, CollabResult};

/// Attempts made when the conflicting row vanishes between the failed
/// upsert and the read that reports it.
const ACQUIRE_ATTEMPTS: usize = 2;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of [`LockManager::acquire`].
///
/// `granted = false` with no `conflict` means the store could not be
/// reached; callers should fall back to read-only.
#[derive(Debug, Clone, Serialize)]
pub struct AcquireOutcome {
    pub granted: bool,
    pub lock: Option<ResourceLock>,
    pub conflict: Option<ResourceLock>,
}

impl AcquireOutcome {
    fn granted(lock: ResourceLock) -> Self {
        Self {
            granted: true,
            lock: Some(lock),
            conflict: None,
        }
    }

    fn conflict(existing: ResourceLock) -> Self {
        Self {
            granted: false,
            lock: None,
            conflict: Some(existing),
        }
    }

    fn undetermined() -> Self {
        Self {
            granted: false,
            lock: None,
            conflict: None,
        }
    }

    /// The caller's [`LockState`] after this attempt.
    pub fn state(&self) -> LockState {
        if self.granted {
            LockState::Owned
        } else if self.conflict.is_some() {
            LockState::Locked
        } else {
            LockState::None
        }
    }
}

/// Result of [`LockManager::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// The caller held the lock and it is gone.
    Released,
    /// The caller was a collaborator and has left the roster.
    LeftRoster,
    /// Nothing to do: no row, already expired, or held by someone else.
    NotHeld,
}

// ---------------------------------------------------------------------------
// LockManager
// ---------------------------------------------------------------------------

pub struct LockManager {
    store: Arc<dyn LockStore>,
    ttl: LeaseTtl,
    clock: Clock,
}

impl LockManager {
    pub fn new(store: Arc<dyn LockStore>, ttl: LeaseTtl) -> Self {
        Self {
            store,
            ttl,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> LeaseTtl {
        self.ttl
    }

    pub fn now(&self) -> Timestamp {
        (self.clock)()
    }

    /// Try to take an exclusive lease on `key`.
    ///
    /// Expired rows in the workspace are swept first. Succeeds when the key
    /// is free, expired, or already held by the same user (which renews it
    /// and resets it to exclusive). Otherwise reports the current holder's
    /// row as the conflict without mutating anything.
    pub async fn acquire(
        &self,
        key: &ResourceKey,
        holder: &LockHolder,
    ) -> CollabResult<AcquireOutcome> {
        key.validate().map_err(CollabError::Validation)?;

        let now = self.now();
        if let Err(e) = self.store.delete_expired(Some(key.workspace_id), now).await {
            tracing::warn!(error = %e, workspace_id = %key.workspace_id, "Pre-acquire sweep failed");
        }

        let request = NewLock {
            key: key.clone(),
            holder: holder.clone(),
            expires_at: self.ttl.expiry_from(now),
        };

        for _ in 0..ACQUIRE_ATTEMPTS {
            match self.store.try_acquire(&request, now).await {
                Ok(Some(lock)) => {
                    tracing::info!(
                        workspace_id = %key.workspace_id,
                        resource_type = %key.resource_type,
                        resource_id = %key.resource_id,
                        user_id = %holder.user_id,
                        expires_at = %lock.expires_at,
                        "Lock acquired"
                    );
                    return Ok(AcquireOutcome::granted(lock));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Lock store unavailable during acquire");
                    return Ok(AcquireOutcome::undetermined());
                }
            }

            match self.store.find(key).await {
                Ok(Some(existing))
                    if !existing.is_expired(now) && !existing.is_held_by(holder.user_id) =>
                {
                    tracing::info!(
                        workspace_id = %key.workspace_id,
                        resource_type = %key.resource_type,
                        resource_id = %key.resource_id,
                        user_id = %holder.user_id,
                        locked_by = %existing.locked_by,
                        "Lock conflict"
                    );
                    return Ok(AcquireOutcome::conflict(existing));
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Lock store unavailable during acquire");
                    return Ok(AcquireOutcome::undetermined());
                }
            }
        }

        Ok(AcquireOutcome::undetermined())
    }

    /// Give up the caller's stake in `key`.
    ///
    /// The holder's release deletes the row. A collaborator's release takes
    /// them off the roster without demoting the lock. Anything else is a
    /// no-op, never an error.
    pub async fn release(&self, key: &ResourceKey, user_id: UserId) -> CollabResult<ReleaseOutcome> {
        if self.store.release(key, user_id).await? {
            tracing::info!(
                workspace_id = %key.workspace_id,
                resource_type = %key.resource_type,
                resource_id = %key.resource_id,
                user_id = %user_id,
                "Lock released"
            );
            return Ok(ReleaseOutcome::Released);
        }

        let now = self.now();
        let is_collaborator = self
            .store
            .find(key)
            .await?
            .is_some_and(|row| !row.is_expired(now) && row.has_collaborator(user_id));
        if is_collaborator {
            self.store.remove_collaborator(key, user_id, now).await?;
            tracing::info!(key = %key, user_id = %user_id, "Collaborator released lock");
            return Ok(ReleaseOutcome::LeftRoster);
        }

        tracing::debug!(key = %key, user_id = %user_id, "Release of unheld lock ignored");
        Ok(ReleaseOutcome::NotHeld)
    }

    /// Delete `key`'s row if `holder` still holds it. Used by takeover.
    pub(crate) async fn force_release(&self, key: &ResourceKey, holder: UserId) -> CollabResult<bool> {
        Ok(self.store.release(key, holder).await?)
    }

    /// Renew every unexpired lock the user holds in the workspace. Returns
    /// how many were renewed; zero is normal after a takeover or expiry.
    pub async fn extend(&self, workspace_id: WorkspaceId, user_id: UserId) -> CollabResult<u64> {
        let now = self.now();
        let renewed = self
            .store
            .extend_for_user(workspace_id, user_id, now, self.ttl.expiry_from(now))
            .await?;
        tracing::debug!(%workspace_id, %user_id, renewed, "Locks extended");
        Ok(renewed)
    }

    /// Delete expired rows. `None` sweeps every workspace.
    pub async fn cleanup_expired(
        &self,
        workspace_id: Option<WorkspaceId>,
    ) -> CollabResult<Vec<ResourceKey>> {
        let swept = self.store.delete_expired(workspace_id, self.now()).await?;
        if !swept.is_empty() {
            tracing::info!(count = swept.len(), "Expired locks swept");
        }
        Ok(swept)
    }

    /// Drop everything the user holds in the workspace and take them off
    /// every roster. Returns the keys that were freed.
    pub async fn cleanup_for_user(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
    ) -> CollabResult<Vec<ResourceKey>> {
        let freed = self.store.delete_for_user(workspace_id, user_id).await?;
        let rosters = self
            .store
            .remove_collaborator_everywhere(workspace_id, user_id, self.now())
            .await?;
        tracing::info!(
            %workspace_id,
            %user_id,
            freed = freed.len(),
            rosters,
            "Locks cleaned up for departed user"
        );
        Ok(freed)
    }

    /// The unexpired lock on `key`, if any.
    pub async fn get_lock(&self, key: &ResourceKey) -> CollabResult<Option<ResourceLock>> {
        let now = self.now();
        Ok(self.store.find(key).await?.filter(|row| !row.is_expired(now)))
    }

    /// Every unexpired lock in the workspace, newest first.
    pub async fn list_locks(&self, workspace_id: WorkspaceId) -> CollabResult<Vec<ResourceLock>> {
        Ok(self.store.list_active(workspace_id, self.now()).await?)
    }
}
