//! What a user can do after `acquire` reports a conflict.

use std::sync::Arc;

use huddle_core::collaboration::{LockHolder, LockState, LockTransition, ResourceKey};
use huddle_core::roles::can_force_takeover;
use huddle_core::types::UserId;
use huddle_db::models::lock::ResourceLock;
use serde::{Deserialize, Serialize};

use crate::error::{CollabError, CollabResult};
use crate::lock_manager::LockManager;
use crate::session::CollaborationSession;

/// The three ways out of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Become a peer editor on the holder's lock.
    Collaborate,
    /// Stay read-only and retry later.
    Wait,
    /// Forcibly replace the holder. Privileged.
    Takeover,
}

/// Where the caller stands after resolving a conflict.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionOutcome {
    pub state: LockState,
    /// The lock row as it stands after the resolution, if one exists.
    pub lock: Option<ResourceLock>,
    /// The holder removed by a takeover.
    pub previous_holder: Option<UserId>,
}

pub struct ConflictResolver {
    locks: Arc<LockManager>,
    session: Arc<CollaborationSession>,
}

impl ConflictResolver {
    pub fn new(locks: Arc<LockManager>, session: Arc<CollaborationSession>) -> Self {
        Self { locks, session }
    }

    pub async fn resolve(
        &self,
        resolution: Resolution,
        key: &ResourceKey,
        requester: &LockHolder,
        role: &str,
    ) -> CollabResult<ResolutionOutcome> {
        match resolution {
            Resolution::Collaborate => self.collaborate(key, requester).await,
            Resolution::Wait => self.wait(key, requester.user_id).await,
            Resolution::Takeover => self.takeover(key, requester, role).await,
        }
    }

    /// Join the holder's roster.
    pub async fn collaborate(
        &self,
        key: &ResourceKey,
        requester: &LockHolder,
    ) -> CollabResult<ResolutionOutcome> {
        let lock = self
            .session
            .join(key, requester.user_id, &requester.user_name)
            .await?;
        let state = if lock.is_held_by(requester.user_id) {
            LockState::Owned
        } else {
            transition(LockState::Locked, LockTransition::Collaborate)?
        };
        Ok(ResolutionOutcome {
            state,
            lock: Some(lock),
            previous_holder: None,
        })
    }

    /// Mutates nothing. Reports the lock as it currently stands so the
    /// caller can tell whether it has already been freed.
    pub async fn wait(&self, key: &ResourceKey, user_id: UserId) -> CollabResult<ResolutionOutcome> {
        let lock = self.locks.get_lock(key).await?;
        let state = match &lock {
            None => LockState::None,
            Some(row) if row.is_held_by(user_id) => LockState::Owned,
            Some(row) if row.can_edit(user_id) => LockState::Collaborative,
            Some(_) => transition(LockState::Locked, LockTransition::Wait)?,
        };
        Ok(ResolutionOutcome {
            state,
            lock,
            previous_holder: None,
        })
    }

    /// Release the current holder's lock and acquire it for `requester`.
    ///
    /// The release is conditional on the holder observed here, so a holder
    /// change in between is never clobbered; the acquire then reports it
    /// as a fresh conflict.
    pub async fn takeover(
        &self,
        key: &ResourceKey,
        requester: &LockHolder,
        role: &str,
    ) -> CollabResult<ResolutionOutcome> {
        if !can_force_takeover(role) {
            return Err(CollabError::Forbidden(
                "Only super admins may take over a lock".to_string(),
            ));
        }

        let previous_holder = match self.locks.get_lock(key).await? {
            Some(current) if !current.is_held_by(requester.user_id) => {
                self.locks.force_release(key, current.locked_by).await?;
                Some(current.locked_by)
            }
            _ => None,
        };

        let outcome = self.locks.acquire(key, requester).await?;
        let granted = outcome.granted;
        let state = if granted {
            transition(LockState::Locked, LockTransition::Takeover)?
        } else {
            outcome.state()
        };
        let previous_holder = previous_holder.filter(|_| granted);

        if let Some(previous) = previous_holder {
            tracing::warn!(
                workspace_id = %key.workspace_id,
                resource_type = %key.resource_type,
                resource_id = %key.resource_id,
                user_id = %requester.user_id,
                previous_holder = %previous,
                "Lock taken over"
            );
        }

        Ok(ResolutionOutcome {
            state,
            lock: outcome.lock.or(outcome.conflict),
            previous_holder,
        })
    }
}

fn transition(from: LockState, t: LockTransition) -> CollabResult<LockState> {
    from.apply(t).map_err(CollabError::Validation)
}
