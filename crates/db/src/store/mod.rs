//! Storage contracts the coordinator depends on.
//!
//! [`LockStore`] covers the one durable table (resource locks) and
//! [`AuditStore`] the two append-only logs. Each has a Postgres
//! implementation delegating to the repositories and an in-memory
//! implementation for tests and single-node development.

mod memory;
mod postgres;

use async_trait::async_trait;
use huddle_core::collaboration::{Collaborator, ResourceKey};
use huddle_core::types::{Timestamp, UserId, WorkspaceId};

use crate::models::activity::{ActivityLog, ActivityQuery, CreateActivityLog};
use crate::models::change_history::{ChangeHistory, ChangeHistoryQuery, CreateChangeHistory};
use crate::models::lock::{NewLock, ResourceLock};

pub use memory::{MemoryAuditStore, MemoryLockStore};
pub use postgres::{PgAuditStore, PgLockStore};

/// Failure talking to the durable store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable lease table. Every mutating method is conditional on the row's
/// current holder and expiry, evaluated atomically by the store.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// The row for `key`, expired or not.
    async fn find(&self, key: &ResourceKey) -> StoreResult<Option<ResourceLock>>;

    /// Upsert a fresh exclusive row when the key is free, expired, or held
    /// by the same user. `None` means another user holds it.
    async fn try_acquire(&self, lock: &NewLock, now: Timestamp)
        -> StoreResult<Option<ResourceLock>>;

    /// Delete the row only if `holder` still holds it.
    async fn release(&self, key: &ResourceKey, holder: UserId) -> StoreResult<bool>;

    /// Renew every unexpired lock held by the user. Returns rows renewed.
    async fn extend_for_user(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> StoreResult<u64>;

    /// Roster a collaborator on an unexpired lock and mark it
    /// collaborative. `None` when no unexpired row exists.
    async fn add_collaborator(
        &self,
        key: &ResourceKey,
        collaborator: &Collaborator,
        now: Timestamp,
    ) -> StoreResult<Option<ResourceLock>>;

    /// Remove a user from an unexpired lock's roster.
    async fn remove_collaborator(
        &self,
        key: &ResourceKey,
        user_id: UserId,
        now: Timestamp,
    ) -> StoreResult<Option<ResourceLock>>;

    /// Remove a user from every roster in the workspace.
    async fn remove_collaborator_everywhere(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
        now: Timestamp,
    ) -> StoreResult<u64>;

    /// Delete expired rows (all workspaces when `workspace_id` is `None`).
    async fn delete_expired(
        &self,
        workspace_id: Option<WorkspaceId>,
        now: Timestamp,
    ) -> StoreResult<Vec<ResourceKey>>;

    /// Delete every row the user holds in the workspace.
    async fn delete_for_user(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
    ) -> StoreResult<Vec<ResourceKey>>;

    /// Unexpired rows in a workspace, newest first.
    async fn list_active(
        &self,
        workspace_id: WorkspaceId,
        now: Timestamp,
    ) -> StoreResult<Vec<ResourceLock>>;
}

/// Append-only sinks for the activity log and field change history.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_activity(&self, entry: &CreateActivityLog) -> StoreResult<ActivityLog>;

    async fn insert_change(&self, entry: &CreateChangeHistory) -> StoreResult<ChangeHistory>;

    async fn list_activity(&self, query: &ActivityQuery) -> StoreResult<Vec<ActivityLog>>;

    async fn list_changes(&self, query: &ChangeHistoryQuery) -> StoreResult<Vec<ChangeHistory>>;
}
