use async_trait::async_trait;
use huddle_core::collaboration::{Collaborator, ResourceKey};
use huddle_core::types::{Timestamp, UserId, WorkspaceId};

use super::{AuditStore, LockStore, StoreResult};
use crate::models::activity::{ActivityLog, ActivityQuery, CreateActivityLog};
use crate::models::change_history::{ChangeHistory, ChangeHistoryQuery, CreateChangeHistory};
use crate::models::lock::{NewLock, ResourceLock};
use crate::repositories::{ActivityLogRepo, ChangeHistoryRepo, ResourceLockRepo};
use crate::DbPool;

/// [`LockStore`] backed by the `resource_locks` table.
#[derive(Clone)]
pub struct PgLockStore {
    pool: DbPool,
}

impl PgLockStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockStore for PgLockStore {
    async fn find(&self, key: &ResourceKey) -> StoreResult<Option<ResourceLock>> {
        Ok(ResourceLockRepo::find(&self.pool, key).await?)
    }

    async fn try_acquire(
        &self,
        lock: &NewLock,
        now: Timestamp,
    ) -> StoreResult<Option<ResourceLock>> {
        Ok(ResourceLockRepo::try_acquire(&self.pool, lock, now).await?)
    }

    async fn release(&self, key: &ResourceKey, holder: UserId) -> StoreResult<bool> {
        Ok(ResourceLockRepo::release(&self.pool, key, holder).await?)
    }

    async fn extend_for_user(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> StoreResult<u64> {
        Ok(
            ResourceLockRepo::extend_for_user(&self.pool, workspace_id, user_id, now, expires_at)
                .await?,
        )
    }

    async fn add_collaborator(
        &self,
        key: &ResourceKey,
        collaborator: &Collaborator,
        now: Timestamp,
    ) -> StoreResult<Option<ResourceLock>> {
        Ok(ResourceLockRepo::add_collaborator(&self.pool, key, collaborator, now).await?)
    }

    async fn remove_collaborator(
        &self,
        key: &ResourceKey,
        user_id: UserId,
        now: Timestamp,
    ) -> StoreResult<Option<ResourceLock>> {
        Ok(ResourceLockRepo::remove_collaborator(&self.pool, key, user_id, now).await?)
    }

    async fn remove_collaborator_everywhere(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
        now: Timestamp,
    ) -> StoreResult<u64> {
        Ok(
            ResourceLockRepo::remove_collaborator_everywhere(&self.pool, workspace_id, user_id, now)
                .await?,
        )
    }

    async fn delete_expired(
        &self,
        workspace_id: Option<WorkspaceId>,
        now: Timestamp,
    ) -> StoreResult<Vec<ResourceKey>> {
        Ok(ResourceLockRepo::delete_expired(&self.pool, workspace_id, now).await?)
    }

    async fn delete_for_user(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
    ) -> StoreResult<Vec<ResourceKey>> {
        Ok(ResourceLockRepo::delete_for_user(&self.pool, workspace_id, user_id).await?)
    }

    async fn list_active(
        &self,
        workspace_id: WorkspaceId,
        now: Timestamp,
    ) -> StoreResult<Vec<ResourceLock>> {
        Ok(ResourceLockRepo::list_active(&self.pool, workspace_id, now).await?)
    }
}

/// [`AuditStore`] backed by `activity_logs` and `change_history`.
#[derive(Clone)]
pub struct PgAuditStore {
    pool: DbPool,
}

impl PgAuditStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn insert_activity(&self, entry: &CreateActivityLog) -> StoreResult<ActivityLog> {
        Ok(ActivityLogRepo::insert(&self.pool, entry).await?)
    }

    async fn insert_change(&self, entry: &CreateChangeHistory) -> StoreResult<ChangeHistory> {
        Ok(ChangeHistoryRepo::insert(&self.pool, entry).await?)
    }

    async fn list_activity(&self, query: &ActivityQuery) -> StoreResult<Vec<ActivityLog>> {
        Ok(ActivityLogRepo::query(&self.pool, query).await?)
    }

    async fn list_changes(&self, query: &ChangeHistoryQuery) -> StoreResult<Vec<ChangeHistory>> {
        Ok(ChangeHistoryRepo::list_for_resource(&self.pool, query).await?)
    }
}
