use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use huddle_core::audit::clamp_page_size;
use huddle_core::collaboration::{Collaborator, LockMode, ResourceKey};
use huddle_core::types::{DbId, Timestamp, UserId, WorkspaceId};
use sqlx::types::Json;
use tokio::sync::Mutex;

use super::{AuditStore, LockStore, StoreError, StoreResult};
use crate::models::activity::{ActivityLog, ActivityQuery, CreateActivityLog};
use crate::models::change_history::{ChangeHistory, ChangeHistoryQuery, CreateChangeHistory};
use crate::models::lock::{NewLock, ResourceLock};

/// Switch shared by the in-memory stores to simulate a storage outage.
#[derive(Debug, Default)]
struct Outage(AtomicBool);

impl Outage {
    fn set(&self, down: bool) {
        self.0.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.0.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryLockStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LockTable {
    rows: HashMap<ResourceKey, ResourceLock>,
    next_id: DbId,
}

/// [`LockStore`] held in process memory. A single mutex makes every
/// operation atomic, matching the unique-key semantics of the SQL table.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    table: Mutex<LockTable>,
    outage: Outage,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While `true`, every call fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, down: bool) {
        self.outage.set(down);
    }

    /// Number of rows, expired ones included.
    pub async fn row_count(&self) -> usize {
        self.table.lock().await.rows.len()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn find(&self, key: &ResourceKey) -> StoreResult<Option<ResourceLock>> {
        self.outage.check()?;
        Ok(self.table.lock().await.rows.get(key).cloned())
    }

    async fn try_acquire(
        &self,
        lock: &NewLock,
        now: Timestamp,
    ) -> StoreResult<Option<ResourceLock>> {
        self.outage.check()?;
        let mut table = self.table.lock().await;

        let existing = table.rows.get(&lock.key).map(|row| {
            let contested = !row.is_expired(now) && !row.is_held_by(lock.holder.user_id);
            (row.id, row.created_at, contested)
        });
        let (id, created_at) = match existing {
            Some((_, _, true)) => return Ok(None),
            Some((id, created_at, false)) => (id, created_at),
            None => {
                table.next_id += 1;
                (table.next_id, now)
            }
        };

        let row = ResourceLock {
            id,
            workspace_id: lock.key.workspace_id,
            resource_type: lock.key.resource_type.clone(),
            resource_id: lock.key.resource_id.clone(),
            locked_by: lock.holder.user_id,
            locked_by_name: lock.holder.user_name.clone(),
            locked_by_contact: lock.holder.contact.clone(),
            lock_mode: LockMode::Exclusive.as_str().to_string(),
            collaborators: Json(Vec::new()),
            locked_at: now,
            heartbeat_at: now,
            expires_at: lock.expires_at,
            created_at,
            updated_at: now,
        };
        table.rows.insert(lock.key.clone(), row.clone());
        Ok(Some(row))
    }

    async fn release(&self, key: &ResourceKey, holder: UserId) -> StoreResult<bool> {
        self.outage.check()?;
        let mut table = self.table.lock().await;
        match table.rows.get(key) {
            Some(row) if row.is_held_by(holder) => {
                table.rows.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn extend_for_user(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> StoreResult<u64> {
        self.outage.check()?;
        let mut table = self.table.lock().await;
        let mut renewed = 0;
        for row in table.rows.values_mut() {
            if row.workspace_id == workspace_id && row.is_held_by(user_id) && !row.is_expired(now)
            {
                row.heartbeat_at = now;
                row.expires_at = expires_at;
                row.updated_at = now;
                renewed += 1;
            }
        }
        Ok(renewed)
    }

    async fn add_collaborator(
        &self,
        key: &ResourceKey,
        collaborator: &Collaborator,
        now: Timestamp,
    ) -> StoreResult<Option<ResourceLock>> {
        self.outage.check()?;
        let mut table = self.table.lock().await;
        let Some(row) = table.rows.get_mut(key).filter(|r| !r.is_expired(now)) else {
            return Ok(None);
        };

        if !row.is_held_by(collaborator.user_id) {
            row.lock_mode = LockMode::Collaborative.as_str().to_string();
            if !row.has_collaborator(collaborator.user_id) {
                row.collaborators.push(collaborator.clone());
            }
        }
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn remove_collaborator(
        &self,
        key: &ResourceKey,
        user_id: UserId,
        now: Timestamp,
    ) -> StoreResult<Option<ResourceLock>> {
        self.outage.check()?;
        let mut table = self.table.lock().await;
        let Some(row) = table.rows.get_mut(key).filter(|r| !r.is_expired(now)) else {
            return Ok(None);
        };
        row.collaborators.retain(|c| c.user_id != user_id);
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn remove_collaborator_everywhere(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
        now: Timestamp,
    ) -> StoreResult<u64> {
        self.outage.check()?;
        let mut table = self.table.lock().await;
        let mut touched = 0;
        for row in table.rows.values_mut() {
            if row.workspace_id == workspace_id && row.has_collaborator(user_id) {
                row.collaborators.retain(|c| c.user_id != user_id);
                row.updated_at = now;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn delete_expired(
        &self,
        workspace_id: Option<WorkspaceId>,
        now: Timestamp,
    ) -> StoreResult<Vec<ResourceKey>> {
        self.outage.check()?;
        let mut table = self.table.lock().await;
        let swept: Vec<ResourceKey> = table
            .rows
            .values()
            .filter(|r| r.is_expired(now) && workspace_id.map_or(true, |ws| r.workspace_id == ws))
            .map(ResourceLock::key)
            .collect();
        for key in &swept {
            table.rows.remove(key);
        }
        Ok(swept)
    }

    async fn delete_for_user(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
    ) -> StoreResult<Vec<ResourceKey>> {
        self.outage.check()?;
        let mut table = self.table.lock().await;
        let held: Vec<ResourceKey> = table
            .rows
            .values()
            .filter(|r| r.workspace_id == workspace_id && r.is_held_by(user_id))
            .map(ResourceLock::key)
            .collect();
        for key in &held {
            table.rows.remove(key);
        }
        Ok(held)
    }

    async fn list_active(
        &self,
        workspace_id: WorkspaceId,
        now: Timestamp,
    ) -> StoreResult<Vec<ResourceLock>> {
        self.outage.check()?;
        let table = self.table.lock().await;
        let mut rows: Vec<ResourceLock> = table
            .rows
            .values()
            .filter(|r| r.workspace_id == workspace_id && !r.is_expired(now))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.locked_at.cmp(&a.locked_at));
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// MemoryAuditStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct AuditTables {
    activity: Vec<ActivityLog>,
    changes: Vec<ChangeHistory>,
}

/// [`AuditStore`] held in process memory.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    tables: Mutex<AuditTables>,
    outage: Outage,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While `true`, every call fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, down: bool) {
        self.outage.set(down);
    }

    pub async fn activity_count(&self) -> usize {
        self.tables.lock().await.activity.len()
    }

    pub async fn change_count(&self) -> usize {
        self.tables.lock().await.changes.len()
    }
}

fn page<T: Clone>(rows: Vec<&T>, limit: Option<i64>, offset: Option<i64>) -> Vec<T> {
    let offset = offset.unwrap_or(0).max(0) as usize;
    let limit = clamp_page_size(limit) as usize;
    rows.into_iter().skip(offset).take(limit).cloned().collect()
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert_activity(&self, entry: &CreateActivityLog) -> StoreResult<ActivityLog> {
        self.outage.check()?;
        let mut tables = self.tables.lock().await;
        let row = ActivityLog {
            id: tables.activity.len() as DbId + 1,
            workspace_id: entry.workspace_id,
            user_id: entry.user_id,
            user_name: entry.user_name.clone(),
            session_id: entry.session_id.clone(),
            action: entry.action.clone(),
            resource_type: entry.resource_type.clone(),
            resource_id: entry.resource_id.clone(),
            resource_name: entry.resource_name.clone(),
            details: entry.details.clone(),
            page_path: entry.page_path.clone(),
            created_at: entry.created_at,
        };
        tables.activity.push(row.clone());
        Ok(row)
    }

    async fn insert_change(&self, entry: &CreateChangeHistory) -> StoreResult<ChangeHistory> {
        self.outage.check()?;
        let mut tables = self.tables.lock().await;
        let row = ChangeHistory {
            id: tables.changes.len() as DbId + 1,
            workspace_id: entry.workspace_id,
            user_id: entry.user_id,
            user_name: entry.user_name.clone(),
            resource_type: entry.resource_type.clone(),
            resource_id: entry.resource_id.clone(),
            field_name: entry.field_name.clone(),
            old_value: entry.old_value.clone(),
            new_value: entry.new_value.clone(),
            created_at: entry.created_at,
        };
        tables.changes.push(row.clone());
        Ok(row)
    }

    async fn list_activity(&self, query: &ActivityQuery) -> StoreResult<Vec<ActivityLog>> {
        self.outage.check()?;
        let tables = self.tables.lock().await;
        let mut rows: Vec<&ActivityLog> =
            tables.activity.iter().filter(|r| query.matches(r)).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page(rows, query.limit, query.offset))
    }

    async fn list_changes(&self, query: &ChangeHistoryQuery) -> StoreResult<Vec<ChangeHistory>> {
        self.outage.check()?;
        let tables = self.tables.lock().await;
        let mut rows: Vec<&ChangeHistory> =
            tables.changes.iter().filter(|r| query.matches(r)).collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page(rows, query.limit, query.offset))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
