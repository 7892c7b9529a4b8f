//! Repository for the `resource_locks` table.
//!
//! Every mutation is a single conditional statement keyed on the unique
//! `(workspace_id, resource_type, resource_id)` constraint, so concurrent
//! acquires, heartbeats, roster joins and takeovers never overwrite each
//! other silently.

use huddle_core::collaboration::{Collaborator, ResourceKey};
use huddle_core::types::{Timestamp, UserId, WorkspaceId};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::lock::{NewLock, ResourceLock};

/// Column list for `resource_locks` queries.
const COLUMNS: &str = "id, workspace_id, resource_type, resource_id, locked_by, \
                       locked_by_name, locked_by_contact, lock_mode, collaborators, \
                       locked_at, heartbeat_at, expires_at, created_at, updated_at";

/// Provides lease operations over resource locks.
pub struct ResourceLockRepo;

impl ResourceLockRepo {
    /// Fetch the row for a key, expired or not.
    pub async fn find(pool: &PgPool, key: &ResourceKey) -> Result<Option<ResourceLock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM resource_locks \
             WHERE workspace_id = $1 AND resource_type = $2 AND resource_id = $3"
        );
        sqlx::query_as::<_, ResourceLock>(&query)
            .bind(key.workspace_id)
            .bind(&key.resource_type)
            .bind(&key.resource_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a fresh exclusive lock, or overwrite the existing row when it
    /// has expired or is already held by the same user.
    ///
    /// Returns `None` when another user holds an unexpired lock. Under a
    /// race the first committed writer wins.
    pub async fn try_acquire(
        pool: &PgPool,
        lock: &NewLock,
        now: Timestamp,
    ) -> Result<Option<ResourceLock>, sqlx::Error> {
        let query = format!(
            "INSERT INTO resource_locks \
                 (workspace_id, resource_type, resource_id, locked_by, locked_by_name, \
                  locked_by_contact, lock_mode, collaborators, locked_at, heartbeat_at, \
                  expires_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'exclusive', '[]'::jsonb, $7, $7, $8, $7, $7) \
             ON CONFLICT ON CONSTRAINT uq_resource_locks_key DO UPDATE SET \
                 locked_by = EXCLUDED.locked_by, \
                 locked_by_name = EXCLUDED.locked_by_name, \
                 locked_by_contact = EXCLUDED.locked_by_contact, \
                 lock_mode = 'exclusive', \
                 collaborators = '[]'::jsonb, \
                 locked_at = EXCLUDED.locked_at, \
                 heartbeat_at = EXCLUDED.heartbeat_at, \
                 expires_at = EXCLUDED.expires_at, \
                 updated_at = EXCLUDED.updated_at \
             WHERE resource_locks.expires_at <= EXCLUDED.locked_at \
                OR resource_locks.locked_by = EXCLUDED.locked_by \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ResourceLock>(&query)
            .bind(lock.key.workspace_id)
            .bind(&lock.key.resource_type)
            .bind(&lock.key.resource_id)
            .bind(lock.holder.user_id)
            .bind(&lock.holder.user_name)
            .bind(&lock.holder.contact)
            .bind(now)
            .bind(lock.expires_at)
            .fetch_optional(pool)
            .await
    }

    /// Delete the row if `holder` still holds it. Returns `true` if deleted.
    pub async fn release(
        pool: &PgPool,
        key: &ResourceKey,
        holder: UserId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM resource_locks \
             WHERE workspace_id = $1 AND resource_type = $2 AND resource_id = $3 \
               AND locked_by = $4",
        )
        .bind(key.workspace_id)
        .bind(&key.resource_type)
        .bind(&key.resource_id)
        .bind(holder)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Renew every unexpired lock `user_id` holds in the workspace, via the
    /// `extend_lock` SQL function.
    pub async fn extend_for_user(
        pool: &PgPool,
        workspace_id: WorkspaceId,
        user_id: UserId,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let renewed: i32 = sqlx::query_scalar("SELECT extend_lock($1, $2, $3, $4)")
            .bind(workspace_id)
            .bind(user_id)
            .bind(now)
            .bind(expires_at)
            .fetch_one(pool)
            .await?;
        Ok(u64::try_from(renewed).unwrap_or(0))
    }

    /// Switch an unexpired lock to collaborative mode and roster the user.
    ///
    /// The holder joining their own lock is a no-op, and a user already on
    /// the roster is not added twice.
    pub async fn add_collaborator(
        pool: &PgPool,
        key: &ResourceKey,
        collaborator: &Collaborator,
        now: Timestamp,
    ) -> Result<Option<ResourceLock>, sqlx::Error> {
        let query = format!(
            "UPDATE resource_locks SET \
                 lock_mode = CASE WHEN locked_by = $4 THEN lock_mode ELSE 'collaborative' END, \
                 collaborators = CASE \
                     WHEN locked_by = $4 \
                       OR collaborators @> jsonb_build_array(jsonb_build_object('user_id', $4::text)) \
                     THEN collaborators \
                     ELSE collaborators || jsonb_build_array($5::jsonb) \
                 END, \
                 updated_at = $6 \
             WHERE workspace_id = $1 AND resource_type = $2 AND resource_id = $3 \
               AND expires_at > $6 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ResourceLock>(&query)
            .bind(key.workspace_id)
            .bind(&key.resource_type)
            .bind(&key.resource_id)
            .bind(collaborator.user_id)
            .bind(Json(collaborator))
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Drop a user from one lock's roster. The lock keeps its mode.
    pub async fn remove_collaborator(
        pool: &PgPool,
        key: &ResourceKey,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<Option<ResourceLock>, sqlx::Error> {
        let query = format!(
            "UPDATE resource_locks SET \
                 collaborators = COALESCE( \
                     (SELECT jsonb_agg(c) FROM jsonb_array_elements(collaborators) AS c \
                      WHERE c->>'user_id' <> $4::text), \
                     '[]'::jsonb), \
                 updated_at = $5 \
             WHERE workspace_id = $1 AND resource_type = $2 AND resource_id = $3 \
               AND expires_at > $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ResourceLock>(&query)
            .bind(key.workspace_id)
            .bind(&key.resource_type)
            .bind(&key.resource_id)
            .bind(user_id)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Drop a user from every roster in the workspace.
    pub async fn remove_collaborator_everywhere(
        pool: &PgPool,
        workspace_id: WorkspaceId,
        user_id: UserId,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE resource_locks SET \
                 collaborators = COALESCE( \
                     (SELECT jsonb_agg(c) FROM jsonb_array_elements(collaborators) AS c \
                      WHERE c->>'user_id' <> $2::text), \
                     '[]'::jsonb), \
                 updated_at = $3 \
             WHERE workspace_id = $1 \
               AND collaborators @> jsonb_build_array(jsonb_build_object('user_id', $2::text))",
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete expired rows, optionally limited to one workspace, via the
    /// `cleanup_expired_locks` SQL function. Returns the keys that were
    /// swept.
    pub async fn delete_expired(
        pool: &PgPool,
        workspace_id: Option<WorkspaceId>,
        now: Timestamp,
    ) -> Result<Vec<ResourceKey>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (WorkspaceId, String, String)>(
            "SELECT workspace_id, resource_type, resource_id \
             FROM cleanup_expired_locks($1, $2::uuid)",
        )
        .bind(now)
        .bind(workspace_id)
        .fetch_all(pool)
        .await?;
        if !rows.is_empty() {
            tracing::debug!(swept = rows.len(), ?workspace_id, "Expired lock rows deleted");
        }
        Ok(into_keys(rows))
    }

    /// Delete every lock `user_id` holds in the workspace.
    pub async fn delete_for_user(
        pool: &PgPool,
        workspace_id: WorkspaceId,
        user_id: UserId,
    ) -> Result<Vec<ResourceKey>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (WorkspaceId, String, String)>(
            "DELETE FROM resource_locks \
             WHERE workspace_id = $1 AND locked_by = $2 \
             RETURNING workspace_id, resource_type, resource_id",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(into_keys(rows))
    }

    /// All unexpired locks in a workspace, newest first.
    pub async fn list_active(
        pool: &PgPool,
        workspace_id: WorkspaceId,
        now: Timestamp,
    ) -> Result<Vec<ResourceLock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM resource_locks \
             WHERE workspace_id = $1 AND expires_at > $2 \
             ORDER BY locked_at DESC"
        );
        sqlx::query_as::<_, ResourceLock>(&query)
            .bind(workspace_id)
            .bind(now)
            .fetch_all(pool)
            .await
    }
}

fn into_keys(rows: Vec<(WorkspaceId, String, String)>) -> Vec<ResourceKey> {
    rows.into_iter()
        .map(|(ws, resource_type, resource_id)| ResourceKey::new(ws, resource_type, resource_id))
        .collect()
}
