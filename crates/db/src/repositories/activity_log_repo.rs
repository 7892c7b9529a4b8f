//! Repository for the append-only `activity_logs` table.

use huddle_core::audit::clamp_page_size;
use sqlx::PgPool;

use crate::models::activity::{ActivityLog, ActivityQuery, CreateActivityLog};

/// Column list for `activity_logs` SELECT queries.
const COLUMNS: &str = "\
    id, workspace_id, user_id, user_name, session_id, action, \
    resource_type, resource_id, resource_name, details, page_path, created_at";

/// Provides insert and query operations for the activity log.
pub struct ActivityLogRepo;

impl ActivityLogRepo {
    pub async fn insert(
        pool: &PgPool,
        entry: &CreateActivityLog,
    ) -> Result<ActivityLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO activity_logs \
                 (workspace_id, user_id, user_name, session_id, action, resource_type, \
                  resource_id, resource_name, details, page_path, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ActivityLog>(&query)
            .bind(entry.workspace_id)
            .bind(entry.user_id)
            .bind(&entry.user_name)
            .bind(&entry.session_id)
            .bind(&entry.action)
            .bind(&entry.resource_type)
            .bind(&entry.resource_id)
            .bind(&entry.resource_name)
            .bind(&entry.details)
            .bind(&entry.page_path)
            .bind(entry.created_at)
            .fetch_one(pool)
            .await
    }

    /// Newest-first page of a workspace's activity, filtered by `params`.
    pub async fn query(
        pool: &PgPool,
        params: &ActivityQuery,
    ) -> Result<Vec<ActivityLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM activity_logs \
             WHERE workspace_id = $1 \
               AND ($2::uuid IS NULL OR user_id = $2) \
               AND ($3::text IS NULL OR action = $3) \
               AND ($4::text IS NULL OR resource_type = $4) \
               AND ($5::text IS NULL OR resource_id = $5) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $6 OFFSET $7"
        );
        sqlx::query_as::<_, ActivityLog>(&query)
            .bind(params.workspace_id)
            .bind(params.user_id)
            .bind(&params.action)
            .bind(&params.resource_type)
            .bind(&params.resource_id)
            .bind(clamp_page_size(params.limit))
            .bind(params.offset.unwrap_or(0).max(0))
            .fetch_all(pool)
            .await
    }
}
