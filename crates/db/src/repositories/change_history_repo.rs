//! Repository for the append-only `change_history` table.

use huddle_core::audit::clamp_page_size;
use sqlx::PgPool;

use crate::models::change_history::{ChangeHistory, ChangeHistoryQuery, CreateChangeHistory};

/// Column list for `change_history` SELECT queries.
const COLUMNS: &str = "\
    id, workspace_id, user_id, user_name, resource_type, resource_id, \
    field_name, old_value, new_value, created_at";

/// Provides insert and query operations for field change history.
pub struct ChangeHistoryRepo;

impl ChangeHistoryRepo {
    pub async fn insert(
        pool: &PgPool,
        entry: &CreateChangeHistory,
    ) -> Result<ChangeHistory, sqlx::Error> {
        let query = format!(
            "INSERT INTO change_history \
                 (workspace_id, user_id, user_name, resource_type, resource_id, \
                  field_name, old_value, new_value, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChangeHistory>(&query)
            .bind(entry.workspace_id)
            .bind(entry.user_id)
            .bind(&entry.user_name)
            .bind(&entry.resource_type)
            .bind(&entry.resource_id)
            .bind(&entry.field_name)
            .bind(&entry.old_value)
            .bind(&entry.new_value)
            .bind(entry.created_at)
            .fetch_one(pool)
            .await
    }

    /// Newest-first change trail for one resource.
    pub async fn list_for_resource(
        pool: &PgPool,
        params: &ChangeHistoryQuery,
    ) -> Result<Vec<ChangeHistory>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM change_history \
             WHERE workspace_id = $1 AND resource_type = $2 AND resource_id = $3 \
               AND ($4::text IS NULL OR field_name = $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, ChangeHistory>(&query)
            .bind(params.workspace_id)
            .bind(&params.resource_type)
            .bind(&params.resource_id)
            .bind(&params.field_name)
            .bind(clamp_page_size(params.limit))
            .bind(params.offset.unwrap_or(0).max(0))
            .fetch_all(pool)
            .await
    }
}
