//! Repository for the `saved_templates` table.

use openpipes_core::types::DbId;
use sqlx::PgPool;

use crate::models::saved_template::{CreateSavedTemplate, SavedTemplate, UpdateSavedTemplate};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, name, pipe_id, phase_id, field_ids, default_assignee_id, \
                       created_at, updated_at";

/// Provides owner-scoped CRUD operations for saved templates.
pub struct SavedTemplateRepo;

impl SavedTemplateRepo {
    /// Insert a new saved template for `owner_id`, returning the created row.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateSavedTemplate,
    ) -> Result<SavedTemplate, sqlx::Error> {
        let query = format!(
            "INSERT INTO saved_templates
                (owner_id, name, pipe_id, phase_id, field_ids, default_assignee_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SavedTemplate>(&query)
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.pipe_id)
            .bind(&input.phase_id)
            .bind(&input.field_ids)
            .bind(&input.default_assignee_id)
            .fetch_one(pool)
            .await
    }

    /// Find one of the owner's saved templates.
    pub async fn find_by_id(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<SavedTemplate>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM saved_templates WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, SavedTemplate>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// List the owner's saved templates by name.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<SavedTemplate>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM saved_templates WHERE owner_id = $1 ORDER BY name, id");
        sqlx::query_as::<_, SavedTemplate>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Update a saved template. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` belongs to `owner_id`.
    pub async fn update(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
        input: &UpdateSavedTemplate,
    ) -> Result<Option<SavedTemplate>, sqlx::Error> {
        let query = format!(
            "UPDATE saved_templates SET
                name = COALESCE($3, name),
                pipe_id = COALESCE($4, pipe_id),
                phase_id = COALESCE($5, phase_id),
                field_ids = COALESCE($6, field_ids),
                default_assignee_id = COALESCE($7, default_assignee_id)
             WHERE id = $1 AND owner_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SavedTemplate>(&query)
            .bind(id)
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.pipe_id)
            .bind(&input.phase_id)
            .bind(&input.field_ids)
            .bind(&input.default_assignee_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete one of the owner's saved templates. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM saved_templates WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
