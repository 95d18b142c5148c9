//! Repository for the `saved_pipes` table.

use openpipes_core::types::DbId;
use sqlx::PgPool;

use crate::models::saved_pipe::{CreateSavedPipe, SavedPipe, UpdateSavedPipe};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, name, pipe_id, created_at, updated_at";

/// Provides owner-scoped CRUD operations for saved pipes.
pub struct SavedPipeRepo;

impl SavedPipeRepo {
    /// Insert a new saved pipe for `owner_id`, returning the created row.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateSavedPipe,
    ) -> Result<SavedPipe, sqlx::Error> {
        let query = format!(
            "INSERT INTO saved_pipes (owner_id, name, pipe_id)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SavedPipe>(&query)
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.pipe_id)
            .fetch_one(pool)
            .await
    }

    /// Find one of the owner's saved pipes.
    pub async fn find_by_id(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<SavedPipe>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM saved_pipes WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, SavedPipe>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// List the owner's saved pipes by name.
    pub async fn list_by_owner(pool: &PgPool, owner_id: DbId) -> Result<Vec<SavedPipe>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM saved_pipes WHERE owner_id = $1 ORDER BY name, id");
        sqlx::query_as::<_, SavedPipe>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Update a saved pipe. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` belongs to `owner_id`.
    pub async fn update(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
        input: &UpdateSavedPipe,
    ) -> Result<Option<SavedPipe>, sqlx::Error> {
        let query = format!(
            "UPDATE saved_pipes SET
                name = COALESCE($3, name),
                pipe_id = COALESCE($4, pipe_id)
             WHERE id = $1 AND owner_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SavedPipe>(&query)
            .bind(id)
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.pipe_id)
            .fetch_optional(pool)
            .await
    }

    /// Delete one of the owner's saved pipes. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM saved_pipes WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
