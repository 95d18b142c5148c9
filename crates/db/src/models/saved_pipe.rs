//! Saved pipe shortcut model and DTOs.

use openpipes_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `saved_pipes` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SavedPipe {
    pub id: DbId,
    pub owner_id: DbId,
    pub name: String,
    /// Bare Pipefy pipe id.
    pub pipe_id: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a saved pipe.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSavedPipe {
    pub name: String,
    pub pipe_id: String,
}

/// DTO for updating a saved pipe. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSavedPipe {
    pub name: Option<String>,
    pub pipe_id: Option<String>,
}
