//! Saved field-selection template model and DTOs.

use openpipes_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `saved_templates` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SavedTemplate {
    pub id: DbId,
    pub owner_id: DbId,
    pub name: String,
    pub pipe_id: String,
    pub phase_id: String,
    pub field_ids: Vec<String>,
    pub default_assignee_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a saved template.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSavedTemplate {
    pub name: String,
    pub pipe_id: String,
    pub phase_id: String,
    pub field_ids: Vec<String>,
    pub default_assignee_id: Option<String>,
}

/// DTO for updating a saved template. All fields are optional; a `None`
/// keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSavedTemplate {
    pub name: Option<String>,
    pub pipe_id: Option<String>,
    pub phase_id: Option<String>,
    pub field_ids: Option<Vec<String>>,
    pub default_assignee_id: Option<String>,
}
