//! Pipefy field model: phases, fields, members and pipe identifiers.
//!
//! These are read-only mirrors of remote state. They live in the session
//! context for the duration of one flow and are never persisted.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Field type whose value must be the id of one of the pipe's members.
pub const FIELD_TYPE_ASSIGNEE_SELECT: &str = "assignee_select";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A phase of a pipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
}

/// A field on a pipe's start form or on one of its phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub label: String,
    /// Open-ended Pipefy type tag (`short_text`, `assignee_select`, ...).
    #[serde(rename = "type")]
    pub field_type: String,
}

impl Field {
    /// Whether the field holds a pipe member id.
    pub fn is_assignee(&self) -> bool {
        self.field_type == FIELD_TYPE_ASSIGNEE_SELECT
    }
}

/// A member of a pipe, candidate value for assignee fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Pipe identifiers
// ---------------------------------------------------------------------------

/// Normalize a pipe identifier supplied by a user.
///
/// Users often paste the pipe's browser URL
/// (`https://app.pipefy.com/pipes/301234567`); the GraphQL API only accepts
/// the bare id, which is the last non-empty path segment.
pub fn normalize_pipe_id(raw: &str) -> Result<String, CoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CoreError::Validation("pipe_id must not be empty".into()));
    }

    if !raw.to_ascii_lowercase().starts_with("http") {
        return Ok(raw.to_string());
    }

    let url = Url::parse(raw)
        .map_err(|e| CoreError::Validation(format!("Invalid pipe URL '{raw}': {e}")))?;

    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| CoreError::Validation(format!("Pipe URL '{raw}' does not contain a pipe id")))
}
