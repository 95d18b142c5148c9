//! Read-side catalog of a pipe: phases, fields and members.
//!
//! Every listing failure is wrapped with the listing's name
//! ("Error fetching pipe phases: ...") and nothing partial is returned.

use std::sync::Arc;

use openpipes_core::pipe::{normalize_pipe_id, Field, Member, Phase};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::GraphqlTransport;
use crate::error::PipefyError;
use crate::queries::{GET_PHASE_FIELDS, GET_PIPE_FIELDS, GET_PIPE_MEMBERS, GET_PIPE_PHASES};

/// Fetches catalog listings through a [`GraphqlTransport`].
#[derive(Clone)]
pub struct Catalog {
    transport: Arc<dyn GraphqlTransport>,
}

impl Catalog {
    pub fn new(transport: Arc<dyn GraphqlTransport>) -> Self {
        Self { transport }
    }

    /// Phases of a pipe. `pipe_id` may be a bare id or the pipe's URL.
    pub async fn list_phases(&self, pipe_id: &str, token: &str) -> Result<Vec<Phase>, PipefyError> {
        self.fetch_phases(pipe_id, token)
            .await
            .map_err(|e| e.fetching("pipe phases"))
    }

    /// Fields shown on one phase.
    pub async fn list_phase_fields(
        &self,
        phase_id: &str,
        token: &str,
    ) -> Result<Vec<Field>, PipefyError> {
        self.fetch_phase_fields(phase_id, token)
            .await
            .map_err(|e| e.fetching("phase fields"))
    }

    /// Start-form fields followed by every phase's fields, in returned order.
    ///
    /// A field shown on several phases appears once per phase.
    pub async fn list_fields(&self, pipe_id: &str, token: &str) -> Result<Vec<Field>, PipefyError> {
        self.fetch_fields(pipe_id, token)
            .await
            .map_err(|e| e.fetching("pipe fields"))
    }

    /// Members of a pipe, flattened from `members { user { ... } }`.
    pub async fn list_members(&self, pipe_id: &str, token: &str) -> Result<Vec<Member>, PipefyError> {
        self.fetch_members(pipe_id, token)
            .await
            .map_err(|e| e.fetching("pipe members"))
    }

    // ---- private helpers ----

    async fn fetch_phases(&self, pipe_id: &str, token: &str) -> Result<Vec<Phase>, PipefyError> {
        let pipe_id = bare_pipe_id(pipe_id)?;
        let data = self
            .transport
            .execute(&GET_PIPE_PHASES, json!({ "pipeId": pipe_id }), token)
            .await?
            .into_data()?;

        let pipe = required(&data, "pipe", "Pipe")?;
        list(pipe, "phases")
    }

    async fn fetch_phase_fields(&self, phase_id: &str, token: &str) -> Result<Vec<Field>, PipefyError> {
        let phase_id = phase_id.trim();
        if phase_id.is_empty() {
            return Err(PipefyError::InvalidInput("phase_id must not be empty".into()));
        }

        let data = self
            .transport
            .execute(&GET_PHASE_FIELDS, json!({ "phaseId": phase_id }), token)
            .await?
            .into_data()?;

        let phase = required(&data, "phase", "Phase")?;
        list(phase, "fields")
    }

    async fn fetch_fields(&self, pipe_id: &str, token: &str) -> Result<Vec<Field>, PipefyError> {
        #[derive(Deserialize)]
        struct PhaseFields {
            #[serde(default)]
            fields: Option<Vec<Field>>,
        }

        let pipe_id = bare_pipe_id(pipe_id)?;
        let data = self
            .transport
            .execute(&GET_PIPE_FIELDS, json!({ "pipeId": pipe_id }), token)
            .await?
            .into_data()?;

        let pipe = required(&data, "pipe", "Pipe")?;
        let mut fields: Vec<Field> = list(pipe, "start_form_fields")?;
        let phases: Vec<PhaseFields> = list(pipe, "phases")?;
        fields.extend(phases.into_iter().flat_map(|p| p.fields.unwrap_or_default()));
        Ok(fields)
    }

    async fn fetch_members(&self, pipe_id: &str, token: &str) -> Result<Vec<Member>, PipefyError> {
        #[derive(Deserialize)]
        struct MemberEntry {
            user: Option<MemberUser>,
        }

        #[derive(Deserialize)]
        struct MemberUser {
            id: String,
            name: Option<String>,
            email: Option<String>,
        }

        let pipe_id = bare_pipe_id(pipe_id)?;
        let data = self
            .transport
            .execute(&GET_PIPE_MEMBERS, json!({ "pipeId": pipe_id }), token)
            .await?
            .into_data()?;

        let pipe = required(&data, "pipe", "Pipe")?;
        let entries: Vec<MemberEntry> = list(pipe, "members")?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| entry.user)
            .map(|user| Member {
                id: user.id,
                name: user.name.unwrap_or_default(),
                email: user.email.unwrap_or_default(),
            })
            .collect())
    }
}

fn bare_pipe_id(raw: &str) -> Result<String, PipefyError> {
    normalize_pipe_id(raw).map_err(|e| PipefyError::InvalidInput(e.to_string()))
}

/// `parent[key]`, or [`PipefyError::NotFound`] when it is absent or `null`.
fn required<'a>(parent: &'a Value, key: &str, entity: &'static str) -> Result<&'a Value, PipefyError> {
    match parent.get(key) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(PipefyError::NotFound(entity)),
    }
}

/// `parent[key]` as a list; absent or `null` is empty.
fn list<T: DeserializeOwned>(parent: &Value, key: &str) -> Result<Vec<T>, PipefyError> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| PipefyError::UnexpectedResponse(format!("`{key}`: {e}"))),
    }
}
