//! Handlers for the `/templates` resource: saved field selections that can
//! be replayed into a new flow.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use openpipes_core::error::CoreError;
use openpipes_core::pipe::{normalize_pipe_id, Field, Phase};
use openpipes_core::selection::AssigneeOption;
use openpipes_core::types::DbId;
use openpipes_db::models::saved_template::{
    CreateSavedTemplate, SavedTemplate, UpdateSavedTemplate,
};
use serde::Serialize;

use crate::error::AppResult;
use crate::flow;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response for `POST /templates/{id}/load`.
#[derive(Debug, Serialize)]
pub struct LoadedTemplateResponse {
    pub phases: Vec<Phase>,
    pub fields: Vec<Field>,
    pub selected_fields: Vec<String>,
    pub selected_field_ids: Vec<String>,
    pub assignee_options: Vec<AssigneeOption>,
    /// Saved default assignee, checked against the pipe's current members.
    pub default_assignee_id: Option<String>,
}

fn not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "SavedTemplate",
        id,
    }
}

fn required(name: &'static str, value: &str) -> Result<String, CoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::Validation(format!("{name} must not be empty")));
    }
    Ok(value.to_string())
}

/// Trim ids, drop blanks and repeats, keep order. At least one must remain.
fn normalize_field_ids(ids: &[String]) -> Result<Vec<String>, CoreError> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
        if !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
    }
    if out.is_empty() {
        return Err(CoreError::Validation(
            "field_ids must contain at least one field id".into(),
        ));
    }
    Ok(out)
}

fn normalize_assignee(id: Option<String>) -> Option<String> {
    id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty())
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// GET /api/v1/templates
pub async fn list_templates(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<SavedTemplate>>>> {
    let templates = state.registry.list_templates(auth.user_id).await?;
    Ok(Json(DataResponse { data: templates }))
}

/// POST /api/v1/templates
pub async fn create_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateSavedTemplate>,
) -> AppResult<(StatusCode, Json<DataResponse<SavedTemplate>>)> {
    let input = CreateSavedTemplate {
        name: required("name", &input.name)?,
        pipe_id: normalize_pipe_id(&input.pipe_id)?,
        phase_id: required("phase_id", &input.phase_id)?,
        field_ids: normalize_field_ids(&input.field_ids)?,
        default_assignee_id: normalize_assignee(input.default_assignee_id),
    };

    let template = state.registry.create_template(auth.user_id, &input).await?;

    tracing::info!(
        user_id = auth.user_id,
        saved_template_id = template.id,
        "Saved template created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: template })))
}

/// GET /api/v1/templates/{id}
pub async fn get_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<SavedTemplate>>> {
    let template = state
        .registry
        .find_template(auth.user_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: template }))
}

/// PUT /api/v1/templates/{id}
pub async fn update_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateSavedTemplate>,
) -> AppResult<Json<DataResponse<SavedTemplate>>> {
    let input = UpdateSavedTemplate {
        name: input.name.as_deref().map(|n| required("name", n)).transpose()?,
        pipe_id: input.pipe_id.as_deref().map(normalize_pipe_id).transpose()?,
        phase_id: input
            .phase_id
            .as_deref()
            .map(|p| required("phase_id", p))
            .transpose()?,
        field_ids: input
            .field_ids
            .as_deref()
            .map(normalize_field_ids)
            .transpose()?,
        default_assignee_id: normalize_assignee(input.default_assignee_id),
    };

    let template = state
        .registry
        .update_template(auth.user_id, id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(user_id = auth.user_id, saved_template_id = id, "Saved template updated");

    Ok(Json(DataResponse { data: template }))
}

/// DELETE /api/v1/templates/{id}
pub async fn delete_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !state.registry.delete_template(auth.user_id, id).await? {
        return Err(not_found(id).into());
    }

    tracing::info!(user_id = auth.user_id, saved_template_id = id, "Saved template deleted");

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// POST /api/v1/templates/{id}/load
///
/// Start a flow from a saved template: fetch its pipe and phase, re-check
/// its field ids against the live catalog and record the selection. Fails
/// with `UNKNOWN_FIELD` when a saved field no longer exists, and with
/// `VALIDATION_ERROR` when the saved default assignee left the pipe.
pub async fn load_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<LoadedTemplateResponse>>> {
    let template = state
        .registry
        .find_template(auth.user_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let token = flow::caller_token(&state, auth.user_id).await?;
    let (context, prepared) =
        flow::load_saved_template(&state, auth.user_id, &template, &token).await?;

    Ok(Json(DataResponse {
        data: LoadedTemplateResponse {
            phases: context.phases,
            fields: context.fields.unwrap_or_default(),
            selected_fields: prepared.labels,
            selected_field_ids: prepared.field_ids,
            assignee_options: prepared.assignee_options,
            default_assignee_id: template.default_assignee_id,
        },
    }))
}
