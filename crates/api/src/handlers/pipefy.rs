//! Handlers for the `/pipefy` resource: the update-template flow and bulk
//! card moves.
//!
//! All endpoints require authentication via [`AuthUser`] and a saved Pipefy
//! token (except the purely local selection/template/session steps).

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use openpipes_core::error::CoreError;
use openpipes_core::pipe::{normalize_pipe_id, Field, Member, Phase};
use openpipes_core::selection::{
    prepare_selection, resolve_field_ids, validate_default_assignee, AssigneeOption,
};
use openpipes_core::template::{decode_template, encode_template, XLSX_CONTENT_TYPE};
use openpipes_pipefy::bulk::{MoveSummary, RecordOutcome};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::flow;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart part carrying the filled-in template.
const UPLOAD_FIELD_NAME: &str = "file";

/// Download name of a generated template.
const TEMPLATE_FILENAME: &str = "update_template.xlsx";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body naming a pipe by id or URL.
#[derive(Debug, Deserialize)]
pub struct PipeRequest {
    pub pipe_id: String,
}

/// Request body for `POST /pipefy/fields`.
#[derive(Debug, Deserialize)]
pub struct PhaseRequest {
    pub phase_id: String,
}

/// Request body for `POST /pipefy/selection`: field labels.
#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    pub selected_fields: Vec<String>,
}

/// Request body for `POST /pipefy/template`: field ids and the default
/// assignee. An empty id list reuses the prepared selection.
#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    #[serde(default)]
    pub selected_fields: Vec<String>,
    pub selected_user: Option<String>,
}

/// Request body for `POST /pipefy/cards/move`.
#[derive(Debug, Deserialize)]
pub struct MoveCardsRequest {
    pub card_ids: Vec<String>,
    pub destination_phase_id: String,
}

#[derive(Debug, Serialize)]
pub struct PhasesResponse {
    pub phases: Vec<Phase>,
}

#[derive(Debug, Serialize)]
pub struct FieldsResponse {
    pub fields: Vec<Field>,
}

#[derive(Debug, Serialize)]
pub struct MembersResponse {
    pub members: Vec<Member>,
}

/// A validated selection, as returned by `POST /pipefy/selection` and
/// `POST /templates/{id}/load`.
#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub selected_fields: Vec<String>,
    pub selected_field_ids: Vec<String>,
    pub assignee_options: Vec<AssigneeOption>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub results: Vec<RecordOutcome>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// POST /api/v1/pipefy/phases
///
/// Load a pipe's phases and members. Starts a new flow for the caller.
pub async fn fetch_phases(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<PipeRequest>,
) -> AppResult<Json<DataResponse<PhasesResponse>>> {
    let token = flow::caller_token(&state, auth.user_id).await?;
    let context = flow::load_pipe(&state, auth.user_id, &input.pipe_id, &token).await?;

    Ok(Json(DataResponse {
        data: PhasesResponse {
            phases: context.phases,
        },
    }))
}

/// POST /api/v1/pipefy/fields
///
/// Load the fields of a phase of the current pipe.
pub async fn fetch_fields(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<PhaseRequest>,
) -> AppResult<Json<DataResponse<FieldsResponse>>> {
    let context = state.sessions.require(auth.user_id).await?;
    context.require_pipe()?;

    let token = flow::caller_token(&state, auth.user_id).await?;
    let context =
        flow::load_phase_fields(&state, auth.user_id, &context, &input.phase_id, &token).await?;

    Ok(Json(DataResponse {
        data: FieldsResponse {
            fields: context.fields.unwrap_or_default(),
        },
    }))
}

/// POST /api/v1/pipefy/pipe-fields
///
/// Every field of a pipe: start form first, then each phase. Does not touch
/// the caller's flow.
pub async fn fetch_pipe_fields(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<PipeRequest>,
) -> AppResult<Json<DataResponse<FieldsResponse>>> {
    let pipe_id = normalize_pipe_id(&input.pipe_id)?;
    let token = flow::caller_token(&state, auth.user_id).await?;
    let fields = state.catalog.list_fields(&pipe_id, &token).await?;

    Ok(Json(DataResponse {
        data: FieldsResponse { fields },
    }))
}

/// POST /api/v1/pipefy/members
pub async fn fetch_members(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<PipeRequest>,
) -> AppResult<Json<DataResponse<MembersResponse>>> {
    let pipe_id = normalize_pipe_id(&input.pipe_id)?;
    let token = flow::caller_token(&state, auth.user_id).await?;
    let members = state.catalog.list_members(&pipe_id, &token).await?;

    Ok(Json(DataResponse {
        data: MembersResponse { members },
    }))
}

// ---------------------------------------------------------------------------
// Selection and template
// ---------------------------------------------------------------------------

/// POST /api/v1/pipefy/selection
///
/// Validate field labels against the loaded phase and list member choices for
/// every assignee field. Unknown labels leave the flow untouched.
pub async fn prepare_fields(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SelectionRequest>,
) -> AppResult<Json<DataResponse<SelectionResponse>>> {
    let context = state.sessions.require(auth.user_id).await?;
    let fields = context.require_fields()?;

    let prepared = prepare_selection(&input.selected_fields, fields, &context.members)?;
    flow::record_selection(&state, auth.user_id, &prepared).await;

    Ok(Json(DataResponse {
        data: SelectionResponse {
            selected_fields: prepared.labels,
            selected_field_ids: prepared.field_ids,
            assignee_options: prepared.assignee_options,
        },
    }))
}

/// POST /api/v1/pipefy/template
///
/// Render the XLSX update template for the selected field ids.
pub async fn generate_template(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<TemplateRequest>,
) -> AppResult<impl IntoResponse> {
    let context = state.sessions.require(auth.user_id).await?;
    let fields = context.require_fields()?;

    let field_ids = if input.selected_fields.is_empty() {
        context.require_selection()?.field_ids.clone()
    } else {
        input.selected_fields
    };

    let selected = resolve_field_ids(&field_ids, fields)?;
    let default_assignee = input
        .selected_user
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    validate_default_assignee(default_assignee, &selected, &context.members)?;

    let bytes = encode_template(&field_ids, fields, default_assignee)?;

    tracing::info!(
        user_id = auth.user_id,
        fields = selected.len(),
        bytes = bytes.len(),
        "Template generated"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{TEMPLATE_FILENAME}\""),
            ),
        ],
        bytes,
    ))
}

/// POST /api/v1/pipefy/template/upload
///
/// Apply a filled-in template. One result per data row with a record id;
/// per-card failures are reported, not raised. Ends the caller's flow.
pub async fn upload_template(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<UploadResponse>>> {
    let context = state.sessions.require(auth.user_id).await?;
    context.require_fields()?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(UPLOAD_FIELD_NAME) {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some(data);
        break;
    }

    let bytes = upload.ok_or_else(|| {
        AppError::BadRequest(format!(
            "Multipart upload must contain a '{UPLOAD_FIELD_NAME}' part"
        ))
    })?;

    let batch = decode_template(&bytes)?;
    let token = flow::caller_token(&state, auth.user_id).await?;
    let results = state.bulk.apply_field_updates(&batch, &token).await;

    state.sessions.invalidate(auth.user_id).await;

    tracing::info!(
        user_id = auth.user_id,
        records = results.len(),
        "Template applied"
    );

    Ok(Json(DataResponse {
        data: UploadResponse { results },
    }))
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// POST /api/v1/pipefy/cards/move
///
/// Move cards to a phase. The summary fails only when no card moved.
pub async fn move_cards(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<MoveCardsRequest>,
) -> AppResult<Json<DataResponse<MoveSummary>>> {
    let destination = input.destination_phase_id.trim();
    if destination.is_empty() {
        return Err(CoreError::Validation("destination_phase_id must not be empty".into()).into());
    }

    let card_ids: Vec<String> = input
        .card_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let token = flow::caller_token(&state, auth.user_id).await?;
    let summary = state.bulk.move_records(&card_ids, destination, &token).await;

    Ok(Json(DataResponse { data: summary }))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// DELETE /api/v1/pipefy/session
///
/// Discard the caller's flow.
pub async fn reset_session(auth: AuthUser, State(state): State<AppState>) -> StatusCode {
    state.sessions.invalidate(auth.user_id).await;
    tracing::debug!(user_id = auth.user_id, "Flow reset");
    StatusCode::NO_CONTENT
}
