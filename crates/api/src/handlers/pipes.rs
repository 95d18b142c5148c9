//! Handlers for the `/pipes` resource: the caller's saved pipe shortcuts.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use openpipes_core::error::CoreError;
use openpipes_core::pipe::normalize_pipe_id;
use openpipes_core::types::DbId;
use openpipes_db::models::saved_pipe::{CreateSavedPipe, SavedPipe, UpdateSavedPipe};

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

fn not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "SavedPipe",
        id,
    }
}

fn normalize_name(name: &str) -> Result<String, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation("name must not be empty".into()));
    }
    Ok(name.to_string())
}

/// GET /api/v1/pipes
pub async fn list_pipes(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<SavedPipe>>>> {
    let pipes = state.registry.list_pipes(auth.user_id).await?;
    Ok(Json(DataResponse { data: pipes }))
}

/// POST /api/v1/pipes
///
/// The pipe may be given as a URL; only the bare id is stored.
pub async fn create_pipe(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateSavedPipe>,
) -> AppResult<(StatusCode, Json<DataResponse<SavedPipe>>)> {
    let input = CreateSavedPipe {
        name: normalize_name(&input.name)?,
        pipe_id: normalize_pipe_id(&input.pipe_id)?,
    };

    let pipe = state.registry.create_pipe(auth.user_id, &input).await?;

    tracing::info!(user_id = auth.user_id, saved_pipe_id = pipe.id, "Saved pipe created");

    Ok((StatusCode::CREATED, Json(DataResponse { data: pipe })))
}

/// GET /api/v1/pipes/{id}
pub async fn get_pipe(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<SavedPipe>>> {
    let pipe = state
        .registry
        .find_pipe(auth.user_id, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse { data: pipe }))
}

/// PUT /api/v1/pipes/{id}
pub async fn update_pipe(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateSavedPipe>,
) -> AppResult<Json<DataResponse<SavedPipe>>> {
    let input = UpdateSavedPipe {
        name: input.name.as_deref().map(normalize_name).transpose()?,
        pipe_id: input.pipe_id.as_deref().map(normalize_pipe_id).transpose()?,
    };

    let pipe = state
        .registry
        .update_pipe(auth.user_id, id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(user_id = auth.user_id, saved_pipe_id = id, "Saved pipe updated");

    Ok(Json(DataResponse { data: pipe }))
}

/// DELETE /api/v1/pipes/{id}
pub async fn delete_pipe(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !state.registry.delete_pipe(auth.user_id, id).await? {
        return Err(not_found(id).into());
    }

    tracing::info!(user_id = auth.user_id, saved_pipe_id = id, "Saved pipe deleted");

    Ok(StatusCode::NO_CONTENT)
}
