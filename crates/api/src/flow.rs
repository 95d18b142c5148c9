//! Steps of the update-template flow shared by several handlers.
//!
//! A flow walks: load pipe (phases + members) -> load phase fields ->
//! prepare selection -> generate template -> upload. Each step reads what the
//! previous one left in the caller's [`SessionContext`] and writes its own
//! [`SessionPatch`].

use openpipes_core::error::CoreError;
use openpipes_core::pipe::normalize_pipe_id;
use openpipes_core::selection::{
    prepare_selection, resolve_field_ids, validate_default_assignee, PreparedSelection,
};
use openpipes_core::session::{FieldSelection, SessionContext, SessionPatch};
use openpipes_core::types::DbId;
use openpipes_db::models::saved_template::SavedTemplate;

use crate::error::AppResult;
use crate::state::AppState;

/// Message returned when a caller uses Pipefy before saving a token.
pub const MISSING_TOKEN_MESSAGE: &str =
    "Pipefy token not found. Please save your Pipefy token first.";

/// Decrypt the caller's stored Pipefy token.
pub async fn caller_token(state: &AppState, user_id: DbId) -> AppResult<String> {
    let ciphertext = state
        .accounts
        .get_pipefy_token(user_id)
        .await?
        .ok_or_else(|| CoreError::PreconditionMissing(MISSING_TOKEN_MESSAGE.into()))?;

    Ok(state.vault.decrypt(&ciphertext)?)
}

/// Fetch a pipe's phases and members and restart the caller's flow on it.
///
/// Nothing is cached unless both listings succeed.
pub async fn load_pipe(
    state: &AppState,
    user_id: DbId,
    raw_pipe_id: &str,
    token: &str,
) -> AppResult<SessionContext> {
    let pipe_id = normalize_pipe_id(raw_pipe_id)?;

    let (phases, members) = tokio::try_join!(
        state.catalog.list_phases(&pipe_id, token),
        state.catalog.list_members(&pipe_id, token),
    )?;

    tracing::info!(
        user_id,
        pipe_id = %pipe_id,
        phases = phases.len(),
        members = members.len(),
        "Pipe loaded"
    );

    Ok(state
        .sessions
        .put(
            user_id,
            SessionPatch::PipeLoaded {
                pipe_id,
                phases,
                members,
            },
        )
        .await)
}

/// Fetch the fields of `phase_id`, which must belong to the loaded pipe.
pub async fn load_phase_fields(
    state: &AppState,
    user_id: DbId,
    context: &SessionContext,
    phase_id: &str,
    token: &str,
) -> AppResult<SessionContext> {
    let pipe_id = context.require_pipe()?;
    let phase_id = phase_id.trim();
    if !context.phases.iter().any(|p| p.id == phase_id) {
        return Err(CoreError::Validation(format!(
            "Phase {phase_id} does not belong to pipe {pipe_id}"
        ))
        .into());
    }

    let fields = state.catalog.list_phase_fields(phase_id, token).await?;

    tracing::info!(user_id, phase_id, fields = fields.len(), "Phase fields loaded");

    Ok(state
        .sessions
        .put(
            user_id,
            SessionPatch::FieldsLoaded {
                phase_id: phase_id.to_string(),
                fields,
            },
        )
        .await)
}

/// Record a validated selection in the caller's flow.
pub async fn record_selection(
    state: &AppState,
    user_id: DbId,
    prepared: &PreparedSelection,
) -> SessionContext {
    state
        .sessions
        .put(
            user_id,
            SessionPatch::SelectionPrepared(FieldSelection {
                labels: prepared.labels.clone(),
                field_ids: prepared.field_ids.clone(),
                assignee_fields: prepared.assignee_fields.clone(),
            }),
        )
        .await
}

/// Replay a saved template against the live pipe.
///
/// Loads the pipe and the phase, re-validates the stored field ids and
/// records the selection, leaving the session as though the caller had walked
/// the flow by hand.
pub async fn load_saved_template(
    state: &AppState,
    user_id: DbId,
    template: &SavedTemplate,
    token: &str,
) -> AppResult<(SessionContext, PreparedSelection)> {
    let context = load_pipe(state, user_id, &template.pipe_id, token).await?;
    let context = load_phase_fields(state, user_id, &context, &template.phase_id, token).await?;

    let fields = context.require_fields()?;
    let resolved = resolve_field_ids(&template.field_ids, fields)?;
    let labels: Vec<String> = resolved.iter().map(|f| f.label.clone()).collect();
    let prepared = prepare_selection(&labels, fields, &context.members)?;
    validate_default_assignee(
        template.default_assignee_id.as_deref(),
        &resolved,
        &context.members,
    )?;

    let context = record_selection(state, user_id, &prepared).await;

    tracing::info!(
        user_id,
        template_id = template.id,
        fields = prepared.field_ids.len(),
        "Saved template loaded"
    );

    Ok((context, prepared))
}
