use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use openpipes_core::error::CoreError;
use openpipes_core::template::TemplateError;
use openpipes_core::vault::VaultError;
use openpipes_db::StoreError;
use openpipes_pipefy::PipefyError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the error enum of every lower crate and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `openpipes_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A persistence error from `openpipes_db`.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A Pipefy API failure.
    #[error(transparent)]
    Pipefy(#[from] PipefyError),

    /// Template generation or parsing failed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Stored token encryption or decryption failed.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type Classified = (StatusCode, &'static str, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),

            AppError::Store(StoreError::Conflict(constraint)) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("Duplicate value violates unique constraint: {constraint}"),
            ),
            AppError::Store(StoreError::Database(err)) => classify_sqlx_error(err),

            AppError::Pipefy(err) => classify_pipefy_error(err),

            AppError::Template(err) => match err {
                TemplateError::Selection(core) => classify_core_error(core),
                TemplateError::Read(_) | TemplateError::InvalidLayout(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_TEMPLATE", err.to_string())
                }
                TemplateError::Write(e) => internal(e),
            },

            AppError::Vault(VaultError::Decryption) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "DECRYPTION_ERROR",
                "Stored Pipefy token could not be decrypted. Please save it again.".to_string(),
            ),
            AppError::Vault(err) => internal(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Log `err` and return a sanitized 500.
fn internal(err: impl std::fmt::Display) -> Classified {
    tracing::error!(error = %err, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(core: &CoreError) -> Classified {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::PreconditionMissing(msg) => {
            (StatusCode::BAD_REQUEST, "PRECONDITION_MISSING", msg.clone())
        }
        CoreError::UnknownField(msg) => (
            StatusCode::BAD_REQUEST,
            "UNKNOWN_FIELD",
            format!("Unknown field: {msg}"),
        ),
        CoreError::Internal(msg) => internal(msg),
    }
}

/// Classify a Pipefy failure.
///
/// - Rejected input maps to 400.
/// - Network failures and non-2xx statuses map to 502 `TRANSPORT_FAILURE`.
/// - GraphQL errors and malformed payloads map to 502 `REMOTE_PROTOCOL_ERROR`.
///
/// The message keeps the listing context ("Error fetching pipe phases: ...").
fn classify_pipefy_error(err: &PipefyError) -> Classified {
    match err.root_cause() {
        PipefyError::InvalidInput(_) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
        }
        _ if err.is_transport() => {
            tracing::warn!(error = %err, "Pipefy transport failure");
            (StatusCode::BAD_GATEWAY, "TRANSPORT_FAILURE", err.to_string())
        }
        _ => {
            tracing::warn!(error = %err, "Pipefy protocol error");
            (
                StatusCode::BAD_GATEWAY,
                "REMOTE_PROTOCOL_ERROR",
                err.to_string(),
            )
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Everything else maps to 500 with a sanitized message.
///
/// Unique violations never reach this point: [`StoreError`] already turned
/// them into [`StoreError::Conflict`].
fn classify_sqlx_error(err: &sqlx::Error) -> Classified {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        other => internal(format!("Database error: {other}")),
    }
}
