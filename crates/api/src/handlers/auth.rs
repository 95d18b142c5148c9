//! Handlers for the `/auth` resource: accounts, login and the stored Pipefy
//! token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use openpipes_core::error::CoreError;
use openpipes_db::models::user::{CreateUser, UserResponse};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{
    hash_password, validate_password_strength, verify_password, MIN_PASSWORD_LENGTH,
};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::{DataResponse, MessageResponse};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login response.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Request body for `POST /auth/pipefy-token`.
#[derive(Debug, Deserialize)]
pub struct PipefyTokenRequest {
    pub pipefy_token: String,
}

/// Response for `GET /auth/pipefy-token`.
#[derive(Debug, Serialize)]
pub struct PipefyTokenStatus {
    pub has_token: bool,
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/register
///
/// Create an account. Emails are stored lower-cased and must be unique.
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    input
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;
    validate_password_strength(&input.password, MIN_PASSWORD_LENGTH)
        .map_err(CoreError::Validation)?;

    let email = input.email.trim().to_lowercase();
    if state.accounts.find_user_by_email(&email).await?.is_some() {
        return Err(CoreError::Conflict("Email already registered".into()).into());
    }

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = state
        .accounts
        .create_user(&CreateUser {
            email,
            full_name: input
                .full_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            password_hash,
        })
        .await?;

    tracing::info!(user_id = user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: UserResponse::from(&user),
        }),
    ))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password and return a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let invalid = || CoreError::Unauthorized("Incorrect email or password".into());

    let email = input.email.trim().to_lowercase();
    let user = state
        .accounts
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::info!(user_id = user.id, "Login rejected");
        return Err(invalid().into());
    }

    let access_token = generate_access_token(user.id, &user.email, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.config.jwt.expires_in_secs(),
    }))
}

/// GET /api/v1/auth/me
pub async fn me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state
        .accounts
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: auth.user_id,
        })?;

    Ok(Json(DataResponse {
        data: UserResponse::from(&user),
    }))
}

// ---------------------------------------------------------------------------
// Pipefy token
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/pipefy-token
///
/// Encrypt and store the caller's Pipefy personal access token, replacing any
/// previous one.
pub async fn save_pipefy_token(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<PipefyTokenRequest>,
) -> AppResult<Json<DataResponse<MessageResponse>>> {
    let token = input.pipefy_token.trim();
    if token.is_empty() {
        return Err(CoreError::Validation("pipefy_token must not be empty".into()).into());
    }

    let ciphertext = state.vault.encrypt(token)?;
    let stored = state
        .accounts
        .set_pipefy_token(auth.user_id, &ciphertext)
        .await?;
    if !stored {
        return Err(CoreError::NotFound {
            entity: "User",
            id: auth.user_id,
        }
        .into());
    }

    tracing::info!(user_id = auth.user_id, "Pipefy token saved");

    Ok(Json(DataResponse {
        data: MessageResponse::new("Pipefy token saved successfully"),
    }))
}

/// GET /api/v1/auth/pipefy-token
///
/// Whether the caller has a stored token. Never returns the token itself.
pub async fn pipefy_token_status(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<PipefyTokenStatus>>> {
    let has_token = state
        .accounts
        .get_pipefy_token(auth.user_id)
        .await?
        .is_some();

    Ok(Json(DataResponse {
        data: PipefyTokenStatus { has_token },
    }))
}
