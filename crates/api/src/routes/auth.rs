//! Route definitions for the `/auth` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /register       -> register
/// POST /login          -> login
/// GET  /me             -> me (requires auth)
/// POST /pipefy-token   -> save_pipefy_token (requires auth)
/// GET  /pipefy-token   -> pipefy_token_status (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route(
            "/pipefy-token",
            get(auth::pipefy_token_status).post(auth::save_pipefy_token),
        )
}
