//! Route definitions for the `/pipefy` resource.

use std::time::Duration;

use axum::routing::{delete, post};
use axum::Router;

use crate::handlers::pipefy;
use crate::routes::timeout_layer;
use crate::state::AppState;

/// Routes mounted at `/pipefy`. All require auth.
///
/// ```text
/// POST   /phases           -> fetch_phases
/// POST   /fields           -> fetch_fields
/// POST   /pipe-fields      -> fetch_pipe_fields
/// POST   /members          -> fetch_members
/// POST   /selection        -> prepare_fields
/// POST   /template         -> generate_template
/// DELETE /session          -> reset_session
///
/// no request timeout:
/// POST   /template/upload  -> upload_template
/// POST   /cards/move       -> move_cards
/// ```
pub fn router(request_timeout: Duration) -> Router<AppState> {
    // `layer` only wraps the routes registered before it.
    Router::new()
        .route("/phases", post(pipefy::fetch_phases))
        .route("/fields", post(pipefy::fetch_fields))
        .route("/pipe-fields", post(pipefy::fetch_pipe_fields))
        .route("/members", post(pipefy::fetch_members))
        .route("/selection", post(pipefy::prepare_fields))
        .route("/template", post(pipefy::generate_template))
        .route("/session", delete(pipefy::reset_session))
        .layer(timeout_layer(request_timeout))
        .route("/template/upload", post(pipefy::upload_template))
        .route("/cards/move", post(pipefy::move_cards))
}
