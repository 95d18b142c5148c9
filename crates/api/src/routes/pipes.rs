//! Route definitions for the `/pipes` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::pipes;
use crate::state::AppState;

/// Routes mounted at `/pipes`. All require auth.
///
/// ```text
/// GET    /       -> list_pipes
/// POST   /       -> create_pipe
/// GET    /{id}   -> get_pipe
/// PUT    /{id}   -> update_pipe
/// DELETE /{id}   -> delete_pipe
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(pipes::list_pipes).post(pipes::create_pipe))
        .route(
            "/{id}",
            get(pipes::get_pipe)
                .put(pipes::update_pipe)
                .delete(pipes::delete_pipe),
        )
}
