//! Route definitions for the `/templates` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::templates;
use crate::state::AppState;

/// Routes mounted at `/templates`. All require auth.
///
/// ```text
/// GET    /            -> list_templates
/// POST   /            -> create_template
/// GET    /{id}        -> get_template
/// PUT    /{id}        -> update_template
/// DELETE /{id}        -> delete_template
/// POST   /{id}/load   -> load_template
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/{id}",
            get(templates::get_template)
                .put(templates::update_template)
                .delete(templates::delete_template),
        )
        .route("/{id}/load", post(templates::load_template))
}
