pub mod auth;
pub mod health;
pub mod pipefy;
pub mod pipes;
pub mod templates;

use std::time::Duration;

use axum::http::StatusCode;
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;

/// Whole-request timeout answering `408`.
pub fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /auth/register                 register (public)
/// /auth/login                    login (public)
/// /auth/me                       current user
/// /auth/pipefy-token             save, status
///
/// /pipefy/phases                 load pipe phases + members (starts a flow)
/// /pipefy/fields                 load phase fields
/// /pipefy/pipe-fields            all fields of a pipe
/// /pipefy/members                pipe members
/// /pipefy/selection              validate selected labels
/// /pipefy/template               download XLSX template
/// /pipefy/template/upload        apply filled template (multipart)
/// /pipefy/cards/move             bulk move cards
/// /pipefy/session                reset flow (DELETE)
///
/// /pipes                         list, create
/// /pipes/{id}                    get, update, delete
///
/// /templates                     list, create
/// /templates/{id}                get, update, delete
/// /templates/{id}/load           replay into a new flow
/// ```
///
/// Every route is bounded by `request_timeout` except the bulk writes
/// (`/pipefy/template/upload`, `/pipefy/cards/move`). Those make one Pipefy
/// call per card, each bounded by the client timeout, and must always return
/// their per-card outcomes.
pub fn api_routes(request_timeout: Duration) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/pipes", pipes::router())
        .nest("/templates", templates::router())
        .layer(timeout_layer(request_timeout))
        .nest("/pipefy", pipefy::router(request_timeout))
}
