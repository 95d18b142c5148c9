#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use openpipes_api::auth::jwt::JwtConfig;
use openpipes_api::config::{PipefyConfig, ServerConfig, SessionConfig};
use openpipes_api::router::build_app_router;
use openpipes_api::state::AppState;
use openpipes_core::session::SessionStore;
use openpipes_core::vault::TokenVault;
use openpipes_db::memory::MemoryStore;
use openpipes_pipefy::testing::{data, graphql_errors, ScriptedTransport};
use openpipes_pipefy::{BulkUpdater, Catalog};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const TEST_ENCRYPTION_KEY: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

pub const PIPEFY_TOKEN: &str = "pipefy-personal-token";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret-key".to_string(),
            access_token_expiry_mins: 60,
        },
        pipefy: PipefyConfig {
            api_url: "http://pipefy.invalid/graphql".to_string(),
            timeout_secs: 5,
            bulk_concurrency: 2,
        },
        session: SessionConfig {
            ttl_secs: 600,
            max_entries: 100,
        },
    }
}

/// The full router plus handles on the fakes behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
    pub sessions: SessionStore,
}

/// Build the application with the production middleware stack over an
/// in-memory store and the given scripted Pipefy.
pub fn build_test_app(transport: ScriptedTransport) -> TestApp {
    build_test_app_with(transport, test_config())
}

/// [`build_test_app`] with a caller-supplied configuration.
pub fn build_test_app_with(transport: ScriptedTransport, config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(transport);
    let sessions = SessionStore::new(
        Duration::from_secs(config.session.ttl_secs),
        config.session.max_entries,
    );

    let state = AppState {
        accounts: store.clone(),
        registry: store.clone(),
        config: Arc::new(config.clone()),
        vault: Arc::new(TokenVault::from_hex_key(TEST_ENCRYPTION_KEY).unwrap()),
        sessions: sessions.clone(),
        catalog: Catalog::new(transport.clone()),
        bulk: BulkUpdater::new(transport.clone(), config.pipefy.bulk_concurrency),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        transport,
        sessions,
    }
}

// ---------------------------------------------------------------------------
// Scripted Pipefy
// ---------------------------------------------------------------------------

/// Pipe 301 with phases `ph1`/`ph2`, member `u1` (Ana), and phase `ph1`
/// showing `f1` "Name" (short_text) and `f2` "Owner" (assignee_select).
///
/// Card `bad` rejects every field update; card `locked` refuses to move.
pub fn pipefy_fixture() -> ScriptedTransport {
    ScriptedTransport::new(|operation, variables| match operation {
        "GetPipePhases" => data(json!({
            "pipe": { "phases": [
                { "id": "ph1", "name": "Backlog" },
                { "id": "ph2", "name": "Done" },
            ]}
        })),
        "GetPipeMembers" => data(json!({
            "pipe": { "members": [
                { "user": { "id": "u1", "name": "Ana", "email": "ana@example.com" } },
            ]}
        })),
        "GetPhaseFields" => data(json!({
            "phase": { "fields": [
                { "id": "f1", "label": "Name", "type": "short_text" },
                { "id": "f2", "label": "Owner", "type": "assignee_select" },
            ]}
        })),
        "GetPipeFields" => data(json!({
            "pipe": {
                "start_form_fields": [
                    { "id": "s1", "label": "Title", "type": "short_text" },
                ],
                "phases": [
                    { "fields": [
                        { "id": "f1", "label": "Name", "type": "short_text" },
                        { "id": "f2", "label": "Owner", "type": "assignee_select" },
                    ]},
                    { "fields": [] },
                ]
            }
        })),
        "UpdateCardField" => {
            if variables["input"]["card_id"] == "bad" {
                graphql_errors(&["Card not found"])
            } else {
                data(json!({ "updateCardField": { "success": true } }))
            }
        }
        "MoveCardToPhase" => {
            if variables["input"]["card_id"] == "locked" {
                data(json!({
                    "moveCardToPhase": { "card": null, "errors": [{ "message": "Phase transition not allowed" }] }
                }))
            } else {
                data(json!({ "moveCardToPhase": { "card": { "id": variables["input"]["card_id"] } } }))
            }
        }
        other => panic!("unexpected operation {other}"),
    })
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn builder(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Response {
    send(app, builder(Method::GET, uri, token).body(Body::empty()).unwrap()).await
}

pub async fn delete(app: &Router, uri: &str, token: Option<&str>) -> Response {
    send(app, builder(Method::DELETE, uri, token).body(Body::empty()).unwrap()).await
}

pub async fn post_json(app: &Router, uri: &str, token: Option<&str>, body: Value) -> Response {
    send_json(app, Method::POST, uri, token, body).await
}

pub async fn put_json(app: &Router, uri: &str, token: Option<&str>, body: Value) -> Response {
    send_json(app, Method::PUT, uri, token, body).await
}

async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> Response {
    let request = builder(method, uri, token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// POST a single-part multipart form with `bytes` under `field_name`.
pub async fn post_file(
    app: &Router,
    uri: &str,
    token: Option<&str>,
    field_name: &str,
    bytes: &[u8],
) -> Response {
    let boundary = "openpipes-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field_name}\"; filename=\"upload.xlsx\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let request = builder(Method::POST, uri, token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Account helpers
// ---------------------------------------------------------------------------

pub const PASSWORD: &str = "correct-horse-battery";

/// Register `email` and return a bearer token for it.
pub async fn register_and_login(app: &Router, email: &str) -> String {
    let response = post_json(
        app,
        "/api/v1/auth/register",
        None,
        json!({ "email": email, "password": PASSWORD, "full_name": "Test User" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = post_json(
        app,
        "/api/v1/auth/login",
        None,
        json!({ "email": email, "password": PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Register, log in and save [`PIPEFY_TOKEN`]. Returns the bearer token.
pub async fn pipefy_user(app: &Router, email: &str) -> String {
    let jwt = register_and_login(app, email).await;
    let response = post_json(
        app,
        "/api/v1/auth/pipefy-token",
        Some(&jwt),
        json!({ "pipefy_token": PIPEFY_TOKEN }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    jwt
}
