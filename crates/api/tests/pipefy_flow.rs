//! End-to-end flow over `/api/v1/pipefy` against a scripted Pipefy.

mod common;

use std::io::Cursor;
use std::time::Duration;

use axum::http::{header, StatusCode};
use calamine::{open_workbook_from_rs, Reader, Xlsx};
use common::{
    body_bytes, body_json, build_test_app, build_test_app_with, delete, pipefy_fixture,
    pipefy_user, post_file, post_json, register_and_login, test_config, TestApp, PIPEFY_TOKEN,
};
use openpipes_db::AccountStore;
use openpipes_pipefy::testing::{http_status, ScriptedTransport};
use rust_xlsxwriter::Workbook;
use serde_json::{json, Value};

/// Rows of the first sheet, every cell rendered as a string.
fn sheet_rows(bytes: &[u8]) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes.to_vec())).unwrap();
    let range = workbook.worksheet_range_at(0).unwrap().unwrap();
    range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

/// A workbook with the given rows, as a user would save it.
fn workbook(rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Walk the flow up to a loaded phase.
async fn load_phase(app: &TestApp, jwt: &str) {
    let response = post_json(
        &app.router,
        "/api/v1/pipefy/phases",
        Some(jwt),
        json!({ "pipe_id": "https://app.pipefy.com/pipes/301" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/fields",
        Some(jwt),
        json!({ "phase_id": "ph1" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_pipefy_token_is_a_precondition_error() {
    let app = build_test_app(pipefy_fixture());
    let jwt = register_and_login(&app.router, "ana@example.com").await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/phases",
        Some(&jwt),
        json!({ "pipe_id": "301" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PRECONDITION_MISSING");
    assert_eq!(
        json["error"],
        "Pipefy token not found. Please save your Pipefy token first."
    );
    assert!(app.transport.calls().is_empty());
}

#[tokio::test]
async fn fields_before_phases_is_a_precondition_error() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/fields",
        Some(&jwt),
        json!({ "phase_id": "ph1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "PRECONDITION_MISSING");
}

#[tokio::test]
async fn selection_before_fields_is_a_precondition_error() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;

    post_json(
        &app.router,
        "/api/v1/pipefy/phases",
        Some(&jwt),
        json!({ "pipe_id": "301" }),
    )
    .await;
    let response = post_json(
        &app.router,
        "/api/v1/pipefy/selection",
        Some(&jwt),
        json!({ "selected_fields": ["Name"] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "PRECONDITION_MISSING");
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[tokio::test]
async fn phases_are_fetched_with_the_stored_token() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/phases",
        Some(&jwt),
        json!({ "pipe_id": "https://app.pipefy.com/pipes/301/" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["phases"][0]["id"], "ph1");
    assert_eq!(json["data"]["phases"][1]["name"], "Done");

    let calls = app.transport.calls_to("GetPipePhases");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].token, PIPEFY_TOKEN);
    assert_eq!(calls[0].variables, json!({ "pipeId": "301" }));
    assert_eq!(app.transport.calls_to("GetPipeMembers").len(), 1);
}

#[tokio::test]
async fn phase_outside_loaded_pipe_is_rejected() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    post_json(
        &app.router,
        "/api/v1/pipefy/phases",
        Some(&jwt),
        json!({ "pipe_id": "301" }),
    )
    .await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/fields",
        Some(&jwt),
        json!({ "phase_id": "ph-other" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(app.transport.calls_to("GetPhaseFields").is_empty());
}

#[tokio::test]
async fn pipe_fields_list_start_form_first() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/pipe-fields",
        Some(&jwt),
        json!({ "pipe_id": "301" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let ids: Vec<&str> = json["data"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["s1", "f1", "f2"]);
}

#[tokio::test]
async fn members_are_flattened() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/members",
        Some(&jwt),
        json!({ "pipe_id": "301" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["data"]["members"],
        json!([{ "id": "u1", "name": "Ana", "email": "ana@example.com" }])
    );
}

#[tokio::test]
async fn pipefy_outage_is_a_transport_failure() {
    let app = build_test_app(ScriptedTransport::new(|_, _| http_status(503)));
    let jwt = pipefy_user(&app.router, "ana@example.com").await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/phases",
        Some(&jwt),
        json!({ "pipe_id": "301" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "TRANSPORT_FAILURE");
    assert!(json["error"].as_str().unwrap().starts_with("Error fetching pipe"));
}

// ---------------------------------------------------------------------------
// Selection and template
// ---------------------------------------------------------------------------

#[tokio::test]
async fn selection_offers_members_for_assignee_fields() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    load_phase(&app, &jwt).await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/selection",
        Some(&jwt),
        json!({ "selected_fields": ["Name", "Owner"] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["selected_fields"], json!(["Name", "Owner"]));
    assert_eq!(json["data"]["selected_field_ids"], json!(["f1", "f2"]));
    let options = json["data"]["assignee_options"].as_array().unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0]["field_label"], "Owner");
    assert_eq!(options[0]["members"][0]["id"], "u1");
}

#[tokio::test]
async fn unknown_label_leaves_session_untouched() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    load_phase(&app, &jwt).await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/selection",
        Some(&jwt),
        json!({ "selected_fields": ["Name", "Budget"] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "UNKNOWN_FIELD");

    // Still no selection: generating from it is a precondition error.
    let response = post_json(
        &app.router,
        "/api/v1/pipefy/template",
        Some(&jwt),
        json!({ "selected_fields": [] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "PRECONDITION_MISSING");
}

#[tokio::test]
async fn template_has_headers_hidden_ids_and_default_assignee() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    load_phase(&app, &jwt).await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/template",
        Some(&jwt),
        json!({ "selected_fields": ["f1", "f2"], "selected_user": "u1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"update_template.xlsx\""
    );
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .contains("spreadsheetml"));

    let rows = sheet_rows(&body_bytes(response).await);
    assert_eq!(rows[0], ["Record ID", "Name", "Owner"]);
    assert_eq!(rows[1], ["record_id", "f1", "f2"]);
    assert_eq!(rows[2], ["", "", "u1"]);
}

#[tokio::test]
async fn template_defaults_to_prepared_selection() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    load_phase(&app, &jwt).await;
    post_json(
        &app.router,
        "/api/v1/pipefy/selection",
        Some(&jwt),
        json!({ "selected_fields": ["Name"] }),
    )
    .await;

    let response = post_json(&app.router, "/api/v1/pipefy/template", Some(&jwt), json!({})).await;

    assert_eq!(response.status(), StatusCode::OK);
    let rows = sheet_rows(&body_bytes(response).await);
    assert_eq!(rows[1], ["record_id", "f1"]);
}

#[tokio::test]
async fn template_rejects_unknown_ids_and_foreign_assignees() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    load_phase(&app, &jwt).await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/template",
        Some(&jwt),
        json!({ "selected_fields": ["f1", "f9"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "UNKNOWN_FIELD");

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/template",
        Some(&jwt),
        json!({ "selected_fields": ["f2"], "selected_user": "u404" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_applies_rows_and_reports_per_card() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    load_phase(&app, &jwt).await;

    let filled = workbook(&[
        &["Record ID", "Name", "Owner"],
        &["record_id", "f1", "f2"],
        &["card123", "Alice", ""],
        &["", "Orphan", "u1"],
        &["bad", "Bob", "u1"],
        &["card456", "", ""],
    ]);

    let response = post_file(
        &app.router,
        "/api/v1/pipefy/template/upload",
        Some(&jwt),
        "file",
        &filled,
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let results = json["data"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);

    assert_eq!(results[0]["card_id"], "card123");
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["fields_applied"], 1);

    assert_eq!(results[1]["card_id"], "bad");
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["fields_applied"], 0);

    assert_eq!(results[2]["card_id"], "card456");
    assert_eq!(results[2]["success"], true);
    assert_eq!(results[2]["message"], "No changes requested");

    // card123 once, bad stops at its first field.
    let updates = app.transport.calls_to("UpdateCardField");
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().any(|call| call.variables["input"]
        == json!({ "card_id": "card123", "field_id": "f1", "new_value": "Alice" })));

    // The flow is over.
    let user = app
        .store
        .find_user_by_email("ana@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(app.sessions.get(user.id).await.is_none());
}

#[tokio::test]
async fn upload_without_file_part_is_rejected() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    load_phase(&app, &jwt).await;

    let response = post_file(
        &app.router,
        "/api/v1/pipefy/template/upload",
        Some(&jwt),
        "attachment",
        b"irrelevant",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn upload_of_non_xlsx_is_invalid_template() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    load_phase(&app, &jwt).await;

    let response = post_file(
        &app.router,
        "/api/v1/pipefy/template/upload",
        Some(&jwt),
        "file",
        b"name,owner\nAlice,u1\n",
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_TEMPLATE");
    assert!(app.transport.calls_to("UpdateCardField").is_empty());
}

// ---------------------------------------------------------------------------
// Request timeout
// ---------------------------------------------------------------------------

/// A 1s request timeout with two cards in flight at a time.
fn slow_app(transport: ScriptedTransport) -> TestApp {
    let mut config = test_config();
    config.request_timeout_secs = 1;
    config.pipefy.bulk_concurrency = 2;
    build_test_app_with(transport, config)
}

#[tokio::test]
async fn long_upload_outlives_request_timeout() {
    let app = slow_app(
        pipefy_fixture().with_latency("UpdateCardField", Duration::from_millis(300)),
    );
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    load_phase(&app, &jwt).await;

    let card_ids: Vec<String> = (0..10).map(|i| format!("card{i}")).collect();
    let mut rows: Vec<Vec<&str>> = vec![
        vec!["Record ID", "Name"],
        vec!["record_id", "f1"],
    ];
    rows.extend(card_ids.iter().map(|id| vec![id.as_str(), "Alice"]));
    let rows: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();

    // Five rounds of 300ms each.
    let response = post_file(
        &app.router,
        "/api/v1/pipefy/template/upload",
        Some(&jwt),
        "file",
        &workbook(&rows),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let results = json["data"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r["success"] == true));
    assert_eq!(app.transport.calls_to("UpdateCardField").len(), 10);
}

#[tokio::test]
async fn long_move_outlives_request_timeout() {
    let app = slow_app(
        pipefy_fixture().with_latency("MoveCardToPhase", Duration::from_millis(300)),
    );
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    let card_ids: Vec<String> = (0..8).map(|i| format!("card{i}")).collect();

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/cards/move",
        Some(&jwt),
        json!({ "card_ids": card_ids, "destination_phase_id": "ph2" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["message"], "8 of 8 cards moved");
}

#[tokio::test]
async fn interactive_steps_keep_request_timeout() {
    let app = slow_app(
        pipefy_fixture().with_latency("GetPipePhases", Duration::from_millis(1500)),
    );
    let jwt = pipefy_user(&app.router, "ana@example.com").await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/phases",
        Some(&jwt),
        json!({ "pipe_id": "301" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
}

// ---------------------------------------------------------------------------
// Moves and session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn partial_move_is_an_overall_success() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/cards/move",
        Some(&jwt),
        json!({ "card_ids": ["c1", "locked"], "destination_phase_id": "ph2" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["success"], true);
    assert_eq!(json["data"]["message"], "1 of 2 cards moved");
    let results: &Vec<Value> = json["data"]["results"].as_array().unwrap();
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[1]["card_id"], "locked");
    assert_eq!(results[1]["success"], false);
    assert!(results[1]["message"]
        .as_str()
        .unwrap()
        .contains("Phase transition not allowed"));
}

#[tokio::test]
async fn move_with_every_card_failing_is_a_failure() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/cards/move",
        Some(&jwt),
        json!({ "card_ids": ["locked"], "destination_phase_id": "ph2" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["success"], false);
    assert_eq!(json["data"]["message"], "No cards could be moved");
}

#[tokio::test]
async fn reset_session_clears_the_flow() {
    let app = build_test_app(pipefy_fixture());
    let jwt = pipefy_user(&app.router, "ana@example.com").await;
    load_phase(&app, &jwt).await;

    let response = delete(&app.router, "/api/v1/pipefy/session", Some(&jwt)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/selection",
        Some(&jwt),
        json!({ "selected_fields": ["Name"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "PRECONDITION_MISSING");
}

#[tokio::test]
async fn flows_are_isolated_per_caller() {
    let app = build_test_app(pipefy_fixture());
    let ana = pipefy_user(&app.router, "ana@example.com").await;
    let bob = pipefy_user(&app.router, "bob@example.com").await;
    load_phase(&app, &ana).await;

    let response = post_json(
        &app.router,
        "/api/v1/pipefy/selection",
        Some(&bob),
        json!({ "selected_fields": ["Name"] }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "PRECONDITION_MISSING");
}
