//! API endpoint integration tests

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine;
use serde_json::json;
use tower::ServiceExt;
use voxtask_gateway::Result;
use voxtask_gateway::voice::{SpeechToText, Transcript};

mod common;
use common::{create_test_user, request, send, setup_test_db, test_server};

/// Transcribes every clip to the same phrase
struct FixedStt(&'static str);

#[async_trait]
impl SpeechToText for FixedStt {
    async fn transcribe(&self, _audio: &[u8], _language: Option<&str>) -> Result<Transcript> {
        Ok(Transcript::final_result(self.0, 0.92))
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn test_router() -> axum::Router {
    let db = setup_test_db();
    create_test_user(&db, "alice");
    test_server(db).build().router()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_router();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint() {
    let app = test_router();

    let (status, json) = send(
        &app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["checks"]["database"]["status"], "ok");
    assert_eq!(json["checks"]["stt"]["status"], "unavailable");
}

#[tokio::test]
async fn test_api_requires_key() {
    let app = test_router();

    let (status, json) = send(
        &app,
        Request::builder()
            .uri("/api/tasks")
            .header("x-user-id", "alice")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_unknown_user_rejected() {
    let app = test_router();

    let (status, json) = send(&app, request("GET", "/api/tasks", "mallory", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["message"], "unknown user");
}

#[tokio::test]
async fn test_text_command_creates_task() {
    let app = test_router();

    let (status, json) = send(
        &app,
        request(
            "POST",
            "/api/voice/command",
            "alice",
            Some(json!({ "text": "create task buy milk" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["intent"], "task_create");
    assert_eq!(json["actionResult"]["type"], "task_created");
    assert_eq!(json["actionResult"]["task"]["title"], "buy milk");
    assert_eq!(json["feedback"], "Created task \"buy milk\".");
    assert_eq!(json["replayed"], false);

    let (_, tasks) = send(&app, request("GET", "/api/tasks", "alice", None)).await;
    assert_eq!(tasks.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_repeated_command_id_replays() {
    let app = test_router();
    let body = json!({ "text": "add expense $4.50 for food", "commandId": "cmd-1" });

    let (_, first) = send(&app, request("POST", "/api/voice/command", "alice", Some(body.clone()))).await;
    let (status, second) = send(&app, request("POST", "/api/voice/command", "alice", Some(body))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["replayed"], false);
    assert_eq!(second["replayed"], true);
    assert_eq!(first["actionResult"], second["actionResult"]);

    let (_, records) = send(&app, request("GET", "/api/financial/records", "alice", None)).await;
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["amount"], "4.50");
}

#[tokio::test]
async fn test_pre_extracted_command_skips_extraction() {
    let app = test_router();

    let (status, json) = send(
        &app,
        request(
            "POST",
            "/api/voice/command",
            "alice",
            Some(json!({
                "text": "whatever the client heard",
                "intent": "income_add",
                "entities": { "amount": 1500, "category": "salary" },
                "confidence": 0.8
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["intent"], "income_add");
    assert_eq!(json["actionResult"]["record"]["category"], "salary");
    assert_eq!(json["feedback"], "Added income of $1500.00 from salary.");
}

#[tokio::test]
async fn test_unrecognized_command_is_not_an_error() {
    let app = test_router();

    let (status, json) = send(
        &app,
        request(
            "POST",
            "/api/voice/command",
            "alice",
            Some(json!({ "text": "the weather is nice" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["intent"], "unknown");
    assert_eq!(json["actionResult"]["type"], "not_understood");
}

#[tokio::test]
async fn test_empty_command_rejected() {
    let app = test_router();

    let (status, json) = send(
        &app,
        request("POST", "/api/voice/command", "alice", Some(json!({ "text": "   " }))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_process_command_without_stt() {
    let app = test_router();

    let (status, json) = send(
        &app,
        request(
            "POST",
            "/api/voice/process-command",
            "alice",
            Some(json!({ "audioData": "AAAA" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "not_configured");
}

#[tokio::test]
async fn test_process_command_transcribes_audio() {
    let db = setup_test_db();
    create_test_user(&db, "alice");
    let app = test_server(db)
        .stt(Arc::new(FixedStt("list my tasks")))
        .build()
        .router();
    let audio = base64::engine::general_purpose::STANDARD.encode(b"RIFF....WAVE");

    let (status, json) = send(
        &app,
        request(
            "POST",
            "/api/voice/process-command",
            "alice",
            Some(json!({ "audioData": audio })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["transcription"], "list my tasks");
    assert_eq!(json["intent"], "task_list");
    assert_eq!(json["actionResult"]["totalPending"], 0);
    assert_eq!(json["feedback"], "You have no pending tasks.");
}

#[tokio::test]
async fn test_invalid_audio_rejected() {
    let db = setup_test_db();
    create_test_user(&db, "alice");
    let app = test_server(db).stt(Arc::new(FixedStt("help"))).build().router();

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/voice/process-command",
            "alice",
            Some(json!({ "audioData": "not base64!" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_command_history_newest_first() {
    let app = test_router();

    for text in ["create task first", "create task second", "tell me a joke"] {
        send(&app, request("POST", "/api/voice/command", "alice", Some(json!({ "text": text })))).await;
    }

    let (status, json) = send(&app, request("GET", "/api/voice/commands?limit=2", "alice", None)).await;

    assert_eq!(status, StatusCode::OK);
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["intent"], "joke");
    assert_eq!(entries[1]["transcription"], "create task second");
}

#[tokio::test]
async fn test_task_endpoints() {
    let app = test_router();

    let (status, created) = send(
        &app,
        request(
            "POST",
            "/api/tasks",
            "alice",
            Some(json!({ "title": "file taxes", "priority": "high", "dueDate": "2026-12-01" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["priority"], "high");

    let (status, _) = send(&app, request("GET", "/api/tasks?status=archived", "alice", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, pending) = send(&app, request("GET", "/api/tasks?status=pending", "alice", None)).await;
    assert_eq!(pending[0]["title"], "file taxes");
}

#[tokio::test]
async fn test_financial_summary_endpoint() {
    let app = test_router();

    for record in [
        json!({ "type": "income", "amount": "2000", "category": "salary", "date": "2026-10-01" }),
        json!({ "type": "expense", "amount": 45.5, "category": "food", "date": "2026-10-03" }),
        json!({ "type": "expense", "amount": 30, "category": "transport", "date": "2026-09-20" }),
    ] {
        let (status, _) = send(&app, request("POST", "/api/financial/records", "alice", Some(record))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = send(
        &app,
        request(
            "GET",
            "/api/financial/summary?start=2026-10-01&end=2026-10-31",
            "alice",
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalIncome"], "2000.00");
    assert_eq!(json["totalExpenses"], "45.50");
    assert_eq!(json["net"], "1954.50");
    assert_eq!(json["recordCount"], 2);

    let (status, _) = send(
        &app,
        request("GET", "/api/financial/summary?start=2026-10-01", "alice", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let db = setup_test_db();
    create_test_user(&db, "alice");
    create_test_user(&db, "bob");
    let app = test_server(db).build().router();

    send(
        &app,
        request("POST", "/api/voice/command", "alice", Some(json!({ "text": "create task secret plan" }))),
    )
    .await;

    let (_, tasks) = send(&app, request("GET", "/api/tasks", "bob", None)).await;
    assert!(tasks.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_voice_status() {
    let app = test_router();

    let (status, json) = send(&app, request("GET", "/api/voice/status", "alice", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sttLoaded"], false);
    assert_eq!(json["responder"], "template");
    assert_eq!(json["language"], "en-US");
}

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let db = setup_test_db();
    let app = test_server(db).rate_limit(Some(1)).build().router();

    let health = || Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (first, _) = send(&app, health()).await;
    let (second, json) = send(&app, health()).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");
}
