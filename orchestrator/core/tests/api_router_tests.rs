// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use std::sync::Arc;
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::Harness;
use funcgen_core::application::llm_config::LlmConfigService;
use funcgen_core::domain::generation::RecordId;
use funcgen_core::domain::llm::{LlmConfig, LlmConfigId};
use funcgen_core::domain::request_context::TRACE_ID_HEADER;
use funcgen_core::presentation::api::{app, AppState};

fn router(h: &Harness) -> Router {
    app(AppState {
        chat_service: h.chat.clone(),
        callback_use_case: h.callback.clone(),
        llm_configs: Arc::new(LlmConfigService::new(h.repos.llm_configs.clone())),
        start_time: Instant::now(),
    })
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value, Option<String>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let trace = response
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body, trace)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-Request-User", "alice")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_echoes_supplied_trace_id() {
    let h = Harness::new().await;
    let request = Request::builder()
        .uri("/health")
        .header(TRACE_ID_HEADER, "abc-123")
        .body(Body::empty())
        .unwrap();

    let (status, body, trace) = send(&router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(trace.as_deref(), Some("abc-123"));
}

#[tokio::test]
async fn test_chat_turn_over_http() {
    let h = Harness::new().await;
    let router = router(&h);

    let (status, body, trace) = send(
        &router,
        post_json(
            "/agent/chat/function_gen",
            json!({"agent_id": 1, "tree_id": 42, "message": {"content": "hi"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "generating");
    assert_eq!(trace.map(|t| t.len()), Some(32));

    let record_id = body["record_id"].as_i64().unwrap();
    let session_id = body["session_id"].as_str().unwrap().to_string();
    h.settle(RecordId(record_id)).await;

    let (status, body, _) = send(
        &router,
        get(&format!("/agent/chat/function_gen/status?record_id={}", record_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "generating");
    assert_eq!(body["code"], "print(1)");

    let (status, body, _) = send(&router, get(&format!("/agent/chat/messages?session_id={}", session_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    assert_eq!(body[0]["user"], "alice");

    let (status, body, _) = send(&router, get("/agent/chat/sessions?tree_id=42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 20);
    assert_eq!(body["items"][0]["session_id"], session_id.as_str());
}

#[tokio::test]
async fn test_error_mapping() {
    let h = Harness::new().await;
    let router = router(&h);

    let (status, body, _) = send(
        &router,
        post_json(
            "/agent/chat/function_gen",
            json!({"agent_id": 77, "tree_id": 42, "message": {"content": "hi"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "not_found");

    let (status, body, _) = send(&router, get("/agent/chat/messages?session_id=not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn test_callback_conflict_is_409() {
    let h = Harness::new().await;
    let router = router(&h);

    let (_, body, _) = send(
        &router,
        post_json(
            "/agent/chat/function_gen",
            json!({"agent_id": 1, "tree_id": 42, "message": {"content": "hi"}}),
        ),
    )
    .await;
    let record_id = body["record_id"].as_i64().unwrap();
    h.settle(RecordId(record_id)).await;

    let callback = "/agent/api/v1/workspace/update/callback";
    let ok = json!({"record_id": record_id, "success": true, "full_code_paths": ["/u/a/pkg/f.py"]});
    let (status, body, _) = send(&router, post_json(callback, ok.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], true);

    let (status, body, _) = send(&router, post_json(callback, ok)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], false);

    let (status, body, _) = send(
        &router,
        post_json(callback, json!({"record_id": record_id, "success": false, "error": "late"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "callback_conflict");
}

#[tokio::test]
async fn test_close_session_and_set_default() {
    let h = Harness::new().await;
    let router = router(&h);

    let (_, body, _) = send(
        &router,
        post_json(
            "/agent/chat/function_gen",
            json!({"agent_id": 1, "tree_id": 42, "message": {"content": "hi"}}),
        ),
    )
    .await;
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let (status, body, _) = send(
        &router,
        post_json("/agent/chat/sessions/close", json!({"session_id": session_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "done");

    let (status, body, _) = send(
        &router,
        post_json(
            "/agent/chat/function_gen",
            json!({"agent_id": 1, "tree_id": 42, "session_id": session_id, "message": {"content": "more"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "session_closed");

    h.repos
        .llm_configs
        .save(&LlmConfig::new(LlmConfigId(2), "ollama", "llama3.2"))
        .await
        .unwrap();
    let (status, _, _) = send(&router, post_json("/agent/llm_config/set_default", json!({"id": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    let default = h.repos.llm_configs.find_default().await.unwrap().unwrap();
    assert_eq!(default.id, LlmConfigId(2));

    let (status, body, _) = send(&router, post_json("/agent/llm_config/set_default", json!({"id": 9}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "not_found");
}
