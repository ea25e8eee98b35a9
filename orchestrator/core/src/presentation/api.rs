// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HTTP API
//!
//! Axum router for the agent server. Handlers only translate between HTTP
//! and the application services; every response echoes `X-Trace-Id`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

use crate::application::callback::{CallbackAck, WorkspaceCallbackRequest, WorkspaceCallbackUseCase};
use crate::application::chat::{
    FunctionGenChatRequest, FunctionGenChatResponse, FunctionGenChatService, SessionPage,
};
use crate::application::llm_config::LlmConfigService;
use crate::domain::chat::{ChatMessage, SessionId, TreeId};
use crate::domain::error::ServiceError;
use crate::domain::generation::{FunctionGenRecord, RecordId};
use crate::domain::llm::LlmConfigId;
use crate::domain::repository::Page;
use crate::domain::request_context::{
    new_trace_id, RequestContext, DEPARTMENT_HEADER, REQUEST_USER_HEADER, TOKEN_HEADER, TRACE_ID_HEADER,
};

#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<dyn FunctionGenChatService>,
    pub callback_use_case: Arc<dyn WorkspaceCallbackUseCase>,
    pub llm_configs: Arc<LlmConfigService>,
    pub start_time: Instant,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/agent/chat/function_gen", post(function_gen_chat_handler))
        .route("/agent/chat/function_gen/status", get(record_status_handler))
        .route("/agent/chat/sessions", get(list_sessions_handler))
        .route("/agent/chat/sessions/close", post(close_session_handler))
        .route("/agent/chat/messages", get(list_messages_handler))
        .route("/agent/llm_config/set_default", post(set_default_llm_handler))
        .route("/agent/api/v1/workspace/update/callback", post(workspace_callback_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(propagate_trace_id)),
        )
        .with_state(Arc::new(state))
}

// ============================================================================
// Request context
// ============================================================================

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    header_value(headers, AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let mut ctx = RequestContext::new(header_value(headers, REQUEST_USER_HEADER).unwrap_or_default());

        if let Some(trace_id) = header_value(headers, TRACE_ID_HEADER) {
            ctx = ctx.with_trace_id(trace_id);
        }
        if let Some(token) = header_value(headers, TOKEN_HEADER).or_else(|| bearer_token(headers)) {
            ctx = ctx.with_token(token);
        }
        if let Some(dept) = header_value(headers, DEPARTMENT_HEADER) {
            ctx = ctx.with_department(dept);
        }
        Ok(ctx)
    }
}

/// Assigns a trace id to requests that arrive without one and echoes it back.
async fn propagate_trace_id(mut request: Request, next: Next) -> Response {
    let trace_id = header_value(request.headers(), TRACE_ID_HEADER)
        .map(str::to_string)
        .unwrap_or_else(new_trace_id);

    let value = HeaderValue::from_str(&trace_id).ok();
    if let Some(value) = &value {
        request.headers_mut().insert(TRACE_ID_HEADER, value.clone());
    }

    let mut response = next.run(request).await;
    if let Some(value) = value {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

// ============================================================================
// Errors
// ============================================================================

pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::NotFound(_)
        | ServiceError::Disabled(_)
        | ServiceError::SessionClosed(_)
        | ServiceError::SessionBusy(_)
        | ServiceError::Config(_)
        | ServiceError::NoDefaultLlm
        | ServiceError::Plugin(_)
        | ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::CallbackConflict(_) => StatusCode::CONFLICT,
        ServiceError::Transport(_) => StatusCode::BAD_GATEWAY,
        ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(kind = self.0.kind(), error = %self.0, "Request failed");
        } else {
            debug!(kind = self.0.kind(), error = %self.0, "Request rejected");
        }

        let body = Json(json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_session_id(raw: &str) -> Result<SessionId, ApiError> {
    SessionId::from_string(raw)
        .map_err(|e| ApiError(ServiceError::InvalidInput(format!("session_id {:?}: {}", raw, e))))
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

async fn function_gen_chat_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(request): Json<FunctionGenChatRequest>,
) -> ApiResult<FunctionGenChatResponse> {
    let response = state.chat_service.chat(&ctx, request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct RecordStatusQuery {
    pub record_id: i64,
}

#[derive(Debug, Serialize)]
pub struct RecordStatusView {
    pub record_id: RecordId,
    pub session_id: SessionId,
    pub status: String,
    pub code: String,
    pub error_msg: String,
    pub duration_seconds: f64,
    pub full_code_paths: Vec<String>,
}

impl From<FunctionGenRecord> for RecordStatusView {
    fn from(record: FunctionGenRecord) -> Self {
        Self {
            record_id: record.id,
            session_id: record.session_id,
            status: record.status.as_str().to_string(),
            code: record.code,
            error_msg: record.error_msg,
            duration_seconds: record.duration_seconds,
            full_code_paths: record.full_code_paths,
        }
    }
}

async fn record_status_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordStatusQuery>,
) -> ApiResult<RecordStatusView> {
    let record = state.chat_service.record_status(RecordId(query.record_id)).await?;
    Ok(Json(record.into()))
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub tree_id: i64,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListSessionsQuery>,
) -> ApiResult<SessionPage> {
    let page = Page::new(query.page, query.page_size);
    let sessions = state.chat_service.list_sessions(TreeId(query.tree_id), page).await?;
    Ok(Json(sessions))
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

async fn list_messages_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Vec<ChatMessage>> {
    let session_id = parse_session_id(&query.session_id)?;
    let messages = state.chat_service.list_messages(session_id).await?;
    Ok(Json(messages))
}

async fn close_session_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(body): Json<SessionQuery>,
) -> ApiResult<serde_json::Value> {
    let session_id = parse_session_id(&body.session_id)?;
    state.chat_service.close_session(&ctx, session_id).await?;
    Ok(Json(json!({ "session_id": session_id, "status": "done" })))
}

#[derive(Debug, Deserialize)]
pub struct SetDefaultLlmRequest {
    pub id: i64,
}

async fn set_default_llm_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetDefaultLlmRequest>,
) -> ApiResult<serde_json::Value> {
    state.llm_configs.set_default(LlmConfigId(body.id)).await?;
    Ok(Json(json!({ "id": body.id, "is_default": true })))
}

async fn workspace_callback_handler(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Json(request): Json<WorkspaceCallbackRequest>,
) -> ApiResult<CallbackAck> {
    let ack = state.callback_use_case.handle(&ctx, request).await?;
    Ok(Json(ack))
}
