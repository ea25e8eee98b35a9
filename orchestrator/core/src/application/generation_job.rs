// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Generation Job
//!
//! The detached half of a chat turn: call the LLM, persist the assistant
//! reply, extract code, and hand it to the workspace.
//!
//! # Flow
//!
//! 1. Call the LLM under its own cancellation token and an upper-bound timeout
//! 2. Persist the raw reply as an `assistant` message
//! 3. Extract the first fenced code block and store it on the record
//! 4. Submit the code to the workspace, which calls back later
//!
//! Any failure marks the record `failed` and returns the session to `idle`.
//! Failures are logged with the trace id and never reach the original caller.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Asynchronous LLM call, extraction and submission

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::agent::AgentId;
use crate::domain::chat::{MessageId, NewChatMessage, SessionId, SessionStatus, TreeId};
use crate::domain::code_extractor::extract_code;
use crate::domain::error::ServiceError;
use crate::domain::generation::{RecordId, RecordOutcome, TransitionOutcome};
use crate::domain::llm::{ChatRequest, LLMError, LLMProvider, MessageRole};
use crate::domain::repository::{ChatMessageRepository, ChatSessionRepository, FunctionGenRecordRepository};
use crate::domain::request_context::RequestContext;
use crate::domain::workspace::{CodeSubmission, WorkspaceGateway};

/// Storage and gateway handles the job needs after the request has returned
#[derive(Clone)]
pub struct JobDependencies {
    pub sessions: Arc<dyn ChatSessionRepository>,
    pub messages: Arc<dyn ChatMessageRepository>,
    pub records: Arc<dyn FunctionGenRecordRepository>,
    pub workspace: Arc<dyn WorkspaceGateway>,
}

pub struct GenerationJob {
    pub ctx: RequestContext,
    pub record_id: RecordId,
    pub message_id: MessageId,
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub tree_id: TreeId,
    pub client: Arc<dyn LLMProvider>,
    pub request: ChatRequest,
    pub timeout: Duration,
    pub deps: JobDependencies,
}

impl GenerationJob {
    /// Run on the tokio runtime, detached from the caller.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        info!(
            trace_id = %self.ctx.trace_id,
            record_id = %self.record_id,
            session_id = %self.session_id,
            provider = %self.client.provider(),
            "Generation job started"
        );

        match self.generate_and_submit().await {
            Ok(()) => {
                info!(trace_id = %self.ctx.trace_id, record_id = %self.record_id, "Code submitted, awaiting workspace callback");
            }
            Err(err) => {
                error!(
                    trace_id = %self.ctx.trace_id,
                    record_id = %self.record_id,
                    session_id = %self.session_id,
                    error = %err,
                    "Generation job failed"
                );
                fail_record(
                    &self.deps,
                    &self.ctx,
                    self.record_id,
                    self.session_id,
                    err.to_string(),
                )
                .await;
            }
        }
    }

    async fn call_llm(&self) -> Result<String, LLMError> {
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.client.chat(&self.request, &cancel)).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(LLMError::Timeout(self.timeout.as_secs()))
            }
        };

        metrics::histogram!("funcgen_llm_call_seconds").record(started.elapsed().as_secs_f64());
        result.map(|response| response.content)
    }

    async fn generate_and_submit(&self) -> Result<(), ServiceError> {
        let content = self.call_llm().await?;

        self.deps
            .messages
            .append(NewChatMessage {
                session_id: self.session_id,
                agent_id: self.agent_id,
                role: MessageRole::Assistant,
                content: content.clone(),
                files: None,
                user: self.ctx.user.clone(),
            })
            .await?;

        let code = extract_code(&content);
        self.deps.records.update_code(self.record_id, &code).await?;

        let submission = CodeSubmission::new(
            self.record_id,
            self.message_id,
            self.agent_id,
            self.tree_id,
            self.ctx.user.clone(),
            code,
        );
        let ack = self.deps.workspace.submit_generated_code(&self.ctx, &submission).await?;
        info!(trace_id = %self.ctx.trace_id, record_id = %ack.record_id, message = %ack.message, "Workspace acknowledged submission");

        Ok(())
    }
}

/// Mark the record failed and give the session back. Errors are logged only.
///
/// The session is released only when this call moved the record. A record
/// that already went terminal released its session then, and the session
/// may since belong to a newer turn.
pub async fn fail_record(
    deps: &JobDependencies,
    ctx: &RequestContext,
    record_id: RecordId,
    session_id: SessionId,
    error_msg: String,
) {
    match deps
        .records
        .finalize(record_id, RecordOutcome::Failed { error_msg })
        .await
    {
        Ok(TransitionOutcome::Applied) => {
            metrics::counter!("funcgen_generation_records_total", "status" => "failed").increment(1);
            release_session(deps.sessions.as_ref(), ctx, session_id).await;
        }
        Ok(TransitionOutcome::AlreadyTerminal) => {
            debug!(trace_id = %ctx.trace_id, record_id = %record_id, "Record already terminal; session left as is");
        }
        Err(e) => {
            warn!(trace_id = %ctx.trace_id, record_id = %record_id, error = %e, "Could not mark record failed");
        }
    }
}

/// `generating → idle`; a closed session stays closed.
pub async fn release_session(sessions: &dyn ChatSessionRepository, ctx: &RequestContext, session_id: SessionId) {
    if let Err(e) = sessions
        .transition_status(session_id, &[SessionStatus::Generating], SessionStatus::Idle)
        .await
    {
        warn!(trace_id = %ctx.trace_id, session_id = %session_id, error = %e, "Could not release session");
    }
}
