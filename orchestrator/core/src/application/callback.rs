// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Workspace Callback Use Case
//!
//! Receives the terminal status the workspace reports after ingesting
//! submitted code, and finalizes the generation record.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Finalize records, release sessions
//! - **Collaborators:**
//!   - Domain: FunctionGenRecord transition rules
//!   - Infrastructure: FunctionGenRecordRepository, ChatSessionRepository
//!
//! # Flow
//!
//! 1. Translate the callback into a `RecordOutcome`
//! 2. Finalize the record (status and paths written together)
//! 3. A repeat of the same terminal status is a no-op
//! 4. The opposite terminal status is a conflict
//! 5. On a fresh transition, release the owning session

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::application::generation_job::release_session;
use crate::domain::chat::MessageId;
use crate::domain::error::ServiceError;
use crate::domain::generation::{RecordId, RecordOutcome, TransitionOutcome, DEFAULT_CALLBACK_ERROR};
use crate::domain::repository::{ChatSessionRepository, FunctionGenRecordRepository};
use crate::domain::request_context::RequestContext;

/// Callback body posted by the workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceCallbackRequest {
    pub record_id: RecordId,
    #[serde(default)]
    pub message_id: Option<MessageId>,
    pub success: bool,
    #[serde(default)]
    pub full_code_paths: Option<Vec<String>>,
    #[serde(default)]
    pub app_code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkspaceCallbackRequest {
    pub fn outcome(&self) -> RecordOutcome {
        if self.success {
            RecordOutcome::Completed {
                full_code_paths: self.full_code_paths.clone().unwrap_or_default(),
            }
        } else {
            let error_msg = self
                .error
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .unwrap_or(DEFAULT_CALLBACK_ERROR)
                .to_string();
            RecordOutcome::Failed { error_msg }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackAck {
    pub record_id: RecordId,
    pub status: String,
    /// `false` when the record was already in the reported state
    pub applied: bool,
}

#[async_trait]
pub trait WorkspaceCallbackUseCase: Send + Sync {
    /// Apply a workspace callback to its record.
    ///
    /// # Errors
    ///
    /// - NotFound: no record with this id
    /// - CallbackConflict: record already holds the opposite terminal status
    /// - Persistence: storage failure
    async fn handle(
        &self,
        ctx: &RequestContext,
        request: WorkspaceCallbackRequest,
    ) -> Result<CallbackAck, ServiceError>;
}

pub struct StandardWorkspaceCallbackUseCase {
    records: Arc<dyn FunctionGenRecordRepository>,
    sessions: Arc<dyn ChatSessionRepository>,
}

impl StandardWorkspaceCallbackUseCase {
    pub fn new(records: Arc<dyn FunctionGenRecordRepository>, sessions: Arc<dyn ChatSessionRepository>) -> Self {
        Self { records, sessions }
    }
}

#[async_trait]
impl WorkspaceCallbackUseCase for StandardWorkspaceCallbackUseCase {
    async fn handle(
        &self,
        ctx: &RequestContext,
        request: WorkspaceCallbackRequest,
    ) -> Result<CallbackAck, ServiceError> {
        let outcome = request.outcome();
        let status = outcome.status();
        info!(
            trace_id = %ctx.trace_id,
            record_id = %request.record_id,
            success = request.success,
            app_code = request.app_code.as_deref().unwrap_or(""),
            "Workspace callback received"
        );

        let record = self
            .records
            .find_by_id(request.record_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("record {}", request.record_id)))?;

        if let Some(message_id) = request.message_id {
            if message_id != record.message_id {
                warn!(
                    record_id = %record.id,
                    expected = %record.message_id,
                    got = %message_id,
                    "Callback message id does not match record"
                );
            }
        }

        let applied = match self.records.finalize(record.id, outcome).await {
            Ok(TransitionOutcome::Applied) => true,
            Ok(TransitionOutcome::AlreadyTerminal) => false,
            Err(e) => {
                metrics::counter!("funcgen_callback_conflicts_total").increment(1);
                return Err(e.into());
            }
        };

        if applied {
            metrics::counter!("funcgen_generation_records_total", "status" => status.as_str()).increment(1);
            release_session(self.sessions.as_ref(), ctx, record.session_id).await;
            info!(record_id = %record.id, status = status.as_str(), "Record finalized");
        } else {
            info!(record_id = %record.id, status = status.as_str(), "Duplicate callback ignored");
        }

        Ok(CallbackAck {
            record_id: record.id,
            status: status.as_str().to_string(),
            applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentId;
    use crate::domain::chat::{ChatSession, SessionStatus, TreeId};
    use crate::domain::generation::{NewFunctionGenRecord, RecordStatus};
    use crate::infrastructure::repositories::{InMemoryChatSessionRepository, InMemoryFunctionGenRecordRepository};

    struct Fixture {
        use_case: StandardWorkspaceCallbackUseCase,
        records: Arc<InMemoryFunctionGenRecordRepository>,
        sessions: Arc<InMemoryChatSessionRepository>,
        session: ChatSession,
        record_id: RecordId,
    }

    async fn fixture() -> Fixture {
        let records = Arc::new(InMemoryFunctionGenRecordRepository::new());
        let sessions = Arc::new(InMemoryChatSessionRepository::new());
        let session = ChatSession::open(TreeId(42), AgentId(1), "alice");
        sessions.create(&session).await.unwrap();
        let record = records
            .create(NewFunctionGenRecord {
                session_id: session.session_id,
                message_id: MessageId(7),
                agent_id: AgentId(1),
                tree_id: TreeId(42),
            })
            .await
            .unwrap();

        Fixture {
            use_case: StandardWorkspaceCallbackUseCase::new(records.clone(), sessions.clone()),
            records,
            sessions,
            session,
            record_id: record.id,
        }
    }

    fn callback(record_id: RecordId, success: bool) -> WorkspaceCallbackRequest {
        WorkspaceCallbackRequest {
            record_id,
            message_id: Some(MessageId(7)),
            success,
            full_code_paths: success.then(|| vec!["/u/a/pkg/f.py".to_string()]),
            app_code: None,
            error: None,
        }
    }

    #[test]
    fn test_failure_without_error_uses_default_message() {
        let mut req = callback(RecordId(1), false);
        assert_eq!(
            req.outcome(),
            RecordOutcome::Failed { error_msg: DEFAULT_CALLBACK_ERROR.to_string() }
        );
        req.error = Some("compile error".into());
        assert_eq!(req.outcome(), RecordOutcome::Failed { error_msg: "compile error".into() });
    }

    #[tokio::test]
    async fn test_success_completes_record_and_releases_session() {
        let f = fixture().await;
        let ctx = RequestContext::new("workspace");
        let ack = f.use_case.handle(&ctx, callback(f.record_id, true)).await.unwrap();
        assert!(ack.applied);
        assert_eq!(ack.status, "completed");

        let record = f.records.find_by_id(f.record_id).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Completed);
        assert_eq!(record.full_code_paths, vec!["/u/a/pkg/f.py".to_string()]);

        let session = f.sessions.find_by_session_id(f.session.session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn test_repeat_is_noop_and_opposite_conflicts() {
        let f = fixture().await;
        let ctx = RequestContext::new("workspace");
        f.use_case.handle(&ctx, callback(f.record_id, true)).await.unwrap();

        let ack = f.use_case.handle(&ctx, callback(f.record_id, true)).await.unwrap();
        assert!(!ack.applied);

        let err = f.use_case.handle(&ctx, callback(f.record_id, false)).await.unwrap_err();
        assert!(matches!(err, ServiceError::CallbackConflict(_)));
        let record = f.records.find_by_id(f.record_id).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_record() {
        let f = fixture().await;
        let err = f
            .use_case
            .handle(&RequestContext::new("workspace"), callback(RecordId(999), true))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_closed_session_stays_closed() {
        let f = fixture().await;
        f.sessions
            .transition_status(
                f.session.session_id,
                &[SessionStatus::Idle, SessionStatus::Generating],
                SessionStatus::Done,
            )
            .await
            .unwrap();

        f.use_case
            .handle(&RequestContext::new("workspace"), callback(f.record_id, false))
            .await
            .unwrap();
        let session = f.sessions.find_by_session_id(f.session.session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Done);
    }
}
