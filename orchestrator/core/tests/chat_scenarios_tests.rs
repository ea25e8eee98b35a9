// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end chat turns over in-memory storage.

mod common;

use std::sync::Arc;

use common::{ctx, Harness, KNOWLEDGE_AGENT, PLUGIN_AGENT};
use funcgen_core::application::callback::{WorkspaceCallbackRequest, WorkspaceCallbackUseCase};
use funcgen_core::application::chat::{
    ChatInput, FunctionGenChatRequest, FunctionGenChatService, GENERATING_CONTENT,
};
use funcgen_core::domain::agent::{Agent, AgentId, AgentType};
use funcgen_core::domain::chat::{SessionId, SessionStatus, TreeId};
use funcgen_core::domain::error::ServiceError;
use funcgen_core::domain::generation::{RecordId, RecordStatus};
use funcgen_core::domain::knowledge::KnowledgeBaseId;
use funcgen_core::domain::llm::{LlmConfig, LlmConfigId, MessageRole};
use funcgen_core::domain::repository::Page;
use funcgen_core::domain::workspace::PluginOutput;

fn turn(agent_id: AgentId, session_id: Option<SessionId>, content: &str) -> FunctionGenChatRequest {
    FunctionGenChatRequest {
        agent_id,
        tree_id: TreeId(42),
        session_id: session_id.map(|s| s.to_string()),
        message: ChatInput {
            content: content.to_string(),
            files: None,
        },
        package: None,
        existing_files: None,
    }
}

fn success(record_id: RecordId) -> WorkspaceCallbackRequest {
    WorkspaceCallbackRequest {
        record_id,
        message_id: None,
        success: true,
        full_code_paths: Some(vec!["/u/a/pkg/f.py".to_string()]),
        app_code: Some("app".to_string()),
        error: None,
    }
}

#[tokio::test]
async fn test_happy_path_knowledge_agent() {
    let h = Harness::new().await;

    let response = h.chat.chat(&ctx(), turn(KNOWLEDGE_AGENT, None, "hi")).await.unwrap();
    assert_eq!(response.status, "generating");
    assert_eq!(response.content, GENERATING_CONTENT);
    assert!(response.record_id.0 > 0);

    let record = h.settle(response.record_id).await;
    assert_eq!(record.code, "print(1)");
    assert_eq!(record.status, RecordStatus::Generating);

    let messages = h.chat.list_messages(response.session_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!((messages[0].role.as_str(), messages[0].content.as_str()), ("user", "hi"));
    assert_eq!(messages[1].role, "assistant");
    assert_eq!(messages[1].content, common::DEFAULT_REPLY);
    assert_eq!(record.message_id, messages[0].id);

    let request = h.last_request();
    assert_eq!(request.model, "gpt-4o");
    assert_eq!(request.messages[0].role, MessageRole::System);
    assert_eq!(request.messages[0].content, "You code.\n\n## rules\nuse tabs");
    assert_eq!(request.messages.len(), 2);
    assert_eq!(request.messages[1].content, "hi");

    let submission = h.workspace.submissions.lock()[0].clone();
    assert_eq!(submission.code, "print(1)");
    assert_eq!(submission.source_code, "print(1)");
    assert_eq!(submission.tree_id, TreeId(42));
    assert!(submission.is_async);

    h.callback.handle(&ctx(), success(response.record_id)).await.unwrap();
    let record = h.chat.record_status(response.record_id).await.unwrap();
    assert_eq!(record.status, RecordStatus::Completed);
    assert_eq!(record.full_code_paths, vec!["/u/a/pkg/f.py".to_string()]);

    let session = h.repos.sessions.find_by_session_id(response.session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Idle);
    assert_eq!(session.title, "hi");
}

#[tokio::test]
async fn test_busy_session_rejects_without_writes() {
    let h = Harness::new().await;
    let first = h.chat.chat(&ctx(), turn(KNOWLEDGE_AGENT, None, "hi")).await.unwrap();
    h.settle(first.record_id).await;

    let err = h
        .chat
        .chat(&ctx(), turn(KNOWLEDGE_AGENT, Some(first.session_id), "again"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SessionBusy(_)));

    assert_eq!(h.chat.list_messages(first.session_id).await.unwrap().len(), 2);
    let generating = h.repos.records.find_generating_by_session(first.session_id).await.unwrap();
    assert_eq!(generating.len(), 1);
    assert!(h.chat.record_status(RecordId(2)).await.is_err());
}

#[tokio::test]
async fn test_follow_up_turn_replays_history() {
    let h = Harness::new().await;
    let first = h.chat.chat(&ctx(), turn(KNOWLEDGE_AGENT, None, "hi")).await.unwrap();
    h.settle(first.record_id).await;
    h.callback.handle(&ctx(), success(first.record_id)).await.unwrap();

    let second = h
        .chat
        .chat(&ctx(), turn(KNOWLEDGE_AGENT, Some(first.session_id), "again"))
        .await
        .unwrap();
    assert_eq!(second.session_id, first.session_id);
    h.settle(second.record_id).await;

    let roles: Vec<MessageRole> = h.last_request().messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![MessageRole::System, MessageRole::User, MessageRole::Assistant, MessageRole::User]
    );
    assert_eq!(h.last_request().messages[3].content, "again");

    // Title is only synthesized when the session is opened.
    let session = h.repos.sessions.find_by_session_id(first.session_id).await.unwrap().unwrap();
    assert_eq!(session.title, "hi");
}

#[tokio::test]
async fn test_concurrent_turns_admit_exactly_one() {
    let h = Arc::new(Harness::new().await);
    let first = h.chat.chat(&ctx(), turn(KNOWLEDGE_AGENT, None, "hi")).await.unwrap();
    h.settle(first.record_id).await;
    h.callback.handle(&ctx(), success(first.record_id)).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let h = h.clone();
        let session_id = first.session_id;
        handles.push(tokio::spawn(async move {
            h.chat
                .chat(&ctx(), turn(KNOWLEDGE_AGENT, Some(session_id), &format!("turn {}", i)))
                .await
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(e) => assert!(matches!(e, ServiceError::SessionBusy(_)), "unexpected {:?}", e),
        }
    }
    assert_eq!(admitted, 1);
}

#[tokio::test]
async fn test_plugin_output_reaches_llm() {
    let h = Harness::new().await;
    *h.workspace.plugin_reply.lock() = PluginOutput {
        data: "EXTRA".to_string(),
        error: None,
    };

    let response = h.chat.chat(&ctx(), turn(PLUGIN_AGENT, None, "base")).await.unwrap();
    let record = h.settle(response.record_id).await;

    let request = h.last_request();
    assert_eq!(request.messages[0].content, "You code.\n\n## rules\nuse tabs");
    assert_eq!(request.messages.last().unwrap().content, "base\n\nEXTRA");
    assert_eq!(h.workspace.plugin_calls.lock()[0].content, "base");
    assert_eq!(record.plugin_output.as_deref(), Some("EXTRA"));
}

#[tokio::test]
async fn test_plugin_error_fails_turn_and_record() {
    let h = Harness::new().await;
    *h.workspace.plugin_reply.lock() = PluginOutput {
        data: String::new(),
        error: Some("boom".to_string()),
    };

    let err = h.chat.chat(&ctx(), turn(PLUGIN_AGENT, None, "base")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Plugin(ref m) if m == "boom"));

    let record = h.chat.record_status(RecordId(1)).await.unwrap();
    assert_eq!(record.status, RecordStatus::Failed);
    assert!(record.error_msg.contains("boom"));

    let session = h.repos.sessions.find_by_session_id(record.session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Idle);
    assert!(h.llm.requests.lock().is_empty());
}

#[tokio::test]
async fn test_missing_default_llm_writes_nothing() {
    let h = Harness::without_default_llm().await;

    let err = h.chat.chat(&ctx(), turn(KNOWLEDGE_AGENT, None, "hi")).await.unwrap_err();
    assert!(matches!(err, ServiceError::NoDefaultLlm));

    let (sessions, total) = h.repos.sessions.list_by_tree(TreeId(42), Page::default()).await.unwrap();
    assert!(sessions.is_empty());
    assert_eq!(total, 0);
    assert!(h.chat.record_status(RecordId(1)).await.is_err());
}

#[tokio::test]
async fn test_unknown_provider_is_config_error() {
    let h = Harness::without_default_llm().await;
    h.repos
        .llm_configs
        .save(&LlmConfig::new(LlmConfigId(3), "unsupported", "m"))
        .await
        .unwrap();
    let mut agent = Agent::new(AgentId(5), "bound", AgentType::KnowledgeOnly, KnowledgeBaseId(1));
    agent.llm_config_id = Some(LlmConfigId(3));
    h.repos.agents.save(&agent).await.unwrap();

    let err = h.chat.chat(&ctx(), turn(AgentId(5), None, "hi")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Config(_)));
}

#[tokio::test]
async fn test_extractor_fallback_and_first_block() {
    let h = Harness::new().await;

    h.set_reply("just words");
    let plain = h.chat.chat(&ctx(), turn(KNOWLEDGE_AGENT, None, "a")).await.unwrap();
    assert_eq!(h.settle(plain.record_id).await.code, "just words");

    h.set_reply("one:\n```rust\n  fn a() {}  \n```\ntwo:\n```rust\nfn b() {}\n```\n");
    let fenced = h.chat.chat(&ctx(), turn(KNOWLEDGE_AGENT, None, "b")).await.unwrap();
    assert_eq!(h.settle(fenced.record_id).await.code, "fn a() {}");
}

#[tokio::test]
async fn test_callback_idempotence_and_conflict() {
    let h = Harness::new().await;
    let response = h.chat.chat(&ctx(), turn(KNOWLEDGE_AGENT, None, "hi")).await.unwrap();
    h.settle(response.record_id).await;

    let first = h.callback.handle(&ctx(), success(response.record_id)).await.unwrap();
    assert!(first.applied);
    let second = h.callback.handle(&ctx(), success(response.record_id)).await.unwrap();
    assert!(!second.applied);

    let failure = WorkspaceCallbackRequest {
        success: false,
        full_code_paths: None,
        error: Some("late failure".to_string()),
        ..success(response.record_id)
    };
    let err = h.callback.handle(&ctx(), failure).await.unwrap_err();
    assert!(matches!(err, ServiceError::CallbackConflict(_)));

    let record = h.chat.record_status(response.record_id).await.unwrap();
    assert_eq!(record.status, RecordStatus::Completed);
    assert!(record.error_msg.is_empty());
}

#[tokio::test]
async fn test_agent_and_session_rejections() {
    let h = Harness::new().await;

    let err = h.chat.chat(&ctx(), turn(AgentId(99), None, "hi")).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let mut disabled = Agent::new(AgentId(6), "off", AgentType::KnowledgeOnly, KnowledgeBaseId(1));
    disabled.enabled = false;
    h.repos.agents.save(&disabled).await.unwrap();
    let err = h.chat.chat(&ctx(), turn(AgentId(6), None, "hi")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Disabled(_)));

    let err = h
        .chat
        .chat(&ctx(), turn(KNOWLEDGE_AGENT, Some(SessionId::new()), "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    let response = h.chat.chat(&ctx(), turn(KNOWLEDGE_AGENT, None, "hi")).await.unwrap();
    h.chat.close_session(&ctx(), response.session_id).await.unwrap();
    let err = h
        .chat
        .chat(&ctx(), turn(KNOWLEDGE_AGENT, Some(response.session_id), "more"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SessionClosed(_)));

    // The in-flight job still finalizes its record; the session stays closed.
    h.settle(response.record_id).await;
    h.callback.handle(&ctx(), success(response.record_id)).await.unwrap();
    let session = h.repos.sessions.find_by_session_id(response.session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Done);
}

#[tokio::test]
async fn test_generation_count_is_incremented() {
    let h = Harness::new().await;
    let response = h.chat.chat(&ctx(), turn(KNOWLEDGE_AGENT, None, "hi")).await.unwrap();
    h.settle(response.record_id).await;

    for _ in 0..100 {
        let agent = h.repos.agents.find_by_id(KNOWLEDGE_AGENT).await.unwrap().unwrap();
        if agent.generation_count == 1 {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("generation count never incremented");
}

#[tokio::test]
async fn test_agent_timeout_bounds_the_llm_client() {
    let h = Harness::new().await;
    let mut agent = h.repos.agents.find_by_id(KNOWLEDGE_AGENT).await.unwrap().unwrap();
    agent.timeout_seconds = 1200;
    h.repos.agents.save(&agent).await.unwrap();

    let response = h.chat.chat(&ctx(), turn(KNOWLEDGE_AGENT, None, "slow model")).await.unwrap();
    h.settle(response.record_id).await;

    let timeouts = h.factory.timeouts.lock().clone();
    assert_eq!(timeouts, vec![std::time::Duration::from_secs(1200)]);
}
