// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Shared harness for the chat scenario and router tests: in-memory
//! repositories, a scripted LLM and a recording workspace.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use funcgen_core::application::callback::StandardWorkspaceCallbackUseCase;
use funcgen_core::application::chat::{ChatSettings, StandardFunctionGenChatService};
use funcgen_core::application::repository_factory::Repositories;
use funcgen_core::domain::agent::{Agent, AgentId, AgentType};
use funcgen_core::domain::error::ServiceError;
use funcgen_core::domain::generation::{FunctionGenRecord, RecordId};
use funcgen_core::domain::knowledge::{DocumentStatus, KnowledgeBase, KnowledgeBaseId, KnowledgeDocument};
use funcgen_core::domain::llm::{
    ChatRequest, ChatResponse, FinishReason, LLMClientFactory, LLMError, LLMProvider, LlmConfig, LlmConfigId,
    TokenUsage,
};
use funcgen_core::domain::request_context::RequestContext;
use funcgen_core::domain::workspace::{CodeSubmission, PluginInput, PluginOutput, SubmissionAck, WorkspaceGateway};

pub const KNOWLEDGE_AGENT: AgentId = AgentId(1);
pub const PLUGIN_AGENT: AgentId = AgentId(2);
pub const DEFAULT_REPLY: &str = "Sure.\n```py\nprint(1)\n```\n";

pub struct ScriptedLlm {
    pub reply: Mutex<String>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn chat(&self, request: &ChatRequest, _cancel: &CancellationToken) -> Result<ChatResponse, LLMError> {
        self.requests.lock().push(request.clone());
        Ok(ChatResponse {
            content: self.reply.lock().clone(),
            usage: TokenUsage::default(),
            model: request.model.clone(),
            finish_reason: FinishReason::Stop,
        })
    }

    fn provider(&self) -> &str {
        "scripted"
    }
}

pub struct ScriptedFactory {
    pub llm: Arc<ScriptedLlm>,
    pub timeouts: Mutex<Vec<Duration>>,
}

impl LLMClientFactory for ScriptedFactory {
    fn create(&self, config: &LlmConfig, timeout: Duration) -> Result<Arc<dyn LLMProvider>, LLMError> {
        if config.provider == "unsupported" {
            return Err(LLMError::Configuration(format!("unknown provider {}", config.provider)));
        }
        self.timeouts.lock().push(timeout);
        Ok(self.llm.clone())
    }
}

#[derive(Default)]
pub struct RecordingWorkspace {
    pub plugin_reply: Mutex<PluginOutput>,
    pub plugin_calls: Mutex<Vec<PluginInput>>,
    pub submissions: Mutex<Vec<CodeSubmission>>,
}

#[async_trait]
impl WorkspaceGateway for RecordingWorkspace {
    async fn run_plugin(
        &self,
        _ctx: &RequestContext,
        _agent: &Agent,
        input: &PluginInput,
    ) -> Result<PluginOutput, ServiceError> {
        self.plugin_calls.lock().push(input.clone());
        Ok(self.plugin_reply.lock().clone())
    }

    async fn submit_generated_code(
        &self,
        _ctx: &RequestContext,
        submission: &CodeSubmission,
    ) -> Result<SubmissionAck, ServiceError> {
        self.submissions.lock().push(submission.clone());
        Ok(SubmissionAck {
            record_id: submission.record_id,
            message: "queued".to_string(),
        })
    }
}

pub struct Harness {
    pub repos: Repositories,
    pub llm: Arc<ScriptedLlm>,
    pub factory: Arc<ScriptedFactory>,
    pub workspace: Arc<RecordingWorkspace>,
    pub chat: Arc<StandardFunctionGenChatService>,
    pub callback: Arc<StandardWorkspaceCallbackUseCase>,
}

impl Harness {
    /// Two agents over one knowledge base and a default LLM config.
    pub async fn new() -> Self {
        let harness = Self::without_default_llm().await;
        harness
            .repos
            .llm_configs
            .save(&LlmConfig::new(LlmConfigId(1), "openai", "gpt-4o"))
            .await
            .unwrap();
        harness.repos.llm_configs.set_default(LlmConfigId(1)).await.unwrap();
        harness
    }

    pub async fn without_default_llm() -> Self {
        let repos = Repositories::in_memory();

        repos
            .knowledge
            .save_base(&KnowledgeBase {
                id: KnowledgeBaseId(1),
                name: "house rules".to_string(),
                status: "active".to_string(),
                document_count: 0,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        repos
            .knowledge
            .add_document(KnowledgeDocument {
                id: 0,
                knowledge_base_id: KnowledgeBaseId(1),
                status: DocumentStatus::Completed,
                title: "rules".to_string(),
                content: "use tabs".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let mut coder = Agent::new(KNOWLEDGE_AGENT, "coder", AgentType::KnowledgeOnly, KnowledgeBaseId(1));
        coder.system_prompt_template = "You code.".to_string();
        repos.agents.save(&coder).await.unwrap();

        let mut plugin = Agent::new(PLUGIN_AGENT, "form-coder", AgentType::Plugin, KnowledgeBaseId(1));
        plugin.system_prompt_template = "You code.".to_string();
        plugin.plugin_function_path = Some("/p/q".to_string());
        repos.agents.save(&plugin).await.unwrap();

        let llm = Arc::new(ScriptedLlm {
            reply: Mutex::new(DEFAULT_REPLY.to_string()),
            requests: Mutex::new(Vec::new()),
        });
        let factory = Arc::new(ScriptedFactory {
            llm: llm.clone(),
            timeouts: Mutex::new(Vec::new()),
        });
        let workspace = Arc::new(RecordingWorkspace::default());

        let chat = Arc::new(StandardFunctionGenChatService::new(
            repos.clone(),
            factory.clone(),
            workspace.clone(),
            ChatSettings::default(),
        ));
        let callback = Arc::new(StandardWorkspaceCallbackUseCase::new(
            repos.records.clone(),
            repos.sessions.clone(),
        ));

        Self {
            repos,
            llm,
            factory,
            workspace,
            chat,
            callback,
        }
    }

    pub fn set_reply(&self, reply: &str) {
        *self.llm.reply.lock() = reply.to_string();
    }

    pub fn last_request(&self) -> ChatRequest {
        self.llm.requests.lock().last().cloned().expect("no LLM request captured")
    }

    /// Wait until the detached job has either submitted the record or failed it.
    pub async fn settle(&self, record_id: RecordId) -> FunctionGenRecord {
        for _ in 0..200 {
            let submitted = self.workspace.submissions.lock().iter().any(|s| s.record_id == record_id);
            let record = self.repos.records.find_by_id(record_id).await.unwrap().unwrap();
            if submitted || record.status.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("generation job for record {} never settled", record_id);
    }
}

pub fn ctx() -> RequestContext {
    RequestContext::new("alice").with_token("tok")
}
