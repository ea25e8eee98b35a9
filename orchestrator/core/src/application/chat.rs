// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Function Generation Chat Use Case
//!
//! Drives one chat turn up to the point where the LLM call can run on its
//! own, then hands the call to a detached [`GenerationJob`].
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Session admission, turn persistence, prompt assembly
//! - **Collaborators:**
//!   - Domain: ChatSession, FunctionGenRecord, Agent
//!   - Infrastructure: repositories, LLM client factory, workspace gateway
//!
//! # Flow
//!
//! 1. Resolve the agent
//! 2. Resolve the LLM config and build its client (nothing written yet)
//! 3. Admit the turn: open a session, or move an idle one to `generating`
//! 4. Persist the user message
//! 5. Title a brand-new session
//! 6. Create the generation record
//! 7. Load history and knowledge, run the plugin, assemble the prompt
//! 8. Spawn the generation job and acknowledge
//!
//! A failure in step 7 fails the record and releases the session before
//! the error reaches the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::application::generation_job::{fail_record, release_session, GenerationJob, JobDependencies};
use crate::application::knowledge::KnowledgeLoader;
use crate::application::llm_config::LlmConfigService;
use crate::application::repository_factory::Repositories;
use crate::domain::agent::{Agent, AgentId};
use crate::domain::chat::{
    synthesize_title, ChatMessage, ChatSession, NewChatMessage, SessionId, SessionStatus, TreeId,
};
use crate::domain::error::ServiceError;
use crate::domain::generation::{FunctionGenRecord, NewFunctionGenRecord, RecordId};
use crate::domain::llm::{ChatRequest, LLMClientFactory, LlmConfig, MessageRole, PromptMessage};
use crate::domain::repository::Page;
use crate::domain::request_context::RequestContext;
use crate::domain::server_config::GenerationConfig;
use crate::domain::workspace::{PluginInput, WorkspaceGateway};
use crate::infrastructure::prompt_assembler::PromptAssembler;

/// Acknowledgement text returned while the job runs
pub const GENERATING_CONTENT: &str = "Generating…";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatInput {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionGenChatRequest {
    pub agent_id: AgentId,
    pub tree_id: TreeId,
    /// Empty or absent opens a new session
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: ChatInput,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub existing_files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionGenChatResponse {
    pub session_id: SessionId,
    pub record_id: RecordId,
    pub status: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPage {
    pub items: Vec<ChatSession>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Knobs read from `spec.generation`
#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    pub default_timeout_secs: u64,
    pub history_limit: Option<usize>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            default_timeout_secs: 600,
            history_limit: None,
        }
    }
}

impl ChatSettings {
    /// Upper bound for one LLM call: the LLM config wins, then the agent,
    /// then `default_timeout_secs`.
    pub fn call_timeout(&self, llm: &LlmConfig, agent: &Agent) -> Duration {
        let fallback = if agent.timeout_seconds > 0 {
            u64::from(agent.timeout_seconds)
        } else {
            self.default_timeout_secs
        };
        Duration::from_secs(llm.effective_timeout_secs(fallback))
    }
}

impl From<&GenerationConfig> for ChatSettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            default_timeout_secs: config.default_timeout_seconds,
            history_limit: config.history_limit.filter(|n| *n > 0),
        }
    }
}

#[async_trait]
pub trait FunctionGenChatService: Send + Sync {
    /// Run the synchronous half of a chat turn and start the generation job.
    ///
    /// # Errors
    ///
    /// - NotFound: agent, session or LLM config missing
    /// - Disabled: agent is disabled
    /// - SessionClosed / SessionBusy: session refuses new input
    /// - Config / NoDefaultLlm: no usable LLM client
    /// - Plugin / Transport: plugin preprocessing failed
    /// - Persistence: storage failure
    async fn chat(
        &self,
        ctx: &RequestContext,
        request: FunctionGenChatRequest,
    ) -> Result<FunctionGenChatResponse, ServiceError>;

    async fn record_status(&self, record_id: RecordId) -> Result<FunctionGenRecord, ServiceError>;

    async fn list_sessions(&self, tree_id: TreeId, page: Page) -> Result<SessionPage, ServiceError>;

    async fn list_messages(&self, session_id: SessionId) -> Result<Vec<ChatMessage>, ServiceError>;

    /// Permanently close a session. An in-flight job still finalizes its record.
    async fn close_session(&self, ctx: &RequestContext, session_id: SessionId) -> Result<(), ServiceError>;
}

pub struct StandardFunctionGenChatService {
    repositories: Repositories,
    llm_configs: LlmConfigService,
    knowledge: KnowledgeLoader,
    llm_factory: Arc<dyn LLMClientFactory>,
    workspace: Arc<dyn WorkspaceGateway>,
    settings: ChatSettings,
}

/// Admitted session plus whether this turn opened it
struct Admission {
    session_id: SessionId,
    opened: bool,
}

impl StandardFunctionGenChatService {
    pub fn new(
        repositories: Repositories,
        llm_factory: Arc<dyn LLMClientFactory>,
        workspace: Arc<dyn WorkspaceGateway>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            llm_configs: LlmConfigService::new(repositories.llm_configs.clone()),
            knowledge: KnowledgeLoader::new(repositories.knowledge.clone()),
            repositories,
            llm_factory,
            workspace,
            settings,
        }
    }

    fn job_dependencies(&self) -> JobDependencies {
        JobDependencies {
            sessions: self.repositories.sessions.clone(),
            messages: self.repositories.messages.clone(),
            records: self.repositories.records.clone(),
            workspace: self.workspace.clone(),
        }
    }

    async fn resolve_agent(&self, agent_id: AgentId) -> Result<Agent, ServiceError> {
        let agent = self
            .repositories
            .agents
            .find_by_id(agent_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("agent {}", agent_id)))?;

        if !agent.enabled {
            return Err(ServiceError::Disabled(agent.name.clone()));
        }
        Ok(agent)
    }

    async fn admit(
        &self,
        ctx: &RequestContext,
        agent: &Agent,
        tree_id: TreeId,
        requested: Option<&str>,
    ) -> Result<Admission, ServiceError> {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());

        let Some(raw) = requested else {
            let session = ChatSession::open(tree_id, agent.id, ctx.user.clone());
            self.repositories.sessions.create(&session).await?;
            info!(trace_id = %ctx.trace_id, session_id = %session.session_id, tree_id = %tree_id, "Opened chat session");
            return Ok(Admission {
                session_id: session.session_id,
                opened: true,
            });
        };

        let session_id = SessionId::from_string(raw)
            .map_err(|e| ServiceError::InvalidInput(format!("session_id {:?}: {}", raw, e)))?;
        let session = self
            .repositories
            .sessions
            .find_by_session_id(session_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("session {}", session_id)))?;

        match session.status {
            SessionStatus::Done => return Err(ServiceError::SessionClosed(session_id.to_string())),
            SessionStatus::Generating => return Err(ServiceError::SessionBusy(session_id.to_string())),
            SessionStatus::Idle => {}
        }

        let won = self
            .repositories
            .sessions
            .transition_status(session_id, &[SessionStatus::Idle], SessionStatus::Generating)
            .await?;
        if !won {
            // Lost the race; report what the winner left behind.
            let current = self
                .repositories
                .sessions
                .find_by_session_id(session_id)
                .await?
                .map(|s| s.status);
            return Err(match current {
                Some(SessionStatus::Done) => ServiceError::SessionClosed(session_id.to_string()),
                None => ServiceError::NotFound(format!("session {}", session_id)),
                _ => ServiceError::SessionBusy(session_id.to_string()),
            });
        }

        debug!(trace_id = %ctx.trace_id, session_id = %session_id, "Session admitted");
        Ok(Admission {
            session_id,
            opened: false,
        })
    }

    /// Steps 4 to 6: user message, title, record.
    async fn persist_turn(
        &self,
        ctx: &RequestContext,
        agent: &Agent,
        tree_id: TreeId,
        admission: &Admission,
        input: &ChatInput,
    ) -> Result<FunctionGenRecord, ServiceError> {
        let files = match input.files.as_deref() {
            Some(files) if !files.is_empty() => Some(serde_json::to_string(files).map_err(|e| {
                ServiceError::InvalidInput(format!("files: {}", e))
            })?),
            _ => None,
        };

        let message = self
            .repositories
            .messages
            .append(NewChatMessage {
                session_id: admission.session_id,
                agent_id: agent.id,
                role: MessageRole::User,
                content: input.content.clone(),
                files,
                user: ctx.user.clone(),
            })
            .await?;

        if admission.opened {
            self.repositories
                .sessions
                .update_title(admission.session_id, &synthesize_title(&input.content))
                .await?;
        }

        let record = self
            .repositories
            .records
            .create(NewFunctionGenRecord {
                session_id: admission.session_id,
                message_id: message.id,
                agent_id: agent.id,
                tree_id,
            })
            .await?;
        Ok(record)
    }

    /// Step 7: history, knowledge, plugin, assembly.
    async fn assemble_prompt(
        &self,
        ctx: &RequestContext,
        agent: &Agent,
        record: &FunctionGenRecord,
        request: &FunctionGenChatRequest,
    ) -> Result<Vec<PromptMessage>, ServiceError> {
        let history = match self.settings.history_limit {
            Some(limit) => self.repositories.messages.list_recent(record.session_id, limit).await?,
            None => self.repositories.messages.list_by_session(record.session_id).await?,
        };
        let knowledge = self.knowledge.load(agent.knowledge_base_id).await?;

        let plugin_data = if agent.is_plugin() {
            let input = PluginInput {
                content: request.message.content.clone(),
                files: request.message.files.clone().unwrap_or_default(),
            };
            let output = self.workspace.run_plugin(ctx, agent, &input).await?;
            if let Some(error) = output.failure() {
                return Err(ServiceError::Plugin(error.to_string()));
            }
            if !output.data.is_empty() {
                self.repositories.records.update_plugin_output(record.id, &output.data).await?;
            }
            output.data
        } else {
            String::new()
        };

        let existing_files = request.existing_files.clone().unwrap_or_default();
        let messages = PromptAssembler::new(agent)
            .knowledge(&knowledge)
            .package(request.package.as_deref().unwrap_or(""))
            .existing_files(&existing_files)
            .history(&history)
            .user_content(&request.message.content)
            .plugin_data(&plugin_data)
            .build();
        Ok(messages)
    }

    async fn run_turn(
        &self,
        ctx: &RequestContext,
        request: FunctionGenChatRequest,
    ) -> Result<FunctionGenChatResponse, ServiceError> {
        info!(
            trace_id = %ctx.trace_id,
            agent_id = %request.agent_id,
            tree_id = %request.tree_id,
            user = %ctx.user,
            "Function generation chat turn"
        );

        let agent = self.resolve_agent(request.agent_id).await?;
        let llm = self.llm_configs.resolve_for(&agent).await?;
        let timeout = self.settings.call_timeout(&llm, &agent);
        let client = self.llm_factory.create(&llm, timeout)?;

        let admission = self
            .admit(ctx, &agent, request.tree_id, request.session_id.as_deref())
            .await?;

        let record = match self
            .persist_turn(ctx, &agent, request.tree_id, &admission, &request.message)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                release_session(self.repositories.sessions.as_ref(), ctx, admission.session_id).await;
                return Err(e);
            }
        };

        let messages = match self.assemble_prompt(ctx, &agent, &record, &request).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, record_id = %record.id, error = %e, "Turn failed before generation");
                fail_record(&self.job_dependencies(), ctx, record.id, record.session_id, e.to_string()).await;
                return Err(e);
            }
        };

        GenerationJob {
            ctx: ctx.clone(),
            record_id: record.id,
            message_id: record.message_id,
            session_id: record.session_id,
            agent_id: agent.id,
            tree_id: request.tree_id,
            client,
            request: ChatRequest {
                model: llm.model.clone(),
                messages,
                max_tokens: llm.effective_max_tokens(),
                temperature: llm.temperature(),
                use_thinking: llm.use_thinking,
            },
            timeout,
            deps: self.job_dependencies(),
        }
        .spawn();

        let agents = self.repositories.agents.clone();
        let agent_id = agent.id;
        tokio::spawn(async move {
            if let Err(e) = agents.increment_generation_count(agent_id).await {
                warn!(agent_id = %agent_id, error = %e, "Failed to increment generation count");
            }
        });

        Ok(FunctionGenChatResponse {
            session_id: record.session_id,
            record_id: record.id,
            status: record.status.as_str().to_string(),
            content: GENERATING_CONTENT.to_string(),
        })
    }
}

#[async_trait]
impl FunctionGenChatService for StandardFunctionGenChatService {
    async fn chat(
        &self,
        ctx: &RequestContext,
        request: FunctionGenChatRequest,
    ) -> Result<FunctionGenChatResponse, ServiceError> {
        let result = self.run_turn(ctx, request).await;
        let outcome = match &result {
            Ok(_) => "accepted",
            Err(e) => e.kind(),
        };
        metrics::counter!("funcgen_chat_turns_total", "outcome" => outcome).increment(1);
        result
    }

    async fn record_status(&self, record_id: RecordId) -> Result<FunctionGenRecord, ServiceError> {
        self.repositories
            .records
            .find_by_id(record_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("record {}", record_id)))
    }

    async fn list_sessions(&self, tree_id: TreeId, page: Page) -> Result<SessionPage, ServiceError> {
        let (items, total) = self.repositories.sessions.list_by_tree(tree_id, page).await?;
        Ok(SessionPage {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
        })
    }

    async fn list_messages(&self, session_id: SessionId) -> Result<Vec<ChatMessage>, ServiceError> {
        if self.repositories.sessions.find_by_session_id(session_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("session {}", session_id)));
        }
        Ok(self.repositories.messages.list_by_session(session_id).await?)
    }

    async fn close_session(&self, ctx: &RequestContext, session_id: SessionId) -> Result<(), ServiceError> {
        let closed = self
            .repositories
            .sessions
            .transition_status(
                session_id,
                &[SessionStatus::Idle, SessionStatus::Generating, SessionStatus::Done],
                SessionStatus::Done,
            )
            .await?;
        if !closed {
            return Err(ServiceError::NotFound(format!("session {}", session_id)));
        }
        info!(trace_id = %ctx.trace_id, session_id = %session_id, "Closed chat session");
        Ok(())
    }
}
