// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! This module provides infrastructure implementations of repository abstractions
//! defined in the domain layer, following the Repository pattern from DDD.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresAgentRepository** - Agent rows and the generation counter
//! - **PostgresLlmConfigRepository** - LLM configs and the single default flag
//! - **PostgresKnowledgeRepository** - Knowledge bases and their documents
//! - **PostgresChatSessionRepository** / **PostgresChatMessageRepository** - Conversations
//! - **PostgresFunctionGenRecordRepository** - Generation job records
//!
//! ## In-Memory Repositories
//!
//! Lightweight implementations for testing and development. They keep the
//! same compare-and-set and terminal-state rules as the PostgreSQL ones so the
//! orchestration logic behaves identically on either backend.

pub mod postgres_agent;
pub mod postgres_chat;
pub mod postgres_generation;
pub mod postgres_knowledge;
pub mod postgres_llm_config;

pub use postgres_agent::PostgresAgentRepository;
pub use postgres_chat::{PostgresChatMessageRepository, PostgresChatSessionRepository};
pub use postgres_generation::PostgresFunctionGenRecordRepository;
pub use postgres_knowledge::PostgresKnowledgeRepository;
pub use postgres_llm_config::PostgresLlmConfigRepository;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::chat::{ChatMessage, ChatSession, MessageId, NewChatMessage, SessionId, SessionStatus, TreeId};
use crate::domain::generation::{
    FunctionGenRecord, NewFunctionGenRecord, RecordId, RecordOutcome, RecordStatus, TransitionOutcome,
};
use crate::domain::knowledge::{KnowledgeBase, KnowledgeBaseId, KnowledgeDocument};
use crate::domain::llm::{LlmConfig, LlmConfigId};
use crate::domain::repository::{
    AgentRepository, ChatMessageRepository, ChatSessionRepository, FunctionGenRecordRepository,
    KnowledgeRepository, LlmConfigRepository, Page, RepositoryError,
};

#[derive(Clone, Default)]
pub struct InMemoryAgentRepository {
    agents: Arc<RwLock<HashMap<AgentId, Agent>>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        self.agents.write().insert(agent.id, agent.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>, RepositoryError> {
        Ok(self.agents.read().get(&id).cloned())
    }

    async fn increment_generation_count(&self, id: AgentId) -> Result<(), RepositoryError> {
        let mut agents = self.agents.write();
        let agent = agents
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("agent {}", id)))?;
        agent.generation_count += 1;
        agent.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryLlmConfigRepository {
    configs: Arc<RwLock<HashMap<LlmConfigId, LlmConfig>>>,
}

impl InMemoryLlmConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LlmConfigRepository for InMemoryLlmConfigRepository {
    async fn save(&self, config: &LlmConfig) -> Result<(), RepositoryError> {
        let mut configs = self.configs.write();
        // Mirrors the partial unique index on is_default.
        if config.is_default
            && configs
                .values()
                .any(|c| c.is_default && c.id != config.id)
        {
            return Err(RepositoryError::Conflict(
                "another LLM config is already the default".to_string(),
            ));
        }
        configs.insert(config.id, config.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: LlmConfigId) -> Result<Option<LlmConfig>, RepositoryError> {
        Ok(self.configs.read().get(&id).cloned())
    }

    async fn find_default(&self) -> Result<Option<LlmConfig>, RepositoryError> {
        Ok(self.configs.read().values().find(|c| c.is_default).cloned())
    }

    async fn set_default(&self, id: LlmConfigId) -> Result<(), RepositoryError> {
        let mut configs = self.configs.write();
        if !configs.contains_key(&id) {
            return Err(RepositoryError::NotFound(format!("LLM config {}", id)));
        }
        let now = Utc::now();
        for config in configs.values_mut() {
            let make_default = config.id == id;
            if config.is_default != make_default {
                config.is_default = make_default;
                config.updated_at = now;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct KnowledgeState {
    bases: HashMap<KnowledgeBaseId, KnowledgeBase>,
    documents: Vec<KnowledgeDocument>,
    next_document_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryKnowledgeRepository {
    state: Arc<RwLock<KnowledgeState>>,
}

impl InMemoryKnowledgeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnowledgeRepository for InMemoryKnowledgeRepository {
    async fn save_base(&self, base: &KnowledgeBase) -> Result<(), RepositoryError> {
        self.state.write().bases.insert(base.id, base.clone());
        Ok(())
    }

    async fn add_document(&self, mut document: KnowledgeDocument) -> Result<KnowledgeDocument, RepositoryError> {
        let mut state = self.state.write();
        let Some(base) = state.bases.get_mut(&document.knowledge_base_id) else {
            return Err(RepositoryError::NotFound(format!(
                "knowledge base {}",
                document.knowledge_base_id
            )));
        };
        base.document_count += 1;

        state.next_document_id += 1;
        document.id = state.next_document_id;
        state.documents.push(document.clone());
        Ok(document)
    }

    async fn list_documents(&self, kb_id: KnowledgeBaseId) -> Result<Vec<KnowledgeDocument>, RepositoryError> {
        Ok(self
            .state
            .read()
            .documents
            .iter()
            .filter(|d| d.knowledge_base_id == kb_id)
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryChatSessionRepository {
    sessions: Arc<RwLock<HashMap<SessionId, ChatSession>>>,
}

impl InMemoryChatSessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatSessionRepository for InMemoryChatSessionRepository {
    async fn create(&self, session: &ChatSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&session.session_id) {
            return Err(RepositoryError::Conflict(format!(
                "session {} already exists",
                session.session_id
            )));
        }
        sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn find_by_session_id(&self, id: SessionId) -> Result<Option<ChatSession>, RepositoryError> {
        Ok(self.sessions.read().get(&id).cloned())
    }

    async fn transition_status(
        &self,
        id: SessionId,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(&id) {
            Some(session) if from.contains(&session.status) => {
                session.status = to;
                session.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_title(&self, id: SessionId, title: &str) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("session {}", id)))?;
        session.title = title.to_string();
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn list_by_tree(
        &self,
        tree_id: TreeId,
        page: Page,
    ) -> Result<(Vec<ChatSession>, u64), RepositoryError> {
        let sessions = self.sessions.read();
        let mut matching: Vec<ChatSession> = sessions
            .values()
            .filter(|s| s.tree_id == tree_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect();
        Ok((items, total))
    }
}

#[derive(Default)]
struct MessageState {
    messages: Vec<ChatMessage>,
    next_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryChatMessageRepository {
    state: Arc<RwLock<MessageState>>,
}

impl InMemoryChatMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn session_messages(&self, id: SessionId) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = self
            .state
            .read()
            .messages
            .iter()
            .filter(|m| m.session_id == id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        messages
    }
}

#[async_trait]
impl ChatMessageRepository for InMemoryChatMessageRepository {
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, RepositoryError> {
        let mut state = self.state.write();
        state.next_id += 1;
        let stored = ChatMessage {
            id: MessageId(state.next_id),
            session_id: message.session_id,
            agent_id: message.agent_id,
            role: message.role.as_str().to_string(),
            content: message.content,
            files: message.files,
            user: message.user,
            created_at: Utc::now(),
        };
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn list_by_session(&self, id: SessionId) -> Result<Vec<ChatMessage>, RepositoryError> {
        Ok(self.session_messages(id))
    }

    async fn list_recent(&self, id: SessionId, limit: usize) -> Result<Vec<ChatMessage>, RepositoryError> {
        let messages = self.session_messages(id);
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skip).collect())
    }
}

#[derive(Default)]
struct RecordState {
    records: HashMap<RecordId, FunctionGenRecord>,
    next_id: i64,
}

#[derive(Clone, Default)]
pub struct InMemoryFunctionGenRecordRepository {
    state: Arc<RwLock<RecordState>>,
}

impl InMemoryFunctionGenRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<T>(
        &self,
        id: RecordId,
        f: impl FnOnce(&mut FunctionGenRecord) -> T,
    ) -> Result<T, RepositoryError> {
        let mut state = self.state.write();
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("record {}", id)))?;
        Ok(f(record))
    }
}

#[async_trait]
impl FunctionGenRecordRepository for InMemoryFunctionGenRecordRepository {
    async fn create(&self, record: NewFunctionGenRecord) -> Result<FunctionGenRecord, RepositoryError> {
        let mut state = self.state.write();
        state.next_id += 1;
        let record = FunctionGenRecord::new(RecordId(state.next_id), record);
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<FunctionGenRecord>, RepositoryError> {
        Ok(self.state.read().records.get(&id).cloned())
    }

    async fn find_generating_by_session(&self, id: SessionId) -> Result<Vec<FunctionGenRecord>, RepositoryError> {
        let mut records: Vec<FunctionGenRecord> = self
            .state
            .read()
            .records
            .values()
            .filter(|r| r.session_id == id && r.status == RecordStatus::Generating)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id.0);
        Ok(records)
    }

    async fn update_code(&self, id: RecordId, code: &str) -> Result<(), RepositoryError> {
        self.with_record(id, |record| {
            record.code = code.to_string();
            record.updated_at = Utc::now();
        })
    }

    async fn update_plugin_output(&self, id: RecordId, output: &str) -> Result<(), RepositoryError> {
        self.with_record(id, |record| {
            record.plugin_output = Some(output.to_string());
            record.updated_at = Utc::now();
        })
    }

    async fn finalize(&self, id: RecordId, outcome: RecordOutcome) -> Result<TransitionOutcome, RepositoryError> {
        self.with_record(id, |record| {
            let plan = FunctionGenRecord::plan_finalize(id, record.status, &outcome)
                .map_err(|conflict| RepositoryError::Conflict(conflict.to_string()))?;
            if plan == TransitionOutcome::Applied {
                record.finalize(outcome, Utc::now());
            }
            Ok(plan)
        })?
    }
}
