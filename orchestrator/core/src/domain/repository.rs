// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root, following the DDD Repository
//! pattern: one repository per aggregate, interface defined in the domain layer,
//! implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `AgentRepository` | `Agent` | `InMemoryAgentRepository`, `PostgresAgentRepository` |
//! | `LlmConfigRepository` | `LlmConfig` | `InMemoryLlmConfigRepository`, `PostgresLlmConfigRepository` |
//! | `KnowledgeRepository` | `KnowledgeBase` | `InMemoryKnowledgeRepository`, `PostgresKnowledgeRepository` |
//! | `ChatSessionRepository` | `ChatSession` | `InMemoryChatSessionRepository`, `PostgresChatSessionRepository` |
//! | `ChatMessageRepository` | `ChatMessage` | `InMemoryChatMessageRepository`, `PostgresChatMessageRepository` |
//! | `FunctionGenRecordRepository` | `FunctionGenRecord` | `InMemoryFunctionGenRecordRepository`, `PostgresFunctionGenRecordRepository` |
//!
//! ## Storage Backend Abstraction
//!
//! Concrete implementations are selected at startup from the server
//! configuration: in-memory when no database is configured (development and
//! tests), PostgreSQL otherwise.
//!
//! ## Concurrency contract
//!
//! Two operations are compare-and-set at the storage layer and must stay that
//! way in every implementation:
//!
//! - `ChatSessionRepository::transition_status` only moves a session whose
//!   current status is one of `from`, and reports whether it did.
//! - `FunctionGenRecordRepository::finalize` moves a record out of
//!   `generating` at most once and writes status, paths and error together.

use async_trait::async_trait;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::chat::{ChatMessage, ChatSession, NewChatMessage, SessionId, SessionStatus, TreeId};
use crate::domain::generation::{
    FunctionGenRecord, NewFunctionGenRecord, RecordId, RecordOutcome, TransitionOutcome,
};
use crate::domain::knowledge::{KnowledgeBase, KnowledgeBaseId, KnowledgeDocument};
use crate::domain::llm::{LlmConfig, LlmConfigId};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Save agent (create or update)
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>, RepositoryError>;

    /// Bump the agent's lifetime generation counter by one
    async fn increment_generation_count(&self, id: AgentId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait LlmConfigRepository: Send + Sync {
    /// Save config (create or update). Does not touch the default flag of other rows.
    async fn save(&self, config: &LlmConfig) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: LlmConfigId) -> Result<Option<LlmConfig>, RepositoryError>;

    /// The single config flagged `is_default`, if any
    async fn find_default(&self) -> Result<Option<LlmConfig>, RepositoryError>;

    /// Make `id` the only default, atomically clearing the flag everywhere else
    async fn set_default(&self, id: LlmConfigId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    async fn save_base(&self, base: &KnowledgeBase) -> Result<(), RepositoryError>;

    /// Append a document; the store assigns its id
    async fn add_document(&self, document: KnowledgeDocument) -> Result<KnowledgeDocument, RepositoryError>;

    /// All documents of a base in insertion order, regardless of status
    async fn list_documents(&self, kb_id: KnowledgeBaseId) -> Result<Vec<KnowledgeDocument>, RepositoryError>;
}

#[async_trait]
pub trait ChatSessionRepository: Send + Sync {
    async fn create(&self, session: &ChatSession) -> Result<(), RepositoryError>;

    async fn find_by_session_id(&self, id: SessionId) -> Result<Option<ChatSession>, RepositoryError>;

    /// Compare-and-set the session status. Returns `false` when the current
    /// status is not in `from` (or the session does not exist).
    async fn transition_status(
        &self,
        id: SessionId,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> Result<bool, RepositoryError>;

    async fn update_title(&self, id: SessionId, title: &str) -> Result<(), RepositoryError>;

    /// Sessions for a tree, most recently updated first, plus the total count
    async fn list_by_tree(
        &self,
        tree_id: TreeId,
        page: Page,
    ) -> Result<(Vec<ChatSession>, u64), RepositoryError>;
}

#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, RepositoryError>;

    /// Every message of the session ordered by `created_at` ascending, ties by id
    async fn list_by_session(&self, id: SessionId) -> Result<Vec<ChatMessage>, RepositoryError>;

    /// The last `limit` messages of the session, still in ascending order
    async fn list_recent(&self, id: SessionId, limit: usize) -> Result<Vec<ChatMessage>, RepositoryError>;
}

#[async_trait]
pub trait FunctionGenRecordRepository: Send + Sync {
    async fn create(&self, record: NewFunctionGenRecord) -> Result<FunctionGenRecord, RepositoryError>;

    async fn find_by_id(&self, id: RecordId) -> Result<Option<FunctionGenRecord>, RepositoryError>;

    /// Records of a session still in `generating`
    async fn find_generating_by_session(&self, id: SessionId) -> Result<Vec<FunctionGenRecord>, RepositoryError>;

    async fn update_code(&self, id: RecordId, code: &str) -> Result<(), RepositoryError>;

    async fn update_plugin_output(&self, id: RecordId, output: &str) -> Result<(), RepositoryError>;

    /// Move the record to a terminal state in one transaction.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such record
    /// - `Conflict`: the record is already in the opposite terminal state
    async fn finalize(&self, id: RecordId, outcome: RecordOutcome) -> Result<TransitionOutcome, RepositoryError>;
}

/// 1-based pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub const DEFAULT_SIZE: u32 = 20;
    pub const MAX_SIZE: u32 = 100;

    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_SIZE)
                .clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
