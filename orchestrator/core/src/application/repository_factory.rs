// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on storage backend
//! configuration, keeping the domain layer free of infrastructure types.
//!
//! - Domain layer: defines repository traits
//! - Application layer: picks implementations here
//! - Infrastructure layer: provides the implementations
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Wire the repository set for the configured backend

use std::sync::Arc;

use sqlx::PgPool;

use crate::domain::repository::{
    AgentRepository, ChatMessageRepository, ChatSessionRepository, FunctionGenRecordRepository,
    KnowledgeRepository, LlmConfigRepository, StorageBackend,
};
use crate::infrastructure::repositories::{
    InMemoryAgentRepository, InMemoryChatMessageRepository, InMemoryChatSessionRepository,
    InMemoryFunctionGenRecordRepository, InMemoryKnowledgeRepository, InMemoryLlmConfigRepository,
    PostgresAgentRepository, PostgresChatMessageRepository, PostgresChatSessionRepository,
    PostgresFunctionGenRecordRepository, PostgresKnowledgeRepository, PostgresLlmConfigRepository,
};

/// Every repository the agent server needs, behind trait objects
#[derive(Clone)]
pub struct Repositories {
    pub agents: Arc<dyn AgentRepository>,
    pub llm_configs: Arc<dyn LlmConfigRepository>,
    pub knowledge: Arc<dyn KnowledgeRepository>,
    pub sessions: Arc<dyn ChatSessionRepository>,
    pub messages: Arc<dyn ChatMessageRepository>,
    pub records: Arc<dyn FunctionGenRecordRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            agents: Arc::new(InMemoryAgentRepository::new()),
            llm_configs: Arc::new(InMemoryLlmConfigRepository::new()),
            knowledge: Arc::new(InMemoryKnowledgeRepository::new()),
            sessions: Arc::new(InMemoryChatSessionRepository::new()),
            messages: Arc::new(InMemoryChatMessageRepository::new()),
            records: Arc::new(InMemoryFunctionGenRecordRepository::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            agents: Arc::new(PostgresAgentRepository::new(pool.clone())),
            llm_configs: Arc::new(PostgresLlmConfigRepository::new(pool.clone())),
            knowledge: Arc::new(PostgresKnowledgeRepository::new(pool.clone())),
            sessions: Arc::new(PostgresChatSessionRepository::new(pool.clone())),
            messages: Arc::new(PostgresChatMessageRepository::new(pool.clone())),
            records: Arc::new(PostgresFunctionGenRecordRepository::new(pool)),
        }
    }
}

/// Creates the repository set for the configured backend. A PostgreSQL
/// backend needs a connected pool.
pub fn create_repositories(backend: &StorageBackend, pool: Option<PgPool>) -> anyhow::Result<Repositories> {
    match (backend, pool) {
        (StorageBackend::InMemory, _) => Ok(Repositories::in_memory()),
        (StorageBackend::PostgreSQL(_), Some(pool)) => Ok(Repositories::postgres(pool)),
        (StorageBackend::PostgreSQL(_), None) => {
            anyhow::bail!("PostgreSQL backend configured but no connection pool was provided")
        }
    }
}
