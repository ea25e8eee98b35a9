// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Agent Repository
//!
//! Production `AgentRepository` implementation backed by the `agents` table
//! in PostgreSQL via `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::agent::{Agent, AgentId, AgentType, ChatType};
use crate::domain::knowledge::KnowledgeBaseId;
use crate::domain::llm::LlmConfigId;
use crate::domain::repository::{AgentRepository, RepositoryError};

pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn save(&self, agent: &Agent) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO agents (
                id, name, agent_type, chat_type, enabled, knowledge_base_id,
                llm_config_id, plugin_function_path, system_prompt_template,
                timeout_seconds, generation_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                agent_type = EXCLUDED.agent_type,
                chat_type = EXCLUDED.chat_type,
                enabled = EXCLUDED.enabled,
                knowledge_base_id = EXCLUDED.knowledge_base_id,
                llm_config_id = EXCLUDED.llm_config_id,
                plugin_function_path = EXCLUDED.plugin_function_path,
                system_prompt_template = EXCLUDED.system_prompt_template,
                timeout_seconds = EXCLUDED.timeout_seconds,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(agent.id.0)
        .bind(&agent.name)
        .bind(agent.agent_type.as_str())
        .bind(agent.chat_type.as_str())
        .bind(agent.enabled)
        .bind(agent.knowledge_base_id.0)
        .bind(agent.bound_llm_config().map(|id| id.0))
        .bind(agent.plugin_function_path.as_deref())
        .bind(&agent.system_prompt_template)
        .bind(agent.timeout_seconds as i32)
        .bind(agent.generation_count)
        .bind(agent.created_at)
        .bind(agent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save agent: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                id, name, agent_type, enabled, knowledge_base_id, llm_config_id,
                plugin_function_path, system_prompt_template, timeout_seconds,
                generation_count, created_at, updated_at
            FROM agents
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.map(parse_agent_row).transpose()
    }

    async fn increment_generation_count(&self, id: AgentId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE agents
            SET generation_count = generation_count + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Agent {} not found", id)));
        }

        Ok(())
    }
}

fn parse_agent_row(row: PgRow) -> Result<Agent, RepositoryError> {
    let agent_type: String = row.try_get("agent_type")?;
    let agent_type: AgentType = agent_type
        .parse()
        .map_err(RepositoryError::Serialization)?;
    let llm_config_id: Option<i64> = row.try_get("llm_config_id")?;
    let timeout_seconds: i32 = row.try_get("timeout_seconds")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(Agent {
        id: AgentId(row.try_get("id")?),
        name: row.try_get("name")?,
        agent_type,
        chat_type: ChatType::FunctionGen,
        enabled: row.try_get("enabled")?,
        knowledge_base_id: KnowledgeBaseId(row.try_get("knowledge_base_id")?),
        llm_config_id: llm_config_id.map(LlmConfigId),
        plugin_function_path: row.try_get("plugin_function_path")?,
        system_prompt_template: row.try_get("system_prompt_template")?,
        timeout_seconds: timeout_seconds.max(0) as u32,
        generation_count: row.try_get("generation_count")?,
        created_at,
        updated_at,
    })
}
