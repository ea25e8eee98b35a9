// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL LLM Config Repository
//!
//! Backed by the `llm_configs` table. The "at most one default" rule is held
//! by a partial unique index and by `set_default`, which clears and sets the
//! flag inside one transaction.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::llm::{LlmConfig, LlmConfigId};
use crate::domain::repository::{LlmConfigRepository, RepositoryError};

pub struct PostgresLlmConfigRepository {
    pool: PgPool,
}

impl PostgresLlmConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, provider, model, api_key, api_base, timeout_seconds, max_tokens,
           extra_config, use_thinking, is_default, created_at, updated_at
    FROM llm_configs
"#;

#[async_trait]
impl LlmConfigRepository for PostgresLlmConfigRepository {
    async fn save(&self, config: &LlmConfig) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO llm_configs (
                id, provider, model, api_key, api_base, timeout_seconds, max_tokens,
                extra_config, use_thinking, is_default, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                provider = EXCLUDED.provider,
                model = EXCLUDED.model,
                api_key = EXCLUDED.api_key,
                api_base = EXCLUDED.api_base,
                timeout_seconds = EXCLUDED.timeout_seconds,
                max_tokens = EXCLUDED.max_tokens,
                extra_config = EXCLUDED.extra_config,
                use_thinking = EXCLUDED.use_thinking,
                is_default = EXCLUDED.is_default,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(config.id.0)
        .bind(&config.provider)
        .bind(&config.model)
        .bind(&config.api_key)
        .bind(config.api_base.as_deref())
        .bind(config.timeout_seconds as i64)
        .bind(config.max_tokens as i32)
        .bind(&config.extra_config)
        .bind(config.use_thinking)
        .bind(config.is_default)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict(
                "another LLM config is already the default".to_string(),
            ),
            other => RepositoryError::Database(format!("Failed to save LLM config: {}", other)),
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: LlmConfigId) -> Result<Option<LlmConfig>, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(parse_llm_config_row).transpose()
    }

    async fn find_default(&self) -> Result<Option<LlmConfig>, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE is_default LIMIT 1", SELECT_COLUMNS))
            .fetch_optional(&self.pool)
            .await?;

        row.map(parse_llm_config_row).transpose()
    }

    async fn set_default(&self, id: LlmConfigId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT id FROM llm_configs WHERE id = $1 FOR UPDATE")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound(format!("LLM config {} not found", id)));
        }

        sqlx::query(
            "UPDATE llm_configs SET is_default = FALSE, updated_at = NOW() WHERE is_default AND id <> $1",
        )
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE llm_configs SET is_default = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn parse_llm_config_row(row: PgRow) -> Result<LlmConfig, RepositoryError> {
    let timeout_seconds: i64 = row.try_get("timeout_seconds")?;
    let max_tokens: i32 = row.try_get("max_tokens")?;

    Ok(LlmConfig {
        id: LlmConfigId(row.try_get("id")?),
        provider: row.try_get("provider")?,
        model: row.try_get("model")?,
        api_key: row.try_get("api_key")?,
        api_base: row.try_get("api_base")?,
        timeout_seconds: timeout_seconds.max(0) as u64,
        max_tokens: max_tokens.max(0) as u32,
        extra_config: row.try_get("extra_config")?,
        use_thinking: row.try_get("use_thinking")?,
        is_default: row.try_get("is_default")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
