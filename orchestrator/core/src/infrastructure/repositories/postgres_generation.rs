// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Function-Generation Record Repository
//!
//! Backed by `function_gen_records`. `finalize` locks the row, checks the
//! transition against the record state machine, and writes status, paths,
//! error and duration in the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::debug;

use crate::domain::agent::AgentId;
use crate::domain::chat::{MessageId, SessionId, TreeId};
use crate::domain::generation::{
    elapsed_seconds, FunctionGenRecord, NewFunctionGenRecord, RecordId, RecordOutcome, RecordStatus,
    TransitionOutcome,
};
use crate::domain::repository::{FunctionGenRecordRepository, RepositoryError};

pub struct PostgresFunctionGenRecordRepository {
    pool: PgPool,
}

impl PostgresFunctionGenRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const RECORD_COLUMNS: &str = "id, session_id, message_id, agent_id, tree_id, status, code, error_msg, \
     duration_seconds, full_code_paths, plugin_output, created_at, updated_at";

#[async_trait]
impl FunctionGenRecordRepository for PostgresFunctionGenRecordRepository {
    async fn create(&self, record: NewFunctionGenRecord) -> Result<FunctionGenRecord, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO function_gen_records (session_id, message_id, agent_id, tree_id, status)
            VALUES ($1, $2, $3, $4, 'generating')
            RETURNING {}
            "#,
            RECORD_COLUMNS
        ))
        .bind(record.session_id.0)
        .bind(record.message_id.0)
        .bind(record.agent_id.0)
        .bind(record.tree_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to create record: {}", e)))?;

        parse_record_row(row)
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<FunctionGenRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM function_gen_records WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(parse_record_row).transpose()
    }

    async fn find_generating_by_session(&self, id: SessionId) -> Result<Vec<FunctionGenRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM function_gen_records WHERE session_id = $1 AND status = 'generating' ORDER BY id ASC",
            RECORD_COLUMNS
        ))
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_record_row).collect()
    }

    async fn update_code(&self, id: RecordId, code: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE function_gen_records SET code = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.0)
        .bind(code)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Record {} not found", id)));
        }
        Ok(())
    }

    async fn update_plugin_output(&self, id: RecordId, output: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE function_gen_records SET plugin_output = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.0)
        .bind(output)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Record {} not found", id)));
        }
        Ok(())
    }

    async fn finalize(&self, id: RecordId, outcome: RecordOutcome) -> Result<TransitionOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT status, created_at FROM function_gen_records WHERE id = $1 FOR UPDATE",
        )
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Record {} not found", id)))?;

        let status: String = row.try_get("status")?;
        let current: RecordStatus = status.parse().map_err(RepositoryError::Serialization)?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;

        let plan = FunctionGenRecord::plan_finalize(id, current, &outcome)
            .map_err(|conflict| RepositoryError::Conflict(conflict.to_string()))?;
        if plan == TransitionOutcome::AlreadyTerminal {
            debug!(record_id = %id, status = %status, "Record already terminal, finalize is a no-op");
            return Ok(plan);
        }

        let now = Utc::now();
        let (paths, error_msg) = match &outcome {
            RecordOutcome::Completed { full_code_paths } => {
                (Some(serde_json::to_value(full_code_paths)?), String::new())
            }
            RecordOutcome::Failed { error_msg } => (None, error_msg.clone()),
        };

        sqlx::query(
            r#"
            UPDATE function_gen_records
            SET status = $2,
                full_code_paths = COALESCE($3, full_code_paths),
                error_msg = $4,
                duration_seconds = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(outcome.status().as_str())
        .bind(paths)
        .bind(error_msg)
        .bind(elapsed_seconds(created_at, now))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(plan)
    }
}

fn parse_record_row(row: PgRow) -> Result<FunctionGenRecord, RepositoryError> {
    let status: String = row.try_get("status")?;
    let paths: serde_json::Value = row.try_get("full_code_paths")?;

    Ok(FunctionGenRecord {
        id: RecordId(row.try_get("id")?),
        session_id: SessionId(row.try_get("session_id")?),
        message_id: MessageId(row.try_get("message_id")?),
        agent_id: AgentId(row.try_get("agent_id")?),
        tree_id: TreeId(row.try_get("tree_id")?),
        status: status.parse().map_err(RepositoryError::Serialization)?,
        code: row.try_get("code")?,
        error_msg: row.try_get("error_msg")?,
        duration_seconds: row.try_get("duration_seconds")?,
        full_code_paths: serde_json::from_value(paths)?,
        plugin_output: row.try_get("plugin_output")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
