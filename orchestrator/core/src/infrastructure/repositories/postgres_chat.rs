// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Chat Repositories
//!
//! `chat_sessions` and `chat_messages`. Session admission is a single
//! conditional `UPDATE` whose affected-row count decides the winner, so two
//! concurrent turns on one session can never both move it to `generating`.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::agent::AgentId;
use crate::domain::chat::{ChatMessage, ChatSession, MessageId, NewChatMessage, SessionId, SessionStatus, TreeId};
use crate::domain::repository::{ChatMessageRepository, ChatSessionRepository, Page, RepositoryError};

pub struct PostgresChatSessionRepository {
    pool: PgPool,
}

impl PostgresChatSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatSessionRepository for PostgresChatSessionRepository {
    async fn create(&self, session: &ChatSession) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO chat_sessions (
                session_id, tree_id, agent_id, username, title, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.session_id.0)
        .bind(session.tree_id.0)
        .bind(session.agent_id.0)
        .bind(&session.user)
        .bind(&session.title)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict(
                format!("Session {} already exists", session.session_id),
            ),
            other => RepositoryError::Database(format!("Failed to create session: {}", other)),
        })?;

        Ok(())
    }

    async fn find_by_session_id(&self, id: SessionId) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT session_id, tree_id, agent_id, username, title, status, created_at, updated_at
            FROM chat_sessions
            WHERE session_id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(parse_session_row).transpose()
    }

    async fn transition_status(
        &self,
        id: SessionId,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> Result<bool, RepositoryError> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        let result = sqlx::query(
            r#"
            UPDATE chat_sessions
            SET status = $3, updated_at = NOW()
            WHERE session_id = $1 AND status = ANY($2)
            "#,
        )
        .bind(id.0)
        .bind(&from)
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_title(&self, id: SessionId, title: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE chat_sessions SET title = $2, updated_at = NOW() WHERE session_id = $1",
        )
        .bind(id.0)
        .bind(title)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Session {} not found", id)));
        }
        Ok(())
    }

    async fn list_by_tree(
        &self,
        tree_id: TreeId,
        page: Page,
    ) -> Result<(Vec<ChatSession>, u64), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_sessions WHERE tree_id = $1")
            .bind(tree_id.0)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT session_id, tree_id, agent_id, username, title, status, created_at, updated_at
            FROM chat_sessions
            WHERE tree_id = $1
            ORDER BY updated_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tree_id.0)
        .bind(i64::from(page.page_size))
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let sessions = rows
            .into_iter()
            .map(parse_session_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((sessions, total.max(0) as u64))
    }
}

fn parse_session_row(row: PgRow) -> Result<ChatSession, RepositoryError> {
    let status: String = row.try_get("status")?;

    Ok(ChatSession {
        session_id: SessionId(row.try_get("session_id")?),
        tree_id: TreeId(row.try_get("tree_id")?),
        agent_id: AgentId(row.try_get("agent_id")?),
        user: row.try_get("username")?,
        title: row.try_get("title")?,
        status: status.parse().map_err(RepositoryError::Serialization)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub struct PostgresChatMessageRepository {
    pool: PgPool,
}

impl PostgresChatMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatMessageRepository for PostgresChatMessageRepository {
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO chat_messages (session_id, agent_id, role, content, files, username)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, session_id, agent_id, role, content, files, username, created_at
            "#,
        )
        .bind(message.session_id.0)
        .bind(message.agent_id.0)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.files.as_deref())
        .bind(&message.user)
        .fetch_one(&self.pool)
        .await?;

        parse_message_row(row)
    }

    async fn list_by_session(&self, id: SessionId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, agent_id, role, content, files, username, created_at
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_message_row).collect()
    }

    async fn list_recent(&self, id: SessionId, limit: usize) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, agent_id, role, content, files, username, created_at
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows
            .into_iter()
            .map(parse_message_row)
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}

fn parse_message_row(row: PgRow) -> Result<ChatMessage, RepositoryError> {
    Ok(ChatMessage {
        id: MessageId(row.try_get("id")?),
        session_id: SessionId(row.try_get("session_id")?),
        agent_id: AgentId(row.try_get("agent_id")?),
        role: row.try_get("role")?,
        content: row.try_get("content")?,
        files: row.try_get("files")?,
        user: row.try_get("username")?,
        created_at: row.try_get("created_at")?,
    })
}
