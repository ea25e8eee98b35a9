// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL implementation of KnowledgeRepository
//!
//! Documents are read in `id` order, which is their insertion order.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::knowledge::{DocumentStatus, KnowledgeBase, KnowledgeBaseId, KnowledgeDocument};
use crate::domain::repository::{KnowledgeRepository, RepositoryError};

pub struct PostgresKnowledgeRepository {
    pool: PgPool,
}

impl PostgresKnowledgeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeRepository for PostgresKnowledgeRepository {
    async fn save_base(&self, base: &KnowledgeBase) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO knowledge_bases (id, name, status, document_count, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                status = EXCLUDED.status,
                document_count = EXCLUDED.document_count
            "#,
        )
        .bind(base.id.0)
        .bind(&base.name)
        .bind(&base.status)
        .bind(base.document_count)
        .bind(base.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_document(&self, document: KnowledgeDocument) -> Result<KnowledgeDocument, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE knowledge_bases SET document_count = document_count + 1 WHERE id = $1",
        )
        .bind(document.knowledge_base_id.0)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "Knowledge base {} not found",
                document.knowledge_base_id
            )));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO knowledge_documents (knowledge_base_id, status, title, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, knowledge_base_id, status, title, content, created_at
            "#,
        )
        .bind(document.knowledge_base_id.0)
        .bind(document.status.as_str())
        .bind(&document.title)
        .bind(&document.content)
        .bind(document.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        parse_document_row(row)
    }

    async fn list_documents(&self, kb_id: KnowledgeBaseId) -> Result<Vec<KnowledgeDocument>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, knowledge_base_id, status, title, content, created_at
            FROM knowledge_documents
            WHERE knowledge_base_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(kb_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(parse_document_row).collect()
    }
}

fn parse_document_row(row: PgRow) -> Result<KnowledgeDocument, RepositoryError> {
    let status: String = row.try_get("status")?;

    Ok(KnowledgeDocument {
        id: row.try_get("id")?,
        knowledge_base_id: KnowledgeBaseId(row.try_get("knowledge_base_id")?),
        status: DocumentStatus::parse(&status),
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}
