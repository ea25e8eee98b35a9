// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Knowledge Loader
//!
//! Loads a knowledge base wholesale into one prompt block. There is no
//! chunking or retrieval; only `completed` documents contribute.

use std::sync::Arc;

use tracing::debug;

use crate::domain::error::ServiceError;
use crate::domain::knowledge::KnowledgeBaseId;
use crate::domain::repository::KnowledgeRepository;

pub struct KnowledgeLoader {
    repository: Arc<dyn KnowledgeRepository>,
}

impl KnowledgeLoader {
    pub fn new(repository: Arc<dyn KnowledgeRepository>) -> Self {
        Self { repository }
    }

    /// Concatenate every completed document in insertion order. Empty when
    /// nothing is usable.
    pub async fn load(&self, kb_id: KnowledgeBaseId) -> Result<String, ServiceError> {
        let documents = self.repository.list_documents(kb_id).await?;
        let total = documents.len();

        let knowledge: String = documents
            .iter()
            .filter(|d| d.is_usable())
            .map(|d| d.render())
            .collect();

        debug!(knowledge_base_id = %kb_id, documents = total, bytes = knowledge.len(), "Loaded knowledge");
        Ok(knowledge)
    }
}
