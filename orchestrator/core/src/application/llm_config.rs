// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! LLM Config Service
//!
//! Resolves which LLM config an agent talks to and switches the global
//! default. The default is never cached; every resolution reads the store.

use std::sync::Arc;

use tracing::info;

use crate::domain::agent::Agent;
use crate::domain::error::ServiceError;
use crate::domain::llm::{LlmConfig, LlmConfigId};
use crate::domain::repository::LlmConfigRepository;

pub struct LlmConfigService {
    repository: Arc<dyn LlmConfigRepository>,
}

impl LlmConfigService {
    pub fn new(repository: Arc<dyn LlmConfigRepository>) -> Self {
        Self { repository }
    }

    /// The agent's bound config, or the default when it has none.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the bound config does not exist
    /// - `NoDefaultLlm`: no binding and no default
    pub async fn resolve_for(&self, agent: &Agent) -> Result<LlmConfig, ServiceError> {
        match agent.bound_llm_config() {
            Some(id) => self
                .repository
                .find_by_id(id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("LLM config {}", id))),
            None => self
                .repository
                .find_default()
                .await?
                .ok_or(ServiceError::NoDefaultLlm),
        }
    }

    pub async fn set_default(&self, id: LlmConfigId) -> Result<(), ServiceError> {
        self.repository.set_default(id).await?;
        info!(llm_config_id = %id, "Default LLM config switched");
        Ok(())
    }
}
