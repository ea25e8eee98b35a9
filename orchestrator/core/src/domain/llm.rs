// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Provider-neutral chat interface plus the persisted LLM configuration that
//! selects and parameterises a provider client.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption layer between chat orchestration and vendor APIs

// Implementations live in infrastructure/llm/. One adapter per wire format;
// the registry maps a config's `provider` string onto an adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Domain interface for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Run one chat completion. Returns `LLMError::Cancelled` as soon as
    /// `cancel` fires, regardless of how far the HTTP exchange has progressed.
    async fn chat(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, LLMError>;

    /// Provider tag this client was built for (e.g. "openai")
    fn provider(&self) -> &str;
}

/// Builds provider clients from persisted configuration.
pub trait LLMClientFactory: Send + Sync {
    /// `timeout` bounds each HTTP call made by the returned client.
    /// Fails with `LLMError::Configuration` for providers nobody implements.
    fn create(&self, config: &LlmConfig, timeout: Duration) -> Result<Arc<dyn LLMProvider>, LLMError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageRole {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("unsupported message role: {}", other)),
        }
    }
}

/// One entry of the ordered conversation sent to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,
    /// Ask reasoning-capable models to think before answering
    #[serde(default)]
    pub use_thinking: bool,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Generated text
    pub content: String,

    /// Token usage stats
    pub usage: TokenUsage,

    /// Model reported by the provider
    pub model: String,

    /// Why generation stopped
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason why generation stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Natural completion (model decided to stop)
    Stop,

    /// Hit max_tokens limit
    Length,

    /// Blocked by content filter
    ContentFilter,
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("LLM call cancelled")]
    Cancelled,

    #[error("LLM call timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LlmConfigId(pub i64);

impl fmt::Display for LlmConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted provider configuration. At most one row carries `is_default`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub id: LlmConfigId,
    /// Opaque tag that selects the client implementation
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub max_tokens: u32,
    /// Recognised keys: `max_tokens` (number), `temperature` (number)
    #[serde(default)]
    pub extra_config: Option<serde_json::Value>,
    #[serde(default)]
    pub use_thinking: bool,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LlmConfig {
    pub fn new(id: LlmConfigId, provider: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            provider: provider.into(),
            model: model.into(),
            api_key: String::new(),
            api_base: None,
            timeout_seconds: 0,
            max_tokens: 0,
            extra_config: None,
            use_thinking: false,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn extra_number(&self, key: &str) -> Option<f64> {
        self.extra_config.as_ref()?.get(key)?.as_f64()
    }

    /// `extra_config.max_tokens` wins over the column value; zero means unset.
    pub fn effective_max_tokens(&self) -> Option<u32> {
        match self.extra_number("max_tokens") {
            Some(n) if n >= 1.0 => Some(n as u32),
            _ if self.max_tokens > 0 => Some(self.max_tokens),
            _ => None,
        }
    }

    pub fn temperature(&self) -> Option<f32> {
        self.extra_number("temperature").map(|t| t as f32)
    }

    /// Call timeout, falling back to `default_secs` when unset.
    pub fn effective_timeout_secs(&self, default_secs: u64) -> u64 {
        if self.timeout_seconds > 0 {
            self.timeout_seconds
        } else {
            default_secs
        }
    }
}
