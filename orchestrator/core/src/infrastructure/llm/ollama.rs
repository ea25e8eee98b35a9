// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Ollama LLM Provider Adapter
//
// Anti-Corruption Layer for Ollama local models (`/api/chat`, non-streaming).
// Supports air-gapped deployments with local LLMs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{cancellable, network_error, status_error};
use crate::domain::llm::{
    ChatRequest, ChatResponse, FinishReason, LLMError, LLMProvider, TokenUsage,
};

pub const DEFAULT_OLLAMA_BASE: &str = "http://localhost:11434";

pub struct OllamaAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaReply,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    eval_count: Option<u32>,
    prompt_eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaReply {
    #[serde(default)]
    content: String,
}

impl OllamaAdapter {
    pub fn new(client: reqwest::Client, endpoint: String, model: String) -> Self {
        Self {
            client,
            endpoint,
            model,
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        let model = if request.model.is_empty() { &self.model } else { &request.model };

        let options = (request.temperature.is_some() || request.max_tokens.is_some()).then(|| {
            OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens.map(|t| t as i32),
            }
        });

        let body = OllamaRequest {
            model,
            messages: request
                .messages
                .iter()
                .map(|m| OllamaMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            stream: false,
            think: request.use_thinking.then_some(true),
            options,
        };

        let url = format!("{}/api/chat", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_text, model));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let prompt_tokens = ollama_response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = ollama_response.eval_count.unwrap_or(0);

        Ok(ChatResponse {
            content: ollama_response.message.content,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            model: model.to_string(),
            finish_reason: match (ollama_response.done, ollama_response.done_reason.as_deref()) {
                (_, Some("length")) | (false, _) => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }
}

#[async_trait]
impl LLMProvider for OllamaAdapter {
    async fn chat(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, LLMError> {
        cancellable(cancel, self.send(request)).await
    }

    fn provider(&self) -> &str {
        "ollama"
    }
}
