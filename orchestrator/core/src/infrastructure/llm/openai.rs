// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI LLM Provider Adapter
//
// Anti-Corruption Layer for the OpenAI chat-completions API.
// Also serves OpenAI-compatible endpoints (DeepSeek, Qwen, vLLM, LM Studio).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{cancellable, network_error, status_error};
use crate::domain::llm::{
    ChatRequest, ChatResponse, FinishReason, LLMError, LLMProvider, TokenUsage,
};

pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAIAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    provider: String,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enable_thinking: Option<bool>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl OpenAIAdapter {
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
        model: String,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            model,
            provider: provider.into(),
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        let model = if request.model.is_empty() { &self.model } else { &request.model };

        // Translate our domain types to OpenAI's types
        let body = OpenAIRequest {
            model,
            messages: request
                .messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str().to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            enable_thinking: request.use_thinking.then_some(true),
            stream: false,
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let mut builder = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        let response = builder.send().await.map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_text, model));
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        // Translate OpenAI's response to our domain types
        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Provider("No response from model".into()))?;

        let usage = openai_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            model: openai_response.model.unwrap_or_else(|| model.to_string()),
            finish_reason: match choice.finish_reason.as_deref() {
                Some("length") => FinishReason::Length,
                Some("content_filter") => FinishReason::ContentFilter,
                _ => FinishReason::Stop,
            },
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIAdapter {
    async fn chat(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, LLMError> {
        cancellable(cancel, self.send(request)).await
    }

    fn provider(&self) -> &str {
        &self.provider
    }
}
