// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Anthropic LLM Provider Adapter
//
// Anti-Corruption Layer for the Anthropic Messages API. System messages are
// hoisted into the top-level `system` field.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{cancellable, network_error, status_error};
use crate::domain::llm::{
    ChatRequest, ChatResponse, FinishReason, LLMError, LLMProvider, MessageRole, TokenUsage,
};

pub const DEFAULT_ANTHROPIC_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const MIN_THINKING_BUDGET: u32 = 1024;

pub struct AnthropicAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ThinkingConfig {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicAdapter {
    pub fn new(client: reqwest::Client, endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            model,
        }
    }

    fn build_request<'a>(&self, request: &'a ChatRequest, model: &'a str) -> AnthropicRequest<'a> {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let messages = request
            .messages
            .iter()
            .filter_map(|m| match m.role {
                MessageRole::System => None,
                MessageRole::User => Some(AnthropicMessage { role: "user", content: &m.content }),
                MessageRole::Assistant => Some(AnthropicMessage {
                    role: "assistant",
                    content: &m.content,
                }),
            })
            .collect();

        let mut max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let mut temperature = request.temperature;
        let thinking = if request.use_thinking {
            let budget = (max_tokens / 2).max(MIN_THINKING_BUDGET);
            // Budget must stay below max_tokens; extended thinking also rejects a custom temperature.
            max_tokens = max_tokens.max(budget + MIN_THINKING_BUDGET);
            temperature = None;
            Some(ThinkingConfig { kind: "enabled", budget_tokens: budget })
        } else {
            None
        };

        AnthropicRequest {
            model,
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages,
            max_tokens,
            temperature,
            thinking,
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        let model = if request.model.is_empty() { &self.model } else { &request.model };
        let body = self.build_request(request, model);
        let url = format!("{}/v1/messages", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_text, model));
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let text: String = anthropic_response
            .content
            .iter()
            .filter(|c| c.kind == "text")
            .map(|c| c.text.as_str())
            .collect();

        let usage = anthropic_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content: text,
            usage,
            model: model.to_string(),
            finish_reason: match anthropic_response.stop_reason.as_deref() {
                Some("max_tokens") => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }
}

#[async_trait]
impl LLMProvider for AnthropicAdapter {
    async fn chat(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, LLMError> {
        cancellable(cancel, self.send(request)).await
    }

    fn provider(&self) -> &str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::PromptMessage;
    use mockito::Matcher;
    use serde_json::json;

    fn request(use_thinking: bool) -> ChatRequest {
        ChatRequest {
            model: "claude-sonnet".to_string(),
            messages: vec![
                PromptMessage::system("You code."),
                PromptMessage::user("hi"),
                PromptMessage::assistant("hello"),
                PromptMessage::user("write f"),
            ],
            max_tokens: None,
            temperature: Some(0.3),
            use_thinking,
        }
    }

    #[test]
    fn test_system_message_is_hoisted() {
        let adapter = AnthropicAdapter::new(
            reqwest::Client::new(),
            DEFAULT_ANTHROPIC_BASE.to_string(),
            "k".to_string(),
            "claude-sonnet".to_string(),
        );
        let req = request(false);
        let body = serde_json::to_value(adapter.build_request(&req, "claude-sonnet")).unwrap();

        assert_eq!(body["system"], "You code.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 3);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn test_thinking_budget_and_temperature() {
        let adapter = AnthropicAdapter::new(
            reqwest::Client::new(),
            DEFAULT_ANTHROPIC_BASE.to_string(),
            "k".to_string(),
            "claude-sonnet".to_string(),
        );
        let req = request(true);
        let body = serde_json::to_value(adapter.build_request(&req, "claude-sonnet")).unwrap();

        assert_eq!(body["thinking"]["type"], "enabled");
        let budget = body["thinking"]["budget_tokens"].as_u64().unwrap();
        assert!(body["max_tokens"].as_u64().unwrap() > budget);
        assert!(body.get("temperature").is_none());
    }

    #[tokio::test]
    async fn test_chat_joins_text_blocks() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "k")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .match_body(Matcher::PartialJson(json!({"system": "You code."})))
            .with_status(200)
            .with_body(
                json!({
                    "content": [
                        {"type": "thinking", "thinking": "hmm"},
                        {"type": "text", "text": "```py\nprint(1)\n```"}
                    ],
                    "usage": {"input_tokens": 10, "output_tokens": 4},
                    "stop_reason": "end_turn"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = AnthropicAdapter::new(
            reqwest::Client::new(),
            server.url(),
            "k".to_string(),
            "claude-sonnet".to_string(),
        );
        let response = adapter.chat(&request(false), &CancellationToken::new()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "```py\nprint(1)\n```");
        assert_eq!(response.usage.total_tokens, 14);
    }
}
