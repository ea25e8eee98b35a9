// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry - Client Construction per LLM Config
//
// Turns a persisted `LlmConfig` row into a ready provider adapter. The
// provider string selects the wire format; anything unrecognised is a
// configuration error raised before any chat state is written.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::anthropic::{AnthropicAdapter, DEFAULT_ANTHROPIC_BASE};
use super::ollama::{OllamaAdapter, DEFAULT_OLLAMA_BASE};
use super::openai::{OpenAIAdapter, DEFAULT_OPENAI_BASE};
use crate::domain::llm::{LLMClientFactory, LLMError, LLMProvider, LlmConfig};
use crate::domain::server_config::resolve_env_value;

/// Provider strings spoken over the OpenAI chat-completions format
const OPENAI_FAMILY: &[&str] = &["openai", "openai-compatible", "deepseek", "qwen"];

/// Providers with their own wire format
const NATIVE_PROVIDERS: &[&str] = &["anthropic", "ollama"];

/// Every provider string the registry accepts
pub fn supported_providers() -> impl Iterator<Item = &'static str> {
    OPENAI_FAMILY.iter().chain(NATIVE_PROVIDERS).copied()
}

/// Builds provider adapters from LLM config rows
#[derive(Debug, Default, Clone, Copy)]
pub struct ProviderRegistry;

impl ProviderRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn is_supported(provider: &str) -> bool {
        let provider = normalize(provider);
        supported_providers().any(|p| p == provider)
    }

    /// Resolve API key from config (supports "env:VAR_NAME" syntax)
    fn resolve_api_key(key: &str) -> Result<String, LLMError> {
        resolve_env_value(key).map_err(|e| LLMError::Configuration(e.to_string()))
    }

    fn http_client(timeout: Duration) -> Result<reqwest::Client, LLMError> {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LLMError::Configuration(format!("Failed to build HTTP client: {}", e)))
    }
}

fn normalize(provider: &str) -> String {
    provider.trim().to_ascii_lowercase()
}

fn base_url(config: &LlmConfig, default: &str) -> String {
    config
        .api_base
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or(default)
        .to_string()
}

impl LLMClientFactory for ProviderRegistry {
    fn create(&self, config: &LlmConfig, timeout: Duration) -> Result<Arc<dyn LLMProvider>, LLMError> {
        let provider = normalize(&config.provider);

        if !Self::is_supported(&provider) {
            return Err(LLMError::Configuration(format!(
                "Unsupported provider type: {}",
                config.provider
            )));
        }
        if config.model.trim().is_empty() {
            return Err(LLMError::Configuration(format!(
                "LLM config {} has no model",
                config.id
            )));
        }

        let api_key = Self::resolve_api_key(&config.api_key)?;
        let client = Self::http_client(timeout)?;
        debug!(
            llm_config_id = %config.id,
            provider = %provider,
            model = %config.model,
            timeout_secs = timeout.as_secs(),
            "Building LLM client"
        );

        let adapter: Arc<dyn LLMProvider> = match provider.as_str() {
            "anthropic" => Arc::new(AnthropicAdapter::new(
                client,
                base_url(config, DEFAULT_ANTHROPIC_BASE),
                api_key,
                config.model.clone(),
            )),
            "ollama" => Arc::new(OllamaAdapter::new(
                client,
                base_url(config, DEFAULT_OLLAMA_BASE),
                config.model.clone(),
            )),
            p if OPENAI_FAMILY.contains(&p) => {
                if p != "openai" && config.api_base.as_deref().map_or(true, |b| b.trim().is_empty()) {
                    return Err(LLMError::Configuration(format!(
                        "Provider '{}' requires api_base",
                        config.provider
                    )));
                }
                Arc::new(OpenAIAdapter::new(
                    client,
                    base_url(config, DEFAULT_OPENAI_BASE),
                    api_key,
                    config.model.clone(),
                    p,
                ))
            }
            other => {
                return Err(LLMError::Configuration(format!(
                    "Unsupported provider type: {}",
                    other
                )))
            }
        };

        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::LlmConfigId;

    const TIMEOUT: Duration = Duration::from_secs(600);

    fn config(provider: &str) -> LlmConfig {
        LlmConfig::new(LlmConfigId(1), provider, "some-model")
    }

    #[test]
    fn test_registry_creation() {
        let registry = ProviderRegistry::default();

        let client = registry.create(&config("openai"), TIMEOUT).unwrap();
        assert_eq!(client.provider(), "openai");

        let client = registry.create(&config("Anthropic"), TIMEOUT).unwrap();
        assert_eq!(client.provider(), "anthropic");

        let client = registry.create(&config("ollama"), TIMEOUT).unwrap();
        assert_eq!(client.provider(), "ollama");
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let registry = ProviderRegistry::default();
        let err = registry.create(&config("mystery-llm"), TIMEOUT).err().unwrap();
        assert!(matches!(err, LLMError::Configuration(_)));
        assert!(!ProviderRegistry::is_supported("mystery-llm"));
    }

    #[test]
    fn test_every_supported_provider_builds() {
        let registry = ProviderRegistry::new();
        for provider in supported_providers() {
            let mut cfg = config(provider);
            cfg.api_base = Some("http://localhost:9".to_string());
            let client = registry.create(&cfg, TIMEOUT).unwrap();
            assert_eq!(client.provider(), provider);
            assert!(ProviderRegistry::is_supported(&provider.to_uppercase()));
        }
    }

    #[test]
    fn test_compatible_providers_need_a_base_url() {
        let registry = ProviderRegistry::default();
        let mut cfg = config("deepseek");
        assert!(matches!(registry.create(&cfg, TIMEOUT), Err(LLMError::Configuration(_))));

        cfg.api_base = Some("https://api.deepseek.com/v1".to_string());
        assert_eq!(registry.create(&cfg, TIMEOUT).unwrap().provider(), "deepseek");
    }

    #[test]
    fn test_missing_env_key_is_configuration_error() {
        let registry = ProviderRegistry::default();
        let mut cfg = config("openai");
        cfg.api_key = "env:FUNCGEN_TEST_SURELY_UNSET_KEY".to_string();
        assert!(matches!(registry.create(&cfg, TIMEOUT), Err(LLMError::Configuration(_))));
    }
}
