// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each provider adapter translates between our domain chat interface and an
// external chat API. `ProviderRegistry` builds the right adapter for an
// `LlmConfig` row.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use registry::ProviderRegistry;

use std::future::Future;

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::domain::llm::LLMError;

/// Race `fut` against the cancellation token.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, LLMError>>,
) -> Result<T, LLMError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LLMError::Cancelled),
        result = fut => result,
    }
}

/// Map a non-success HTTP status to the domain error.
pub(crate) fn status_error(status: StatusCode, body: String, model: &str) -> LLMError {
    match status.as_u16() {
        401 | 403 => LLMError::Authentication(body),
        429 => LLMError::RateLimit,
        404 => LLMError::ModelNotFound(model.to_string()),
        _ => LLMError::Provider(format!("HTTP {}: {}", status, body)),
    }
}

pub(crate) fn network_error(err: reqwest::Error) -> LLMError {
    LLMError::Network(err.to_string())
}
