// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Service error taxonomy shared by chat orchestration and the callback receiver.
//!
//! The presentation layer owns the mapping to HTTP status codes; this module
//! only names the kinds.

use crate::domain::generation::TransitionConflict;
use crate::domain::llm::LLMError;
use crate::domain::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("agent {0} is disabled")]
    Disabled(String),

    #[error("session {0} is closed")]
    SessionClosed(String),

    #[error("session {0} is busy generating")]
    SessionBusy(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no default LLM config is set and the agent has no LLM binding")]
    NoDefaultLlm,

    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("callback conflict: {0}")]
    CallbackConflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ServiceError {
    /// Stable machine-readable kind, used in API error bodies and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Disabled(_) => "disabled",
            ServiceError::SessionClosed(_) => "session_closed",
            ServiceError::SessionBusy(_) => "session_busy",
            ServiceError::Config(_) => "config_error",
            ServiceError::NoDefaultLlm => "no_default_llm",
            ServiceError::Plugin(_) => "plugin_error",
            ServiceError::Transport(_) => "transport_error",
            ServiceError::Persistence(_) => "persistence_error",
            ServiceError::CallbackConflict(_) => "callback_conflict",
            ServiceError::InvalidInput(_) => "invalid_input",
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => ServiceError::NotFound(what),
            RepositoryError::Conflict(msg) => ServiceError::CallbackConflict(msg),
            other => ServiceError::Persistence(other.to_string()),
        }
    }
}

impl From<TransitionConflict> for ServiceError {
    fn from(err: TransitionConflict) -> Self {
        ServiceError::CallbackConflict(err.to_string())
    }
}

impl From<LLMError> for ServiceError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Configuration(msg) => ServiceError::Config(msg),
            other => ServiceError::Transport(other.to_string()),
        }
    }
}
