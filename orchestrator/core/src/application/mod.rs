// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod callback;
pub mod chat;
pub mod generation_job;
pub mod knowledge;
pub mod llm_config;
pub mod repository_factory;

// Re-export use cases for convenience
pub use callback::{StandardWorkspaceCallbackUseCase, WorkspaceCallbackRequest, WorkspaceCallbackUseCase, CallbackAck};
pub use chat::{
    ChatSettings, FunctionGenChatRequest, FunctionGenChatResponse, FunctionGenChatService, SessionPage,
    StandardFunctionGenChatService,
};
pub use llm_config::LlmConfigService;
pub use repository_factory::{create_repositories, Repositories};
