// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod llm;
pub mod prompt_assembler;
pub mod repositories;
pub mod workspace_client;

pub use prompt_assembler::PromptAssembler;
pub use workspace_client::HttpWorkspaceClient;
