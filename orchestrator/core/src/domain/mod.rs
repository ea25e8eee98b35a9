// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Entities, value objects and ports of the agent server. Nothing in here
//! performs I/O; adapters live in `crate::infrastructure`.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Aggregates (agent, LLM config, knowledge base, chat session,
//!   generation record), repository traits, the LLM and workspace ports, and
//!   pure logic such as code extraction and title synthesis

pub mod agent;
pub mod chat;
pub mod code_extractor;
pub mod error;
pub mod generation;
pub mod knowledge;
pub mod llm;
pub mod repository;
pub mod request_context;
pub mod server_config;
pub mod workspace;
