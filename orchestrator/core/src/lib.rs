// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! funcgen core
//!
//! Chat orchestration for function generation: session admission, prompt
//! assembly, detached LLM jobs, workspace submission and callbacks.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain, application, infrastructure and presentation layers of the agent server

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
