// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Assembler
//!
//! Composes the ordered LLM message list for one chat turn.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Agent template + knowledge + package context + existing
//!   files → system message; session history; current user message
//!
//! # Message layout
//!
//! 1. One `system` message whose blocks are separated by a blank line:
//!    the agent prompt (or the default), the knowledge block, the package
//!    context line, and the existing-files section.
//! 2. Prior session messages in order, minus the trailing user message of
//!    the current turn and any message with an unrecognised role.
//! 3. The current `user` message, with plugin output appended when present.
//!
//! # Usage
//!
//! ```ignore
//! let messages = PromptAssembler::new(&agent)
//!     .knowledge(&knowledge)
//!     .package("/user/app/pkg")
//!     .existing_files(&files)
//!     .history(&history)
//!     .user_content("hi")
//!     .build();
//! ```

use crate::domain::agent::Agent;
use crate::domain::chat::ChatMessage;
use crate::domain::llm::{MessageRole, PromptMessage};

pub const EXISTING_FILES_HEADER: &str = "## Existing files";

/// Appended after the file list; kept stable so downstream prompts and tests can rely on it.
pub const EXISTING_FILES_NOTICE: &str =
    "The files above already exist in this package. Choose a new file name that does not collide with any of them.";

const BLOCK_SEPARATOR: &str = "\n\n";

pub struct PromptAssembler<'a> {
    agent: &'a Agent,
    knowledge: &'a str,
    package: &'a str,
    existing_files: &'a [String],
    history: &'a [ChatMessage],
    user_content: &'a str,
    plugin_data: Option<&'a str>,
}

impl<'a> PromptAssembler<'a> {
    pub fn new(agent: &'a Agent) -> Self {
        Self {
            agent,
            knowledge: "",
            package: "",
            existing_files: &[],
            history: &[],
            user_content: "",
            plugin_data: None,
        }
    }

    pub fn knowledge(mut self, knowledge: &'a str) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn package(mut self, package: &'a str) -> Self {
        self.package = package;
        self
    }

    pub fn existing_files(mut self, files: &'a [String]) -> Self {
        self.existing_files = files;
        self
    }

    pub fn history(mut self, history: &'a [ChatMessage]) -> Self {
        self.history = history;
        self
    }

    pub fn user_content(mut self, content: &'a str) -> Self {
        self.user_content = content;
        self
    }

    pub fn plugin_data(mut self, data: &'a str) -> Self {
        self.plugin_data = Some(data);
        self
    }

    /// Non-empty blocks joined by one blank line. The leading and trailing
    /// newlines that `KnowledgeDocument::render` puts around each document
    /// are trimmed off the knowledge block, so they do not reach the prompt.
    pub fn system_message(&self) -> String {
        let mut blocks: Vec<String> = vec![self.agent.system_prompt().to_string()];

        let knowledge = self.knowledge.trim_matches('\n');
        if !knowledge.trim().is_empty() {
            blocks.push(knowledge.to_string());
        }

        let package = self.package.trim();
        if !package.is_empty() {
            blocks.push(format!("Current package context: {}", package));
        }

        let files: Vec<&str> = self
            .existing_files
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect();
        if !files.is_empty() {
            let mut section = String::from(EXISTING_FILES_HEADER);
            for file in files {
                section.push_str("\n- ");
                section.push_str(file);
            }
            section.push('\n');
            section.push_str(EXISTING_FILES_NOTICE);
            blocks.push(section);
        }

        blocks.join(BLOCK_SEPARATOR)
    }

    fn history_messages(&self) -> impl Iterator<Item = PromptMessage> + '_ {
        let history = match self.history.last() {
            Some(last) if last.role() == Some(MessageRole::User) => &self.history[..self.history.len() - 1],
            _ => self.history,
        };

        history.iter().filter_map(|m| {
            m.role().map(|role| PromptMessage {
                role,
                content: m.content.clone(),
            })
        })
    }

    fn current_user_message(&self) -> PromptMessage {
        match self.plugin_data.filter(|d| !d.is_empty()) {
            Some(data) => PromptMessage::user(format!("{}\n\n{}", self.user_content, data)),
            None => PromptMessage::user(self.user_content),
        }
    }

    pub fn build(&self) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(PromptMessage::system(self.system_message()));
        messages.extend(self.history_messages());
        messages.push(self.current_user_message());
        messages
    }
}
