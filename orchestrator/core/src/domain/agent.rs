// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::knowledge::KnowledgeBaseId;
use crate::domain::llm::LlmConfigId;

/// Fallback system prompt used when an agent has no template configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional code-generation assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub i64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an agent prepares user input before it reaches the LLM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    /// Prompt is built from the knowledge base only
    KnowledgeOnly,
    /// User input is first transformed by a workspace-hosted plugin form
    Plugin,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::KnowledgeOnly => "knowledge_only",
            AgentType::Plugin => "plugin",
        }
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "knowledge_only" => Ok(AgentType::KnowledgeOnly),
            "plugin" => Ok(AgentType::Plugin),
            other => Err(format!("unknown agent type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    #[default]
    FunctionGen,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::FunctionGen => "function_gen",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub agent_type: AgentType,
    #[serde(default)]
    pub chat_type: ChatType,
    pub enabled: bool,
    pub knowledge_base_id: KnowledgeBaseId,
    /// `None` means the globally flagged default LLM config is used
    #[serde(default)]
    pub llm_config_id: Option<LlmConfigId>,
    /// Workspace form path, required when `agent_type` is `plugin`
    #[serde(default)]
    pub plugin_function_path: Option<String>,
    #[serde(default)]
    pub system_prompt_template: String,
    #[serde(default)]
    pub timeout_seconds: u32,
    #[serde(default)]
    pub generation_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(id: AgentId, name: impl Into<String>, agent_type: AgentType, knowledge_base_id: KnowledgeBaseId) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            agent_type,
            chat_type: ChatType::FunctionGen,
            enabled: true,
            knowledge_base_id,
            llm_config_id: None,
            plugin_function_path: None,
            system_prompt_template: String::new(),
            timeout_seconds: 0,
            generation_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_plugin(&self) -> bool {
        self.agent_type == AgentType::Plugin
    }

    /// Plugin form path if one is configured and non-blank.
    pub fn plugin_path(&self) -> Option<&str> {
        self.plugin_function_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// The bound LLM config, treating non-positive ids as "use default".
    pub fn bound_llm_config(&self) -> Option<LlmConfigId> {
        self.llm_config_id.filter(|id| id.0 > 0)
    }

    pub fn system_prompt(&self) -> &str {
        if self.system_prompt_template.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT
        } else {
            &self.system_prompt_template
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent::new(AgentId(1), "coder", AgentType::KnowledgeOnly, KnowledgeBaseId(1))
    }

    #[test]
    fn test_system_prompt_fallback() {
        let mut a = agent();
        assert_eq!(a.system_prompt(), DEFAULT_SYSTEM_PROMPT);

        a.system_prompt_template = "You code.".to_string();
        assert_eq!(a.system_prompt(), "You code.");
    }

    #[test]
    fn test_zero_llm_binding_means_default() {
        let mut a = agent();
        a.llm_config_id = Some(LlmConfigId(0));
        assert_eq!(a.bound_llm_config(), None);

        a.llm_config_id = Some(LlmConfigId(7));
        assert_eq!(a.bound_llm_config(), Some(LlmConfigId(7)));
    }

    #[test]
    fn test_blank_plugin_path_is_absent() {
        let mut a = agent();
        a.agent_type = AgentType::Plugin;
        a.plugin_function_path = Some("   ".to_string());
        assert!(a.plugin_path().is_none());

        a.plugin_function_path = Some("/p/q".to_string());
        assert_eq!(a.plugin_path(), Some("/p/q"));
    }

    #[test]
    fn test_agent_type_parse() {
        assert_eq!("plugin".parse::<AgentType>().unwrap(), AgentType::Plugin);
        assert!("embedding".parse::<AgentType>().is_err());
    }
}
