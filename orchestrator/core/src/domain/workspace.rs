// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Workspace
//!
//! Contract with the workspace server, which owns the service tree, hosts
//! plugin forms, and ingests generated functions.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Port for the two outbound calls (plugin run, code submission)
//!
//! The HTTP adapter lives in `infrastructure::workspace_client`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::agent::{Agent, AgentId};
use crate::domain::chat::{MessageId, TreeId};
use crate::domain::error::ServiceError;
use crate::domain::generation::RecordId;
use crate::domain::request_context::RequestContext;

#[async_trait]
pub trait WorkspaceGateway: Send + Sync {
    /// Run the agent's plugin form over the user input.
    ///
    /// # Errors
    ///
    /// - `Config`: agent is not a plugin agent or has no form path
    /// - `Transport`: the form endpoint could not be reached or answered non-2xx
    ///
    /// Application errors reported by the plugin come back inside
    /// `PluginOutput::error`; the caller decides how fatal they are.
    async fn run_plugin(
        &self,
        ctx: &RequestContext,
        agent: &Agent,
        input: &PluginInput,
    ) -> Result<PluginOutput, ServiceError>;

    /// Hand generated code to the workspace for asynchronous ingestion.
    /// The workspace acknowledges immediately and calls back later.
    async fn submit_generated_code(
        &self,
        ctx: &RequestContext,
        submission: &CodeSubmission,
    ) -> Result<SubmissionAck, ServiceError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginInput {
    pub content: String,
    #[serde(rename = "input_files", skip_serializing_if = "Vec::is_empty", default)]
    pub files: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginOutput {
    pub data: String,
    pub error: Option<String>,
}

impl PluginOutput {
    /// Plugin-reported failure text, if any non-blank one was returned.
    pub fn failure(&self) -> Option<&str> {
        self.error.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

/// Body of `POST /workspace/api/v1/service_tree/add_functions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSubmission {
    pub record_id: RecordId,
    pub message_id: MessageId,
    pub agent_id: AgentId,
    pub tree_id: TreeId,
    pub user: String,
    pub code: String,
    pub source_code: String,
    #[serde(rename = "async")]
    pub is_async: bool,
}

impl CodeSubmission {
    pub fn new(
        record_id: RecordId,
        message_id: MessageId,
        agent_id: AgentId,
        tree_id: TreeId,
        user: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let code = code.into();
        Self {
            record_id,
            message_id,
            agent_id,
            tree_id,
            user: user.into(),
            source_code: code.clone(),
            code,
            is_async: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAck {
    pub record_id: RecordId,
    #[serde(default)]
    pub message: String,
}
