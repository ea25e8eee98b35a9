// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Function Generation Records
//!
//! A `FunctionGenRecord` is the durable job artifact for one generation
//! attempt and the single source of truth for its status.
//!
//! ```text
//! generating ──► completed   (workspace callback success)
//!      │
//!      └──────► failed      (LLM error, submission error, callback failure)
//! ```
//!
//! Terminal states never change. Re-applying the same terminal state is a
//! no-op; applying the opposite one is a conflict. Both repository
//! implementations route through [`FunctionGenRecord::plan_finalize`] so the
//! rule lives in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::agent::AgentId;
use crate::domain::chat::{MessageId, SessionId, TreeId};

/// Error text stored when the workspace reports failure without a reason.
pub const DEFAULT_CALLBACK_ERROR: &str = "processing failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Generating,
    Completed,
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Generating => "generating",
            RecordStatus::Completed => "completed",
            RecordStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecordStatus::Generating)
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generating" => Ok(RecordStatus::Generating),
            "completed" => Ok(RecordStatus::Completed),
            "failed" => Ok(RecordStatus::Failed),
            other => Err(format!("unknown record status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionGenRecord {
    pub id: RecordId,
    pub session_id: SessionId,
    /// The user message that triggered this generation
    pub message_id: MessageId,
    pub agent_id: AgentId,
    pub tree_id: TreeId,
    pub status: RecordStatus,
    pub code: String,
    pub error_msg: String,
    pub duration_seconds: f64,
    /// Stable paths assigned by the workspace once ingestion succeeds
    pub full_code_paths: Vec<String>,
    /// Plugin transformation of the user input, if a plugin ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_output: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFunctionGenRecord {
    pub session_id: SessionId,
    pub message_id: MessageId,
    pub agent_id: AgentId,
    pub tree_id: TreeId,
}

/// Terminal state requested for a record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Completed { full_code_paths: Vec<String> },
    Failed { error_msg: String },
}

impl RecordOutcome {
    pub fn status(&self) -> RecordStatus {
        match self {
            RecordOutcome::Completed { .. } => RecordStatus::Completed,
            RecordOutcome::Failed { .. } => RecordStatus::Failed,
        }
    }
}

/// Result of a finalisation attempt that did not conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The record moved out of `generating`
    Applied,
    /// The record was already in the requested terminal state; nothing changed
    AlreadyTerminal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record {record_id} is already {current}, cannot become {requested}")]
pub struct TransitionConflict {
    pub record_id: RecordId,
    pub current: &'static str,
    pub requested: &'static str,
}

impl FunctionGenRecord {
    pub fn new(id: RecordId, new: NewFunctionGenRecord) -> Self {
        let now = Utc::now();
        Self {
            id,
            session_id: new.session_id,
            message_id: new.message_id,
            agent_id: new.agent_id,
            tree_id: new.tree_id,
            status: RecordStatus::Generating,
            code: String::new(),
            error_msg: String::new(),
            duration_seconds: 0.0,
            full_code_paths: Vec::new(),
            plugin_output: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Decide whether `outcome` may be applied given the current status.
    pub fn plan_finalize(
        id: RecordId,
        current: RecordStatus,
        outcome: &RecordOutcome,
    ) -> Result<TransitionOutcome, TransitionConflict> {
        let requested = outcome.status();
        match current {
            RecordStatus::Generating => Ok(TransitionOutcome::Applied),
            c if c == requested => Ok(TransitionOutcome::AlreadyTerminal),
            c => Err(TransitionConflict {
                record_id: id,
                current: c.as_str(),
                requested: requested.as_str(),
            }),
        }
    }

    /// Apply a terminal outcome in memory. Callers check `plan_finalize` first.
    pub fn finalize(&mut self, outcome: RecordOutcome, at: DateTime<Utc>) {
        match outcome {
            RecordOutcome::Completed { full_code_paths } => {
                self.status = RecordStatus::Completed;
                self.full_code_paths = full_code_paths;
                self.error_msg.clear();
            }
            RecordOutcome::Failed { error_msg } => {
                self.status = RecordStatus::Failed;
                self.error_msg = error_msg;
            }
        }
        self.duration_seconds = elapsed_seconds(self.created_at, at);
        self.updated_at = at;
    }
}

/// Seconds between two instants with millisecond precision, never negative.
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let millis = (to - from).num_milliseconds().max(0);
    millis as f64 / 1000.0
}
