// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Chat Sessions
//!
//! Conversation aggregate: a `ChatSession` targets one workspace directory
//! (`tree_id`) and owns an append-only list of `ChatMessage`s.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Session lifecycle (`idle → generating → idle`, `→ done`) and message values

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::llm::MessageRole;

/// Title given to sessions whose first message has no visible text.
pub const DEFAULT_SESSION_TITLE: &str = "New session";

/// Maximum number of characters carried over from the first message into a title.
pub const SESSION_TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workspace service-tree node a session generates into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeId(pub i64);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepts new input
    Idle,
    /// A generation is in flight; new input is refused
    Generating,
    /// Permanently closed
    Done,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Generating => "generating",
            SessionStatus::Done => "done",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SessionStatus::Idle),
            "generating" => Ok(SessionStatus::Generating),
            "done" => Ok(SessionStatus::Done),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: SessionId,
    pub tree_id: TreeId,
    pub agent_id: AgentId,
    pub user: String,
    pub title: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// A freshly opened session already holds the generation slot for its first turn.
    pub fn open(tree_id: TreeId, agent_id: AgentId, user: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            tree_id,
            agent_id,
            user: user.into(),
            title: String::new(),
            status: SessionStatus::Generating,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted conversation entry. Never mutated once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub session_id: SessionId,
    pub agent_id: AgentId,
    /// Stored verbatim; rows written by other tools may carry roles we do not replay
    pub role: String,
    pub content: String,
    /// JSON-serialised attachment list, if the user sent any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<String>,
    pub user: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn role(&self) -> Option<MessageRole> {
        self.role.parse().ok()
    }
}

/// Insert form of a message; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub session_id: SessionId,
    pub agent_id: AgentId,
    pub role: MessageRole,
    pub content: String,
    pub files: Option<String>,
    pub user: String,
}

/// Derive a session title from the first user message.
///
/// Newlines fold into spaces, surrounding whitespace is trimmed, and the
/// result is cut on a character boundary at [`SESSION_TITLE_MAX_CHARS`]
/// with a trailing `...` when anything was dropped.
pub fn synthesize_title(content: &str) -> String {
    let folded: String = content
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    let trimmed = folded.trim();

    if trimmed.is_empty() {
        return DEFAULT_SESSION_TITLE.to_string();
    }

    let mut chars = trimmed.chars();
    let head: String = chars.by_ref().take(SESSION_TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_short_content() {
        assert_eq!(synthesize_title("  write a parser\n"), "write a parser");
    }

    #[test]
    fn test_title_empty_content() {
        assert_eq!(synthesize_title(""), DEFAULT_SESSION_TITLE);
        assert_eq!(synthesize_title(" \n\t "), DEFAULT_SESSION_TITLE);
    }

    #[test]
    fn test_title_truncates_on_char_boundary() {
        let content = "数".repeat(60);
        let title = synthesize_title(&content);
        assert_eq!(title, format!("{}...", "数".repeat(50)));
    }

    #[test]
    fn test_title_exactly_max_is_not_truncated() {
        let content = "a".repeat(SESSION_TITLE_MAX_CHARS);
        assert_eq!(synthesize_title(&content), content);
    }

    #[test]
    fn test_title_folds_newlines() {
        assert_eq!(synthesize_title("line one\nline two"), "line one line two");
    }

    #[test]
    fn test_session_status_roundtrip_str() {
        for status in [SessionStatus::Idle, SessionStatus::Generating, SessionStatus::Done] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
    }
}
