// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Identity and tracing metadata that follows a request across services.
//!
//! Every cross-service call (plugin form, function submission) forwards these
//! values as headers so the workspace can attribute and correlate work.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "X-Trace-Id";
pub const REQUEST_USER_HEADER: &str = "X-Request-User";
pub const TOKEN_HEADER: &str = "X-Token";
pub const DEPARTMENT_HEADER: &str = "X-Department-Full-Path";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub trace_id: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_full_path: Option<String>,
}

impl RequestContext {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            trace_id: new_trace_id(),
            user: user.into(),
            token: None,
            department_full_path: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        let trace_id = trace_id.into();
        if !trace_id.trim().is_empty() {
            self.trace_id = trace_id;
        }
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into()).filter(|t: &String| !t.is_empty());
        self
    }

    pub fn with_department(mut self, path: impl Into<String>) -> Self {
        self.department_full_path = Some(path.into()).filter(|p: &String| !p.is_empty());
        self
    }

    /// Header pairs to attach to outbound calls. Empty values are omitted.
    pub fn outbound_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![(TRACE_ID_HEADER, self.trace_id.clone())];
        if !self.user.is_empty() {
            headers.push((REQUEST_USER_HEADER, self.user.clone()));
        }
        if let Some(token) = &self.token {
            headers.push((TOKEN_HEADER, token.clone()));
        }
        if let Some(dept) = &self.department_full_path {
            headers.push((DEPARTMENT_HEADER, dept.clone()));
        }
        headers
    }
}

pub fn new_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_trace_id_keeps_generated() {
        let ctx = RequestContext::new("alice").with_trace_id("  ");
        assert_eq!(ctx.trace_id.len(), 32);
    }

    #[test]
    fn test_outbound_headers_skip_missing_values() {
        let ctx = RequestContext::new("")
            .with_trace_id("t-1")
            .with_token("tok");
        let headers = ctx.outbound_headers();
        assert_eq!(
            headers,
            vec![(TRACE_ID_HEADER, "t-1".to_string()), (TOKEN_HEADER, "tok".to_string())]
        );
    }
}
