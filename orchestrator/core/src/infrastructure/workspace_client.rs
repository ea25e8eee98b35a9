// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Workspace HTTP Client
//!
//! `reqwest` adapter for the `WorkspaceGateway` port: runs plugin forms and
//! submits generated code to the workspace server. Every call carries the
//! caller's trace id, user, token and department headers.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Outbound HTTP to the workspace server

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::agent::Agent;
use crate::domain::error::ServiceError;
use crate::domain::request_context::RequestContext;
use crate::domain::server_config::WorkspaceConfig;
use crate::domain::workspace::{CodeSubmission, PluginInput, PluginOutput, SubmissionAck, WorkspaceGateway};

pub struct HttpWorkspaceClient {
    client: reqwest::Client,
    base_url: String,
    add_functions_path: String,
}

#[derive(Deserialize)]
struct PluginResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AckBody {
    Direct(SubmissionAck),
    Envelope { data: SubmissionAck },
}

impl HttpWorkspaceClient {
    pub fn new(config: &WorkspaceConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(|e| ServiceError::Config(format!("failed to build workspace client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            add_functions_path: config.add_functions_path.clone(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn post(&self, ctx: &RequestContext, url: &str) -> reqwest::RequestBuilder {
        ctx.outbound_headers()
            .into_iter()
            .fold(self.client.post(url), |builder, (name, value)| builder.header(name, value))
    }
}

fn plugin_data(result: Value) -> String {
    match result {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl WorkspaceGateway for HttpWorkspaceClient {
    async fn run_plugin(
        &self,
        ctx: &RequestContext,
        agent: &Agent,
        input: &PluginInput,
    ) -> Result<PluginOutput, ServiceError> {
        if !agent.is_plugin() {
            return Err(ServiceError::Config(format!("agent {} is not a plugin agent", agent.id)));
        }
        let path = agent
            .plugin_path()
            .ok_or_else(|| ServiceError::Config(format!("agent {} has no plugin function path", agent.id)))?;

        let url = self.url_for(path);
        debug!(trace_id = %ctx.trace_id, agent_id = %agent.id, url = %url, "Invoking plugin");

        let response = self
            .post(ctx, &url)
            .json(input)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("plugin call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(trace_id = %ctx.trace_id, status = %status, "Plugin returned non-success status");
            return Err(ServiceError::Transport(format!("plugin returned HTTP {}: {}", status, body)));
        }

        let parsed: PluginResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Transport(format!("invalid plugin response: {}", e)))?;

        Ok(PluginOutput {
            data: plugin_data(parsed.result),
            error: parsed.error,
        })
    }

    async fn submit_generated_code(
        &self,
        ctx: &RequestContext,
        submission: &CodeSubmission,
    ) -> Result<SubmissionAck, ServiceError> {
        let url = self.url_for(&self.add_functions_path);
        debug!(trace_id = %ctx.trace_id, record_id = %submission.record_id, "Submitting generated code");

        let response = self
            .post(ctx, &url)
            .json(submission)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("submission failed: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Transport(format!(
                "workspace rejected submission with HTTP {}: {}",
                status, body
            )));
        }

        let body: AckBody = response
            .json()
            .await
            .map_err(|e| ServiceError::Transport(format!("missing submission acknowledgement: {}", e)))?;
        let ack = match body {
            AckBody::Direct(ack) | AckBody::Envelope { data: ack } => ack,
        };

        if ack.record_id != submission.record_id {
            return Err(ServiceError::Transport(format!(
                "acknowledgement names record {} instead of {}",
                ack.record_id, submission.record_id
            )));
        }

        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{AgentId, AgentType};
    use crate::domain::chat::{MessageId, TreeId};
    use crate::domain::generation::RecordId;
    use crate::domain::knowledge::KnowledgeBaseId;
    use crate::domain::request_context::{REQUEST_USER_HEADER, TOKEN_HEADER, TRACE_ID_HEADER};
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::ServerGuard) -> HttpWorkspaceClient {
        HttpWorkspaceClient::new(&WorkspaceConfig {
            base_url: server.url(),
            ..WorkspaceConfig::default()
        })
        .unwrap()
    }

    fn plugin_agent(path: &str) -> Agent {
        let mut agent = Agent::new(AgentId(2), "plugger", AgentType::Plugin, KnowledgeBaseId(1));
        agent.plugin_function_path = Some(path.to_string());
        agent
    }

    fn ctx() -> RequestContext {
        RequestContext::new("alice").with_trace_id("trace-1").with_token("tok")
    }

    #[tokio::test]
    async fn test_run_plugin_propagates_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/p/q")
            .match_header(TRACE_ID_HEADER, "trace-1")
            .match_header(REQUEST_USER_HEADER, "alice")
            .match_header(TOKEN_HEADER, "tok")
            .match_body(Matcher::Json(json!({"content": "base"})))
            .with_status(200)
            .with_body(json!({"result": "EXTRA"}).to_string())
            .create_async()
            .await;

        let output = client_for(&server)
            .run_plugin(&ctx(), &plugin_agent("/p/q"), &PluginInput { content: "base".into(), files: vec![] })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(output.data, "EXTRA");
        assert!(output.failure().is_none());
    }

    #[tokio::test]
    async fn test_run_plugin_reports_application_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/p/q")
            .with_status(200)
            .with_body(json!({"result": null, "error": "boom"}).to_string())
            .create_async()
            .await;

        let output = client_for(&server)
            .run_plugin(&ctx(), &plugin_agent("/p/q"), &PluginInput::default())
            .await
            .unwrap();
        assert_eq!(output.failure(), Some("boom"));
        assert_eq!(output.data, "");
    }

    #[tokio::test]
    async fn test_run_plugin_structured_result_is_serialized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/p/q")
            .with_status(200)
            .with_body(json!({"result": {"k": 1}}).to_string())
            .create_async()
            .await;

        let output = client_for(&server)
            .run_plugin(&ctx(), &plugin_agent("/p/q"), &PluginInput::default())
            .await
            .unwrap();
        assert_eq!(output.data, r#"{"k":1}"#);
    }

    #[tokio::test]
    async fn test_run_plugin_preconditions() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server);

        let mut agent = plugin_agent("  ");
        let err = client.run_plugin(&ctx(), &agent, &PluginInput::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));

        agent.agent_type = AgentType::KnowledgeOnly;
        agent.plugin_function_path = Some("/p/q".into());
        let err = client.run_plugin(&ctx(), &agent, &PluginInput::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[tokio::test]
    async fn test_run_plugin_http_failure_is_transport() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/p/q").with_status(500).create_async().await;

        let err = client_for(&server)
            .run_plugin(&ctx(), &plugin_agent("/p/q"), &PluginInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)));
    }

    fn submission() -> CodeSubmission {
        CodeSubmission::new(RecordId(5), MessageId(9), AgentId(1), TreeId(42), "alice", "print(1)")
    }

    #[tokio::test]
    async fn test_submit_sends_async_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/workspace/api/v1/service_tree/add_functions")
            .match_header(TRACE_ID_HEADER, "trace-1")
            .match_body(Matcher::PartialJson(json!({
                "record_id": 5,
                "message_id": 9,
                "tree_id": 42,
                "code": "print(1)",
                "source_code": "print(1)",
                "async": true
            })))
            .with_status(200)
            .with_body(json!({"record_id": 5, "message": "accepted"}).to_string())
            .create_async()
            .await;

        let ack = client_for(&server).submit_generated_code(&ctx(), &submission()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(ack.record_id, RecordId(5));
        assert_eq!(ack.message, "accepted");
    }

    #[tokio::test]
    async fn test_submit_accepts_enveloped_ack() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/workspace/api/v1/service_tree/add_functions")
            .with_status(200)
            .with_body(json!({"code": 0, "data": {"record_id": 5, "message": "ok"}}).to_string())
            .create_async()
            .await;

        let ack = client_for(&server).submit_generated_code(&ctx(), &submission()).await.unwrap();
        assert_eq!(ack.message, "ok");
    }

    #[tokio::test]
    async fn test_submit_failures() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/workspace/api/v1/service_tree/add_functions")
            .with_status(202)
            .with_body("{}")
            .create_async()
            .await;
        let err = client_for(&server).submit_generated_code(&ctx(), &submission()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)));

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/workspace/api/v1/service_tree/add_functions")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;
        let err = client_for(&server).submit_generated_code(&ctx(), &submission()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Transport(_)));
    }
}
