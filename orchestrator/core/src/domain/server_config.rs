// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Server Configuration Types
//
// Defines the configuration schema for the agent server, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - HTTP bind settings
// - Optional PostgreSQL persistence (absent = in-memory repositories)
// - Workspace server endpoints used for plugins and code submission
// - Generation defaults (LLM timeout, history window)
// - Observability settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "funcgen/v1";
pub const KIND: &str = "ServerConfig";

/// Top-level Kubernetes-style server configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfigManifest {
    /// API version (must be "funcgen/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ServerConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ServerConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable server name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfigSpec {
    #[serde(default)]
    pub server: HttpConfig,

    /// PostgreSQL settings; omit to run on in-memory repositories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string (supports "env:VAR_NAME")
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Base URL of the workspace server, e.g. "http://workspace:8081"
    #[serde(default = "default_workspace_url")]
    pub base_url: String,

    #[serde(default = "default_add_functions_path")]
    pub add_functions_path: String,

    /// Timeout for plugin and submission calls
    #[serde(default = "default_workspace_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// LLM call timeout when the LLM config does not set one
    #[serde(default = "default_llm_timeout")]
    pub default_timeout_seconds: u64,

    /// Replay at most this many prior messages; unset replays the whole session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// "compact" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Serve Prometheus metrics on this port when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    5
}

fn default_workspace_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_add_functions_path() -> String {
    "/workspace/api/v1/service_tree/add_functions".to_string()
}

fn default_workspace_timeout() -> u64 {
    60
}

fn default_llm_timeout() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_url: default_workspace_url(),
            add_functions_path: default_add_functions_path(),
            timeout_seconds: default_workspace_timeout(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: default_llm_timeout(),
            history_limit: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_port: None,
        }
    }
}

impl Default for ServerConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "funcgen-agent".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                labels: None,
            },
            spec: ServerConfigSpec::default(),
        }
    }
}

impl ServerConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. FUNCGEN_CONFIG_PATH environment variable
    /// 2. ./funcgen-config.yaml (working directory)
    /// 3. ~/.funcgen/config.yaml (user home)
    /// 4. /etc/funcgen/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("FUNCGEN_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./funcgen-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".funcgen").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/funcgen/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load from an explicit path, else discover, else defaults. Env overrides
    /// are applied in every case.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("FUNCGEN_DATABASE_URL").filter(|v| !v.is_empty()) {
            match &mut self.spec.database {
                Some(db) => db.url = url,
                None => {
                    self.spec.database = Some(DatabaseConfig {
                        url,
                        max_connections: default_max_connections(),
                    })
                }
            }
        }

        if let Some(url) = lookup("FUNCGEN_WORKSPACE_URL").filter(|v| !v.is_empty()) {
            self.spec.workspace.base_url = url;
        }

        if let Some(port) = lookup("FUNCGEN_PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.spec.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid FUNCGEN_PORT value: {}", port),
            }
        }

        if let Some(level) = lookup("FUNCGEN_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.spec.observability.log_level = level;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.server.port == 0 {
            anyhow::bail!("spec.server.port cannot be 0");
        }

        if self.spec.workspace.base_url.trim().is_empty() {
            anyhow::bail!("spec.workspace.base_url cannot be empty");
        }

        if !self.spec.workspace.add_functions_path.starts_with('/') {
            anyhow::bail!("spec.workspace.add_functions_path must start with '/'");
        }

        if let Some(db) = &self.spec.database {
            if db.url.trim().is_empty() {
                anyhow::bail!("spec.database.url cannot be empty");
            }
        }

        if !matches!(self.spec.observability.log_format.as_str(), "compact" | "json") {
            anyhow::bail!(
                "Invalid log_format: '{}'. Must be 'compact' or 'json'",
                self.spec.observability.log_format
            );
        }

        Ok(())
    }

    /// Resolve the storage backend, expanding "env:VAR" connection strings
    pub fn storage_backend(&self) -> anyhow::Result<StorageBackend> {
        match &self.spec.database {
            None => Ok(StorageBackend::InMemory),
            Some(db) => Ok(StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: resolve_env_value(&db.url)?,
                max_connections: db.max_connections,
            })),
        }
    }
}

/// Resolve a config value (supports "env:VAR_NAME" syntax)
pub fn resolve_env_value(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var_name) => std::env::var(var_name)
            .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
        None => Ok(value.to_string()),
    }
}
