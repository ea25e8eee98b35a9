// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Serve Command
//!
//! Wires repositories, the LLM provider registry and the workspace client
//! into the chat services and runs the axum router until SIGINT/SIGTERM.
//!
//! # Architecture
//!
//! - **Layer:** CLI/Presentation
//! - **Purpose:** Process entrypoint for the agent server
//! - **Integration:** CLI → funcgen_core application services → axum

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use funcgen_core::application::callback::StandardWorkspaceCallbackUseCase;
use funcgen_core::application::chat::{ChatSettings, StandardFunctionGenChatService};
use funcgen_core::application::llm_config::LlmConfigService;
use funcgen_core::application::repository_factory::create_repositories;
use funcgen_core::domain::repository::StorageBackend;
use funcgen_core::domain::server_config::ServerConfigManifest;
use funcgen_core::infrastructure::db::Database;
use funcgen_core::infrastructure::llm::ProviderRegistry;
use funcgen_core::infrastructure::workspace_client::HttpWorkspaceClient;
use funcgen_core::presentation::api::{app, AppState};

#[derive(Args)]
pub struct ServeCommand {
    /// HTTP port (overrides spec.server.port)
    #[arg(long)]
    port: Option<u16>,

    /// Bind address (overrides spec.server.bind_address)
    #[arg(long)]
    bind: Option<String>,
}

pub async fn execute(cmd: ServeCommand, mut config: ServerConfigManifest) -> Result<()> {
    if let Some(port) = cmd.port {
        config.spec.server.port = port;
    }
    if let Some(bind) = cmd.bind {
        config.spec.server.bind_address = bind;
    }
    config.validate().context("Configuration validation failed")?;

    info!(name = %config.metadata.name, "funcgen agent server starting");

    if let Some(port) = config.spec.observability.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(%addr, "Prometheus metrics exporter listening");
    }

    let backend = config.storage_backend().context("Failed to resolve storage backend")?;
    let pool = match &backend {
        StorageBackend::PostgreSQL(pg) => {
            let db = Database::new(pg).await.context("Failed to connect to database")?;
            info!("Connected to PostgreSQL");
            Some(db.get_pool().clone())
        }
        StorageBackend::InMemory => {
            warn!("No database configured; using in-memory repositories (state is lost on restart)");
            None
        }
    };
    let repositories = create_repositories(&backend, pool)?;

    let workspace = Arc::new(
        HttpWorkspaceClient::new(&config.spec.workspace).context("Failed to build workspace client")?,
    );
    let llm_registry = Arc::new(ProviderRegistry::new());

    let chat_service = Arc::new(StandardFunctionGenChatService::new(
        repositories.clone(),
        llm_registry,
        workspace,
        ChatSettings::from(&config.spec.generation),
    ));
    let callback_use_case = Arc::new(StandardWorkspaceCallbackUseCase::new(
        repositories.records.clone(),
        repositories.sessions.clone(),
    ));

    let state = AppState {
        chat_service,
        callback_use_case,
        llm_configs: Arc::new(LlmConfigService::new(repositories.llm_configs.clone())),
        start_time: Instant::now(),
    };

    let addr = format!("{}:{}", config.spec.server.bind_address, config.spec.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Agent server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Agent server shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
