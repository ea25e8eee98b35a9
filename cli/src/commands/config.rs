// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use funcgen_core::domain::server_config::{DatabaseConfig, ServerConfigManifest};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./funcgen-config.yaml)
        #[arg(short, long, default_value = "./funcgen-config.yaml")]
        output: PathBuf,

        /// Include the optional database and metrics sections
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ServerConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. FUNCGEN_CONFIG_PATH: {}",
            std::env::var("FUNCGEN_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./funcgen-config.yaml");
        println!("  4. ~/.funcgen/config.yaml");
        println!("  5. /etc/funcgen/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Server:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Listen: {}:{}", spec.server.bind_address, spec.server.port);
    println!();

    println!("{}", "Storage:".bold());
    match &spec.database {
        // Print the reference, not a resolved secret
        Some(db) => println!("  PostgreSQL: {} (max {} connections)", db.url, db.max_connections),
        None => println!("  In-memory {}", "(nothing survives a restart)".dimmed()),
    }
    println!();

    println!("{}", "Workspace:".bold());
    println!("  Base URL: {}", spec.workspace.base_url);
    println!("  Submission path: {}", spec.workspace.add_functions_path);
    println!("  Timeout: {}s", spec.workspace.timeout_seconds);
    println!();

    println!("{}", "Generation:".bold());
    println!("  Default LLM timeout: {}s", spec.generation.default_timeout_seconds);
    match spec.generation.history_limit {
        Some(limit) => println!("  History window: last {} messages", limit),
        None => println!("  History window: whole session"),
    }
    println!();

    println!("{}", "Observability:".bold());
    println!("  Log: {} ({})", spec.observability.log_level, spec.observability.log_format);
    match spec.observability.metrics_port {
        Some(port) => println!("  Metrics: :{}", port),
        None => println!("  Metrics: {}", "(disabled)".dimmed()),
    }
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ServerConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn sample(with_examples: bool) -> ServerConfigManifest {
    let mut config = ServerConfigManifest::default();
    config.metadata.name = "agent-server".to_string();
    if with_examples {
        config.spec.database = Some(DatabaseConfig {
            url: "env:FUNCGEN_DATABASE_URL".to_string(),
            max_connections: 5,
        });
        config.spec.generation.history_limit = Some(40);
        config.spec.observability.metrics_port = Some(9090);
    }
    config
}

fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    sample(with_examples)
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
