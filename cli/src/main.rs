// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # funcgen Agent Server
//!
//! The `funcgen` binary hosts the chat orchestration engine: it accepts chat
//! turns, runs detached LLM generation jobs, submits code to the workspace
//! server and receives its callbacks.
//!
//! ## Commands
//!
//! - `funcgen serve` - Run the HTTP agent server
//! - `funcgen config show|validate|generate` - Configuration management
//! - `funcgen update [--dry-run]` - Apply database migrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use funcgen_core::domain::server_config::ServerConfigManifest;

mod commands;

use commands::{ConfigCommand, ServeCommand, UpdateCommand};

/// funcgen agent server - chat-driven function generation
#[derive(Parser)]
#[command(name = "funcgen")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "FUNCGEN_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP agent server
    #[command(name = "serve")]
    Serve {
        #[command(flatten)]
        command: ServeCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Update the funcgen database
    #[command(name = "update")]
    Update {
        #[command(flatten)]
        command: UpdateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { command }) => {
            let config = ServerConfigManifest::load_or_default(cli.config)
                .context("Failed to load configuration")?;
            let observability = &config.spec.observability;
            init_logging(
                cli.log_level.as_deref().unwrap_or(&observability.log_level),
                &observability.log_format,
            )?;
            commands::serve::execute(command, config).await
        }
        Some(Commands::Config { command }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("warn"), "compact")?;
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Update { command }) => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"), "compact")?;
            let config = ServerConfigManifest::load_or_default(cli.config)
                .context("Failed to load configuration")?;
            commands::update::execute(command, &config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging. `RUST_LOG` wins over `level`.
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
