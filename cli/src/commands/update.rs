// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Update Command
//!
//! This module implements the `funcgen update` command for applying database
//! migrations to keep the schema in sync with the application version.
//!
//! # Architecture
//!
//! - **Layer:** CLI/Presentation
//! - **Purpose:** Database schema migration management
//! - **Integration:** CLI → SQLx Migrator → PostgreSQL
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! funcgen update
//!
//! # Preview migrations without applying
//! funcgen update --dry-run
//! ```
//!
//! The connection string comes from `spec.database.url` in the server
//! configuration (after `FUNCGEN_DATABASE_URL` overrides).

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use sqlx::postgres::PgPoolOptions;

use funcgen_core::domain::repository::StorageBackend;
use funcgen_core::domain::server_config::ServerConfigManifest;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Args)]
pub struct UpdateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: UpdateCommand, config: &ServerConfigManifest) -> Result<()> {
    println!("{}", "funcgen update".bold().green());

    let database_url = match config.storage_backend()? {
        StorageBackend::PostgreSQL(pg) => pg.connection_string,
        StorageBackend::InMemory => anyhow::bail!(
            "No database configured. Set spec.database.url or FUNCGEN_DATABASE_URL to run updates."
        ),
    };

    println!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    // Missing table means nothing has been applied yet
    let applied_count = sqlx::query("SELECT version FROM _sqlx_migrations")
        .fetch_all(&pool)
        .await
        .map(|rows| rows.len())
        .unwrap_or(0);

    let total_migrations = MIGRATOR.iter().count();

    println!(
        "Migration status: {} applied, {} total available.",
        applied_count, total_migrations
    );

    if applied_count >= total_migrations {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if cmd.dry_run {
        println!("Pending migrations found (Dry Run):");
        for migration in MIGRATOR.iter().skip(applied_count) {
            println!(" - {} {}", migration.version, migration.description);
        }
        println!("Skipping application due to --dry-run");
        return Ok(());
    }

    println!("Applying pending migrations...");
    MIGRATOR.run(&pool).await.context("Failed to apply migrations")?;
    println!("{}", "✓ Database updated successfully.".green());

    Ok(())
}
