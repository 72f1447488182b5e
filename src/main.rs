// src/main.rs

mod cli;
mod commands;

use anyhow::{Context, Result};
use bountu::{EngineConfig, PackageManager};
use clap::Parser;
use cli::{Cli, Commands};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config =
        EngineConfig::discover(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config.paths.data_dir = Some(data_dir);
    }
    debug!("Data directory: {}", config.data_dir().display());

    let manager = PackageManager::open(config).context("Failed to open package engine")?;

    match cli.command {
        Commands::Sync => commands::cmd_sync(&manager),
        Commands::Refresh => commands::cmd_refresh(&manager),
        Commands::List => commands::cmd_list(&manager),
        Commands::Search {
            query,
            category,
            installed,
            updates,
            maintenance,
        } => commands::cmd_search(
            &manager,
            &query,
            category.as_deref(),
            installed,
            updates,
            maintenance,
        ),
        Commands::Info { id } => commands::cmd_info(&manager, &id),
        Commands::Install { id } => commands::cmd_install(&manager, &id),
        Commands::Remove { id } => commands::cmd_remove(&manager, &id),
        Commands::Update { id: _, all: true } => commands::cmd_update_all(&manager),
        Commands::Update { id: Some(id), .. } => commands::cmd_update(&manager, &id),
        Commands::Update { id: None, .. } => {
            Err(anyhow::anyhow!("Specify a package id or --all"))
        }
        Commands::Repair { id } => commands::cmd_repair(&manager, &id),
        Commands::Status => commands::cmd_status(&manager),
        Commands::CreatePackage(args) => commands::cmd_create_package(&manager, args),
    }
}
