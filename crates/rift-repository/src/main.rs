//! rift-repository CLI: prepare, inspect and clear the imposter store.
//!
//! Usage:
//!   rift-repository --config datastore.yaml migrate
//!   rift-repository --config datastore.yaml list

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rift_repository::{ActionRegistry, ImposterRepository, RepositoryConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rift-repository")]
#[command(author, version, about = "Manage persisted imposters", long_about = None)]
struct Cli {
    /// Datastore configuration file (YAML or JSON)
    #[arg(short, long, env = "RIFT_REPOSITORY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the imposter collection
    Migrate,
    /// Drop the imposter collection
    Teardown,
    /// Print every persisted imposter as JSON
    List,
    /// Delete every persisted imposter
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config =
        RepositoryConfig::from_file(cli.config.as_ref()).context("Failed to load datastore config")?;

    match cli.command {
        Commands::Migrate => ImposterRepository::migrate(&config.store)
            .await
            .context("Migration failed"),
        Commands::Teardown => ImposterRepository::teardown(&config.store)
            .await
            .context("Teardown failed"),
        Commands::List => list(&config).await,
        Commands::Purge => purge(&config).await,
    }
}

async fn list(config: &RepositoryConfig) -> Result<()> {
    let repository = ImposterRepository::open(config, Arc::new(ActionRegistry::new()))
        .await
        .context("Failed to open imposter store")?;
    let imposters = repository.all().await;
    repository.close().await;

    let imposters = imposters.context("Failed to load imposters")?;
    println!("{}", serde_json::to_string_pretty(&imposters)?);
    Ok(())
}

async fn purge(config: &RepositoryConfig) -> Result<()> {
    let repository = ImposterRepository::open(config, Arc::new(ActionRegistry::new()))
        .await
        .context("Failed to open imposter store")?;
    repository
        .delete_all_and_close()
        .await
        .context("Failed to delete imposters")
}
