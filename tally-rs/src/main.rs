//! Rating Service (tally-rs) - Main entry point
//!
//! Opens the configured rating store and serves the rating endpoint.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tally_common::StorageBackend;
use tally_rs::config::{Config, ConfigOverrides};
use tally_rs::{api, store, RatingService};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for tally-rs
#[derive(Parser, Debug)]
#[command(name = "tally-rs")]
#[command(about = "Rating aggregation service for Tally")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "TALLY_PORT")]
    port: Option<u16>,

    /// Root folder holding the embedded database
    #[arg(short, long, env = "TALLY_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Storage backend: embedded or relational
    #[arg(long, env = "TALLY_BACKEND", value_parser = parse_backend)]
    backend: Option<StorageBackend>,

    /// Relational database connection string
    #[arg(long, env = "TALLY_DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,
}

fn parse_backend(value: &str) -> std::result::Result<StorageBackend, String> {
    match value.to_ascii_lowercase().as_str() {
        "embedded" | "sqlite" => Ok(StorageBackend::Embedded),
        "relational" | "postgres" | "postgresql" => Ok(StorageBackend::Relational),
        other => Err(format!(
            "unknown backend '{}', expected 'embedded' or 'relational'",
            other
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        port: args.port,
        root_folder: args.root_folder,
        backend: args.backend,
        database_url: args.database_url,
    };
    let config = Config::load(args.config.as_deref(), overrides)
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("tally_rs={},tower_http={}", config.log_level, config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Tally Rating Service v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    let rating_store = store::connect(&config.storage)
        .await
        .context("Failed to open rating store")?;
    info!(
        backend = %rating_store.backend(),
        max_connections = config.storage.pool.max_connections,
        timeout_ms = config.storage.operation_timeout.as_millis() as u64,
        "Rating store ready"
    );

    let service = Arc::new(RatingService::new(
        rating_store,
        config.storage.operation_timeout,
    ));

    api::server::run(&config, service)
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_aliases() {
        assert_eq!(parse_backend("embedded").unwrap(), StorageBackend::Embedded);
        assert_eq!(parse_backend("Postgres").unwrap(), StorageBackend::Relational);
        assert!(parse_backend("mysql").is_err());
    }
}
