//! HTTP server setup
//!
//! Binds the configured address and serves the rating router until a
//! shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use tally_common::{Error, Result};
use tokio::signal;
use tracing::{info, warn};

use super::{create_router, AppState};
use crate::config::Config;
use crate::service::RatingService;

/// Run HTTP API server
pub async fn run(config: &Config, service: Arc<RatingService>) -> Result<()> {
    let app = create_router(AppState::new(service));

    let addr: SocketAddr = format!("{}:{}", config.bind_address, config.port)
        .parse()
        .map_err(|e| {
            Error::Config(format!(
                "Invalid bind address {}:{}: {}",
                config.bind_address, config.port, e
            ))
        })?;
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
