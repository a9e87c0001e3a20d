//! Caching Proxy - A forward HTTP proxy with an LRU response cache
//!
//! Usage: `caching_proxy <CAPACITY_BYTES> [--host <HOST>] [--port <PORT>]`

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caching_proxy::{Config, ProxyServer};

/// Main entry point for the caching proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Parse configuration from arguments and environment variables
/// 3. Bind the listener and create the cache
/// 4. Serve connections until SIGINT/SIGTERM or a fatal error
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caching_proxy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    info!(
        "Starting caching proxy: capacity={} bytes",
        config.capacity_bytes
    );

    let server = ProxyServer::bind(&config)
        .await
        .with_context(|| format!("failed to listen on {}", config.listen_addr()))?;
    let addr = server.local_addr()?;
    info!("Proxy listening on {} (port {})", addr, addr.port());

    server
        .run(shutdown_signal())
        .await
        .context("proxy stopped on a fatal error")?;

    info!("Proxy shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
