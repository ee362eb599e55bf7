//! Caching Proxy - A forwarding HTTP proxy with a shared response cache
//!
//! Relays GET requests to origin servers with rewritten headers and answers
//! repeat requests from a size-bounded LRU cache.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caching_proxy::api::{serve_admin, AppState};
use caching_proxy::{spawn_stats_reporter, CacheStore, Config, ConnectionHandler, ProxyListener};

/// Forwarding HTTP proxy with an in-memory response cache.
#[derive(Parser, Debug)]
#[command(name = "caching_proxy", version, about)]
struct Cli {
    /// Port to accept client connections on
    port: u16,
}

/// Main entry point for the caching proxy.
///
/// # Startup Sequence
/// 1. Parse the listening port from the command line
/// 2. Initialize tracing subscriber for logging
/// 3. Load and validate configuration from environment variables
/// 4. Create the shared cache store
/// 5. Start the stats reporter and, if configured, the admin API
/// 6. Accept proxy connections until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Exits with usage on stderr and a non-zero status on bad arguments
    let cli = Cli::parse();

    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caching_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting caching proxy");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: max_cache_size={}, max_object_size={}, max_connections={}, io_timeout={}s",
        config.max_cache_size, config.max_object_size, config.max_connections, config.io_timeout
    );

    let cache = Arc::new(CacheStore::from_config(&config));
    info!("Cache store initialized");

    let reporter = (config.stats_interval > 0)
        .then(|| spawn_stats_reporter(cache.clone(), config.stats_interval));

    let (admin_stop, admin_stopped) = oneshot::channel();
    let admin = match config.admin_port {
        Some(port) => Some(spawn_admin(cache.clone(), port, admin_stopped).await?),
        None => None,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = ProxyListener::bind(addr, config.max_connections)
        .await
        .with_context(|| format!("failed to bind proxy port {}", cli.port))?;
    info!("Proxy listening on {}", addr);

    let handler = ConnectionHandler::from_config(cache, &config);

    tokio::select! {
        _ = listener.serve(handler) => {}
        _ = shutdown_signal() => {}
    }

    if let Some(handle) = reporter {
        handle.abort();
        warn!("Stats reporter aborted");
    }
    if let Some(handle) = admin {
        let _ = admin_stop.send(());
        if let Err(e) = handle.await {
            warn!(error = %e, "Admin API task failed");
        }
        info!("Admin API drained");
    }

    info!("Proxy shutdown complete");
    Ok(())
}

/// Binds the admin API and serves it in the background until `stop` fires.
async fn spawn_admin(
    cache: Arc<CacheStore>,
    port: u16,
    stop: oneshot::Receiver<()>,
) -> anyhow::Result<JoinHandle<()>> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind admin port {}", port))?;
    info!("Admin API listening on http://{}", addr);

    let shutdown = async move {
        let _ = stop.await;
    };
    Ok(tokio::spawn(async move {
        if let Err(e) = serve_admin(listener, AppState::new(cache), shutdown).await {
            warn!(error = %e, "Admin API stopped");
        }
    }))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
