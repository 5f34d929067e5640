//! hopswap service - multi-hop swaps over the ChangeNOW exchange API
//!
//! Serves the swap API, tracks created hops in the background and exposes
//! Prometheus metrics.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use hopswap::api;
use hopswap::config::{LoggingConfig, Settings};
use hopswap::coordination::SwapEngine;
use hopswap::metrics::MetricsServer;
use hopswap::parser::PatternParser;
use hopswap::provider::ChangeNowClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging
    init_logging(&settings.logging);

    info!("Starting hopswap v{}", env!("CARGO_PKG_VERSION"));
    info!("Exchange provider: {}", settings.provider.base_url);

    // One client serves catalog, exchange and probe roles
    let client = Arc::new(ChangeNowClient::new(&settings.provider)?);

    let engine = Arc::new(SwapEngine::new(
        client.clone(),
        client.clone(),
        client,
        Arc::new(PatternParser::new()),
        &settings.planner,
        &settings.tracker,
    ));

    // An unreachable provider is not fatal; POST /connect retries
    match engine.connect().await {
        Ok(count) => info!("Currency catalog loaded ({} currencies)", count),
        Err(e) => warn!("Starting without provider connection: {}", e),
    }

    // Initialize metrics server
    let metrics_server = if settings.metrics.enabled {
        Some(MetricsServer::new(settings.metrics.port))
    } else {
        None
    };

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let engine = engine.clone();
        async move {
            if let Err(e) = api::run_server(config, engine).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = metrics_server.map(|server| {
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        })
    });

    // Start status tracker
    let tracker_handle = tokio::spawn({
        let tracker = engine.tracker().clone();
        async move {
            if let Err(e) = tracker.run().await {
                error!("Status tracker error: {}", e);
            }
        }
    });

    info!("hopswap is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    engine.tracker().stop().await;

    api_handle.abort();
    tracker_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    let stats = engine.ledger().stats();
    info!(
        "hopswap stopped ({} waiting, {} finished, {} failed)",
        stats.waiting, stats.finished, stats.failed
    );
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hopswap=debug,hyper=warn,reqwest=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
