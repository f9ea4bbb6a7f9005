use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tracing::{info, warn};

use carbon_credit_market::api::create_router_with_timeout;
use carbon_credit_market::app::AppState;
use carbon_credit_market::config::ServerConfig;
use carbon_credit_market::infra::InMemoryCreditStore;
use carbon_credit_market::infra::observability::{init_metrics_handle, init_tracing};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    init_tracing(config.log_format);

    let store = Arc::new(InMemoryCreditStore::init());
    let mut state = AppState::new(store);

    if config.enable_metrics {
        match init_metrics_handle() {
            Some(handle) => state = state.with_metrics(handle),
            None => warn!("Prometheus recorder could not be installed, /metrics disabled"),
        }
    }

    let state = Arc::new(state);
    let router = create_router_with_timeout(Arc::clone(&state), config.request_timeout);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        address = %addr,
        metrics = state.metrics.is_some(),
        "Carbon credit market listening (docs at /swagger-ui)"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    state.service.shutdown().await?;
    info!("Store closed, shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
