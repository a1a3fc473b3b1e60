// =============================================================================
// AI Stock Analyser — Main Entry Point
// =============================================================================
//
// Starts without a broker session. The instrument directory is loaded once at
// startup (usually refused until someone logs in) and again after every
// successful `/callback`.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod api;
mod app_state;
mod config;
mod error;
mod instruments;
mod kite;
mod session;
mod types;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::analysis::OpenAiClient;
use crate::app_state::AppState;
use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::error::RefreshError;
use crate::kite::KiteClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load(DEFAULT_CONFIG_PATH)
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        })
        .with_env();

    info!(app = %config.app_name, exchange = %config.exchange, "starting up");

    // ── 2. Remote clients ────────────────────────────────────────────────
    let broker = KiteClient::from_config(&config).context("failed to build broker client")?;
    let completion =
        OpenAiClient::from_config(&config).context("failed to build completion client")?;
    info!(model = completion.model(), "completion client ready");

    // ── 3. Shared state ──────────────────────────────────────────────────
    let state = Arc::new(AppState::new(config, Arc::new(broker), Arc::new(completion))?);

    // ── 4. Startup instrument load ───────────────────────────────────────
    match state.refresh_instruments().await {
        Ok(count) => info!(count, "instrument directory ready"),
        Err(RefreshError::LoginRequired(_)) => {
            info!("instrument directory empty until the first broker login")
        }
        Err(RefreshError::Unavailable(e)) => {
            warn!(error = %e, "broker unreachable at startup, directory empty until login")
        }
    }

    // ── 5. HTTP server ───────────────────────────────────────────────────
    let bind_addr = state.config.bind_addr.clone();
    let app = api::rest::router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    info!("AI Stock Analyser shut down complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    warn!("Shutdown signal received, stopping gracefully");
}
