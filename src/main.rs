mod config;
mod designer;
mod error;
mod fengshui;
mod gemini;
mod models;
mod prompts;
mod retry;
mod routes;
mod state;

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::{config::Config, gemini::GeminiClient, routes::build_router, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; .env is read inside from_env
    let config = Arc::new(Config::from_env()?);

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    tracing::info!("Using API key: {}", config.redacted_key());
    tracing::info!(
        image_model = %config.gemini.image_model,
        text_model = %config.gemini.text_model,
        variations = config.design.variation_count,
        max_retries = config.design.retry.max_retries,
        edit_policy = ?config.edit_policy,
        max_upload_bytes = config.max_upload_bytes,
        "Configuration loaded"
    );

    let gemini = Arc::new(GeminiClient::new(&config.gemini).context("failed to build Gemini HTTP client")?);
    let state = AppState::new(config.clone(), gemini.clone(), gemini);

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
