mod api;
mod config;
mod directory;
mod error;
mod models;
mod radio_browser;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::{create_router, AppState};
use crate::config::AppConfig;
use crate::directory::Directory;
use crate::radio_browser::RadioBrowserClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::load().context("Failed to load config")?;
    let client = RadioBrowserClient::new(&config.upstream)?;
    let mirrors: Vec<&str> = client.mirrors().iter().map(|u| u.as_str()).collect();
    info!(?mirrors, "upstream mirrors configured");

    let state = AppState {
        directory: Arc::new(Directory::new(client)),
    };
    let app = create_router(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!(addr = %config.listen, "radio directory listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
    }
}
