use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod error;
mod extract;
mod models;
mod routes;
mod state;

use common::config::AppConfig;
use generator::{GeminiClient, GeminiConfig};
use tokio::net::TcpListener;

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting matanest API service");

    let config = AppConfig::load()?;

    let gemini_config = GeminiConfig::new(&config.model, GeminiConfig::api_key_from_env());
    if !gemini_config.has_credential() {
        warn!("No API key configured; generation will mark every item as failed");
    }
    info!("Using model {} at {}", gemini_config.model, gemini_config.base_url);

    let app_state = AppState::new(&config, Arc::new(GeminiClient::new(gemini_config)))?;
    info!(
        "Intake limits {}",
        if config.intake.enforce_limits { "enforced" } else { "disabled" }
    );

    // Start the web server
    let app = routes::create_router(app_state);

    let address = config.server.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("API service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
