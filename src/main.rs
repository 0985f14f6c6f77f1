mod bot;
mod config;
mod llm;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;
use crate::llm::GeminiClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,geminibot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Credentials must be present before anything else is set up
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Model: {}", config.gemini.model);
    info!("  Gemini API: {}", config.gemini.base_url);
    match config.gemini.request_timeout() {
        Some(timeout) => info!("  Request timeout: {:?}", timeout),
        None => info!("  Request timeout: none"),
    }

    let gemini = GeminiClient::new(config.gemini.clone())?;
    let state = Arc::new(AppState::new(config, Arc::new(gemini)));

    info!("Bot is running...");
    platform::telegram::run(state).await?;

    Ok(())
}
