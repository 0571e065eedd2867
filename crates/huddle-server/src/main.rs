//! # Huddle Server
//!
//! Real-time discussion relay.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (port 3000)
//! huddle
//!
//! # Run with a config file in the working directory
//! cp huddle.example.toml huddle.toml && huddle
//!
//! # Run with environment variables
//! HUDDLE_PORT=8080 HUDDLE_HOST=127.0.0.1 huddle
//! ```

mod config;
mod handlers;
mod metrics;
mod session;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Huddle server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
