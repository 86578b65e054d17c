//! Image Synthesis Gateway
//!
//! A small HTTP gateway in front of an asynchronous image generation
//! service. Generation jobs are submitted upstream and tracked by task id;
//! at startup the gateway tries to make itself publicly reachable through
//! a chain of tunnel providers, falling back to reporting local addresses.
//!
//! ## Usage
//! ```bash
//! EASEL_PORT=5004 cargo run
//! curl -X POST localhost:5004/generate-image \
//!   -H 'Content-Type: application/json' \
//!   -d '{"prompt": "a watercolor fox"}'
//! ```

use std::sync::Arc;

use log::info;

use easel::api::run_api;
use easel::bootstrap::spawn_bootstrap;
use easel::config::Config;
use easel::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; load it before the logger reads RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 Starting image synthesis gateway...");

    let config = Config::load()?;
    info!("✓ Configuration loaded (port {})", config.port);

    let state = Arc::new(AppState::new(config));
    info!("✓ Application state initialized");

    // Reachability bootstrap runs in the background; the API serves
    // local traffic immediately.
    spawn_bootstrap(state.clone());

    run_api(state).await?;

    Ok(())
}
