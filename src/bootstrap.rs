//! Background reachability bootstrap.
//!
//! Spawned by `main` once the HTTP surface is up. Walks the tunnel provider
//! chain; on exhaustion, falls back to interface discovery. Every outcome is
//! recorded in shared state and reported on the terminal; nothing here can
//! fail the service.

use std::sync::Arc;

use log::info;

use crate::banner::reachability_banner;
use crate::state::AppState;
use crate::tunnel::{discover_candidates, establish};

/// Spawn the bootstrap as a fire-and-forget task.
pub fn spawn_bootstrap(state: Arc<AppState>) {
    tokio::spawn(bootstrap(state));
}

async fn bootstrap(state: Arc<AppState>) {
    let port = state.config.port;
    info!("🚀 Probing public reachability for port {}", port);

    match establish(port, &state.config.providers).await {
        Some((handle, url)) => {
            state.record_tunnel(handle, url).await;
        }
        None => {
            let candidates = discover_candidates(&state.config.overlay_net);
            state.record_candidates(candidates).await;
        }
    }

    let report = state.reachability().await;
    println!("{}", reachability_banner(port, &report.mode));
}
