//! Shared state for the running gateway.

use std::time::SystemTime;

use log::info;
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::synthesis::SynthesisClient;
use crate::tunnel::{InterfaceCandidate, TunnelHandle};

/// How the gateway can currently be reached from outside.
#[derive(Debug, Clone)]
pub enum Reachability {
    /// Bootstrap is still working through the provider chain
    Probing,
    /// A tunnel is up and traffic arrives through its public URL
    Tunneled { provider: String, url: String },
    /// No tunnel; these local addresses are the best we can offer
    LanOnly { candidates: Vec<InterfaceCandidate> },
}

/// Reachability plus when it was last established.
#[derive(Debug, Clone)]
pub struct ReachabilityReport {
    pub mode: Reachability,
    pub since: SystemTime,
}

/// Thread-safe state shared by the HTTP surface and the bootstrap task.
pub struct AppState {
    pub config: Config,
    pub synthesis: SynthesisClient,
    reachability: RwLock<ReachabilityReport>,
    /// Live tunnel child, parked here so it outlives the bootstrap task
    tunnel: Mutex<Option<TunnelHandle>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let synthesis = SynthesisClient::new(&config);
        Self {
            config,
            synthesis,
            reachability: RwLock::new(ReachabilityReport {
                mode: Reachability::Probing,
                since: SystemTime::now(),
            }),
            tunnel: Mutex::new(None),
        }
    }

    /// Park an established tunnel and publish its URL.
    pub async fn record_tunnel(&self, handle: TunnelHandle, url: String) {
        let provider = handle.provider().to_string();
        info!("Reachable via tunnel '{}': {}", provider, url);
        *self.reachability.write().await = ReachabilityReport {
            mode: Reachability::Tunneled { provider, url },
            since: SystemTime::now(),
        };
        *self.tunnel.lock().await = Some(handle);
    }

    /// Publish the interface fallback after the provider chain is exhausted.
    pub async fn record_candidates(&self, candidates: Vec<InterfaceCandidate>) {
        info!(
            "No tunnel available, falling back to {} local address(es)",
            candidates.len()
        );
        *self.reachability.write().await = ReachabilityReport {
            mode: Reachability::LanOnly { candidates },
            since: SystemTime::now(),
        };
    }

    pub async fn reachability(&self) -> ReachabilityReport {
        self.reachability.read().await.clone()
    }

    /// Tear down the parked tunnel, if any. Used on shutdown.
    pub async fn shutdown_tunnel(&self) {
        if let Some(handle) = self.tunnel.lock().await.take() {
            info!("Shutting down tunnel '{}'", handle.provider());
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    use crate::tunnel::AddressScope;

    fn test_config() -> Config {
        Config {
            port: 5004,
            api_base_url: "http://127.0.0.1:1".to_string(),
            api_key: "sk-test".to_string(),
            spool_dir: std::env::temp_dir(),
            overlay_net: crate::tunnel::OverlayNet::parse("100.64.0.0/10").unwrap(),
            providers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_state_starts_probing() {
        let state = AppState::new(test_config());
        assert!(matches!(
            state.reachability().await.mode,
            Reachability::Probing
        ));
    }

    #[tokio::test]
    async fn test_record_candidates_switches_to_lan_only() {
        let state = AppState::new(test_config());
        state
            .record_candidates(vec![InterfaceCandidate {
                address: Ipv4Addr::new(192, 168, 1, 20),
                scope: AddressScope::PrivateLan,
            }])
            .await;

        match state.reachability().await.mode {
            Reachability::LanOnly { candidates } => {
                assert_eq!(candidates.len(), 1);
                assert_eq!(candidates[0].address, Ipv4Addr::new(192, 168, 1, 20));
            }
            other => panic!("expected LanOnly, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recording_refreshes_the_since_stamp() {
        let state = AppState::new(test_config());
        let before = state.reachability().await.since;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        state.record_candidates(Vec::new()).await;
        let after = state.reachability().await.since;
        assert!(after > before);
    }

    #[tokio::test]
    async fn test_shutdown_without_tunnel_is_a_no_op() {
        let state = AppState::new(test_config());
        state.shutdown_tunnel().await;
        assert!(matches!(
            state.reachability().await.mode,
            Reachability::Probing
        ));
    }
}
