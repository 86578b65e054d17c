//! Public reachability: the tunnel provider chain and the interface
//! discovery fallback.

pub mod chain;
pub mod netif;
pub mod provider;

pub use chain::{establish, run_provider, AttemptOutcome, TunnelHandle};
pub use netif::{discover_candidates, AddressScope, InterfaceCandidate, OverlayNet};
pub use provider::{default_providers, extract_public_url, ProviderSpec, UrlPattern};
