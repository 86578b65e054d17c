//! Image synthesis gateway library.
//!
//! Provides components for building the gateway service.

pub mod api;
pub mod banner;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod state;
pub mod synthesis;
pub mod tunnel;

pub use api::{create_router, run_api};
pub use bootstrap::spawn_bootstrap;
pub use config::Config;
pub use error::JobError;
pub use state::{AppState, Reachability, ReachabilityReport};
pub use synthesis::{
    PollOutcome, PollPolicy, SynthesisClient, SynthesisOutcome, SynthesisRequest,
};
pub use tunnel::{discover_candidates, establish, InterfaceCandidate, TunnelHandle};
