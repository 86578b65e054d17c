//! Configuration for the gateway.
//!
//! Settings come from environment variables (a `.env` file is honored by
//! the binary) plus a small JSON key store holding the provider credential.
//! The loaded `Config` is passed around by handle; nothing here is global.

use std::path::{Path, PathBuf};

use anyhow::Context;
use log::warn;

use crate::tunnel::{default_providers, OverlayNet, ProviderSpec};

// ============================================================================
// Environment variable names
// ============================================================================

mod env {
    pub const PORT: &str = "EASEL_PORT";
    pub const API_BASE_URL: &str = "EASEL_API_BASE_URL";
    pub const KEY_FILE: &str = "EASEL_KEY_FILE";
    pub const SPOOL_DIR: &str = "EASEL_SPOOL_DIR";
    pub const OVERLAY_CIDR: &str = "EASEL_OVERLAY_CIDR";
    pub const PROVIDERS_FILE: &str = "EASEL_PROVIDERS_FILE";
}

/// Key-store entry holding the provider credential
const API_KEY_NAME: &str = "qwen-api-key";

const DEFAULT_PORT: u16 = 5004;
const DEFAULT_API_BASE_URL: &str = "https://dashscope.aliyuncs.com/api/v1";
const DEFAULT_KEY_FILE: &str = "api-key.json";
const DEFAULT_SPOOL_DIR: &str = "spool";
/// CGNAT space, the range common VPN meshes hand out
const DEFAULT_OVERLAY_CIDR: &str = "100.64.0.0/10";

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP surface binds on (and the port tunnels expose)
    pub port: u16,
    /// Base URL of the synthesis provider API
    pub api_base_url: String,
    /// Bearer credential; empty when the key store is absent, in which
    /// case the first remote call surfaces the provider's auth failure
    pub api_key: String,
    /// Directory for staged edit images
    pub spool_dir: PathBuf,
    /// Prefix classified as the VPN overlay during interface discovery
    pub overlay_net: OverlayNet,
    /// Tunnel providers, tried in order
    pub providers: Vec<ProviderSpec>,
}

impl Config {
    /// Load configuration from the environment and the key store.
    pub fn load() -> anyhow::Result<Self> {
        let port: u16 = env_or(env::PORT, &DEFAULT_PORT.to_string())
            .parse()
            .with_context(|| format!("{} must be a port number", env::PORT))?;

        let api_base_url = env_or(env::API_BASE_URL, DEFAULT_API_BASE_URL);

        let key_file = PathBuf::from(env_or(env::KEY_FILE, DEFAULT_KEY_FILE));
        let api_key = load_api_key(&key_file)?;

        let spool_dir = PathBuf::from(env_or(env::SPOOL_DIR, DEFAULT_SPOOL_DIR));

        let overlay_cidr = env_or(env::OVERLAY_CIDR, DEFAULT_OVERLAY_CIDR);
        let overlay_net = OverlayNet::parse(&overlay_cidr).with_context(|| {
            format!(
                "{} must be IPv4 CIDR notation, got '{}'",
                env::OVERLAY_CIDR,
                overlay_cidr
            )
        })?;

        let providers = match std::env::var(env::PROVIDERS_FILE) {
            Ok(path) => load_providers(Path::new(&path))?,
            Err(_) => default_providers(),
        };

        let config = Self {
            port,
            api_base_url,
            api_key,
            spool_dir,
            overlay_net,
            providers,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for spec in &self.providers {
            if spec.name.trim().is_empty() || spec.program.trim().is_empty() {
                anyhow::bail!("tunnel provider entries need a name and a program");
            }
        }
        Ok(())
    }

    /// Bind address for the HTTP surface.
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read the bearer credential from the JSON key store. A missing store is
/// a degraded start, not a failure; a malformed one is an error.
fn load_api_key(path: &Path) -> anyhow::Result<String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Key store {} not found, continuing without a credential",
                path.display()
            );
            return Ok(String::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading key store {}", path.display()));
        }
    };

    let store: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing key store {}", path.display()))?;

    let api_key = store
        .get(API_KEY_NAME)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    if api_key.is_empty() {
        warn!(
            "Key store {} has no '{}' entry",
            path.display(),
            API_KEY_NAME
        );
    }

    Ok(api_key)
}

fn load_providers(path: &Path) -> anyhow::Result<Vec<ProviderSpec>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading providers file {}", path.display()))?;
    let providers: Vec<ProviderSpec> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing providers file {}", path.display()))?;
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_store_degrades_to_empty_credential() {
        let dir = tempfile::tempdir().unwrap();
        let key = load_api_key(&dir.path().join("api-key.json")).unwrap();
        assert!(key.is_empty());
    }

    #[test]
    fn test_key_store_reads_named_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api-key.json");
        std::fs::write(&path, r#"{"qwen-api-key": "sk-test-123", "other": "x"}"#).unwrap();
        assert_eq!(load_api_key(&path).unwrap(), "sk-test-123");
    }

    #[test]
    fn test_key_store_without_entry_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api-key.json");
        std::fs::write(&path, r#"{"another-service-key": "sk-x"}"#).unwrap();
        assert!(load_api_key(&path).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_key_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api-key.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_api_key(&path).is_err());
    }

    #[test]
    fn test_providers_file_round_trips_specs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("providers.json");
        let specs = default_providers();
        std::fs::write(&path, serde_json::to_string(&specs).unwrap()).unwrap();

        let loaded = load_providers(&path).unwrap();
        assert_eq!(loaded.len(), specs.len());
        assert_eq!(loaded[0].name, specs[0].name);
    }
}
