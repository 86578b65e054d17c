//! Tunnel provider definitions and stdout matching.
//!
//! Providers are data, not code: each spec names a command to spawn and the
//! patterns that recognize its public-URL announcement. Swapping or adding
//! a provider means editing a spec, nothing else.

use serde::{Deserialize, Serialize};

/// How a provider announces its public URL on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlPattern {
    /// Any URL whose host is this domain or a subdomain of it
    HostSuffix(String),
    /// A line containing this phrase (case-insensitive); the line's first
    /// URL is taken
    Phrase(String),
}

/// An external tunnel provider, run as a subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub program: String,
    /// Arguments; "{port}" expands to the local port being exposed
    pub args: Vec<String>,
    /// Checked in order against each stdout line
    pub patterns: Vec<UrlPattern>,
    /// Seconds to wait for a URL announcement before moving on
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_deadline_secs() -> u64 {
    15
}

impl ProviderSpec {
    /// Arguments with the local port substituted in.
    pub fn resolved_args(&self, local_port: u16) -> Vec<String> {
        let port = local_port.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{port}", &port))
            .collect()
    }
}

/// The built-in provider list: free reverse-SSH endpoints, tried in order.
/// The ssh commands carry their own short connect timeout; the discovery
/// deadline is enforced separately by the chain.
pub fn default_providers() -> Vec<ProviderSpec> {
    vec![
        ProviderSpec {
            name: "localhost.run".to_string(),
            program: "ssh".to_string(),
            args: strings(&[
                "-o",
                "StrictHostKeyChecking=no",
                "-o",
                "ConnectTimeout=10",
                "-o",
                "ServerAliveInterval=30",
                "-R",
                "80:localhost:{port}",
                "nokey@localhost.run",
            ]),
            patterns: vec![
                UrlPattern::HostSuffix("lhr.life".to_string()),
                UrlPattern::Phrase("tunneled with tls termination".to_string()),
            ],
            deadline_secs: 15,
        },
        ProviderSpec {
            name: "serveo.net".to_string(),
            program: "ssh".to_string(),
            args: strings(&[
                "-o",
                "StrictHostKeyChecking=no",
                "-o",
                "ConnectTimeout=10",
                "-o",
                "ServerAliveInterval=30",
                "-R",
                "80:localhost:{port}",
                "serveo.net",
            ]),
            patterns: vec![
                UrlPattern::HostSuffix("serveo.net".to_string()),
                UrlPattern::Phrase("forwarding http traffic from".to_string()),
            ],
            deadline_secs: 15,
        },
    ]
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Scan one stdout line for a public URL, honoring pattern order.
pub fn extract_public_url(line: &str, patterns: &[UrlPattern]) -> Option<String> {
    let urls = url_tokens(line);
    if urls.is_empty() {
        return None;
    }

    for pattern in patterns {
        match pattern {
            UrlPattern::HostSuffix(suffix) => {
                if let Some(url) = urls
                    .iter()
                    .find(|u| host_of(u).is_some_and(|h| host_matches_suffix(h, suffix)))
                {
                    return Some((*url).to_string());
                }
            }
            UrlPattern::Phrase(phrase) => {
                if line.to_lowercase().contains(&phrase.to_lowercase()) {
                    return Some(urls[0].to_string());
                }
            }
        }
    }

    None
}

/// URL-looking tokens in a line, with trailing punctuation trimmed.
fn url_tokens(line: &str) -> Vec<&str> {
    line.split_whitespace()
        .filter(|token| token.starts_with("http://") || token.starts_with("https://"))
        .map(|token| token.trim_end_matches(['.', ',', ';', '"', '\'', ')']))
        .collect()
}

fn host_of(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host_port = rest.split('/').next()?;
    let host = host_port.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Anchored at a label boundary: "serveo.net" matches "abc.serveo.net" and
/// "serveo.net" itself, but not "evil-serveo.net".
fn host_matches_suffix(host: &str, suffix: &str) -> bool {
    host == suffix || host.ends_with(&format!(".{}", suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_url_by_host_suffix() {
        let patterns = vec![UrlPattern::HostSuffix("serveo.net".to_string())];

        assert_eq!(
            extract_public_url("Forwarding HTTP traffic from https://abc123.serveo.net", &patterns),
            Some("https://abc123.serveo.net".to_string())
        );
        // The bare domain itself counts
        assert_eq!(
            extract_public_url("ready at https://serveo.net", &patterns),
            Some("https://serveo.net".to_string())
        );
        // Suffix must match the host, not just appear somewhere
        assert_eq!(
            extract_public_url("see https://example.com/serveo.net", &patterns),
            None
        );
        // A lookalike host that merely ends with the text is not a match
        assert_eq!(
            extract_public_url("up at https://evil-serveo.net", &patterns),
            None
        );
        assert_eq!(extract_public_url("no urls here", &patterns), None);
    }

    #[test]
    fn test_extract_url_by_phrase() {
        let patterns = vec![UrlPattern::Phrase("forwarding http traffic from".to_string())];

        assert_eq!(
            extract_public_url(
                "Forwarding HTTP traffic from https://xyz.example.dev",
                &patterns
            ),
            Some("https://xyz.example.dev".to_string())
        );
        // Phrase absent: a URL alone is not enough
        assert_eq!(
            extract_public_url("connected to https://xyz.example.dev", &patterns),
            None
        );
    }

    #[test]
    fn test_localhost_run_banner_line() {
        let patterns = vec![
            UrlPattern::HostSuffix("lhr.life".to_string()),
            UrlPattern::Phrase("tunneled with tls termination".to_string()),
        ];
        let line = "2f0c8c9e.lhr.life tunneled with tls termination, https://2f0c8c9e.lhr.life";
        assert_eq!(
            extract_public_url(line, &patterns),
            Some("https://2f0c8c9e.lhr.life".to_string())
        );
    }

    #[test]
    fn test_pattern_order_decides_between_urls() {
        let patterns = vec![
            UrlPattern::HostSuffix("tunnel.example.net".to_string()),
            UrlPattern::Phrase("your url is".to_string()),
        ];
        // Two URLs on the line; the host-suffix pattern picks the right one
        let line = "your url is https://docs.example.com and https://a1.tunnel.example.net";
        assert_eq!(
            extract_public_url(line, &patterns),
            Some("https://a1.tunnel.example.net".to_string())
        );
    }

    #[test]
    fn test_trailing_punctuation_is_trimmed() {
        let patterns = vec![UrlPattern::Phrase("forwarding".to_string())];
        assert_eq!(
            extract_public_url("Forwarding from https://a.example.dev.", &patterns),
            Some("https://a.example.dev".to_string())
        );
    }

    #[test]
    fn test_resolved_args_substitutes_port() {
        let spec = ProviderSpec {
            name: "test".to_string(),
            program: "ssh".to_string(),
            args: strings(&["-R", "80:localhost:{port}", "host.example"]),
            patterns: vec![],
            deadline_secs: 15,
        };
        assert_eq!(
            spec.resolved_args(5004),
            vec!["-R", "80:localhost:5004", "host.example"]
        );
    }

    #[test]
    fn test_default_providers_are_well_formed() {
        let providers = default_providers();
        assert_eq!(providers.len(), 2);
        for spec in &providers {
            assert!(!spec.name.is_empty());
            assert!(!spec.patterns.is_empty());
            assert!(spec.args.iter().any(|a| a.contains("{port}")));
        }
    }

    #[test]
    fn test_provider_spec_deserializes_from_json() {
        let raw = r#"{
            "name": "custom",
            "program": "ssh",
            "args": ["-R", "80:localhost:{port}", "tunnel.example.org"],
            "patterns": [
                {"host_suffix": "tunnel.example.org"},
                {"phrase": "forwarding http traffic from"}
            ]
        }"#;
        let spec: ProviderSpec = serde_json::from_str(raw).unwrap();
        assert_eq!(spec.name, "custom");
        assert_eq!(spec.deadline_secs, 15); // default applies
        assert!(matches!(spec.patterns[0], UrlPattern::HostSuffix(_)));
        assert!(matches!(spec.patterns[1], UrlPattern::Phrase(_)));
    }
}
