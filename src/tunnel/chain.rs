//! Ordered fallback across tunnel providers.
//!
//! Each provider runs as a subprocess whose stdout is scanned line by line
//! for a public URL, under a per-provider deadline. The first provider to
//! announce a URL wins; everything else is killed before moving on, so no
//! helper process outlives its attempt.

use std::process::Stdio;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::{timeout_at, Instant};

use super::provider::{extract_public_url, ProviderSpec};

/// A live tunnel subprocess together with its stdout drain task.
///
/// The caller owns termination. `kill_on_drop` is set on the child so a
/// dropped handle still takes the process down with the runtime.
#[derive(Debug)]
pub struct TunnelHandle {
    provider: String,
    child: Child,
    drain: tokio::task::JoinHandle<()>,
}

impl TunnelHandle {
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Terminate the tunnel process and stop draining its output.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("Tunnel process already gone: {}", e);
        }
        self.drain.abort();
    }
}

/// How a single provider attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The provider announced a public URL; the process is still running
    Discovered { handle: TunnelHandle, url: String },
    /// No URL within the provider's deadline
    TimedOut,
    /// stdout closed (the process exited or gave up) before any URL
    ProcessExited,
    /// The command could not be spawned at all
    SpawnFailed(std::io::Error),
}

/// Walk the provider list in order; first success wins.
///
/// Returns the live handle and the announced URL, or `None` when every
/// provider failed. Runs once; the caller decides what exhaustion means.
pub async fn establish(
    local_port: u16,
    specs: &[ProviderSpec],
) -> Option<(TunnelHandle, String)> {
    for spec in specs {
        info!("Trying tunnel provider '{}'...", spec.name);
        match run_provider(spec, local_port).await {
            AttemptOutcome::Discovered { handle, url } => {
                info!("✓ Tunnel established via '{}': {}", spec.name, url);
                return Some((handle, url));
            }
            AttemptOutcome::TimedOut => {
                warn!(
                    "Provider '{}' announced no public URL within {}s",
                    spec.name, spec.deadline_secs
                );
            }
            AttemptOutcome::ProcessExited => {
                warn!("Provider '{}' exited before announcing a URL", spec.name);
            }
            AttemptOutcome::SpawnFailed(e) => {
                warn!("Provider '{}' failed to start: {}", spec.name, e);
            }
        }
    }
    None
}

/// Run one provider attempt to completion.
///
/// State machine: spawn, then read stdout lines until a pattern matches,
/// the deadline passes, or the stream ends. On every non-success path the
/// child is killed and reaped before returning.
pub async fn run_provider(spec: &ProviderSpec, local_port: u16) -> AttemptOutcome {
    let args = spec.resolved_args(local_port);
    debug!(
        "Starting provider '{}': {} {}",
        spec.name,
        spec.program,
        args.join(" ")
    );

    let mut child = match Command::new(&spec.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return AttemptOutcome::SpawnFailed(e),
    };

    let Some(stdout) = child.stdout.take() else {
        terminate(&spec.name, &mut child).await;
        return AttemptOutcome::ProcessExited;
    };

    let deadline = Instant::now() + Duration::from_secs(spec.deadline_secs);
    let mut lines = BufReader::new(stdout).lines();

    loop {
        match timeout_at(deadline, lines.next_line()).await {
            Ok(Ok(Some(line))) => {
                debug!("[{}] {}", spec.name, line.trim_end());
                if let Some(url) = extract_public_url(&line, &spec.patterns) {
                    let drain = spawn_drain(spec.name.clone(), lines);
                    return AttemptOutcome::Discovered {
                        handle: TunnelHandle {
                            provider: spec.name.clone(),
                            child,
                            drain,
                        },
                        url,
                    };
                }
            }
            Ok(Ok(None)) => {
                terminate(&spec.name, &mut child).await;
                return AttemptOutcome::ProcessExited;
            }
            Ok(Err(e)) => {
                warn!("[{}] stdout read failed: {}", spec.name, e);
                terminate(&spec.name, &mut child).await;
                return AttemptOutcome::ProcessExited;
            }
            Err(_) => {
                terminate(&spec.name, &mut child).await;
                return AttemptOutcome::TimedOut;
            }
        }
    }
}

/// Keep reading the provider's stdout so the pipe never fills up and the
/// process never dies on a broken pipe. Ends on stream EOF.
fn spawn_drain(
    name: String,
    mut lines: tokio::io::Lines<BufReader<ChildStdout>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("[{}] {}", name, line.trim_end());
        }
    })
}

/// Kill and reap the child. tokio's `kill` waits for the exit, so no
/// zombie is left behind; an already-exited child is not an error.
async fn terminate(name: &str, child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!("[{}] kill returned an error (process gone): {}", name, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::provider::UrlPattern;

    fn sh_spec(name: &str, script: &str, patterns: Vec<UrlPattern>, deadline_secs: u64) -> ProviderSpec {
        ProviderSpec {
            name: name.to_string(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            patterns,
            deadline_secs,
        }
    }

    fn phrase_patterns() -> Vec<UrlPattern> {
        vec![UrlPattern::Phrase("forwarding http traffic from".to_string())]
    }

    #[tokio::test]
    async fn test_run_provider_discovers_announced_url() {
        let spec = sh_spec(
            "fake-tunnel",
            "echo Forwarding HTTP traffic from https://abc.fake.test; sleep 5",
            phrase_patterns(),
            5,
        );

        match run_provider(&spec, 5004).await {
            AttemptOutcome::Discovered { handle, url } => {
                assert_eq!(url, "https://abc.fake.test");
                assert_eq!(handle.provider(), "fake-tunnel");
                handle.shutdown().await;
            }
            other => panic!("expected discovery, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_provider_times_out_on_silence() {
        let spec = sh_spec("silent", "sleep 30", phrase_patterns(), 1);

        let started = std::time::Instant::now();
        let outcome = run_provider(&spec, 5004).await;
        assert!(matches!(outcome, AttemptOutcome::TimedOut));
        // Well under the script's 30s sleep: the child was killed
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_run_provider_detects_early_exit() {
        let spec = sh_spec("chatty", "echo no urls here", phrase_patterns(), 5);
        let outcome = run_provider(&spec, 5004).await;
        assert!(matches!(outcome, AttemptOutcome::ProcessExited));
    }

    #[tokio::test]
    async fn test_run_provider_reports_missing_program() {
        let spec = ProviderSpec {
            name: "missing".to_string(),
            program: "definitely-not-a-real-binary-kqzx".to_string(),
            args: vec![],
            patterns: phrase_patterns(),
            deadline_secs: 1,
        };
        let outcome = run_provider(&spec, 5004).await;
        assert!(matches!(outcome, AttemptOutcome::SpawnFailed(_)));
    }

    #[tokio::test]
    async fn test_establish_falls_through_and_kills_the_first_provider() {
        // The first script would leave a marker once its sleep finishes; a
        // killed child never reaches the touch.
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("first-survived");
        let first_script = format!("sleep 3; touch '{}'", marker.display());
        let specs = vec![
            sh_spec("first-silent", &first_script, phrase_patterns(), 1),
            sh_spec(
                "second-good",
                "echo Forwarding HTTP traffic from https://win.fake.test; sleep 5",
                phrase_patterns(),
                5,
            ),
        ];

        let (handle, url) = establish(5004, &specs).await.unwrap();
        assert_eq!(url, "https://win.fake.test");
        assert_eq!(handle.provider(), "second-good");
        handle.shutdown().await;

        // Wait out the first script's sleep; only a surviving child could
        // have touched the marker
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_establish_returns_none_on_exhaustion() {
        let specs = vec![
            sh_spec("no-url", "echo nothing to see", phrase_patterns(), 2),
            sh_spec("also-no-url", "true", phrase_patterns(), 2),
        ];
        assert!(establish(5004, &specs).await.is_none());
    }

    #[tokio::test]
    async fn test_discovery_skips_non_matching_lines() {
        let spec = sh_spec(
            "verbose",
            "echo Warning: Permanently added host; \
             echo Forwarding HTTP traffic from https://later.fake.test; sleep 5",
            phrase_patterns(),
            5,
        );

        match run_provider(&spec, 5004).await {
            AttemptOutcome::Discovered { handle, url } => {
                assert_eq!(url, "https://later.fake.test");
                handle.shutdown().await;
            }
            other => panic!("expected discovery, got {other:?}"),
        }
    }
}
