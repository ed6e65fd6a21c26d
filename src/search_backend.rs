//! Subprocess-backed channel search.
//!
//! Channel discovery needs live web lookups this process does not perform
//! itself, so it is delegated to a separate search-capable agent executable.
//! The rest of the pipeline only sees the `ChannelSearchBackend` trait.

use crate::parser::output_tail;
use crate::types::{Channel, DiscoveryConstraints, MinerError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

/// Lines of captured output kept for failure diagnostics.
const TAIL_LINES: usize = 20;

/// Abstracts how channel proposals are produced, so the pipeline stays
/// agnostic to the search mechanism.
#[async_trait]
pub trait ChannelSearchBackend: Send + Sync {
    async fn propose(
        &self,
        query: &str,
        constraints: &DiscoveryConstraints,
    ) -> Result<Vec<Channel>>;
}

/// Configuration for the search agent subprocess.
#[derive(Debug, Clone)]
pub struct SearchAgentConfig {
    /// Path to the search agent executable.
    pub executable: PathBuf,
    /// Hard wall-clock limit; the agent performs many sequential searches,
    /// so the default is generous.
    pub timeout: Duration,
    /// How long to wait after the graceful-termination signal before the
    /// forceful kill.
    pub grace_period: Duration,
    /// Environment variables re-exported into the otherwise empty subprocess
    /// environment.
    pub env_allowlist: Vec<String>,
    /// Alternate-credential variables explicitly unset so exactly one
    /// credential path exists.
    pub env_denylist: Vec<String>,
}

impl SearchAgentConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: Duration::from_secs(600),
            grace_period: Duration::from_secs(5),
            env_allowlist: vec![
                "PATH".to_string(),
                "HOME".to_string(),
                "SEARCH_AGENT_API_KEY".to_string(),
            ],
            env_denylist: vec!["SEARCH_AGENT_OAUTH_TOKEN".to_string()],
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

/// Final-line result record emitted by the search agent on stdout.
#[derive(Debug, Deserialize)]
struct SearchAgentResult {
    status: String,
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    error: Option<String>,
}

/// Spawns the search agent, enforces the wall clock, and parses the
/// newline-delimited result protocol. One subprocess per call; there is no
/// concurrent reuse.
pub struct SubprocessSearchBackend {
    config: SearchAgentConfig,
}

impl SubprocessSearchBackend {
    pub fn new(config: SearchAgentConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, query: &str, constraints: &DiscoveryConstraints) -> Command {
        let mut cmd = Command::new(&self.config.executable);
        cmd.arg("--query").arg(query);
        if let Some(context) = &constraints.company_context {
            cmd.arg("--company-context").arg(context);
        }
        for constraint in &constraints.constraints {
            cmd.arg("--constraint").arg(constraint);
        }

        // Minimal environment: only the allow-listed variables survive, and
        // the alternate-credential path is closed off.
        cmd.env_clear();
        for key in &self.config.env_allowlist {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }
        for key in &self.config.env_denylist {
            cmd.env_remove(key);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Graceful-then-forceful termination after a timeout.
    async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to search agent: {}", e);
            } else {
                debug!("Sent SIGTERM to search agent (PID {})", pid);
            }
        }

        match tokio::time::timeout(self.config.grace_period, child.wait()).await {
            Ok(_) => debug!("Search agent exited after termination signal"),
            Err(_) => {
                warn!("Search agent did not stop gracefully, force killing");
                if let Err(e) = child.kill().await {
                    error!("Failed to kill search agent: {}", e);
                }
            }
        }
    }
}

#[async_trait]
impl ChannelSearchBackend for SubprocessSearchBackend {
    async fn propose(
        &self,
        query: &str,
        constraints: &DiscoveryConstraints,
    ) -> Result<Vec<Channel>> {
        info!(
            executable = %self.config.executable.display(),
            "Starting channel search agent"
        );

        let mut child = self
            .build_command(query, constraints)
            .spawn()
            .map_err(|e| {
                MinerError::Search(format!(
                    "failed to spawn search agent {}: {}",
                    self.config.executable.display(),
                    e
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MinerError::Search("search agent stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MinerError::Search("search agent stderr not captured".to_string()))?;

        // Message counting is diagnostics only; control flow never depends
        // on it.
        let stdout_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut collected = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                collected.push(line);
                debug!(messages = collected.len(), "Search agent message received");
            }
            collected
        });
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                collected.push(line);
            }
            collected
        });

        let status = match tokio::time::timeout(self.config.timeout, child.wait()).await {
            Err(_) => {
                warn!(
                    timeout_secs = self.config.timeout.as_secs(),
                    "Search agent exceeded wall clock, terminating"
                );
                self.terminate(&mut child).await;
                let mut lines = stdout_task.await.unwrap_or_default();
                lines.extend(stderr_task.await.unwrap_or_default());
                return Err(MinerError::Timeout {
                    seconds: self.config.timeout.as_secs(),
                    output_tail: output_tail(&lines, TAIL_LINES),
                });
            }
            Ok(status) => status?,
        };

        let stdout_lines = stdout_task.await.unwrap_or_default();
        let stderr_lines = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let mut lines = stdout_lines;
            lines.extend(stderr_lines);
            return Err(MinerError::Search(format!(
                "search agent exited with {}; output tail:\n{}",
                status,
                output_tail(&lines, TAIL_LINES)
            )));
        }

        let last_line = stdout_lines
            .iter()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| MinerError::Search("search agent produced no output".to_string()))?;

        let result: SearchAgentResult = serde_json::from_str(last_line.trim()).map_err(|e| {
            MinerError::Search(format!("malformed search agent result line: {}", e))
        })?;

        if result.status != "ok" {
            return Err(MinerError::Search(
                result
                    .error
                    .unwrap_or_else(|| format!("search agent reported status '{}'", result.status)),
            ));
        }

        info!(channels = result.channels.len(), "Search agent finished");
        Ok(result.channels)
    }
}
