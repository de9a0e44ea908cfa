//! Network reachability probe backed by the system `ping` tool.

use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Invalid host: {0}")]
    InvalidHost(String),

    #[error("Failed to run ping: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe timed out")]
    Timeout,
}

/// Result of one probe. `latency_ms` is only set when the host answered.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReply {
    pub alive: bool,
    pub latency_ms: Option<f64>,
}

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, host: &str) -> Result<ProbeReply, ProbeError>;
}

/// Sends a single ICMP echo via `ping -c 1`.
pub struct SystemPing {
    timeout: Duration,
}

impl SystemPing {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Name resolution is not covered by `-W`, so the whole run gets a
    /// little extra on top of the reply wait.
    fn overall_timeout(&self) -> Duration {
        self.timeout.saturating_add(Duration::from_secs(2))
    }
}

impl Default for SystemPing {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Hostnames, IPv4 and IPv6 literals. Rejects anything `ping` could read
/// as a flag.
pub fn validate_host(host: &str) -> Result<(), ProbeError> {
    let well_formed = !host.is_empty()
        && host.len() <= 253
        && host.starts_with(|c: char| c.is_ascii_alphanumeric())
        && host.ends_with(|c: char| c.is_ascii_alphanumeric())
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'));
    if !well_formed {
        return Err(ProbeError::InvalidHost(host.to_string()));
    }
    Ok(())
}

/// Extract the round-trip time from `ping` output (`time=12.3 ms`).
pub fn parse_latency(output: &str) -> Option<f64> {
    static TIME: OnceLock<Option<Regex>> = OnceLock::new();
    let re = TIME
        .get_or_init(|| Regex::new(r"time[=<]([0-9]+(?:\.[0-9]+)?) ?ms").ok())
        .as_ref()?;
    re.captures(output)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[async_trait]
impl ReachabilityProbe for SystemPing {
    async fn probe(&self, host: &str) -> Result<ProbeReply, ProbeError> {
        validate_host(host)?;

        let wait_secs = self.timeout.as_secs().max(1).to_string();
        let mut cmd = Command::new("ping");
        cmd.args(["-c", "1", "-W", &wait_secs, host])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.overall_timeout(), cmd.output())
            .await
            .map_err(|_| ProbeError::Timeout)??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            tracing::debug!(
                host,
                status = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Ping reported host unreachable"
            );
            return Ok(ProbeReply {
                alive: false,
                latency_ms: None,
            });
        }

        let latency_ms = parse_latency(&stdout);
        Ok(ProbeReply {
            alive: latency_ms.is_some(),
            latency_ms,
        })
    }
}
