//! `.ping <host>`: reachability probe with latency.

use async_trait::async_trait;
use std::sync::Arc;

use super::CommandHandler;
use crate::probe::ReachabilityProbe;
use crate::reply::ReplyChannel;

pub const MISSING_HOST: &str = "Please provide a server to ping, e.g., `.ping google.com`";
pub const PROBE_ERROR: &str = "Error pinging the server. Please check the server address.";

pub struct PingCommand {
    probe: Arc<dyn ReachabilityProbe>,
}

impl PingCommand {
    pub fn new(probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self { probe }
    }
}

/// Render latency without a trailing `.0` for whole milliseconds.
fn format_latency(ms: f64) -> String {
    if ms.fract() == 0.0 {
        format!("{}", ms as u64)
    } else {
        format!("{:.1}", ms)
    }
}

#[async_trait]
impl CommandHandler for PingCommand {
    fn name(&self) -> &'static str {
        "ping"
    }

    async fn execute(&self, argument: Option<String>, reply: ReplyChannel) {
        let Some(host) = argument else {
            reply.text(MISSING_HOST).await;
            return;
        };

        match self.probe.probe(&host).await {
            Ok(res) => match res.latency_ms.filter(|_| res.alive) {
                Some(ms) => {
                    reply
                        .text(format!(
                            "Ping to {} successful! Latency: {} ms",
                            host,
                            format_latency(ms)
                        ))
                        .await
                }
                None => {
                    reply
                        .text(format!("Ping to {} failed. Host might be unreachable.", host))
                        .await
                }
            },
            Err(e) => {
                tracing::warn!(host = %host, "Ping probe error: {}", e);
                reply.text(PROBE_ERROR).await;
            }
        }
    }
}
