//! HTTP client for a local WhatsApp bridge sidecar.
//!
//! The sidecar wraps a WhatsApp Web client and owns pairing, encryption and
//! credential storage. wabot talks to it over HTTP:
//!
//! - `POST /connect`      start or resume the session for a client id
//! - `GET  /events/poll`  long-poll for a JSON array of events
//! - `POST /send`         send a text message
//! - `POST /send-media`   send a local file

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

use super::TransportEvent;
use crate::error::{Error, Result};
use crate::reply::{Outbound, OutboundContent};
use crate::session::LifecycleEvent;

/// HTTP connect timeout.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Request timeout for send/connect calls. Media uploads can be slow.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Long-poll timeout; the bridge answers with an empty array before this.
const POLL_TIMEOUT_SECS: u64 = 60;

const INITIAL_BACKOFF_MS: u64 = 1_000;
const MAX_BACKOFF_MS: u64 = 30_000;

/// Event as serialized by the bridge.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    Qr { code: String },
    Authenticated,
    Ready,
    AuthFailure {
        #[serde(default)]
        reason: Option<String>,
    },
    Message { from: String, body: String },
}

impl From<BridgeEvent> for TransportEvent {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::Qr { code } => LifecycleEvent::Qr { code }.into(),
            BridgeEvent::Authenticated => LifecycleEvent::Authenticated.into(),
            BridgeEvent::Ready => LifecycleEvent::Ready.into(),
            BridgeEvent::AuthFailure { reason } => LifecycleEvent::AuthFailure { reason }.into(),
            BridgeEvent::Message { from, body } => TransportEvent::message(from, body),
        }
    }
}

/// Client for the bridge HTTP API.
#[derive(Clone)]
pub struct BridgeClient {
    client: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the bridge to start (or resume) the session stored under
    /// `client_id`. Lifecycle events follow on the event stream.
    pub async fn connect(&self, client_id: &str) -> Result<()> {
        let url = format!("{}/connect", self.base_url);
        let body = serde_json::json!({ "client_id": client_id });
        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "connect failed ({}): {}",
                status, text
            )));
        }
        tracing::info!(client_id, url = %self.base_url, "Connected to WhatsApp bridge");
        Ok(())
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        let url = format!("{}/send", self.base_url);
        let body = serde_json::json!({ "to": to, "text": text });
        self.post(&url, &body).await?;
        tracing::debug!(to, "Message sent via bridge");
        Ok(())
    }

    async fn send_media(&self, to: &str, path: &Path, send_as_document: bool) -> Result<()> {
        let url = format!("{}/send-media", self.base_url);
        let body = serde_json::json!({
            "to": to,
            "path": path.display().to_string(),
            "send_as_document": send_as_document,
        });
        self.post(&url, &body).await?;
        tracing::debug!(to, path = %path.display(), "Media sent via bridge");
        Ok(())
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<()> {
        let resp = self.client.post(url).json(body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("{} returned {}: {}", url, status, text)));
        }
        Ok(())
    }

    /// Spawn the long-poll listener. It forwards events to `event_tx` and
    /// reconnects with exponential backoff until the receiver is dropped.
    pub fn spawn_event_listener(
        &self,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let poll_url = format!("{}/events/poll", self.base_url);
        tokio::spawn(async move {
            let mut backoff_ms = INITIAL_BACKOFF_MS;
            loop {
                tracing::info!(url = %poll_url, "Connecting to bridge event stream");
                match poll_events(&poll_url, &event_tx).await {
                    Ok(()) => {
                        tracing::info!("Bridge event stream closed");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, backoff_ms, "Bridge event stream error, reconnecting");
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
                    }
                }
            }
        })
    }
}

/// Poll until the receiver goes away (`Ok`) or a network error occurs
/// (`Err`, so the caller can back off).
async fn poll_events(poll_url: &str, event_tx: &mpsc::Sender<TransportEvent>) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(POLL_TIMEOUT_SECS))
        .build()?;

    loop {
        match client.get(poll_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let batch: Vec<serde_json::Value> = match resp.json().await {
                    Ok(batch) => batch,
                    Err(e) => {
                        tracing::warn!(error = %e, "Discarding malformed bridge poll response");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };
                for event in decode_batch(batch) {
                    tracing::debug!(?event, "Received bridge event");
                    if event_tx.send(event.into()).await.is_err() {
                        return Ok(());
                    }
                }
            }
            Ok(resp) => {
                tracing::debug!(status = %resp.status(), "Event poll returned non-200");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            // Long-poll expiry is normal.
            Err(e) if e.is_timeout() => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Decode each element of a poll batch on its own. Event types wabot does
/// not know (`change_state`, `loading_screen`, ...) are skipped.
fn decode_batch(batch: Vec<serde_json::Value>) -> Vec<BridgeEvent> {
    batch
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<BridgeEvent>(value) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unrecognized bridge event");
                None
            }
        })
        .collect()
}

#[async_trait]
impl Outbound for BridgeClient {
    async fn send(&self, to: &str, content: OutboundContent) -> Result<()> {
        match content {
            OutboundContent::Text(text) => self.send_text(to, &text).await,
            OutboundContent::Media {
                path,
                send_as_document,
            } => self.send_media(to, &path, send_as_document).await,
        }
    }
}
