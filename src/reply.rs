//! Reply channel: send text or media back to the originating conversation.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

/// Content of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundContent {
    Text(String),
    /// A locally stored artifact. `send_as_document` attaches the raw file
    /// instead of an inline preview.
    Media {
        path: PathBuf,
        send_as_document: bool,
    },
}

/// Write side of the transport. Implementations must tolerate concurrent
/// callers.
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send(&self, to: &str, content: OutboundContent) -> Result<()>;
}

/// An `Outbound` bound to one conversation.
#[derive(Clone)]
pub struct ReplyChannel {
    origin: String,
    outbound: Arc<dyn Outbound>,
}

impl ReplyChannel {
    pub fn new(origin: impl Into<String>, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            origin: origin.into(),
            outbound,
        }
    }

    /// Send a text reply. Transport failures are logged, not retried.
    pub async fn text(&self, text: impl Into<String>) {
        self.deliver(OutboundContent::Text(text.into())).await;
    }

    /// Send a media artifact.
    pub async fn media(&self, path: impl Into<PathBuf>, send_as_document: bool) {
        self.deliver(OutboundContent::Media {
            path: path.into(),
            send_as_document,
        })
        .await;
    }

    async fn deliver(&self, content: OutboundContent) {
        if let Err(e) = self.outbound.send(&self.origin, content).await {
            tracing::error!(origin = %self.origin, "Failed to send reply: {}", e);
        }
    }
}
