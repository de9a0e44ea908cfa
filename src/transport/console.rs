//! Console transport: stdin lines in, stdout replies out.
//!
//! Useful for trying commands without a paired phone. The session is ready
//! immediately and every line is a message from [`CONSOLE_ORIGIN`].

use async_trait::async_trait;
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use super::TransportEvent;
use crate::error::Result;
use crate::reply::{Outbound, OutboundContent};
use crate::session::LifecycleEvent;

pub const CONSOLE_ORIGIN: &str = "console";

/// Feed lines from `reader` into `event_tx`, preceded by the lifecycle events
/// of an already-paired session. Blank lines are skipped.
pub fn spawn_reader<R>(reader: R, event_tx: mpsc::Sender<TransportEvent>) -> tokio::task::JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        for event in [LifecycleEvent::Authenticated, LifecycleEvent::Ready] {
            if event_tx.send(event.into()).await.is_err() {
                return;
            }
        }

        let mut lines = LinesStream::new(tokio::io::AsyncBufReadExt::lines(reader));
        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Failed to read console input: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            if event_tx
                .send(TransportEvent::message(CONSOLE_ORIGIN, line))
                .await
                .is_err()
            {
                break;
            }
        }
        tracing::debug!("Console input closed");
    })
}

/// Prints replies to stdout.
pub struct ConsoleOutbound;

#[async_trait]
impl Outbound for ConsoleOutbound {
    async fn send(&self, to: &str, content: OutboundContent) -> Result<()> {
        match content {
            OutboundContent::Text(text) => println!("[{}] {}", to, text),
            OutboundContent::Media {
                path,
                send_as_document,
            } => {
                let mode = if send_as_document { "document" } else { "media" };
                println!("[{}] <{}: {}>", to, mode, path.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reader_emits_ready_then_messages() {
        let input: &[u8] = b".alive\n\n.ping localhost\n";
        let (tx, mut rx) = mpsc::channel(16);
        spawn_reader(tokio::io::BufReader::new(input), tx)
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(
            events,
            vec![
                LifecycleEvent::Authenticated.into(),
                LifecycleEvent::Ready.into(),
                TransportEvent::message(CONSOLE_ORIGIN, ".alive"),
                TransportEvent::message(CONSOLE_ORIGIN, ".ping localhost"),
            ]
        );
    }
}
