//! Event loop: feeds transport events through the session and the router.
//!
//! Events are handled one at a time, but every matched command runs on its
//! own task, so a slow download never holds up the next message.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::reply::{Outbound, ReplyChannel};
use crate::router::CommandRouter;
use crate::session::{Phase, Session};
use crate::transport::TransportEvent;

pub struct Engine {
    session: Session,
    router: CommandRouter,
    outbound: Arc<dyn Outbound>,
}

impl Engine {
    pub fn new(session: Session, router: CommandRouter, outbound: Arc<dyn Outbound>) -> Self {
        Self {
            session,
            router,
            outbound,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Handle one event. Returns the handler task when a command was
    /// dispatched.
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<JoinHandle<()>> {
        let message = match event {
            TransportEvent::Lifecycle(lifecycle) => {
                self.session.apply(&lifecycle);
                return None;
            }
            TransportEvent::Message(message) => message,
        };

        if !self.session.is_ready() {
            tracing::debug!(
                origin = %message.origin,
                phase = %self.session.phase(),
                "Dropping message received before session is ready"
            );
            return None;
        }

        let invocation = self.router.route(&message)?;
        let reply = ReplyChannel::new(invocation.origin, self.outbound.clone());
        let handler = invocation.handler;
        let argument = invocation.command.argument;

        Some(tokio::spawn(async move {
            handler.execute(argument, reply).await;
        }))
    }

    /// Run until the event stream closes or authentication fails. Handler
    /// tasks still in flight keep running. Returns the final phase.
    pub async fn run(mut self, mut events: mpsc::Receiver<TransportEvent>) -> Phase {
        tracing::info!(client = %self.session.client_identity(), "Engine started");

        while let Some(event) = events.recv().await {
            self.handle_event(event);
            if self.session.phase() == Phase::Failed {
                tracing::error!("Session failed; re-pair the device and restart");
                break;
            }
        }

        tracing::info!(phase = %self.session.phase(), "Engine stopped");
        self.session.phase()
    }
}
