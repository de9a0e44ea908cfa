//! Messaging transports.
//!
//! A transport turns the network into a stream of [`TransportEvent`]s and
//! provides the [`Outbound`](crate::reply::Outbound) sink replies are written
//! to. Pairing, encryption and credential storage live behind it.

pub mod bridge;
pub mod console;

use crate::session::LifecycleEvent;

/// One inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Conversation identifier replies are addressed to.
    pub origin: String,
    pub body: String,
}

/// Everything a transport can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Lifecycle(LifecycleEvent),
    Message(InboundMessage),
}

impl TransportEvent {
    pub fn message(origin: impl Into<String>, body: impl Into<String>) -> Self {
        TransportEvent::Message(InboundMessage {
            origin: origin.into(),
            body: body.into(),
        })
    }
}

impl From<LifecycleEvent> for TransportEvent {
    fn from(event: LifecycleEvent) -> Self {
        TransportEvent::Lifecycle(event)
    }
}
