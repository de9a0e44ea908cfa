//! Session lifecycle state machine.
//!
//! The transport drives the session through pairing and authentication. Only a
//! `Ready` session may dispatch commands; `Failed` needs an operator to pair
//! again and is never retried automatically.

use chrono::{DateTime, Utc};
use std::fmt;

/// Connection/authentication phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unauthenticated,
    AwaitingScan,
    Authenticated,
    Ready,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Ready | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Unauthenticated => "unauthenticated",
            Phase::AwaitingScan => "awaiting_scan",
            Phase::Authenticated => "authenticated",
            Phase::Ready => "ready",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Lifecycle events emitted by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Qr { code: String },
    Authenticated,
    Ready,
    AuthFailure { reason: Option<String> },
}

/// Outcome of applying a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed { from: Phase, to: Phase },
    Ignored { phase: Phase },
}

/// One authenticated connection, identified by the client identity under
/// which the transport persists credentials.
#[derive(Debug, Clone)]
pub struct Session {
    client_identity: String,
    phase: Phase,
    changed_at: DateTime<Utc>,
}

impl Session {
    pub fn new(client_identity: impl Into<String>) -> Self {
        Self {
            client_identity: client_identity.into(),
            phase: Phase::Unauthenticated,
            changed_at: Utc::now(),
        }
    }

    pub fn client_identity(&self) -> &str {
        &self.client_identity
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// How long the session has been in its current phase.
    pub fn time_in_phase(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.changed_at)
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Apply a lifecycle event. Terminal phases absorb everything.
    pub fn apply(&mut self, event: &LifecycleEvent) -> Transition {
        let from = self.phase;
        if from.is_terminal() {
            tracing::warn!(
                client = %self.client_identity,
                phase = %from,
                in_phase_secs = self.time_in_phase().num_seconds(),
                ?event,
                "Ignoring lifecycle event in terminal phase"
            );
            return Transition::Ignored { phase: from };
        }

        let to = match event {
            LifecycleEvent::Qr { code } => {
                println!("No active session found. Scan the QR code to log in.");
                println!("{}", code);
                Phase::AwaitingScan
            }
            LifecycleEvent::Authenticated => {
                tracing::info!("Session authenticated!");
                Phase::Authenticated
            }
            LifecycleEvent::Ready => {
                tracing::info!("WhatsApp bot is ready and connected!");
                Phase::Ready
            }
            LifecycleEvent::AuthFailure { reason } => {
                tracing::error!(
                    reason = reason.as_deref().unwrap_or("unknown"),
                    "Authentication failed. Please scan the QR code again."
                );
                Phase::Failed
            }
        };

        let spent = self.time_in_phase();
        self.phase = to;
        self.changed_at = Utc::now();
        tracing::debug!(
            client = %self.client_identity,
            %from,
            %to,
            spent_ms = spent.num_milliseconds(),
            "Session phase changed"
        );
        Transition::Changed { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qr() -> LifecycleEvent {
        LifecycleEvent::Qr {
            code: "2@abc".to_string(),
        }
    }

    #[test]
    fn test_pairing_flow() {
        let mut session = Session::new("whatsapp-bot");
        assert_eq!(session.phase(), Phase::Unauthenticated);
        assert!(!session.is_ready());

        session.apply(&qr());
        assert_eq!(session.phase(), Phase::AwaitingScan);

        session.apply(&LifecycleEvent::Authenticated);
        assert_eq!(session.phase(), Phase::Authenticated);

        let t = session.apply(&LifecycleEvent::Ready);
        assert_eq!(
            t,
            Transition::Changed {
                from: Phase::Authenticated,
                to: Phase::Ready
            }
        );
        assert!(session.is_ready());
    }

    #[test]
    fn test_phase_clock_resets_on_change() {
        let mut session = Session::new("whatsapp-bot");
        session.changed_at = Utc::now() - chrono::Duration::seconds(30);
        assert!(session.time_in_phase().num_seconds() >= 30);

        session.apply(&LifecycleEvent::Authenticated);
        assert!(session.time_in_phase().num_seconds() < 30);

        session.changed_at = Utc::now() - chrono::Duration::seconds(30);
        session.apply(&LifecycleEvent::AuthFailure { reason: None });
        session.apply(&LifecycleEvent::Ready);
        assert_eq!(session.phase(), Phase::Failed);
        assert!(session.time_in_phase().num_seconds() < 30);
    }

    #[test]
    fn test_restored_session_skips_qr() {
        let mut session = Session::new("whatsapp-bot");
        session.apply(&LifecycleEvent::Authenticated);
        session.apply(&LifecycleEvent::Ready);
        assert!(session.is_ready());
    }

    #[test]
    fn test_auth_failure_from_any_non_terminal_phase() {
        for prelude in [vec![], vec![qr()], vec![qr(), LifecycleEvent::Authenticated]] {
            let mut session = Session::new("whatsapp-bot");
            for event in &prelude {
                session.apply(event);
            }
            session.apply(&LifecycleEvent::AuthFailure { reason: None });
            assert_eq!(session.phase(), Phase::Failed);
        }
    }

    #[test]
    fn test_failed_is_sticky() {
        let mut session = Session::new("whatsapp-bot");
        session.apply(&LifecycleEvent::AuthFailure {
            reason: Some("bad creds".to_string()),
        });

        for event in [qr(), LifecycleEvent::Authenticated, LifecycleEvent::Ready] {
            let t = session.apply(&event);
            assert_eq!(t, Transition::Ignored { phase: Phase::Failed });
        }
        assert!(!session.is_ready());
    }

    #[test]
    fn test_ready_ignores_late_auth_failure() {
        let mut session = Session::new("whatsapp-bot");
        session.apply(&LifecycleEvent::Ready);
        session.apply(&LifecycleEvent::AuthFailure { reason: None });
        assert!(session.is_ready());
    }
}
