use super::commands::{PairingCommand, StopReason};
use super::events::PairingEvent;

/// Lifecycle of one pairing run across all of its connection attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting { attempt: u32 },
    /// Authenticated; credential handoff is underway
    Open { attempt: u32 },
    HandedOff,
    LoggedOut,
    Exhausted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::HandedOff | SessionState::LoggedOut | SessionState::Exhausted
        )
    }
}

/// Pairing machine - converts connection events into commands
///
/// Pure: no I/O, so every transition is unit-testable. Handoff is issued at
/// most once per run no matter how many times the connection reports `open`.
#[derive(Debug)]
pub struct PairingMachine {
    state: SessionState,
    reconnects: u32,
    max_reconnects: u32,
}

impl PairingMachine {
    pub fn new(max_reconnects: u32) -> Self {
        Self {
            state: SessionState::Connecting { attempt: 0 },
            reconnects: 0,
            max_reconnects,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    pub fn decide(&mut self, event: &PairingEvent) -> Option<PairingCommand> {
        if self.state.is_terminal() {
            return None;
        }

        match (*event, self.state) {
            (PairingEvent::Connecting, _) => None,

            (PairingEvent::Opened, SessionState::Connecting { attempt }) => {
                self.state = SessionState::Open { attempt };
                Some(PairingCommand::DeliverCredentials)
            }
            // Duplicate open while a handoff is already underway
            (PairingEvent::Opened, _) => None,

            (PairingEvent::Closed(reason), _) if reason.is_logged_out() => {
                self.state = SessionState::LoggedOut;
                Some(PairingCommand::Stop(StopReason::LoggedOut))
            }
            (PairingEvent::Closed(_), SessionState::Open { .. }) => None,
            (PairingEvent::Closed(_), _) => {
                if self.reconnects >= self.max_reconnects {
                    self.state = SessionState::Exhausted;
                    return Some(PairingCommand::Stop(StopReason::ReconnectLimit));
                }
                self.reconnects += 1;
                self.state = SessionState::Connecting {
                    attempt: self.reconnects,
                };
                Some(PairingCommand::Reconnect {
                    attempt: self.reconnects,
                })
            }
        }
    }

    /// Record that the handoff finished (successfully or not); the session is gone.
    pub fn complete_handoff(&mut self) {
        self.state = SessionState::HandedOff;
    }
}
