use wabridge::{ConnectionState, DisconnectReason};

/// Connection facts observed during one attempt, in backend order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingEvent {
    Connecting,
    Opened,
    Closed(DisconnectReason),
}

impl PairingEvent {
    /// Build from a raw `connection.update`. A close without a status code is
    /// treated as a plain connection close.
    pub fn from_update(state: ConnectionState, reason: Option<DisconnectReason>) -> Self {
        match state {
            ConnectionState::Connecting => PairingEvent::Connecting,
            ConnectionState::Open => PairingEvent::Opened,
            ConnectionState::Close => {
                PairingEvent::Closed(reason.unwrap_or(DisconnectReason::CONNECTION_CLOSED))
            }
        }
    }
}
