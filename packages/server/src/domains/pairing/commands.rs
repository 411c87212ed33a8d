/// Pairing commands - what the orchestrator must do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingCommand {
    /// Read the credential artifact and deliver it to the identity
    DeliverCredentials,
    /// Start a new attempt against the same session
    Reconnect { attempt: u32 },
    /// Terminal: tear the session down
    Stop(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    LoggedOut,
    ReconnectLimit,
}
