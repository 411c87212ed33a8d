// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// The pairing domain drives these; production wires them to the gateway
// client, tests wire them to scripted mocks.
//
// Naming convention: Base* for trait names (e.g., BaseMessagingClient)

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use wabridge::{BridgeEvent, ConnectOptions, OutboundMessage, ProtocolVersion};

// =============================================================================
// Messaging Client Trait (Infrastructure - backend connections)
// =============================================================================

#[async_trait]
pub trait BaseMessagingClient: Send + Sync {
    /// Latest protocol version, queried once per connection attempt
    async fn fetch_latest_version(&self) -> Result<ProtocolVersion>;

    /// Open one connection attempt with the given session material
    async fn connect(&self, options: ConnectOptions) -> Result<Connection>;
}

// =============================================================================
// Connection Handle Trait (Infrastructure - requests on a live connection)
// =============================================================================

#[async_trait]
pub trait BaseConnectionHandle: Send + Sync {
    /// Deliver a document, image or text payload to an address
    async fn send_message(&self, recipient: &str, message: OutboundMessage) -> Result<()>;

    /// Request a pairing code; only valid while the session is unregistered
    async fn request_pairing_code(&self, phone_number: &str) -> Result<String>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}

/// One live connection attempt: request handle plus ordered event stream
pub struct Connection {
    pub handle: Arc<dyn BaseConnectionHandle>,
    pub events: mpsc::UnboundedReceiver<BridgeEvent>,
}
