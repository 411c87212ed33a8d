//! Server dependencies (using traits for testability)
//!
//! This module provides the central dependency container used by the pairing
//! domain. The messaging backend sits behind a trait so tests can script it.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use wabridge::{BridgeClient, BridgeHandle, ConnectOptions, OutboundMessage, ProtocolVersion};

use crate::domains::pairing::{PairingProfile, ReconnectPolicy, SessionStore};
use crate::kernel::{BaseConnectionHandle, BaseMessagingClient, Connection};

// =============================================================================
// BridgeClient Adapter (implements BaseMessagingClient trait)
// =============================================================================

/// Wrapper around BridgeClient that implements BaseMessagingClient trait
pub struct BridgeAdapter(pub Arc<BridgeClient>);

impl BridgeAdapter {
    pub fn new(client: Arc<BridgeClient>) -> Self {
        Self(client)
    }
}

#[async_trait]
impl BaseMessagingClient for BridgeAdapter {
    async fn fetch_latest_version(&self) -> Result<ProtocolVersion> {
        Ok(self.0.fetch_latest_version().await?)
    }

    async fn connect(&self, options: ConnectOptions) -> Result<Connection> {
        let connection = self.0.connect(&options).await?;
        Ok(Connection {
            handle: Arc::new(connection.handle),
            events: connection.events,
        })
    }
}

#[async_trait]
impl BaseConnectionHandle for BridgeHandle {
    async fn send_message(&self, recipient: &str, message: OutboundMessage) -> Result<()> {
        Ok(BridgeHandle::send_message(self, recipient, &message).await?)
    }

    async fn request_pairing_code(&self, phone_number: &str) -> Result<String> {
        Ok(BridgeHandle::request_pairing_code(self, phone_number).await?)
    }

    async fn close(&self) {
        BridgeHandle::close(self)
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to the pairing domain
#[derive(Clone)]
pub struct ServerDeps {
    pub messaging: Arc<dyn BaseMessagingClient>,
    pub sessions: SessionStore,
    pub profile: PairingProfile,
    pub reconnect: ReconnectPolicy,
    /// Upper bound on how long a caller waits for a pairing code
    pub response_timeout: Duration,
}

impl ServerDeps {
    pub fn new(
        messaging: Arc<dyn BaseMessagingClient>,
        sessions: SessionStore,
        profile: PairingProfile,
        reconnect: ReconnectPolicy,
        response_timeout: Duration,
    ) -> Self {
        Self {
            messaging,
            sessions,
            profile,
            reconnect,
            response_timeout,
        }
    }
}
