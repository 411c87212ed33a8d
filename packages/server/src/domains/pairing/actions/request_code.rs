//! Request pairing code action

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::domains::pairing::models::{Identity, PairingCode};
use crate::domains::pairing::types::PairReply;
use crate::kernel::BaseConnectionHandle;

/// Request a pairing code for an unregistered identity and turn the outcome
/// into the caller's reply.
///
/// Waits `delay` first so the backend handshake can settle. Failures are not
/// retried here; a later connection attempt may request a fresh code.
pub async fn issue_pairing_code(
    handle: Arc<dyn BaseConnectionHandle>,
    identity: Identity,
    delay: Duration,
) -> PairReply {
    tokio::time::sleep(delay).await;

    match handle.request_pairing_code(identity.as_str()).await {
        Ok(raw) => {
            let code = PairingCode::format(&raw);
            info!(identity = %identity, code = %code, "Pairing code issued");
            PairReply::Code(code)
        }
        Err(e) => {
            error!(identity = %identity, error = %e, "Failed to get pairing code");
            PairReply::PairingFailed
        }
    }
}
