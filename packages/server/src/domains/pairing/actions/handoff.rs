//! Credential handoff action

use anyhow::Context;
use tracing::{error, info};

use crate::domains::pairing::errors::PairingError;
use crate::domains::pairing::models::{Identity, SessionHandle, SessionStore};
use crate::domains::pairing::types::PairingProfile;
use crate::kernel::BaseConnectionHandle;
use wabridge::OutboundMessage;

/// Deliver the session credential to the identity's own address, then
/// destroy the session.
///
/// The session is destroyed whether or not delivery succeeded. The flush
/// delay only applies after a successful delivery.
pub async fn deliver_credentials(
    handle: &dyn BaseConnectionHandle,
    session: &SessionHandle,
    store: &SessionStore,
    identity: &Identity,
    profile: &PairingProfile,
) -> Result<(), PairingError> {
    let result = send_credentials(handle, session, identity, profile).await;

    match &result {
        Ok(()) => tokio::time::sleep(profile.handoff_flush_delay).await,
        Err(e) => error!(identity = %identity, error = %e, "Failed to send session"),
    }

    store.reset(session.key()).await;
    info!(identity = %identity, "Session cleaned");

    result
}

async fn send_credentials(
    handle: &dyn BaseConnectionHandle,
    session: &SessionHandle,
    identity: &Identity,
    profile: &PairingProfile,
) -> Result<(), PairingError> {
    let artifact = session
        .read_artifact()
        .await
        .map_err(PairingError::HandoffFailure)?;
    let recipient = identity.address();

    handle
        .send_message(
            &recipient,
            OutboundMessage::Document {
                data: artifact,
                mimetype: profile.document_mimetype.clone(),
                file_name: profile.document_file_name.clone(),
            },
        )
        .await
        .context("sending credential document")
        .map_err(PairingError::HandoffFailure)?;
    info!(identity = %identity, "Session file sent");

    for notice in &profile.notices {
        handle
            .send_message(&recipient, notice.to_message())
            .await
            .context("sending notice")
            .map_err(PairingError::HandoffFailure)?;
    }
    info!(identity = %identity, notices = profile.notices.len(), "Notices sent");

    Ok(())
}
