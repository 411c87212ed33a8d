//! Pairing orchestrator
//!
//! One `PairingRun` per accepted request. The run owns the session lease and
//! the response slot, drives connection attempts through the `PairingMachine`,
//! and outlives the HTTP request: the caller gets its reply as soon as a
//! pairing code exists, while handoff and reconnects continue in the
//! background.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use wabridge::{BridgeEvent, ConnectOptions, ConnectionState, DisconnectReason};

use super::actions::{deliver_credentials, issue_pairing_code};
use super::commands::{PairingCommand, StopReason};
use super::errors::{report_background_error, PairingError};
use super::events::PairingEvent;
use super::machines::PairingMachine;
use super::models::{Identity, SessionHandle, SessionKey, SessionLease};
use super::responder::ResponseSlot;
use super::types::PairReply;
use crate::kernel::{Connection, ServerDeps};

/// Handle one pairing request end to end and return the caller's reply.
///
/// Validation failures answer immediately without touching the canonical
/// session. Otherwise a background run is spawned and this waits (bounded by
/// `response_timeout`) for the run's single reply.
pub async fn start_pairing(deps: Arc<ServerDeps>, raw_number: Option<String>) -> PairReply {
    let Some(raw) = raw_number.filter(|n| !n.is_empty()) else {
        return PairReply::MissingNumber;
    };

    // Stale directory from an earlier crashed run under the literal key
    deps.sessions.reset(&SessionKey::from_raw(&raw)).await;

    let identity = match Identity::parse(&raw) {
        Ok(identity) => identity,
        Err(e) => {
            info!(number = %raw, error = %e, "Rejected pairing request");
            return PairReply::InvalidNumber;
        }
    };
    info!(identity = %identity, "Clean number");

    let (slot, reply) = ResponseSlot::channel();
    let run = PairingRun::new(deps.clone(), identity);
    let span = info_span!("pairing_run", run_id = %Uuid::new_v4(), identity = %run.identity);
    tokio::spawn(
        async move {
            if let Err(e) = run.execute(slot).await {
                report_background_error(&e);
            }
        }
        .instrument(span),
    );

    match tokio::time::timeout(deps.response_timeout, reply).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(_)) => {
            warn!("Pairing run ended without a reply");
            PairReply::Unavailable
        }
        Err(_) => {
            warn!(timeout = ?deps.response_timeout, "Timed out waiting for pairing code");
            PairReply::Unavailable
        }
    }
}

enum AttemptOutcome {
    Reconnect { attempt: u32 },
    Finished,
}

/// One orchestration run for one identity
pub struct PairingRun {
    deps: Arc<ServerDeps>,
    identity: Identity,
}

impl PairingRun {
    pub fn new(deps: Arc<ServerDeps>, identity: Identity) -> Self {
        Self { deps, identity }
    }

    /// Run to completion. The session directory is gone when this returns,
    /// on every path.
    pub async fn execute(self, mut slot: ResponseSlot) -> Result<()> {
        let key = SessionKey::for_identity(&self.identity);
        self.deps.sessions.reset(&key).await;
        let lease = SessionLease::new(self.deps.sessions.clone(), key.clone());

        let outcome = match self.deps.sessions.open(&key).await {
            Ok(mut session) => self.drive(&mut session, &mut slot).await,
            Err(e) => Err(PairingError::BackendUnavailable(e).into()),
        };

        if outcome.is_err() {
            slot.send(PairReply::Unavailable);
        }
        lease.release().await;
        outcome
    }

    async fn drive(&self, session: &mut SessionHandle, slot: &mut ResponseSlot) -> Result<()> {
        let mut machine = PairingMachine::new(self.deps.reconnect.max_reconnects);

        loop {
            let connection = self
                .connect(session)
                .await
                .map_err(PairingError::BackendUnavailable)?;

            match self.run_attempt(connection, session, &mut machine, slot).await? {
                AttemptOutcome::Finished => return Ok(()),
                AttemptOutcome::Reconnect { attempt } => {
                    let delay = self.deps.reconnect.delay_before(attempt);
                    info!(attempt, delay = ?delay, "Restarting connection");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn connect(&self, session: &SessionHandle) -> Result<Connection> {
        let version = self
            .deps
            .messaging
            .fetch_latest_version()
            .await
            .context("fetching protocol version")?;
        let keys = session.load_keys().await?;
        debug!(%version, keys = keys.len(), registered = session.is_registered(), "Connecting");

        let options = ConnectOptions {
            version,
            browser: self.deps.profile.browser.clone(),
            mark_online_on_connect: false,
            creds: session.credentials().clone(),
            keys,
        };
        self.deps
            .messaging
            .connect(options)
            .await
            .context("opening connection")
    }

    async fn run_attempt(
        &self,
        connection: Connection,
        session: &mut SessionHandle,
        machine: &mut PairingMachine,
        slot: &mut ResponseSlot,
    ) -> Result<AttemptOutcome> {
        let Connection { handle, mut events } = connection;

        let code_request = issue_pairing_code(
            handle.clone(),
            self.identity.clone(),
            self.deps.profile.pairing_code_delay,
        );
        tokio::pin!(code_request);
        let mut code_pending = !session.is_registered();

        loop {
            let event = tokio::select! {
                reply = &mut code_request, if code_pending => {
                    code_pending = false;
                    slot.send(reply);
                    continue;
                }
                event = events.recv() => event,
            };

            // A stream that ends without a close frame is a lost connection.
            let event = event.unwrap_or(BridgeEvent::ConnectionUpdate {
                state: ConnectionState::Close,
                reason: Some(DisconnectReason::CONNECTION_LOST),
            });

            let (state, reason) = match event {
                BridgeEvent::CredsUpdate(creds) => {
                    session.persist_creds(creds).await?;
                    continue;
                }
                BridgeEvent::KeysUpdate(updates) => {
                    session.persist_keys(&updates).await?;
                    continue;
                }
                BridgeEvent::ConnectionUpdate { state, reason } => (state, reason),
            };

            let Some(command) = machine.decide(&PairingEvent::from_update(state, reason)) else {
                if machine.state().is_terminal() {
                    handle.close().await;
                    return Ok(AttemptOutcome::Finished);
                }
                continue;
            };

            match command {
                PairingCommand::DeliverCredentials => {
                    info!("Connected");
                    let result = deliver_credentials(
                        handle.as_ref(),
                        session,
                        &self.deps.sessions,
                        &self.identity,
                        &self.deps.profile,
                    )
                    .await;
                    machine.complete_handoff();
                    handle.close().await;
                    return result.map(|()| AttemptOutcome::Finished).map_err(Into::into);
                }
                PairingCommand::Reconnect { attempt } => {
                    report_background_error(
                        &PairingError::TransientDisconnect(
                            reason.unwrap_or(DisconnectReason::CONNECTION_CLOSED),
                        )
                        .into(),
                    );
                    handle.close().await;
                    return Ok(AttemptOutcome::Reconnect { attempt });
                }
                PairingCommand::Stop(StopReason::LoggedOut) => {
                    warn!("Session logged out");
                    handle.close().await;
                    return Err(PairingError::PermanentLogout.into());
                }
                PairingCommand::Stop(StopReason::ReconnectLimit) => {
                    handle.close().await;
                    return Err(PairingError::ReconnectLimit(machine.reconnects()).into());
                }
            }
        }
    }
}
