use thiserror::Error;
use tracing::{debug, error};
use wabridge::{BackendError, DisconnectReason};

/// Pairing errors, one variant per failure class of a pairing run
#[derive(Error, Debug)]
pub enum PairingError {
    #[error("Invalid phone number")]
    InvalidIdentity,

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[source] anyhow::Error),

    #[error("Connection closed ({0})")]
    TransientDisconnect(DisconnectReason),

    #[error("Session logged out")]
    PermanentLogout,

    #[error("Credential handoff failed: {0}")]
    HandoffFailure(#[source] anyhow::Error),

    #[error("Gave up after {0} reconnects")]
    ReconnectLimit(u32),
}

/// How loudly a background failure should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected noise from the backend; logged at debug level only
    Benign,
    Fatal,
}

/// Classify a raw backend failure against the known-noisy set.
pub fn classify_backend(err: &BackendError) -> Severity {
    match err {
        BackendError::Conflict
        | BackendError::NotAuthorized
        | BackendError::SocketTimeout
        | BackendError::RateOverlimit
        | BackendError::ConnectionClosed
        | BackendError::TimedOut
        | BackendError::ValueNotFound
        | BackendError::StreamErrored
        | BackendError::Status(515)
        | BackendError::Status(503) => Severity::Benign,
        BackendError::Status(_) | BackendError::Transport(_) | BackendError::Protocol(_) => {
            Severity::Fatal
        }
    }
}

/// Classify an error by the first typed cause in its chain.
///
/// Pairing errors decide for themselves; a bare backend error goes through
/// the allow-list. Anything untyped is fatal.
pub fn classify(err: &anyhow::Error) -> Severity {
    for cause in err.chain() {
        if let Some(pairing) = cause.downcast_ref::<PairingError>() {
            return match pairing {
                PairingError::TransientDisconnect(_) | PairingError::PermanentLogout => {
                    Severity::Benign
                }
                _ => Severity::Fatal,
            };
        }
        if let Some(backend) = cause.downcast_ref::<BackendError>() {
            return classify_backend(backend);
        }
    }
    Severity::Fatal
}

/// Single reporting boundary for work that runs after the HTTP response.
///
/// Never panics and never propagates: background sessions must not take the
/// process down.
pub fn report_background_error(err: &anyhow::Error) -> Severity {
    let severity = classify(err);
    match severity {
        Severity::Benign => debug!(error = %err, "Ignored backend noise"),
        Severity::Fatal => error!(error = ?err, "Background pairing task failed"),
    }
    severity
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_allow_listed_backend_errors_are_benign() {
        for err in [
            BackendError::Conflict,
            BackendError::NotAuthorized,
            BackendError::SocketTimeout,
            BackendError::RateOverlimit,
            BackendError::ConnectionClosed,
            BackendError::TimedOut,
            BackendError::ValueNotFound,
            BackendError::StreamErrored,
            BackendError::Status(515),
            BackendError::Status(503),
        ] {
            assert_eq!(classify_backend(&err), Severity::Benign, "{}", err);
        }
    }

    #[test]
    fn test_other_backend_errors_are_fatal() {
        assert_eq!(classify_backend(&BackendError::Status(500)), Severity::Fatal);
        assert_eq!(
            classify_backend(&BackendError::Transport("refused".into())),
            Severity::Fatal
        );
    }

    #[test]
    fn test_classify_walks_context_chain() {
        let err = Err::<(), _>(BackendError::RateOverlimit)
            .context("requesting pairing code")
            .unwrap_err();
        assert_eq!(classify(&err), Severity::Benign);
    }

    #[test]
    fn test_pairing_error_wins_over_its_source() {
        let handoff = PairingError::HandoffFailure(BackendError::StreamErrored.into());
        assert_eq!(classify(&handoff.into()), Severity::Fatal);

        let logout: anyhow::Error = PairingError::PermanentLogout.into();
        assert_eq!(classify(&logout), Severity::Benign);
    }

    #[test]
    fn test_untyped_errors_are_fatal() {
        let err = anyhow::anyhow!("disk full");
        assert_eq!(report_background_error(&err), Severity::Fatal);
    }
}
