//! Integration tests for the pairing flow.
//!
//! Drives `start_pairing` against a scripted messaging backend and checks
//! the caller's reply, what was sent, and what is left on disk.

mod common;

use common::TestHarness;
use pair_core::domains::pairing::{PairReply, PairingCode, PairingProfile};
use pair_core::kernel::{MockMessagingClient, ScriptedAttempt, TestDependencies};
use serde_json::json;
use test_context::test_context;
use wabridge::{BackendError, OutboundMessage};

const NUMBER: &str = "+263 775 000 000";
const IDENTITY: &str = "263775000000";

fn expected_code() -> PairReply {
    PairReply::Code(PairingCode::format("abcd1234efgh"))
}

// ============================================================================
// Request validation
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_missing_number_is_rejected(ctx: &TestHarness) {
    let (deps, mock) = ctx.deps(MockMessagingClient::new());

    let reply = pair_core::domains::pairing::start_pairing(deps.clone(), None).await;
    assert_eq!(reply, PairReply::MissingNumber);

    let reply = ctx.pair(&deps, "").await;
    assert_eq!(reply, PairReply::MissingNumber);
    assert_eq!(mock.connect_count(), 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_invalid_number_never_connects(ctx: &TestHarness) {
    let (deps, mock) = ctx.deps(MockMessagingClient::new());

    let reply = ctx.pair(&deps, "123").await;

    assert_eq!(reply, PairReply::InvalidNumber);
    assert_eq!(mock.connect_count(), 0);
    assert!(!ctx.session_exists("123"));
    assert_eq!(deps.sessions.active_sessions().await, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_stale_raw_session_is_cleared(ctx: &TestHarness) {
    let (deps, _mock) = ctx.deps(MockMessagingClient::new());
    std::fs::create_dir_all(ctx.session_dir("+263775000000")).unwrap();
    std::fs::write(ctx.session_dir("+263775000000").join("creds.json"), b"{}").unwrap();

    let reply = ctx.pair(&deps, NUMBER).await;

    assert_eq!(reply, expected_code());
    assert!(!ctx.session_exists("+263775000000"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_stale_canonical_session_is_reset_before_open(ctx: &TestHarness) {
    let (deps, mock) = ctx.deps(MockMessagingClient::new());
    std::fs::create_dir_all(ctx.session_dir(IDENTITY)).unwrap();
    std::fs::write(
        ctx.session_dir(IDENTITY).join("creds.json"),
        br#"{"registered":true,"me":"stale"}"#,
    )
    .unwrap();
    std::fs::write(ctx.session_dir(IDENTITY).join("pre-key.1.json"), b"{}").unwrap();

    let reply = ctx.pair(&deps, NUMBER).await;
    assert_eq!(reply, expected_code());

    let connects = mock.connects();
    assert_eq!(connects.len(), 1);
    assert!(!connects[0].creds.registered);
    assert!(!connects[0].creds.fields.contains_key("me"));
    assert!(connects[0].keys.is_empty());
    assert_eq!(mock.code_requests(), vec![IDENTITY.to_string()]);
}

// ============================================================================
// Pairing code
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_unregistered_session_gets_formatted_code(ctx: &TestHarness) {
    let (deps, mock) = ctx.deps(MockMessagingClient::new());

    let reply = ctx.pair(&deps, NUMBER).await;

    assert_eq!(reply, expected_code());
    assert_eq!(mock.code_requests(), vec![IDENTITY.to_string()]);

    let connects = mock.connects();
    assert_eq!(connects.len(), 1);
    assert!(!connects[0].creds.registered);
    assert!(!connects[0].mark_online_on_connect);
    assert_eq!(connects[0].browser.platform, "Mac OS");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_code_failure_reports_pairing_failed(ctx: &TestHarness) {
    let mock = MockMessagingClient::new().with_code_result(Err(BackendError::ConnectionClosed));
    let (deps, _mock) = ctx.deps(mock);

    let reply = ctx.pair(&deps, NUMBER).await;

    assert_eq!(reply, PairReply::PairingFailed);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_version_lookup_failure_is_unavailable(ctx: &TestHarness) {
    let mock = MockMessagingClient::new().with_version_error(BackendError::Status(502));
    let (deps, mock) = ctx.deps(mock);

    let reply = ctx.pair(&deps, NUMBER).await;

    assert_eq!(reply, PairReply::Unavailable);
    assert_eq!(mock.connect_count(), 0);
    assert!(ctx.wait_until(|| !ctx.session_exists(IDENTITY)).await);
}

// ============================================================================
// Credential handoff
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_open_delivers_credentials_and_destroys_session(ctx: &TestHarness) {
    let mock = MockMessagingClient::new().with_attempt(
        ScriptedAttempt::new()
            .after_code(ScriptedAttempt::creds(json!({ "creds": "x" })))
            .after_code(ScriptedAttempt::opened()),
    );
    let (deps, mock) = ctx.deps(mock);

    let reply = ctx.pair(&deps, NUMBER).await;
    assert_eq!(reply, expected_code());

    assert!(ctx.wait_until(|| !ctx.session_exists(IDENTITY)).await);

    let documents = mock.documents();
    assert_eq!(documents.len(), 1);
    let (recipient, bytes) = &documents[0];
    assert_eq!(recipient, "263775000000@s.whatsapp.net");
    let delivered: serde_json::Value = serde_json::from_slice(bytes).unwrap();
    assert_eq!(delivered["creds"], "x");

    let sent = mock.sent_messages();
    assert_eq!(sent.len(), 1 + PairingProfile::knight().notices.len());
    match &sent[0].message {
        OutboundMessage::Document {
            mimetype,
            file_name,
            ..
        } => {
            assert_eq!(mimetype, "application/json");
            assert_eq!(file_name, "creds.json");
        }
        other => panic!("expected the credential document first, got {:?}", other),
    }
    assert!(sent.iter().all(|m| m.recipient == "263775000000@s.whatsapp.net"));
    assert!(matches!(sent.last().map(|m| &m.message), Some(OutboundMessage::Text { .. })));
    assert_eq!(mock.close_count(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_plain_profile_sends_document_and_warning(ctx: &TestHarness) {
    let mock = MockMessagingClient::new().with_attempt(
        ScriptedAttempt::new()
            .after_code(ScriptedAttempt::creds(json!({ "creds": "x" })))
            .after_code(ScriptedAttempt::opened()),
    );
    let test_deps = TestDependencies::new(mock).with_profile(PairingProfile::plain());
    let (deps, mock) = ctx.deps_with(test_deps);

    ctx.pair(&deps, NUMBER).await;
    assert!(ctx.wait_until(|| !ctx.session_exists(IDENTITY)).await);

    let sent = mock.sent_messages();
    assert_eq!(sent.len(), 1 + PairingProfile::plain().notices.len());
    assert!(matches!(sent[0].message, OutboundMessage::Document { .. }));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_duplicate_open_delivers_once(ctx: &TestHarness) {
    let mock = MockMessagingClient::new().with_attempt(
        ScriptedAttempt::new()
            .after_code(ScriptedAttempt::creds(json!({ "creds": "x" })))
            .after_code(ScriptedAttempt::opened())
            .after_code(ScriptedAttempt::opened()),
    );
    let (deps, mock) = ctx.deps(mock);

    ctx.pair(&deps, NUMBER).await;
    assert!(ctx.wait_until(|| !ctx.session_exists(IDENTITY)).await);

    assert_eq!(mock.documents().len(), 1);
    assert_eq!(mock.connect_count(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_failed_handoff_still_destroys_session(ctx: &TestHarness) {
    let mock = MockMessagingClient::new()
        .with_send_error(BackendError::Transport("socket closed".to_string()))
        .with_attempt(
            ScriptedAttempt::new()
                .after_code(ScriptedAttempt::creds(json!({ "creds": "x" })))
                .after_code(ScriptedAttempt::opened()),
        );
    let (deps, mock) = ctx.deps(mock);

    let reply = ctx.pair(&deps, NUMBER).await;
    assert_eq!(reply, expected_code());

    assert!(ctx.wait_until(|| !ctx.session_exists(IDENTITY)).await);
    assert!(mock.documents().is_empty());
    assert_eq!(mock.connect_count(), 1);
}

// ============================================================================
// Reconnects
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn test_restart_reconnects_with_persisted_credentials(ctx: &TestHarness) {
    let mock = MockMessagingClient::new()
        .with_attempt(
            ScriptedAttempt::new()
                .after_code(ScriptedAttempt::creds(json!({ "registered": true, "me": "x" })))
                .after_code(ScriptedAttempt::closed(515)),
        )
        .with_attempt(ScriptedAttempt::new().on_connect(ScriptedAttempt::opened()));
    let (deps, mock) = ctx.deps(mock);

    let reply = ctx.pair(&deps, NUMBER).await;
    assert_eq!(reply, expected_code());

    assert!(ctx.wait_until(|| mock.documents().len() == 1).await);
    assert!(ctx.wait_until(|| !ctx.session_exists(IDENTITY)).await);

    let connects = mock.connects();
    assert_eq!(connects.len(), 2);
    assert!(connects[1].creds.registered);
    assert_eq!(connects[1].creds.fields["me"], "x");
    // Registered sessions never ask for a second code
    assert_eq!(mock.code_requests().len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_logout_stops_and_destroys_session(ctx: &TestHarness) {
    let mock = MockMessagingClient::new().with_attempt(
        ScriptedAttempt::new()
            .after_code(ScriptedAttempt::creds(json!({ "creds": "x" })))
            .after_code(ScriptedAttempt::closed(401)),
    );
    let (deps, mock) = ctx.deps(mock);

    let reply = ctx.pair(&deps, NUMBER).await;
    assert_eq!(reply, expected_code());

    assert!(ctx.wait_until(|| !ctx.session_exists(IDENTITY)).await);
    assert_eq!(mock.connect_count(), 1);
    assert!(mock.documents().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn test_reconnects_stop_at_limit(ctx: &TestHarness) {
    let mock = MockMessagingClient::new()
        .with_attempt(ScriptedAttempt::new().after_code(ScriptedAttempt::closed(428)))
        .with_attempt(ScriptedAttempt::new().on_connect(ScriptedAttempt::closed(428)))
        .with_attempt(ScriptedAttempt::new().on_connect(ScriptedAttempt::closed(408)))
        .with_attempt(ScriptedAttempt::new().on_connect(ScriptedAttempt::closed(503)));
    let test_deps = TestDependencies::new(mock).with_max_reconnects(3);
    let (deps, mock) = ctx.deps_with(test_deps);

    let reply = ctx.pair(&deps, NUMBER).await;
    assert_eq!(reply, expected_code());

    assert!(ctx.wait_until(|| !ctx.session_exists(IDENTITY)).await);
    assert_eq!(mock.connect_count(), 4);
    assert!(mock.documents().is_empty());
}
