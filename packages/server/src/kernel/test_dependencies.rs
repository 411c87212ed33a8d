// TestDependencies - mock implementations for testing
//
// Provides a scripted messaging backend that can be injected into ServerDeps
// for tests. Each `connect` consumes one ScriptedAttempt.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use wabridge::{
    BackendError, BridgeEvent, ConnectOptions, ConnectionState, Credentials, DisconnectReason,
    OutboundMessage, ProtocolVersion,
};

use super::{BaseConnectionHandle, BaseMessagingClient, Connection, ServerDeps};
use crate::domains::pairing::{PairingProfile, ReconnectPolicy, SessionStore};

const DEFAULT_CODE: &str = "abcd1234efgh";

// =============================================================================
// Scripted connection attempts
// =============================================================================

/// Events one connection attempt will emit.
///
/// `on_connect` events are queued as soon as the attempt opens;
/// `after_code` events are queued when a pairing code is requested on it.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAttempt {
    pub on_connect: Vec<BridgeEvent>,
    pub after_code: Vec<BridgeEvent>,
}

impl ScriptedAttempt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connect(mut self, event: BridgeEvent) -> Self {
        self.on_connect.push(event);
        self
    }

    pub fn after_code(mut self, event: BridgeEvent) -> Self {
        self.after_code.push(event);
        self
    }

    pub fn opened() -> BridgeEvent {
        BridgeEvent::ConnectionUpdate {
            state: ConnectionState::Open,
            reason: None,
        }
    }

    pub fn closed(status: u16) -> BridgeEvent {
        BridgeEvent::ConnectionUpdate {
            state: ConnectionState::Close,
            reason: Some(DisconnectReason(status)),
        }
    }

    pub fn creds(value: serde_json::Value) -> BridgeEvent {
        let creds: Credentials = serde_json::from_value(value).unwrap_or_default();
        BridgeEvent::CredsUpdate(creds)
    }
}

/// A message captured by the mock
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient: String,
    pub message: OutboundMessage,
}

#[derive(Default)]
struct Recorder {
    connects: Mutex<Vec<ConnectOptions>>,
    sent: Mutex<Vec<SentMessage>>,
    code_requests: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

// =============================================================================
// Mock Messaging Client
// =============================================================================

pub struct MockMessagingClient {
    attempts: Mutex<VecDeque<ScriptedAttempt>>,
    code_results: Arc<Mutex<VecDeque<Result<String, BackendError>>>>,
    version_error: Option<BackendError>,
    send_error: Option<BackendError>,
    recorder: Arc<Recorder>,
}

impl MockMessagingClient {
    pub fn new() -> Self {
        Self {
            attempts: Mutex::new(VecDeque::new()),
            code_results: Arc::new(Mutex::new(VecDeque::new())),
            version_error: None,
            send_error: None,
            recorder: Arc::new(Recorder::default()),
        }
    }

    /// Queue the next connection attempt's script
    pub fn with_attempt(self, attempt: ScriptedAttempt) -> Self {
        lock(&self.attempts).push_back(attempt);
        self
    }

    /// Queue a pairing-code result (default: `abcd1234efgh`)
    pub fn with_code_result(self, result: Result<String, BackendError>) -> Self {
        lock(&self.code_results).push_back(result);
        self
    }

    pub fn with_version_error(mut self, error: BackendError) -> Self {
        self.version_error = Some(error);
        self
    }

    /// Make every `send_message` fail
    pub fn with_send_error(mut self, error: BackendError) -> Self {
        self.send_error = Some(error);
        self
    }

    /// Options of every connection attempt, in order
    pub fn connects(&self) -> Vec<ConnectOptions> {
        lock(&self.recorder.connects).clone()
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.recorder.connects).len()
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        lock(&self.recorder.sent).clone()
    }

    /// Document payloads delivered, as (recipient, bytes)
    pub fn documents(&self) -> Vec<(String, Vec<u8>)> {
        self.sent_messages()
            .into_iter()
            .filter_map(|sent| match sent.message {
                OutboundMessage::Document { data, .. } => Some((sent.recipient, data)),
                _ => None,
            })
            .collect()
    }

    pub fn code_requests(&self) -> Vec<String> {
        lock(&self.recorder.code_requests).clone()
    }

    pub fn close_count(&self) -> usize {
        self.recorder.closes.load(Ordering::SeqCst)
    }
}

impl Default for MockMessagingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseMessagingClient for MockMessagingClient {
    async fn fetch_latest_version(&self) -> Result<ProtocolVersion> {
        match &self.version_error {
            Some(error) => Err(error.clone().into()),
            None => Ok(ProtocolVersion([2, 3000, 1])),
        }
    }

    async fn connect(&self, options: ConnectOptions) -> Result<Connection> {
        lock(&self.recorder.connects).push(options);

        let attempt = lock(&self.attempts).pop_front().unwrap_or_default();
        let (tx, rx) = mpsc::unbounded_channel();
        for event in attempt.on_connect {
            let _ = tx.send(event);
        }

        let handle = MockConnectionHandle {
            events: Mutex::new(Some(tx)),
            after_code: Mutex::new(attempt.after_code),
            code_results: self.code_results.clone(),
            send_error: self.send_error.clone(),
            recorder: self.recorder.clone(),
        };

        Ok(Connection {
            handle: Arc::new(handle),
            events: rx,
        })
    }
}

// =============================================================================
// Mock Connection Handle
// =============================================================================

struct MockConnectionHandle {
    /// Held until `close` so the attempt stays open after its script runs out
    events: Mutex<Option<mpsc::UnboundedSender<BridgeEvent>>>,
    after_code: Mutex<Vec<BridgeEvent>>,
    code_results: Arc<Mutex<VecDeque<Result<String, BackendError>>>>,
    send_error: Option<BackendError>,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl BaseConnectionHandle for MockConnectionHandle {
    async fn send_message(&self, recipient: &str, message: OutboundMessage) -> Result<()> {
        if let Some(error) = &self.send_error {
            return Err(error.clone().into());
        }
        lock(&self.recorder.sent).push(SentMessage {
            recipient: recipient.to_string(),
            message,
        });
        Ok(())
    }

    async fn request_pairing_code(&self, phone_number: &str) -> Result<String> {
        lock(&self.recorder.code_requests).push(phone_number.to_string());

        let result = lock(&self.code_results)
            .pop_front()
            .unwrap_or_else(|| Ok(DEFAULT_CODE.to_string()));

        let follow_up: Vec<BridgeEvent> = lock(&self.after_code).drain(..).collect();
        if let Some(tx) = lock(&self.events).as_ref() {
            for event in follow_up {
                let _ = tx.send(event);
            }
        }

        Ok(result?)
    }

    async fn close(&self) {
        if lock(&self.events).take().is_some() {
            self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Builds ServerDeps around a mock backend with test-friendly timings
pub struct TestDependencies {
    pub messaging: Arc<MockMessagingClient>,
    pub profile: PairingProfile,
    pub reconnect: ReconnectPolicy,
    pub response_timeout: Duration,
}

impl TestDependencies {
    pub fn new(messaging: MockMessagingClient) -> Self {
        Self {
            messaging: Arc::new(messaging),
            profile: PairingProfile::knight().with_delays(Duration::ZERO, Duration::from_millis(10)),
            reconnect: ReconnectPolicy {
                max_reconnects: 3,
                backoff_base: Duration::ZERO,
            },
            response_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_max_reconnects(mut self, max_reconnects: u32) -> Self {
        self.reconnect.max_reconnects = max_reconnects;
        self
    }

    pub fn with_profile(mut self, profile: PairingProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn into_server_deps(self, session_root: impl Into<PathBuf>) -> ServerDeps {
        ServerDeps::new(
            self.messaging,
            SessionStore::new(session_root),
            self.profile,
            self.reconnect,
            self.response_timeout,
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
