// Client for a messaging-protocol gateway.
//
// The gateway owns the wire protocol (framing, encryption, multi-device sync).
// We talk to it over a WebSocket with JSON frames: one `hello` per connection,
// then correlated request/result pairs plus unsolicited event frames.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

pub mod models;

pub use crate::models::{
    BackendError, BridgeEvent, BrowserDescriptor, ConnectOptions, ConnectionState, Credentials,
    DisconnectReason, KeyUpdate, OutboundMessage, ProtocolVersion,
};
use crate::models::{InboundFrame, OutboundFrame, VersionDocument};

pub const DEFAULT_VERSION_URL: &str =
    "https://raw.githubusercontent.com/WhiskeySockets/Baileys/master/src/Defaults/baileys-version.json";

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub gateway_url: String,
    pub version_url: String,
    pub request_timeout: Duration,
}

impl BridgeOptions {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            version_url: DEFAULT_VERSION_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeClient {
    options: BridgeOptions,
    http: Client,
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, BackendError>>>>>;

enum WriterCommand {
    Frame(String),
    Close,
}

/// A live connection: a cloneable handle for requests plus the event stream.
///
/// The stream is unbounded so the reader task never waits on a slow consumer;
/// `result` frames for in-flight requests are routed even while nobody reads
/// events.
pub struct BridgeConnection {
    pub handle: BridgeHandle,
    pub events: mpsc::UnboundedReceiver<BridgeEvent>,
}

#[derive(Clone)]
pub struct BridgeHandle {
    writer: mpsc::UnboundedSender<WriterCommand>,
    pending: Pending,
    next_id: Arc<AtomicU64>,
    request_timeout: Duration,
}

impl BridgeClient {
    pub fn new(options: BridgeOptions) -> Self {
        Self {
            options,
            http: Client::new(),
        }
    }

    pub async fn fetch_latest_version(&self) -> Result<ProtocolVersion, BackendError> {
        let response = self
            .http
            .get(&self.options.version_url)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        let doc = response
            .json::<VersionDocument>()
            .await
            .map_err(|e| BackendError::Protocol(format!("bad version document: {}", e)))?;
        Ok(doc.version)
    }

    pub async fn connect(&self, options: &ConnectOptions) -> Result<BridgeConnection, BackendError> {
        let (socket, _) = tokio_tungstenite::connect_async(self.options.gateway_url.as_str())
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let hello = serde_json::to_string(&OutboundFrame::Hello(options))
            .map_err(|e| BackendError::Protocol(e.to_string()))?;
        sink.send(Message::Text(hello))
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<WriterCommand>();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Some(command) = writer_rx.recv().await {
                match command {
                    WriterCommand::Frame(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            debug!(error = %e, "gateway write failed");
                            break;
                        }
                    }
                    WriterCommand::Close => break,
                }
            }
            let _ = sink.close().await;
        });

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            let mut closed = false;
            while let Some(message) = stream.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(frame)) => {
                        let reason = close_reason(frame.as_ref());
                        let _ = event_tx.send(BridgeEvent::ConnectionUpdate {
                            state: ConnectionState::Close,
                            reason: Some(reason),
                        });
                        closed = true;
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(error = %e, "gateway read failed");
                        break;
                    }
                };

                let frame = match serde_json::from_str::<InboundFrame>(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "ignoring malformed gateway frame");
                        continue;
                    }
                };

                let event = match frame {
                    InboundFrame::ConnectionUpdate {
                        connection,
                        status_code,
                    } => {
                        closed = connection == ConnectionState::Close;
                        BridgeEvent::ConnectionUpdate {
                            state: connection,
                            reason: status_code.map(DisconnectReason),
                        }
                    }
                    InboundFrame::CredsUpdate { creds } => BridgeEvent::CredsUpdate(creds),
                    InboundFrame::KeysSet { updates } => BridgeEvent::KeysUpdate(updates),
                    InboundFrame::Result {
                        id,
                        ok,
                        value,
                        error,
                    } => {
                        let waiter = reader_pending
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .remove(&id);
                        if let Some(waiter) = waiter {
                            let result = if ok {
                                Ok(value)
                            } else {
                                Err(error.map(BackendError::from).unwrap_or_else(|| {
                                    BackendError::Protocol("request failed".to_string())
                                }))
                            };
                            let _ = waiter.send(result);
                        }
                        continue;
                    }
                };

                if event_tx.send(event).is_err() {
                    break;
                }
                if closed {
                    break;
                }
            }

            // Dropping the waiters wakes every in-flight request with ConnectionClosed.
            reader_pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clear();

            if !closed {
                let _ = event_tx.send(BridgeEvent::ConnectionUpdate {
                    state: ConnectionState::Close,
                    reason: Some(DisconnectReason::CONNECTION_LOST),
                });
            }
        });

        Ok(BridgeConnection {
            handle: BridgeHandle {
                writer: writer_tx,
                pending,
                next_id: Arc::new(AtomicU64::new(1)),
                request_timeout: self.options.request_timeout,
            },
            events: event_rx,
        })
    }
}

impl BridgeHandle {
    pub async fn request_pairing_code(&self, phone_number: &str) -> Result<String, BackendError> {
        let value = self
            .call(|id| OutboundFrame::RequestPairingCode {
                id,
                phone: phone_number,
            })
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BackendError::Protocol("pairing code missing from result".to_string()))
    }

    pub async fn send_message(
        &self,
        recipient: &str,
        message: &OutboundMessage,
    ) -> Result<(), BackendError> {
        self.call(|id| OutboundFrame::SendMessage {
            id,
            to: recipient,
            message,
        })
        .await
        .map(|_| ())
    }

    /// Ask the writer to close the socket. Idempotent.
    pub fn close(&self) {
        let _ = self.writer.send(WriterCommand::Close);
    }

    async fn call<'a>(
        &self,
        build: impl FnOnce(u64) -> OutboundFrame<'a>,
    ) -> Result<Value, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let text = serde_json::to_string(&build(id))
            .map_err(|e| BackendError::Protocol(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);

        if self.writer.send(WriterCommand::Frame(text)).is_err() {
            self.forget(id);
            return Err(BackendError::ConnectionClosed);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BackendError::ConnectionClosed),
            Err(_) => {
                self.forget(id);
                Err(BackendError::TimedOut)
            }
        }
    }

    fn forget(&self, id: u64) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }
}

fn close_reason(frame: Option<&CloseFrame<'_>>) -> DisconnectReason {
    // The gateway forwards backend status codes as 4000 + status.
    match frame.map(|f| u16::from(f.code)) {
        Some(code) if (4000..5000).contains(&code) => DisconnectReason(code - 4000),
        _ => DisconnectReason::CONNECTION_CLOSED,
    }
}
