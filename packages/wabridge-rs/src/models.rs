use base64::Engine;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Protocol version triple pinned for one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(pub [u32; 3]);

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [major, minor, patch] = self.0;
        write!(f, "{}.{}.{}", major, minor, patch)
    }
}

/// Shape of the published version document.
#[derive(Debug, Deserialize)]
pub struct VersionDocument {
    pub version: ProtocolVersion,
}

/// Client identity presented to the backend (shown in the linked-devices list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserDescriptor {
    pub platform: String,
    pub browser: String,
    pub version: String,
}

impl BrowserDescriptor {
    pub fn macos(browser: &str) -> Self {
        Self {
            platform: "Mac OS".to_string(),
            browser: browser.to_string(),
            version: "14.4.1".to_string(),
        }
    }
}

/// Credential state of a session.
///
/// The blob is opaque to us apart from `registered`, which tells whether the
/// identity has already been linked. Unknown fields round-trip untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub registered: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// One key-store write. `value: None` deletes the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyUpdate {
    pub category: String,
    pub id: String,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Status code attached to a closed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisconnectReason(pub u16);

impl DisconnectReason {
    pub const LOGGED_OUT: Self = Self(401);
    pub const CONNECTION_LOST: Self = Self(408);
    pub const CONNECTION_CLOSED: Self = Self(428);
    pub const CONNECTION_REPLACED: Self = Self(440);
    pub const BAD_SESSION: Self = Self(500);
    pub const UNAVAILABLE: Self = Self(503);
    pub const RESTART_REQUIRED: Self = Self(515);

    /// Explicit unauthorized signal; the backend will not accept these credentials again.
    pub fn is_logged_out(&self) -> bool {
        *self == Self::LOGGED_OUT
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "statusCode: {}", self.0)
    }
}

/// Events emitted by a live connection, in backend order.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    ConnectionUpdate {
        state: ConnectionState,
        reason: Option<DisconnectReason>,
    },
    CredsUpdate(Credentials),
    KeysUpdate(Vec<KeyUpdate>),
}

/// Everything the backend needs to open a connection for one session.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectOptions {
    pub version: ProtocolVersion,
    pub browser: BrowserDescriptor,
    pub mark_online_on_connect: bool,
    pub creds: Credentials,
    pub keys: Vec<KeyUpdate>,
}

/// Payload delivered to an address.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Document {
        #[serde(serialize_with = "serialize_base64")]
        data: Vec<u8>,
        mimetype: String,
        file_name: String,
    },
    Image {
        url: String,
        caption: String,
    },
    Text {
        text: String,
    },
}

fn serialize_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
}

/// Failure reported by the gateway or the transport underneath it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("conflict")]
    Conflict,
    #[error("not-authorized")]
    NotAuthorized,
    #[error("Socket connection timeout")]
    SocketTimeout,
    #[error("rate-overlimit")]
    RateOverlimit,
    #[error("Connection Closed")]
    ConnectionClosed,
    #[error("Timed Out")]
    TimedOut,
    #[error("Value not found")]
    ValueNotFound,
    #[error("Stream Errored")]
    StreamErrored,
    #[error("statusCode: {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Error object carried in a failed `result` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayError {
    pub kind: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<GatewayError> for BackendError {
    fn from(err: GatewayError) -> Self {
        match err.kind.as_str() {
            "conflict" => BackendError::Conflict,
            "not-authorized" => BackendError::NotAuthorized,
            "socket-timeout" => BackendError::SocketTimeout,
            "rate-overlimit" => BackendError::RateOverlimit,
            "connection-closed" => BackendError::ConnectionClosed,
            "timed-out" => BackendError::TimedOut,
            "value-not-found" => BackendError::ValueNotFound,
            "stream-errored" => BackendError::StreamErrored,
            _ => match err.status {
                Some(status) => BackendError::Status(status),
                None => BackendError::Protocol(err.message.unwrap_or(err.kind)),
            },
        }
    }
}

/// Frames the gateway sends us.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum InboundFrame {
    #[serde(rename = "connection.update")]
    ConnectionUpdate {
        connection: ConnectionState,
        #[serde(default)]
        status_code: Option<u16>,
    },
    #[serde(rename = "creds.update")]
    CredsUpdate { creds: Credentials },
    #[serde(rename = "keys.set")]
    KeysSet { updates: Vec<KeyUpdate> },
    #[serde(rename = "result")]
    Result {
        id: u64,
        ok: bool,
        #[serde(default)]
        value: Value,
        #[serde(default)]
        error: Option<GatewayError>,
    },
}

/// Frames we send to the gateway.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum OutboundFrame<'a> {
    Hello(&'a ConnectOptions),
    RequestPairingCode {
        id: u64,
        phone: &'a str,
    },
    SendMessage {
        id: u64,
        to: &'a str,
        message: &'a OutboundMessage,
    },
}
