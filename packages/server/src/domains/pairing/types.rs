//! Pairing domain data types

use std::time::Duration;

use wabridge::{BrowserDescriptor, OutboundMessage};

use super::models::PairingCode;

/// Reply to the HTTP caller. Exactly one is produced per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairReply {
    Code(PairingCode),
    MissingNumber,
    InvalidNumber,
    /// The backend refused or failed the pairing-code request
    PairingFailed,
    /// Connection or version lookup failed before a code could be issued
    Unavailable,
}

/// Auxiliary message sent after the credential document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Image { url: String, caption: String },
    Text(String),
}

impl Notice {
    pub fn to_message(&self) -> OutboundMessage {
        match self {
            Notice::Image { url, caption } => OutboundMessage::Image {
                url: url.clone(),
                caption: caption.clone(),
            },
            Notice::Text(text) => OutboundMessage::Text { text: text.clone() },
        }
    }
}

/// Branding, pacing and client identity for a deployment.
///
/// Everything that differs between deployments lives here; the pairing logic
/// itself is shared.
#[derive(Debug, Clone)]
pub struct PairingProfile {
    pub name: String,
    pub browser: BrowserDescriptor,
    pub document_file_name: String,
    pub document_mimetype: String,
    pub notices: Vec<Notice>,
    /// Pause between connecting and requesting a code, required by the backend
    pub pairing_code_delay: Duration,
    /// Pause between the last delivered message and destroying the session
    pub handoff_flush_delay: Duration,
}

const SHARE_WARNING: &str = "⚠️ *Do NOT share this file with anyone!*";

const KNIGHT_GUIDE_URL: &str = "https://img.youtube.com/vi/-oz_u1iMgf8/maxresdefault.jpg";

const KNIGHT_GUIDE_CAPTION: &str = "🎬 *KnightBot MD V2 Setup Guide*\n\n\
🚀 Fast AI + Bug Fixes\n📺 Watch: https://youtu.be/NjOipI2AoMk";

const KNIGHT_CREDIT: &str = "┌┤✑ Thanks for using Knight Bot\n\
│└────────────┈ ⳹\n\
│©2025 Mr Unique Hacker\n\
└─────────────────┈ ⳹";

impl PairingProfile {
    pub fn knight() -> Self {
        Self {
            name: "knight".to_string(),
            browser: BrowserDescriptor::macos("Desktop"),
            document_file_name: "creds.json".to_string(),
            document_mimetype: "application/json".to_string(),
            notices: vec![
                Notice::Image {
                    url: KNIGHT_GUIDE_URL.to_string(),
                    caption: KNIGHT_GUIDE_CAPTION.to_string(),
                },
                Notice::Text(format!("{}\n\n{}", SHARE_WARNING, KNIGHT_CREDIT)),
            ],
            pairing_code_delay: Duration::from_millis(2000),
            handoff_flush_delay: Duration::from_millis(1000),
        }
    }

    /// Unbranded variant: no guide image, just the warning.
    pub fn plain() -> Self {
        Self {
            name: "plain".to_string(),
            notices: vec![Notice::Text(SHARE_WARNING.to_string())],
            ..Self::knight()
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "knight" => Some(Self::knight()),
            "plain" => Some(Self::plain()),
            _ => None,
        }
    }

    pub fn with_delays(mut self, pairing_code_delay: Duration, handoff_flush_delay: Duration) -> Self {
        self.pairing_code_delay = pairing_code_delay;
        self.handoff_flush_delay = handoff_flush_delay;
        self
    }
}

/// Bounded reconnect policy for transient closes.
///
/// The first reconnect is immediate; later ones back off exponentially from
/// `backoff_base`, capped at `MAX_BACKOFF`.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub max_reconnects: u32,
    pub backoff_base: Duration,
}

impl ReconnectPolicy {
    pub const MAX_BACKOFF: Duration = Duration::from_secs(8);

    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .map_or(Self::MAX_BACKOFF, |delay| delay.min(Self::MAX_BACKOFF))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_reconnects: 10,
            backoff_base: Duration::from_millis(500),
        }
    }
}
