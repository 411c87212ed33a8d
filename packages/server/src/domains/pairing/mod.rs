//! Pairing domain - links a phone number to a messaging account
//!
//! Flow:
//!   HTTP request → validate identity → reset session → connect
//!     → (unregistered) pairing code returned to the caller
//!     → (open) credential handed off to the identity, session destroyed
//!     → (close) reconnect against the same session, or stop on logout
//!
//! Responsibilities:
//! - Phone number normalization and validation
//! - Per-identity on-disk session lifecycle
//! - Connection state machine and reconnect policy
//! - Exactly-once credential delivery and guaranteed cleanup

pub mod actions;
pub mod commands;
pub mod errors;
pub mod events;
pub mod machines;
pub mod models;
pub mod orchestrator;
pub mod responder;
pub mod types;

pub use commands::PairingCommand;
pub use errors::{classify, report_background_error, PairingError, Severity};
pub use events::PairingEvent;
pub use machines::{PairingMachine, SessionState};
pub use models::{Identity, PairingCode, SessionHandle, SessionKey, SessionLease, SessionStore};
pub use orchestrator::{start_pairing, PairingRun};
pub use responder::ResponseSlot;
pub use types::{Notice, PairReply, PairingProfile, ReconnectPolicy};
