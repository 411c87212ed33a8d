// Pairing service - API Core
//
// Issues one-time pairing codes for linking a phone number to a messaging
// account, then hands the resulting session credential back to that number
// and discards all local state.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
