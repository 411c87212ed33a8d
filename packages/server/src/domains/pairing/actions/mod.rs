// Pairing actions
pub mod handoff;
pub mod request_code;

pub use handoff::*;
pub use request_code::*;
