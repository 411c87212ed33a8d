pub mod identity;
pub mod pairing_code;
pub mod session;

pub use identity::*;
pub use pairing_code::*;
pub use session::*;
