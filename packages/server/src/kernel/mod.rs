//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod test_dependencies;
pub mod traits;

pub use deps::{BridgeAdapter, ServerDeps};
pub use test_dependencies::{MockMessagingClient, ScriptedAttempt, TestDependencies};
pub use traits::*;
