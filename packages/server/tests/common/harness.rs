//! Test harness for pairing integration tests.
//!
//! Each test gets its own temporary session root and a scripted messaging
//! backend. Nothing touches the network.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pair_core::domains::pairing::{start_pairing, PairReply};
use pair_core::kernel::{MockMessagingClient, ServerDeps, TestDependencies};
use tempfile::TempDir;
use test_context::AsyncTestContext;

/// Test harness that owns a scratch session root.
///
/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let (deps, mock) = ctx.deps(MockMessagingClient::new());
///     // ... test code
/// }
/// ```
pub struct TestHarness {
    root: TempDir,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new()
    }

    async fn teardown(self) {
        // TempDir removes the session root on drop
    }
}

impl TestHarness {
    pub fn new() -> Self {
        // Uses try_init() to avoid panicking if already initialized.
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        Self {
            root: tempfile::tempdir().expect("Failed to create session root"),
        }
    }

    pub fn session_root(&self) -> &Path {
        self.root.path()
    }

    pub fn session_dir(&self, key: &str) -> PathBuf {
        self.root.path().join(key)
    }

    pub fn session_exists(&self, key: &str) -> bool {
        self.session_dir(key).exists()
    }

    /// Server dependencies around `mock`, plus a handle for inspecting it
    pub fn deps(&self, mock: MockMessagingClient) -> (Arc<ServerDeps>, Arc<MockMessagingClient>) {
        self.deps_with(TestDependencies::new(mock))
    }

    pub fn deps_with(&self, test_deps: TestDependencies) -> (Arc<ServerDeps>, Arc<MockMessagingClient>) {
        let mock = test_deps.messaging.clone();
        (Arc::new(test_deps.into_server_deps(self.root.path())), mock)
    }

    pub async fn pair(&self, deps: &Arc<ServerDeps>, number: &str) -> PairReply {
        start_pairing(deps.clone(), Some(number.to_string())).await
    }

    /// Poll `condition` until it holds or two seconds pass.
    pub async fn wait_until<F>(&self, mut condition: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if condition() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
