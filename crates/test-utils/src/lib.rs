pub mod builders;
pub mod fake_drift;
pub mod fake_steps;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
///
/// Under paused time the timeout auto-advances like any other timer, so it
/// only fires if the future is genuinely stuck.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `condition` every 5ms until it holds. Combine with [`with_timeout`].
#[allow(dead_code)]
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    while !condition() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
