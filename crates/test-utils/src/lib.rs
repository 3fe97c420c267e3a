//! Shared fixtures for the remotewatch integration tests.

pub mod builders;
pub mod fakes;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

/// Wall-clock limit for tests that talk to a mock server or real workers.
pub const WALL_CLOCK_LIMIT: Duration = Duration::from_secs(5);

/// Limit for tests on a paused clock. Virtual time jumps straight to the next
/// timer, so this has to outlast every backoff the task under test sleeps.
pub const VIRTUAL_CLOCK_LIMIT: Duration = Duration::from_secs(3600);

static TRACING: Once = Once::new();

/// Route `tracing` output into the test harness's captured stdout.
///
/// The filter comes from `REMOTEWATCH_LOG` (the binary's own variable), then
/// `RUST_LOG`, and otherwise shows remotewatch at debug and everything else
/// at warn. Captured lines only surface for failing tests.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = ["REMOTEWATCH_LOG", EnvFilter::DEFAULT_ENV]
            .into_iter()
            .find_map(|var| EnvFilter::try_from_env(var).ok())
            .unwrap_or_else(|| EnvFilter::new("warn,remotewatch=debug"));

        // Another harness may already own the global subscriber.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}

/// Await `f`, failing the test if it takes longer than [`WALL_CLOCK_LIMIT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    within(WALL_CLOCK_LIMIT, f).await
}

/// Await `f` under [`VIRTUAL_CLOCK_LIMIT`], for `start_paused` tests.
pub async fn with_virtual_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    within(VIRTUAL_CLOCK_LIMIT, f).await
}

async fn within<F, T>(limit: Duration, f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, f).await {
        Ok(value) => value,
        Err(_) => panic!("test did not finish within {limit:?}"),
    }
}
