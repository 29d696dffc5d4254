//! Logging and tracing configuration
//!
//! casekit emits `tracing` events for test lifecycle (subtests starting
//! and finishing, cleanups, halts). Nothing is printed unless a subscriber
//! is installed, which `init` does for test binaries.

use std::sync::Once;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter variable checked before `RUST_LOG`
const LOG_ENV: &str = "CASEKIT_LOG";

static INIT: Once = Once::new();

/// Initialize tracing for a test binary
///
/// Safe to call from every test. The filter comes from `CASEKIT_LOG`,
/// then `RUST_LOG`, defaulting to `warn`. Output goes through the test
/// writer so libtest captures it per test.
pub fn init() {
    INIT.call_once(|| {
        let filter = std::env::var(LOG_ENV)
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        // Another subscriber may already be installed by the caller
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .without_time()
                    .compact(),
            )
            .try_init();
    });
}
