// system-tests/tests/helpers/env.rs
// ============================================================================
// Module: System Test Environment Helpers
// Description: Tracing setup and harness options for system-tests.
// Purpose: Give every suite the same observable, fast-polling configuration.
// Dependencies: system-tests, virtrun-harness, tracing-subscriber
// ============================================================================

use std::sync::Once;
use std::time::Duration;

use system_tests::config::SystemTestConfig;
use tracing_subscriber::EnvFilter;
use virtrun_harness::HarnessOptions;

static TRACING: Once = Once::new();

/// Installs the test tracing subscriber exactly once per process.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let config = SystemTestConfig::load().unwrap_or_default();
        let filter = config.log_filter.unwrap_or_else(|| "info".to_string());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_test_writer()
            .try_init();
    });
}

/// Harness options tuned for scripted in-process clusters.
///
/// Polling is fast and deadlines are short: the scripted controller reacts in
/// milliseconds, and negative checks sleep through their whole window.
pub fn test_options() -> HarnessOptions {
    let config = SystemTestConfig::load().unwrap_or_default();
    HarnessOptions {
        poll_interval: config.poll_interval.unwrap_or(Duration::from_millis(20)),
        run_timeout: config.timeout.unwrap_or(Duration::from_secs(5)),
        ..HarnessOptions::default()
    }
}

/// Short window for negative target checks; the whole window is slept.
#[must_use]
pub fn negative_window() -> Duration {
    Duration::from_millis(300)
}
