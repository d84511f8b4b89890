//! Tracing subscriber configuration
//!
//! Log levels follow these conventions:
//! - ERROR: Local failures (disk, runtime) and crashed transfer tasks
//! - WARN: Failed transfers and downloads, unusable codes
//! - INFO: Offers created, transfers completed, requests handled
//! - DEBUG: Rejected requests, header lines, task bookkeeping
//! - TRACE: Socket shutdown noise

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
fn default_level(debug: bool) -> &'static str {
    if debug { "debug" } else { "info" }
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--debug`.
pub fn init(debug: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level(debug)));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Initialize the tracing subscriber for tests
///
/// Uses `try_init` so repeated calls are harmless.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
