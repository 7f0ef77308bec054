//! Logging infrastructure for issuedash
//!
//! Dashboards usually run inside CI, so logs go to stderr where the job
//! log picks them up. The level comes from `RUST_LOG`, defaulting to
//! `info`.

use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Initialize the logging system.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

/// Initialize logging for tests (logs to the test writer).
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}
