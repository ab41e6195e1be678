//! Process bootstrap helpers shared by the balancer binary and the store's
//! test suites: a `tracing` subscriber for real processes, and a
//! best-effort equivalent for tests that may be initialized many times.

use tracing_subscriber::EnvFilter;

/// Call this once from a binary's `main` before doing anything else.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

/// Call this from `#[test]`/`#[tokio::test]` functions. Safe to call more
/// than once per process: later calls silently no-op instead of panicking.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .compact()
        .try_init();
}
