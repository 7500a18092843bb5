//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; binaries and tests opt into a
//! subscriber with the `logging` feature. Without it every function here is a
//! no-op.

#[cfg(feature = "logging")]
use tracing_subscriber::{fmt, EnvFilter};

/// Installs a subscriber filtered by `RUST_LOG`, falling back to `info`.
#[cfg(feature = "logging")]
pub fn init() {
    init_with_level("info")
}

/// Installs a subscriber filtered by `RUST_LOG`, falling back to `level`.
///
/// Writes to stderr so command output on stdout stays machine-readable.
/// Calling it a second time leaves the first subscriber in place.
#[cfg(feature = "logging")]
pub fn init_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Verbose subscriber captured by the test harness.
#[cfg(feature = "logging")]
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("rowrunner=trace"))
        .with_test_writer()
        .try_init();
}

#[cfg(not(feature = "logging"))]
pub fn init() {}

#[cfg(not(feature = "logging"))]
pub fn init_with_level(_level: &str) {}

#[cfg(not(feature = "logging"))]
pub fn init_test() {}
