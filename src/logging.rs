//! Logging setup for the binary.

#![warn(clippy::missing_docs_in_private_items)]

use tracing_subscriber::EnvFilter;

/// Setup logging of events reported while benchmarking.
///
/// Use the RUST_LOG environment variable to override the defaults.
///
/// E.g. to see why individual probes fail:
///   RUST_LOG=dnsrank=DEBUG
///
/// Log output goes to stderr so that the report on stdout stays clean.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
        .ok();
}
