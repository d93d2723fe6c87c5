//! Tracing setup for host applications.

use std::io;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. `"warn"` or `"liftskit_core=debug"`).
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init()
}
