//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered through `RUST_LOG` with an `info`
//! default. Projections and the workflow engine emit through `tracing`;
//! installing the subscriber is the caller's choice, usually once at
//! process start or in test setup.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// Install the process-wide subscriber.
///
/// Fails when a subscriber is already installed, so callers that cannot
/// tolerate a second install can tell.
pub fn try_init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let _ = try_init();
}
