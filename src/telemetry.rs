//! Tracing subscriber setup for binaries and examples.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! application's choice. [`init`] wires up a sensible default: a fmt
//! subscriber filtered by `RUST_LOG`, falling back to `info`.

use tracing_subscriber::EnvFilter;

/// Installs the default fmt subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
