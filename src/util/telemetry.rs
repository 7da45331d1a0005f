//! Telemetry helpers for structured logging and tracing.

use tracing_subscriber::EnvFilter;

/// Install a default `tracing` subscriber if none is set.
///
/// The filter comes from `RUST_LOG` when present and otherwise defaults
/// to `stock_ledger=info`. Hosts that install their own subscriber are
/// left alone; repeated calls are no-ops, so tests can call this freely.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stock_ledger=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
