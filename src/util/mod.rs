//! Shared utilities.

pub mod clock;
pub(crate) mod join;
pub mod telemetry;

pub use clock::now_ms;
pub use telemetry::init_tracing;
