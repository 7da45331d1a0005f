//! Error types for engine operations.

use thiserror::Error;

/// Errors produced by engine components.
///
/// Insufficient stock is deliberately *not* represented here: a `remove`
/// that cannot be satisfied is an ordinary outcome reported as `false`,
/// never an error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The pending-order queue is full; the submission was rejected.
    #[error("order queue is full")]
    QueueFull,
    /// The component has been shut down and no longer accepts work.
    #[error("engine component has been shut down")]
    Shutdown,
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
