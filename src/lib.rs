//! # Stock Ledger
//!
//! A concurrent inventory-management engine: a shared stock ledger
//! mutated by a bounded pool of order-fulfillment workers and a
//! continuous replenishment agent, periodically audited by a fork-join
//! aggregation over atomic snapshots, with results reported through a
//! non-blocking log path.
//!
//! ## Core Pieces
//!
//! - [`store::InventoryStore`]: thread-safe product→quantity ledger with
//!   `add`, conditional `remove`, and atomic `snapshot` behind one guard.
//! - [`orders::OrderDispatcher`]: fixed-size worker pool with a bounded
//!   queue, giving backpressure instead of unbounded concurrency.
//! - [`replenish::ReplenishmentAgent`]: long-lived loop adding random
//!   stock, cancellable within one pause interval.
//! - [`aggregate::aggregate`]: divide-and-conquer parallel summation over
//!   an immutable snapshot.
//! - [`scheduler::AuditScheduler`]: periodic snapshot → aggregate → log
//!   pipeline.
//! - [`logger::AsyncLogger`]: fire-and-forget sink; producers never wait
//!   for emission.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use stock_ledger::{EngineConfig, InventoryEngine};
//!
//! let engine = InventoryEngine::new(
//!     EngineConfig::new().with_worker_pool_size(4),
//!     &[("keyboard", 20), ("mouse", 20), ("screen", 20), ("headset", 20)],
//! ).expect("startup");
//!
//! engine.start().expect("startup");
//! for _ in 0..20 {
//!     let _ = engine.submit_random_order();
//! }
//! engine.stop(Duration::from_secs(10));
//! ```
//!
//! The engine never persists the ledger, coordinates across nodes, or
//! guarantees cross-producer log ordering; an audit total reflects one
//! valid serialization of mutations, not necessarily the latest by
//! wall-clock time.

/// Fork-join aggregation over snapshots.
pub mod aggregate;
/// Engine configuration.
pub mod config;
/// Composition and lifecycle.
pub mod engine;
/// Error types.
pub mod error;
/// Non-blocking log path.
pub mod logger;
/// Bounded-concurrency order processing.
pub mod orders;
/// Continuous stock replenishment.
pub mod replenish;
/// Periodic stock audits.
pub mod scheduler;
/// The shared ledger and snapshots.
pub mod store;
/// Shared utilities.
pub mod util;

pub use aggregate::aggregate as aggregate_snapshot;
pub use config::EngineConfig;
pub use engine::InventoryEngine;
pub use error::{AppResult, EngineError};
pub use logger::{AsyncLogger, InMemorySink, LogEvent, LogKind, LogSink, TracingSink};
pub use orders::{
    DispatcherStats, OrderDispatcher, OrderHandler, OrderOutcome, OrderRequest,
    SimulatedOrderHandler,
};
pub use replenish::ReplenishmentAgent;
pub use scheduler::AuditScheduler;
pub use store::{InventoryStore, Snapshot};
