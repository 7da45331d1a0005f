//! Engine composition and lifecycle.
//!
//! [`InventoryEngine`] wires the store, logger, order pool, replenishment
//! agent, audit scheduler, and aggregation pool together, and owns the
//! bounded shutdown sequence: stop replenishment, stop accepting orders
//! and drain the pool, stop the scheduler, flush the logger, release the
//! aggregation pool. Every step has a deadline; `stop` never blocks
//! indefinitely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::aggregate::aggregate;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::logger::{AsyncLogger, LogSink, TracingSink};
use crate::orders::{DispatcherStats, OrderDispatcher, OrderRequest, SimulatedOrderHandler};
use crate::replenish::ReplenishmentAgent;
use crate::scheduler::AuditScheduler;
use crate::store::{InventoryStore, Snapshot};

/// The assembled inventory engine, consumed as a library by a host
/// process.
pub struct InventoryEngine {
    config: EngineConfig,
    catalog: Vec<String>,
    store: Arc<InventoryStore>,
    logger: Arc<AsyncLogger>,
    dispatcher: OrderDispatcher,
    aggregation_pool: Mutex<Option<Arc<rayon::ThreadPool>>>,
    replenisher: Mutex<Option<ReplenishmentAgent>>,
    scheduler: Mutex<Option<AuditScheduler>>,
    stopped: AtomicBool,
}

impl InventoryEngine {
    /// Build an engine logging through `tracing`, seeded with the given
    /// catalog and initial quantities.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration fails validation or the
    /// catalog is empty. These are the only faults that propagate to the
    /// host; steady-state faults surface as log outcomes.
    pub fn new(config: EngineConfig, catalog: &[(&str, u64)]) -> Result<Self, EngineError> {
        Self::with_sink(config, catalog, Box::new(TracingSink))
    }

    /// Build an engine recording log events into a custom sink.
    pub fn with_sink(
        config: EngineConfig,
        catalog: &[(&str, u64)],
        sink: Box<dyn LogSink>,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfig)?;
        if catalog.is_empty() {
            return Err(EngineError::InvalidConfig("catalog must not be empty".into()));
        }

        let store = Arc::new(InventoryStore::seeded(
            catalog.iter().map(|(p, q)| ((*p).to_owned(), *q)),
        ));
        let logger = Arc::new(AsyncLogger::new(sink));

        let handler = SimulatedOrderHandler::new(
            Arc::clone(&store),
            config.order_delay_min_ms,
            config.order_delay_max_ms,
        );
        let dispatcher = OrderDispatcher::new(
            config.worker_pool_size,
            config.max_pending_orders,
            handler,
            Arc::clone(&logger),
        )?;

        let aggregation_pool = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("sl-aggregate-{i}"))
            .build()
            .map_err(|e| EngineError::InvalidConfig(format!("aggregation pool: {e}")))?;

        info!(
            products = catalog.len(),
            workers = config.worker_pool_size,
            "inventory engine assembled"
        );

        Ok(Self {
            catalog: catalog.iter().map(|(p, _)| (*p).to_owned()).collect(),
            config,
            store,
            logger,
            dispatcher,
            aggregation_pool: Mutex::new(Some(Arc::new(aggregation_pool))),
            replenisher: Mutex::new(None),
            scheduler: Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    /// Launch the replenishment agent and the audit scheduler. Idempotent;
    /// a second call is a no-op. Fails after [`InventoryEngine::stop`].
    pub fn start(&self) -> Result<(), EngineError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(EngineError::Shutdown);
        }

        {
            let mut replenisher = self.replenisher.lock();
            if replenisher.is_none() {
                *replenisher = Some(ReplenishmentAgent::spawn(
                    Arc::clone(&self.store),
                    self.catalog.clone(),
                    self.config.replenish_qty_min,
                    self.config.replenish_qty_max,
                    Duration::from_millis(self.config.replenish_interval_ms),
                    Arc::clone(&self.logger),
                ));
            }
        }

        {
            let mut scheduler = self.scheduler.lock();
            if scheduler.is_none() {
                let pool = self
                    .aggregation_pool
                    .lock()
                    .as_ref()
                    .map(Arc::clone)
                    .ok_or(EngineError::Shutdown)?;
                *scheduler = Some(AuditScheduler::spawn(
                    Arc::clone(&self.store),
                    self.config.aggregation_leaf_threshold,
                    Duration::from_millis(self.config.schedule_initial_delay_ms),
                    Duration::from_millis(self.config.schedule_period_ms),
                    pool,
                    Arc::clone(&self.logger),
                ));
            }
        }

        Ok(())
    }

    /// Submit one order to the worker pool.
    pub fn submit_order(&self, request: OrderRequest) -> Result<(), EngineError> {
        self.dispatcher.submit(request)
    }

    /// Submit a simulated order drawn from the catalog.
    pub fn submit_random_order(&self) -> Result<OrderRequest, EngineError> {
        self.dispatcher.submit_random(&self.catalog)
    }

    /// Point-in-time copy of the ledger.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Total stock across all products, aggregated on the engine's pool.
    /// Returns 0 after shutdown.
    #[must_use]
    pub fn total_stock(&self) -> u64 {
        let snapshot = self.store.snapshot();
        let leaf_threshold = self.config.aggregation_leaf_threshold;
        match self.aggregation_pool.lock().as_ref() {
            Some(pool) => pool.install(move || aggregate(&snapshot, leaf_threshold)),
            None => 0,
        }
    }

    /// Dispatcher counters snapshot.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        self.dispatcher.stats()
    }

    /// Execute the bounded shutdown sequence, returning `true` if every
    /// component released its resources within `timeout`:
    /// 1. stop replenishment,
    /// 2. stop accepting orders and drain in-flight tasks,
    /// 3. stop the audit scheduler,
    /// 4. flush and stop the logger,
    /// 5. release the aggregation pool.
    ///
    /// Idempotent; later calls return immediately.
    pub fn stop(&self, timeout: Duration) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return true;
        }

        info!("stopping inventory engine");
        let deadline = Instant::now() + timeout;
        let mut clean = true;

        if let Some(replenisher) = self.replenisher.lock().take() {
            clean &= replenisher.stop(remaining(deadline));
        }

        clean &= self.dispatcher.shutdown(remaining(deadline));

        if let Some(scheduler) = self.scheduler.lock().take() {
            clean &= scheduler.stop(remaining(deadline));
        }

        self.logger.shutdown(remaining(deadline));

        {
            let mut pool = self.aggregation_pool.lock();
            *pool = None;
        }

        if clean {
            info!("inventory engine stopped");
        } else {
            warn!("inventory engine stopped with detached components");
        }
        clean
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline
        .saturating_duration_since(Instant::now())
        .max(Duration::from_millis(1))
}
