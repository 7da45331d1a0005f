//! Bounded-concurrency order processing.
//!
//! A fixed pool of dedicated OS worker threads, each with its own
//! single-threaded tokio runtime, pulls [`OrderRequest`]s from a bounded
//! channel. The fixed size is deliberate backpressure: with all workers
//! busy, submissions queue in the channel instead of spawning unbounded
//! work, and once the queue is full they are rejected with `QueueFull`.
//!
//! Outcomes are forwarded to the [`AsyncLogger`] fire-and-forget; the
//! submitter never blocks on completion. A panic inside a task is caught
//! at the task boundary, reported as a failure outcome, and never crashes
//! the pool or blocks sibling workers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::error::EngineError;
use crate::logger::{AsyncLogger, LogEvent};
use crate::store::InventoryStore;
use crate::util::join::join_timeout;

/// Simulated order quantities are drawn uniformly from `[1, 15)`.
const ORDER_QTY_MIN: u64 = 1;
const ORDER_QTY_MAX: u64 = 15;

/// One order against the ledger; exists only for the duration of its
/// processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Product to remove stock from.
    pub product: String,
    /// Units requested; must be greater than 0.
    pub quantity: u64,
}

/// Outcome of one processed order, produced once and consumed by the log
/// path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderOutcome {
    /// The request this outcome answers.
    pub request: OrderRequest,
    /// Whether the removal succeeded.
    pub success: bool,
}

impl OrderOutcome {
    /// Human-readable outcome line.
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "order: -{} of \"{}\" -> {}",
            self.request.quantity,
            self.request.product,
            if self.success { "SUCCESS" } else { "FAILURE" },
        )
    }
}

/// Processing seam for one order.
///
/// Called from a dedicated worker thread's runtime; may await freely but
/// must hold the inventory guard only briefly.
#[async_trait]
pub trait OrderHandler: Send + Sync + Clone + 'static {
    /// Process one order, returning whether the removal succeeded.
    async fn process(&self, request: &OrderRequest) -> bool;
}

/// Default handler: pause a uniform random duration modeling variable
/// processing cost, then attempt the conditional removal.
#[derive(Clone)]
pub struct SimulatedOrderHandler {
    store: Arc<InventoryStore>,
    delay_min_ms: u64,
    delay_max_ms: u64,
}

impl SimulatedOrderHandler {
    /// Handler removing from `store` after a `[delay_min_ms, delay_max_ms]`
    /// pause.
    #[must_use]
    pub fn new(store: Arc<InventoryStore>, delay_min_ms: u64, delay_max_ms: u64) -> Self {
        Self {
            store,
            delay_min_ms,
            delay_max_ms,
        }
    }
}

#[async_trait]
impl OrderHandler for SimulatedOrderHandler {
    async fn process(&self, request: &OrderRequest) -> bool {
        let delay = if self.delay_max_ms > self.delay_min_ms {
            rand::rng().random_range(self.delay_min_ms..=self.delay_max_ms)
        } else {
            self.delay_min_ms
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.store.remove(&request.product, request.quantity)
    }
}

/// Internal counters for dispatcher statistics (thread-safe).
#[derive(Debug, Default)]
struct DispatchCounters {
    submitted: AtomicU64,
    queued: AtomicU64,
    active: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    faulted: AtomicU64,
}

/// Statistics about dispatcher utilization.
#[derive(Debug, Clone, Default)]
pub struct DispatcherStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Orders accepted so far.
    pub submitted: u64,
    /// Orders waiting in the queue.
    pub queued: u64,
    /// Orders currently being processed.
    pub active: u64,
    /// Orders that removed stock successfully.
    pub succeeded: u64,
    /// Orders refused for insufficient stock.
    pub failed: u64,
    /// Tasks that panicked and were converted to failure outcomes.
    pub faulted: u64,
}

/// Fixed-size pool processing simulated orders against the store.
pub struct OrderDispatcher {
    worker_count: usize,
    /// Task sender. `Option` allows clean shutdown by dropping, which
    /// lets workers drain the queue and exit.
    task_tx: Mutex<Option<Sender<OrderRequest>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<DispatchCounters>,
    shutdown: Arc<AtomicBool>,
}

impl OrderDispatcher {
    /// Spawn `worker_count` worker threads processing through `handler`,
    /// with room for `max_pending` queued orders.
    pub fn new<H: OrderHandler>(
        worker_count: usize,
        max_pending: usize,
        handler: H,
        logger: Arc<AsyncLogger>,
    ) -> Result<Self, EngineError> {
        if worker_count == 0 {
            return Err(EngineError::InvalidConfig(
                "worker_pool_size must be greater than 0".into(),
            ));
        }
        if max_pending == 0 {
            return Err(EngineError::InvalidConfig(
                "max_pending_orders must be greater than 0".into(),
            ));
        }

        let (task_tx, task_rx) = bounded::<OrderRequest>(max_pending);
        let counters = Arc::new(DispatchCounters::default());

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            workers.push(spawn_worker(
                worker_id,
                task_rx.clone(),
                handler.clone(),
                Arc::clone(&logger),
                Arc::clone(&counters),
            ));
        }

        info!(
            worker_count,
            max_pending, "order dispatcher initialized with dedicated worker threads"
        );

        Ok(Self {
            worker_count,
            task_tx: Mutex::new(Some(task_tx)),
            workers: Mutex::new(workers),
            counters,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Submit one order. The enqueue itself never blocks: it fails with
    /// `QueueFull` once `max_pending` orders are waiting, and with
    /// `Shutdown` after [`OrderDispatcher::shutdown`].
    pub fn submit(&self, request: OrderRequest) -> Result<(), EngineError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(EngineError::Shutdown);
        }

        let task_tx_guard = self.task_tx.lock();
        let Some(task_tx) = task_tx_guard.as_ref() else {
            return Err(EngineError::Shutdown);
        };

        // Count the order as queued before it becomes visible to workers;
        // otherwise a worker could decrement first and wrap the counter.
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        match task_tx.try_send(request) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(crossbeam_channel::TrySendError::Full(req)) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                warn!(product = %req.product, "order queue is full");
                Err(EngineError::QueueFull)
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                self.counters.queued.fetch_sub(1, Ordering::Relaxed);
                Err(EngineError::Shutdown)
            }
        }
    }

    /// Submit a simulated order: product drawn uniformly from `catalog`,
    /// quantity uniformly in `[1, 15)`.
    pub fn submit_random(&self, catalog: &[String]) -> Result<OrderRequest, EngineError> {
        let mut rng = rand::rng();
        let product = catalog
            .choose(&mut rng)
            .ok_or_else(|| EngineError::InvalidConfig("catalog is empty".into()))?;
        let request = OrderRequest {
            product: product.clone(),
            quantity: rng.random_range(ORDER_QTY_MIN..ORDER_QTY_MAX),
        };
        self.submit(request.clone())?;
        Ok(request)
    }

    /// Snapshot of the dispatcher counters.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            worker_count: self.worker_count,
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            queued: self.counters.queued.load(Ordering::Relaxed),
            active: self.counters.active.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            faulted: self.counters.faulted.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting orders, let workers drain the queue, and join them
    /// within `drain_timeout`. Workers still running at the deadline are
    /// detached. Returns `true` if every worker exited in time.
    pub fn shutdown(&self, drain_timeout: Duration) -> bool {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return true;
        }

        info!("shutting down order dispatcher");

        // Dropping the sender ends the worker loops once the queue drains.
        {
            let mut task_tx = self.task_tx.lock();
            *task_tx = None;
        }

        let deadline = Instant::now() + drain_timeout;
        let mut all_joined = true;
        let mut workers = self.workers.lock();
        for (idx, worker) in workers.drain(..).enumerate() {
            let remaining = deadline
                .saturating_duration_since(Instant::now())
                .max(Duration::from_millis(1));
            if !join_timeout(worker, remaining, &format!("sl-order-{idx}")) {
                all_joined = false;
            }
        }

        info!(all_joined, "order dispatcher shut down");
        all_joined
    }
}

impl Drop for OrderDispatcher {
    fn drop(&mut self) {
        // Signal shutdown but do not join workers in Drop; explicit
        // shutdown() is required for a bounded drain.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            let mut task_tx = self.task_tx.lock();
            *task_tx = None;
            debug!("order dispatcher dropped without explicit shutdown - workers detached");
        }
    }
}

fn spawn_worker<H: OrderHandler>(
    worker_id: usize,
    task_rx: Receiver<OrderRequest>,
    handler: H,
    logger: Arc<AsyncLogger>,
    counters: Arc<DispatchCounters>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("sl-order-{worker_id}"))
        .spawn(move || {
            debug!(worker_id, "order worker started");

            // Each worker has its own single-threaded tokio runtime so
            // handler sleeps never touch a shared runtime.
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(worker_id, error = %e, "failed to create worker runtime");
                    return;
                }
            };

            // Blocking recv; when the sender is dropped the remaining
            // queue is drained and recv returns Err.
            loop {
                let request = match task_rx.recv() {
                    Ok(request) => request,
                    Err(_) => {
                        debug!(worker_id, "order channel closed, worker exiting");
                        break;
                    }
                };

                counters.queued.fetch_sub(1, Ordering::Relaxed);
                counters.active.fetch_add(1, Ordering::Relaxed);

                // The task boundary: a panicking handler becomes a
                // failure outcome instead of taking the pool down.
                let result =
                    catch_unwind(AssertUnwindSafe(|| rt.block_on(handler.process(&request))));

                counters.active.fetch_sub(1, Ordering::Relaxed);

                let outcome = match result {
                    Ok(success) => {
                        if success {
                            counters.succeeded.fetch_add(1, Ordering::Relaxed);
                        } else {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                        }
                        OrderOutcome { request, success }
                    }
                    Err(_) => {
                        counters.faulted.fetch_add(1, Ordering::Relaxed);
                        warn!(worker_id, "order task panicked; reporting failure outcome");
                        OrderOutcome {
                            request,
                            success: false,
                        }
                    }
                };

                debug!(worker_id, outcome = %outcome.message(), "order processed");

                // Detached continuation: hand the outcome to the log path
                // without anyone waiting on it.
                logger.accept(LogEvent::order(
                    outcome.request.product.clone(),
                    outcome.request.quantity,
                    outcome.success,
                ));
            }
        })
        .expect("failed to spawn order worker thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::InMemorySink;
    use crate::logger::LogKind;

    /// Handler with no simulated latency.
    #[derive(Clone)]
    struct ImmediateHandler {
        store: Arc<InventoryStore>,
    }

    #[async_trait]
    impl OrderHandler for ImmediateHandler {
        async fn process(&self, request: &OrderRequest) -> bool {
            self.store.remove(&request.product, request.quantity)
        }
    }

    /// Handler that panics on a marked product.
    #[derive(Clone)]
    struct PanickingHandler {
        store: Arc<InventoryStore>,
    }

    #[async_trait]
    impl OrderHandler for PanickingHandler {
        async fn process(&self, request: &OrderRequest) -> bool {
            assert_ne!(request.product, "poison", "injected fault");
            self.store.remove(&request.product, request.quantity)
        }
    }

    fn test_logger() -> (InMemorySink, Arc<AsyncLogger>) {
        let sink = InMemorySink::new(1024);
        let logger = Arc::new(AsyncLogger::new(Box::new(sink.clone())));
        (sink, logger)
    }

    #[test]
    fn test_orders_drain_and_settle() {
        let store = Arc::new(InventoryStore::seeded([("kbd", 20u64)]));
        let (sink, logger) = test_logger();
        let dispatcher = OrderDispatcher::new(
            4,
            64,
            ImmediateHandler {
                store: Arc::clone(&store),
            },
            Arc::clone(&logger),
        )
        .unwrap();

        for _ in 0..10 {
            dispatcher
                .submit(OrderRequest {
                    product: "kbd".into(),
                    quantity: 3,
                })
                .unwrap();
        }
        assert!(dispatcher.shutdown(Duration::from_secs(5)));
        logger.shutdown(Duration::from_secs(2));

        let stats = dispatcher.stats();
        assert_eq!(stats.submitted, 10);
        assert_eq!(stats.succeeded + stats.failed, 10);
        // 20 units cover at most 6 removals of 3.
        assert_eq!(stats.succeeded, 6);
        assert_eq!(store.snapshot().quantity("kbd"), 2);

        let order_events = sink
            .events()
            .iter()
            .filter(|e| e.kind == LogKind::Order)
            .count();
        assert_eq!(order_events, 10);
    }

    #[test]
    fn test_queued_stat_never_underflows() {
        let store = Arc::new(InventoryStore::seeded([("kbd", 1_000_000u64)]));
        let (_sink, logger) = test_logger();
        let dispatcher = Arc::new(
            OrderDispatcher::new(
                4,
                4,
                ImmediateHandler {
                    store: Arc::clone(&store),
                },
                Arc::clone(&logger),
            )
            .unwrap(),
        );

        // Watcher races stats() against fast workers draining the queue;
        // a wrapped decrement would show up as an absurd depth.
        let done = Arc::new(AtomicBool::new(false));
        let watcher = {
            let dispatcher = Arc::clone(&dispatcher);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut max_seen = 0u64;
                while !done.load(Ordering::Acquire) {
                    max_seen = max_seen.max(dispatcher.stats().queued);
                }
                max_seen
            })
        };

        for _ in 0..2000 {
            let _ = dispatcher.submit(OrderRequest {
                product: "kbd".into(),
                quantity: 1,
            });
        }
        done.store(true, Ordering::Release);
        let max_seen = watcher.join().unwrap();

        // At most the queue capacity plus the one order mid-submit.
        assert!(
            max_seen <= 5,
            "queue depth stat wrapped or overcounted: {max_seen}"
        );

        assert!(dispatcher.shutdown(Duration::from_secs(5)));
        logger.shutdown(Duration::from_secs(2));
        assert_eq!(dispatcher.stats().queued, 0);
    }

    #[tokio::test]
    async fn test_simulated_handler_removes_until_exhausted() {
        let store = Arc::new(InventoryStore::seeded([("kbd", 10u64)]));
        let handler = SimulatedOrderHandler::new(Arc::clone(&store), 1, 2);
        let request = OrderRequest {
            product: "kbd".into(),
            quantity: 4,
        };

        assert!(handler.process(&request).await);
        assert!(handler.process(&request).await);
        // 2 units left; the third attempt must be refused untouched.
        assert!(!handler.process(&request).await);
        assert_eq!(store.snapshot().quantity("kbd"), 2);
    }

    #[test]
    fn test_queue_full_rejects_instead_of_blocking() {
        let store = Arc::new(InventoryStore::seeded([("kbd", 1000u64)]));
        let (_sink, logger) = test_logger();
        // Single slow worker, tiny queue.
        let dispatcher = OrderDispatcher::new(
            1,
            2,
            SimulatedOrderHandler::new(Arc::clone(&store), 200, 200),
            Arc::clone(&logger),
        )
        .unwrap();

        let mut rejected = 0;
        for _ in 0..10 {
            match dispatcher.submit(OrderRequest {
                product: "kbd".into(),
                quantity: 1,
            }) {
                Ok(()) => {}
                Err(EngineError::QueueFull) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert!(rejected > 0, "expected rejections once the queue filled");

        dispatcher.shutdown(Duration::from_secs(5));
        logger.shutdown(Duration::from_secs(2));
    }

    #[test]
    fn test_panic_becomes_failure_outcome() {
        let store = Arc::new(InventoryStore::seeded([("kbd", 100u64)]));
        let (sink, logger) = test_logger();
        let dispatcher = OrderDispatcher::new(
            2,
            16,
            PanickingHandler {
                store: Arc::clone(&store),
            },
            Arc::clone(&logger),
        )
        .unwrap();

        dispatcher
            .submit(OrderRequest {
                product: "poison".into(),
                quantity: 1,
            })
            .unwrap();
        dispatcher
            .submit(OrderRequest {
                product: "kbd".into(),
                quantity: 5,
            })
            .unwrap();

        assert!(dispatcher.shutdown(Duration::from_secs(5)));
        logger.shutdown(Duration::from_secs(2));

        let stats = dispatcher.stats();
        assert_eq!(stats.faulted, 1);
        assert_eq!(stats.succeeded, 1);
        // The pool survived the fault and processed the sibling order.
        assert_eq!(store.snapshot().quantity("kbd"), 95);

        let events = sink.events();
        let poisoned = events
            .iter()
            .find(|e| e.product.as_deref() == Some("poison"))
            .unwrap();
        assert_eq!(poisoned.success, Some(false));
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let store = Arc::new(InventoryStore::new());
        let (_sink, logger) = test_logger();
        let dispatcher = OrderDispatcher::new(
            1,
            4,
            ImmediateHandler { store },
            Arc::clone(&logger),
        )
        .unwrap();

        dispatcher.shutdown(Duration::from_secs(2));
        let err = dispatcher.submit(OrderRequest {
            product: "kbd".into(),
            quantity: 1,
        });
        assert!(matches!(err, Err(EngineError::Shutdown)));
        logger.shutdown(Duration::from_secs(2));
    }

    #[test]
    fn test_submit_random_draws_from_catalog() {
        let store = Arc::new(InventoryStore::seeded([("a", 100u64), ("b", 100u64)]));
        let (_sink, logger) = test_logger();
        let dispatcher = OrderDispatcher::new(
            2,
            64,
            ImmediateHandler { store },
            Arc::clone(&logger),
        )
        .unwrap();

        let catalog = vec!["a".to_string(), "b".to_string()];
        for _ in 0..20 {
            let request = dispatcher.submit_random(&catalog).unwrap();
            assert!(catalog.contains(&request.product));
            assert!((1..15).contains(&request.quantity));
        }
        assert!(dispatcher.submit_random(&[]).is_err());

        dispatcher.shutdown(Duration::from_secs(5));
        logger.shutdown(Duration::from_secs(2));
    }
}
