//! Periodic stock audits.
//!
//! One dedicated thread fires after an initial delay, then at a fixed
//! period: snapshot the ledger, aggregate the snapshot on the engine's
//! rayon pool, and hand the total to the log path. Firings run
//! sequentially on this thread, so at most one is ever in flight; a slow
//! aggregation delays the next firing instead of letting work accumulate.
//!
//! The snapshot is atomic but aggregation and logging happen without
//! re-locking, so the reported total may be stale relative to concurrent
//! mutation by the time it is emitted. That relaxed consistency is
//! intentional.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::aggregate::aggregate;
use crate::logger::{AsyncLogger, LogEvent};
use crate::store::InventoryStore;
use crate::util::join::join_timeout;

/// Handle to the audit scheduler thread.
pub struct AuditScheduler {
    cancel_tx: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AuditScheduler {
    /// Start the scheduler: first firing after `initial_delay`, then every
    /// `period` until cancelled. Aggregation runs inside `pool`.
    #[must_use]
    pub fn spawn(
        store: Arc<InventoryStore>,
        leaf_threshold: usize,
        initial_delay: Duration,
        period: Duration,
        pool: Arc<rayon::ThreadPool>,
        logger: Arc<AsyncLogger>,
    ) -> Self {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("sl-audit".into())
            .spawn(move || {
                info!(?initial_delay, ?period, "audit scheduler started");

                // Interruptible initial delay.
                match cancel_rx.recv_timeout(initial_delay) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        debug!("audit scheduler cancelled before first firing");
                        return;
                    }
                }

                loop {
                    let snapshot = store.snapshot();
                    let total = pool.install(|| aggregate(&snapshot, leaf_threshold));
                    debug!(total, products = snapshot.len(), "audit firing complete");
                    logger.accept(LogEvent::audit(total));

                    match cancel_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                            debug!("audit scheduler observed cancellation");
                            break;
                        }
                    }
                }
            })
            .expect("failed to spawn audit scheduler thread");

        Self {
            cancel_tx: Mutex::new(Some(cancel_tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Cancel the scheduler and join it, waiting at most `timeout`.
    /// Returns `true` if the thread exited in time.
    pub fn stop(&self, timeout: Duration) -> bool {
        {
            let mut cancel_tx = self.cancel_tx.lock();
            *cancel_tx = None;
        }
        match self.handle.lock().take() {
            Some(handle) => join_timeout(handle, timeout, "sl-audit"),
            None => true,
        }
    }
}

impl Drop for AuditScheduler {
    fn drop(&mut self) {
        let mut cancel_tx = self.cancel_tx.lock();
        *cancel_tx = None;
    }
}
