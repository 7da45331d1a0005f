//! Continuous stock replenishment.
//!
//! A long-lived thread that each cycle picks one product uniformly at
//! random from the fixed catalog, adds a uniform random quantity, emits a
//! replenish log event, then pauses for the configured interval. The
//! pause is an interruptible wait on a cancellation channel, so the agent
//! observes cancellation within one interval and performs no further
//! mutation afterwards.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::logger::{AsyncLogger, LogEvent};
use crate::store::InventoryStore;
use crate::util::join::join_timeout;

/// Handle to the replenishment thread.
pub struct ReplenishmentAgent {
    /// Cancellation channel. Dropping the sender wakes the agent's pause
    /// immediately.
    cancel_tx: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReplenishmentAgent {
    /// Start the agent. Quantities are drawn uniformly from
    /// `[qty_min, qty_max)`.
    #[must_use]
    pub fn spawn(
        store: Arc<InventoryStore>,
        catalog: Vec<String>,
        qty_min: u64,
        qty_max: u64,
        interval: Duration,
        logger: Arc<AsyncLogger>,
    ) -> Self {
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        // Keep the half-open range non-empty even if callers bypass
        // config validation.
        let qty_max = qty_max.max(qty_min + 1);

        let handle = thread::Builder::new()
            .name("sl-replenish".into())
            .spawn(move || {
                if catalog.is_empty() {
                    warn!("replenishment agent started with empty catalog, exiting");
                    return;
                }
                info!(products = catalog.len(), "replenishment agent started");

                loop {
                    let (product, qty) = {
                        let mut rng = rand::rng();
                        let product = catalog
                            .choose(&mut rng)
                            .cloned()
                            .unwrap_or_default();
                        (product, rng.random_range(qty_min..qty_max))
                    };

                    store.add(&product, qty);
                    logger.accept(LogEvent::replenish(product, qty));

                    // Interruptible pause: a cancellation (message or
                    // sender drop) ends the loop before the next add.
                    match cancel_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                            debug!("replenishment agent observed cancellation");
                            break;
                        }
                    }
                }
            })
            .expect("failed to spawn replenishment thread");

        Self {
            cancel_tx: Mutex::new(Some(cancel_tx)),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Cancel the agent and join it, waiting at most `timeout`. Returns
    /// `true` if the thread exited in time.
    pub fn stop(&self, timeout: Duration) -> bool {
        {
            let mut cancel_tx = self.cancel_tx.lock();
            *cancel_tx = None;
        }
        match self.handle.lock().take() {
            Some(handle) => join_timeout(handle, timeout, "sl-replenish"),
            None => true,
        }
    }
}

impl Drop for ReplenishmentAgent {
    fn drop(&mut self) {
        let mut cancel_tx = self.cancel_tx.lock();
        *cancel_tx = None;
    }
}
