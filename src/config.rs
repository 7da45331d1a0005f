//! Engine configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tuning knobs for the inventory engine.
///
/// Every field has a sensible default; hosts usually start from
/// [`EngineConfig::default`] and override with the `with_*` builders, a
/// JSON document, or `STOCK_LEDGER_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of dedicated order-worker threads (bounds concurrent order
    /// processing).
    pub worker_pool_size: usize,
    /// Maximum orders queued while all workers are busy; submissions
    /// beyond this are rejected with `QueueFull`.
    pub max_pending_orders: usize,
    /// Lower bound of the simulated per-order latency, milliseconds.
    pub order_delay_min_ms: u64,
    /// Upper bound of the simulated per-order latency, milliseconds.
    pub order_delay_max_ms: u64,
    /// Smallest replenishment delta (inclusive).
    pub replenish_qty_min: u64,
    /// Largest replenishment delta (exclusive).
    pub replenish_qty_max: u64,
    /// Pause between replenishment cycles, milliseconds.
    pub replenish_interval_ms: u64,
    /// Delay before the first audit firing, milliseconds.
    pub schedule_initial_delay_ms: u64,
    /// Period between audit firings, milliseconds.
    pub schedule_period_ms: u64,
    /// Largest key range the aggregator sums sequentially.
    pub aggregation_leaf_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 4,
            max_pending_orders: 64,
            order_delay_min_ms: 200,
            order_delay_max_ms: 1000,
            replenish_qty_min: 1,
            replenish_qty_max: 10,
            replenish_interval_ms: 1500,
            schedule_initial_delay_ms: 2000,
            schedule_period_ms: 5000,
            aggregation_leaf_threshold: 2,
        }
    }
}

impl EngineConfig {
    /// Configuration with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker pool size.
    #[must_use]
    pub fn with_worker_pool_size(mut self, n: usize) -> Self {
        self.worker_pool_size = n;
        self
    }

    /// Set the pending-order queue depth.
    #[must_use]
    pub fn with_max_pending_orders(mut self, n: usize) -> Self {
        self.max_pending_orders = n;
        self
    }

    /// Set the simulated per-order latency range in milliseconds.
    #[must_use]
    pub fn with_order_delay_ms(mut self, min: u64, max: u64) -> Self {
        self.order_delay_min_ms = min;
        self.order_delay_max_ms = max;
        self
    }

    /// Set the replenishment quantity range (`min` inclusive, `max`
    /// exclusive).
    #[must_use]
    pub fn with_replenish_qty(mut self, min: u64, max: u64) -> Self {
        self.replenish_qty_min = min;
        self.replenish_qty_max = max;
        self
    }

    /// Set the pause between replenishment cycles, milliseconds.
    #[must_use]
    pub fn with_replenish_interval_ms(mut self, ms: u64) -> Self {
        self.replenish_interval_ms = ms;
        self
    }

    /// Set the audit cadence: initial delay and period, milliseconds.
    #[must_use]
    pub fn with_schedule_ms(mut self, initial_delay: u64, period: u64) -> Self {
        self.schedule_initial_delay_ms = initial_delay;
        self.schedule_period_ms = period;
        self
    }

    /// Set the aggregator's sequential base-case size.
    #[must_use]
    pub fn with_aggregation_leaf_threshold(mut self, n: usize) -> Self {
        self.aggregation_leaf_threshold = n;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_pool_size == 0 {
            return Err("worker_pool_size must be greater than 0".into());
        }
        if self.max_pending_orders == 0 {
            return Err("max_pending_orders must be greater than 0".into());
        }
        if self.order_delay_min_ms > self.order_delay_max_ms {
            return Err("order_delay_min_ms must not exceed order_delay_max_ms".into());
        }
        if self.replenish_qty_min == 0 {
            return Err("replenish_qty_min must be greater than 0".into());
        }
        if self.replenish_qty_min >= self.replenish_qty_max {
            return Err("replenish_qty_max must exceed replenish_qty_min".into());
        }
        if self.replenish_interval_ms == 0 {
            return Err("replenish_interval_ms must be greater than 0".into());
        }
        if self.schedule_period_ms == 0 {
            return Err("schedule_period_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `STOCK_LEDGER_*` environment variables on
    /// top of the defaults; a `.env` file is honored if present.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();
        read_env("STOCK_LEDGER_WORKER_POOL_SIZE", &mut cfg.worker_pool_size)?;
        read_env("STOCK_LEDGER_MAX_PENDING_ORDERS", &mut cfg.max_pending_orders)?;
        read_env("STOCK_LEDGER_ORDER_DELAY_MIN_MS", &mut cfg.order_delay_min_ms)?;
        read_env("STOCK_LEDGER_ORDER_DELAY_MAX_MS", &mut cfg.order_delay_max_ms)?;
        read_env("STOCK_LEDGER_REPLENISH_QTY_MIN", &mut cfg.replenish_qty_min)?;
        read_env("STOCK_LEDGER_REPLENISH_QTY_MAX", &mut cfg.replenish_qty_max)?;
        read_env("STOCK_LEDGER_REPLENISH_INTERVAL_MS", &mut cfg.replenish_interval_ms)?;
        read_env(
            "STOCK_LEDGER_SCHEDULE_INITIAL_DELAY_MS",
            &mut cfg.schedule_initial_delay_ms,
        )?;
        read_env("STOCK_LEDGER_SCHEDULE_PERIOD_MS", &mut cfg.schedule_period_ms)?;
        read_env(
            "STOCK_LEDGER_AGGREGATION_LEAF_THRESHOLD",
            &mut cfg.aggregation_leaf_threshold,
        )?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn read_env<T: FromStr>(key: &str, slot: &mut T) -> Result<(), String> {
    match std::env::var(key) {
        Ok(raw) => {
            *slot = raw.parse().map_err(|_| format!("{key}: cannot parse `{raw}`"))?;
            Ok(())
        }
        Err(_) => Ok(()),
    }
}
