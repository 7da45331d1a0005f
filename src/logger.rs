//! Non-blocking log path shared by all engine components.
//!
//! Producers hand [`LogEvent`]s to [`AsyncLogger::accept`] and move on;
//! nothing ever waits for emission. Events travel over an unbounded
//! channel to one consumer thread that records each event exactly once
//! into a [`LogSink`]. Ordering between different producers is not
//! guaranteed; events from a single producer keep their submission order
//! because the channel is FIFO per sender.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::util::clock::now_ms;
use crate::util::join::join_timeout;

/// Kind of operation an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// An order attempt against the ledger.
    Order,
    /// A replenishment delta.
    Replenish,
    /// A periodic stock audit.
    Audit,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order => write!(f, "order"),
            Self::Replenish => write!(f, "replenish"),
            Self::Audit => write!(f, "audit"),
        }
    }
}

/// Timestamped, structured log event.
///
/// The rendered text is a presentation detail; operation kind, product,
/// quantity delta, outcome, and audit total are all carried as fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Creation time, milliseconds since epoch.
    pub timestamp_ms: u128,
    /// Operation kind.
    pub kind: LogKind,
    /// Product the operation touched, if any.
    pub product: Option<String>,
    /// Signed quantity delta (negative for orders, positive for
    /// replenishment, 0 for audits).
    pub delta: i64,
    /// Outcome flag for order events.
    pub success: Option<bool>,
    /// Running total for audit events.
    pub total: Option<u64>,
}

impl LogEvent {
    /// Event for one order attempt.
    #[must_use]
    pub fn order(product: impl Into<String>, qty: u64, success: bool) -> Self {
        Self {
            timestamp_ms: now_ms(),
            kind: LogKind::Order,
            product: Some(product.into()),
            delta: -(qty as i64),
            success: Some(success),
            total: None,
        }
    }

    /// Event for one replenishment delta.
    #[must_use]
    pub fn replenish(product: impl Into<String>, qty: u64) -> Self {
        Self {
            timestamp_ms: now_ms(),
            kind: LogKind::Replenish,
            product: Some(product.into()),
            delta: qty as i64,
            success: None,
            total: None,
        }
    }

    /// Event for one audit total.
    #[must_use]
    pub fn audit(total: u64) -> Self {
        Self {
            timestamp_ms: now_ms(),
            kind: LogKind::Audit,
            product: None,
            delta: 0,
            success: None,
            total: Some(total),
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LogKind::Order => write!(
                f,
                "order: {} of \"{}\" -> {}",
                self.delta,
                self.product.as_deref().unwrap_or("?"),
                if self.success == Some(true) { "SUCCESS" } else { "FAILURE" },
            ),
            LogKind::Replenish => write!(
                f,
                "replenish: +{} of \"{}\"",
                self.delta,
                self.product.as_deref().unwrap_or("?"),
            ),
            LogKind::Audit => {
                write!(f, "audit: total stock {}", self.total.unwrap_or(0))
            }
        }
    }
}

/// Sink abstraction for emitted events.
pub trait LogSink: Send {
    /// Record one event. Called exactly once per accepted event, from the
    /// logger's consumer thread.
    fn record(&mut self, event: LogEvent);
}

/// Sink that emits through `tracing` (the default).
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&mut self, event: LogEvent) {
        info!(
            kind = %event.kind,
            product = event.product.as_deref(),
            delta = event.delta,
            success = event.success,
            total = event.total,
            "{event}"
        );
    }
}

/// In-memory sink with a bounded ring buffer, for tests and dev.
///
/// Cloning yields a handle to the same buffer, so a test can keep a clone
/// and inspect events recorded by the consumer thread.
#[derive(Debug, Clone)]
pub struct InMemorySink {
    events: Arc<Mutex<VecDeque<LogEvent>>>,
    max_events: usize,
}

impl InMemorySink {
    /// Create a sink retaining at most `max_events` events.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events))),
            max_events,
        }
    }

    /// Snapshot of the recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().iter().cloned().collect()
    }
}

impl LogSink for InMemorySink {
    fn record(&mut self, event: LogEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Fire-and-forget logger with a single consumer thread.
pub struct AsyncLogger {
    /// Event sender. `Option` allows clean shutdown by dropping, which
    /// lets the consumer drain the queue and exit.
    tx: Mutex<Option<Sender<LogEvent>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncLogger {
    /// Start the consumer thread recording into `sink`.
    #[must_use]
    pub fn new(mut sink: Box<dyn LogSink>) -> Self {
        let (tx, rx) = unbounded::<LogEvent>();
        let consumer = thread::Builder::new()
            .name("sl-logger".into())
            .spawn(move || {
                // Drains naturally: recv returns Err once the sender is
                // dropped and the queue is empty.
                while let Ok(event) = rx.recv() {
                    sink.record(event);
                }
                debug!("logger channel closed, consumer exiting");
            })
            .expect("failed to spawn logger thread");

        Self {
            tx: Mutex::new(Some(tx)),
            consumer: Mutex::new(Some(consumer)),
        }
    }

    /// Enqueue an event for asynchronous emission. Never blocks; events
    /// accepted after shutdown are silently dropped.
    pub fn accept(&self, event: LogEvent) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Stop the consumer after it drains pending events, waiting at most
    /// `timeout`.
    pub fn shutdown(&self, timeout: Duration) {
        {
            let mut tx = self.tx.lock();
            *tx = None;
        }
        if let Some(handle) = self.consumer.lock().take() {
            join_timeout(handle, timeout, "sl-logger");
        }
    }
}

impl Drop for AsyncLogger {
    fn drop(&mut self) {
        // Unblock the consumer; do not join in Drop.
        let mut tx = self.tx.lock();
        *tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_fields_and_rendering() {
        let e = LogEvent::order("keyboard", 5, true);
        assert_eq!(e.kind, LogKind::Order);
        assert_eq!(e.delta, -5);
        assert_eq!(format!("{e}"), "order: -5 of \"keyboard\" -> SUCCESS");

        let e = LogEvent::order("mouse", 9, false);
        assert_eq!(format!("{e}"), "order: -9 of \"mouse\" -> FAILURE");

        let e = LogEvent::replenish("screen", 3);
        assert_eq!(e.delta, 3);
        assert_eq!(format!("{e}"), "replenish: +3 of \"screen\"");

        let e = LogEvent::audit(40);
        assert_eq!(e.total, Some(40));
        assert_eq!(format!("{e}"), "audit: total stock 40");
    }

    #[test]
    fn test_each_event_emitted_exactly_once() {
        let sink = InMemorySink::new(100);
        let logger = AsyncLogger::new(Box::new(sink.clone()));

        for i in 0..20u64 {
            logger.accept(LogEvent::replenish(format!("p{i}"), i));
        }
        logger.shutdown(Duration::from_secs(2));

        let events = sink.events();
        assert_eq!(events.len(), 20);
        // Single-producer ordering holds through the FIFO channel.
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.product.as_deref(), Some(format!("p{i}").as_str()));
        }
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let sink = InMemorySink::new(3);
        let logger = AsyncLogger::new(Box::new(sink.clone()));
        for i in 0..5u64 {
            logger.accept(LogEvent::audit(i));
        }
        logger.shutdown(Duration::from_secs(2));

        let totals: Vec<u64> = sink.events().iter().filter_map(|e| e.total).collect();
        assert_eq!(totals, vec![2, 3, 4]);
    }

    #[test]
    fn test_accept_after_shutdown_is_ignored() {
        let sink = InMemorySink::new(10);
        let logger = AsyncLogger::new(Box::new(sink.clone()));
        logger.shutdown(Duration::from_secs(2));
        logger.accept(LogEvent::audit(1));
        assert!(sink.events().is_empty());
    }
}
