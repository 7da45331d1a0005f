//! Thread-safe stock ledger and point-in-time snapshots.
//!
//! The ledger is the only mutable state shared across engine components.
//! It is reachable exclusively through [`InventoryStore::add`],
//! [`InventoryStore::remove`], and [`InventoryStore::snapshot`]; the raw
//! map is never exposed. A single `parking_lot::Mutex` guards all three
//! operations, so every mutation and every snapshot observes the ledger
//! at exactly one valid serialization point. Hold time is O(1) per call
//! and nothing sleeps or does I/O under the guard.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

/// Immutable point-in-time copy of the inventory.
///
/// A snapshot never changes after capture and does not observe mutations
/// that happen later; it is the sole input of the parallel aggregator.
/// Key order is fixed (sorted) so that split points are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    quantities: HashMap<String, u64>,
    keys: Vec<String>,
}

impl Snapshot {
    /// Quantity recorded for `product`; unknown products count as 0.
    #[must_use]
    pub fn quantity(&self, product: &str) -> u64 {
        self.quantities.get(product).copied().unwrap_or(0)
    }

    /// Product names in sorted order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Number of distinct products captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if the snapshot captured an empty ledger.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Shared product→quantity ledger guarded by one mutex.
#[derive(Debug, Default)]
pub struct InventoryStore {
    ledger: Mutex<HashMap<String, u64>>,
}

impl InventoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with an initial catalog.
    pub fn seeded<I, S>(catalog: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut ledger = store.ledger.lock();
            for (product, qty) in catalog {
                *ledger.entry(product.into()).or_insert(0) += qty;
            }
        }
        store
    }

    /// Add `qty` units of `product`. Always succeeds; an absent product
    /// starts at 0.
    pub fn add(&self, product: &str, qty: u64) {
        let mut ledger = self.ledger.lock();
        let entry = ledger.entry(product.to_owned()).or_insert(0);
        *entry = entry.saturating_add(qty);
        debug!(product, qty, level = *entry, "stock added");
    }

    /// Remove `qty` units of `product` if available.
    ///
    /// Returns `true` and decrements iff the current quantity is at least
    /// `qty`; otherwise returns `false` and leaves the ledger unchanged.
    /// The check and the decrement happen inside one critical section, so
    /// no concurrent observer ever sees an intermediate state and the
    /// quantity can never go negative. An unknown product counts as 0.
    #[must_use]
    pub fn remove(&self, product: &str, qty: u64) -> bool {
        let mut ledger = self.ledger.lock();
        let available = ledger.get(product).copied().unwrap_or(0);
        if available >= qty {
            ledger.insert(product.to_owned(), available - qty);
            debug!(product, qty, level = available - qty, "stock removed");
            true
        } else {
            debug!(product, qty, available, "stock removal refused");
            false
        }
    }

    /// Capture an immutable snapshot of the entire ledger.
    ///
    /// The copy is taken under the same guard as `add`/`remove`, so it
    /// reflects exactly one valid serialization point relative to
    /// concurrent mutation.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let quantities = self.ledger.lock().clone();
        let mut keys: Vec<String> = quantities.keys().cloned().collect();
        keys.sort_unstable();
        Snapshot { quantities, keys }
    }
}
