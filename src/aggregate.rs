//! Fork-join aggregation over an immutable snapshot.
//!
//! The aggregator computes the exact total stock across all products by
//! divide-and-conquer: ranges at or below the leaf threshold sum
//! sequentially, larger ranges split at the midpoint and run both halves
//! through `rayon::join`, combining the partial sums by addition. Because
//! the snapshot is immutable, no synchronization happens here at all;
//! correctness rests entirely on the snapshot having been captured
//! atomically by the store.

use crate::store::Snapshot;

/// Sum every quantity in `snapshot` using fork-join recursion.
///
/// `leaf_threshold` is the largest key-range length summed sequentially
/// (clamped to at least 1). The result equals the plain sequential sum for
/// any threshold, since integer addition is associative and commutative.
/// Keys absent from the snapshot contribute 0.
#[must_use]
pub fn aggregate(snapshot: &Snapshot, leaf_threshold: usize) -> u64 {
    sum_range(snapshot, snapshot.keys(), leaf_threshold.max(1))
}

fn sum_range(snapshot: &Snapshot, keys: &[String], leaf_threshold: usize) -> u64 {
    if keys.len() <= leaf_threshold {
        return keys.iter().map(|k| snapshot.quantity(k)).sum();
    }
    let (left, right) = keys.split_at(keys.len() / 2);
    let (a, b) = rayon::join(
        || sum_range(snapshot, left, leaf_threshold),
        || sum_range(snapshot, right, leaf_threshold),
    );
    a + b
}
