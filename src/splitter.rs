//! Batch Splitter: partitions a buffer drain into sendable sub-batches.

use crate::entry::Entry;
use crate::size::{entry_bytes, over_entry_cap, MAX_BATCH_BYTES, MAX_BATCH_COUNT};

/// Output of [`split`]: sub-batches ready to hand to `BatchSender`, plus
/// entries that individually exceed the per-message cap and will never be
/// sendable.
pub struct SplitOutcome {
    pub sub_batches: Vec<Vec<Entry>>,
    pub oversized: Vec<Entry>,
}

/// Greedy, order-preserving split of `entries` into sub-batches honoring
/// the count cap (`MAX_BATCH_COUNT`) and byte cap (`max_batch_bytes`).
///
/// Guarantees: order is preserved within each output; every sub-batch
/// satisfies `len <= MAX_BATCH_COUNT` and `sum(entry_bytes) <=
/// max_batch_bytes`; each input entry appears exactly once across
/// `sub_batches` and `oversized`.
pub fn split(entries: Vec<Entry>, max_entry_bytes: usize, max_batch_bytes: usize) -> SplitOutcome {
    let mut sub_batches = Vec::new();
    let mut oversized = Vec::new();

    let mut current: Vec<Entry> = Vec::new();
    let mut current_bytes = 0usize;

    for entry in entries {
        if over_entry_cap(&entry, max_entry_bytes) {
            oversized.push(entry);
            continue;
        }

        let bytes = entry_bytes(&entry);
        let would_overflow_count = current.len() == MAX_BATCH_COUNT;
        let would_overflow_bytes = current_bytes + bytes > max_batch_bytes;

        if !current.is_empty() && (would_overflow_count || would_overflow_bytes) {
            sub_batches.push(std::mem::take(&mut current));
            current_bytes = 0;
        }

        current_bytes += bytes;
        current.push(entry);
    }

    if !current.is_empty() {
        sub_batches.push(current);
    }

    SplitOutcome {
        sub_batches,
        oversized,
    }
}

/// Convenience wrapper using the fixed SQS-style caps.
pub fn split_default(entries: Vec<Entry>) -> SplitOutcome {
    split(entries, crate::size::MAX_ENTRY_BYTES, MAX_BATCH_BYTES)
}
