//! Per-Queue Buffer (§4.D): an ordered FIFO of pending entries, linearizable
//! under concurrent callers via a single `parking_lot::Mutex`.

use crate::clock::ClockRef;
use crate::entry::Entry;
use std::collections::VecDeque;
use std::time::Instant;

/// Outcome of [`Buffer::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    RejectedBufferFull,
}

struct BufferInner {
    entries: VecDeque<Entry>,
    last_enqueue_at: Option<Instant>,
    first_enqueue_at_since_empty: Option<Instant>,
}

/// A single queue's pending-entry FIFO plus the timing metadata the Flush
/// Decider reads.
pub(crate) struct Buffer {
    inner: parking_lot::Mutex<BufferInner>,
    cap: usize,
    clock: ClockRef,
}

/// A point-in-time read of the fields the Flush Decider needs, taken under
/// the buffer lock in one shot so the decision is made against a consistent
/// view.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BufferSnapshot {
    pub len: usize,
    pub last_enqueue_at: Option<Instant>,
    pub first_enqueue_at_since_empty: Option<Instant>,
}

impl Buffer {
    pub fn new(cap: usize, clock: ClockRef) -> Self {
        Self {
            inner: parking_lot::Mutex::new(BufferInner {
                entries: VecDeque::new(),
                last_enqueue_at: None,
                first_enqueue_at_since_empty: None,
            }),
            cap,
            clock,
        }
    }

    /// Append `entry` to the tail. Rejects if already at `cap`.
    pub fn enqueue(&self, entry: Entry) -> EnqueueOutcome {
        let mut inner = self.inner.lock();
        if inner.entries.len() >= self.cap {
            return EnqueueOutcome::RejectedBufferFull;
        }

        let now = self.clock.now();
        if inner.entries.is_empty() {
            inner.first_enqueue_at_since_empty = Some(now);
        }
        inner.entries.push_back(entry);
        inner.last_enqueue_at = Some(now);
        EnqueueOutcome::Accepted
    }

    /// Re-insert `entry` at the tail without updating `last_enqueue_at`'s
    /// semantics as a "new application enqueue"; used only by retry
    /// promotion, which per §4.E treats buffer-full as a transient
    /// condition, not a failure.
    pub fn reinsert(&self, entry: Entry) -> EnqueueOutcome {
        self.enqueue(entry)
    }

    /// Remove and return up to `n` entries from the head.
    pub fn drain_head(&self, n: usize) -> Vec<Entry> {
        let mut inner = self.inner.lock();
        let take = n.min(inner.entries.len());
        let drained: Vec<Entry> = inner.entries.drain(..take).collect();
        if inner.entries.is_empty() {
            inner.first_enqueue_at_since_empty = None;
        }
        drained
    }

    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Atomically empty the buffer, returning how many entries were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let n = inner.entries.len();
        inner.entries.clear();
        inner.first_enqueue_at_since_empty = None;
        n
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        let inner = self.inner.lock();
        BufferSnapshot {
            len: inner.entries.len(),
            last_enqueue_at: inner.last_enqueue_at,
            first_enqueue_at_since_empty: inner.first_enqueue_at_since_empty,
        }
    }
}
