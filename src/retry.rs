//! Retry Queue (§4.E): per-queue failed entries gated by exponential
//! backoff, promoted back onto the buffer once eligible.
//!
//! `retry_count` must survive a full waiting -> promoted -> redispatched ->
//! failed-again cycle (see S6 in the spec), even though the entry itself
//! leaves the waiting list the moment it is promoted. A small `history` map
//! keyed by entry id carries the count across that gap; it is cleared on
//! final success ([`RetryQueue::forget`]) or on exhaustion.

use crate::clock::ClockRef;
use crate::entry::Entry;
use std::collections::HashMap;
use std::time::Instant;

/// A previously-failed entry awaiting re-send eligibility.
#[derive(Debug, Clone)]
pub struct FailedMessage {
    pub entry: Entry,
    pub retry_count: u32,
    pub first_failure_at: Instant,
    pub last_failure_at: Instant,
}

impl FailedMessage {
    /// `elapsed(last_failure_at) >= 2^retry_count` seconds.
    fn is_eligible(&self, now: Instant) -> bool {
        let wait = 2u64.saturating_pow(self.retry_count);
        now.saturating_duration_since(self.last_failure_at) >= std::time::Duration::from_secs(wait)
    }
}

#[derive(Clone, Copy)]
struct RetryHistory {
    retry_count: u32,
    first_failure_at: Instant,
}

/// Outcome of [`RetryQueue::record_failures`]: how many entries were dropped
/// for exceeding `max_retry_attempts`, for the caller to fold into metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFailuresOutcome {
    pub exhausted: usize,
}

struct RetryInner {
    waiting: Vec<FailedMessage>,
    /// Retry counts for entries that failed before but are not currently
    /// waiting in this queue (i.e. they were promoted back to the buffer
    /// and are in flight again).
    history: HashMap<String, RetryHistory>,
}

pub(crate) struct RetryQueue {
    inner: parking_lot::Mutex<RetryInner>,
    max_retry_attempts: u32,
    clock: ClockRef,
}

impl RetryQueue {
    pub fn new(max_retry_attempts: u32, clock: ClockRef) -> Self {
        Self {
            inner: parking_lot::Mutex::new(RetryInner {
                waiting: Vec::new(),
                history: HashMap::new(),
            }),
            max_retry_attempts,
            clock,
        }
    }

    /// Record a set of just-failed entries. Identity is by `Entry.id`,
    /// looked up first among entries still waiting in this queue, then
    /// among entries whose retry history survives from an earlier
    /// promote/redispatch cycle. If neither has a record, the failure is
    /// the first for this id and `retry_count` becomes 1. Entries whose
    /// post-increment `retry_count > max_retry_attempts` are dropped and
    /// counted as exhausted.
    pub fn record_failures(&self, failures: Vec<Entry>) -> RecordFailuresOutcome {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let mut exhausted = 0;

        for entry in failures {
            if let Some(existing) = inner.waiting.iter_mut().find(|m| m.entry.id == entry.id) {
                existing.retry_count += 1;
                existing.last_failure_at = now;
                existing.entry = entry;
                if existing.retry_count > self.max_retry_attempts {
                    let id = existing.entry.id.clone();
                    inner.waiting.retain(|m| m.entry.id != id);
                    exhausted += 1;
                }
                continue;
            }

            let (retry_count, first_failure_at) = match inner.history.remove(&entry.id) {
                Some(h) => (h.retry_count + 1, h.first_failure_at),
                None => (1, now),
            };

            if retry_count > self.max_retry_attempts {
                exhausted += 1;
                continue;
            }

            inner.waiting.push(FailedMessage {
                entry,
                retry_count,
                first_failure_at,
                last_failure_at: now,
            });
        }

        RecordFailuresOutcome { exhausted }
    }

    /// Remove and return every [`FailedMessage`] whose backoff has elapsed.
    /// The caller (the queue's re-entry into the buffer) decides what
    /// happens next: [`RetryQueue::mark_in_flight`] on success,
    /// [`RetryQueue::return_to_waiting`] if the buffer had no room.
    /// Entries remaining ineligible stay untouched in the waiting list.
    pub fn promote_ready(&self) -> Vec<FailedMessage> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let mut ready = Vec::new();

        let mut i = 0;
        while i < inner.waiting.len() {
            if inner.waiting[i].is_eligible(now) {
                ready.push(inner.waiting.remove(i));
            } else {
                i += 1;
            }
        }

        ready
    }

    /// Record that a promoted message successfully re-entered the buffer,
    /// carrying its retry count forward so a subsequent failure continues
    /// counting instead of resetting.
    pub fn mark_in_flight(&self, msg: FailedMessage) {
        self.inner.lock().history.insert(
            msg.entry.id.clone(),
            RetryHistory {
                retry_count: msg.retry_count,
                first_failure_at: msg.first_failure_at,
            },
        );
    }

    /// Put a promoted message back into the waiting list unchanged, because
    /// the buffer had no room for it. Overflow on re-entry is transient,
    /// not a failure, and does not bump `retry_count`.
    pub fn return_to_waiting(&self, msg: FailedMessage) {
        self.inner.lock().waiting.push(msg);
    }

    /// Forget an id's retry history, e.g. after it is finally sent
    /// successfully. Frees the id for reuse by an unrelated future entry.
    pub fn forget(&self, id: &str) {
        self.inner.lock().history.remove(id);
    }

    /// Number of entries currently waiting on backoff (does not include
    /// entries whose history survives while they are back in the buffer).
    pub fn len(&self) -> usize {
        self.inner.lock().waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically empty the retry queue (waiting entries and history),
    /// returning how many waiting entries were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let n = inner.waiting.len();
        inner.waiting.clear();
        inner.history.clear();
        n
    }
}
