//! Flush Decider (§4.F): pure predicate over a queue's buffer snapshot and
//! resolved config deciding whether *now* is the moment to flush.

use crate::buffer::BufferSnapshot;
use crate::config::PerQueueConfig;
use std::time::{Duration, Instant};

/// Inputs to [`should_flush`] beyond the buffer snapshot and config.
#[derive(Debug, Clone, Copy)]
pub struct FlushContext {
    pub force_flush_pending: bool,
    pub shutting_down: bool,
}

/// `should_flush(Q, now)` is true iff at least one of the five triggers in
/// §4.F fires. A config value of `Duration::ZERO` for an interval collapses
/// that trigger to "fire immediately on any non-empty buffer."
pub fn should_flush(
    snapshot: BufferSnapshot,
    config: PerQueueConfig,
    batch_size_cap: usize,
    now: Instant,
    ctx: FlushContext,
) -> bool {
    if snapshot.len >= batch_size_cap {
        return true; // full-batch trigger
    }

    if let Some(first) = snapshot.first_enqueue_at_since_empty {
        if elapsed_at_least(now, first, config.batch_interval) {
            return true; // max-wait trigger
        }
    }

    if snapshot.len > 0 {
        if let Some(last) = snapshot.last_enqueue_at {
            if elapsed_at_least(now, last, config.idle_timeout) {
                return true; // quiescence trigger
            }
        }
    }

    if ctx.force_flush_pending {
        return true;
    }

    if ctx.shutting_down && snapshot.len > 0 {
        return true;
    }

    false
}

fn elapsed_at_least(now: Instant, since: Instant, threshold: Duration) -> bool {
    if threshold == Duration::ZERO {
        return true;
    }
    now.saturating_duration_since(since) >= threshold
}

/// Earliest instant at which any timer-based trigger (max-wait or
/// quiescence) could next fire for this queue, used by the Scheduler Loop
/// to size its sleep. `None` means no timer is currently armed (empty
/// buffer, no pending force-flush).
pub fn next_deadline(snapshot: BufferSnapshot, config: PerQueueConfig) -> Option<Instant> {
    if snapshot.len == 0 {
        return None;
    }

    let interval_deadline = snapshot
        .first_enqueue_at_since_empty
        .map(|first| first + config.batch_interval);
    let idle_deadline = snapshot.last_enqueue_at.map(|last| last + config.idle_timeout);

    match (interval_deadline, idle_deadline) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}
