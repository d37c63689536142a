//! Per-queue metrics: lock-free atomic counters behind an insert-on-first-use
//! registry, plus serializable snapshots for `get_metrics`/`get_queue_status`.

use crate::entry::QueueName;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct QueueCounters {
    pub messages_sent: AtomicU64,
    pub messages_failed: AtomicU64,
    pub buffer_overflow_count: AtomicU64,
    pub retry_exhausted_count: AtomicU64,
    pub batch_split_count: AtomicU64,
    pub oversized_message_dropped: AtomicU64,
}

impl QueueCounters {
    fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_failed: self.messages_failed.load(Ordering::Relaxed),
            buffer_overflow_count: self.buffer_overflow_count.load(Ordering::Relaxed),
            retry_exhausted_count: self.retry_exhausted_count.load(Ordering::Relaxed),
            batch_split_count: self.batch_split_count.load(Ordering::Relaxed),
            oversized_message_dropped: self.oversized_message_dropped.load(Ordering::Relaxed),
        }
    }
}

/// A consistent-per-queue snapshot of one queue's counters.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct QueueMetricsSnapshot {
    pub messages_sent: u64,
    pub messages_failed: u64,
    pub buffer_overflow_count: u64,
    pub retry_exhausted_count: u64,
    pub batch_split_count: u64,
    pub oversized_message_dropped: u64,
}

/// Snapshot of every known queue's counters plus the background worker's
/// liveness flag.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub per_queue: HashMap<String, QueueMetricsSnapshot>,
    pub background_thread_alive: bool,
}

/// Registry of per-queue counters, created lazily on first reference to a
/// queue name.
#[derive(Default)]
pub(crate) struct MetricsRegistry {
    queues: RwLock<HashMap<QueueName, Arc<QueueCounters>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters_for(&self, queue: &QueueName) -> Arc<QueueCounters> {
        if let Some(existing) = self.queues.read().get(queue) {
            return existing.clone();
        }
        let mut write = self.queues.write();
        write
            .entry(queue.clone())
            .or_insert_with(|| Arc::new(QueueCounters::default()))
            .clone()
    }

    pub fn snapshot(&self, alive: bool) -> MetricsSnapshot {
        let per_queue = self
            .queues
            .read()
            .iter()
            .map(|(name, counters)| (name.as_str().to_string(), counters.snapshot()))
            .collect();
        MetricsSnapshot {
            per_queue,
            background_thread_alive: alive,
        }
    }

    pub fn snapshot_queue(&self, queue: &QueueName) -> QueueMetricsSnapshot {
        self.counters_for(queue).snapshot()
    }

    pub fn known_queues(&self) -> Vec<QueueName> {
        self.queues.read().keys().cloned().collect()
    }
}
