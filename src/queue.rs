//! Per-queue state: buffer, retry queue, metrics and force-flush flag bound
//! together behind one [`QueueState`], created lazily on first reference to
//! a `QueueName`.

use crate::buffer::{Buffer, EnqueueOutcome};
use crate::clock::ClockRef;
use crate::config::{GlobalConfig, PerQueueConfig};
use crate::entry::{Entry, QueueName};
use crate::flush::{self, FlushContext};
use crate::metrics::{MetricsRegistry, QueueCounters};
use crate::retry::RetryQueue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub(crate) struct QueueState {
    pub name: QueueName,
    pub config: PerQueueConfig,
    pub batch_size_cap: usize,
    pub buffer: Buffer,
    pub retry: RetryQueue,
    pub counters: Arc<QueueCounters>,
    force_flush: AtomicBool,
}

impl QueueState {
    fn new(
        name: QueueName,
        global: &GlobalConfig,
        counters: Arc<QueueCounters>,
        clock: ClockRef,
    ) -> Self {
        let config = global.resolve(&name);
        Self {
            buffer: Buffer::new(global.max_buffer_size_per_queue, clock.clone()),
            retry: RetryQueue::new(global.max_retry_attempts, clock),
            counters,
            force_flush: AtomicBool::new(false),
            batch_size_cap: global.batch_size_cap,
            name,
            config,
        }
    }

    pub fn request_force_flush(&self) {
        self.force_flush.store(true, Ordering::Release);
    }

    fn take_force_flush(&self) -> bool {
        self.force_flush.swap(false, Ordering::AcqRel)
    }

    pub fn enqueue(&self, entry: Entry) -> EnqueueOutcome {
        let outcome = self.buffer.enqueue(entry);
        if outcome == EnqueueOutcome::RejectedBufferFull {
            self.counters.buffer_overflow_count.fetch_add(1, Ordering::Relaxed);
        }
        outcome
    }

    /// Pull every retry entry whose backoff has elapsed back onto the
    /// buffer. Overflow on re-entry is transient, not a failure, and is not
    /// reflected in `buffer_overflow_count`; such entries simply remain in
    /// the retry queue's waiting list, unchanged, to try again next tick.
    pub fn promote_ready(&self) {
        for msg in self.retry.promote_ready() {
            if self.buffer.reinsert(msg.entry.clone()) == EnqueueOutcome::RejectedBufferFull {
                self.retry.return_to_waiting(msg);
            } else {
                self.retry.mark_in_flight(msg);
            }
        }
    }

    pub fn should_flush(&self, now: Instant, shutting_down: bool) -> bool {
        let snapshot = self.buffer.snapshot();
        let ctx = FlushContext {
            force_flush_pending: self.force_flush.load(Ordering::Acquire),
            shutting_down,
        };
        flush::should_flush(snapshot, self.config, self.batch_size_cap, now, ctx)
    }

    /// Consumes the pending force-flush flag; call once a flush for this
    /// tick has actually been decided, so a single force request triggers
    /// exactly one flush.
    pub fn consume_force_flush(&self) {
        self.take_force_flush();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        flush::next_deadline(self.buffer.snapshot(), self.config)
    }

    pub fn clear(&self) -> usize {
        self.buffer.clear() + self.retry.clear()
    }

    pub fn is_drained(&self) -> bool {
        self.buffer.size() == 0 && self.retry.is_empty()
    }
}

/// Registry of all known queues (ever enqueued to, or with non-empty retry
/// state, or a pending force-flush), created on first use.
pub(crate) struct QueueRegistry {
    queues: RwLock<HashMap<QueueName, Arc<QueueState>>>,
    global: Arc<GlobalConfig>,
    metrics: Arc<MetricsRegistry>,
    clock: ClockRef,
}

impl QueueRegistry {
    pub fn new(global: Arc<GlobalConfig>, metrics: Arc<MetricsRegistry>, clock: ClockRef) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            global,
            metrics,
            clock,
        }
    }

    pub fn get_or_create(&self, name: &QueueName) -> Arc<QueueState> {
        if let Some(existing) = self.queues.read().get(name) {
            return existing.clone();
        }
        let mut write = self.queues.write();
        write
            .entry(name.clone())
            .or_insert_with(|| {
                let counters = self.metrics.counters_for(name);
                Arc::new(QueueState::new(name.clone(), &self.global, counters, self.clock.clone()))
            })
            .clone()
    }

    pub fn known_queues(&self) -> Vec<Arc<QueueState>> {
        self.queues.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FakeClock;
    use crate::config::GlobalConfigBuilder;

    fn registry() -> (QueueRegistry, FakeClock) {
        let clock = FakeClock::new();
        let global = Arc::new(GlobalConfigBuilder::new("ns-").build());
        let metrics = Arc::new(MetricsRegistry::new());
        (
            QueueRegistry::new(global, metrics, Arc::new(clock.clone())),
            clock,
        )
    }

    #[test]
    fn get_or_create_returns_same_instance_for_same_name() {
        let (registry, _clock) = registry();
        let name = QueueName::new("orders");
        let a = registry.get_or_create(&name);
        let b = registry.get_or_create(&name);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn buffer_overflow_increments_metric() {
        let clock = FakeClock::new();
        let global = Arc::new(GlobalConfigBuilder::new("ns-").max_buffer_size_per_queue(1).build());
        let metrics = Arc::new(MetricsRegistry::new());
        let registry = QueueRegistry::new(global, metrics.clone(), Arc::new(clock));
        let name = QueueName::new("orders");
        let q = registry.get_or_create(&name);

        assert_eq!(q.enqueue(Entry::new("a", "x")), EnqueueOutcome::Accepted);
        assert_eq!(q.enqueue(Entry::new("b", "x")), EnqueueOutcome::RejectedBufferFull);

        let snap = metrics.snapshot_queue(&name);
        assert_eq!(snap.buffer_overflow_count, 1);
    }
}
