//! Admin Surface (§4.I) and Lifecycle (§4.J): the public handle applications
//! hold onto: `enqueue`, the flush/inspection surface, and `close`.

use crate::clock::{Clock, ClockRef, MonotonicClock};
use crate::config::{GlobalConfig, GlobalConfigBuilder};
use crate::dispatch;
use crate::entry::{Entry, QueueName};
use crate::error::EnqueueError;
use crate::metrics::{MetricsRegistry, MetricsSnapshot, QueueMetricsSnapshot};
use crate::queue::QueueRegistry;
use crate::scheduler::{self, SchedulerSignal};
use crate::sender::BatchSender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Builder for a [`Broker`], mirroring the rest of the corpus's
/// `*Builder` -> `build()` shape.
#[must_use = "builders do nothing unless you call .build()"]
pub struct BrokerBuilder {
    config: GlobalConfigBuilder,
    sender: Arc<dyn BatchSender>,
    clock: ClockRef,
}

impl BrokerBuilder {
    pub fn new(namespace: impl Into<String>, sender: Arc<dyn BatchSender>) -> Self {
        Self {
            config: GlobalConfigBuilder::new(namespace),
            sender,
            clock: Arc::new(MonotonicClock),
        }
    }

    /// Replace the default production clock, e.g. with a test double.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Apply further configuration to the underlying [`GlobalConfigBuilder`].
    pub fn configure(mut self, f: impl FnOnce(GlobalConfigBuilder) -> GlobalConfigBuilder) -> Self {
        self.config = f(self.config);
        self
    }

    /// Build the broker and spawn its background scheduler task.
    pub fn build(self) -> Broker {
        let global = Arc::new(self.config.build());
        let metrics = Arc::new(MetricsRegistry::new());
        let registry = Arc::new(QueueRegistry::new(global.clone(), metrics.clone(), self.clock.clone()));
        let signal = Arc::new(SchedulerSignal::new());
        let worker_alive = Arc::new(AtomicBool::new(true));

        let handle = tokio::spawn({
            let registry = registry.clone();
            let sender = self.sender.clone();
            let global = global.clone();
            let clock = self.clock.clone();
            let signal = signal.clone();
            let worker_alive = worker_alive.clone();
            async move {
                scheduler::run(registry, sender, global, clock, signal).await;
                worker_alive.store(false, Ordering::Release);
            }
        });

        Broker {
            global,
            registry,
            metrics,
            sender: self.sender,
            clock: self.clock,
            signal,
            worker_alive,
            worker: parking_lot::Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        }
    }
}

/// The batching producer's public handle. Cheap to share (hold behind an
/// `Arc`); every method takes `&self`.
pub struct Broker {
    global: Arc<GlobalConfig>,
    registry: Arc<QueueRegistry>,
    metrics: Arc<MetricsRegistry>,
    sender: Arc<dyn BatchSender>,
    clock: ClockRef,
    signal: Arc<SchedulerSignal>,
    worker_alive: Arc<AtomicBool>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Broker {
    pub fn builder(namespace: impl Into<String>, sender: Arc<dyn BatchSender>) -> BrokerBuilder {
        BrokerBuilder::new(namespace, sender)
    }

    /// Enqueue one entry onto `queue`'s buffer.
    pub fn enqueue(&self, queue: impl Into<QueueName>, entry: Entry) -> Result<(), EnqueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EnqueueError::Closed);
        }

        let queue = queue.into();
        let state = self.registry.get_or_create(&queue);
        match state.enqueue(entry) {
            crate::buffer::EnqueueOutcome::Accepted => {
                self.signal.wake();
                Ok(())
            }
            crate::buffer::EnqueueOutcome::RejectedBufferFull => Err(EnqueueError::BufferFull {
                queue: queue.as_str().to_string(),
            }),
        }
    }

    /// Request an out-of-cycle flush of `queue` on the next scheduler tick.
    pub fn force_flush(&self, queue: impl Into<QueueName>) {
        let state = self.registry.get_or_create(&queue.into());
        state.request_force_flush();
        self.signal.wake();
    }

    /// Synchronously drain and dispatch every known queue, repeatedly, until
    /// none has anything left to send or retry, used by `close` and
    /// available directly for callers that want a synchronous drain point.
    pub async fn flush_all(&self) {
        let residual = self.drain_all_queues().await;
        if residual > 0 {
            tracing::warn!(residual, "flush_all gave up with entries still undelivered");
        }
    }

    /// Drains every known queue until none has anything left to send or
    /// retry, or the round budget is exhausted. Returns how many entries
    /// (buffered + retry-waiting) remained across all queues when it gave
    /// up, the `ShutdownDrainIncomplete` residual.
    async fn drain_all_queues(&self) -> usize {
        const MAX_ROUNDS: usize = 1000;
        let mut residual = 0;

        for _ in 0..MAX_ROUNDS {
            let queues = self.registry.known_queues();
            let mut any_work = false;
            residual = 0;

            for queue in &queues {
                queue.promote_ready();
                if queue.buffer.size() > 0 {
                    any_work = true;
                    dispatch::dispatch(&queue, self.sender.as_ref(), &self.global).await;
                }
                if !queue.is_drained() {
                    any_work = true;
                    residual += queue.buffer.size() + queue.retry.len();
                }
            }

            if !any_work {
                return 0;
            }
        }

        residual
    }

    /// Discard every pending and retry-waiting entry for `queue`, returning
    /// how many were dropped.
    pub fn clear_buffer(&self, queue: impl Into<QueueName>) -> usize {
        let state = self.registry.get_or_create(&queue.into());
        state.clear()
    }

    /// A full metrics snapshot across every queue ever referenced.
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.worker_alive.load(Ordering::Acquire))
    }

    /// A single queue's counters.
    pub fn get_queue_status(&self, queue: impl Into<QueueName>) -> QueueMetricsSnapshot {
        self.metrics.snapshot_queue(&queue.into())
    }

    #[cfg(test)]
    pub(crate) fn clock(&self) -> &ClockRef {
        &self.clock
    }

    /// Idempotent graceful shutdown: stop accepting new entries, signal the
    /// scheduler to stop, drain everything from the caller's own task, then
    /// join the worker (bounded by `shutdown_join_timeout`) regardless of
    /// whether the drain fully succeeded.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        tracing::info!("close: shutdown starting");
        self.signal.trigger_shutdown();
        let residual = self.drain_all_queues().await;
        if residual > 0 {
            tracing::error!(residual, "shutdown drain incomplete, entries dropped");
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(self.global.shutdown_join_timeout, handle).await;
        }
        tracing::info!("close: shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FakeClock;
    use crate::sender::test_support::{AlwaysSucceed, RecordingSender};
    use std::time::Duration;

    fn broker(sender: Arc<dyn BatchSender>) -> Broker {
        BrokerBuilder::new("ns-", sender)
            .configure(|c| c.default_batch_interval(0.0).default_idle_timeout(0.0))
            .build()
    }

    #[tokio::test]
    async fn enqueue_then_close_drains_and_sends() {
        let sender = Arc::new(RecordingSender::new());
        let broker = broker(sender.clone());

        broker.enqueue("orders", Entry::new("a", "x")).unwrap();
        broker.enqueue("orders", Entry::new("b", "y")).unwrap();

        broker.close().await;

        assert_eq!(sender.total_entries_sent(), 2);
        let status = broker.get_queue_status("orders");
        assert_eq!(status.messages_sent, 2);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let sender = Arc::new(AlwaysSucceed);
        let broker = broker(sender);
        broker.enqueue("orders", Entry::new("a", "x")).unwrap();
        broker.close().await;
        broker.close().await; // must not panic or hang
    }

    #[tokio::test]
    async fn enqueue_after_close_is_rejected() {
        let sender = Arc::new(AlwaysSucceed);
        let broker = broker(sender);
        broker.close().await;

        let err = broker.enqueue("orders", Entry::new("a", "x")).unwrap_err();
        assert_eq!(err, EnqueueError::Closed);
    }

    #[tokio::test]
    async fn clear_buffer_drops_pending_entries() {
        let sender = Arc::new(AlwaysSucceed);
        let broker = BrokerBuilder::new("ns-", sender)
            .configure(|c| c.default_batch_interval(100.0).default_idle_timeout(100.0))
            .build();

        broker.enqueue("orders", Entry::new("a", "x")).unwrap();
        broker.enqueue("orders", Entry::new("b", "y")).unwrap();

        assert_eq!(broker.clear_buffer("orders"), 2);

        let status = broker.get_queue_status("orders");
        assert_eq!(status.messages_sent, 0);
    }

    #[tokio::test]
    async fn get_metrics_reports_worker_liveness() {
        let sender = Arc::new(AlwaysSucceed);
        let broker = broker(sender);
        assert!(broker.get_metrics().background_thread_alive);
        broker.close().await;
    }

    /// S1: interval trigger. `batch_interval=1.0`, `idle_timeout=10.0`; three
    /// entries enqueued at t=0 must not be sent before t=1.0, and must all be
    /// sent once that deadline passes. The injected `FakeClock` drives the
    /// business-logic timestamps; tokio's paused virtual clock drives the
    /// scheduler's own sleep cadence, and the two are independent, so both
    /// have to move for the background loop to observe the elapsed interval.
    #[tokio::test(start_paused = true)]
    async fn s1_interval_trigger_sends_after_configured_wait() {
        let clock = FakeClock::new();
        let sender = Arc::new(RecordingSender::new());
        let broker = BrokerBuilder::new("ns-", sender.clone())
            .clock(Arc::new(clock.clone()))
            .configure(|c| {
                c.default_batch_interval(1.0)
                    .default_idle_timeout(10.0)
                    .scheduler_tick(Duration::from_millis(50))
            })
            .build();

        broker.enqueue("orders", Entry::new("a", "x")).unwrap();
        broker.enqueue("orders", Entry::new("b", "y")).unwrap();
        broker.enqueue("orders", Entry::new("c", "z")).unwrap();

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(sender.total_entries_sent(), 0);

        clock.advance(Duration::from_secs_f64(1.05));
        tokio::time::advance(Duration::from_millis(60)).await;

        assert_eq!(sender.total_entries_sent(), 3);
        broker.close().await;
    }

    /// S3: idle trigger. `batch_interval=10.0`, `idle_timeout=0.2`; a single
    /// entry enqueued at t=0 is sent once the buffer has been quiescent for
    /// the idle timeout, well before the (much longer) max-wait interval.
    #[tokio::test(start_paused = true)]
    async fn s3_idle_trigger_fires_after_quiescence() {
        let clock = FakeClock::new();
        let sender = Arc::new(RecordingSender::new());
        let broker = BrokerBuilder::new("ns-", sender.clone())
            .clock(Arc::new(clock.clone()))
            .configure(|c| {
                c.default_batch_interval(10.0)
                    .default_idle_timeout(0.2)
                    .scheduler_tick(Duration::from_millis(50))
            })
            .build();

        broker.enqueue("orders", Entry::new("a", "x")).unwrap();

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(sender.total_entries_sent(), 0);

        clock.advance(Duration::from_secs_f64(0.25));
        tokio::time::advance(Duration::from_millis(60)).await;

        assert_eq!(sender.total_entries_sent(), 1);
        broker.close().await;
    }

    /// S7: shutdown drain. 100 entries enqueued with a long interval/idle
    /// (so the background scheduler would not have flushed on its own
    /// before `close` runs) are still fully delivered, because `close`
    /// performs its own synchronous drain from the caller's task.
    #[tokio::test]
    async fn s7_close_drains_a_large_backlog_regardless_of_timers() {
        let sender = Arc::new(RecordingSender::new());
        let broker = BrokerBuilder::new("ns-", sender.clone())
            .configure(|c| c.default_batch_interval(100.0).default_idle_timeout(100.0))
            .build();

        for i in 0..100 {
            broker
                .enqueue("orders", Entry::new(format!("e{i}"), "x"))
                .unwrap();
        }

        broker.close().await;

        assert_eq!(sender.total_entries_sent(), 100);
        let status = broker.get_queue_status("orders");
        assert_eq!(status.messages_sent, 100);
        assert!(!broker.get_metrics().background_thread_alive);
    }
}
