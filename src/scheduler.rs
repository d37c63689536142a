//! Scheduler Loop (§4.H): the single background worker that wakes
//! periodically, promotes ready retries, decides flushes, and dispatches
//! them.

use crate::clock::ClockRef;
use crate::config::GlobalConfig;
use crate::dispatch;
use crate::queue::QueueRegistry;
use crate::sender::BatchSender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Shared signal the Lifecycle component uses to wake the scheduler early
/// (on `force_flush` or shutdown) instead of waiting out the full tick.
pub(crate) struct SchedulerSignal {
    shutting_down: AtomicBool,
    notify: Notify,
}

impl SchedulerSignal {
    pub fn new() -> Self {
        Self {
            shutting_down: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub fn trigger_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn wake(&self) {
        self.notify.notify_waiters();
    }
}

/// Runs until `signal.is_shutting_down()` observes true between ticks.
pub(crate) async fn run(
    registry: Arc<QueueRegistry>,
    sender: Arc<dyn BatchSender>,
    global: Arc<GlobalConfig>,
    clock: ClockRef,
    signal: Arc<SchedulerSignal>,
) {
    tracing::info!("scheduler loop started");

    loop {
        if signal.is_shutting_down() {
            break;
        }

        tick(&registry, sender.as_ref(), &global, &clock).await;

        if signal.is_shutting_down() {
            break;
        }

        let sleep_for = next_sleep(&registry, &clock, global.scheduler_tick);
        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = signal.notify.notified() => {}
        }
    }

    tracing::info!("scheduler loop stopped");
}

async fn tick(registry: &QueueRegistry, sender: &dyn BatchSender, global: &GlobalConfig, clock: &ClockRef) {
    let queues = registry.known_queues();

    for queue in &queues {
        queue.promote_ready();
    }

    let now = clock.now();
    for queue in &queues {
        if queue.should_flush(now, false) {
            queue.consume_force_flush();
            dispatch::dispatch(queue, sender, global).await;
        }
    }
}

/// `min(next_deadline_across_queues, scheduler_tick)`.
fn next_sleep(registry: &QueueRegistry, clock: &ClockRef, scheduler_tick: Duration) -> Duration {
    let queues = registry.known_queues();
    let now = clock.now();

    let earliest = queues
        .iter()
        .filter_map(|q| q.next_deadline())
        .map(|deadline| deadline.saturating_duration_since(now))
        .min();

    match earliest {
        Some(d) => d.min(scheduler_tick),
        None => scheduler_tick,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::config::GlobalConfigBuilder;
    use crate::entry::{Entry, QueueName};
    use crate::metrics::MetricsRegistry;
    use crate::sender::test_support::AlwaysSucceed;

    #[tokio::test]
    async fn tick_promotes_and_dispatches_a_full_queue() {
        let clock: ClockRef = Arc::new(MonotonicClock);
        let global = Arc::new(GlobalConfigBuilder::new("ns-").build());
        let metrics = Arc::new(MetricsRegistry::new());
        let registry = Arc::new(QueueRegistry::new(global.clone(), metrics, clock.clone()));

        let queue = registry.get_or_create(&QueueName::new("orders"));
        for i in 0..10 {
            queue.enqueue(Entry::new(format!("e{i}"), "x"));
        }

        let sender = AlwaysSucceed;
        tick(&registry, &sender, &global, &clock).await;

        assert_eq!(queue.buffer.size(), 0);
        assert_eq!(queue.counters.messages_sent.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn next_sleep_is_capped_by_scheduler_tick_when_no_queue_is_armed() {
        let clock: ClockRef = Arc::new(MonotonicClock);
        let global = Arc::new(GlobalConfigBuilder::new("ns-").build());
        let metrics = Arc::new(MetricsRegistry::new());
        let registry = QueueRegistry::new(global, metrics, clock.clone());

        assert_eq!(
            next_sleep(&registry, &clock, Duration::from_millis(50)),
            Duration::from_millis(50)
        );
    }
}
