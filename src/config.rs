//! Global and per-queue configuration, resolved through a validated
//! builder in the same shape as the rest of the corpus's `*Builder` types.

use crate::entry::QueueName;
use std::collections::HashMap;
use std::time::Duration;

/// Immutable, process-wide configuration. Frozen for the life of the
/// [`crate::broker::Broker`] instance that owns it.
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub namespace: String,
    pub default_batch_interval: Duration,
    pub default_idle_timeout: Duration,
    pub batch_size_cap: usize,
    pub max_entry_bytes: usize,
    pub max_batch_bytes: usize,
    pub max_buffer_size_per_queue: usize,
    pub max_retry_attempts: u32,
    pub scheduler_tick: Duration,
    pub shutdown_join_timeout: Duration,
    pub group_batch_intervals: HashMap<String, Duration>,
    pub group_idle_timeouts: HashMap<String, Duration>,
}

impl GlobalConfig {
    /// Derive the external queue identifier: `namespace || logical_queue`.
    /// No further escaping is performed.
    pub fn external_queue_id(&self, queue: &QueueName) -> String {
        format!("{}{}", self.namespace, queue.as_str())
    }

    /// Resolve the effective per-queue config. Unknown queue names fall
    /// back to the defaults; an unrecognized key is never an error.
    pub fn resolve(&self, queue: &QueueName) -> PerQueueConfig {
        let batch_interval = self
            .group_batch_intervals
            .get(queue.as_str())
            .copied()
            .unwrap_or(self.default_batch_interval);
        let idle_timeout = self
            .group_idle_timeouts
            .get(queue.as_str())
            .copied()
            .unwrap_or(self.default_idle_timeout);
        PerQueueConfig {
            batch_interval,
            idle_timeout,
        }
    }
}

/// Resolved per-`QueueName` timing configuration. A value of `Duration::ZERO`
/// means "no wait, send as soon as possible."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerQueueConfig {
    pub batch_interval: Duration,
    pub idle_timeout: Duration,
}

/// Builder for [`GlobalConfig`].
#[must_use = "builders do nothing unless you call .build()"]
pub struct GlobalConfigBuilder {
    namespace: String,
    default_batch_interval: Duration,
    default_idle_timeout: Duration,
    batch_size_cap: usize,
    max_entry_bytes: usize,
    max_batch_bytes: usize,
    max_buffer_size_per_queue: usize,
    max_retry_attempts: u32,
    scheduler_tick: Duration,
    shutdown_join_timeout: Duration,
    group_batch_intervals: HashMap<String, Duration>,
    group_idle_timeouts: HashMap<String, Duration>,
}

impl GlobalConfigBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            default_batch_interval: Duration::from_secs_f64(1.0),
            default_idle_timeout: Duration::from_secs_f64(0.1),
            batch_size_cap: crate::size::MAX_BATCH_COUNT,
            max_entry_bytes: crate::size::MAX_ENTRY_BYTES,
            max_batch_bytes: crate::size::MAX_BATCH_BYTES,
            max_buffer_size_per_queue: 5000,
            max_retry_attempts: 3,
            scheduler_tick: Duration::from_millis(50),
            shutdown_join_timeout: Duration::from_secs(5),
            group_batch_intervals: HashMap::new(),
            group_idle_timeouts: HashMap::new(),
        }
    }

    pub fn default_batch_interval(mut self, secs: f64) -> Self {
        self.default_batch_interval = Duration::from_secs_f64(secs);
        self
    }

    pub fn default_idle_timeout(mut self, secs: f64) -> Self {
        self.default_idle_timeout = Duration::from_secs_f64(secs);
        self
    }

    /// Hard-clamped to 10 (the SQS-style batch count cap), matching the
    /// reference implementation's behavior rather than rejecting the value.
    pub fn batch_size_cap(mut self, cap: usize) -> Self {
        self.batch_size_cap = cap.min(crate::size::MAX_BATCH_COUNT);
        self
    }

    pub fn max_buffer_size_per_queue(mut self, cap: usize) -> Self {
        self.max_buffer_size_per_queue = cap;
        self
    }

    pub fn max_retry_attempts(mut self, n: u32) -> Self {
        self.max_retry_attempts = n;
        self
    }

    pub fn scheduler_tick(mut self, d: Duration) -> Self {
        self.scheduler_tick = d;
        self
    }

    pub fn shutdown_join_timeout(mut self, d: Duration) -> Self {
        self.shutdown_join_timeout = d;
        self
    }

    pub fn group_batch_interval(mut self, queue: impl Into<String>, secs: f64) -> Self {
        self.group_batch_intervals
            .insert(queue.into(), Duration::from_secs_f64(secs));
        self
    }

    pub fn group_idle_timeout(mut self, queue: impl Into<String>, secs: f64) -> Self {
        self.group_idle_timeouts
            .insert(queue.into(), Duration::from_secs_f64(secs));
        self
    }

    pub fn build(self) -> GlobalConfig {
        GlobalConfig {
            namespace: self.namespace,
            default_batch_interval: self.default_batch_interval,
            default_idle_timeout: self.default_idle_timeout,
            batch_size_cap: self.batch_size_cap,
            max_entry_bytes: self.max_entry_bytes,
            max_batch_bytes: self.max_batch_bytes,
            max_buffer_size_per_queue: self.max_buffer_size_per_queue,
            max_retry_attempts: self.max_retry_attempts,
            scheduler_tick: self.scheduler_tick,
            shutdown_join_timeout: self.shutdown_join_timeout,
            group_batch_intervals: self.group_batch_intervals,
            group_idle_timeouts: self.group_idle_timeouts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_cap_is_hard_clamped_to_ten() {
        let cfg = GlobalConfigBuilder::new("ns-").batch_size_cap(20).build();
        assert_eq!(cfg.batch_size_cap, 10);
    }

    #[test]
    fn unknown_queue_name_falls_back_to_defaults() {
        let cfg = GlobalConfigBuilder::new("ns-")
            .default_batch_interval(2.0)
            .group_batch_interval("priority", 0.0)
            .build();

        let resolved = cfg.resolve(&QueueName::new("unrelated"));
        assert_eq!(resolved.batch_interval, Duration::from_secs_f64(2.0));

        let priority = cfg.resolve(&QueueName::new("priority"));
        assert_eq!(priority.batch_interval, Duration::ZERO);
    }

    #[test]
    fn external_queue_id_concatenates_namespace() {
        let cfg = GlobalConfigBuilder::new("my-app-").build();
        assert_eq!(
            cfg.external_queue_id(&QueueName::new("orders")),
            "my-app-orders"
        );
    }
}
