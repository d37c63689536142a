//! Batch Queue Producer
//!
//! A client-side batching producer for SQS-style bounded cloud queues: entries
//! enqueued per logical queue are coalesced into count- and byte-capped
//! sub-batches, flushed on a configurable interval/idle/full-batch/force
//! policy, and failed sends are retried with exponential backoff before being
//! dropped.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use batch_queue_producer::{Broker, Entry};
//! use std::sync::Arc;
//!
//! # async fn run(sender: Arc<dyn batch_queue_producer::BatchSender>) {
//! let broker = Broker::builder("my-app-", sender).build();
//!
//! broker.enqueue("orders", Entry::new("order-1", "{\"sku\":42}")).unwrap();
//! broker.force_flush("orders");
//!
//! broker.close().await;
//! # }
//! ```

mod broker;
mod buffer;
mod clock;
mod config;
mod dispatch;
mod entry;
mod error;
mod flush;
mod metrics;
mod queue;
mod retry;
mod scheduler;
mod sender;
mod size;
mod splitter;

pub use broker::{Broker, BrokerBuilder};
pub use clock::{Clock, MonotonicClock};
pub use config::{GlobalConfig, GlobalConfigBuilder, PerQueueConfig};
pub use entry::{AttributeValue, Entry, QueueName};
pub use error::{EnqueueError, FailureKind, TransportError};
pub use metrics::{MetricsSnapshot, QueueMetricsSnapshot};
pub use sender::{BatchSender, SendOutcome};
pub use size::{MAX_BATCH_BYTES, MAX_BATCH_COUNT, MAX_ENTRY_BYTES};
