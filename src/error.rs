//! Error types for the batching producer.

use thiserror::Error;

/// Errors returned synchronously from [`crate::broker::Broker::enqueue`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// `Buffer[Q]` was already at `max_buffer_size_per_queue`.
    #[error("buffer full for queue {queue}")]
    BufferFull { queue: String },

    /// `enqueue` was called after `close()` completed.
    #[error("producer is closed")]
    Closed,
}

/// A whole-batch transport failure from `BatchSender::send`.
///
/// Every entry in the sub-batch that produced this error is treated as
/// failed and handed to the retry queue (§7).
#[derive(Debug, Clone, Error)]
#[error("transport error sending to queue {queue}: {message}")]
pub struct TransportError {
    pub queue: String,
    pub message: String,
}

impl TransportError {
    pub fn new(queue: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            message: message.into(),
        }
    }
}

/// Why a single entry within a batch failed, as reported by `BatchSender`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The sender reported a specific reason for this entry's failure.
    Reported(String),
    /// The sender's response named neither `succeeded` nor `failed` for
    /// this id.
    Unknown,
    /// Every entry in a sub-batch that raised `TransportError`.
    Transport,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Reported(reason) => write!(f, "{reason}"),
            FailureKind::Unknown => write!(f, "unknown (absent from sender response)"),
            FailureKind::Transport => write!(f, "transport error"),
        }
    }
}
