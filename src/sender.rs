//! The external `BatchSender` interface (§6): the opaque cloud-queue SDK
//! collaborator this crate sends batches through. Consumed, not provided;
//! the embedding application supplies a concrete implementation (typically a
//! thin wrapper around an SQS-style client SDK).

use crate::entry::Entry;
use crate::error::TransportError;
use futures::future::BoxFuture;
use std::collections::{HashMap, HashSet};

/// Result of one `BatchSender::send` call.
///
/// Contract: ids appearing in neither `succeeded` nor `failed` are treated
/// as failed with [`crate::error::FailureKind::Unknown`] by the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct SendOutcome {
    pub succeeded: HashSet<String>,
    pub failed: HashMap<String, String>,
}

impl SendOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(mut self, id: impl Into<String>) -> Self {
        self.succeeded.insert(id.into());
        self
    }

    pub fn fail(mut self, id: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failed.insert(id.into(), reason.into());
        self
    }
}

/// The cloud-queue client SDK, treated as an opaque collaborator.
///
/// Called with `1 <= batch.len() <= 10` and
/// `sum(byte_length(body)) <= 256 * 1024`; the dispatcher upholds this via
/// the Batch Splitter before ever calling `send`.
pub trait BatchSender: Send + Sync {
    /// Send one sub-batch to `logical_queue`.
    ///
    /// A `TransportError` return means the entire batch should be treated
    /// as failed; partial success within a batch is reported through the
    /// two maps of `SendOutcome`.
    fn send(
        &self,
        logical_queue: &str,
        batch: Vec<Entry>,
    ) -> BoxFuture<'static, Result<SendOutcome, TransportError>>;
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::entry::Entry;

    #[tokio::test]
    async fn always_succeed_marks_every_entry() {
        let sender = AlwaysSucceed;
        let batch = vec![Entry::new("a", "1"), Entry::new("b", "2")];
        let outcome = sender.send("q", batch).await.unwrap();
        assert_eq!(outcome.succeeded.len(), 2);
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn recording_sender_fails_then_succeeds() {
        let sender = RecordingSender::new();
        sender.fail_entry_n_times("a", 2);

        for _ in 0..2 {
            let outcome = sender.send("q", vec![Entry::new("a", "x")]).await.unwrap();
            assert!(outcome.failed.contains_key("a"));
        }
        let outcome = sender.send("q", vec![Entry::new("a", "x")]).await.unwrap();
        assert!(outcome.succeeded.contains("a"));
    }
}
