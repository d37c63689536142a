//! Dispatcher (§4.G): executes one flush of a queue (drain, split, send,
//! route outcomes back to the buffer/retry queue, update metrics).
//!
//! The queue's mutual-exclusion discipline is held only long enough to
//! drain the buffer; `BatchSender::send` is always called with no lock
//! held, so concurrent enqueue into the same queue continues while a flush
//! is in flight.

use crate::config::GlobalConfig;
use crate::entry::Entry;
use crate::error::{FailureKind, TransportError};
use crate::queue::QueueState;
use crate::sender::BatchSender;
use crate::splitter;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Drain up to `batch_size_cap` entries from `queue` and send them,
/// splitting as needed, routing every per-entry outcome back into the
/// buffer (success) or retry queue (failure).
pub(crate) async fn dispatch(queue: &Arc<QueueState>, sender: &dyn BatchSender, global: &GlobalConfig) {
    // Drain everything currently buffered rather than capping at
    // `batch_size_cap` here: the Batch Splitter is the actual enforcer of
    // the count/byte caps per sub-batch (see DESIGN.md).
    let candidates = queue.buffer.drain_head(queue.buffer.size());
    if candidates.is_empty() {
        return;
    }

    let outcome = splitter::split(candidates, global.max_entry_bytes, global.max_batch_bytes);

    if !outcome.oversized.is_empty() {
        queue
            .counters
            .oversized_message_dropped
            .fetch_add(outcome.oversized.len() as u64, Ordering::Relaxed);
        for entry in &outcome.oversized {
            tracing::warn!(queue = %queue.name, entry_id = %entry.id, "dropping oversized entry, never sendable");
        }
    }

    if outcome.sub_batches.len() > 1 {
        queue.counters.batch_split_count.fetch_add(1, Ordering::Relaxed);
    }

    let external_queue = global.external_queue_id(&queue.name);

    for sub_batch in outcome.sub_batches {
        send_sub_batch(queue, sender, &external_queue, sub_batch).await;
    }
}

async fn send_sub_batch(
    queue: &Arc<QueueState>,
    sender: &dyn BatchSender,
    external_queue: &str,
    sub_batch: Vec<Entry>,
) {
    let ids: Vec<String> = sub_batch.iter().map(|e| e.id.clone()).collect();
    let by_id: std::collections::HashMap<String, Entry> =
        sub_batch.iter().map(|e| (e.id.clone(), e.clone())).collect();

    match sender.send(external_queue, sub_batch).await {
        Ok(result) => {
            let mut failed_entries = Vec::new();

            for id in &ids {
                if result.succeeded.contains(id) {
                    queue.counters.messages_sent.fetch_add(1, Ordering::Relaxed);
                    queue.retry.forget(id);
                } else {
                    let reason = result
                        .failed
                        .get(id)
                        .map(|r| FailureKind::Reported(r.clone()))
                        .unwrap_or(FailureKind::Unknown);
                    tracing::debug!(queue = %queue.name, entry_id = %id, reason = %reason, "entry failed in batch");
                    if let Some(entry) = by_id.get(id) {
                        failed_entries.push(entry.clone());
                    }
                }
            }

            record_failures(queue, failed_entries);
        }
        Err(TransportError { message, .. }) => {
            tracing::error!(queue = %queue.name, error = %message, "transport error sending batch");
            let failed_entries: Vec<Entry> = ids.iter().filter_map(|id| by_id.get(id).cloned()).collect();
            record_failures(queue, failed_entries);
        }
    }
}

fn record_failures(queue: &Arc<QueueState>, failed: Vec<Entry>) {
    if failed.is_empty() {
        return;
    }
    queue.counters.messages_failed.fetch_add(failed.len() as u64, Ordering::Relaxed);
    let outcome = queue.retry.record_failures(failed);
    if outcome.exhausted > 0 {
        queue
            .counters
            .retry_exhausted_count
            .fetch_add(outcome.exhausted as u64, Ordering::Relaxed);
        tracing::error!(queue = %queue.name, count = outcome.exhausted, "entries dropped after exhausting retries");
    }
}
