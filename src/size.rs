//! Size accounting: the byte-size rules the Batch Splitter and buffer caps
//! are built on top of.

use crate::entry::Entry;

/// SQS-style hard batch-count cap. Never configurable above this.
pub const MAX_BATCH_COUNT: usize = 10;

/// Per-message byte cap (256 KiB).
pub const MAX_ENTRY_BYTES: usize = 256 * 1024;

/// Per-batch byte cap (256 KiB).
pub const MAX_BATCH_BYTES: usize = 256 * 1024;

/// `entry_bytes(e) := byte_length(utf8(e.body)) + sum(attribute_bytes)`.
///
/// Attribute accounting is deterministic: each attribute contributes its
/// payload's byte length plus the byte length of its key (symmetric with
/// how a real sender would frame it on the wire).
pub fn entry_bytes(entry: &Entry) -> usize {
    let body = entry.body.len();
    let attrs: usize = entry
        .attributes
        .iter()
        .map(|(k, v)| k.len() + v.payload_bytes())
        .sum();
    body + attrs
}

/// `over_entry_cap(e) := entry_bytes(e) > max_entry_bytes`.
pub fn over_entry_cap(entry: &Entry, max_entry_bytes: usize) -> bool {
    entry_bytes(entry) > max_entry_bytes
}
