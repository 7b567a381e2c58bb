//! Per-message retry ledger
//!
//! Maps message identity to attempt count. Entries exist only for
//! messages that have failed at least once and are removed when a message
//! is finally acknowledged or escalated, so the ledger stays bounded by
//! the in-flight failure set.
//!
//! Keyed by the transport-assigned identity, not the payload: a broker
//! redelivery of the same message resumes its existing count.

use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory attempt counter shared by all workers in a pool.
///
/// The one piece of mutable shared state in the harness; all access goes
/// through the lock so concurrent failures of the same identity never
/// lose an increment.
#[derive(Debug, Default)]
pub struct RetryLedger {
    counts: Mutex<HashMap<String, u32>>,
}

impl RetryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `message_id` and return the updated attempt
    /// count. The entry is created at 1 on the first failure.
    pub fn record_failure(&self, message_id: &str) -> u32 {
        let mut counts = self.counts.lock().expect("retry ledger lock poisoned");
        let count = counts.entry(message_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Current attempt count for `message_id` (0 when never failed).
    pub fn attempts(&self, message_id: &str) -> u32 {
        let counts = self.counts.lock().expect("retry ledger lock poisoned");
        counts.get(message_id).copied().unwrap_or(0)
    }

    /// Drop the entry for `message_id` once the message reaches a
    /// terminal outcome (final ack or escalation).
    pub fn clear(&self, message_id: &str) {
        let mut counts = self.counts.lock().expect("retry ledger lock poisoned");
        counts.remove(message_id);
    }

    /// Number of message identities currently carrying a failure count.
    pub fn len(&self) -> usize {
        let counts = self.counts.lock().expect("retry ledger lock poisoned");
        counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
