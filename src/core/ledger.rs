//! Deduplication ledger of call identities seen during this run.
//!
//! Entries are never evicted; the ledger lives for exactly one session.

use std::collections::HashSet;
use std::sync::Mutex;

/// Concurrency-safe set of call ids that have already been observed
#[derive(Debug, Default)]
pub struct SeenLedger {
    seen: Mutex<HashSet<String>>,
}

impl SeenLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the id has been marked seen
    pub fn has(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    /// Atomically mark the id as seen.
    ///
    /// Returns `true` only for the caller that inserted it.
    pub fn mark_seen(&self, id: &str) -> bool {
        let mut seen = self.lock();
        if seen.contains(id) {
            return false;
        }
        seen.insert(id.to_string())
    }

    /// Number of distinct ids seen
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock cannot leave the set half-updated.
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
