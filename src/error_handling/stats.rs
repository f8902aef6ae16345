//! Per-run failure statistics tracking.
//!
//! Thread-safe counters for the recoverable error categories, shared across
//! the collection run via `Arc` and printed at the end of a run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use strum::IntoEnumIterator;

use super::types::ErrorKind;

/// Thread-safe failure statistics tracker.
///
/// All categories are initialized to zero on creation, so lookups can never
/// miss for a valid `ErrorKind`.
pub struct ProcessingStats {
    errors: HashMap<ErrorKind, AtomicUsize>,
}

impl ProcessingStats {
    pub fn new() -> Self {
        let mut errors = HashMap::new();
        for kind in ErrorKind::iter() {
            errors.insert(kind, AtomicUsize::new(0));
        }
        ProcessingStats { errors }
    }

    /// Increments the counter for an error category.
    pub fn increment(&self, kind: ErrorKind) {
        if let Some(counter) = self.errors.get(&kind) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Returns the count for an error category.
    pub fn count(&self, kind: ErrorKind) -> usize {
        self.errors
            .get(&kind)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Returns the total number of counted failures across all categories.
    pub fn total(&self) -> usize {
        self.errors
            .values()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs non-zero failure counts, one line per category.
pub fn log_error_statistics(stats: &ProcessingStats) {
    let total = stats.total();
    if total == 0 {
        return;
    }
    log::info!("Failure counts ({} total):", total);
    for kind in ErrorKind::iter() {
        let count = stats.count(kind);
        if count > 0 {
            log::info!("   {}: {}", kind.as_str(), count);
        }
    }
}
