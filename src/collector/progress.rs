//! Run progress reporting.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Outcome of one processed item, pushed to observers as it happens.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    /// List page the item was discovered on.
    pub page: u32,
    /// Provider-native payment identifier.
    pub payment_id: String,
    /// Whether the item made it through fetch, normalize and store.
    pub succeeded: bool,
    /// Total amount, when the item succeeded.
    pub amount: Option<i64>,
    /// Payment time, when the item succeeded.
    pub paid_at: Option<String>,
    /// First item image, when one was present.
    pub thumbnail_url: Option<String>,
    /// Error description, when the item failed.
    pub error: Option<String>,
}

/// Receives progress as a run advances. Implementations must be cheap; the
/// collector calls them inline between requests.
pub trait ProgressObserver: Send + Sync {
    /// Called once when discovery determines the page count.
    fn discovered(&self, total_pages: u32);

    /// Called before a list page is fetched.
    fn page_started(&self, page: u32, total_pages: u32);

    /// Called after each item, success or failure.
    fn item_finished(&self, outcome: &ItemOutcome);
}

/// Default observer: logs progress through the standard logger.
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn discovered(&self, total_pages: u32) {
        log::info!("History spans {total_pages} page(s)");
    }

    fn page_started(&self, page: u32, total_pages: u32) {
        log::info!("Collecting page {page}/{total_pages}");
    }

    fn item_finished(&self, outcome: &ItemOutcome) {
        if outcome.succeeded {
            log::debug!(
                "Stored payment {} ({} on page {})",
                outcome.payment_id,
                outcome.amount.unwrap_or_default(),
                outcome.page
            );
        } else {
            log::warn!(
                "Payment {} (page {}) failed: {}",
                outcome.payment_id,
                outcome.page,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

/// Live run counters, readable from other tasks while the run progresses.
#[derive(Default)]
pub struct ProgressCounters {
    discovered: AtomicUsize,
    processed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_discovered(&self, count: usize) {
        self.discovered.fetch_add(count, Ordering::SeqCst);
    }

    pub fn record_success(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn discovered(&self) -> usize {
        self.discovered.load(Ordering::SeqCst)
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}
