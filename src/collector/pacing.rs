//! Inter-request pacing.
//!
//! Every request against a provider is separated by a randomized delay.
//! There are no retries anywhere in the pipeline; pacing is the only
//! traffic-shaping mechanism.

use std::time::Duration;

use rand::Rng;

use crate::config::{ITEM_DELAY_MS, PAGE_DELAY_MS};

/// Sleeps the randomized between-items delay.
pub async fn pause_between_items() {
    sleep_jittered(ITEM_DELAY_MS.start, ITEM_DELAY_MS.end).await;
}

/// Sleeps the randomized between-pages delay.
pub async fn pause_between_pages() {
    sleep_jittered(PAGE_DELAY_MS.start, PAGE_DELAY_MS.end).await;
}

async fn sleep_jittered(min_ms: u64, max_ms: u64) {
    // The rng handle is dropped before the await point; ThreadRng is not Send.
    let ms = { rand::rng().random_range(min_ms..max_ms) };
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
