//! Configuration constants.

use std::ops::Range;

/// Default SQLite database path.
pub const DB_PATH: &str = "./payfetch.db";

/// Per-request HTTP timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Delay range between item-detail requests, in milliseconds. The jitter
/// keeps the request cadence from looking machine-generated.
pub const ITEM_DELAY_MS: Range<u64> = 100..300;

/// Delay range between list-page requests, in milliseconds.
pub const PAGE_DELAY_MS: Range<u64> = 800..1200;

/// Default User-Agent string for HTTP requests.
///
/// Captured sessions usually carry their own `user-agent` header, which
/// takes precedence per request; this is the fallback for requests whose
/// capture did not include one.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
