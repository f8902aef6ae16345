//! Error handling and processing statistics.
//!
//! This module provides:
//! - The collection error taxonomy (`CollectError`)
//! - Recoverable-failure categories for statistics (`ErrorKind`)
//! - Thread-safe per-run failure counters (`ProcessingStats`)
//!
//! Terminal errors (malformed capture, expired credentials, an already
//! running collection) abort the operation that raised them; recoverable
//! errors are counted, logged with page/item context, and the run continues.

mod stats;
mod types;

// Re-export public API
pub use stats::{log_error_statistics, ProcessingStats};
pub use types::{CollectError, ErrorKind, InitializationError};
