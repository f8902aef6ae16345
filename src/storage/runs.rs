//! Run bookkeeping.
//!
//! A row is written when a collection starts and finalized with its outcome
//! and counters when it ends, whatever the outcome was.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error_handling::CollectError;
use crate::provider::Provider;

/// Records the start of a collection run.
pub async fn insert_run(
    pool: &SqlitePool,
    run_id: &str,
    account_id: &str,
    provider: Provider,
) -> Result<(), CollectError> {
    sqlx::query(
        "INSERT INTO runs (run_id, account_id, provider, status, started_at)
         VALUES (?, ?, ?, 'running', ?)",
    )
    .bind(run_id)
    .bind(account_id)
    .bind(provider.as_str())
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

/// Finalizes a run with its outcome and counters.
pub async fn finish_run(
    pool: &SqlitePool,
    run_id: &str,
    status: &str,
    discovered: usize,
    processed: usize,
    succeeded: usize,
    failed: usize,
) -> Result<(), CollectError> {
    sqlx::query(
        "UPDATE runs
         SET status = ?, discovered = ?, processed = ?, succeeded = ?,
             failed = ?, finished_at = ?
         WHERE run_id = ?",
    )
    .bind(status)
    .bind(discovered as i64)
    .bind(processed as i64)
    .bind(succeeded as i64)
    .bind(failed as i64)
    .bind(Utc::now().to_rfc3339())
    .bind(run_id)
    .execute(pool)
    .await?;
    Ok(())
}
