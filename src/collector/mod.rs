//! Paginated collection runs.
//!
//! The collector walks a provider's payment history and funnels every item
//! through fetch, normalize and store. Providers paginate newest-first, so
//! traversal goes from the last page toward page 1 and walks each page's
//! items back to front; whatever an interrupted run managed to store is then
//! contiguous from the oldest payment forward.
//!
//! Failure policy: a failed list page is logged and skipped, a failed item
//! is counted and skipped. Only three things end a run early: discovery
//! failing on the first page, credential expiry, and cancellation.

pub mod pacing;
pub mod progress;

pub use progress::{ItemOutcome, LogObserver, ProgressCounters, ProgressObserver};

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error_handling::{
    log_error_statistics, CollectError, ErrorKind, ProcessingStats,
};
use crate::model::UnifiedPayment;
use crate::provider::{ListPage, ListedItem};
use crate::proxy::ProxyRequest;
use crate::session::CollectionSession;
use crate::storage;

/// Terminal state of a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every discovered page was traversed.
    Completed,
    /// The run was cancelled; stored data is a contiguous oldest-first slice.
    Stopped,
    /// A terminal error ended the run.
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Stopped => "stopped",
            RunStatus::Failed => "failed",
        }
    }
}

/// Summary of a finished run.
#[derive(Debug)]
pub struct CollectReport {
    pub run_id: String,
    pub status: RunStatus,
    pub total_pages: u32,
    pub discovered: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Runs a full collection for the session's account.
///
/// Terminal failures finalize the run row before surfacing the error, so
/// the `runs` table reflects every run regardless of outcome.
pub async fn run_collection(
    pool: &SqlitePool,
    session: &CollectionSession,
    observer: &dyn ProgressObserver,
) -> Result<CollectReport, CollectError> {
    let run_id = Uuid::new_v4().to_string();
    storage::insert_run(
        pool,
        &run_id,
        session.account_id(),
        session.adapter().provider(),
    )
    .await?;

    let counters = ProgressCounters::new();
    let stats = ProcessingStats::new();

    let result = traverse(pool, session, observer, &counters, &stats).await;

    let status = match &result {
        Ok((status, _)) => *status,
        Err(_) => RunStatus::Failed,
    };
    storage::finish_run(
        pool,
        &run_id,
        status.as_str(),
        counters.discovered(),
        counters.processed(),
        counters.succeeded(),
        counters.failed(),
    )
    .await?;
    log_error_statistics(&stats);

    let (status, total_pages) = result?;
    Ok(CollectReport {
        run_id,
        status,
        total_pages,
        discovered: counters.discovered(),
        processed: counters.processed(),
        succeeded: counters.succeeded(),
        failed: counters.failed(),
    })
}

async fn traverse(
    pool: &SqlitePool,
    session: &CollectionSession,
    observer: &dyn ProgressObserver,
    counters: &ProgressCounters,
    stats: &ProcessingStats,
) -> Result<(RunStatus, u32), CollectError> {
    // Discovery: the first page tells us how far back the history goes.
    // Failure here is terminal; there is nothing to traverse without it.
    let first = fetch_list_page(session, 1).await?;
    let total_pages = first.total_pages.unwrap_or(1).max(1);
    observer.discovered(total_pages);

    let pages: Vec<u32> = if session.adapter().reverse_page_order() {
        (1..=total_pages).rev().collect()
    } else {
        (1..=total_pages).collect()
    };

    for (idx, &page) in pages.iter().enumerate() {
        if session.is_cancelled() {
            log::info!("Collection cancelled before page {page}");
            return Ok((RunStatus::Stopped, total_pages));
        }
        if idx > 0 {
            pacing::pause_between_pages().await;
        }
        observer.page_started(page, total_pages);

        // Page counts can shift under us while we walk; each page is
        // fetched fresh rather than trusting discovery's snapshot of
        // page 1.
        let list = match fetch_list_page(session, page).await {
            Ok(list) => list,
            Err(err @ CollectError::CredentialsExpired { .. }) => return Err(err),
            Err(err) => {
                log::warn!("Skipping page {page}: {err}");
                stats.increment(err.kind().unwrap_or(ErrorKind::ListParseError));
                continue;
            }
        };

        let mut items = list.items;
        if session.adapter().reverse_page_order() {
            items.reverse();
        }
        counters.add_discovered(items.len());

        for (item_idx, item) in items.iter().enumerate() {
            if session.is_cancelled() {
                log::info!("Collection cancelled on page {page}");
                return Ok((RunStatus::Stopped, total_pages));
            }
            if item_idx > 0 {
                pacing::pause_between_items().await;
            }

            match process_item(pool, session, item).await {
                Ok(payment) => {
                    counters.record_success();
                    observer.item_finished(&success_outcome(page, item, &payment));
                }
                Err(err @ CollectError::CredentialsExpired { .. }) => return Err(err),
                Err(err) => {
                    counters.record_failure();
                    if let Some(kind) = err.kind() {
                        stats.increment(kind);
                    }
                    observer.item_finished(&ItemOutcome {
                        page,
                        payment_id: item.payment_id.clone(),
                        succeeded: false,
                        amount: None,
                        paid_at: None,
                        thumbnail_url: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }
    }

    Ok((RunStatus::Completed, total_pages))
}

/// Fetches and parses one list page with the account's current headers.
async fn fetch_list_page(
    session: &CollectionSession,
    page: u32,
) -> Result<ListPage, CollectError> {
    let url = session.adapter().list_url(page)?;
    let body = fetch_body(session, url).await?;
    session.adapter().parse_list(&body)
}

/// Fetches one item's detail, normalizes it and stores the result.
async fn process_item(
    pool: &SqlitePool,
    session: &CollectionSession,
    item: &ListedItem,
) -> Result<UnifiedPayment, CollectError> {
    let build_id = session.build_id_for(item).await?;
    let url = session.adapter().detail_url(item, build_id.as_deref())?;
    let body = fetch_body(session, url).await?;
    let payment = session.adapter().parse_detail(item, &body)?;
    storage::upsert_payment(pool, session.account_id(), &payment).await?;
    Ok(payment)
}

/// Executes one authenticated GET. Headers come from the credential store
/// at call time, so a refresh done while the run sleeps applies here.
async fn fetch_body(session: &CollectionSession, url: String) -> Result<String, CollectError> {
    let headers = session.headers().await?;
    let response = session
        .proxy()
        .execute(ProxyRequest::get(&url, headers))
        .await?;
    if !response.is_success() {
        return Err(CollectError::UpstreamError {
            status: response.status,
            url,
        });
    }
    if response.body.contains(session.adapter().login_marker()) {
        return Err(CollectError::CredentialsExpired {
            provider: session.adapter().provider(),
        });
    }
    Ok(response.body)
}

fn success_outcome(page: u32, item: &ListedItem, payment: &UnifiedPayment) -> ItemOutcome {
    ItemOutcome {
        page,
        payment_id: item.payment_id.clone(),
        succeeded: true,
        amount: Some(payment.total_amount),
        paid_at: Some(payment.paid_at.clone()),
        thumbnail_url: payment
            .items
            .first()
            .and_then(|i| i.image_url.clone())
            .or_else(|| payment.merchant_image_url.clone()),
        error: None,
    }
}
