// End-to-end collection runs against a scripted transport.

mod helpers;

use std::sync::Arc;

use sqlx::Row;
use tokio_util::sync::CancellationToken;

use helpers::{create_test_pool, seed_account, ScriptedProxy};
use payfetch::collector::{run_collection, LogObserver, RunStatus};
use payfetch::credentials::SqliteCredentialStore;
use payfetch::provider::adapter_for;
use payfetch::session::CollectionSession;
use payfetch::storage;
use payfetch::{CollectError, Provider};

const BUILD_PAGE: &str = "https://new-m.pay.naver.com/payment";
const BUILD_PAGE_HTML: &str =
    r#"<script src="/_next/static/bid123/_buildManifest.js"></script>"#;

fn list_url(page: u32) -> String {
    format!("https://new-m.pay.naver.com/api/payments/history?page={page}")
}

fn detail_url(pay_id: &str) -> String {
    format!("https://new-m.pay.naver.com/_next/data/bid123/payment/{pay_id}.json")
}

fn list_body(total: u32, ids: &[&str]) -> String {
    let items: Vec<String> = ids.iter().map(|id| format!(r#"{{"id":"{id}"}}"#)).collect();
    format!(
        r#"{{"result":{{"totalPage":{total},"items":[{}]}}}}"#,
        items.join(",")
    )
}

fn detail_body(pay_id: &str, paid_at: &str, amount: i64) -> String {
    format!(
        r#"{{"pageProps":{{"payment":{{
            "payId":"{pay_id}","paidAt":"{paid_at}",
            "merchant":{{"name":"가게"}},
            "productName":"상품","totalAmount":{amount}
        }}}}}}"#
    )
}

async fn make_session(
    pool: &sqlx::SqlitePool,
    proxy: Arc<ScriptedProxy>,
    cancel: CancellationToken,
) -> (CollectionSession, String) {
    let account_id = seed_account(pool, Provider::Naver, "curl 'https://a' -b 'SID=abc'").await;
    let session = CollectionSession::new(
        account_id.clone(),
        adapter_for(Provider::Naver),
        Arc::new(SqliteCredentialStore::new(pool.clone())),
        proxy,
        cancel,
    );
    (session, account_id)
}

async fn run_status_in_db(pool: &sqlx::SqlitePool, run_id: &str) -> String {
    sqlx::query("SELECT status FROM runs WHERE run_id = ?")
        .bind(run_id)
        .fetch_one(pool)
        .await
        .unwrap()
        .get("status")
}

/// Three pages of history, cancelled while page 2 is being worked. The
/// stored slice must be contiguous from the oldest payment, and no item
/// of page 1 may ever have been requested.
#[tokio::test]
async fn test_cancellation_leaves_contiguous_oldest_first_slice() {
    let pool = create_test_pool().await;
    let cancel = CancellationToken::new();

    // Pages are newest-first: page 1 holds P1,P2 and page 3 holds P5,P6.
    let proxy = Arc::new(
        ScriptedProxy::new()
            .respond(BUILD_PAGE, 200, BUILD_PAGE_HTML)
            .respond(&list_url(1), 200, &list_body(3, &["P1", "P2"]))
            .respond(&list_url(2), 200, &list_body(3, &["P3", "P4"]))
            .respond(&list_url(3), 200, &list_body(3, &["P5", "P6"]))
            .respond(&detail_url("P3"), 200, &detail_body("P3", "2024-02-01T00:00:00+09:00", 300))
            .respond(&detail_url("P4"), 200, &detail_body("P4", "2024-02-02T00:00:00+09:00", 400))
            .respond(&detail_url("P5"), 200, &detail_body("P5", "2024-01-01T00:00:00+09:00", 500))
            .respond(&detail_url("P6"), 200, &detail_body("P6", "2024-01-02T00:00:00+09:00", 600))
            .cancel_on("payment/P4.json", cancel.clone()),
    );

    let (session, account_id) = make_session(&pool, Arc::clone(&proxy), cancel).await;
    let report = run_collection(&pool, &session, &LogObserver).await.unwrap();

    assert_eq!(report.status, RunStatus::Stopped);
    assert_eq!(report.total_pages, 3);
    // Page 3 (P6, P5) and one item of page 2 (P4) made it through.
    assert_eq!(report.processed, 3);
    assert!(report.processed < report.discovered);
    assert_eq!(report.succeeded, 3);

    let stored = storage::list_payments(&pool, &account_id, 10, 0).await.unwrap();
    let mut ids: Vec<_> = stored.iter().map(|p| p.pay_id.clone()).collect();
    ids.sort();
    assert_eq!(ids, ["P4", "P5", "P6"]);

    // Page 1's list was only fetched for discovery and its items were
    // never touched.
    let urls = proxy.requested_urls();
    assert_eq!(urls.iter().filter(|u| **u == list_url(1)).count(), 1);
    assert!(!urls.iter().any(|u| u.contains("payment/P1.json")));
    assert!(!urls.iter().any(|u| u.contains("payment/P2.json")));

    assert_eq!(run_status_in_db(&pool, &report.run_id).await, "stopped");
}

/// A failing detail endpoint costs that one item; the run still completes
/// and stores everything else.
#[tokio::test]
async fn test_failed_item_is_skipped_and_run_completes() {
    let pool = create_test_pool().await;
    let proxy = Arc::new(
        ScriptedProxy::new()
            .respond(BUILD_PAGE, 200, BUILD_PAGE_HTML)
            .respond(&list_url(1), 200, &list_body(1, &["P1", "P2", "P3"]))
            .respond(&detail_url("P1"), 200, &detail_body("P1", "2024-03-03T00:00:00+09:00", 100))
            .respond(&detail_url("P2"), 500, "")
            .respond(&detail_url("P3"), 200, &detail_body("P3", "2024-03-01T00:00:00+09:00", 300)),
    );

    let (session, account_id) =
        make_session(&pool, Arc::clone(&proxy), CancellationToken::new()).await;
    let report = run_collection(&pool, &session, &LogObserver).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.discovered, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);

    let stored = storage::list_payments(&pool, &account_id, 10, 0).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|p| p.pay_id != "P2"));

    assert_eq!(run_status_in_db(&pool, &report.run_id).await, "completed");
}

/// The build-id page serving the login page means the session is stale:
/// the run fails terminally and is recorded as failed.
#[tokio::test]
async fn test_login_page_during_run_is_terminal() {
    let pool = create_test_pool().await;
    let proxy = Arc::new(
        ScriptedProxy::new()
            .respond(BUILD_PAGE, 200, "<title>네이버 : 로그인</title>")
            .respond(&list_url(1), 200, &list_body(1, &["P1"])),
    );

    let (session, _) = make_session(&pool, Arc::clone(&proxy), CancellationToken::new()).await;
    let err = run_collection(&pool, &session, &LogObserver).await.unwrap_err();
    assert!(matches!(
        err,
        CollectError::CredentialsExpired {
            provider: Provider::Naver
        }
    ));

    let status: String = sqlx::query("SELECT status FROM runs ORDER BY started_at DESC")
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("status");
    assert_eq!(status, "failed");
}

/// Discovery failing on the first page ends the run before any traversal.
#[tokio::test]
async fn test_first_page_discovery_failure_is_terminal() {
    let pool = create_test_pool().await;
    let proxy = Arc::new(ScriptedProxy::new().respond(&list_url(1), 503, ""));

    let (session, _) = make_session(&pool, Arc::clone(&proxy), CancellationToken::new()).await;
    let err = run_collection(&pool, &session, &LogObserver).await.unwrap_err();
    assert!(matches!(err, CollectError::UpstreamError { status: 503, .. }));

    // Nothing beyond the discovery fetch went out.
    assert_eq!(proxy.requested_urls(), vec![list_url(1)]);
}

/// Headers are re-read from the store per request, so a refresh between
/// runs is picked up without rebuilding anything.
#[tokio::test]
async fn test_credential_refresh_observed_on_next_run() {
    use payfetch::credentials::CredentialProvider;

    let pool = create_test_pool().await;
    let proxy = Arc::new(
        ScriptedProxy::new()
            .respond(BUILD_PAGE, 200, BUILD_PAGE_HTML)
            .respond(&list_url(1), 200, &list_body(1, &["P1"]))
            .respond(&detail_url("P1"), 200, &detail_body("P1", "2024-03-01T00:00:00+09:00", 100)),
    );

    let (session, account_id) =
        make_session(&pool, Arc::clone(&proxy), CancellationToken::new()).await;
    run_collection(&pool, &session, &LogObserver).await.unwrap();

    let first_run_requests = proxy.requests.lock().unwrap().len();
    for request in proxy.requests.lock().unwrap().iter() {
        assert_eq!(request.headers.get("Cookie").map(String::as_str), Some("SID=abc"));
    }

    let store = SqliteCredentialStore::new(pool.clone());
    store
        .refresh(&account_id, "curl 'https://a' -b 'SID=rotated'")
        .await
        .unwrap();

    let session = CollectionSession::new(
        account_id,
        adapter_for(Provider::Naver),
        Arc::new(SqliteCredentialStore::new(pool.clone())),
        Arc::clone(&proxy) as Arc<dyn payfetch::proxy::ProxyClient>,
        CancellationToken::new(),
    );
    run_collection(&pool, &session, &LogObserver).await.unwrap();

    let requests = proxy.requests.lock().unwrap();
    for request in requests.iter().skip(first_run_requests) {
        assert_eq!(
            request.headers.get("Cookie").map(String::as_str),
            Some("SID=rotated")
        );
    }
}
