// Shared test helpers: database setup, account seeding, and a scripted
// transport for driving collection runs without a network.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use payfetch::credentials::{CredentialProvider, SqliteCredentialStore};
use payfetch::proxy::{ProxyClient, ProxyRequest, ProxyResponse};
use payfetch::run_migrations;
use payfetch::CollectError;
use payfetch::Provider;

/// Creates an in-memory test database with migrations applied.
#[allow(dead_code)]
pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Registers an account and populates its credentials from the capture.
#[allow(dead_code)]
pub async fn seed_account(pool: &SqlitePool, provider: Provider, capture: &str) -> String {
    let account_id = payfetch::storage::insert_account(pool, provider, "test", capture)
        .await
        .expect("Failed to insert account");
    let store = SqliteCredentialStore::new(pool.clone());
    store
        .refresh(&account_id, capture)
        .await
        .expect("Failed to seed credentials");
    account_id
}

/// Scripted transport: answers requests from a URL-keyed table and records
/// every request it sees.
pub struct ScriptedProxy {
    responses: HashMap<String, (u16, String)>,
    pub requests: Mutex<Vec<ProxyRequest>>,
    cancel_when: Option<(String, CancellationToken)>,
}

#[allow(dead_code)]
impl ScriptedProxy {
    pub fn new() -> Self {
        ScriptedProxy {
            responses: HashMap::new(),
            requests: Mutex::new(Vec::new()),
            cancel_when: None,
        }
    }

    pub fn respond(mut self, url: &str, status: u16, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), (status, body.to_string()));
        self
    }

    /// Cancels the token when a request URL contains the substring. The
    /// triggering request itself still succeeds, which models a user
    /// pressing stop while an item is in flight.
    pub fn cancel_on(mut self, url_fragment: &str, token: CancellationToken) -> Self {
        self.cancel_when = Some((url_fragment.to_string(), token));
        self
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect()
    }
}

#[async_trait]
impl ProxyClient for ScriptedProxy {
    async fn execute(&self, request: ProxyRequest) -> Result<ProxyResponse, CollectError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some((fragment, token)) = &self.cancel_when {
            if request.url.contains(fragment.as_str()) {
                token.cancel();
            }
        }
        match self.responses.get(&request.url) {
            Some((status, body)) => Ok(ProxyResponse {
                status: *status,
                body: body.clone(),
                final_url: Some(request.url.clone()),
                response_headers: Vec::new(),
            }),
            None => Ok(ProxyResponse {
                status: 404,
                body: String::new(),
                final_url: Some(request.url.clone()),
                response_headers: Vec::new(),
            }),
        }
    }
}
