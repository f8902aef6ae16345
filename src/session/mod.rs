//! Collection session state.
//!
//! A [`CollectionSession`] bundles everything one run needs: the adapter,
//! the credential source, the transport, a run-scoped build-id cache and a
//! cancellation token. Nothing here is global; concurrent runs against
//! different accounts each get their own session, and [`ActiveRuns`]
//! enforces that at most one run per account is in flight.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::build_id::BuildIdResolver;
use crate::credentials::CredentialProvider;
use crate::error_handling::CollectError;
use crate::provider::{ListedItem, ProviderAdapter};
use crate::proxy::ProxyClient;

/// Registry of accounts with a collection currently in flight.
#[derive(Clone, Default)]
pub struct ActiveRuns {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an account active. Fails if a run is already in flight.
    pub fn begin(&self, account_id: &str) -> Result<RunGuard, CollectError> {
        let mut active = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !active.insert(account_id.to_string()) {
            return Err(CollectError::CollectionAlreadyRunning {
                account_id: account_id.to_string(),
            });
        }
        Ok(RunGuard {
            registry: Arc::clone(&self.inner),
            account_id: account_id.to_string(),
        })
    }
}

/// Releases the account slot when dropped, on any exit path.
#[derive(Debug)]
pub struct RunGuard {
    registry: Arc<Mutex<HashSet<String>>>,
    account_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut active = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&self.account_id);
    }
}

/// Everything one collection run works with.
pub struct CollectionSession {
    account_id: String,
    adapter: Box<dyn ProviderAdapter>,
    credentials: Arc<dyn CredentialProvider>,
    proxy: Arc<dyn ProxyClient>,
    build_ids: BuildIdResolver,
    cancel: CancellationToken,
}

impl CollectionSession {
    pub fn new(
        account_id: String,
        adapter: Box<dyn ProviderAdapter>,
        credentials: Arc<dyn CredentialProvider>,
        proxy: Arc<dyn ProxyClient>,
        cancel: CancellationToken,
    ) -> Self {
        CollectionSession {
            account_id,
            adapter,
            credentials,
            proxy,
            build_ids: BuildIdResolver::new(),
            cancel,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn adapter(&self) -> &dyn ProviderAdapter {
        self.adapter.as_ref()
    }

    pub fn proxy(&self) -> &dyn ProxyClient {
        self.proxy.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current headers for this account, read from the store at call time.
    ///
    /// Re-reading on every use is what makes a mid-run credential refresh
    /// take effect on the very next request.
    pub async fn headers(&self) -> Result<HashMap<String, String>, CollectError> {
        self.credentials.headers(&self.account_id).await
    }

    /// Resolves the build id needed to fetch an item's detail, if the
    /// provider requires one.
    pub async fn build_id_for(
        &self,
        item: &ListedItem,
    ) -> Result<Option<String>, CollectError> {
        if !self.adapter.needs_build_id() {
            return Ok(None);
        }
        let context = self.adapter.build_id_context(item);
        let headers = self.headers().await?;
        let id = self
            .build_ids
            .resolve(
                self.adapter.as_ref(),
                context.as_deref(),
                self.proxy.as_ref(),
                &headers,
            )
            .await?;
        Ok(Some(id))
    }
}
