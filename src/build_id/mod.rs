//! Deploy build-id discovery.
//!
//! Next.js data routes embed the deployment's build identifier in the path.
//! The identifier is not published anywhere; it has to be scraped out of a
//! server-rendered HTML page with the provider's regex patterns. Resolved
//! ids are cached per context key so a run fetches each HTML page at most
//! once. The cache lives for a single collection run: a mid-run redeploy
//! surfaces as detail failures and the next run re-resolves.

use std::collections::HashMap;
use std::sync::Mutex;

use regex::Regex;

use crate::error_handling::CollectError;
use crate::provider::ProviderAdapter;
use crate::proxy::{ProxyClient, ProxyRequest};

/// Cache key for providers whose build id is shared across all pages.
const DEFAULT_CONTEXT: &str = "default";

/// Resolves and caches deploy build identifiers for one collection run.
pub struct BuildIdResolver {
    cache: Mutex<HashMap<String, String>>,
}

impl BuildIdResolver {
    pub fn new() -> Self {
        BuildIdResolver {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the build id for a context, fetching and extracting it on
    /// first use.
    ///
    /// The login-page check runs before extraction so an expired session
    /// reports [`CollectError::CredentialsExpired`] rather than a spurious
    /// `BuildIdNotFound`.
    pub async fn resolve(
        &self,
        adapter: &dyn ProviderAdapter,
        context: Option<&str>,
        proxy: &dyn ProxyClient,
        headers: &HashMap<String, String>,
    ) -> Result<String, CollectError> {
        let key = context.unwrap_or(DEFAULT_CONTEXT).to_string();
        if let Ok(cache) = self.cache.lock() {
            if let Some(id) = cache.get(&key) {
                return Ok(id.clone());
            }
        }

        let url = adapter.urls().build_id_page_url(context)?;
        log::debug!("Resolving build id for {} via {url}", adapter.provider());
        let response = proxy
            .execute(ProxyRequest::get(&url, headers.clone()))
            .await?;
        if !response.is_success() {
            return Err(CollectError::UpstreamError {
                status: response.status,
                url,
            });
        }

        if response.body.contains(adapter.login_marker()) {
            return Err(CollectError::CredentialsExpired {
                provider: adapter.provider(),
            });
        }

        let id = extract_build_id(adapter, &response.body).ok_or_else(|| {
            CollectError::BuildIdNotFound {
                provider: adapter.provider(),
                context: key.clone(),
            }
        })?;
        log::debug!("Resolved build id {id} for context {key}");

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, id.clone());
        }
        Ok(id)
    }
}

impl Default for BuildIdResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_build_id(adapter: &dyn ProviderAdapter, html: &str) -> Option<String> {
    let patterns = adapter.build_id_patterns();
    if let Some(id) = capture_first(patterns.primary, html) {
        return Some(id);
    }
    patterns
        .fallback
        .and_then(|pattern| capture_first(pattern, html))
}

fn capture_first(pattern: &str, html: &str) -> Option<String> {
    // Patterns are compile-time constants; a failure to parse is a
    // programming error and surfaces as "no match".
    let re = Regex::new(pattern).ok()?;
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
