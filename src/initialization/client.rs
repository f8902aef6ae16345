//! HTTP client initialization.

use std::sync::Arc;
use std::time::Duration;

use reqwest::ClientBuilder;

use crate::config::Config;
use crate::error_handling::InitializationError;

/// Initializes the HTTP client used for session replay.
///
/// Redirect following stays enabled: provider pages redirect to their login
/// page when the session is stale, and the login-marker check depends on
/// receiving that page's body.
pub fn init_client(config: &Config) -> Result<Arc<reqwest::Client>, InitializationError> {
    let client = ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(InitializationError::from)?;
    Ok(Arc::new(client))
}
