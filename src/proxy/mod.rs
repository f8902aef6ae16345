//! HTTP transport boundary.
//!
//! [`ProxyClient`] is the sole network boundary of the pipeline: everything
//! above it works with plain request/response values, which is what makes
//! the collector and the build-id resolver testable against scripted
//! responses. The production implementation wraps `reqwest` with redirect
//! following enabled and reports the final resolved URL.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error_handling::CollectError;

/// A request handed to the transport.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// Target URL.
    pub url: String,
    /// HTTP method, uppercase.
    pub method: String,
    /// Request headers, `Cookie` included.
    pub headers: HashMap<String, String>,
    /// Optional request body.
    pub body: Option<String>,
}

impl ProxyRequest {
    /// Convenience constructor for the common authenticated GET.
    pub fn get(url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        ProxyRequest {
            url: url.into(),
            method: "GET".to_string(),
            headers,
            body: None,
        }
    }
}

/// The transport's view of a response.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
    /// Final URL after redirects, when known.
    pub final_url: Option<String>,
    /// Response headers, in arrival order.
    pub response_headers: Vec<(String, String)>,
}

impl ProxyResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes HTTP requests on behalf of the pipeline.
///
/// Implementations must follow redirects and return the final resolved URL.
/// Timeouts are the implementation's responsibility; the collector has no
/// internal timeout beyond its inter-request delays.
#[async_trait]
pub trait ProxyClient: Send + Sync {
    async fn execute(&self, request: ProxyRequest) -> Result<ProxyResponse, CollectError>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestProxyClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestProxyClient {
    pub fn new(client: Arc<reqwest::Client>) -> Self {
        ReqwestProxyClient { client }
    }
}

#[async_trait]
impl ProxyClient for ReqwestProxyClient {
    async fn execute(&self, request: ProxyRequest) -> Result<ProxyResponse, CollectError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| CollectError::Transport(format!("invalid method: {e}")))?;

        let mut builder = self.client.request(method, &request.url);
        for (key, value) in &request.headers {
            match (
                reqwest::header::HeaderName::from_bytes(key.as_bytes()),
                reqwest::header::HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    builder = builder.header(name, value);
                }
                _ => {
                    log::warn!("Skipping invalid header: {key}");
                }
            }
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| CollectError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let final_url = Some(response.url().to_string());
        let response_headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| CollectError::Transport(e.to_string()))?;

        Ok(ProxyResponse {
            status,
            body,
            final_url,
            response_headers,
        })
    }
}
