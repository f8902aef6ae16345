//! Error type definitions.
//!
//! This module defines the collection error taxonomy and the counter
//! categories used for per-run statistics.

use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

use crate::provider::Provider;

/// Error types for initialization failures.
#[derive(Error, Debug)]
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] log::SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

/// Errors produced by the session-replay collection pipeline.
///
/// Per-item and per-page errors are recovered locally by the collector
/// (counted and logged, traversal continues). Only first-page discovery
/// failure, credential expiry, and explicit cancellation terminate a run.
#[derive(Error, Debug)]
pub enum CollectError {
    /// The captured curl command could not be parsed. The user must recapture.
    #[error("malformed session capture: {0}")]
    MalformedSession(String),

    /// The provider served its login page instead of the requested content.
    ///
    /// Surfaced distinctly so callers can prompt a credential refresh flow
    /// instead of showing a generic parse failure.
    #[error("credentials expired for {provider}: login page detected")]
    CredentialsExpired {
        /// Provider whose session is no longer valid.
        provider: Provider,
    },

    /// No build identifier could be extracted from the provider HTML.
    #[error("build id not found for {provider} (context: {context})")]
    BuildIdNotFound {
        /// Provider whose HTML was scanned.
        provider: Provider,
        /// Context key used to select the HTML page.
        context: String,
    },

    /// A build-id page template requires a context key that was not supplied.
    #[error("{provider} requires a context key to resolve its build id")]
    MissingContext {
        /// Provider whose template needs a context key.
        provider: Provider,
    },

    /// The upstream API answered with a non-2xx status.
    #[error("upstream error {status} from {url}")]
    UpstreamError {
        /// HTTP status code returned by the provider.
        status: u16,
        /// URL that produced the response.
        url: String,
    },

    /// A URL kind was requested that the provider does not configure.
    ///
    /// This is a programmer error and fails loudly at URL-build time.
    #[error("unsupported operation: {provider} has no {kind} endpoint")]
    UnsupportedOperation {
        /// Provider missing the template.
        provider: Provider,
        /// Endpoint kind that was requested.
        kind: &'static str,
    },

    /// A rendered URL still contained an unresolved placeholder.
    #[error("unresolved placeholder {{{placeholder}}} in URL template")]
    UnresolvedPlaceholder {
        /// Name of the placeholder left in the template.
        placeholder: String,
    },

    /// A required field was missing from a provider payload.
    #[error("normalization failed: missing required field `{field}`")]
    NormalizationError {
        /// Dotted path of the missing field.
        field: String,
    },

    /// Another collection run is already active for this account.
    #[error("a collection run is already active for account {account_id}")]
    CollectionAlreadyRunning {
        /// Account with the in-flight run.
        account_id: String,
    },

    /// No account exists with the given id.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The underlying HTTP transport failed (connect, timeout, decode).
    #[error("transport error: {0}")]
    Transport(String),

    /// A database operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl CollectError {
    /// Maps an error to the statistics bucket it should be counted under,
    /// or `None` for errors that terminate the run instead of being counted.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CollectError::UpstreamError { .. } | CollectError::Transport(_) => {
                Some(ErrorKind::FetchError)
            }
            CollectError::BuildIdNotFound { .. } | CollectError::MissingContext { .. } => {
                Some(ErrorKind::BuildIdError)
            }
            CollectError::NormalizationError { .. } => Some(ErrorKind::NormalizationError),
            CollectError::Storage(_) => Some(ErrorKind::StorageError),
            CollectError::UnsupportedOperation { .. }
            | CollectError::UnresolvedPlaceholder { .. } => Some(ErrorKind::UrlBuildError),
            _ => None,
        }
    }
}

/// Categories of recoverable failures counted during a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorKind {
    /// HTTP fetch failed (non-2xx status or transport error).
    FetchError,
    /// A list-page payload could not be parsed.
    ListParseError,
    /// Build-id discovery failed for an item.
    BuildIdError,
    /// A required field was missing from a detail payload.
    NormalizationError,
    /// Writing a normalized payment to the database failed.
    StorageError,
    /// A URL could not be built for the provider.
    UrlBuildError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FetchError => "HTTP fetch error",
            ErrorKind::ListParseError => "List page parse error",
            ErrorKind::BuildIdError => "Build id resolution error",
            ErrorKind::NormalizationError => "Normalization error",
            ErrorKind::StorageError => "Storage error",
            ErrorKind::UrlBuildError => "URL build error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_error_kind_as_str() {
        assert_eq!(ErrorKind::FetchError.as_str(), "HTTP fetch error");
        assert_eq!(
            ErrorKind::NormalizationError.as_str(),
            "Normalization error"
        );
    }

    #[test]
    fn test_all_error_kinds_have_string_representation() {
        for kind in ErrorKind::iter() {
            assert!(!kind.as_str().is_empty(), "{:?} should have a label", kind);
        }
    }

    #[test]
    fn test_terminal_errors_have_no_kind() {
        let expired = CollectError::CredentialsExpired {
            provider: Provider::Naver,
        };
        assert!(expired.kind().is_none());

        let malformed = CollectError::MalformedSession("empty".into());
        assert!(malformed.kind().is_none());
    }

    #[test]
    fn test_recoverable_errors_map_to_kinds() {
        let upstream = CollectError::UpstreamError {
            status: 500,
            url: "https://example.com".into(),
        };
        assert_eq!(upstream.kind(), Some(ErrorKind::FetchError));

        let missing = CollectError::NormalizationError {
            field: "paidAt".into(),
        };
        assert_eq!(missing.kind(), Some(ErrorKind::NormalizationError));
    }
}
