//! Provider adapters.
//!
//! All provider-specific knowledge lives behind the [`ProviderAdapter`]
//! trait: endpoint URLs, payload parsing, build-id discovery patterns, and
//! traversal order. The collector itself is provider-agnostic and only
//! calls through this interface.

mod coupang;
mod naver;
pub mod urls;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error_handling::CollectError;
use crate::model::UnifiedPayment;

pub use coupang::CoupangAdapter;
pub use naver::NaverAdapter;
pub use urls::{ProviderUrls, UrlKind, UrlTemplate};

/// Supported commerce providers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Naver Pay payment history.
    Naver,
    /// Coupang order history.
    Coupang,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Naver => "naver",
            Provider::Coupang => "coupang",
        }
    }

    /// Parses the stored provider tag.
    pub fn parse(s: &str) -> Option<Provider> {
        match s {
            "naver" => Some(Provider::Naver),
            "coupang" => Some(Provider::Coupang),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry from a provider's list endpoint, enough to fetch its detail.
#[derive(Debug, Clone)]
pub struct ListedItem {
    /// Provider-native payment/order identifier.
    pub payment_id: String,
    /// Order number, for providers whose local-pay variant is keyed by it.
    pub order_no: Option<String>,
    /// Provider service type tag, when the list reports one.
    pub service_type: Option<String>,
}

/// A parsed list page.
#[derive(Debug, Clone)]
pub struct ListPage {
    /// Total page count reported by the provider, when parseable.
    pub total_pages: Option<u32>,
    /// Items on this page, in upstream order.
    pub items: Vec<ListedItem>,
}

/// Regex pair for extracting a deploy build identifier from provider HTML.
///
/// The primary pattern is tuned to the provider's expected asset path; the
/// fallback, when present, is a more permissive pattern applied to the same
/// HTML when the primary fails. Both must expose the identifier as capture
/// group 1. These are per-provider and replaceable by design: they track
/// undocumented HTML structure and break independently.
#[derive(Debug, Clone, Copy)]
pub struct BuildIdPatterns {
    /// Primary extraction pattern.
    pub primary: &'static str,
    /// More permissive fallback pattern, if the provider defines one.
    pub fallback: Option<&'static str>,
}

/// Everything the collector needs to know about one provider.
pub trait ProviderAdapter: Send + Sync {
    /// The provider this adapter implements.
    fn provider(&self) -> Provider;

    /// URL catalog for this provider.
    fn urls(&self) -> &ProviderUrls;

    /// Whether detail endpoints require a deploy build identifier.
    fn needs_build_id(&self) -> bool;

    /// Build-id extraction patterns. Only meaningful when
    /// [`needs_build_id`](Self::needs_build_id) returns true.
    fn build_id_patterns(&self) -> BuildIdPatterns;

    /// Context key selecting the build-id HTML page for an item, for
    /// providers whose build id varies per order. `None` means the shared
    /// "default" page.
    fn build_id_context(&self, item: &ListedItem) -> Option<String>;

    /// Marker string present on the provider's login page. Finding it in a
    /// fetched HTML body means the session has expired.
    fn login_marker(&self) -> &'static str;

    /// Whether pages must be processed from last to first. Providers order
    /// newest-first by page; walking oldest pages first makes an
    /// interrupted run's partial result contiguous from the start of
    /// history.
    fn reverse_page_order(&self) -> bool;

    /// Builds the list URL for a page.
    fn list_url(&self, page: u32) -> Result<String, CollectError> {
        self.urls().list_url(page)
    }

    /// Builds the detail URL for a listed item.
    fn detail_url(
        &self,
        item: &ListedItem,
        build_id: Option<&str>,
    ) -> Result<String, CollectError>;

    /// Parses a list-endpoint payload.
    fn parse_list(&self, body: &str) -> Result<ListPage, CollectError>;

    /// Normalizes a detail-endpoint payload into the canonical schema.
    fn parse_detail(
        &self,
        item: &ListedItem,
        body: &str,
    ) -> Result<UnifiedPayment, CollectError>;
}

/// Returns the adapter for a provider.
pub fn adapter_for(provider: Provider) -> Box<dyn ProviderAdapter> {
    match provider {
        Provider::Naver => Box::new(NaverAdapter::new()),
        Provider::Coupang => Box::new(CoupangAdapter::new()),
    }
}

/// Shared JSON helpers for the adapters.
pub(crate) mod json {
    use serde_json::Value;

    use crate::error_handling::CollectError;

    /// Walks a dotted path through nested objects.
    pub fn path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
        let mut current = value;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        match current {
            Value::Null => None,
            other => Some(other),
        }
    }

    pub fn string(value: &Value, p: &str) -> Option<String> {
        match path(value, p)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn integer(value: &Value, p: &str) -> Option<i64> {
        path(value, p)?.as_i64()
    }

    /// Extracts a required string field, reporting its path on failure.
    pub fn required_string(value: &Value, p: &str) -> Result<String, CollectError> {
        string(value, p).ok_or_else(|| CollectError::NormalizationError {
            field: p.to_string(),
        })
    }

    /// Extracts a required integer field, reporting its path on failure.
    pub fn required_integer(value: &Value, p: &str) -> Result<i64, CollectError> {
        integer(value, p).ok_or_else(|| CollectError::NormalizationError {
            field: p.to_string(),
        })
    }

    /// Extracts an optional money field. Money is a non-negative integer in
    /// the smallest currency unit; a negative value is treated as absent.
    pub fn money(value: &Value, p: &str) -> Option<i64> {
        integer(value, p).filter(|n| *n >= 0)
    }

    /// Extracts a required money field. A missing or negative value fails
    /// normalization, reporting the field's path.
    pub fn required_money(value: &Value, p: &str) -> Result<i64, CollectError> {
        let n = required_integer(value, p)?;
        if n < 0 {
            return Err(CollectError::NormalizationError {
                field: p.to_string(),
            });
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_tag_round_trip() {
        assert_eq!(Provider::parse("naver"), Some(Provider::Naver));
        assert_eq!(Provider::parse("coupang"), Some(Provider::Coupang));
        assert_eq!(Provider::parse("unknown"), None);
        assert_eq!(Provider::Naver.to_string(), "naver");
    }

    #[test]
    fn test_adapter_for_returns_matching_provider() {
        assert_eq!(adapter_for(Provider::Naver).provider(), Provider::Naver);
        assert_eq!(
            adapter_for(Provider::Coupang).provider(),
            Provider::Coupang
        );
    }

    #[test]
    fn test_json_path_helpers() {
        let value: serde_json::Value =
            serde_json::from_str(r#"{"a":{"b":{"c":"x","n":42,"null":null}}}"#).unwrap();
        assert_eq!(json::string(&value, "a.b.c").as_deref(), Some("x"));
        assert_eq!(json::integer(&value, "a.b.n"), Some(42));
        assert!(json::path(&value, "a.b.null").is_none());
        assert!(json::string(&value, "a.missing").is_none());
        assert!(json::required_string(&value, "a.b.missing").is_err());
    }

    #[test]
    fn test_money_helpers_reject_negative_amounts() {
        let value: serde_json::Value =
            serde_json::from_str(r#"{"amount":12000,"refund":-3000}"#).unwrap();
        assert_eq!(json::money(&value, "amount"), Some(12000));
        assert_eq!(json::money(&value, "refund"), None);
        assert_eq!(json::required_money(&value, "amount").unwrap(), 12000);
        assert!(matches!(
            json::required_money(&value, "refund").unwrap_err(),
            CollectError::NormalizationError { ref field } if field == "refund"
        ));
    }
}
