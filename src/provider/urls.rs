//! Provider URL templates and placeholder substitution.
//!
//! Each provider configures up to four templates (list, detail, local-pay
//! detail, build-id HTML page) with named placeholders: `{page}`,
//! `{paymentId}`, `{orderId}`, `{buildId}`. Substitution is literal string
//! replacement; a template lacking a given placeholder is returned
//! unchanged, which lets providers ignore pagination on their list
//! endpoint. A rendered URL that still contains a placeholder is an error,
//! never a URL with a literal `{...}` in it.

use crate::error_handling::CollectError;
use crate::provider::Provider;

/// The kinds of endpoint URL a provider can configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Paginated payment/order list endpoint.
    List,
    /// Per-payment detail endpoint.
    Detail,
    /// Detail endpoint for the local-pay variant, keyed by order number.
    LocalDetail,
    /// Server-rendered HTML page carrying the deploy build identifier.
    BuildIdPage,
}

impl UrlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlKind::List => "list",
            UrlKind::Detail => "detail",
            UrlKind::LocalDetail => "local detail",
            UrlKind::BuildIdPage => "build-id page",
        }
    }
}

/// A URL template with named `{placeholder}` tokens.
#[derive(Debug, Clone, Copy)]
pub struct UrlTemplate {
    template: &'static str,
}

impl UrlTemplate {
    pub const fn new(template: &'static str) -> Self {
        UrlTemplate { template }
    }

    /// Substitutes the given variables and verifies nothing is left over.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String, CollectError> {
        let mut out = self.template.to_string();
        for (name, value) in vars {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        if let Some(placeholder) = first_placeholder(&out) {
            return Err(CollectError::UnresolvedPlaceholder {
                placeholder: placeholder.to_string(),
            });
        }
        Ok(out)
    }
}

/// Returns the name of the first `{placeholder}` in a string, if any.
fn first_placeholder(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let rest = &s[start + 1..];
    let end = rest.find('}')?;
    Some(&rest[..end])
}

/// The URL catalog for one provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderUrls {
    provider: Provider,
    list: Option<UrlTemplate>,
    detail: Option<UrlTemplate>,
    local_detail: Option<UrlTemplate>,
    build_id_page: Option<UrlTemplate>,
}

impl ProviderUrls {
    pub const fn new(
        provider: Provider,
        list: Option<UrlTemplate>,
        detail: Option<UrlTemplate>,
        local_detail: Option<UrlTemplate>,
        build_id_page: Option<UrlTemplate>,
    ) -> Self {
        ProviderUrls {
            provider,
            list,
            detail,
            local_detail,
            build_id_page,
        }
    }

    fn template(&self, kind: UrlKind) -> Result<&UrlTemplate, CollectError> {
        let slot = match kind {
            UrlKind::List => &self.list,
            UrlKind::Detail => &self.detail,
            UrlKind::LocalDetail => &self.local_detail,
            UrlKind::BuildIdPage => &self.build_id_page,
        };
        slot.as_ref().ok_or(CollectError::UnsupportedOperation {
            provider: self.provider,
            kind: kind.as_str(),
        })
    }

    /// Builds the list URL for a page number.
    pub fn list_url(&self, page: u32) -> Result<String, CollectError> {
        self.template(UrlKind::List)?
            .render(&[("page", &page.to_string())])
    }

    /// Builds a detail URL.
    ///
    /// Selection rule: the local-pay variant (keyed by order number) is used
    /// when `local` is set and an order number is available; otherwise the
    /// standard detail template keyed by payment id.
    pub fn detail_url(
        &self,
        payment_id: &str,
        order_no: Option<&str>,
        local: bool,
        build_id: Option<&str>,
    ) -> Result<String, CollectError> {
        let mut vars: Vec<(&str, &str)> = vec![("paymentId", payment_id)];
        if let Some(order_no) = order_no {
            vars.push(("orderId", order_no));
        }
        if let Some(build_id) = build_id {
            vars.push(("buildId", build_id));
        }
        let kind = if local && order_no.is_some() {
            UrlKind::LocalDetail
        } else {
            UrlKind::Detail
        };
        self.template(kind)?.render(&vars)
    }

    /// Builds the build-id HTML page URL, substituting the context key when
    /// the template requires one.
    pub fn build_id_page_url(&self, context: Option<&str>) -> Result<String, CollectError> {
        let mut vars: Vec<(&str, &str)> = Vec::new();
        if let Some(context) = context {
            vars.push(("orderId", context));
        }
        match self.template(UrlKind::BuildIdPage)?.render(&vars) {
            Ok(url) => Ok(url),
            // An unresolved placeholder here means the caller failed to
            // supply the provider's required disambiguator.
            Err(CollectError::UnresolvedPlaceholder { .. }) => {
                Err(CollectError::MissingContext {
                    provider: self.provider,
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: UrlTemplate = UrlTemplate::new("https://pay.example.com/api/history?page={page}");
    const DETAIL: UrlTemplate =
        UrlTemplate::new("https://pay.example.com/_next/data/{buildId}/payment/{paymentId}.json");
    const LOCAL: UrlTemplate =
        UrlTemplate::new("https://pay.example.com/_next/data/{buildId}/localpay/{orderId}.json");

    fn urls() -> ProviderUrls {
        ProviderUrls::new(
            Provider::Naver,
            Some(LIST),
            Some(DETAIL),
            Some(LOCAL),
            None,
        )
    }

    #[test]
    fn test_list_url_contains_literal_page() {
        let url = urls().list_url(7).unwrap();
        assert!(url.contains("page=7"));
        assert!(!url.contains("{page}"));
    }

    #[test]
    fn test_template_without_placeholder_is_unchanged() {
        let template = UrlTemplate::new("https://pay.example.com/api/history");
        let url = template.render(&[("page", "3")]).unwrap();
        assert_eq!(url, "https://pay.example.com/api/history");
    }

    #[test]
    fn test_unresolved_placeholder_fails() {
        let err = urls().detail_url("PAY1", None, false, None).unwrap_err();
        assert!(matches!(
            err,
            CollectError::UnresolvedPlaceholder { ref placeholder } if placeholder == "buildId"
        ));
    }

    #[test]
    fn test_detail_url_selects_local_variant() {
        let url = urls()
            .detail_url("PAY1", Some("ORD9"), true, Some("abc123"))
            .unwrap();
        assert!(url.contains("/localpay/ORD9.json"));
        assert!(url.contains("/abc123/"));
    }

    #[test]
    fn test_local_flag_without_order_no_falls_back_to_detail() {
        let url = urls()
            .detail_url("PAY1", None, true, Some("abc123"))
            .unwrap();
        assert!(url.contains("/payment/PAY1.json"));
    }

    #[test]
    fn test_missing_template_is_unsupported_operation() {
        let err = urls().build_id_page_url(None).unwrap_err();
        assert!(matches!(
            err,
            CollectError::UnsupportedOperation { kind: "build-id page", .. }
        ));
    }

    #[test]
    fn test_build_id_page_missing_context() {
        let with_context_page = ProviderUrls::new(
            Provider::Coupang,
            None,
            None,
            None,
            Some(UrlTemplate::new(
                "https://order.example.com/details?orderId={orderId}",
            )),
        );
        let err = with_context_page.build_id_page_url(None).unwrap_err();
        assert!(matches!(err, CollectError::MissingContext { .. }));

        let url = with_context_page.build_id_page_url(Some("123")).unwrap();
        assert!(url.ends_with("orderId=123"));
    }
}
