//! Naver Pay adapter.
//!
//! List data comes from a JSON history endpoint; per-payment detail is
//! served through Next.js data routes, which require the deployment's build
//! identifier in the path. The build id is shared across all detail pages,
//! so the "default" context is always used.

use serde_json::Value;

use super::json;
use super::urls::{ProviderUrls, UrlTemplate};
use super::{BuildIdPatterns, ListPage, ListedItem, Provider, ProviderAdapter};
use crate::error_handling::CollectError;
use crate::model::{UnifiedPayment, UnifiedPaymentItem};

const LIST: UrlTemplate =
    UrlTemplate::new("https://new-m.pay.naver.com/api/payments/history?page={page}");
const DETAIL: UrlTemplate =
    UrlTemplate::new("https://new-m.pay.naver.com/_next/data/{buildId}/payment/{paymentId}.json");
const LOCAL_DETAIL: UrlTemplate =
    UrlTemplate::new("https://new-m.pay.naver.com/_next/data/{buildId}/localpay/{orderId}.json");
const BUILD_ID_PAGE: UrlTemplate = UrlTemplate::new("https://new-m.pay.naver.com/payment");

const URLS: ProviderUrls = ProviderUrls::new(
    Provider::Naver,
    Some(LIST),
    Some(DETAIL),
    Some(LOCAL_DETAIL),
    Some(BUILD_ID_PAGE),
);

/// Service type tag for payments whose detail lives on the local-pay route.
const LOCAL_PAY_SERVICE_TYPE: &str = "LOCAL_PAY";

pub struct NaverAdapter;

impl NaverAdapter {
    pub fn new() -> Self {
        NaverAdapter
    }
}

impl Default for NaverAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderAdapter for NaverAdapter {
    fn provider(&self) -> Provider {
        Provider::Naver
    }

    fn urls(&self) -> &ProviderUrls {
        &URLS
    }

    fn needs_build_id(&self) -> bool {
        true
    }

    fn build_id_patterns(&self) -> BuildIdPatterns {
        BuildIdPatterns {
            primary: r#"/_next/static/([A-Za-z0-9_-]+)/_buildManifest\.js"#,
            fallback: Some(r#""buildId"\s*:\s*"([^"]+)""#),
        }
    }

    fn build_id_context(&self, _item: &ListedItem) -> Option<String> {
        None
    }

    fn login_marker(&self) -> &'static str {
        "네이버 : 로그인"
    }

    fn reverse_page_order(&self) -> bool {
        true
    }

    fn detail_url(
        &self,
        item: &ListedItem,
        build_id: Option<&str>,
    ) -> Result<String, CollectError> {
        let local = item.service_type.as_deref() == Some(LOCAL_PAY_SERVICE_TYPE);
        self.urls()
            .detail_url(&item.payment_id, item.order_no.as_deref(), local, build_id)
    }

    fn parse_list(&self, body: &str) -> Result<ListPage, CollectError> {
        let value: Value =
            serde_json::from_str(body).map_err(|_| CollectError::NormalizationError {
                field: "result".to_string(),
            })?;
        let total_pages = json::integer(&value, "result.totalPage")
            .and_then(|n| u32::try_from(n).ok());
        let items = value
            .get("result")
            .and_then(|r| r.get("items"))
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        // Entries without an id cannot be fetched; skip them.
                        let payment_id = json::string(entry, "id")?;
                        Some(ListedItem {
                            payment_id,
                            order_no: json::string(entry, "orderNo"),
                            service_type: json::string(entry, "serviceType"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ListPage { total_pages, items })
    }

    fn parse_detail(
        &self,
        item: &ListedItem,
        body: &str,
    ) -> Result<UnifiedPayment, CollectError> {
        let value: Value =
            serde_json::from_str(body).map_err(|_| CollectError::NormalizationError {
                field: "pageProps.payment".to_string(),
            })?;
        let payment = json::path(&value, "pageProps.payment").ok_or_else(|| {
            CollectError::NormalizationError {
                field: "pageProps.payment".to_string(),
            }
        })?;

        let pay_id = json::required_string(payment, "payId")?;
        let paid_at = json::required_string(payment, "paidAt")?;
        let merchant_name = json::required_string(payment, "merchant.name")?;
        let total_amount = json::required_money(payment, "totalAmount")?;

        let product_name = json::string(payment, "productName");
        let product_count = json::integer(payment, "productCount").map(|n| n as i32);

        let mut items = parse_items(payment);
        if items.is_empty() {
            if let Some(name) = product_name.clone() {
                items.push(synthetic_item(name, product_count, total_amount));
            }
        }

        Ok(UnifiedPayment {
            id: None,
            provider: Provider::Naver,
            pay_id,
            external_id: json::string(payment, "externalId"),
            service_type: json::string(payment, "serviceType")
                .or_else(|| item.service_type.clone()),
            status_code: json::string(payment, "status.code"),
            status_text: json::string(payment, "status.text"),
            status_color: json::string(payment, "status.color"),
            paid_at,
            merchant_name,
            merchant_tel: json::string(payment, "merchant.tel"),
            merchant_url: json::string(payment, "merchant.url"),
            merchant_image_url: json::string(payment, "merchant.imageUrl"),
            product_name,
            product_count,
            total_amount,
            discount_amount: json::money(payment, "discountAmount"),
            rest_amount: json::money(payment, "restAmount"),
            items,
        })
    }
}

fn parse_items(payment: &Value) -> Vec<UnifiedPaymentItem> {
    payment
        .get("items")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let product_name = json::string(entry, "productName")?;
                    Some((product_name, entry))
                })
                .enumerate()
                .map(|(idx, (product_name, entry))| UnifiedPaymentItem {
                    line_no: idx as i32 + 1,
                    product_id: json::string(entry, "productId"),
                    brand_name: None,
                    product_name,
                    image_url: json::string(entry, "imageUrl"),
                    info_url: json::string(entry, "infoUrl"),
                    quantity: json::integer(entry, "quantity")
                        .map(|q| q.max(1) as i32)
                        .unwrap_or(1),
                    unit_price: json::money(entry, "unitPrice"),
                    line_amount: json::money(entry, "lineAmount"),
                    rest_amount: json::money(entry, "restAmount"),
                    memo: json::string(entry, "memo"),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Builds the single synthetic item used when the payload has no item array
/// but the payment carries product-level info.
fn synthetic_item(
    product_name: String,
    product_count: Option<i32>,
    total_amount: i64,
) -> UnifiedPaymentItem {
    UnifiedPaymentItem {
        line_no: 1,
        product_id: None,
        brand_name: None,
        product_name,
        image_url: None,
        info_url: None,
        quantity: product_count.filter(|c| *c >= 1).unwrap_or(1),
        unit_price: None,
        line_amount: Some(total_amount),
        rest_amount: None,
        memo: None,
    }
}
