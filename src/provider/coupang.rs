//! Coupang adapter.
//!
//! Order detail is served through per-order Next.js data routes, so the
//! build identifier must be resolved against the specific order's HTML page
//! (the context key is the order id). Coupang reports `orderedAt` on every
//! order but `paidAt` only once settlement completes; normalization
//! substitutes the ordered time for the paid time when the latter is
//! absent.

use serde_json::Value;

use super::json;
use super::urls::{ProviderUrls, UrlTemplate};
use super::{BuildIdPatterns, ListPage, ListedItem, Provider, ProviderAdapter};
use crate::error_handling::CollectError;
use crate::model::{UnifiedPayment, UnifiedPaymentItem};

const LIST: UrlTemplate =
    UrlTemplate::new("https://mc.coupang.com/ssr/api/orders?pageIndex={page}");
const DETAIL: UrlTemplate =
    UrlTemplate::new("https://mc.coupang.com/_next/data/{buildId}/order/{paymentId}.json");
const BUILD_ID_PAGE: UrlTemplate =
    UrlTemplate::new("https://mc.coupang.com/ssr/desktop/order/details?orderId={orderId}");

const URLS: ProviderUrls = ProviderUrls::new(
    Provider::Coupang,
    Some(LIST),
    Some(DETAIL),
    None,
    Some(BUILD_ID_PAGE),
);

pub struct CoupangAdapter;

impl CoupangAdapter {
    pub fn new() -> Self {
        CoupangAdapter
    }
}

impl Default for CoupangAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderAdapter for CoupangAdapter {
    fn provider(&self) -> Provider {
        Provider::Coupang
    }

    fn urls(&self) -> &ProviderUrls {
        &URLS
    }

    fn needs_build_id(&self) -> bool {
        true
    }

    fn build_id_patterns(&self) -> BuildIdPatterns {
        BuildIdPatterns {
            primary: r#""buildId"\s*:\s*"([^"]+)""#,
            fallback: Some(r#"/_next/static/([A-Za-z0-9_-]+)/_ssgManifest\.js"#),
        }
    }

    fn build_id_context(&self, item: &ListedItem) -> Option<String> {
        // The detail page is rendered per order; its build id is cached
        // under the order id.
        Some(item.payment_id.clone())
    }

    fn login_marker(&self) -> &'static str {
        "쿠팡! 로그인"
    }

    fn reverse_page_order(&self) -> bool {
        true
    }

    fn detail_url(
        &self,
        item: &ListedItem,
        build_id: Option<&str>,
    ) -> Result<String, CollectError> {
        self.urls()
            .detail_url(&item.payment_id, None, false, build_id)
    }

    fn parse_list(&self, body: &str) -> Result<ListPage, CollectError> {
        let value: Value =
            serde_json::from_str(body).map_err(|_| CollectError::NormalizationError {
                field: "orderList".to_string(),
            })?;
        let total_pages = json::integer(&value, "totalPages")
            .and_then(|n| u32::try_from(n).ok());
        let items = value
            .get("orderList")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let payment_id = json::string(entry, "orderId")?;
                        Some(ListedItem {
                            payment_id,
                            order_no: None,
                            service_type: None,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(ListPage { total_pages, items })
    }

    fn parse_detail(
        &self,
        _item: &ListedItem,
        body: &str,
    ) -> Result<UnifiedPayment, CollectError> {
        let value: Value =
            serde_json::from_str(body).map_err(|_| CollectError::NormalizationError {
                field: "pageProps.order".to_string(),
            })?;
        let order = json::path(&value, "pageProps.order").ok_or_else(|| {
            CollectError::NormalizationError {
                field: "pageProps.order".to_string(),
            }
        })?;

        let pay_id = json::required_string(order, "orderId")?;
        let ordered_at = json::required_string(order, "orderedAt")?;
        // Settlement time is absent on fresh orders; the ordered time
        // stands in so paid_at is never empty.
        let paid_at = json::string(order, "payment.paidAt").unwrap_or(ordered_at);

        let title = json::string(order, "title");
        // Marketplace orders carry a vendor; first-party orders only a title.
        let merchant_name = json::string(order, "vendor.vendorName")
            .or_else(|| title.clone())
            .ok_or_else(|| CollectError::NormalizationError {
                field: "vendor.vendorName".to_string(),
            })?;
        let total_amount = json::required_money(order, "payment.totalPayedAmount")?;

        let mut items = parse_product_list(order);
        if items.is_empty() {
            if let Some(name) = title.clone() {
                items.push(UnifiedPaymentItem {
                    line_no: 1,
                    product_id: None,
                    brand_name: None,
                    product_name: name,
                    image_url: None,
                    info_url: None,
                    quantity: 1,
                    unit_price: None,
                    line_amount: Some(total_amount),
                    rest_amount: None,
                    memo: None,
                });
            }
        }
        let product_count = if items.is_empty() {
            None
        } else {
            Some(items.len() as i32)
        };

        Ok(UnifiedPayment {
            id: None,
            provider: Provider::Coupang,
            pay_id: pay_id.clone(),
            external_id: Some(pay_id),
            service_type: None,
            status_code: json::string(order, "status.code"),
            status_text: json::string(order, "status.text"),
            status_color: json::string(order, "status.color"),
            paid_at,
            merchant_name,
            merchant_tel: json::string(order, "vendor.repPhoneNum"),
            merchant_url: json::string(order, "vendor.url"),
            merchant_image_url: json::string(order, "vendor.imageUrl"),
            product_name: title,
            product_count,
            total_amount,
            discount_amount: json::money(order, "payment.discountAmount"),
            rest_amount: json::money(order, "payment.restAmount"),
            items,
        })
    }
}

fn parse_product_list(order: &Value) -> Vec<UnifiedPaymentItem> {
    order
        .get("productList")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let product_name = json::string(entry, "productName")?;
                    Some((product_name, entry))
                })
                .enumerate()
                .map(|(idx, (product_name, entry))| {
                    let quantity = json::integer(entry, "quantity")
                        .map(|q| q.max(1) as i32)
                        .unwrap_or(1);
                    // Prefer the finalized per-unit price, then the
                    // discounted price, then the list price.
                    let unit_price = json::money(entry, "combinedUnitPrice")
                        .or_else(|| json::money(entry, "discountedUnitPrice"))
                        .or_else(|| json::money(entry, "unitPrice"));
                    let line_amount = json::money(entry, "lineAmount")
                        .or_else(|| unit_price.map(|p| p * i64::from(quantity)));
                    UnifiedPaymentItem {
                        line_no: idx as i32 + 1,
                        product_id: json::string(entry, "productId"),
                        brand_name: json::string(entry, "brandInfo.brandName"),
                        product_name,
                        image_url: json::string(entry, "imagePath"),
                        info_url: json::string(entry, "infoUrl"),
                        quantity,
                        unit_price,
                        line_amount,
                        rest_amount: json::money(entry, "restAmount"),
                        memo: None,
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}
