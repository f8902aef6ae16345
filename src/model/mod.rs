//! Canonical payment schema.
//!
//! Every provider payload is normalized into `UnifiedPayment` /
//! `UnifiedPaymentItem` before it is stored or displayed. This shape is the
//! system's interchange format for all downstream consumers.
//!
//! Money fields are non-negative integers in the smallest currency unit;
//! floating point is never used for amounts.

use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// One logical transaction, normalized from a provider payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedPayment {
    /// Internal numeric id, assigned by storage. `None` before persistence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Provider the payment originated from.
    pub provider: Provider,
    /// Provider-native payment/order identifier.
    pub pay_id: String,
    /// External identifier, when the provider reports one.
    pub external_id: Option<String>,
    /// Provider service type (e.g. `GENERAL`, `LOCAL_PAY`).
    pub service_type: Option<String>,
    /// Status code as reported by the provider.
    pub status_code: Option<String>,
    /// Human-readable status text.
    pub status_text: Option<String>,
    /// Display color associated with the status.
    pub status_color: Option<String>,
    /// Payment timestamp, ISO-8601. For providers that only report an
    /// ordered time, that time is substituted here during normalization.
    pub paid_at: String,
    /// Merchant display name.
    pub merchant_name: String,
    /// Merchant phone number.
    pub merchant_tel: Option<String>,
    /// Merchant URL.
    pub merchant_url: Option<String>,
    /// Merchant image/logo URL.
    pub merchant_image_url: Option<String>,
    /// Representative product name.
    pub product_name: Option<String>,
    /// Number of products in the payment.
    pub product_count: Option<i32>,
    /// Final charged amount in the smallest currency unit.
    pub total_amount: i64,
    /// Discount applied, if any.
    pub discount_amount: Option<i64>,
    /// Remaining/refundable amount, if any.
    pub rest_amount: Option<i64>,
    /// Ordered line items. Never empty after normalization: a synthetic
    /// item is created from payment-level fields when the provider sends
    /// no item array.
    pub items: Vec<UnifiedPaymentItem>,
}

/// One line item within a payment.
///
/// `line_no` is 1-based, unique, and contiguous within a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedPaymentItem {
    /// 1-based line number within the parent payment.
    pub line_no: i32,
    /// Provider-native product identifier.
    pub product_id: Option<String>,
    /// Brand name, when reported.
    pub brand_name: Option<String>,
    /// Product display name.
    pub product_name: String,
    /// Product image URL.
    pub image_url: Option<String>,
    /// Product info/detail page URL.
    pub info_url: Option<String>,
    /// Quantity ordered (>= 1).
    pub quantity: i32,
    /// Per-unit price, after the provider's discount chain is applied.
    pub unit_price: Option<i64>,
    /// Total line amount.
    pub line_amount: Option<i64>,
    /// Remaining/refunded amount for this line.
    pub rest_amount: Option<i64>,
    /// Free-form memo.
    pub memo: Option<String>,
}
