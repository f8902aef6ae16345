//! Payment persistence.
//!
//! Payments are written with an UPSERT keyed on `(account_id, pay_id)` so a
//! re-run over already-collected pages refreshes rows instead of
//! duplicating them. Items are replaced wholesale inside the same
//! transaction, which keeps `line_no` contiguous even when the upstream
//! item list shrinks between runs.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::error_handling::CollectError;
use crate::model::{UnifiedPayment, UnifiedPaymentItem};
use crate::provider::Provider;

/// Inserts or refreshes a payment and its items. Returns the row id.
pub async fn upsert_payment(
    pool: &SqlitePool,
    account_id: &str,
    payment: &UnifiedPayment,
) -> Result<i64, CollectError> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    let payment_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO payments (
            account_id, provider, pay_id, external_id, service_type,
            status_code, status_text, status_color, paid_at, merchant_name,
            merchant_tel, merchant_url, merchant_image_url, product_name,
            product_count, total_amount, discount_amount, rest_amount,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(account_id, pay_id) DO UPDATE SET
            external_id=excluded.external_id,
            service_type=excluded.service_type,
            status_code=excluded.status_code,
            status_text=excluded.status_text,
            status_color=excluded.status_color,
            paid_at=excluded.paid_at,
            merchant_name=excluded.merchant_name,
            merchant_tel=excluded.merchant_tel,
            merchant_url=excluded.merchant_url,
            merchant_image_url=excluded.merchant_image_url,
            product_name=excluded.product_name,
            product_count=excluded.product_count,
            total_amount=excluded.total_amount,
            discount_amount=excluded.discount_amount,
            rest_amount=excluded.rest_amount,
            updated_at=excluded.updated_at
        RETURNING id",
    )
    .bind(account_id)
    .bind(payment.provider.as_str())
    .bind(&payment.pay_id)
    .bind(&payment.external_id)
    .bind(&payment.service_type)
    .bind(&payment.status_code)
    .bind(&payment.status_text)
    .bind(&payment.status_color)
    .bind(&payment.paid_at)
    .bind(&payment.merchant_name)
    .bind(&payment.merchant_tel)
    .bind(&payment.merchant_url)
    .bind(&payment.merchant_image_url)
    .bind(&payment.product_name)
    .bind(payment.product_count)
    .bind(payment.total_amount)
    .bind(payment.discount_amount)
    .bind(payment.rest_amount)
    .bind(&now)
    .bind(&now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM payment_items WHERE payment_id = ?")
        .bind(payment_id)
        .execute(&mut *tx)
        .await?;
    for item in &payment.items {
        sqlx::query(
            "INSERT INTO payment_items (
                payment_id, line_no, product_id, brand_name, product_name,
                image_url, info_url, quantity, unit_price, line_amount,
                rest_amount, memo
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(payment_id)
        .bind(item.line_no)
        .bind(&item.product_id)
        .bind(&item.brand_name)
        .bind(&item.product_name)
        .bind(&item.image_url)
        .bind(&item.info_url)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.line_amount)
        .bind(item.rest_amount)
        .bind(&item.memo)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(payment_id)
}

/// Lists an account's payments newest-first, items attached.
pub async fn list_payments(
    pool: &SqlitePool,
    account_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<UnifiedPayment>, CollectError> {
    let rows = sqlx::query(
        "SELECT * FROM payments WHERE account_id = ?
         ORDER BY paid_at DESC LIMIT ? OFFSET ?",
    )
    .bind(account_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut payments = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut payment = payment_from_row(row)?;
        payment.items = load_items(pool, row.get::<i64, _>("id")).await?;
        payments.push(payment);
    }
    Ok(payments)
}

/// The account's most recent payment, if any were collected.
pub async fn latest_payment(
    pool: &SqlitePool,
    account_id: &str,
) -> Result<Option<UnifiedPayment>, CollectError> {
    Ok(list_payments(pool, account_id, 1, 0).await?.into_iter().next())
}

/// One match from a product-name search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub provider: Provider,
    pub pay_id: String,
    pub paid_at: String,
    pub merchant_name: String,
    pub item: UnifiedPaymentItem,
}

/// Searches an account's collected items by product name substring.
pub async fn search_items(
    pool: &SqlitePool,
    account_id: &str,
    query: &str,
    limit: i64,
) -> Result<Vec<SearchHit>, CollectError> {
    let pattern = format!("%{query}%");
    let rows = sqlx::query(
        "SELECT p.provider, p.pay_id, p.paid_at, p.merchant_name,
                i.line_no, i.product_id, i.brand_name, i.product_name,
                i.image_url, i.info_url, i.quantity, i.unit_price,
                i.line_amount, i.rest_amount, i.memo
         FROM payment_items i
         JOIN payments p ON p.id = i.payment_id
         WHERE p.account_id = ? AND i.product_name LIKE ?
         ORDER BY p.paid_at DESC
         LIMIT ?",
    )
    .bind(account_id)
    .bind(&pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let provider_tag: String = row.get("provider");
            let provider = Provider::parse(&provider_tag).ok_or_else(|| {
                CollectError::NormalizationError {
                    field: format!("payments.provider ({provider_tag})"),
                }
            })?;
            Ok(SearchHit {
                provider,
                pay_id: row.get("pay_id"),
                paid_at: row.get("paid_at"),
                merchant_name: row.get("merchant_name"),
                item: item_from_row(row),
            })
        })
        .collect()
}

async fn load_items(
    pool: &SqlitePool,
    payment_id: i64,
) -> Result<Vec<UnifiedPaymentItem>, CollectError> {
    let rows = sqlx::query(
        "SELECT * FROM payment_items WHERE payment_id = ? ORDER BY line_no",
    )
    .bind(payment_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(item_from_row).collect())
}

fn payment_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<UnifiedPayment, CollectError> {
    let provider_tag: String = row.get("provider");
    let provider = Provider::parse(&provider_tag).ok_or_else(|| {
        CollectError::NormalizationError {
            field: format!("payments.provider ({provider_tag})"),
        }
    })?;
    Ok(UnifiedPayment {
        id: Some(row.get("id")),
        provider,
        pay_id: row.get("pay_id"),
        external_id: row.get("external_id"),
        service_type: row.get("service_type"),
        status_code: row.get("status_code"),
        status_text: row.get("status_text"),
        status_color: row.get("status_color"),
        paid_at: row.get("paid_at"),
        merchant_name: row.get("merchant_name"),
        merchant_tel: row.get("merchant_tel"),
        merchant_url: row.get("merchant_url"),
        merchant_image_url: row.get("merchant_image_url"),
        product_name: row.get("product_name"),
        product_count: row.get("product_count"),
        total_amount: row.get("total_amount"),
        discount_amount: row.get("discount_amount"),
        rest_amount: row.get("rest_amount"),
        items: Vec::new(),
    })
}

fn item_from_row(row: &sqlx::sqlite::SqliteRow) -> UnifiedPaymentItem {
    UnifiedPaymentItem {
        line_no: row.get("line_no"),
        product_id: row.get("product_id"),
        brand_name: row.get("brand_name"),
        product_name: row.get("product_name"),
        image_url: row.get("image_url"),
        info_url: row.get("info_url"),
        quantity: row.get("quantity"),
        unit_price: row.get("unit_price"),
        line_amount: row.get("line_amount"),
        rest_amount: row.get("rest_amount"),
        memo: row.get("memo"),
    }
}
