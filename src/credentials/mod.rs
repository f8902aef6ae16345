//! Credential sourcing.
//!
//! The [`CredentialProvider`] trait is the single header-sourcing path for
//! the whole pipeline. Credentials are read from the database at time of
//! use, never from a parsed capture cached earlier in the session, so a
//! refresh is observed on the very next network operation without a
//! restart. The curl parser is only ever used here as a bootstrap step
//! when a new capture is imported.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::curl::parse_curl_command;
use crate::error_handling::CollectError;

/// Authoritative source of the headers a provider's private API requires.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns the current header set for an account.
    async fn headers(&self, account_id: &str) -> Result<HashMap<String, String>, CollectError>;

    /// Replaces an account's credentials from a fresh capture.
    ///
    /// The replace is atomic: nothing is mutated unless parsing and every
    /// write succeed.
    async fn refresh(&self, account_id: &str, capture: &str) -> Result<(), CollectError>;
}

/// Production credential store backed by the SQLite `credentials` table.
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteCredentialStore { pool }
    }
}

#[async_trait]
impl CredentialProvider for SqliteCredentialStore {
    async fn headers(&self, account_id: &str) -> Result<HashMap<String, String>, CollectError> {
        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE id = ?")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await?;
        if exists == 0 {
            return Err(CollectError::AccountNotFound(account_id.to_string()));
        }

        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM credentials WHERE account_id = ?")
                .bind(account_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    async fn refresh(&self, account_id: &str, capture: &str) -> Result<(), CollectError> {
        // Parse before touching the database so a malformed capture leaves
        // the stored credentials untouched.
        let session = parse_curl_command(capture)?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE accounts SET capture = ?, updated_at = ? WHERE id = ?",
        )
        .bind(capture)
        .bind(&now)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(CollectError::AccountNotFound(account_id.to_string()));
        }

        sqlx::query("DELETE FROM credentials WHERE account_id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;
        for (key, value) in &session.headers {
            sqlx::query(
                "INSERT INTO credentials (account_id, key, value, updated_at) VALUES (?, ?, ?, ?)",
            )
            .bind(account_id)
            .bind(key)
            .bind(value)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use crate::storage;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        storage::run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_headers_for_unknown_account_fails() {
        let store = SqliteCredentialStore::new(test_pool().await);
        let err = store.headers("missing").await.unwrap_err();
        assert!(matches!(err, CollectError::AccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_refresh_replaces_headers_atomically() {
        let pool = test_pool().await;
        let account_id = storage::insert_account(
            &pool,
            Provider::Naver,
            "me",
            "curl 'https://a' -H 'x-old: 1' -b 'SID=old'",
        )
        .await
        .unwrap();
        let store = SqliteCredentialStore::new(pool);
        store
            .refresh(
                &account_id,
                "curl 'https://a' -H 'x-old: 1' -b 'SID=old'",
            )
            .await
            .unwrap();

        let before = store.headers(&account_id).await.unwrap();
        assert_eq!(before.get("Cookie").map(String::as_str), Some("SID=old"));

        store
            .refresh(&account_id, "curl 'https://a' -H 'x-new: 2' -b 'SID=new'")
            .await
            .unwrap();
        let after = store.headers(&account_id).await.unwrap();
        assert_eq!(after.get("Cookie").map(String::as_str), Some("SID=new"));
        assert!(after.contains_key("x-new"));
        // Old keys are gone, not merged.
        assert!(!after.contains_key("x-old"));
    }

    #[tokio::test]
    async fn test_malformed_refresh_leaves_credentials_untouched() {
        let pool = test_pool().await;
        let account_id = storage::insert_account(
            &pool,
            Provider::Naver,
            "me",
            "curl 'https://a' -b 'SID=keep'",
        )
        .await
        .unwrap();
        let store = SqliteCredentialStore::new(pool);
        store
            .refresh(&account_id, "curl 'https://a' -b 'SID=keep'")
            .await
            .unwrap();

        let err = store
            .refresh(&account_id, "curl --compressed")
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::MalformedSession(_)));

        let headers = store.headers(&account_id).await.unwrap();
        assert_eq!(headers.get("Cookie").map(String::as_str), Some("SID=keep"));
    }
}
