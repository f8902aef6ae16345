//! Account rows.
//!
//! An account binds a provider to one captured login session. Aliases are
//! unique per provider so CLI commands can address accounts by name.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error_handling::CollectError;
use crate::provider::Provider;

/// One row of the `accounts` table.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: String,
    pub provider: Provider,
    pub alias: String,
    pub capture: String,
    pub created_at: String,
    pub updated_at: String,
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<AccountRecord, CollectError> {
    let provider_tag: String = row.get("provider");
    let provider = Provider::parse(&provider_tag).ok_or_else(|| {
        CollectError::NormalizationError {
            field: format!("accounts.provider ({provider_tag})"),
        }
    })?;
    Ok(AccountRecord {
        id: row.get("id"),
        provider,
        alias: row.get("alias"),
        capture: row.get("capture"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Creates an account and returns its generated id.
pub async fn insert_account(
    pool: &SqlitePool,
    provider: Provider,
    alias: &str,
    capture: &str,
) -> Result<String, CollectError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO accounts (id, provider, alias, capture, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(provider.as_str())
    .bind(alias)
    .bind(capture)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(id)
}

/// Looks an account up by id, or by `provider/alias` when `provider` is given.
pub async fn get_account(
    pool: &SqlitePool,
    provider: Option<Provider>,
    id_or_alias: &str,
) -> Result<AccountRecord, CollectError> {
    let row = match provider {
        Some(provider) => {
            sqlx::query("SELECT * FROM accounts WHERE provider = ? AND (alias = ? OR id = ?)")
                .bind(provider.as_str())
                .bind(id_or_alias)
                .bind(id_or_alias)
                .fetch_optional(pool)
                .await?
        }
        None => {
            sqlx::query("SELECT * FROM accounts WHERE id = ? OR alias = ?")
                .bind(id_or_alias)
                .bind(id_or_alias)
                .fetch_optional(pool)
                .await?
        }
    };
    match row {
        Some(row) => record_from_row(&row),
        None => Err(CollectError::AccountNotFound(id_or_alias.to_string())),
    }
}

/// Lists all accounts, newest first.
pub async fn list_accounts(pool: &SqlitePool) -> Result<Vec<AccountRecord>, CollectError> {
    let rows = sqlx::query("SELECT * FROM accounts ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(record_from_row).collect()
}

/// Renames an account.
pub async fn rename_account(
    pool: &SqlitePool,
    account_id: &str,
    alias: &str,
) -> Result<(), CollectError> {
    let result = sqlx::query("UPDATE accounts SET alias = ?, updated_at = ? WHERE id = ?")
        .bind(alias)
        .bind(Utc::now().to_rfc3339())
        .bind(account_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CollectError::AccountNotFound(account_id.to_string()));
    }
    Ok(())
}

/// Deletes an account. Credentials, payments and runs cascade.
pub async fn remove_account(pool: &SqlitePool, account_id: &str) -> Result<(), CollectError> {
    let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(account_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CollectError::AccountNotFound(account_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::run_migrations;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_account_lifecycle() {
        let pool = test_pool().await;
        let id = insert_account(&pool, Provider::Naver, "personal", "curl 'https://a'")
            .await
            .unwrap();

        let by_alias = get_account(&pool, Some(Provider::Naver), "personal")
            .await
            .unwrap();
        assert_eq!(by_alias.id, id);

        rename_account(&pool, &id, "family").await.unwrap();
        let renamed = get_account(&pool, None, &id).await.unwrap();
        assert_eq!(renamed.alias, "family");

        remove_account(&pool, &id).await.unwrap();
        assert!(matches!(
            get_account(&pool, None, &id).await.unwrap_err(),
            CollectError::AccountNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_alias_unique_per_provider() {
        let pool = test_pool().await;
        insert_account(&pool, Provider::Naver, "me", "curl 'https://a'")
            .await
            .unwrap();
        // Same alias under another provider is fine.
        insert_account(&pool, Provider::Coupang, "me", "curl 'https://b'")
            .await
            .unwrap();
        // Duplicate within a provider is rejected.
        assert!(
            insert_account(&pool, Provider::Naver, "me", "curl 'https://c'")
                .await
                .is_err()
        );
    }
}
