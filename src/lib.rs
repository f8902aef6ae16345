//! payfetch library: authenticated payment-history collection.
//!
//! Replays a captured browser session against a commerce provider's
//! private APIs, walks the paginated payment history oldest-first, and
//! normalizes every payment into one canonical schema stored in SQLite.
//!
//! # Example
//!
//! ```no_run
//! use payfetch::{run_collect, ActiveRuns, CollectOptions, Config, Provider};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ActiveRuns::new();
//! let options = CollectOptions {
//!     provider: Provider::Naver,
//!     account: "personal".to_string(),
//!     cancel: CancellationToken::new(),
//! };
//! let report = run_collect(Config::default(), options, &registry).await?;
//! println!("{} of {} payments stored", report.succeeded, report.discovered);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or call library functions from an async context.

mod build_id;
pub mod collector;
pub mod config;
pub mod credentials;
pub mod curl;
mod error_handling;
pub mod initialization;
pub mod model;
pub mod provider;
pub mod proxy;
pub mod session;
pub mod storage;

// Re-export public API
pub use collector::{CollectReport, ItemOutcome, ProgressObserver, RunStatus};
pub use config::{Config, LogFormat, LogLevel};
pub use curl::{parse_curl_command, ParsedSession};
pub use error_handling::{CollectError, InitializationError};
pub use model::{UnifiedPayment, UnifiedPaymentItem};
pub use provider::Provider;
pub use run::{run_collect, CollectOptions};
pub use session::ActiveRuns;
pub use storage::run_migrations;

// Internal run module (wires one collection run end to end)
mod run {
    use std::sync::Arc;

    use anyhow::{Context, Result};
    use log::info;
    use tokio_util::sync::CancellationToken;

    use crate::collector::{run_collection, CollectReport, LogObserver};
    use crate::config::Config;
    use crate::credentials::SqliteCredentialStore;
    use crate::initialization::init_client;
    use crate::provider::{adapter_for, Provider};
    use crate::proxy::ReqwestProxyClient;
    use crate::session::{ActiveRuns, CollectionSession};
    use crate::storage;

    /// What to collect and how to stop it.
    pub struct CollectOptions {
        /// Provider whose history is collected.
        pub provider: Provider,
        /// Account id or alias.
        pub account: String,
        /// Cooperative cancellation handle; cancel it to stop the run at
        /// the next page or item boundary.
        pub cancel: CancellationToken,
    }

    /// Runs one collection end to end: pool, migrations, session, traversal.
    ///
    /// The registry enforces one run per account; concurrent calls for the
    /// same account fail fast with `CollectionAlreadyRunning`.
    pub async fn run_collect(
        config: Config,
        options: CollectOptions,
        registry: &ActiveRuns,
    ) -> Result<CollectReport> {
        let db_path = config.db_path.to_string_lossy().to_string();
        let pool = storage::init_db_pool(&db_path)
            .await
            .context("Failed to initialize database pool")?;
        storage::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        let account = storage::get_account(&pool, Some(options.provider), &options.account)
            .await
            .context("Failed to resolve account")?;
        let _guard = registry.begin(&account.id)?;

        let client = init_client(&config).context("Failed to initialize HTTP client")?;
        let session = CollectionSession::new(
            account.id.clone(),
            adapter_for(options.provider),
            Arc::new(SqliteCredentialStore::new(pool.clone())),
            Arc::new(ReqwestProxyClient::new(client)),
            options.cancel,
        );

        info!(
            "Starting collection for {} account '{}'",
            options.provider, account.alias
        );
        let report = run_collection(&pool, &session, &LogObserver).await?;
        info!(
            "Collection {}: {} discovered, {} succeeded, {} failed",
            report.status.as_str(),
            report.discovered,
            report.succeeded,
            report.failed
        );

        if let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&pool)
            .await
        {
            log::warn!("Failed to checkpoint WAL file (non-critical): {e}");
        }

        Ok(report)
    }
}
