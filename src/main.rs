//! Main application entry point (CLI binary).
//!
//! A thin wrapper around the `payfetch` library that handles command-line
//! parsing, logger initialization and user-facing output. All core
//! functionality lives in the library crate.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use payfetch::config::{Config, LogFormat, LogLevel};
use payfetch::credentials::{CredentialProvider, SqliteCredentialStore};
use payfetch::initialization::init_logger_with;
use payfetch::{parse_curl_command, run_collect, storage, ActiveRuns, CollectOptions, Provider};

#[derive(Parser)]
#[command(name = "payfetch", version, about = "Payment history collector")]
struct Cli {
    /// SQLite database path
    #[arg(long, default_value = "./payfetch.db")]
    db: PathBuf,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage accounts and their captured sessions
    Account {
        #[command(subcommand)]
        command: AccountCommand,
    },
    /// Collect a provider's payment history into the database
    Collect {
        /// Provider to collect from
        #[arg(long, value_enum)]
        provider: Provider,
        /// Account id or alias
        #[arg(long)]
        account: String,
    },
    /// List collected payments, newest first
    Payments {
        /// Account id or alias
        #[arg(long)]
        account: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Search collected items by product name
    Search {
        /// Account id or alias
        #[arg(long)]
        account: String,
        /// Substring to match against product names
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Register an account from a captured curl command
    Add {
        #[arg(long, value_enum)]
        provider: Provider,
        /// Alias the account is addressed by
        #[arg(long)]
        alias: String,
        /// File holding the copied curl command, or `-` for stdin
        #[arg(long, default_value = "-")]
        capture_file: PathBuf,
    },
    /// List registered accounts
    List,
    /// Change an account's alias
    Rename {
        /// Account id or current alias
        account: String,
        #[arg(long)]
        alias: String,
    },
    /// Delete an account and everything collected for it
    Remove {
        /// Account id or alias
        account: String,
    },
    /// Replace an account's credentials from a fresh capture
    Refresh {
        /// Account id or alias
        account: String,
        /// File holding the copied curl command, or `-` for stdin
        #[arg(long, default_value = "-")]
        capture_file: PathBuf,
    },
}

fn read_capture(path: &PathBuf) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        use std::io::Read;
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read capture from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read capture file {}", path.display()))
    }
}

async fn open_pool(db: &PathBuf) -> Result<sqlx::SqlitePool> {
    let pool = storage::init_db_pool(&db.to_string_lossy())
        .await
        .context("Failed to initialize database pool")?;
    payfetch::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(pool)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logger_with(cli.log_level.clone().into(), cli.log_format.clone())
        .context("Failed to initialize logger")?;

    if let Err(e) = dispatch(cli).await {
        eprintln!("payfetch error: {e:#}");
        process::exit(1);
    }
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Account { command } => run_account_command(&cli.db, command).await,
        Command::Collect { provider, account } => {
            let config = Config {
                log_level: cli.log_level,
                log_format: cli.log_format,
                db_path: cli.db,
                ..Default::default()
            };
            let cancel = CancellationToken::new();
            let ctrl_c_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Interrupt received, stopping after the current item");
                    ctrl_c_cancel.cancel();
                }
            });

            let registry = ActiveRuns::new();
            let report = run_collect(
                config,
                CollectOptions {
                    provider,
                    account,
                    cancel,
                },
                &registry,
            )
            .await?;
            println!(
                "{}: {} payment{} stored, {} failed (of {} discovered across {} page{})",
                report.status.as_str(),
                report.succeeded,
                if report.succeeded == 1 { "" } else { "s" },
                report.failed,
                report.discovered,
                report.total_pages,
                if report.total_pages == 1 { "" } else { "s" },
            );
            Ok(())
        }
        Command::Payments {
            account,
            limit,
            offset,
        } => {
            let pool = open_pool(&cli.db).await?;
            let account = storage::get_account(&pool, None, &account).await?;
            let payments = storage::list_payments(&pool, &account.id, limit, offset).await?;
            println!("{}", serde_json::to_string_pretty(&payments)?);
            Ok(())
        }
        Command::Search {
            account,
            query,
            limit,
        } => {
            let pool = open_pool(&cli.db).await?;
            let account = storage::get_account(&pool, None, &account).await?;
            let hits = storage::search_items(&pool, &account.id, &query, limit).await?;
            for hit in &hits {
                println!(
                    "{}  {}  {}  {}  x{}",
                    hit.paid_at,
                    hit.provider,
                    hit.merchant_name,
                    hit.item.product_name,
                    hit.item.quantity
                );
            }
            if hits.is_empty() {
                println!("No items matched '{query}'");
            }
            Ok(())
        }
    }
}

async fn run_account_command(db: &PathBuf, command: AccountCommand) -> Result<()> {
    let pool = open_pool(db).await?;
    match command {
        AccountCommand::Add {
            provider,
            alias,
            capture_file,
        } => {
            let capture = read_capture(&capture_file)?;
            // Validate before creating the row; a bad capture leaves no trace.
            parse_curl_command(&capture)?;
            let account_id = storage::insert_account(&pool, provider, &alias, &capture).await?;
            let store = SqliteCredentialStore::new(pool);
            store.refresh(&account_id, &capture).await?;
            println!("Registered {provider} account '{alias}' ({account_id})");
        }
        AccountCommand::List => {
            let accounts = storage::list_accounts(&pool).await?;
            if accounts.is_empty() {
                println!("No accounts registered");
            }
            for account in accounts {
                let history = match storage::latest_payment(&pool, &account.id).await? {
                    Some(payment) => format!("history through {}", payment.paid_at),
                    None => "no payments collected".to_string(),
                };
                println!(
                    "{}  {}  {}  ({}, updated {})",
                    account.id, account.provider, account.alias, history, account.updated_at
                );
            }
        }
        AccountCommand::Rename { account, alias } => {
            let record = storage::get_account(&pool, None, &account).await?;
            storage::rename_account(&pool, &record.id, &alias).await?;
            println!("Renamed '{}' to '{}'", record.alias, alias);
        }
        AccountCommand::Remove { account } => {
            let record = storage::get_account(&pool, None, &account).await?;
            storage::remove_account(&pool, &record.id).await?;
            println!("Removed account '{}'", record.alias);
        }
        AccountCommand::Refresh {
            account,
            capture_file,
        } => {
            let capture = read_capture(&capture_file)?;
            let record = storage::get_account(&pool, None, &account).await?;
            let store = SqliteCredentialStore::new(pool);
            store.refresh(&record.id, &capture).await?;
            println!("Refreshed credentials for '{}'", record.alias);
        }
    }
    Ok(())
}
