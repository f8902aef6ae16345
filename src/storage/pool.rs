use std::fs::OpenOptions;
use std::io::ErrorKind;

use anyhow::Error;
use log::info;
use sqlx::{Pool, Sqlite, SqlitePool};

/// Opens (creating if needed) the SQLite database at `path` and enables WAL.
pub async fn init_db_pool(path: &str) -> Result<Pool<Sqlite>, Error> {
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(_) => info!("Database file created at {path}"),
        Err(ref e) if e.kind() == ErrorKind::AlreadyExists => {
            info!("Using existing database file at {path}")
        }
        Err(e) => return Err(Error::from(e)),
    }

    let pool = SqlitePool::connect(&format!("sqlite:{path}")).await?;

    sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
    sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;

    Ok(pool)
}
