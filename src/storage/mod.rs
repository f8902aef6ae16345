//! Database operations.

pub mod accounts;
pub mod migrations;
pub mod payments;
pub mod pool;
pub mod runs;

pub use accounts::{
    get_account, insert_account, list_accounts, remove_account, rename_account, AccountRecord,
};
pub use migrations::run_migrations;
pub use payments::{latest_payment, list_payments, search_items, upsert_payment, SearchHit};
pub use pool::init_db_pool;
pub use runs::{finish_run, insert_run};
