/// Database abstraction layer
///
/// The `sites` table acts as the read-only site registry; `checks` is the
/// append-only history of probe verdicts.

pub mod migrations;
pub mod models;
pub mod repository;

pub use models::{Check, Site, SiteStatus};
pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    // WAL lets the status reader run while sweeps are writing
    crate::pool::pragma(conn, "PRAGMA journal_mode = WAL").await?;
    migrations::run_migrations(conn).await
}
