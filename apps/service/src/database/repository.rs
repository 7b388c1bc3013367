use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Row, params};

use super::models::{Check, Site, SiteStatus};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Storage seam of the monitoring engine.
///
/// Covers the read-only view of the site registry and the append-only check
/// log with its "latest check per site" index.
#[async_trait]
pub trait Database: Send + Sync {
    /// Snapshot of every registered site
    async fn get_sites(&self) -> Result<Vec<Site>>;

    /// Look up a single site
    async fn get_site(&self, id: i64) -> Result<Option<Site>>;

    /// Most recent check of a site, if it was ever checked
    async fn get_latest_check(&self, site_id: i64) -> Result<Option<Check>>;

    /// Append a check, returning its row id
    async fn save_check(&self, check: &Check) -> Result<i64>;

    /// Latest check of every site that has one, ordered by site id
    async fn get_latest_checks(&self) -> Result<Vec<SiteStatus>>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        self.pool.get().await.map_err(|e| anyhow!("failed to get database connection: {e}"))
    }

    /// Insert a site unless its URL is already registered, returning the stored row
    pub async fn register_site(&self, url: &str) -> Result<Site> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO sites (url, created_at) VALUES (?, ?) ON CONFLICT(url) DO NOTHING",
            params![url, Utc::now().timestamp()],
        )
        .await?;

        let mut rows = conn.query("SELECT id, url FROM sites WHERE url = ?", params![url]).await?;
        match rows.next().await? {
            Some(row) => site_from_row(&row),
            None => Err(anyhow!("site {url} vanished after insert")),
        }
    }
}

fn site_from_row(row: &Row) -> Result<Site> {
    Ok(Site { id: row.get(0)?, url: row.get(1)? })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn get_sites(&self) -> Result<Vec<Site>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT id, url FROM sites ORDER BY id", ()).await?;

        let mut sites = Vec::new();
        while let Some(row) = rows.next().await? {
            sites.push(site_from_row(&row)?);
        }

        Ok(sites)
    }

    async fn get_site(&self, id: i64) -> Result<Option<Site>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT id, url FROM sites WHERE id = ?", params![id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(site_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_latest_check(&self, site_id: i64) -> Result<Option<Check>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT site_id, up, checked_at FROM checks WHERE site_id = ? \
                 ORDER BY checked_at DESC, id DESC LIMIT 1",
                params![site_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Check {
                site_id: row.get(0)?,
                up: row.get::<i64>(1)? != 0,
                checked_at: Check::i64_to_timestamp(row.get(2)?)?,
            }))
        } else {
            Ok(None)
        }
    }

    async fn save_check(&self, check: &Check) -> Result<i64> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO checks (site_id, up, checked_at) VALUES (?, ?, ?)",
            params![
                check.site_id,
                if check.up { 1 } else { 0 },
                Check::timestamp_to_i64(check.checked_at)
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn get_latest_checks(&self) -> Result<Vec<SiteStatus>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT s.id, s.url, c.up, c.checked_at
                 FROM sites s
                 JOIN checks c ON c.id = (
                     SELECT latest.id FROM checks latest
                     WHERE latest.site_id = s.id
                     ORDER BY latest.checked_at DESC, latest.id DESC
                     LIMIT 1
                 )
                 ORDER BY s.id ASC",
                (),
            )
            .await?;

        let mut statuses = Vec::new();
        while let Some(row) = rows.next().await? {
            statuses.push(SiteStatus {
                id: row.get(0)?,
                url: row.get(1)?,
                up: row.get::<i64>(2)? != 0,
                checked_at: Check::i64_to_timestamp(row.get(3)?)?,
            });
        }

        Ok(statuses)
    }
}
