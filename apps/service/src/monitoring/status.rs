use std::sync::Arc;

use crate::database::{Database, SiteStatus};
use crate::error::MonitorError;

/// Reads the current status of the fleet from persisted checks
#[derive(Clone)]
pub struct StatusReader {
    database: Arc<dyn Database>,
}

impl StatusReader {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Latest check of every site that has been checked at least once,
    /// ordered by site id. Never-checked sites are left out.
    pub async fn current_status(&self) -> Result<Vec<SiteStatus>, MonitorError> {
        let mut statuses = self.database.get_latest_checks().await.map_err(MonitorError::Persistence)?;
        statuses.sort_by_key(|status| status.id);
        Ok(statuses)
    }
}
