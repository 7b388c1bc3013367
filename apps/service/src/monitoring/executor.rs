use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::prober::Prober;
use super::types::{CheckOutcome, TransitionEvent};
use crate::bus::TransitionBus;
use crate::database::{Check, Database, Site};
use crate::error::MonitorError;

/// Verdict assumed for a site that has never been checked
const DEFAULT_PREVIOUS_UP: bool = true;

/// Check executor - probes one site, detects transitions and records the check
pub struct CheckExecutor {
    database: Arc<dyn Database>,
    prober: Arc<dyn Prober>,
    bus: Arc<TransitionBus>,
    probe_timeout: Duration,
}

impl CheckExecutor {
    pub fn new(
        database: Arc<dyn Database>,
        prober: Arc<dyn Prober>,
        bus: Arc<TransitionBus>,
        probe_timeout: Duration,
    ) -> Self {
        Self { database, prober, bus, probe_timeout }
    }

    /// Resolve a site by id and check it
    pub async fn check_site(&self, site_id: i64) -> Result<CheckOutcome, MonitorError> {
        let site = self
            .database
            .get_site(site_id)
            .await
            .map_err(MonitorError::Persistence)?
            .ok_or(MonitorError::NotFound(site_id))?;

        self.execute_check(&site).await
    }

    /// Probe the site, publish a transition if its state flipped, then
    /// append the new check.
    pub async fn execute_check(&self, site: &Site) -> Result<CheckOutcome, MonitorError> {
        let up = self.probe(site).await;
        let was_up = self.previous_state(site.id).await?;
        let checked_at = Utc::now();

        if up != was_up {
            info!(site_id = site.id, url = %site.url, up, "site state changed");
            let event = TransitionEvent::new(site.clone(), up, checked_at);
            if let Err(e) = self.bus.publish(event) {
                warn!(site_id = site.id, "transition not published: {}", e);
            }
        }

        self.database
            .save_check(&Check { site_id: site.id, up, checked_at })
            .await
            .map_err(MonitorError::Persistence)?;

        Ok(CheckOutcome { up })
    }

    /// Probe with a hard deadline; errors and timeouts count as down
    async fn probe(&self, site: &Site) -> bool {
        match timeout(self.probe_timeout, self.prober.probe(&site.url)).await {
            Ok(Ok(latency_ms)) => {
                debug!(site_id = site.id, url = %site.url, latency_ms, "probe succeeded");
                true
            }
            Ok(Err(e)) => {
                debug!(site_id = site.id, url = %site.url, "probe failed: {:#}", e);
                false
            }
            Err(_) => {
                debug!(site_id = site.id, url = %site.url, timeout = ?self.probe_timeout, "probe timed out");
                false
            }
        }
    }

    async fn previous_state(&self, site_id: i64) -> Result<bool, MonitorError> {
        let latest = self.database.get_latest_check(site_id).await.map_err(MonitorError::Persistence)?;
        Ok(latest.map_or(DEFAULT_PREVIOUS_UP, |check| check.up))
    }
}
