use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, interval_at};
use tracing::{error, info, warn};

use super::executor::CheckExecutor;
use super::types::SweepReport;
use crate::database::Database;
use crate::error::MonitorError;

/// Fleet scheduler - fans a sweep out to every registered site
pub struct FleetScheduler {
    database: Arc<dyn Database>,
    executor: Arc<CheckExecutor>,
    interval: Duration,
    sweep_on_start: bool,
}

impl FleetScheduler {
    pub fn new(database: Arc<dyn Database>, executor: Arc<CheckExecutor>, interval: Duration) -> Self {
        Self { database, executor, interval, sweep_on_start: false }
    }

    /// Fire the first sweep immediately instead of one interval after start
    pub fn sweep_on_start(mut self, enabled: bool) -> Self {
        self.sweep_on_start = enabled;
        self
    }

    /// Check every site concurrently and wait for all of them.
    ///
    /// Failing or panicking site checks are logged and counted in the report;
    /// only failing to read the registry fails the sweep.
    pub async fn sweep_all(&self) -> Result<SweepReport, MonitorError> {
        let sites = self.database.get_sites().await.map_err(MonitorError::Persistence)?;
        let mut report = SweepReport { sites: sites.len(), ..SweepReport::default() };
        info!(sites = sites.len(), "starting sweep");

        let mut checks = JoinSet::new();
        for site in sites {
            let executor = self.executor.clone();
            checks.spawn(async move {
                let result = executor.execute_check(&site).await;
                (site, result)
            });
        }

        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) if outcome.up => report.up += 1,
                Ok((_, Ok(_))) => report.down += 1,
                Ok((site, Err(e))) => {
                    error!(site_id = site.id, url = %site.url, "check failed: {}", e);
                    report.failed += 1;
                }
                Err(e) => {
                    error!("check task aborted: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            sites = report.sites,
            up = report.up,
            down = report.down,
            failed = report.failed,
            "sweep completed"
        );
        Ok(report)
    }

    /// Start the periodic timer. Each tick launches an independent sweep, so
    /// a slow sweep may overlap with the next one.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let now = Instant::now();
            let Some(next) = now.checked_add(self.interval) else {
                error!(interval = ?self.interval, "sweep interval out of range, timer not started");
                return;
            };
            let first_tick = if self.sweep_on_start { now } else { next };
            let mut timer = interval_at(first_tick, self.interval);
            info!(interval = ?self.interval, "sweep timer started");

            loop {
                timer.tick().await;

                let scheduler = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = scheduler.sweep_all().await {
                        warn!("Scheduled sweep failed: {}", e);
                    }
                });
            }
        })
    }
}
