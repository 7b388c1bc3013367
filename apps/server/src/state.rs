use std::sync::Arc;

use uptime_service::{CheckExecutor, FleetScheduler, StatusReader};

/// Shared handles the routes work with
pub struct AppState {
    pub executor: Arc<CheckExecutor>,
    pub scheduler: Arc<FleetScheduler>,
    pub status: StatusReader,
}
