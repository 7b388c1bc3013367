/// Monitoring engine module - probes sites and tracks their up/down state
///
/// This module is responsible for:
/// - Probing a single site and detecting transitions (executor)
/// - Fanning sweeps out across the fleet on a timer (scheduler)
/// - Reporting the latest recorded state of every site (status)
pub mod executor;
pub mod prober;
pub mod scheduler;
pub mod status;
pub mod types;

pub use executor::CheckExecutor;
pub use prober::{HttpProber, Prober};
pub use scheduler::FleetScheduler;
pub use status::StatusReader;
pub use types::{CheckOutcome, SweepReport, TransitionEvent};
