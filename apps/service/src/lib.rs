//! Uptime monitoring engine.
//!
//! Sweeps a fleet of sites on a timer, records every probe verdict in an
//! append-only store, and publishes up/down transitions on an at-least-once
//! event bus.

pub mod bus;
pub mod config;
pub mod database;
pub mod error;
pub mod monitoring;
pub mod pool;

#[cfg(test)]
mod testing;

pub use bus::{Subscription, TransitionBus, TransitionHandler};
pub use config::{Config, ConfigError};
pub use database::{Check, Database, DatabaseImpl, Site, SiteStatus};
pub use error::{BusError, MonitorError};
pub use monitoring::{
    CheckExecutor, CheckOutcome, FleetScheduler, HttpProber, Prober, StatusReader, SweepReport,
    TransitionEvent,
};
