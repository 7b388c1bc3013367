use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::Site;

/// Verdict returned by a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub up: bool,
}

/// A site flipped from up to down or from down to up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    /// Stable across redeliveries, so handlers can drop duplicates
    pub id: Uuid,

    /// The monitored site in question
    pub site: Site,

    /// The new state of the site
    pub up: bool,

    /// Timestamp of the check that observed the new state
    pub occurred_at: DateTime<Utc>,
}

impl TransitionEvent {
    pub fn new(site: Site, up: bool, occurred_at: DateTime<Utc>) -> Self {
        Self { id: Uuid::new_v4(), site, up, occurred_at }
    }
}

/// Tally of one full-fleet sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub sites: usize,
    pub up: usize,
    pub down: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn completed(&self) -> usize {
        self.up + self.down
    }
}
