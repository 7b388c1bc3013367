use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Site model - a monitored endpoint from the registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub url: String,
}

impl Site {
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        Self { id, url: url.into() }
    }
}

/// Check model - one completed probe of a site, append-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub site_id: i64,
    pub up: bool,
    pub checked_at: DateTime<Utc>,
}

impl Check {
    /// Create a check stamped with the current time
    pub fn now(site_id: i64, up: bool) -> Self {
        Self { site_id, up, checked_at: Utc::now() }
    }

    /// Convert a timestamp to the stored Unix milliseconds
    pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
        time.timestamp_millis()
    }

    /// Convert stored Unix milliseconds back to a timestamp
    pub fn i64_to_timestamp(millis: i64) -> Result<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| anyhow!("stored timestamp {millis} is out of range"))
    }
}

/// Latest known status of one site, as reported by `GET /status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatus {
    pub id: i64,
    pub url: String,
    pub up: bool,
    pub checked_at: DateTime<Utc>,
}
