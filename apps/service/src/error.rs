use thiserror::Error;

/// Failure of a single-site check or of a sweep as a whole
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Site {0} not found")]
    NotFound(i64),

    /// Store read or write failed; fatal for one check only
    #[error("Persistence failure: {0:#}")]
    Persistence(anyhow::Error),
}

impl MonitorError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("Transition bus is closed")]
    Closed,

    #[error("Subscriber {0:?} is already registered")]
    DuplicateSubscriber(String),
}
