//! Error taxonomy.
//!
//! `PlanError` is fatal for a run. `RoutingError` is always recovered from
//! inside the engines (estimate or prior segment). `PersistenceError` is
//! reported per unit of work.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("at least {required} places are required, found {found}")]
    InsufficientPlaces { required: usize, found: usize },

    #[error("fixed schedules for {first} and {second} overlap on {date}")]
    FixedScheduleOverlap {
        date: NaiveDate,
        first: String,
        second: String,
    },

    #[error("malformed time window: {0}")]
    MalformedTimeWindow(String),

    #[error("trip ends ({end}) before it starts ({start})")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("fixed schedule references unknown place {0}")]
    UnknownFixedPlace(String),

    #[error("fixed schedule for {place_id} on {date} is outside the trip dates")]
    FixedScheduleOutOfRange { place_id: String, date: NaiveDate },

    #[error("duplicate node id {0}")]
    DuplicateNodeId(String),

    #[error("trip {0} not found")]
    TripNotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),

    /// The old itinerary was deleted but the new one could not be written.
    #[error("itinerary for trip {trip_id} was deleted but not rewritten: {source}")]
    SaveDegraded {
        trip_id: String,
        source: PersistenceError,
    },
}

impl PlanError {
    /// Stable reason code for callers.
    pub fn code(&self) -> &'static str {
        match self {
            PlanError::InsufficientPlaces { .. } => "INSUFFICIENT_PLACES",
            PlanError::FixedScheduleOverlap { .. } => "FIXED_SCHEDULE_OVERLAP",
            PlanError::MalformedTimeWindow(_) => "MALFORMED_TIME_WINDOW",
            PlanError::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            PlanError::UnknownFixedPlace(_) => "UNKNOWN_FIXED_PLACE",
            PlanError::FixedScheduleOutOfRange { .. } => "FIXED_SCHEDULE_OUT_OF_RANGE",
            PlanError::DuplicateNodeId(_) => "DUPLICATE_NODE_ID",
            PlanError::TripNotFound(_) => "TRIP_NOT_FOUND",
            PlanError::Persistence(_) => "PERSISTENCE_ERROR",
            PlanError::SaveDegraded { .. } => "SAVE_DEGRADED",
        }
    }

    /// Input errors need a changed request; storage errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlanError::Persistence(_) | PlanError::SaveDegraded { .. })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("routing request timed out")]
    Timeout,
    #[error("routing provider rate limited the request")]
    RateLimited,
    #[error("routing request failed: {0}")]
    Http(String),
    #[error("malformed routing response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RoutingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RoutingError::Timeout
        } else if err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
            RoutingError::RateLimited
        } else if err.is_decode() {
            RoutingError::Malformed(err.to_string())
        } else {
            RoutingError::Http(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Which half of a delete-then-insert replace failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplaceError {
    /// Nothing was changed.
    #[error("delete failed: {0}")]
    Delete(PersistenceError),
    /// The old rows are gone and the new ones were not written.
    #[error("insert failed after delete: {0}")]
    Insert(PersistenceError),
}
