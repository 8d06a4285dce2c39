//! Structured diagnostics emitted by the engines.
//!
//! The engines never branch on whether anything listens; a `NoopSink` is a
//! valid choice.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::distribute::UnassignedReason;
use crate::error::{PersistenceError, RoutingError};

/// Where a reused travel segment was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReuseOrigin {
    StoredItinerary,
    MatrixCache,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    UnassignedPlace {
        place_id: String,
        reason: UnassignedReason,
    },
    /// A provider call failed and an estimate was used instead.
    ProviderFallback {
        from: String,
        to: String,
        error: RoutingError,
    },
    NoRouteFound {
        from: String,
        to: String,
    },
    SegmentReused {
        from: String,
        to: String,
        origin: ReuseOrigin,
    },
    SegmentFetched {
        from: String,
        to: String,
    },
    /// A fresh lookup failed; the previously stored segment was kept.
    SegmentKeptPrior {
        from: String,
        to: String,
        error: Option<RoutingError>,
    },
    FixedArrivalLate {
        place_id: String,
        date: NaiveDate,
        earliest_arrival: u32,
        fixed_start: u32,
    },
    FixedOutsideWindow {
        place_id: String,
        date: NaiveDate,
    },
    DaySaveFailed {
        day_number: u32,
        error: PersistenceError,
    },
    ItineraryDegraded {
        trip_id: String,
        error: PersistenceError,
    },
}

pub trait DiagnosticsSink: Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {
    fn emit(&self, _diagnostic: Diagnostic) {}
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::UnassignedPlace { place_id, reason } => {
                warn!(place_id = %place_id, reason = ?reason, "place could not be scheduled");
            }
            Diagnostic::ProviderFallback { from, to, error } => {
                warn!(from = %from, to = %to, error = %error, "routing provider failed, using estimate");
            }
            Diagnostic::NoRouteFound { from, to } => {
                info!(from = %from, to = %to, "no route between stops, using estimate");
            }
            Diagnostic::SegmentReused { from, to, origin } => {
                debug!(from = %from, to = %to, origin = ?origin, "reused travel segment");
            }
            Diagnostic::SegmentFetched { from, to } => {
                debug!(from = %from, to = %to, "fetched travel segment");
            }
            Diagnostic::SegmentKeptPrior { from, to, error } => {
                warn!(from = %from, to = %to, error = ?error, "lookup failed, kept previous segment");
            }
            Diagnostic::FixedArrivalLate {
                place_id,
                date,
                earliest_arrival,
                fixed_start,
            } => {
                warn!(
                    place_id = %place_id,
                    date = %date,
                    earliest_arrival,
                    fixed_start,
                    "fixed appointment cannot be reached in time"
                );
            }
            Diagnostic::FixedOutsideWindow { place_id, date } => {
                warn!(place_id = %place_id, date = %date, "fixed appointment falls outside the day window");
            }
            Diagnostic::DaySaveFailed { day_number, error } => {
                warn!(day_number, error = %error, "failed to save itinerary day");
            }
            Diagnostic::ItineraryDegraded { trip_id, error } => {
                warn!(trip_id = %trip_id, error = %error, "itinerary deleted but not rewritten");
            }
        }
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn events(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.events().clone()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.events())
    }
}

impl DiagnosticsSink for CollectingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        self.events().push(diagnostic);
    }
}
