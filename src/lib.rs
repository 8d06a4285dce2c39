//! trip-planner core
//!
//! Multi-day itinerary planning: travel cost matrix, nearest-neighbor + 2-opt
//! route search, day distribution, itinerary assembly and incremental
//! recalculation after edits. Storage and routing providers are reached
//! through the traits in [`traits`].

pub mod assemble;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod distribute;
pub mod endpoints;
pub mod error;
pub mod haversine;
pub mod matrix;
pub mod model;
pub mod osrm;
pub mod planner;
pub mod polyline;
pub mod recalc;
pub mod router;
pub mod search;
pub mod segments;
pub mod throttle;
pub mod time_utils;
pub mod timeline;
pub mod traits;
pub mod transit;
pub mod validate;
pub mod windows;

pub use config::PlannerConfig;
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticsSink, NoopSink, TracingSink};
pub use error::{PersistenceError, PlanError, ReplaceError, RoutingError};
pub use model::{Coordinate, DailyItinerary, FixedSchedule, Place, TravelMode, Trip};
pub use planner::{PlanOutcome, Planner, SaveReport};
pub use traits::{PersistenceGateway, RoutingProvider};
