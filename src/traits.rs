//! Collaborator interfaces the planner core depends on.
//!
//! These are intentionally minimal. Applications implement them over their
//! own HTTP clients and storage.

use serde::{Deserialize, Serialize};

use crate::error::{PersistenceError, ReplaceError, RoutingError};
use crate::model::{
    Coordinate, CostSource, DailyItinerary, FixedSchedule, Place, SubPath, TransitDetails,
    TravelCostEntry, TravelMode, Trip, TripStatus,
};

/// Car routing preference passed through to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePriority {
    #[default]
    Recommended,
    Fastest,
    Shortest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CarRoute {
    pub distance_meters: u32,
    pub duration_minutes: u32,
    pub polyline: Option<String>,
    pub fare: Option<u32>,
}

impl CarRoute {
    pub fn into_entry(self) -> TravelCostEntry {
        TravelCostEntry {
            distance_meters: self.distance_meters,
            duration_minutes: self.duration_minutes,
            mode: TravelMode::Car,
            polyline: self.polyline,
            fare: self.fare,
            transit_details: None,
            source: CostSource::Provider,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitRoute {
    pub distance_meters: u32,
    pub duration_minutes: u32,
    pub fare: Option<u32>,
    pub polyline: Option<String>,
    pub sub_paths: Vec<SubPath>,
}

impl TransitRoute {
    pub fn into_entry(self) -> TravelCostEntry {
        let vehicle_legs = self
            .sub_paths
            .iter()
            .filter(|leg| !leg.traffic_type.is_walk())
            .count() as u32;
        let (walking_time, walking_distance) = self
            .sub_paths
            .iter()
            .filter(|leg| leg.traffic_type.is_walk())
            .fold((0, 0), |(time, distance), leg| {
                (time + leg.duration_minutes, distance + leg.distance_meters)
            });

        let details = TransitDetails {
            transfer_count: vehicle_legs.saturating_sub(1),
            walking_time,
            walking_distance,
            total_fare: self.fare.unwrap_or(0),
            sub_paths: self.sub_paths,
        };

        TravelCostEntry {
            distance_meters: self.distance_meters,
            duration_minutes: self.duration_minutes,
            mode: TravelMode::Public,
            polyline: self.polyline,
            fare: self.fare,
            transit_details: Some(details),
            source: CostSource::Provider,
        }
    }
}

/// External routing provider.
///
/// `Ok(None)` means the provider answered and no route exists; `Err` means
/// the request itself failed. Implementations must bound each call with a
/// timeout.
pub trait RoutingProvider: Sync {
    fn car_route(
        &self,
        from: Coordinate,
        to: Coordinate,
        priority: RoutePriority,
    ) -> Result<Option<CarRoute>, RoutingError>;

    fn transit_route(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<Option<TransitRoute>, RoutingError>;
}

/// Storage for trips and their itineraries. Trip ids are opaque here.
pub trait PersistenceGateway: Sync {
    fn load_trip(&self, trip_id: &str) -> Result<Trip, PersistenceError>;

    fn load_places(&self, trip_id: &str) -> Result<Vec<Place>, PersistenceError>;

    fn load_fixed_schedules(&self, trip_id: &str) -> Result<Vec<FixedSchedule>, PersistenceError>;

    fn load_stored_itinerary(&self, trip_id: &str) -> Result<Vec<DailyItinerary>, PersistenceError>;

    fn delete_itinerary(&self, trip_id: &str) -> Result<(), PersistenceError>;

    fn insert_itinerary(&self, trip_id: &str, days: &[DailyItinerary]) -> Result<(), PersistenceError>;

    /// Overwrite a single stored day, matched by day number.
    fn save_day(&self, trip_id: &str, day: &DailyItinerary) -> Result<(), PersistenceError>;

    fn update_trip_status(&self, trip_id: &str, status: TripStatus) -> Result<(), PersistenceError>;

    /// Delete-then-insert. The error says which half failed so callers can tell
    /// an untouched store from a degraded one.
    fn replace_itinerary(&self, trip_id: &str, days: &[DailyItinerary]) -> Result<(), ReplaceError> {
        self.delete_itinerary(trip_id).map_err(ReplaceError::Delete)?;
        self.insert_itinerary(trip_id, days).map_err(ReplaceError::Insert)
    }
}
