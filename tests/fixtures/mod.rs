//! Test fixtures for trip-planner.
//!
//! Provides realistic test data including:
//! - Real Seoul locations (from OpenStreetMap)
//! - Builders for trips and places
//! - In-memory routing provider and persistence gateway with call logs

#![allow(dead_code)]

pub mod seoul_locations;

pub use seoul_locations::*;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::NaiveDate;

use trip_planner::model::{Accommodation, TripEndpoint, TripStatus};
use trip_planner::traits::{CarRoute, RoutePriority, TransitRoute};
use trip_planner::{
    Coordinate, DailyItinerary, FixedSchedule, PersistenceError, PersistenceGateway, Place, RoutingError,
    RoutingProvider, TravelMode, Trip,
};

pub fn may(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, day).unwrap()
}

// ============================================================================
// Builders
// ============================================================================

pub fn place(id: &str, location: &Location, stay_minutes: u32) -> Place {
    Place {
        id: id.to_string(),
        name: location.name.to_string(),
        coordinate: location.coordinate(),
        stay_duration_minutes: stay_minutes,
        priority: 0,
    }
}

/// The first `count` sights as places `p1..=pN`.
pub fn sights(count: usize, stay_minutes: u32) -> Vec<Place> {
    SIGHTS
        .iter()
        .take(count)
        .enumerate()
        .map(|(index, location)| place(&format!("p{}", index + 1), location, stay_minutes))
        .collect()
}

pub fn fixed(place_id: &str, date: NaiveDate, start: &str) -> FixedSchedule {
    FixedSchedule {
        place_id: place_id.to_string(),
        date,
        start_time: start.to_string(),
        end_time: None,
    }
}

/// Builder for trips with sensible defaults: one day, car, no endpoints.
#[derive(Debug, Clone)]
pub struct TripBuilder {
    trip: Trip,
}

impl TripBuilder {
    pub fn new(id: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            trip: Trip {
                id: id.to_string(),
                start_date: start,
                end_date: end,
                start_time: None,
                end_time: None,
                origin: None,
                destination: None,
                transport_mode: TravelMode::Car,
                accommodations: Vec::new(),
                daily_start_time: None,
                daily_end_time: None,
                day_overrides: Vec::new(),
                status: TripStatus::Draft,
            },
        }
    }

    pub fn mode(mut self, mode: TravelMode) -> Self {
        self.trip.transport_mode = mode;
        self
    }

    pub fn origin(mut self, location: &Location) -> Self {
        self.trip.origin = Some(endpoint(location));
        self
    }

    pub fn destination(mut self, location: &Location) -> Self {
        self.trip.destination = Some(endpoint(location));
        self
    }

    pub fn daily_window(mut self, start: &str, end: &str) -> Self {
        self.trip.daily_start_time = Some(start.to_string());
        self.trip.daily_end_time = Some(end.to_string());
        self
    }

    pub fn accommodation(
        mut self,
        location: &Location,
        check_in: NaiveDate,
        check_out: NaiveDate,
        check_in_time: Option<&str>,
    ) -> Self {
        self.trip.accommodations.push(Accommodation {
            name: location.name.to_string(),
            coordinate: location.coordinate(),
            check_in_date: check_in,
            check_out_date: check_out,
            check_in_time: check_in_time.map(str::to_string),
        });
        self
    }

    pub fn build(self) -> Trip {
        self.trip
    }
}

fn endpoint(location: &Location) -> TripEndpoint {
    TripEndpoint {
        name: location.name.to_string(),
        coordinate: location.coordinate(),
    }
}

// ============================================================================
// Routing provider
// ============================================================================

/// Car provider that answers with a fixed route and logs every request.
#[derive(Debug, Default)]
pub struct CountingRouter {
    calls: Mutex<Vec<(Coordinate, Coordinate)>>,
    /// Requests to these destinations fail.
    failing_targets: Vec<Coordinate>,
}

impl CountingRouter {
    pub fn failing_to(targets: Vec<Coordinate>) -> Self {
        Self {
            failing_targets: targets,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(Coordinate, Coordinate)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RoutingProvider for CountingRouter {
    fn car_route(
        &self,
        from: Coordinate,
        to: Coordinate,
        _priority: RoutePriority,
    ) -> Result<Option<CarRoute>, RoutingError> {
        self.calls.lock().unwrap().push((from, to));
        if self.failing_targets.contains(&to) {
            return Err(RoutingError::Http("503 Service Unavailable".into()));
        }
        Ok(Some(CarRoute {
            distance_meters: 2_500,
            duration_minutes: 9,
            polyline: Some("_p~iF~ps|U_ulLnnqC_mqNvxq`@".into()),
            fare: None,
        }))
    }

    fn transit_route(&self, from: Coordinate, to: Coordinate) -> Result<Option<TransitRoute>, RoutingError> {
        self.calls.lock().unwrap().push((from, to));
        Ok(None)
    }
}

// ============================================================================
// Persistence gateway
// ============================================================================

/// Which gateway operations should fail.
#[derive(Debug, Clone, Default)]
pub struct Failures {
    pub delete: bool,
    pub insert: bool,
    pub save_days: HashSet<u32>,
}

/// Single-trip in-memory store.
#[derive(Debug)]
pub struct MemoryGateway {
    trip: Trip,
    places: Vec<Place>,
    fixed: Vec<FixedSchedule>,
    stored: Mutex<Vec<DailyItinerary>>,
    status: Mutex<TripStatus>,
    failures: Failures,
    log: Mutex<Vec<String>>,
}

impl MemoryGateway {
    pub fn new(trip: Trip, places: Vec<Place>, fixed: Vec<FixedSchedule>) -> Self {
        let status = trip.status;
        Self {
            trip,
            places,
            fixed,
            stored: Mutex::new(Vec::new()),
            status: Mutex::new(status),
            failures: Failures::default(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_stored(self, days: Vec<DailyItinerary>) -> Self {
        *self.stored.lock().unwrap() = days;
        self
    }

    pub fn with_failures(mut self, failures: Failures) -> Self {
        self.failures = failures;
        self
    }

    pub fn stored(&self) -> Vec<DailyItinerary> {
        self.stored.lock().unwrap().clone()
    }

    pub fn status(&self) -> TripStatus {
        *self.status.lock().unwrap()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, operation: impl Into<String>) {
        self.log.lock().unwrap().push(operation.into());
    }

    fn check_trip(&self, trip_id: &str) -> Result<(), PersistenceError> {
        if trip_id == self.trip.id {
            Ok(())
        } else {
            Err(PersistenceError::NotFound(trip_id.to_string()))
        }
    }
}

impl PersistenceGateway for MemoryGateway {
    fn load_trip(&self, trip_id: &str) -> Result<Trip, PersistenceError> {
        self.record("load_trip");
        self.check_trip(trip_id)?;
        Ok(self.trip.clone())
    }

    fn load_places(&self, trip_id: &str) -> Result<Vec<Place>, PersistenceError> {
        self.check_trip(trip_id)?;
        Ok(self.places.clone())
    }

    fn load_fixed_schedules(&self, trip_id: &str) -> Result<Vec<FixedSchedule>, PersistenceError> {
        self.check_trip(trip_id)?;
        Ok(self.fixed.clone())
    }

    fn load_stored_itinerary(&self, trip_id: &str) -> Result<Vec<DailyItinerary>, PersistenceError> {
        self.check_trip(trip_id)?;
        Ok(self.stored())
    }

    fn delete_itinerary(&self, trip_id: &str) -> Result<(), PersistenceError> {
        self.record("delete_itinerary");
        self.check_trip(trip_id)?;
        if self.failures.delete {
            return Err(PersistenceError::Backend("delete rejected".into()));
        }
        self.stored.lock().unwrap().clear();
        Ok(())
    }

    fn insert_itinerary(&self, trip_id: &str, days: &[DailyItinerary]) -> Result<(), PersistenceError> {
        self.record("insert_itinerary");
        self.check_trip(trip_id)?;
        if self.failures.insert {
            return Err(PersistenceError::Backend("insert rejected".into()));
        }
        *self.stored.lock().unwrap() = days.to_vec();
        Ok(())
    }

    fn save_day(&self, trip_id: &str, day: &DailyItinerary) -> Result<(), PersistenceError> {
        self.record(format!("save_day:{}", day.day_number));
        self.check_trip(trip_id)?;
        if self.failures.save_days.contains(&day.day_number) {
            return Err(PersistenceError::Backend(format!("day {} rejected", day.day_number)));
        }
        let mut stored = self.stored.lock().unwrap();
        match stored.iter_mut().find(|existing| existing.day_number == day.day_number) {
            Some(existing) => *existing = day.clone(),
            None => stored.push(day.clone()),
        }
        Ok(())
    }

    fn update_trip_status(&self, trip_id: &str, status: TripStatus) -> Result<(), PersistenceError> {
        self.record(format!("update_trip_status:{:?}", status));
        self.check_trip(trip_id)?;
        *self.status.lock().unwrap() = status;
        Ok(())
    }
}

/// Legs across all days, keyed the way recalculation keys them.
pub fn stored_leg_count(days: &[DailyItinerary]) -> usize {
    days.iter()
        .map(|day| trip_planner::segments::itinerary_segments(day).len())
        .sum()
}

/// Provider requests per directed coordinate pair.
pub fn provider_coordinates(router: &CountingRouter) -> HashMap<String, usize> {
    let mut seen = HashMap::new();
    for (from, to) in router.calls() {
        *seen
            .entry(format!("{:.6},{:.6}->{:.6},{:.6}", from.lat, from.lng, to.lat, to.lng))
            .or_insert(0) += 1;
    }
    seen
}
