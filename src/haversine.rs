//! Straight-line travel estimates (fallback when no routing provider answers).
//!
//! Uses great-circle distance and an assumed per-mode speed.
//! Less accurate than a routing provider (ignores roads) but always available
//! and a pure function of the coordinates.

use serde::{Deserialize, Serialize};

use crate::model::{Coordinate, CostSource, TravelCostEntry, TravelMode};

/// Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Assumed average speeds, km/h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateSpeeds {
    pub walking_kmh: f64,
    pub public_kmh: f64,
    pub car_kmh: f64,
}

impl Default for EstimateSpeeds {
    fn default() -> Self {
        Self {
            walking_kmh: 4.0,
            public_kmh: 20.0,
            car_kmh: 40.0,
        }
    }
}

impl EstimateSpeeds {
    pub fn for_mode(&self, mode: TravelMode) -> f64 {
        match mode {
            TravelMode::Walking => self.walking_kmh,
            TravelMode::Public => self.public_kmh,
            TravelMode::Car => self.car_kmh,
        }
    }
}

/// Great-circle distance between two points in meters.
pub fn haversine_meters(from: Coordinate, to: Coordinate) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Haversine-based travel cost estimator.
#[derive(Debug, Clone, Default)]
pub struct HaversineEstimator {
    pub speeds: EstimateSpeeds,
}

impl HaversineEstimator {
    pub fn new(speeds: EstimateSpeeds) -> Self {
        Self { speeds }
    }

    /// Convert a distance in meters to whole travel minutes at `speed_kmh`.
    ///
    /// Any non-zero distance costs at least one minute.
    fn meters_to_minutes(meters: f64, speed_kmh: f64) -> u32 {
        if meters < 1.0 || speed_kmh <= 0.0 {
            return 0;
        }
        let hours = (meters / 1000.0) / speed_kmh;
        ((hours * 60.0).round() as u32).max(1)
    }

    pub fn duration_minutes(&self, from: Coordinate, to: Coordinate, mode: TravelMode) -> u32 {
        Self::meters_to_minutes(haversine_meters(from, to), self.speeds.for_mode(mode))
    }

    /// Estimated entry for `from → to`. No polyline, fare or transit legs.
    pub fn estimate(&self, from: Coordinate, to: Coordinate, mode: TravelMode) -> TravelCostEntry {
        let meters = haversine_meters(from, to);
        TravelCostEntry {
            distance_meters: meters.round() as u32,
            duration_minutes: Self::meters_to_minutes(meters, self.speeds.for_mode(mode)),
            mode,
            polyline: None,
            fare: None,
            transit_details: None,
            source: CostSource::Estimate,
        }
    }
}
