//! OSRM HTTP adapter for car legs.

use serde::Deserialize;

use crate::error::RoutingError;
use crate::model::Coordinate;
use crate::traits::{CarRoute, RoutePriority};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn route_url(&self, from: Coordinate, to: Coordinate, priority: RoutePriority) -> String {
        let alternatives = !matches!(priority, RoutePriority::Recommended);
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}?overview=full&geometries=polyline&alternatives={}",
            self.config.base_url, self.config.profile, from.lng, from.lat, to.lng, to.lat, alternatives
        )
    }

    /// Fetch a driving route. `Ok(None)` when OSRM reports no route.
    pub fn route(
        &self,
        from: Coordinate,
        to: Coordinate,
        priority: RoutePriority,
    ) -> Result<Option<CarRoute>, RoutingError> {
        let body = self
            .client
            .get(self.route_url(from, to, priority))
            .send()
            .and_then(|resp| resp.error_for_status())?
            .json::<OsrmRouteResponse>()?;

        body.into_car_route(priority)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
    #[serde(default)]
    geometry: Option<String>,
}

impl OsrmRouteResponse {
    fn into_car_route(self, priority: RoutePriority) -> Result<Option<CarRoute>, RoutingError> {
        match self.code.as_str() {
            "Ok" => {}
            "NoRoute" | "NoSegment" => return Ok(None),
            other => {
                return Err(RoutingError::Malformed(format!(
                    "OSRM returned {}: {}",
                    other,
                    self.message.unwrap_or_default()
                )));
            }
        }

        let chosen = match priority {
            RoutePriority::Recommended => self.routes.into_iter().next(),
            RoutePriority::Fastest => self
                .routes
                .into_iter()
                .min_by(|a, b| a.duration.total_cmp(&b.duration)),
            RoutePriority::Shortest => self
                .routes
                .into_iter()
                .min_by(|a, b| a.distance.total_cmp(&b.distance)),
        };

        Ok(chosen.map(|route| CarRoute {
            distance_meters: route.distance.round().max(0.0) as u32,
            duration_minutes: (route.duration / 60.0).round().max(0.0) as u32,
            polyline: route.geometry.filter(|geometry| !geometry.is_empty()),
            fare: None,
        }))
    }
}
