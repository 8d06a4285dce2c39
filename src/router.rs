//! HTTP routing provider: OSRM for car legs, the transit adapter for public
//! transport.

use crate::error::RoutingError;
use crate::model::Coordinate;
use crate::osrm::{OsrmClient, OsrmConfig};
use crate::traits::{CarRoute, RoutePriority, RoutingProvider, TransitRoute};
use crate::transit::{TransitClient, TransitConfig};

#[derive(Debug, Clone)]
pub struct HttpRouter {
    car: OsrmClient,
    transit: TransitClient,
}

impl HttpRouter {
    pub fn new(car: OsrmClient, transit: TransitClient) -> Self {
        Self { car, transit }
    }

    pub fn from_config(osrm: OsrmConfig, transit: TransitConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(OsrmClient::new(osrm)?, TransitClient::new(transit)?))
    }
}

impl RoutingProvider for HttpRouter {
    fn car_route(
        &self,
        from: Coordinate,
        to: Coordinate,
        priority: RoutePriority,
    ) -> Result<Option<CarRoute>, RoutingError> {
        self.car.route(from, to, priority)
    }

    fn transit_route(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<Option<TransitRoute>, RoutingError> {
        self.transit.route(from, to)
    }
}
