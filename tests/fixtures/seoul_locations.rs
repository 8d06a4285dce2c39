//! Seoul landmarks for realistic trip fixtures.
//!
//! Coordinates taken from OpenStreetMap. All points are routable on the
//! South Korea extract.

use trip_planner::Coordinate;

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

// ============================================================================
// Transport hubs (trip origins / destinations)
// ============================================================================

pub const SEOUL_STATION: Location = Location::new("Seoul Station", 37.5546788, 126.9706069);
pub const GIMPO_AIRPORT: Location = Location::new("Gimpo Airport", 37.5586545, 126.7944739);

// ============================================================================
// Hotels
// ============================================================================

pub const HOTELS: &[Location] = &[
    Location::new("Lotte Hotel Seoul", 37.5651070, 126.9810500),
    Location::new("Grand Hyatt Seoul", 37.5393840, 126.9975280),
];

// ============================================================================
// Sights, roughly west to east
// ============================================================================

pub const SIGHTS: &[Location] = &[
    Location::new("Gyeongbokgung Palace", 37.5796212, 126.9770162),
    Location::new("Bukchon Hanok Village", 37.5826041, 126.9836678),
    Location::new("Changdeokgung Palace", 37.5794309, 126.9910426),
    Location::new("Gwangjang Market", 37.5700218, 126.9996580),
    Location::new("Dongdaemun Design Plaza", 37.5665350, 127.0092410),
    Location::new("N Seoul Tower", 37.5511694, 126.9882266),
    Location::new("Myeongdong Cathedral", 37.5632661, 126.9873348),
    Location::new("Deoksugung Palace", 37.5658049, 126.9751461),
];
