//! Segment identity and the prior-segment index used by recalculation.
//!
//! A segment is a directed leg between two endpoints. Endpoints with a stable
//! id are keyed by it; endpoints that only carry a coordinate are keyed by the
//! coordinate rounded to six decimals so float jitter does not split keys.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::endpoints::stable_id;
use crate::polyline::Polyline;
use crate::model::{
    CostSource, Coordinate, DailyItinerary, DayEndpoint, EndpointKind, Node, TravelCostEntry, TravelMode,
};

/// Shortest transit polyline accepted as a complete route.
pub const MIN_TRANSIT_POLYLINE_LEN: usize = 50;

const COORDINATE_SCALE: f64 = 1e6;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointKey {
    Id(String),
    Coord { lat: i64, lng: i64 },
}

impl EndpointKey {
    pub fn coordinate(coordinate: Coordinate) -> Self {
        EndpointKey::Coord {
            lat: (coordinate.lat * COORDINATE_SCALE).round() as i64,
            lng: (coordinate.lng * COORDINATE_SCALE).round() as i64,
        }
    }

    pub fn of_node(node: &Node) -> Self {
        match stable_id(node) {
            Some(id) => EndpointKey::Id(id.to_string()),
            None => Self::coordinate(node.coordinate),
        }
    }

    pub fn of_endpoint(endpoint: &DayEndpoint) -> Self {
        match &endpoint.node_id {
            Some(id) => EndpointKey::Id(id.clone()),
            None => Self::coordinate(endpoint.coordinate),
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointKey::Id(id) => write!(f, "{}", id),
            EndpointKey::Coord { lat, lng } => write!(
                f,
                "@{:.6},{:.6}",
                *lat as f64 / COORDINATE_SCALE,
                *lng as f64 / COORDINATE_SCALE
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentKey {
    pub from: EndpointKey,
    pub to: EndpointKey,
}

impl SegmentKey {
    pub fn new(from: EndpointKey, to: EndpointKey) -> Self {
        Self { from, to }
    }

    pub fn between(from: &Node, to: &Node) -> Self {
        Self::new(EndpointKey::of_node(from), EndpointKey::of_node(to))
    }
}

/// Whether a stored segment can be reused as-is.
///
/// Any segment needs a duration or a distance. Public-transit segments also
/// need to be a provider answer, or (for rows without provenance) carry a real
/// polyline that decodes to a path and at least one vehicle leg.
pub fn is_complete(entry: &TravelCostEntry, mode: TravelMode) -> bool {
    if entry.distance_meters == 0 && entry.duration_minutes == 0 {
        return false;
    }
    if mode != TravelMode::Public {
        return true;
    }
    match entry.source {
        CostSource::Provider => true,
        CostSource::Estimate => false,
        CostSource::Unknown => {
            let routed = entry
                .polyline
                .as_ref()
                .filter(|polyline| polyline.len() >= MIN_TRANSIT_POLYLINE_LEN)
                .and_then(|polyline| Polyline::decode(polyline))
                .is_some_and(|path| path.points().len() >= 2);
            let rides = entry
                .transit_details
                .as_ref()
                .is_some_and(|details| details.has_vehicle_leg());
            routed && rides
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Origin,
    Stop(usize),
    CheckIn,
    Destination,
}

/// Every leg recorded on a stored day, with the segment stored for it.
///
/// Walks `[origin] items/check-in.. [destination]` the same way assembly does,
/// so keys extracted from an assembled day are the keys it was built from.
pub fn itinerary_segments(day: &DailyItinerary) -> Vec<(SegmentKey, Option<&TravelCostEntry>)> {
    let mut sequence: Vec<(Slot, EndpointKey)> = Vec::with_capacity(day.schedule.len() + 3);
    if let Some(origin) = &day.day_origin {
        sequence.push((Slot::Origin, EndpointKey::of_endpoint(origin)));
    }

    let check_in_at = day
        .check_in_event
        .as_ref()
        .map(|event| event.places_before.min(day.schedule.len()));
    for (index, item) in day.schedule.iter().enumerate() {
        if check_in_at == Some(index) {
            sequence.push((Slot::CheckIn, check_in_key(day)));
        }
        sequence.push((Slot::Stop(index), EndpointKey::Id(item.place_id.clone())));
    }
    if check_in_at == Some(day.schedule.len()) {
        sequence.push((Slot::CheckIn, check_in_key(day)));
    }

    if let Some(destination) = &day.day_destination {
        if destination.kind != EndpointKind::LastPlace {
            sequence.push((Slot::Destination, EndpointKey::of_endpoint(destination)));
        }
    }

    sequence
        .windows(2)
        .filter(|pair| pair[0].1 != pair[1].1)
        .map(|pair| {
            let (from_slot, from) = &pair[0];
            let (to_slot, to) = &pair[1];
            let stored = match (from_slot, to_slot) {
                (_, Slot::Destination) => day.transport_to_destination.as_ref(),
                (Slot::Origin, _) => day.transport_from_origin.as_ref(),
                (Slot::Stop(index), _) => day.schedule[*index].transport_to_next.as_ref(),
                (Slot::CheckIn, _) => day
                    .check_in_event
                    .as_ref()
                    .and_then(|event| event.transport_to_next.as_ref()),
                (Slot::Destination, _) => None,
            };
            (SegmentKey::new(from.clone(), to.clone()), stored)
        })
        .collect()
}

fn check_in_key(day: &DailyItinerary) -> EndpointKey {
    match &day.check_in_event {
        Some(event) => match &event.accommodation_id {
            Some(id) => EndpointKey::Id(id.clone()),
            None => EndpointKey::coordinate(event.coordinate),
        },
        None => EndpointKey::Id(String::new()),
    }
}

/// Segment keys and stored segments of a prior itinerary.
#[derive(Debug, Clone, Default)]
pub struct SegmentIndex {
    keys: HashSet<SegmentKey>,
    stored: HashMap<SegmentKey, TravelCostEntry>,
}

impl SegmentIndex {
    pub fn from_itineraries(days: &[DailyItinerary]) -> Self {
        let mut index = Self::default();
        for day in days {
            for (key, stored) in itinerary_segments(day) {
                if let Some(entry) = stored {
                    index.stored.entry(key.clone()).or_insert_with(|| entry.clone());
                }
                index.keys.insert(key);
            }
        }
        index
    }

    pub fn contains(&self, key: &SegmentKey) -> bool {
        self.keys.contains(key)
    }

    pub fn stored(&self, key: &SegmentKey) -> Option<&TravelCostEntry> {
        self.stored.get(key)
    }

    pub fn keys(&self) -> &HashSet<SegmentKey> {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
