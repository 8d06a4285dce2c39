//! Planner data model.
//!
//! Input records (`Trip`, `Place`, `FixedSchedule`, `Accommodation`) come from
//! the persistence layer. `Node`/`NodeTable` are the per-run arena the engines
//! work on. `DailyItinerary` and friends are the assembled output and the shape
//! stored back through the gateway.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

pub const ORIGIN_ID: &str = "__origin__";
pub const DESTINATION_ID: &str = "__destination__";

/// Reserved id for the accommodation at `index` in the trip's list.
pub fn accommodation_id(index: usize) -> String {
    format!("__accommodation_{}__", index)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

// ============================================================================
// Planning arena
// ============================================================================

/// What a node stands for. Anchors are never part of a `Route`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Place,
    Origin,
    Destination,
    Accommodation(usize),
    /// An endpoint known only from stored itinerary data.
    Detached,
}

/// A pinned appointment slot, in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSlot {
    pub date: NaiveDate,
    pub start_minute: u32,
    pub end_minute: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub name: String,
    pub coordinate: Coordinate,
    pub stay_duration_minutes: u32,
    /// Tie-break weight; lower values are preferred.
    pub priority: i32,
    pub fixed: Option<FixedSlot>,
}

impl Node {
    pub fn place(
        id: impl Into<String>,
        name: impl Into<String>,
        coordinate: Coordinate,
        stay_duration_minutes: u32,
    ) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Place,
            name: name.into(),
            coordinate,
            stay_duration_minutes,
            priority: 0,
            fixed: None,
        }
    }

    pub fn origin(name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self::anchor(ORIGIN_ID.to_string(), NodeKind::Origin, name, coordinate)
    }

    pub fn destination(name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self::anchor(DESTINATION_ID.to_string(), NodeKind::Destination, name, coordinate)
    }

    pub fn accommodation(index: usize, name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self::anchor(
            accommodation_id(index),
            NodeKind::Accommodation(index),
            name,
            coordinate,
        )
    }

    pub fn detached(id: impl Into<String>, name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self::anchor(id.into(), NodeKind::Detached, name, coordinate)
    }

    fn anchor(id: String, kind: NodeKind, name: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            coordinate,
            stay_duration_minutes: 0,
            priority: 0,
            fixed: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_fixed(mut self, slot: FixedSlot) -> Self {
        self.fixed = Some(slot);
        self
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed.is_some()
    }

    pub fn is_anchor(&self) -> bool {
        self.kind != NodeKind::Place
    }
}

/// id → node table for one planning run.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl NodeTable {
    pub fn from_nodes(nodes: Vec<Node>) -> Result<Self, PlanError> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), position).is_some() {
                return Err(PlanError::DuplicateNodeId(node.id.clone()));
            }
        }
        Ok(Self { nodes, index })
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Non-anchor nodes in input order.
    pub fn places(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.kind == NodeKind::Place)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ============================================================================
// Travel costs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Walking,
    Public,
    Car,
}

/// Where a travel cost came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostSource {
    /// Legacy rows stored before provenance was recorded.
    #[default]
    Unknown,
    Estimate,
    Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrafficType {
    Subway,
    Bus,
    Walk,
    Train,
    ExpressBus,
    IntercityBus,
    Other,
}

impl TrafficType {
    /// Map a provider traffic code (1 subway, 2 bus, 3 walk, ...).
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => TrafficType::Subway,
            2 => TrafficType::Bus,
            3 => TrafficType::Walk,
            4 => TrafficType::Train,
            5 => TrafficType::ExpressBus,
            6 => TrafficType::IntercityBus,
            _ => TrafficType::Other,
        }
    }

    pub fn is_walk(&self) -> bool {
        matches!(self, TrafficType::Walk)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subway_code: Option<i64>,
}

/// One leg of a public-transit itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubPath {
    pub traffic_type: TrafficType,
    pub distance_meters: u32,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lanes: Vec<LaneInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polyline: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stops: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitDetails {
    pub sub_paths: Vec<SubPath>,
    pub transfer_count: u32,
    /// Minutes spent on walking legs.
    pub walking_time: u32,
    /// Meters covered on walking legs.
    pub walking_distance: u32,
    pub total_fare: u32,
}

impl TransitDetails {
    /// True when at least one leg rides a vehicle.
    pub fn has_vehicle_leg(&self) -> bool {
        self.sub_paths.iter().any(|leg| !leg.traffic_type.is_walk())
    }

    /// A single walking leg and nothing else.
    pub fn is_walk_only(&self) -> bool {
        self.sub_paths.len() == 1 && self.sub_paths[0].traffic_type.is_walk()
    }
}

/// Directed travel cost between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelCostEntry {
    pub distance_meters: u32,
    pub duration_minutes: u32,
    pub mode: TravelMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polyline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fare: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transit_details: Option<TransitDetails>,
    #[serde(default)]
    pub source: CostSource,
}

// ============================================================================
// Assembled itinerary
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    /// 1-based, unique within the day.
    pub order: u32,
    pub place_id: String,
    pub place_name: String,
    pub arrival_time: String,
    pub departure_time: String,
    pub duration_minutes: u32,
    pub is_fixed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_to_next: Option<TravelCostEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndpointKind {
    Origin,
    Accommodation,
    LastPlace,
    Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayEndpoint {
    #[serde(rename = "type")]
    pub kind: EndpointKind,
    pub name: String,
    pub coordinate: Coordinate,
    /// Stable node id, when known. Legacy rows only carry coordinates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl DayEndpoint {
    pub fn from_node(kind: EndpointKind, node: &Node) -> Self {
        Self {
            kind,
            name: node.name.clone(),
            coordinate: node.coordinate,
            node_id: Some(node.id.clone()),
        }
    }
}

/// Synthetic accommodation check-in inserted into a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accommodation_id: Option<String>,
    pub accommodation_name: String,
    pub coordinate: Coordinate,
    pub check_in_time: String,
    pub arrival_time: String,
    pub departure_time: String,
    pub duration_minutes: u32,
    /// Number of schedule items visited before the check-in.
    pub places_before: usize,
    /// Leg from the accommodation to the next stop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_to_next: Option<TravelCostEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyItinerary {
    pub day_number: u32,
    pub date: NaiveDate,
    pub schedule: Vec<ScheduleItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_origin: Option<DayEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_destination: Option<DayEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_from_origin: Option<TravelCostEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_to_destination: Option<TravelCostEntry>,
    pub total_distance: u32,
    pub total_duration: u32,
    pub total_stay_duration: u32,
    pub daily_start_time: String,
    pub daily_end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in_event: Option<CheckInEvent>,
}

// ============================================================================
// Trip records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    #[default]
    Draft,
    Optimized,
    /// The stored itinerary was deleted but the replacement was not written.
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripEndpoint {
    pub name: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accommodation {
    pub name: String,
    pub coordinate: Coordinate,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    /// `HH:MM`. Without one, no check-in event is scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayWindowOverride {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Arrival time on the first day (`HH:MM`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Departure time on the last day (`HH:MM`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<TripEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<TripEndpoint>,
    pub transport_mode: TravelMode,
    #[serde(default)]
    pub accommodations: Vec<Accommodation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_end_time: Option<String>,
    #[serde(default)]
    pub day_overrides: Vec<DayWindowOverride>,
    #[serde(default)]
    pub status: TripStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
    pub stay_duration_minutes: u32,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedSchedule {
    pub place_id: String,
    pub date: NaiveDate,
    pub start_time: String,
    /// Derived as start + stay duration when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}
