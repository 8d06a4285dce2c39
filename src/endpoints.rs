//! Day endpoint resolution.
//!
//! Each side of a day is resolved by trying a short, ordered list of
//! strategies and keeping the first that answers. Every strategy is a plain
//! function of the trip context and the day being resolved.
//!
//! Origin: explicit endpoint, trip origin (first day), last night's
//! accommodation, where the previous day ended.
//!
//! Destination: explicit endpoint, trip destination (last day), tonight's
//! accommodation.

use chrono::NaiveDate;

use crate::context::TripContext;
use crate::model::{accommodation_id, Coordinate, DayEndpoint, EndpointKind, Node, NodeKind};

/// Coordinate tolerance for matching legacy accommodation rows, degrees.
pub const COORDINATE_EPSILON: f64 = 1e-5;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEndpoint {
    pub node: Node,
    pub endpoint: DayEndpoint,
}

impl ResolvedEndpoint {
    fn from_node(kind: EndpointKind, node: &Node) -> Self {
        Self {
            node: node.clone(),
            endpoint: DayEndpoint::from_node(kind, node),
        }
    }
}

/// The day being resolved.
#[derive(Debug, Clone, Copy)]
pub struct DayQuery<'a> {
    pub day_index: usize,
    pub date: NaiveDate,
    pub is_last: bool,
    /// Endpoint already recorded on the itinerary, if any.
    pub explicit: Option<&'a DayEndpoint>,
    /// Where the previous day finished.
    pub previous_end: Option<&'a Node>,
}

type Strategy = fn(&TripContext, &DayQuery<'_>) -> Option<ResolvedEndpoint>;

const ORIGIN_STRATEGIES: &[Strategy] = &[explicit, trip_origin, last_night_accommodation, previous_end];
const DESTINATION_STRATEGIES: &[Strategy] = &[explicit, trip_destination, tonight_accommodation];

pub fn resolve_origin(context: &TripContext, query: &DayQuery<'_>) -> Option<ResolvedEndpoint> {
    ORIGIN_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(context, query))
}

pub fn resolve_destination(context: &TripContext, query: &DayQuery<'_>) -> Option<ResolvedEndpoint> {
    DESTINATION_STRATEGIES
        .iter()
        .find_map(|strategy| strategy(context, query))
}

/// A recorded endpoint, unless it only pointed at the last place (that one is
/// re-derived because edits move the last place).
fn explicit(context: &TripContext, query: &DayQuery<'_>) -> Option<ResolvedEndpoint> {
    let recorded = query.explicit?;
    if recorded.kind == EndpointKind::LastPlace {
        return None;
    }
    let endpoint = normalize_endpoint(context, recorded);
    let node = match endpoint.node_id.as_deref() {
        Some(id) => match context.nodes.get(id) {
            Some(node) => node.clone(),
            None => Node::detached(id, endpoint.name.clone(), endpoint.coordinate),
        },
        None => Node::detached(
            coordinate_node_id(endpoint.coordinate),
            endpoint.name.clone(),
            endpoint.coordinate,
        ),
    };
    Some(ResolvedEndpoint { node, endpoint })
}

fn trip_origin(context: &TripContext, query: &DayQuery<'_>) -> Option<ResolvedEndpoint> {
    if query.day_index != 0 {
        return None;
    }
    let node = context.nodes.get(context.origin_id.as_deref()?)?;
    Some(ResolvedEndpoint::from_node(EndpointKind::Origin, node))
}

fn trip_destination(context: &TripContext, query: &DayQuery<'_>) -> Option<ResolvedEndpoint> {
    if !query.is_last {
        return None;
    }
    let node = context.nodes.get(context.destination_id.as_deref()?)?;
    Some(ResolvedEndpoint::from_node(EndpointKind::Destination, node))
}

fn last_night_accommodation(context: &TripContext, query: &DayQuery<'_>) -> Option<ResolvedEndpoint> {
    let index = context.lodging.night(query.date.pred_opt()?)?;
    let node = context.nodes.get(&accommodation_id(index))?;
    Some(ResolvedEndpoint::from_node(EndpointKind::Accommodation, node))
}

fn tonight_accommodation(context: &TripContext, query: &DayQuery<'_>) -> Option<ResolvedEndpoint> {
    let index = context.lodging.night(query.date)?;
    let node = context.nodes.get(&accommodation_id(index))?;
    Some(ResolvedEndpoint::from_node(EndpointKind::Accommodation, node))
}

fn previous_end(_context: &TripContext, query: &DayQuery<'_>) -> Option<ResolvedEndpoint> {
    let node = query.previous_end?;
    let kind = match node.kind {
        NodeKind::Place => EndpointKind::LastPlace,
        NodeKind::Origin => EndpointKind::Origin,
        NodeKind::Destination => EndpointKind::Destination,
        NodeKind::Accommodation(_) => EndpointKind::Accommodation,
        NodeKind::Detached => EndpointKind::LastPlace,
    };
    Some(ResolvedEndpoint::from_node(kind, node))
}

/// Which of the trip's accommodations an endpoint refers to.
///
/// Identity is by node id. Rows written before ids were recorded only carry a
/// coordinate; those match an accommodation within [`COORDINATE_EPSILON`].
pub fn identify_accommodation(context: &TripContext, endpoint: &DayEndpoint) -> Option<usize> {
    let accommodations = context.nodes.nodes().iter().filter_map(|node| match node.kind {
        NodeKind::Accommodation(index) => Some((index, node)),
        _ => None,
    });

    match endpoint.node_id.as_deref() {
        Some(id) => accommodations
            .filter(|(_, node)| node.id == id)
            .map(|(index, _)| index)
            .next(),
        None if endpoint.kind == EndpointKind::Accommodation => accommodations
            .filter(|(_, node)| same_coordinate(node.coordinate, endpoint.coordinate))
            .map(|(index, _)| index)
            .next(),
        None => None,
    }
}

/// Fill in the node id of a legacy accommodation endpoint.
pub fn normalize_endpoint(context: &TripContext, endpoint: &DayEndpoint) -> DayEndpoint {
    let mut normalized = endpoint.clone();
    if normalized.node_id.is_none() {
        if let Some(index) = identify_accommodation(context, endpoint) {
            normalized.node_id = Some(accommodation_id(index));
        }
    }
    normalized
}

pub fn same_coordinate(a: Coordinate, b: Coordinate) -> bool {
    (a.lat - b.lat).abs() < COORDINATE_EPSILON && (a.lng - b.lng).abs() < COORDINATE_EPSILON
}

/// Id for an endpoint that has only a coordinate.
pub fn coordinate_node_id(coordinate: Coordinate) -> String {
    format!("@{:.6},{:.6}", coordinate.lat, coordinate.lng)
}

/// The node's id, unless it was made up from a coordinate.
pub fn stable_id(node: &Node) -> Option<&str> {
    if node.kind == NodeKind::Detached && node.id == coordinate_node_id(node.coordinate) {
        None
    } else {
        Some(node.id.as_str())
    }
}
