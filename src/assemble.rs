//! Itinerary assembly: day assignments to time-stamped `DailyItinerary` rows.
//!
//! A day is a sequence `[origin] stops.. [destination]` where stops are visits
//! and at most one check-in. Every adjacent pair of distinct nodes is a leg.
//! The leg into the destination is `transport_to_destination`, the leg out of
//! the origin is `transport_from_origin`, and every other leg hangs off the
//! stop it leaves.

use tracing::debug;

use crate::context::TripContext;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::distribute::DayAssignment;
use crate::endpoints::{resolve_destination, resolve_origin, stable_id, DayQuery, ResolvedEndpoint};
use crate::matrix::TravelCostMatrix;
use crate::model::{
    accommodation_id, CheckInEvent, DailyItinerary, DayEndpoint, EndpointKind, Node, ScheduleItem,
    TravelCostEntry, TravelMode,
};
use crate::time_utils::{minutes_to_time, window_bound_to_time};
use crate::timeline::DayClock;
use crate::windows::DayWindow;

#[derive(Debug, Clone, PartialEq)]
pub enum PlannedStop {
    Visit(Node),
    CheckIn { node: Node, minute: u32 },
}

impl PlannedStop {
    pub fn node(&self) -> &Node {
        match self {
            PlannedStop::Visit(node) => node,
            PlannedStop::CheckIn { node, .. } => node,
        }
    }
}

/// Position of a node in a day's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Origin,
    Stop(usize),
    Destination,
}

/// One day before timing: endpoints and ordered stops.
#[derive(Debug, Clone, PartialEq)]
pub struct DayPlan {
    pub window: DayWindow,
    pub origin: Option<ResolvedEndpoint>,
    /// Never a last-place endpoint; those carry no leg.
    pub destination: Option<ResolvedEndpoint>,
    pub stops: Vec<PlannedStop>,
}

impl DayPlan {
    pub fn sequence(&self) -> Vec<(Role, &Node)> {
        let mut sequence = Vec::with_capacity(self.stops.len() + 2);
        if let Some(origin) = &self.origin {
            sequence.push((Role::Origin, &origin.node));
        }
        sequence.extend(
            self.stops
                .iter()
                .enumerate()
                .map(|(index, stop)| (Role::Stop(index), stop.node())),
        );
        if let Some(destination) = &self.destination {
            sequence.push((Role::Destination, &destination.node));
        }
        sequence
    }

    /// Directed legs in travel order, skipping pairs of the same node.
    pub fn legs(&self) -> Vec<(Role, &Node, Role, &Node)> {
        self.sequence()
            .windows(2)
            .filter(|pair| pair[0].1.id != pair[1].1.id)
            .map(|pair| (pair[0].0, pair[0].1, pair[1].0, pair[1].1))
            .collect()
    }

    /// Where the next day picks up from.
    pub fn end_node(&self) -> Option<&Node> {
        self.destination
            .as_ref()
            .map(|destination| &destination.node)
            .or_else(|| self.stops.last().map(PlannedStop::node))
            .or_else(|| self.origin.as_ref().map(|origin| &origin.node))
    }
}

/// Display class of a travel segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentClass {
    Walking,
    Public,
    Car,
}

/// Segments without transit legs, or with a single walking leg, are shown as
/// walking. Car segments stay car.
pub fn classify_segment(entry: &TravelCostEntry) -> SegmentClass {
    match entry.mode {
        TravelMode::Car => SegmentClass::Car,
        TravelMode::Walking => SegmentClass::Walking,
        TravelMode::Public => match &entry.transit_details {
            Some(details) if !details.is_walk_only() => SegmentClass::Public,
            _ => SegmentClass::Walking,
        },
    }
}

/// Time one day and turn it into an itinerary row.
///
/// `leg` supplies the travel cost for every leg of [`DayPlan::legs`], in
/// order.
pub fn render_day(
    day_number: u32,
    plan: &DayPlan,
    mut leg: impl FnMut(&Node, &Node) -> TravelCostEntry,
    check_in_duration: u32,
    diagnostics: &dyn DiagnosticsSink,
) -> DailyItinerary {
    let window = plan.window;
    let mut to_next: Vec<Option<TravelCostEntry>> = vec![None; plan.stops.len()];
    let mut into_stop: Vec<u32> = vec![0; plan.stops.len()];
    let mut transport_from_origin = None;
    let mut transport_to_destination = None;
    let mut total_distance = 0;
    let mut total_duration = 0;

    for (from_role, from, to_role, to) in plan.legs() {
        let entry = leg(from, to);
        total_distance += entry.distance_meters;
        total_duration += entry.duration_minutes;
        if let Role::Stop(index) = to_role {
            into_stop[index] = entry.duration_minutes;
        }
        match (from_role, to_role) {
            (_, Role::Destination) => transport_to_destination = Some(entry),
            (Role::Origin, _) => transport_from_origin = Some(entry),
            (Role::Stop(index), _) => to_next[index] = Some(entry),
            (Role::Destination, _) => {}
        }
    }

    let mut clock = DayClock::new(window.start_minute, check_in_duration);
    let mut schedule = Vec::with_capacity(plan.stops.len());
    let mut check_in_event = None;
    let mut total_stay_duration = 0;

    for (index, (stop, to_next)) in plan.stops.iter().zip(to_next).enumerate() {
        match stop {
            PlannedStop::Visit(node) => {
                let timed = clock.visit(into_stop[index], node);
                if let (Some(earliest), Some(slot)) = (timed.late_arrival, node.fixed) {
                    diagnostics.emit(Diagnostic::FixedArrivalLate {
                        place_id: node.id.clone(),
                        date: window.date,
                        earliest_arrival: earliest,
                        fixed_start: slot.start_minute,
                    });
                }
                let duration = timed.departure - timed.arrival;
                total_stay_duration += duration;
                schedule.push(ScheduleItem {
                    order: schedule.len() as u32 + 1,
                    place_id: node.id.clone(),
                    place_name: node.name.clone(),
                    arrival_time: minutes_to_time(timed.arrival),
                    departure_time: minutes_to_time(timed.departure),
                    duration_minutes: duration,
                    is_fixed: node.is_fixed(),
                    transport_to_next: to_next,
                });
            }
            PlannedStop::CheckIn { node, minute } => {
                let timed = clock.check_in(into_stop[index], *minute);
                check_in_event = Some(CheckInEvent {
                    accommodation_id: stable_id(node).map(str::to_string),
                    accommodation_name: node.name.clone(),
                    coordinate: node.coordinate,
                    check_in_time: minutes_to_time(*minute),
                    arrival_time: minutes_to_time(timed.arrival),
                    departure_time: minutes_to_time(timed.departure),
                    duration_minutes: timed.departure - timed.arrival,
                    places_before: schedule.len(),
                    transport_to_next: to_next,
                });
            }
        }
    }

    let day_destination = match &plan.destination {
        Some(destination) => Some(destination.endpoint.clone()),
        None => plan.stops.iter().rev().find_map(|stop| match stop {
            PlannedStop::Visit(node) => Some(DayEndpoint::from_node(EndpointKind::LastPlace, node)),
            PlannedStop::CheckIn { .. } => None,
        }),
    };

    DailyItinerary {
        day_number,
        date: window.date,
        schedule,
        day_origin: plan.origin.as_ref().map(|origin| origin.endpoint.clone()),
        day_destination,
        transport_from_origin,
        transport_to_destination,
        total_distance,
        total_duration,
        total_stay_duration,
        daily_start_time: window_bound_to_time(window.start_minute),
        daily_end_time: window_bound_to_time(window.end_minute),
        check_in_event,
    }
}

/// Resolve endpoints and stops for each assigned day, in order.
pub fn plan_days(assignments: &[DayAssignment], context: &TripContext) -> Vec<DayPlan> {
    let mut plans: Vec<DayPlan> = Vec::with_capacity(assignments.len());

    for (index, assignment) in assignments.iter().enumerate() {
        let Some(window) = context.window_for(assignment.date).copied() else {
            continue;
        };
        let previous_end = plans.last().and_then(DayPlan::end_node).cloned();
        let query = DayQuery {
            day_index: index,
            date: window.date,
            is_last: index + 1 == context.windows.len(),
            explicit: None,
            previous_end: previous_end.as_ref(),
        };

        let mut stops: Vec<PlannedStop> = assignment
            .places
            .iter()
            .filter_map(|id| context.nodes.get(id))
            .map(|node| PlannedStop::Visit(node.clone()))
            .collect();

        if let Some(split) = assignment.check_in {
            let node = context.nodes.get(&accommodation_id(split.accommodation));
            let minute = context.lodging.check_in(window.date).map(|check_in| check_in.minute);
            if let (Some(node), Some(minute)) = (node, minute) {
                let at = split.places_before.min(stops.len());
                stops.insert(
                    at,
                    PlannedStop::CheckIn {
                        node: node.clone(),
                        minute,
                    },
                );
            }
        }

        plans.push(DayPlan {
            window,
            origin: resolve_origin(context, &query),
            destination: resolve_destination(context, &query),
            stops,
        });
    }

    plans
}

/// Build one itinerary row per assigned day from matrix costs.
pub fn assemble(
    assignments: &[DayAssignment],
    context: &TripContext,
    matrix: &TravelCostMatrix,
    diagnostics: &dyn DiagnosticsSink,
) -> Vec<DailyItinerary> {
    let itineraries: Vec<DailyItinerary> = plan_days(assignments, context)
        .iter()
        .map(|plan| {
            render_day(
                plan.window.day_number,
                plan,
                |from, to| matrix.entry(from, to),
                context.check_in_duration,
                diagnostics,
            )
        })
        .collect();

    debug!(
        days = itineraries.len(),
        stops = itineraries.iter().map(|day| day.schedule.len()).sum::<usize>(),
        "itinerary assembled"
    );
    itineraries
}
