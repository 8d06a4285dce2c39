//! Daily distribution: pack the searched route into calendar days.
//!
//! Greedy and single pass. Fixed places are taken out of the stream and pinned
//! to their own date as blocks; an accommodation check-in inside a day's window
//! is a block too. The remaining places are packed in route order around the
//! blocks: a place goes before a block only if it and the hop to the block are
//! done by the block's start.
//!
//! A place that does not fit closes the day only when some later day, opened
//! from where the days before it would end, can take it; otherwise it is
//! reported unassigned and the day carries on with the next place. Nothing is
//! ever dropped silently.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::NaiveDate;
use tracing::debug;

use crate::context::TripContext;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::endpoints::{resolve_destination, resolve_origin, DayQuery};
use crate::matrix::TravelCostMatrix;
use crate::model::{accommodation_id, Node};
use crate::timeline::DayClock;
use crate::windows::DayWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnassignedReason {
    /// No day in the trip has a free gap as long as the stay.
    ExceedsDayBudget,
    /// Some day could hold it, but none was left when its turn came.
    NoDaysLeft,
    UnknownPlace,
    FixedDateOutsideTrip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnassignedPlace {
    pub place_id: String,
    pub reason: UnassignedReason,
}

/// Where the check-in falls in a day's place list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInSplit {
    pub accommodation: usize,
    pub places_before: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAssignment {
    pub day_number: u32,
    pub date: NaiveDate,
    /// Place ids in visiting order.
    pub places: Vec<String>,
    pub check_in: Option<CheckInSplit>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    pub days: Vec<DayAssignment>,
    pub unassigned_places: Vec<UnassignedPlace>,
}

impl Distribution {
    pub fn assigned_ids(&self) -> impl Iterator<Item = &str> {
        self.days
            .iter()
            .flat_map(|day| day.places.iter().map(String::as_str))
    }
}

// ============================================================================
// Blocks
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Block<'a> {
    Fixed(&'a Node),
    CheckIn {
        node: &'a Node,
        accommodation: usize,
        minute: u32,
    },
}

impl<'a> Block<'a> {
    fn node(&self) -> &'a Node {
        match *self {
            Block::Fixed(node) => node,
            Block::CheckIn { node, .. } => node,
        }
    }

    fn start(&self) -> u32 {
        match self {
            Block::Fixed(node) => node.fixed.map_or(0, |slot| slot.start_minute),
            Block::CheckIn { minute, .. } => *minute,
        }
    }
}

#[derive(Debug, Clone)]
enum Stop {
    Place(String),
    CheckIn(usize),
}

fn travel(matrix: &TravelCostMatrix, from: Option<&Node>, to: &Node) -> u32 {
    match from {
        Some(from) if from.id != to.id => matrix.minutes(from, to),
        _ => 0,
    }
}

/// Blocks for one date, ordered by start.
fn day_blocks<'a>(
    context: &'a TripContext,
    window: &DayWindow,
    fixed: &[&'a Node],
) -> Vec<Block<'a>> {
    let mut blocks: Vec<Block<'a>> = fixed.iter().map(|&node| Block::Fixed(node)).collect();
    if let Some(check_in) = context.lodging.check_in(window.date) {
        if window.contains(check_in.minute) {
            if let Some(node) = context.nodes.get(&accommodation_id(check_in.accommodation)) {
                blocks.push(Block::CheckIn {
                    node,
                    accommodation: check_in.accommodation,
                    minute: check_in.minute,
                });
            }
        }
    }
    blocks.sort_by_key(|block| (block.start(), matches!(block, Block::CheckIn { .. })));
    blocks
}

/// Whether a day has a free stretch of `stay` minutes between its blocks.
fn has_gap(window: &DayWindow, blocks: &[Block<'_>], check_in_duration: u32, stay: u32) -> bool {
    let mut cursor = window.start_minute;
    for block in blocks {
        let (start, end) = match block {
            Block::Fixed(node) => node
                .fixed
                .map_or((0, 0), |slot| (slot.start_minute, slot.end_minute)),
            Block::CheckIn { minute, .. } => (*minute, minute + check_in_duration),
        };
        if start.saturating_sub(cursor) >= stay {
            return true;
        }
        cursor = cursor.max(end);
    }
    window.end_minute.saturating_sub(cursor) >= stay
}

// ============================================================================
// Packing
// ============================================================================

#[derive(Clone)]
struct OpenDay<'a> {
    index: usize,
    window: DayWindow,
    clock: DayClock,
    location: Option<Node>,
    blocks: VecDeque<Block<'a>>,
    stops: Vec<Stop>,
}

struct Packer<'a> {
    context: &'a TripContext,
    matrix: &'a TravelCostMatrix,
    blocks_by_day: Vec<Vec<Block<'a>>>,
}

impl<'a> Packer<'a> {
    fn open(&self, index: usize, previous_end: Option<&Node>) -> OpenDay<'a> {
        let window = self.context.windows[index];
        let query = DayQuery {
            day_index: index,
            date: window.date,
            is_last: index + 1 == self.context.windows.len(),
            explicit: None,
            previous_end,
        };
        OpenDay {
            index,
            window,
            clock: DayClock::new(window.start_minute, self.context.check_in_duration),
            location: resolve_origin(self.context, &query).map(|resolved| resolved.node),
            blocks: self.blocks_by_day[index].iter().copied().collect(),
            stops: Vec::new(),
        }
    }

    /// How many pending blocks must come before `node`, or `None` if it does
    /// not fit the day at all.
    fn fit(&self, day: &OpenDay<'a>, node: &Node) -> Option<usize> {
        let mut clock = day.clock;
        let mut location: Option<&Node> = day.location.as_ref();

        for passed in 0..=day.blocks.len() {
            let timed = clock.peek_visit(travel(self.matrix, location, node), node);
            if timed.departure > day.window.end_minute {
                return None;
            }
            let Some(block) = day.blocks.get(passed) else {
                return Some(passed);
            };
            let hop = travel(self.matrix, Some(node), block.node());
            if timed.departure + hop <= block.start() {
                return Some(passed);
            }
            self.pass_block(&mut clock, location, block);
            location = Some(block.node());
        }
        None
    }

    fn pass_block(&self, clock: &mut DayClock, location: Option<&Node>, block: &Block<'a>) {
        let hop = travel(self.matrix, location, block.node());
        match block {
            Block::Fixed(node) => {
                clock.visit(hop, node);
            }
            Block::CheckIn { minute, .. } => {
                clock.check_in(hop, *minute);
            }
        }
    }

    fn flush_blocks(&self, day: &mut OpenDay<'a>, count: usize) {
        for _ in 0..count {
            let Some(block) = day.blocks.pop_front() else { break };
            self.pass_block(&mut day.clock, day.location.as_ref(), &block);
            day.location = Some(block.node().clone());
            day.stops.push(match block {
                Block::Fixed(node) => Stop::Place(node.id.clone()),
                Block::CheckIn { accommodation, .. } => Stop::CheckIn(accommodation),
            });
        }
    }

    fn place(&self, day: &mut OpenDay<'a>, passed: usize, node: &Node) {
        self.flush_blocks(day, passed);
        let hop = travel(self.matrix, day.location.as_ref(), node);
        day.clock.visit(hop, node);
        day.location = Some(node.clone());
        day.stops.push(Stop::Place(node.id.clone()));
    }

    /// Finish the day. Returns the assignment and where the day ended.
    fn close(&self, mut day: OpenDay<'a>) -> (DayAssignment, Option<Node>) {
        let remaining = day.blocks.len();
        self.flush_blocks(&mut day, remaining);

        let query = DayQuery {
            day_index: day.index,
            date: day.window.date,
            is_last: day.index + 1 == self.context.windows.len(),
            explicit: None,
            previous_end: day.location.as_ref(),
        };
        let end = match resolve_destination(self.context, &query) {
            Some(resolved) => Some(resolved.node),
            None => day.location.clone(),
        };

        let mut places = Vec::with_capacity(day.stops.len());
        let mut check_in = None;
        for stop in day.stops {
            match stop {
                Stop::Place(id) => places.push(id),
                Stop::CheckIn(accommodation) => {
                    check_in = Some(CheckInSplit {
                        accommodation,
                        places_before: places.len(),
                    })
                }
            }
        }

        let assignment = DayAssignment {
            day_number: day.window.day_number,
            date: day.window.date,
            places,
            check_in,
        };
        (assignment, end)
    }

    /// Whether some later day takes `node` once the days up to it are closed
    /// as they stand, each opening where the previous one ends.
    fn later_day_fits(&self, day: &OpenDay<'a>, node: &Node) -> bool {
        let (_, mut end) = self.close(day.clone());
        for index in day.index + 1..self.context.windows.len() {
            let later = self.open(index, end.as_ref());
            if self.fit(&later, node).is_some() {
                return true;
            }
            end = self.close(later).1;
        }
        false
    }

    fn day_has_gap(&self, index: usize, stay: u32) -> bool {
        has_gap(
            &self.context.windows[index],
            &self.blocks_by_day[index],
            self.context.check_in_duration,
            stay,
        )
    }
}

/// Split `route` into one assignment per trip day.
///
/// Every id in `route` ends up exactly once in either a day or
/// `unassigned_places`.
pub fn distribute(
    route: &[String],
    context: &TripContext,
    matrix: &TravelCostMatrix,
    diagnostics: &dyn DiagnosticsSink,
) -> Distribution {
    let mut unassigned: Vec<UnassignedPlace> = Vec::new();
    let mut stream: Vec<&Node> = Vec::new();
    let mut fixed_by_date: HashMap<NaiveDate, Vec<&Node>> = HashMap::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for id in route {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let Some(node) = context.nodes.get(id) else {
            unassigned.push(UnassignedPlace {
                place_id: id.clone(),
                reason: UnassignedReason::UnknownPlace,
            });
            continue;
        };
        match node.fixed {
            Some(slot) if context.window_for(slot.date).is_some() => {
                fixed_by_date.entry(slot.date).or_default().push(node);
            }
            Some(_) => unassigned.push(UnassignedPlace {
                place_id: id.clone(),
                reason: UnassignedReason::FixedDateOutsideTrip,
            }),
            None => stream.push(node),
        }
    }

    let blocks_by_day: Vec<Vec<Block<'_>>> = context
        .windows
        .iter()
        .map(|window| {
            let fixed = fixed_by_date.get(&window.date).map_or(&[][..], Vec::as_slice);
            for node in fixed {
                let outside = node.fixed.is_some_and(|slot| {
                    slot.start_minute < window.start_minute || slot.end_minute > window.end_minute
                });
                if outside {
                    diagnostics.emit(Diagnostic::FixedOutsideWindow {
                        place_id: node.id.clone(),
                        date: window.date,
                    });
                }
            }
            day_blocks(context, window, fixed)
        })
        .collect();

    let packer = Packer {
        context,
        matrix,
        blocks_by_day,
    };

    let mut days: Vec<DayAssignment> = Vec::with_capacity(context.windows.len());
    if context.windows.is_empty() {
        unassigned.extend(stream.iter().map(|node| UnassignedPlace {
            place_id: node.id.clone(),
            reason: UnassignedReason::NoDaysLeft,
        }));
    } else {
        let mut day = packer.open(0, None);
        for node in stream {
            loop {
                if let Some(passed) = packer.fit(&day, node) {
                    packer.place(&mut day, passed, node);
                    break;
                }
                if packer.later_day_fits(&day, node) {
                    let next = day.index + 1;
                    let (assignment, end) = packer.close(day);
                    days.push(assignment);
                    day = packer.open(next, end.as_ref());
                    continue;
                }
                let stay = node.stay_duration_minutes;
                let fits_somewhere =
                    (0..context.windows.len()).any(|index| packer.day_has_gap(index, stay));
                unassigned.push(UnassignedPlace {
                    place_id: node.id.clone(),
                    reason: if fits_somewhere {
                        UnassignedReason::NoDaysLeft
                    } else {
                        UnassignedReason::ExceedsDayBudget
                    },
                });
                break;
            }
        }

        loop {
            let next = day.index + 1;
            let (assignment, end) = packer.close(day);
            days.push(assignment);
            if next >= context.windows.len() {
                break;
            }
            day = packer.open(next, end.as_ref());
        }
    }

    for place in &unassigned {
        diagnostics.emit(Diagnostic::UnassignedPlace {
            place_id: place.place_id.clone(),
            reason: place.reason,
        });
    }

    debug!(
        days = days.len(),
        assigned = days.iter().map(|day| day.places.len()).sum::<usize>(),
        unassigned = unassigned.len(),
        "distribution finished"
    );

    Distribution {
        days,
        unassigned_places: unassigned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::diagnostics::{CollectingSink, NoopSink};
    use crate::haversine::HaversineEstimator;
    use crate::model::{Accommodation, Coordinate, FixedSchedule, Place, TravelMode, Trip, TripStatus};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, day).unwrap()
    }

    fn trip(days: u32) -> Trip {
        Trip {
            id: "t".into(),
            start_date: date(1),
            end_date: date(days),
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
        }
    }

    /// Places one hop (10 minutes) apart.
    fn places(stays: &[u32]) -> Vec<Place> {
        stays
            .iter()
            .enumerate()
            .map(|(i, &stay)| Place {
                id: format!("p{}", i + 1),
                name: format!("Place {}", i + 1),
                coordinate: Coordinate::new(37.50 + i as f64 * 0.01, 127.0),
                stay_duration_minutes: stay,
                priority: 0,
            })
            .collect()
    }

    fn flat_matrix(context: &TripContext, minutes: u32) -> TravelCostMatrix {
        let mut matrix = TravelCostMatrix::new(TravelMode::Car, HaversineEstimator::default());
        for from in context.nodes.nodes() {
            for to in context.nodes.nodes() {
                if from.id != to.id {
                    let mut entry =
                        HaversineEstimator::default().estimate(from.coordinate, to.coordinate, TravelMode::Car);
                    entry.duration_minutes = minutes;
                    matrix.insert(from.id.clone(), to.id.clone(), entry);
                }
            }
        }
        matrix
    }

    fn route(places: &[Place]) -> Vec<String> {
        places.iter().map(|place| place.id.clone()).collect()
    }

    fn assert_complete(route: &[String], distribution: &Distribution) {
        let mut accounted: Vec<&str> = distribution.assigned_ids().collect();
        accounted.extend(distribution.unassigned_places.iter().map(|p| p.place_id.as_str()));
        accounted.sort();
        let mut expected: Vec<&str> = route.iter().map(String::as_str).collect();
        expected.sort();
        assert_eq!(accounted, expected, "every place accounted for exactly once");
    }

    // ========================================================================
    // Packing
    // ========================================================================

    #[test]
    fn test_packs_in_order_and_spills_to_next_day() {
        // 10:00-20:00, 10 minute hops, 3h stays: three fit on day one
        let places = places(&[180, 180, 180, 180, 180]);
        let ctx = TripContext::build(&trip(2), &places, &[], &PlannerConfig::default()).unwrap();
        let matrix = flat_matrix(&ctx, 10);
        let route = route(&places);

        let distribution = distribute(&route, &ctx, &matrix, &NoopSink);
        assert_eq!(distribution.days.len(), 2);
        assert_eq!(distribution.days[0].places, vec!["p1", "p2", "p3"]);
        assert_eq!(distribution.days[1].places, vec!["p4", "p5"]);
        assert!(distribution.unassigned_places.is_empty());
        assert_complete(&route, &distribution);
    }

    #[test]
    fn test_overlong_place_is_unassigned_and_day_continues() {
        let places = places(&[60, 700, 60]);
        let ctx = TripContext::build(&trip(2), &places, &[], &PlannerConfig::default()).unwrap();
        let matrix = flat_matrix(&ctx, 10);
        let route = route(&places);
        let sink = CollectingSink::new();

        let distribution = distribute(&route, &ctx, &matrix, &sink);
        assert_eq!(distribution.days[0].places, vec!["p1", "p3"]);
        assert!(distribution.days[1].places.is_empty(), "empty days are still produced");
        assert_eq!(
            distribution.unassigned_places,
            vec![UnassignedPlace {
                place_id: "p2".into(),
                reason: UnassignedReason::ExceedsDayBudget,
            }]
        );
        assert!(sink.snapshot().iter().any(|d| matches!(
            d,
            Diagnostic::UnassignedPlace { place_id, .. } if place_id == "p2"
        )));
        assert_complete(&route, &distribution);
    }

    #[test]
    fn test_place_no_later_day_can_take_keeps_the_day_open() {
        // 20 minute hops: p2 (590m) fits a bare 600 minute window but not
        // after the hop from wherever a later day starts
        let mut stays = vec![60, 590];
        stays.extend([60; 12]);
        let places = places(&stays);
        let ctx = TripContext::build(&trip(3), &places, &[], &PlannerConfig::default()).unwrap();
        let matrix = flat_matrix(&ctx, 20);
        let route = route(&places);

        let distribution = distribute(&route, &ctx, &matrix, &NoopSink);
        assert_eq!(
            distribution.unassigned_places,
            vec![UnassignedPlace {
                place_id: "p2".into(),
                reason: UnassignedReason::NoDaysLeft,
            }],
            "only the long place is left out"
        );
        assert_eq!(
            distribution.days[0].places,
            vec!["p1", "p3", "p4", "p5", "p6", "p7", "p8"],
            "day one keeps packing after the long place"
        );
        assert_eq!(
            distribution.days[1].places,
            vec!["p9", "p10", "p11", "p12", "p13", "p14"]
        );
        assert!(distribution.days[2].places.is_empty());
        assert_complete(&route, &distribution);
    }

    #[test]
    fn test_runs_out_of_days() {
        let places = places(&[300, 300, 300]);
        let ctx = TripContext::build(&trip(1), &places, &[], &PlannerConfig::default()).unwrap();
        let matrix = flat_matrix(&ctx, 10);
        let route = route(&places);

        let distribution = distribute(&route, &ctx, &matrix, &NoopSink);
        assert_eq!(distribution.days[0].places, vec!["p1"]);
        assert_eq!(distribution.unassigned_places.len(), 2);
        assert!(distribution
            .unassigned_places
            .iter()
            .all(|p| p.reason == UnassignedReason::NoDaysLeft));
        assert_complete(&route, &distribution);
    }

    #[test]
    fn test_unknown_ids_reported() {
        let places = places(&[60, 60]);
        let ctx = TripContext::build(&trip(1), &places, &[], &PlannerConfig::default()).unwrap();
        let matrix = flat_matrix(&ctx, 10);
        let mut route = route(&places);
        route.push("ghost".into());

        let distribution = distribute(&route, &ctx, &matrix, &NoopSink);
        assert_eq!(distribution.unassigned_places[0].reason, UnassignedReason::UnknownPlace);
        assert_complete(&route, &distribution);
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    #[test]
    fn test_fixed_place_lands_on_its_date() {
        let places = places(&[60, 60, 60, 60, 60]);
        let fixed = vec![FixedSchedule {
            place_id: "p1".into(),
            date: date(2),
            start_time: "14:00".into(),
            end_time: None,
        }];
        let ctx = TripContext::build(&trip(2), &places, &fixed, &PlannerConfig::default()).unwrap();
        let matrix = flat_matrix(&ctx, 10);
        let route = route(&places);

        let distribution = distribute(&route, &ctx, &matrix, &NoopSink);
        assert!(!distribution.days[0].places.contains(&"p1".to_string()));
        assert_eq!(distribution.days[1].places, vec!["p1"]);
        assert_complete(&route, &distribution);
    }

    #[test]
    fn test_places_before_block_must_finish_in_time() {
        // fixed p3 at 11:00; p1 (60m) cannot finish plus hop before 11:00
        let places = places(&[60, 30, 60]);
        let fixed = vec![FixedSchedule {
            place_id: "p3".into(),
            date: date(1),
            start_time: "11:00".into(),
            end_time: None,
        }];
        let ctx = TripContext::build(&trip(1), &places, &fixed, &PlannerConfig::default()).unwrap();
        let matrix = flat_matrix(&ctx, 10);
        let route = route(&places);

        let distribution = distribute(&route, &ctx, &matrix, &NoopSink);
        assert_eq!(distribution.days[0].places, vec!["p3", "p1", "p2"]);
    }

    #[test]
    fn test_check_in_splits_the_day() {
        let mut trip = trip(2);
        trip.accommodations.push(Accommodation {
            name: "Hotel".into(),
            coordinate: Coordinate::new(37.55, 127.0),
            check_in_date: date(1),
            check_out_date: date(2),
            check_in_time: Some("15:00".into()),
        });
        let places = places(&[120, 120, 120]);
        let ctx = TripContext::build(&trip, &places, &[], &PlannerConfig::default()).unwrap();
        let matrix = flat_matrix(&ctx, 10);
        let route = route(&places);

        let distribution = distribute(&route, &ctx, &matrix, &NoopSink);
        let day = &distribution.days[0];
        // 10:00-12:00, 12:10-14:10, check-in 15:00-15:30, 15:40-17:40
        assert_eq!(day.places, vec!["p1", "p2", "p3"]);
        assert_eq!(
            day.check_in,
            Some(CheckInSplit {
                accommodation: 0,
                places_before: 2
            })
        );
        assert!(distribution.days[1].check_in.is_none());
    }

    #[test]
    fn test_has_gap_respects_blocks() {
        let window = DayWindow {
            day_number: 1,
            date: date(1),
            start_minute: 600,
            end_minute: 1200,
        };
        assert!(has_gap(&window, &[], 30, 600));
        assert!(!has_gap(&window, &[], 30, 601));
    }
}
