//! Incremental recalculation after itinerary edits.
//!
//! Each leg of the edited itinerary is resolved once, in this order:
//!
//! 1. the segment stored on the prior itinerary, when the same directed pair
//!    was already a leg there and the stored value is complete;
//! 2. a complete entry from the matrix cache;
//! 3. a fresh provider lookup (batched);
//! 4. on lookup failure, whatever the prior itinerary stored for the pair;
//! 5. the straight-line estimate.
//!
//! Timing is then recomputed for every day from scratch, days in parallel.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::assemble::{render_day, DayPlan, PlannedStop};
use crate::context::TripContext;
use crate::diagnostics::{Diagnostic, DiagnosticsSink, ReuseOrigin};
use crate::distribute::UnassignedReason;
use crate::endpoints::{
    coordinate_node_id, normalize_endpoint, resolve_destination, resolve_origin, same_coordinate, DayQuery,
};
use crate::error::RoutingError;
use crate::matrix::{MatrixBuilder, TravelCostMatrix};
use crate::model::{CheckInEvent, DailyItinerary, Node, NodeKind, TravelCostEntry, TravelMode};
use crate::segments::{is_complete, SegmentIndex, SegmentKey};
use crate::throttle::BatchExecutor;
use crate::time_utils::{time_to_minutes, MINUTES_PER_DAY};
use crate::windows::DayWindow;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecalcStats {
    pub reused_stored: usize,
    pub reused_cache: usize,
    pub fetched: usize,
    pub kept_prior: usize,
    pub estimated: usize,
    /// Pairs the provider was asked for, in request order.
    pub provider_calls: Vec<SegmentKey>,
}

impl RecalcStats {
    pub fn reused(&self) -> usize {
        self.reused_stored + self.reused_cache
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecalcOutcome {
    pub itineraries: Vec<DailyItinerary>,
    pub stats: RecalcStats,
}

pub struct Recalculator<'a> {
    context: &'a TripContext,
    builder: &'a MatrixBuilder<'a>,
    cache: Option<&'a TravelCostMatrix>,
}

impl<'a> Recalculator<'a> {
    pub fn new(context: &'a TripContext, builder: &'a MatrixBuilder<'a>) -> Self {
        Self {
            context,
            builder,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: &'a TravelCostMatrix) -> Self {
        self.cache = Some(cache);
        self
    }

    fn diagnostics(&self) -> &'a dyn DiagnosticsSink {
        self.builder.diagnostics()
    }

    /// Re-derive segments and timing for `edited`, reusing what `prior`
    /// already paid for.
    pub fn recalculate(&self, edited: &[DailyItinerary], prior: &[DailyItinerary]) -> RecalcOutcome {
        let prior: Vec<DailyItinerary> = prior.iter().map(|day| self.normalize(day)).collect();
        let edited: Vec<DailyItinerary> = edited.iter().map(|day| self.normalize(day)).collect();
        let index = SegmentIndex::from_itineraries(&prior);

        let plans = self.plan_days(&edited);
        let (resolved, stats) = self.resolve_segments(&plans, &index);

        let mode = self.context.mode;
        let estimator = self.builder.estimator();
        let diagnostics = self.diagnostics();
        let check_in_duration = self.context.check_in_duration;

        let itineraries: Vec<DailyItinerary> = plans
            .par_iter()
            .map(|(day_number, plan)| {
                render_day(
                    *day_number,
                    plan,
                    |from, to| match resolved.get(&SegmentKey::between(from, to)) {
                        Some(entry) => entry.clone(),
                        None => estimator.estimate(from.coordinate, to.coordinate, mode),
                    },
                    check_in_duration,
                    diagnostics,
                )
            })
            .collect();

        info!(
            trip_id = %self.context.trip_id,
            days = itineraries.len(),
            reused = stats.reused(),
            fetched = stats.fetched,
            kept_prior = stats.kept_prior,
            estimated = stats.estimated,
            "itinerary recalculated"
        );

        RecalcOutcome { itineraries, stats }
    }

    /// Give legacy accommodation endpoints their node ids so keys line up.
    fn normalize(&self, day: &DailyItinerary) -> DailyItinerary {
        let mut day = day.clone();
        day.day_origin = day.day_origin.map(|endpoint| normalize_endpoint(self.context, &endpoint));
        day.day_destination = day
            .day_destination
            .map(|endpoint| normalize_endpoint(self.context, &endpoint));
        if let Some(event) = day.check_in_event.as_mut() {
            if event.accommodation_id.is_none() {
                event.accommodation_id = self
                    .accommodation_by_coordinate(event)
                    .map(|node| node.id.clone());
            }
        }
        day
    }

    fn accommodation_by_coordinate(&self, event: &CheckInEvent) -> Option<&'a Node> {
        self.context.nodes.nodes().iter().find(|node| {
            matches!(node.kind, NodeKind::Accommodation(_)) && same_coordinate(node.coordinate, event.coordinate)
        })
    }

    fn window(&self, day: &DailyItinerary) -> DayWindow {
        match self.context.window_for(day.date) {
            Some(window) => *window,
            None => DayWindow {
                day_number: day.day_number,
                date: day.date,
                start_minute: time_to_minutes(&day.daily_start_time).unwrap_or(0),
                end_minute: time_to_minutes(&day.daily_end_time).unwrap_or(MINUTES_PER_DAY),
            },
        }
    }

    fn plan_days(&self, edited: &[DailyItinerary]) -> Vec<(u32, DayPlan)> {
        let mut plans: Vec<(u32, DayPlan)> = Vec::with_capacity(edited.len());

        for (index, day) in edited.iter().enumerate() {
            let window = self.window(day);
            let previous_end = plans.last().and_then(|(_, plan)| plan.end_node()).cloned();
            let day_index = self
                .context
                .windows
                .iter()
                .position(|candidate| candidate.date == day.date)
                .unwrap_or(index);
            let is_last = index + 1 == edited.len();

            let origin_query = DayQuery {
                day_index,
                date: day.date,
                is_last,
                explicit: day.day_origin.as_ref(),
                previous_end: previous_end.as_ref(),
            };
            let destination_query = DayQuery {
                explicit: day.day_destination.as_ref(),
                ..origin_query
            };

            let mut stops: Vec<PlannedStop> = Vec::with_capacity(day.schedule.len() + 1);
            for item in &day.schedule {
                match self.context.nodes.get(&item.place_id) {
                    Some(node) => stops.push(PlannedStop::Visit(node.clone())),
                    None => self.diagnostics().emit(Diagnostic::UnassignedPlace {
                        place_id: item.place_id.clone(),
                        reason: UnassignedReason::UnknownPlace,
                    }),
                }
            }
            if let Some(event) = &day.check_in_event {
                let at = event.places_before.min(stops.len());
                stops.insert(
                    at,
                    PlannedStop::CheckIn {
                        node: self.check_in_node(event),
                        minute: time_to_minutes(&event.check_in_time).unwrap_or(window.start_minute),
                    },
                );
            }

            plans.push((
                day.day_number,
                DayPlan {
                    window,
                    origin: resolve_origin(self.context, &origin_query),
                    destination: resolve_destination(self.context, &destination_query),
                    stops,
                },
            ));
        }

        plans
    }

    fn check_in_node(&self, event: &CheckInEvent) -> Node {
        let known = event
            .accommodation_id
            .as_deref()
            .and_then(|id| self.context.nodes.get(id));
        match known {
            Some(node) => node.clone(),
            None => Node::detached(
                event
                    .accommodation_id
                    .clone()
                    .unwrap_or_else(|| coordinate_node_id(event.coordinate)),
                event.accommodation_name.clone(),
                event.coordinate,
            ),
        }
    }

    fn resolve_segments(
        &self,
        plans: &[(u32, DayPlan)],
        index: &SegmentIndex,
    ) -> (HashMap<SegmentKey, TravelCostEntry>, RecalcStats) {
        let mode = self.context.mode;
        let diagnostics = self.diagnostics();
        let mut stats = RecalcStats::default();
        let mut resolved: HashMap<SegmentKey, TravelCostEntry> = HashMap::new();
        let mut seen: HashSet<SegmentKey> = HashSet::new();
        let mut pending: Vec<(SegmentKey, Node, Node)> = Vec::new();

        let provider = self.builder.provider().filter(|_| mode != TravelMode::Walking);

        for (_, plan) in plans {
            for (_, from, _, to) in plan.legs() {
                let key = SegmentKey::between(from, to);
                if !seen.insert(key.clone()) {
                    continue;
                }

                if let Some(stored) = index
                    .stored(&key)
                    .filter(|stored| index.contains(&key) && is_complete(stored, mode))
                {
                    diagnostics.emit(Diagnostic::SegmentReused {
                        from: key.from.to_string(),
                        to: key.to.to_string(),
                        origin: ReuseOrigin::StoredItinerary,
                    });
                    stats.reused_stored += 1;
                    resolved.insert(key, stored.clone());
                    continue;
                }

                if let Some(cached) = self.cached(from, to) {
                    diagnostics.emit(Diagnostic::SegmentReused {
                        from: key.from.to_string(),
                        to: key.to.to_string(),
                        origin: ReuseOrigin::MatrixCache,
                    });
                    stats.reused_cache += 1;
                    resolved.insert(key, cached.clone());
                    continue;
                }

                if provider.is_some() {
                    pending.push((key, from.clone(), to.clone()));
                    continue;
                }

                let entry = self.fallback(&key, index, from, to, None, &mut stats);
                resolved.insert(key, entry);
            }
        }

        if let Some(provider) = provider {
            if !pending.is_empty() {
                let options = self.builder.options();
                let executor =
                    BatchExecutor::new(options.batch_size, Duration::from_millis(options.batch_delay_ms));
                let answers = executor.run(&pending, |(_, from, to)| self.builder.fetch(provider, from, to, mode));

                for ((key, from, to), answer) in pending.into_iter().zip(answers) {
                    stats.provider_calls.push(key.clone());
                    let entry = match answer {
                        Ok(Some(entry)) => {
                            diagnostics.emit(Diagnostic::SegmentFetched {
                                from: key.from.to_string(),
                                to: key.to.to_string(),
                            });
                            stats.fetched += 1;
                            entry
                        }
                        Ok(None) => {
                            diagnostics.emit(Diagnostic::NoRouteFound {
                                from: key.from.to_string(),
                                to: key.to.to_string(),
                            });
                            stats.fetched += 1;
                            self.builder.no_route_entry(&from, &to, mode)
                        }
                        Err(error) => self.fallback(&key, index, &from, &to, Some(error), &mut stats),
                    };
                    resolved.insert(key, entry);
                }
            }
        }

        debug!(
            legs = resolved.len(),
            provider_calls = stats.provider_calls.len(),
            "segments resolved"
        );
        (resolved, stats)
    }

    fn cached(&self, from: &Node, to: &Node) -> Option<&'a TravelCostEntry> {
        let cache = self.cache?;
        cache
            .get(&from.id, &to.id)
            .filter(|entry| is_complete(entry, self.context.mode))
    }

    /// Prior data if there is any, else the estimate.
    fn fallback(
        &self,
        key: &SegmentKey,
        index: &SegmentIndex,
        from: &Node,
        to: &Node,
        error: Option<RoutingError>,
        stats: &mut RecalcStats,
    ) -> TravelCostEntry {
        let diagnostics = self.diagnostics();
        if let Some(prior) = index.stored(key) {
            diagnostics.emit(Diagnostic::SegmentKeptPrior {
                from: key.from.to_string(),
                to: key.to.to_string(),
                error,
            });
            stats.kept_prior += 1;
            return prior.clone();
        }
        if let Some(error) = error {
            diagnostics.emit(Diagnostic::ProviderFallback {
                from: key.from.to_string(),
                to: key.to.to_string(),
                error,
            });
        }
        stats.estimated += 1;
        self.builder
            .estimator()
            .estimate(from.coordinate, to.coordinate, self.context.mode)
    }
}
