//! Top-level operations: plan a trip, optimize and save it, recalculate edits.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::assemble::assemble;
use crate::config::PlannerConfig;
use crate::context::TripContext;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::distribute::{distribute, Distribution};
use crate::error::{PersistenceError, PlanError, ReplaceError};
use crate::haversine::HaversineEstimator;
use crate::matrix::{MatrixBuilder, TravelCostMatrix};
use crate::model::{DailyItinerary, FixedSchedule, Place, Trip, TripStatus};
use crate::recalc::{RecalcOutcome, Recalculator};
use crate::search::{search, SearchResult};
use crate::traits::{PersistenceGateway, RoutingProvider};

/// Result of a full planning run.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub itineraries: Vec<DailyItinerary>,
    pub search: SearchResult,
    /// Day assignments plus every place that could not be scheduled.
    pub distribution: Distribution,
    /// The run's matrix; usable as a cache for later recalculation.
    pub matrix: TravelCostMatrix,
}

/// Per-day outcome of saving recalculated days.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub saved: Vec<u32>,
    pub failed: Vec<(u32, PersistenceError)>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Planner<'a> {
    config: PlannerConfig,
    provider: Option<&'a dyn RoutingProvider>,
    diagnostics: &'a dyn DiagnosticsSink,
}

impl<'a> Planner<'a> {
    pub fn new(config: PlannerConfig, diagnostics: &'a dyn DiagnosticsSink) -> Self {
        Self {
            config,
            provider: None,
            diagnostics,
        }
    }

    pub fn with_provider(mut self, provider: &'a dyn RoutingProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    fn builder(&self) -> MatrixBuilder<'a> {
        let builder = MatrixBuilder::new(
            HaversineEstimator::new(self.config.speeds),
            self.config.matrix.clone(),
            self.diagnostics,
        );
        match self.provider {
            Some(provider) => builder.with_provider(provider),
            None => builder,
        }
    }

    /// Validate, build the matrix, search, distribute and assemble.
    ///
    /// Input errors are returned before any routing work starts.
    pub fn plan(&self, trip: &Trip, places: &[Place], fixed: &[FixedSchedule]) -> Result<PlanOutcome, PlanError> {
        let context = TripContext::build(trip, places, fixed, &self.config)?;
        let builder = self.builder();
        let matrix = builder.build(context.nodes.nodes(), context.mode);

        let search = search(
            &context.nodes,
            &matrix,
            &self.config.search,
            context.origin_id.as_deref(),
            context.destination_id.as_deref(),
        );
        let distribution = distribute(&search.route, &context, &matrix, self.diagnostics);
        let itineraries = assemble(&distribution.days, &context, &matrix, self.diagnostics);

        info!(
            trip_id = %trip.id,
            places = places.len(),
            days = itineraries.len(),
            unassigned = distribution.unassigned_places.len(),
            improvement = search.improvement_percentage,
            "trip planned"
        );

        Ok(PlanOutcome {
            itineraries,
            search,
            distribution,
            matrix,
        })
    }

    /// Plan a stored trip and replace its itinerary.
    ///
    /// A failure before the delete leaves the stored itinerary untouched. A
    /// failure between delete and insert marks the trip degraded and returns
    /// [`PlanError::SaveDegraded`].
    pub fn optimize_trip(&self, gateway: &dyn PersistenceGateway, trip_id: &str) -> Result<PlanOutcome, PlanError> {
        let trip = load_trip(gateway, trip_id)?;
        let places = gateway.load_places(trip_id)?;
        let fixed = gateway.load_fixed_schedules(trip_id)?;

        let outcome = self.plan(&trip, &places, &fixed)?;

        match gateway.replace_itinerary(trip_id, &outcome.itineraries) {
            Ok(()) => {}
            Err(ReplaceError::Delete(err)) => return Err(PlanError::Persistence(err)),
            Err(ReplaceError::Insert(err)) => {
                self.diagnostics.emit(Diagnostic::ItineraryDegraded {
                    trip_id: trip_id.to_string(),
                    error: err.clone(),
                });
                if let Err(status_err) = gateway.update_trip_status(trip_id, TripStatus::Degraded) {
                    warn!(trip_id, error = %status_err, "could not flag trip as degraded");
                }
                return Err(PlanError::SaveDegraded {
                    trip_id: trip_id.to_string(),
                    source: err,
                });
            }
        }

        gateway.update_trip_status(trip_id, TripStatus::Optimized)?;
        Ok(outcome)
    }

    /// Recalculate an edited itinerary against its prior state.
    ///
    /// Fewer places than `min_places` is fine here: edits may delete stops.
    pub fn recalculate(
        &self,
        trip: &Trip,
        places: &[Place],
        fixed: &[FixedSchedule],
        edited: &[DailyItinerary],
        prior: &[DailyItinerary],
        cache: Option<&TravelCostMatrix>,
    ) -> Result<RecalcOutcome, PlanError> {
        let config = PlannerConfig {
            min_places: 0,
            ..self.config.clone()
        };
        let context = TripContext::build(trip, places, fixed, &config)?;
        let builder = self.builder();
        let recalculator = Recalculator::new(&context, &builder);
        let recalculator = match cache {
            Some(cache) => recalculator.with_cache(cache),
            None => recalculator,
        };
        Ok(recalculator.recalculate(edited, prior))
    }

    /// Recalculate against the stored itinerary and save each day.
    ///
    /// Days are saved independently; the report lists which ones failed.
    pub fn recalculate_trip(
        &self,
        gateway: &dyn PersistenceGateway,
        trip_id: &str,
        edited: &[DailyItinerary],
    ) -> Result<(RecalcOutcome, SaveReport), PlanError> {
        let trip = load_trip(gateway, trip_id)?;
        let places = gateway.load_places(trip_id)?;
        let fixed = gateway.load_fixed_schedules(trip_id)?;
        let prior = gateway.load_stored_itinerary(trip_id)?;

        let outcome = self.recalculate(&trip, &places, &fixed, edited, &prior, None)?;
        let report = save_days(gateway, trip_id, &outcome.itineraries, self.diagnostics);
        Ok((outcome, report))
    }
}

fn load_trip(gateway: &dyn PersistenceGateway, trip_id: &str) -> Result<Trip, PlanError> {
    gateway.load_trip(trip_id).map_err(|err| match err {
        PersistenceError::NotFound(_) => PlanError::TripNotFound(trip_id.to_string()),
        other => PlanError::Persistence(other),
    })
}

/// Save every day concurrently. Successful saves are kept when others fail.
pub fn save_days(
    gateway: &dyn PersistenceGateway,
    trip_id: &str,
    days: &[DailyItinerary],
    diagnostics: &dyn DiagnosticsSink,
) -> SaveReport {
    let results: Vec<(u32, Result<(), PersistenceError>)> = days
        .par_iter()
        .map(|day| (day.day_number, gateway.save_day(trip_id, day)))
        .collect();

    let mut report = SaveReport::default();
    for (day_number, result) in results {
        match result {
            Ok(()) => report.saved.push(day_number),
            Err(error) => {
                diagnostics.emit(Diagnostic::DaySaveFailed {
                    day_number,
                    error: error.clone(),
                });
                report.failed.push((day_number, error));
            }
        }
    }
    report
}
