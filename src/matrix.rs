//! Travel cost matrix and its builder.
//!
//! The matrix is directed: `(a, b)` and `(b, a)` are separate entries. A
//! missing entry means "unknown"; readers go through [`TravelCostMatrix::entry`]
//! which substitutes the straight-line estimate, never a zero cost.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::config::MatrixOptions;
use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::error::RoutingError;
use crate::haversine::HaversineEstimator;
use crate::model::{CostSource, Node, SubPath, TrafficType, TransitDetails, TravelCostEntry, TravelMode};
use crate::throttle::BatchExecutor;
use crate::traits::RoutingProvider;

#[derive(Debug, Clone)]
pub struct TravelCostMatrix {
    mode: TravelMode,
    estimator: HaversineEstimator,
    entries: HashMap<(String, String), TravelCostEntry>,
}

impl TravelCostMatrix {
    pub fn new(mode: TravelMode, estimator: HaversineEstimator) -> Self {
        Self {
            mode,
            estimator,
            entries: HashMap::new(),
        }
    }

    pub fn mode(&self) -> TravelMode {
        self.mode
    }

    pub fn get(&self, from_id: &str, to_id: &str) -> Option<&TravelCostEntry> {
        self.entries.get(&(from_id.to_string(), to_id.to_string()))
    }

    pub fn insert(&mut self, from_id: impl Into<String>, to_id: impl Into<String>, entry: TravelCostEntry) {
        self.entries.insert((from_id.into(), to_id.into()), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stored entry for `from → to`, or the straight-line estimate.
    pub fn entry(&self, from: &Node, to: &Node) -> TravelCostEntry {
        match self.get(&from.id, &to.id) {
            Some(entry) => entry.clone(),
            None => self.estimator.estimate(from.coordinate, to.coordinate, self.mode),
        }
    }

    /// Travel minutes for `from → to`, estimated when missing.
    pub fn minutes(&self, from: &Node, to: &Node) -> u32 {
        match self.get(&from.id, &to.id) {
            Some(entry) => entry.duration_minutes,
            None => self
                .estimator
                .duration_minutes(from.coordinate, to.coordinate, self.mode),
        }
    }

    /// Meters for `from → to`, estimated when missing.
    pub fn distance(&self, from: &Node, to: &Node) -> u32 {
        match self.get(&from.id, &to.id) {
            Some(entry) => entry.distance_meters,
            None => {
                self.estimator
                    .estimate(from.coordinate, to.coordinate, self.mode)
                    .distance_meters
            }
        }
    }
}

/// Builds [`TravelCostMatrix`] values, optionally through a routing provider.
pub struct MatrixBuilder<'a> {
    provider: Option<&'a dyn RoutingProvider>,
    estimator: HaversineEstimator,
    options: MatrixOptions,
    diagnostics: &'a dyn DiagnosticsSink,
}

impl<'a> MatrixBuilder<'a> {
    pub fn new(
        estimator: HaversineEstimator,
        options: MatrixOptions,
        diagnostics: &'a dyn DiagnosticsSink,
    ) -> Self {
        Self {
            provider: None,
            estimator,
            options,
            diagnostics,
        }
    }

    pub fn with_provider(mut self, provider: &'a dyn RoutingProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn estimator(&self) -> &HaversineEstimator {
        &self.estimator
    }

    pub fn options(&self) -> &MatrixOptions {
        &self.options
    }

    pub fn provider(&self) -> Option<&'a dyn RoutingProvider> {
        self.provider
    }

    pub fn diagnostics(&self) -> &'a dyn DiagnosticsSink {
        self.diagnostics
    }

    /// Every ordered pair `(i, j)`, `i != j`, over `nodes`.
    pub fn build(&self, nodes: &[Node], mode: TravelMode) -> TravelCostMatrix {
        let mut matrix = TravelCostMatrix::new(mode, self.estimator.clone());
        let pairs: Vec<(&Node, &Node)> = nodes
            .iter()
            .enumerate()
            .flat_map(|(i, from)| {
                nodes
                    .iter()
                    .enumerate()
                    .filter(move |(j, _)| *j != i)
                    .map(move |(_, to)| (from, to))
            })
            .collect();

        let provider = match self.provider {
            Some(provider) if self.options.use_external_provider && mode != TravelMode::Walking => {
                Some(provider)
            }
            _ => None,
        };

        debug!(
            nodes = nodes.len(),
            pairs = pairs.len(),
            external = provider.is_some(),
            "building travel cost matrix"
        );

        let entries: Vec<TravelCostEntry> = match provider {
            Some(provider) => {
                let executor = BatchExecutor::new(
                    self.options.batch_size,
                    Duration::from_millis(self.options.batch_delay_ms),
                );
                executor.run(&pairs, |(from, to)| self.lookup(provider, from, to, mode))
            }
            None => pairs
                .iter()
                .map(|(from, to)| self.estimator.estimate(from.coordinate, to.coordinate, mode))
                .collect(),
        };

        for ((from, to), entry) in pairs.iter().zip(entries) {
            matrix.insert(from.id.clone(), to.id.clone(), entry);
        }

        matrix
    }

    /// Ask the provider for one directed pair. Walking never calls out.
    pub fn fetch(
        &self,
        provider: &dyn RoutingProvider,
        from: &Node,
        to: &Node,
        mode: TravelMode,
    ) -> Result<Option<TravelCostEntry>, RoutingError> {
        match mode {
            TravelMode::Walking => Ok(Some(self.estimator.estimate(from.coordinate, to.coordinate, mode))),
            TravelMode::Car => Ok(provider
                .car_route(from.coordinate, to.coordinate, self.options.car_priority)?
                .map(|route| route.into_entry())),
            TravelMode::Public => Ok(provider
                .transit_route(from.coordinate, to.coordinate)?
                .map(|route| route.into_entry())),
        }
    }

    /// Provider lookup that always yields an entry.
    ///
    /// Failures fall back to the estimate. A public-transit "no route" answer
    /// becomes a provider-confirmed walking leg.
    pub fn lookup(
        &self,
        provider: &dyn RoutingProvider,
        from: &Node,
        to: &Node,
        mode: TravelMode,
    ) -> TravelCostEntry {
        match self.fetch(provider, from, to, mode) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.diagnostics.emit(Diagnostic::NoRouteFound {
                    from: from.id.clone(),
                    to: to.id.clone(),
                });
                self.no_route_entry(from, to, mode)
            }
            Err(error) => {
                self.diagnostics.emit(Diagnostic::ProviderFallback {
                    from: from.id.clone(),
                    to: to.id.clone(),
                    error,
                });
                self.estimator.estimate(from.coordinate, to.coordinate, mode)
            }
        }
    }

    /// Entry to use when the provider says no route exists.
    pub fn no_route_entry(&self, from: &Node, to: &Node, mode: TravelMode) -> TravelCostEntry {
        match mode {
            TravelMode::Public => self.confirmed_walk(from, to),
            _ => self.estimator.estimate(from.coordinate, to.coordinate, mode),
        }
    }

    fn confirmed_walk(&self, from: &Node, to: &Node) -> TravelCostEntry {
        let mut entry = self
            .estimator
            .estimate(from.coordinate, to.coordinate, TravelMode::Walking);
        entry.transit_details = Some(TransitDetails {
            sub_paths: vec![SubPath {
                traffic_type: TrafficType::Walk,
                distance_meters: entry.distance_meters,
                duration_minutes: entry.duration_minutes,
                lanes: Vec::new(),
                start_name: Some(from.name.clone()),
                end_name: Some(to.name.clone()),
                polyline: None,
                stops: vec![from.coordinate, to.coordinate],
            }],
            transfer_count: 0,
            walking_time: entry.duration_minutes,
            walking_distance: entry.distance_meters,
            total_fare: 0,
        });
        entry.source = CostSource::Provider;
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingSink, NoopSink};
    use crate::model::Coordinate;
    use crate::traits::{CarRoute, RoutePriority, TransitRoute};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn nodes() -> Vec<Node> {
        vec![
            Node::place("a", "A", Coordinate::new(37.5796, 126.9770), 60),
            Node::place("b", "B", Coordinate::new(37.5512, 126.9882), 60),
            Node::place("c", "C", Coordinate::new(37.5125, 127.1025), 60),
        ]
    }

    struct FlakyRouter {
        calls: AtomicUsize,
    }

    impl RoutingProvider for FlakyRouter {
        fn car_route(
            &self,
            _from: Coordinate,
            to: Coordinate,
            _priority: RoutePriority,
        ) -> Result<Option<CarRoute>, RoutingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if to.lng > 127.0 {
                return Err(RoutingError::Timeout);
            }
            Ok(Some(CarRoute {
                distance_meters: 5_000,
                duration_minutes: 17,
                polyline: Some("poly".into()),
                fare: None,
            }))
        }

        fn transit_route(
            &self,
            _from: Coordinate,
            _to: Coordinate,
        ) -> Result<Option<TransitRoute>, RoutingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn options(use_external_provider: bool) -> MatrixOptions {
        MatrixOptions {
            use_external_provider,
            batch_delay_ms: 0,
            ..MatrixOptions::default()
        }
    }

    #[test]
    fn test_estimate_matrix_covers_every_ordered_pair() {
        let builder = MatrixBuilder::new(HaversineEstimator::default(), options(false), &NoopSink);
        let matrix = builder.build(&nodes(), TravelMode::Car);
        assert_eq!(matrix.len(), 6);
        assert!(matrix.get("a", "a").is_none());
        assert!(matrix.get("a", "c").is_some());
        assert!(matrix.get("c", "a").is_some());
    }

    #[test]
    fn test_estimate_matrix_is_deterministic() {
        let builder = MatrixBuilder::new(HaversineEstimator::default(), options(false), &NoopSink);
        let first = builder.build(&nodes(), TravelMode::Public);
        let second = builder.build(&nodes(), TravelMode::Public);
        for from in ["a", "b", "c"] {
            for to in ["a", "b", "c"] {
                assert_eq!(first.get(from, to), second.get(from, to));
            }
        }
    }

    #[test]
    fn test_failed_pairs_fall_back_individually() {
        let router = FlakyRouter {
            calls: AtomicUsize::new(0),
        };
        let sink = CollectingSink::new();
        let builder = MatrixBuilder::new(HaversineEstimator::default(), options(true), &sink)
            .with_provider(&router);
        let matrix = builder.build(&nodes(), TravelMode::Car);

        assert_eq!(router.calls.load(Ordering::SeqCst), 6);
        assert_eq!(matrix.get("c", "a").unwrap().source, CostSource::Provider);
        assert_eq!(matrix.get("a", "c").unwrap().source, CostSource::Estimate);
        let fallbacks = sink
            .snapshot()
            .into_iter()
            .filter(|d| matches!(d, Diagnostic::ProviderFallback { .. }))
            .count();
        assert_eq!(fallbacks, 2, "only pairs into c time out");
    }

    #[test]
    fn test_walking_never_calls_provider() {
        let router = FlakyRouter {
            calls: AtomicUsize::new(0),
        };
        let builder = MatrixBuilder::new(HaversineEstimator::default(), options(true), &NoopSink)
            .with_provider(&router);
        let matrix = builder.build(&nodes(), TravelMode::Walking);
        assert_eq!(router.calls.load(Ordering::SeqCst), 0);
        assert_eq!(matrix.len(), 6);
    }

    #[test]
    fn test_public_no_route_becomes_confirmed_walk() {
        let router = FlakyRouter {
            calls: AtomicUsize::new(0),
        };
        let builder = MatrixBuilder::new(HaversineEstimator::default(), options(true), &NoopSink)
            .with_provider(&router);
        let matrix = builder.build(&nodes(), TravelMode::Public);
        let entry = matrix.get("a", "b").unwrap();
        assert_eq!(entry.mode, TravelMode::Walking);
        assert_eq!(entry.source, CostSource::Provider);
        assert!(entry.transit_details.as_ref().unwrap().is_walk_only());
    }

    #[test]
    fn test_missing_entry_is_estimated_not_zero() {
        let matrix = TravelCostMatrix::new(TravelMode::Car, HaversineEstimator::default());
        let all = nodes();
        assert!(matrix.minutes(&all[0], &all[2]) > 0);
        assert!(matrix.distance(&all[0], &all[2]) > 0);
    }
}
