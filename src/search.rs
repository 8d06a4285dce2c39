//! Route search: endpoint-anchored nearest neighbor, then 2-opt.
//!
//! Costs are `distance_weight * km + time_weight * minutes` over the directed
//! matrix. Reversals recompute the reversed segment in full because `a → b`
//! and `b → a` may differ.
//!
//! 2-opt uses first-improvement: each sweep scans `(i, j)` in ascending order
//! and applies the first strictly improving reversal. The scan order is fixed,
//! so the output is deterministic for a given input.

use tracing::debug;

use crate::config::SearchConfig;
use crate::matrix::TravelCostMatrix;
use crate::model::{Node, NodeTable};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Place ids in visiting order, anchors excluded.
    pub route: Vec<String>,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub improvement_percentage: f64,
    /// 2-opt sweeps performed.
    pub iterations: usize,
}

/// Weighted costs between the places and to/from the anchors.
struct CostTable {
    between: Vec<Vec<f64>>,
    from_origin: Option<Vec<f64>>,
    to_destination: Option<Vec<f64>>,
}

impl CostTable {
    fn new(
        places: &[&Node],
        origin: Option<&Node>,
        destination: Option<&Node>,
        matrix: &TravelCostMatrix,
        config: &SearchConfig,
    ) -> Self {
        let weighted = |from: &Node, to: &Node| {
            let km = matrix.distance(from, to) as f64 / 1000.0;
            let minutes = matrix.minutes(from, to) as f64;
            config.distance_weight * km + config.time_weight * minutes
        };

        let between = places
            .iter()
            .map(|from| {
                places
                    .iter()
                    .map(|to| if from.id == to.id { 0.0 } else { weighted(from, to) })
                    .collect()
            })
            .collect();

        Self {
            between,
            from_origin: origin.map(|origin| places.iter().map(|to| weighted(origin, to)).collect()),
            to_destination: destination
                .map(|destination| places.iter().map(|from| weighted(from, destination)).collect()),
        }
    }

    fn start(&self, to: usize) -> f64 {
        self.from_origin.as_ref().map_or(0.0, |costs| costs[to])
    }

    fn finish(&self, from: usize) -> f64 {
        self.to_destination.as_ref().map_or(0.0, |costs| costs[from])
    }

    fn edge(&self, from: Option<usize>, to: Option<usize>) -> f64 {
        match (from, to) {
            (None, Some(to)) => self.start(to),
            (Some(from), None) => self.finish(from),
            (Some(from), Some(to)) => self.between[from][to],
            (None, None) => 0.0,
        }
    }

    fn route_cost(&self, route: &[usize]) -> f64 {
        let Some((&first, _)) = route.split_first() else {
            return 0.0;
        };
        let mut cost = self.start(first);
        for pair in route.windows(2) {
            cost += self.between[pair[0]][pair[1]];
        }
        cost + self.finish(route[route.len() - 1])
    }

    /// Cost of the path through `route[i..=j]` including its boundary edges.
    fn segment_cost(&self, route: &[usize], i: usize, j: usize, reversed: bool) -> f64 {
        let prev = i.checked_sub(1).map(|p| route[p]);
        let next = route.get(j + 1).copied();
        let mut cost = 0.0;
        if reversed {
            cost += self.edge(prev, Some(route[j]));
            for k in (i + 1..=j).rev() {
                cost += self.between[route[k]][route[k - 1]];
            }
            cost += self.edge(Some(route[i]), next);
        } else {
            cost += self.edge(prev, Some(route[i]));
            for k in i..j {
                cost += self.between[route[k]][route[k + 1]];
            }
            cost += self.edge(Some(route[j]), next);
        }
        cost
    }
}

/// Order `places` starting from the origin anchor.
///
/// Each step takes the cheapest unvisited place; ties go to the lower
/// `priority`, then to the earlier input position.
fn nearest_neighbor(places: &[&Node], costs: &CostTable) -> Vec<usize> {
    let mut visited = vec![false; places.len()];
    let mut route = Vec::with_capacity(places.len());
    let mut current: Option<usize> = None;

    while route.len() < places.len() {
        let mut best: Option<(usize, f64)> = None;
        for (candidate, node) in places.iter().enumerate() {
            if visited[candidate] {
                continue;
            }
            let cost = costs.edge(current, Some(candidate));
            let better = match best {
                None => true,
                Some((best_index, best_cost)) => {
                    cost < best_cost - EPSILON
                        || ((cost - best_cost).abs() <= EPSILON
                            && node.priority < places[best_index].priority)
                }
            };
            if better {
                best = Some((candidate, cost));
            }
        }

        let Some((next, _)) = best else { break };
        visited[next] = true;
        route.push(next);
        current = Some(next);
    }

    route
}

/// First strictly improving reversal, with the resulting cost.
fn first_improving_move(route: &[usize], current_cost: f64, costs: &CostTable) -> Option<(usize, usize, f64)> {
    let n = route.len();
    for i in 0..n.saturating_sub(1) {
        for j in i + 1..n {
            let before = costs.segment_cost(route, i, j, false);
            let after = costs.segment_cost(route, i, j, true);
            let candidate = current_cost - before + after;
            if candidate < current_cost - EPSILON {
                return Some((i, j, candidate));
            }
        }
    }
    None
}

/// Returns the number of sweeps performed and the final cost.
fn two_opt(route: &mut [usize], costs: &CostTable, config: &SearchConfig) -> (usize, f64) {
    let mut cost = costs.route_cost(route);
    if route.len() < 2 {
        return (0, cost);
    }

    let mut iterations = 0;
    let mut stale = 0;
    while iterations < config.max_iterations && stale < config.no_improvement_limit.max(1) {
        iterations += 1;
        match first_improving_move(route, cost, costs) {
            Some((i, j, _)) => {
                route[i..=j].reverse();
                // recompute to avoid drift from accumulated deltas
                cost = costs.route_cost(route);
                stale = 0;
            }
            None => stale += 1,
        }
    }

    (iterations, cost)
}

/// Order every place in `nodes` for the whole trip.
///
/// `origin_id`/`destination_id` name anchors in `nodes`; either may be absent.
/// Fixed places are ordered like any other place here.
pub fn search(
    nodes: &NodeTable,
    matrix: &TravelCostMatrix,
    config: &SearchConfig,
    origin_id: Option<&str>,
    destination_id: Option<&str>,
) -> SearchResult {
    let places: Vec<&Node> = nodes.places().collect();
    let origin = origin_id.and_then(|id| nodes.get(id));
    let destination = destination_id.and_then(|id| nodes.get(id));
    let costs = CostTable::new(&places, origin, destination, matrix, config);

    let mut order = nearest_neighbor(&places, &costs);
    let initial_cost = costs.route_cost(&order);
    let (iterations, final_cost) = two_opt(&mut order, &costs, config);

    let improvement_percentage = if initial_cost > EPSILON {
        ((initial_cost - final_cost) / initial_cost * 100.0).max(0.0)
    } else {
        0.0
    };

    debug!(
        places = places.len(),
        initial_cost,
        final_cost,
        iterations,
        improvement_percentage,
        "route search finished"
    );

    SearchResult {
        route: order.into_iter().map(|index| places[index].id.clone()).collect(),
        initial_cost,
        final_cost,
        improvement_percentage,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haversine::HaversineEstimator;
    use crate::model::{Coordinate, CostSource, TravelCostEntry, TravelMode};

    fn config() -> SearchConfig {
        SearchConfig {
            distance_weight: 0.0,
            time_weight: 1.0,
            ..SearchConfig::default()
        }
    }

    fn entry(minutes: u32) -> TravelCostEntry {
        TravelCostEntry {
            distance_meters: 0,
            duration_minutes: minutes,
            mode: TravelMode::Car,
            polyline: None,
            fare: None,
            transit_details: None,
            source: CostSource::Estimate,
        }
    }

    /// Places on a line, one minute per unit of distance in both directions.
    fn line(positions: &[(&str, i32)]) -> (NodeTable, TravelCostMatrix) {
        let mut nodes = vec![Node::origin("start", Coordinate::new(0.0, 0.0))];
        for (id, _) in positions {
            nodes.push(Node::place(*id, *id, Coordinate::new(0.0, 0.0), 30));
        }
        let mut matrix = TravelCostMatrix::new(TravelMode::Car, HaversineEstimator::default());
        let with_origin: Vec<(&str, i32)> = std::iter::once(("__origin__", 0))
            .chain(positions.iter().copied())
            .collect();
        for (from, a) in &with_origin {
            for (to, b) in &with_origin {
                if from != to {
                    matrix.insert(*from, *to, entry((a - b).unsigned_abs()));
                }
            }
        }
        (NodeTable::from_nodes(nodes).unwrap(), matrix)
    }

    #[test]
    fn test_nearest_neighbor_walks_outward_from_origin() {
        let (nodes, matrix) = line(&[("far", 9), ("near", 1), ("mid", 4)]);
        let result = search(&nodes, &matrix, &config(), Some("__origin__"), None);
        assert_eq!(result.route, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_ties_break_on_priority_then_input_order() {
        let (mut nodes, matrix) = line(&[("left", -2), ("right", 2), ("other", 2)]);
        let mut list = nodes.nodes().to_vec();
        list[2] = list[2].clone().with_priority(-1);
        nodes = NodeTable::from_nodes(list).unwrap();
        let result = search(&nodes, &matrix, &config(), Some("__origin__"), None);
        assert_eq!(result.route[0], "right", "lower priority wins the tie");

        let (nodes, matrix) = line(&[("left", -2), ("right", 2)]);
        let result = search(&nodes, &matrix, &config(), Some("__origin__"), None);
        assert_eq!(result.route[0], "left", "input order breaks remaining ties");
    }

    #[test]
    fn test_two_opt_uncrosses_route() {
        let (nodes, matrix) = line(&[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
        let places: Vec<&Node> = nodes.places().collect();
        let origin = nodes.get("__origin__");
        let costs = CostTable::new(&places, origin, None, &matrix, &config());

        let mut route = vec![0, 2, 1, 3];
        let before = costs.route_cost(&route);
        let (_, after) = two_opt(&mut route, &costs, &config());
        assert!(after < before);
        assert_eq!(route, vec![0, 1, 2, 3]);
        assert_eq!(after, 4.0);
        assert_eq!(after, costs.route_cost(&route), "reported cost is the final route's cost");
    }

    #[test]
    fn test_two_opt_respects_asymmetric_costs() {
        let mut nodes = vec![Node::origin("o", Coordinate::new(0.0, 0.0))];
        for id in ["a", "b"] {
            nodes.push(Node::place(id, id, Coordinate::new(0.0, 0.0), 0));
        }
        let nodes = NodeTable::from_nodes(nodes).unwrap();
        let mut matrix = TravelCostMatrix::new(TravelMode::Car, HaversineEstimator::default());
        matrix.insert("__origin__", "a", entry(1));
        matrix.insert("__origin__", "b", entry(2));
        matrix.insert("a", "b", entry(50));
        matrix.insert("b", "a", entry(1));

        let result = search(&nodes, &matrix, &config(), Some("__origin__"), None);
        assert_eq!(result.route, vec!["b", "a"]);
        assert_eq!(result.final_cost, 3.0);
        assert!(result.final_cost <= result.initial_cost);
    }

    #[test]
    fn test_destination_pulls_last_stop() {
        let (nodes, matrix) = line(&[("a", 3), ("b", -3)]);
        let mut list = nodes.nodes().to_vec();
        list.push(Node::destination("end", Coordinate::new(0.0, 0.0)));
        let nodes = NodeTable::from_nodes(list).unwrap();
        let mut matrix = matrix;
        matrix.insert("a", "__destination__", entry(100));
        matrix.insert("b", "__destination__", entry(1));

        let result = search(&nodes, &matrix, &config(), Some("__origin__"), Some("__destination__"));
        assert_eq!(result.route.last().map(String::as_str), Some("b"));
    }

    #[test]
    fn test_improvement_is_never_negative() {
        let (nodes, matrix) = line(&[("a", 1), ("b", 2)]);
        let result = search(&nodes, &matrix, &config(), Some("__origin__"), None);
        assert!(result.improvement_percentage >= 0.0);
        assert_eq!(result.initial_cost, result.final_cost);
    }

    #[test]
    fn test_empty_and_single() {
        let (nodes, matrix) = line(&[]);
        let result = search(&nodes, &matrix, &config(), Some("__origin__"), None);
        assert!(result.route.is_empty());
        assert_eq!(result.improvement_percentage, 0.0);

        let (nodes, matrix) = line(&[("only", 5)]);
        let result = search(&nodes, &matrix, &config(), None, None);
        assert_eq!(result.route, vec!["only"]);
        assert_eq!(result.iterations, 0);
    }
}
