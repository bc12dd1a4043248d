//! Solution representation for the hub routing problem.
//!
//! A solution records the compact route (the nodes where the vehicle takes a
//! decision) together with what happened at each stop, so that loads and
//! deliveries can be replayed and checked after the fact.

use crate::paths::ShortestPaths;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One visited node of the route.
///
/// At a stop the vehicle first delivers, then loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub node: usize,
    /// Units loaded here (only at recharge nodes)
    pub loaded: u32,
    /// Units delivered here
    pub delivered: u32,
}

impl Stop {
    pub fn visit(node: usize) -> Self {
        Stop { node, loaded: 0, delivered: 0 }
    }
}

/// How the producing algorithm finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Built by a constructive heuristic, no search was run
    Constructed,
    /// The search tree was fully explored
    Exhausted,
    /// Stopped after too many calls without improvement
    Plateau,
    /// Stopped by the caller's cancel token
    Cancelled,
    /// Stopped by the time limit
    DeadlineReached,
}

/// Best route found for a problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Total travel distance (infinite while no route is known)
    pub distance: f64,
    /// Decision nodes in visiting order, starting at the depot
    pub route: Vec<usize>,
    /// Hubs (recharge nodes other than the depot) where the vehicle loaded
    pub hubs_used: BTreeSet<usize>,
    /// Per-stop load and delivery record, parallel to `route`
    pub stops: Vec<Stop>,
    pub termination: Termination,
    /// Whether pruning used a bound that never overestimates
    pub admissible_bound: bool,
    /// Number of search calls made
    pub calls: u64,
    /// Incumbent distances in the order they were found
    #[serde(default)]
    pub history: Vec<f64>,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
}

impl Solution {
    /// Create a new empty solution
    pub fn new() -> Self {
        Solution {
            distance: f64::INFINITY,
            route: Vec::new(),
            hubs_used: BTreeSet::new(),
            stops: Vec::new(),
            termination: Termination::Constructed,
            admissible_bound: true,
            calls: 0,
            history: Vec::new(),
            algorithm: String::new(),
            computation_time: 0.0,
        }
    }

    /// Build a solution from its stop record.
    pub fn from_stops(stops: Vec<Stop>, distance: f64, depot: usize, algorithm: &str) -> Self {
        let route = stops.iter().map(|s| s.node).collect();
        let hubs_used = stops
            .iter()
            .filter(|s| s.loaded > 0 && s.node != depot)
            .map(|s| s.node)
            .collect();

        Solution {
            distance,
            route,
            hubs_used,
            stops,
            algorithm: algorithm.to_string(),
            ..Solution::new()
        }
    }

    /// A finite-distance route has been found
    pub fn is_complete(&self) -> bool {
        self.distance.is_finite() && !self.route.is_empty()
    }

    /// True when the search ran to exhaustion with an admissible bound.
    pub fn is_proven_optimal(&self) -> bool {
        self.is_complete() && self.termination == Termination::Exhausted && self.admissible_bound
    }

    /// Load carried when leaving each stop, `None` if a stop delivers more than is on board.
    pub fn load_profile(&self) -> Option<Vec<u32>> {
        let mut load = 0u32;
        let mut profile = Vec::with_capacity(self.stops.len());
        for stop in &self.stops {
            load = load.checked_sub(stop.delivered)?;
            load = load.checked_add(stop.loaded)?;
            profile.push(load);
        }
        Some(profile)
    }

    /// Get maximum load during the route
    pub fn max_load(&self) -> u32 {
        self.load_profile()
            .and_then(|p| p.into_iter().max())
            .unwrap_or(0)
    }

    /// Units delivered per node over the whole route.
    pub fn delivered_per_node(&self) -> BTreeMap<usize, u32> {
        let mut delivered = BTreeMap::new();
        for stop in self.stops.iter().filter(|s| s.delivered > 0) {
            *delivered.entry(stop.node).or_insert(0) += stop.delivered;
        }
        delivered
    }

    /// Recompute the route length from a distance matrix.
    pub fn route_length(&self, paths: &ShortestPaths) -> f64 {
        self.route
            .windows(2)
            .map(|w| paths.distance(w[0], w[1]))
            .sum()
    }

    /// Expand the compact route into the full node-by-node walk.
    ///
    /// Returns an empty vector if some leg is unreachable.
    pub fn expanded_route(&self, paths: &ShortestPaths) -> Vec<usize> {
        let mut walk: Vec<usize> = self.route.first().copied().into_iter().collect();
        for leg in self.route.windows(2) {
            let segment = paths.path(leg[0], leg[1]);
            if segment.is_empty() {
                return Vec::new();
            }
            walk.extend(segment.into_iter().skip(1));
        }
        walk
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Distance: {:.2}", self.distance)?;
        writeln!(f, "  Termination: {:?}", self.termination)?;
        writeln!(f, "  Proven optimal: {}", self.is_proven_optimal())?;
        writeln!(f, "  Calls: {}", self.calls)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        writeln!(f, "  Hubs used: {:?}", self.hubs_used)?;
        writeln!(f, "  Route: {:?}", self.route)
    }
}
