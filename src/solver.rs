//! Orchestrator: shortest paths, greedy seed, then branch-and-bound.

use crate::error::SolveError;
use crate::greedy::{ConstructionHeuristic, GreedyConstructor};
use crate::paths::ShortestPaths;
use crate::problem::{Context, Problem};
use crate::search::{BranchAndBound, CancelToken, LowerBound, SearchConfig};
use crate::solution::{Solution, Termination};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default scale of the automatic plateau threshold
pub const DEFAULT_PLATEAU_BASE: f64 = 1300.0;
pub const DEFAULT_PLATEAU_FLOOR: u64 = 50_000;
pub const DEFAULT_PLATEAU_CEILING: u64 = 5_000_000;

/// Progress line interval when the search is exhaustive
const EXACT_REPORT_INTERVAL: u64 = 100_000;

/// When the search gives up after a run of calls without improvement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PlateauPolicy {
    /// Never: explore the whole tree
    Exact,
    /// After exactly this many calls without improvement
    Fixed(u64),
    /// `clamp(base * sqrt(n) * m * T, floor, ceiling)` where `n` is the node
    /// count, `m` the number of destinations and `T` the minimum trip count
    Auto { base: f64, floor: u64, ceiling: u64 },
}

impl Default for PlateauPolicy {
    fn default() -> Self {
        PlateauPolicy::Auto {
            base: DEFAULT_PLATEAU_BASE,
            floor: DEFAULT_PLATEAU_FLOOR,
            ceiling: DEFAULT_PLATEAU_CEILING,
        }
    }
}

impl PlateauPolicy {
    /// Threshold for a problem, `None` in exact mode.
    pub fn threshold(&self, nodes: usize, destinations: usize, total_demand: u32, capacity: u32) -> Option<u64> {
        match *self {
            PlateauPolicy::Exact => None,
            PlateauPolicy::Fixed(limit) => Some(limit),
            PlateauPolicy::Auto { base, floor, ceiling } => {
                let m = destinations.max(1) as f64;
                let trips = total_demand.div_ceil(capacity.max(1)).max(1) as f64;
                let value = base * (nodes.max(1) as f64).sqrt() * m * trips;
                Some((value as u64).clamp(floor, ceiling))
            }
        }
    }

    fn validate(&self) -> Result<(), SolveError> {
        match *self {
            PlateauPolicy::Exact => Ok(()),
            PlateauPolicy::Fixed(0) => Err(SolveError::InvalidConfig("plateau threshold must be positive".to_string())),
            PlateauPolicy::Fixed(_) => Ok(()),
            PlateauPolicy::Auto { base, floor, ceiling } => {
                if !(base.is_finite() && base > 0.0) {
                    return Err(SolveError::InvalidConfig(format!("plateau base must be positive, got {}", base)));
                }
                if floor == 0 || floor > ceiling {
                    return Err(SolveError::InvalidConfig(format!(
                        "plateau floor {} must be positive and not above ceiling {}",
                        floor, ceiling
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub plateau: PlateauPolicy,
    /// Calls between progress lines; derived from the plateau threshold when unset
    pub report_interval: Option<u64>,
    /// Close every route with a leg back to the depot
    pub return_to_depot: bool,
    pub lower_bound: LowerBound,
    pub parallel: bool,
    /// Time limit in seconds
    pub time_limit: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            plateau: PlateauPolicy::default(),
            report_interval: None,
            return_to_depot: true,
            lower_bound: LowerBound::default(),
            parallel: false,
            time_limit: None,
        }
    }
}

impl SolverConfig {
    /// Exhaustive search with an admissible bound.
    pub fn exact() -> Self {
        SolverConfig {
            plateau: PlateauPolicy::Exact,
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file; missing fields take defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let text = std::fs::read_to_string(&path).map_err(|e| format!("Cannot open config: {}", e))?;
        serde_json::from_str(&text).map_err(|e| format!("Invalid config: {}", e))
    }

    pub fn validate(&self) -> Result<(), SolveError> {
        self.plateau.validate()?;
        self.time_limit_duration()?;
        Ok(())
    }

    /// The time limit as a `Duration`, rejecting non-positive or unrepresentable values.
    pub fn time_limit_duration(&self) -> Result<Option<Duration>, SolveError> {
        let Some(limit) = self.time_limit else {
            return Ok(None);
        };
        if !(limit.is_finite() && limit > 0.0) {
            return Err(SolveError::InvalidConfig(format!("time limit must be positive, got {}", limit)));
        }
        Duration::try_from_secs_f64(limit)
            .map(Some)
            .map_err(|_| SolveError::InvalidConfig(format!("time limit {} seconds is too large", limit)))
    }
}

/// Solves [`Problem`]s according to a [`SolverConfig`].
pub struct Solver {
    pub config: SolverConfig,
    cancel: CancelToken,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Solver { config, cancel: CancelToken::new() }
    }

    /// Handle that aborts a running [`Solver::solve`] from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn solve(&self, problem: &Problem) -> Result<Solution, SolveError> {
        self.config.validate()?;
        let paths = ShortestPaths::compute(&problem.adjacency)?;
        self.solve_with_paths(problem, &paths)
    }

    /// Solve with a precomputed distance matrix for `problem.adjacency`.
    pub fn solve_with_paths(&self, problem: &Problem, paths: &ShortestPaths) -> Result<Solution, SolveError> {
        self.config.validate()?;
        let time_limit = self.config.time_limit_duration()?;
        let start = std::time::Instant::now();
        let ctx = Context::new(problem, paths, self.config.return_to_depot)?;

        let plateau = self.config.plateau.threshold(
            problem.node_count(),
            problem.demand_destinations(),
            ctx.total_demand,
            ctx.capacity,
        );
        let report_interval = self.config.report_interval.unwrap_or(match plateau {
            Some(limit) => (limit / 100).max(1_000),
            None => EXACT_REPORT_INTERVAL,
        });

        log::info!(
            "solving: nodes={} recharge={:?} demand={} capacity={} plateau={:?}",
            problem.node_count(),
            ctx.recharge,
            ctx.total_demand,
            ctx.capacity,
            plateau
        );

        let seed = match GreedyConstructor::new().construct(&ctx) {
            Ok(seed) => {
                log::info!("greedy seed distance {:.2}", seed.distance);
                seed
            }
            Err(e) => {
                log::warn!("greedy seed failed ({}), searching without an upper bound", e);
                Solution::new()
            }
        };

        let search = SearchConfig {
            plateau,
            report_interval,
            lower_bound: self.config.lower_bound,
            parallel: self.config.parallel,
            time_limit,
            cancel: self.cancel.clone(),
        };
        let mut solution = BranchAndBound::new(&ctx, search).run(seed);
        solution.computation_time = start.elapsed().as_secs_f64();

        if !solution.is_complete() {
            return Err(match solution.termination {
                Termination::Exhausted | Termination::Constructed => SolveError::Infeasible,
                termination => SolveError::NoRouteBeforeStop { termination },
            });
        }
        Ok(solution)
    }
}

/// Solve with the default configuration.
pub fn solve(problem: &Problem) -> Result<Solution, SolveError> {
    Solver::new(SolverConfig::default()).solve(problem)
}
