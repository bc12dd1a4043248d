//! Branch-and-bound search over reload and delivery decisions.
//!
//! Each call sees the vehicle at a node with some load, remaining demand,
//! accumulated distance and stops so far. An empty vehicle reloads (in place
//! at a recharge node, or after moving to another one); a loaded vehicle
//! moves to a pending destination and delivers as much as it can there.
//! Candidates are tried in ascending distance from the current node, ties in
//! ascending node id, which makes sequential runs deterministic.
//!
//! The search is anytime: the incumbent only ever improves, and the run can
//! be cut short by the plateau threshold, a cancel token or a deadline.

pub mod bound;
pub mod state;

pub use bound::LowerBound;
pub use state::{CancelToken, SearchState};

use crate::loading::load_from_source;
use crate::problem::{pending_nodes, Context};
use crate::solution::{Solution, Stop};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Decision levels expanded before subtrees are handed to the thread pool
const SPLIT_DEPTH: usize = 2;

/// Search parameters
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Calls without improvement before stopping; `None` searches exhaustively
    pub plateau: Option<u64>,
    /// Calls between progress lines; 0 disables them
    pub report_interval: u64,
    pub lower_bound: LowerBound,
    /// Explore top-level subtrees on the rayon pool
    pub parallel: bool,
    pub time_limit: Option<Duration>,
    pub cancel: CancelToken,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            plateau: None,
            report_interval: 0,
            lower_bound: LowerBound::default(),
            parallel: false,
            time_limit: None,
            cancel: CancelToken::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Move {
    /// Load in place at a recharge node
    Stay { units: u32 },
    Reload { to: usize, leg: f64, units: u32 },
    Deliver { to: usize, leg: f64, units: u32 },
}

/// Vehicle state of one branch.
#[derive(Debug, Clone)]
struct Frame {
    node: usize,
    load: u32,
    remaining: u32,
    distance: f64,
    demand: Vec<u32>,
    stops: Vec<Stop>,
}

impl Frame {
    fn root(ctx: &Context<'_>) -> Self {
        Frame {
            node: ctx.depot,
            load: 0,
            remaining: ctx.total_demand,
            distance: 0.0,
            demand: ctx.demand.clone(),
            stops: vec![Stop::visit(ctx.depot)],
        }
    }

    fn apply(&mut self, mv: Move) {
        match mv {
            Move::Stay { units } => {
                self.load = units;
                if let Some(stop) = self.stops.last_mut() {
                    stop.loaded += units;
                }
            }
            Move::Reload { to, leg, units } => {
                self.node = to;
                self.distance += leg;
                self.load = units;
                self.stops.push(Stop { node: to, loaded: units, delivered: 0 });
            }
            Move::Deliver { to, leg, units } => {
                self.node = to;
                self.distance += leg;
                self.load -= units;
                self.remaining -= units;
                self.demand[to] -= units;
                self.stops.push(Stop { node: to, loaded: 0, delivered: units });
            }
        }
    }

    /// Undo `mv`, restoring the scalar fields from `saved`.
    fn undo(&mut self, mv: Move, saved: (usize, u32, u32, f64)) {
        match mv {
            Move::Stay { units } => {
                if let Some(stop) = self.stops.last_mut() {
                    stop.loaded -= units;
                }
            }
            Move::Reload { .. } => {
                self.stops.pop();
            }
            Move::Deliver { to, units, .. } => {
                self.demand[to] += units;
                self.stops.pop();
            }
        }
        (self.node, self.load, self.remaining, self.distance) = saved;
    }

    fn saved(&self) -> (usize, u32, u32, f64) {
        (self.node, self.load, self.remaining, self.distance)
    }
}

pub struct BranchAndBound<'a> {
    ctx: &'a Context<'a>,
    config: SearchConfig,
}

impl<'a> BranchAndBound<'a> {
    pub fn new(ctx: &'a Context<'a>, config: SearchConfig) -> Self {
        BranchAndBound { ctx, config }
    }

    pub fn name(&self) -> &str {
        "BranchAndBound"
    }

    /// Search for a route shorter than `seed`.
    ///
    /// Returns the best solution known when the search ends; this is `seed`
    /// itself if nothing shorter was found.
    pub fn run(&self, seed: Solution) -> Solution {
        let start = Instant::now();
        let deadline = self.config.time_limit.and_then(|limit| start.checked_add(limit));
        let state = SearchState::new(
            seed,
            self.config.plateau,
            self.config.report_interval,
            self.config.cancel.clone(),
            deadline,
        );

        if self.config.parallel {
            self.explore_parallel(Frame::root(self.ctx), &state);
        } else {
            self.explore(&mut Frame::root(self.ctx), &state);
        }

        let mut solution = state.into_solution();
        // routes closed by the search carry its name; an unimproved seed keeps its own
        if solution.algorithm.is_empty() {
            solution.algorithm = self.name().to_string();
        }
        solution.admissible_bound = self.config.lower_bound.is_admissible();
        solution.computation_time = start.elapsed().as_secs_f64();
        log::info!(
            "search finished: best={:.2} calls={} termination={:?}",
            solution.distance,
            solution.calls,
            solution.termination
        );
        solution
    }

    fn explore(&self, frame: &mut Frame, state: &SearchState) {
        if !self.enter(frame, state) {
            return;
        }
        for mv in self.moves(frame) {
            if state.is_stopped() {
                return;
            }
            let saved = frame.saved();
            frame.apply(mv);
            self.explore(frame, state);
            frame.undo(mv, saved);
        }
    }

    /// Expand the first levels in place, then search each subtree on its own
    /// copy of the demand.
    fn explore_parallel(&self, root: Frame, state: &SearchState) {
        let mut frontier = vec![root];
        for _ in 0..SPLIT_DEPTH {
            let mut next = Vec::new();
            for frame in frontier {
                if !self.enter(&frame, state) {
                    continue;
                }
                for mv in self.moves(&frame) {
                    let mut child = frame.clone();
                    child.apply(mv);
                    next.push(child);
                }
            }
            frontier = next;
        }

        log::debug!("exploring {} subtrees in parallel", frontier.len());
        frontier
            .into_par_iter()
            .for_each(|mut frame| self.explore(&mut frame, state));
    }

    /// Bookkeeping, pruning and route closing for one call.
    ///
    /// Returns `true` when the frame should be expanded further.
    fn enter(&self, frame: &Frame, state: &SearchState) -> bool {
        if state.is_stopped() {
            return false;
        }
        if !state.tick(frame.node, frame.remaining) {
            return false;
        }

        let best = state.best_distance();
        if frame.distance >= best {
            return false;
        }

        if frame.remaining == 0 && frame.load == 0 {
            if let Some(solution) = self.close(frame) {
                state.offer(solution);
            }
            return false;
        }

        let estimate = self.config.lower_bound.estimate(
            self.ctx,
            frame.node,
            frame.load,
            frame.remaining,
            &frame.demand,
        );
        frame.distance + estimate < best
    }

    /// Finish a route that has delivered everything.
    fn close(&self, frame: &Frame) -> Option<Solution> {
        let mut stops = frame.stops.clone();
        let mut distance = frame.distance;

        if self.ctx.return_to_depot && frame.node != self.ctx.depot {
            let back = self.ctx.distance(frame.node, self.ctx.depot);
            if back == f64::INFINITY {
                return None;
            }
            distance += back;
            stops.push(Stop::visit(self.ctx.depot));
        }

        Some(Solution::from_stops(stops, distance, self.ctx.depot, self.name()))
    }

    /// Candidate moves from `frame` in exploration order.
    fn moves(&self, frame: &Frame) -> Vec<Move> {
        let ctx = self.ctx;

        if frame.load == 0 {
            let (units, _) = load_from_source(0, frame.remaining, ctx.capacity);
            let mut moves = Vec::with_capacity(ctx.recharge.len());
            if ctx.is_recharge(frame.node) {
                moves.push(Move::Stay { units });
            }

            let mut targets: Vec<(usize, f64)> = ctx
                .recharge
                .iter()
                .filter(|&&r| r != frame.node)
                .map(|&r| (r, ctx.distance(frame.node, r)))
                .filter(|&(_, leg)| leg.is_finite())
                .collect();
            targets.sort_by_key(|&(_, leg)| OrderedFloat(leg));
            moves.extend(targets.into_iter().map(|(to, leg)| Move::Reload { to, leg, units }));
            return moves;
        }

        let mut targets: Vec<(usize, f64)> = pending_nodes(&frame.demand)
            .map(|v| (v, ctx.distance(frame.node, v)))
            .filter(|&(_, leg)| leg.is_finite())
            .collect();
        targets.sort_by_key(|&(_, leg)| OrderedFloat(leg));
        targets
            .into_iter()
            .map(|(to, leg)| Move::Deliver {
                to,
                leg,
                units: frame.load.min(frame.demand[to]),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greedy::{ConstructionHeuristic, GreedyConstructor};
    use crate::paths::ShortestPaths;
    use crate::problem::Problem;
    use crate::solution::Termination;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use std::collections::BTreeMap;

    fn complete_graph() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 4.0, 3.0, 6.0],
            vec![4.0, 0.0, 2.0, 5.0],
            vec![3.0, 2.0, 0.0, 2.0],
            vec![6.0, 5.0, 2.0, 0.0],
        ]
    }

    fn hub_problem() -> Problem {
        Problem::new(complete_graph(), 0, vec![2], BTreeMap::from([(1, 5), (3, 5)]), 5)
    }

    fn random_problem(seed: u64) -> Problem {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let n = 7;
        let mut adjacency = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                if j == i + 1 || rng.gen_bool(0.5) {
                    let w = rng.gen_range(1..15) as f64;
                    adjacency[i][j] = w;
                    adjacency[j][i] = w;
                }
            }
        }
        let mut demand = BTreeMap::new();
        for node in [2, 4, 5, 6] {
            demand.insert(node, rng.gen_range(1..4));
        }
        Problem::new(adjacency, 0, vec![3], demand, 4)
    }

    fn search(problem: &Problem, config: SearchConfig, return_to_depot: bool) -> Solution {
        let paths = ShortestPaths::compute(&problem.adjacency).unwrap();
        let ctx = Context::new(problem, &paths, return_to_depot).unwrap();
        let seed = GreedyConstructor::new().construct(&ctx).unwrap_or_default();
        BranchAndBound::new(&ctx, config).run(seed)
    }

    fn exact(lower_bound: LowerBound) -> SearchConfig {
        SearchConfig { lower_bound, ..SearchConfig::default() }
    }

    fn assert_valid(problem: &Problem, solution: &Solution, return_to_depot: bool) {
        let recharge: Vec<usize> = problem.hubs.iter().copied().chain([problem.depot]).collect();

        assert_eq!(solution.route.first(), Some(&problem.depot));
        if return_to_depot {
            assert_eq!(solution.route.last(), Some(&problem.depot));
        }
        let expected: BTreeMap<usize, u32> =
            problem.demand.iter().filter(|(_, &d)| d > 0).map(|(&n, &d)| (n, d)).collect();
        assert_eq!(solution.delivered_per_node(), expected);

        let profile = solution.load_profile().expect("load never negative");
        assert!(profile.iter().all(|&load| load <= problem.capacity));
        for stop in solution.stops.iter().filter(|s| s.loaded > 0) {
            assert!(recharge.contains(&stop.node));
        }

        let paths = ShortestPaths::compute(&problem.adjacency).unwrap();
        assert!((solution.route_length(&paths) - solution.distance).abs() < 1e-9);
    }

    #[test]
    fn test_hub_scenario_reloads_and_conserves_packages() {
        let problem = hub_problem();
        let solution = search(&problem, exact(LowerBound::SpanningTree), true);

        assert_valid(&problem, &solution, true);
        assert_eq!(solution.delivered_per_node(), BTreeMap::from([(1, 5), (3, 5)]));
        assert!(solution.stops.iter().filter(|s| s.loaded > 0).count() >= 2);
        assert_eq!(solution.termination, Termination::Exhausted);
        assert!(solution.is_proven_optimal());
        // 0 -> 1 (4) -> 2 (2, reload) -> 3 (2) -> 0 (5), or the mirror image
        assert_eq!(solution.distance, 13.0);
        assert_eq!(solution.hubs_used.iter().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_open_route_need_not_return() {
        let problem = hub_problem();
        let solution = search(&problem, exact(LowerBound::SpanningTree), false);

        assert_valid(&problem, &solution, false);
        // 0 -> 1 (4) -> 2 (2) -> 3 (2)
        assert_eq!(solution.distance, 8.0);
        assert_eq!(solution.route.last(), Some(&3));
    }

    #[test]
    fn test_admissible_bounds_agree_on_optimum() {
        for seed in 0..6 {
            let problem = random_problem(seed);
            let baseline = search(&problem, exact(LowerBound::Distance), true);
            assert_valid(&problem, &baseline, true);

            for bound in [LowerBound::NearestPending, LowerBound::SpanningTree] {
                let solution = search(&problem, exact(bound), true);
                assert!((solution.distance - baseline.distance).abs() < 1e-9, "seed {seed} bound {bound:?}");
                assert!(solution.calls <= baseline.calls);
            }
        }
    }

    #[test]
    fn test_two_nearest_is_flagged_heuristic() {
        let problem = hub_problem();
        let solution = search(&problem, exact(LowerBound::TwoNearest), true);

        assert_valid(&problem, &solution, true);
        assert_eq!(solution.termination, Termination::Exhausted);
        assert!(!solution.is_proven_optimal());
    }

    #[test]
    fn test_exact_runs_are_deterministic() {
        let problem = random_problem(42);
        let first = search(&problem, exact(LowerBound::SpanningTree), true);
        let second = search(&problem, exact(LowerBound::SpanningTree), true);

        assert_eq!(first.distance, second.distance);
        assert_eq!(first.route, second.route);
        assert_eq!(first.stops, second.stops);
    }

    #[test]
    fn test_incumbent_history_is_monotone() {
        for seed in 0..4 {
            let solution = search(&random_problem(seed), exact(LowerBound::Distance), true);
            assert!(!solution.history.is_empty());
            assert!(solution.history.windows(2).all(|w| w[1] < w[0]));
            assert_eq!(solution.history.last(), Some(&solution.distance));
        }
    }

    #[test]
    fn test_search_never_worse_than_greedy() {
        for seed in 0..4 {
            let problem = random_problem(seed);
            let paths = ShortestPaths::compute(&problem.adjacency).unwrap();
            let ctx = Context::new(&problem, &paths, true).unwrap();
            let greedy = GreedyConstructor::new().construct(&ctx).unwrap();
            let best = BranchAndBound::new(&ctx, SearchConfig::default()).run(greedy.clone());
            assert!(best.distance <= greedy.distance);
        }
    }

    #[test]
    fn test_plateau_stops_early_with_valid_route() {
        let problem = random_problem(7);
        let config = SearchConfig { plateau: Some(3), lower_bound: LowerBound::Distance, ..SearchConfig::default() };
        let solution = search(&problem, config, true);

        assert_eq!(solution.termination, Termination::Plateau);
        assert!(!solution.is_proven_optimal());
        assert_valid(&problem, &solution, true);
    }

    #[test]
    fn test_cancelled_before_start_returns_seed() {
        let problem = hub_problem();
        let paths = ShortestPaths::compute(&problem.adjacency).unwrap();
        let ctx = Context::new(&problem, &paths, true).unwrap();
        let greedy = GreedyConstructor::new().construct(&ctx).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let config = SearchConfig { cancel, ..SearchConfig::default() };
        let solution = BranchAndBound::new(&ctx, config).run(greedy.clone());

        assert_eq!(solution.termination, Termination::Cancelled);
        assert_eq!(solution.route, greedy.route);
        assert_eq!(solution.calls, 0);
        assert_eq!(solution.algorithm, "Greedy");
    }

    #[test]
    fn test_improved_route_is_credited_to_search() {
        let problem = random_problem(0);
        let solution = search(&problem, exact(LowerBound::SpanningTree), true);
        if solution.history.len() > 1 {
            assert_eq!(solution.algorithm, "BranchAndBound");
        } else {
            assert_eq!(solution.algorithm, "Greedy");
        }
    }

    #[test]
    fn test_unbounded_time_limit_means_no_deadline() {
        let problem = hub_problem();
        let config = SearchConfig { time_limit: Some(Duration::MAX), ..exact(LowerBound::SpanningTree) };
        let solution = search(&problem, config, true);
        assert_eq!(solution.termination, Termination::Exhausted);
        assert_eq!(solution.distance, 13.0);
    }

    #[test]
    fn test_parallel_matches_sequential_distance() {
        for seed in 0..4 {
            let problem = random_problem(seed);
            let sequential = search(&problem, exact(LowerBound::SpanningTree), true);
            let parallel = search(
                &problem,
                SearchConfig { parallel: true, ..exact(LowerBound::SpanningTree) },
                true,
            );
            assert_valid(&problem, &parallel, true);
            assert!((parallel.distance - sequential.distance).abs() < 1e-9);
            assert_eq!(parallel.termination, Termination::Exhausted);
        }
    }

    #[test]
    fn test_search_finds_route_greedy_misses() {
        // Greedy serves 1 first and strands itself; the search goes to 2 first.
        let adjacency = vec![
            vec![0.0, 1.0, 3.0],
            vec![0.0, 0.0, 0.0],
            vec![3.0, 1.0, 0.0],
        ];
        let problem = Problem::new(adjacency, 0, vec![], BTreeMap::from([(1, 1), (2, 1)]), 2);
        let paths = ShortestPaths::compute(&problem.adjacency).unwrap();
        let ctx = Context::new(&problem, &paths, false).unwrap();

        assert!(GreedyConstructor::new().construct(&ctx).is_err());
        let solution = BranchAndBound::new(&ctx, SearchConfig::default()).run(Solution::new());
        assert_eq!(solution.route, vec![0, 2, 1]);
        assert_eq!(solution.distance, 4.0);
    }
}
