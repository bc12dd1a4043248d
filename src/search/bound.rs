//! Lower bounds on the distance still to travel from a search state.

use crate::problem::{pending_nodes, Context};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Estimate added to the accumulated distance before comparing with the incumbent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LowerBound {
    /// No estimate: prune on accumulated distance alone
    Distance,
    /// Distance to the nearest pending destination
    NearestPending,
    /// Sum of the two nearest pending distances when demand exceeds the load.
    /// Can overestimate, so pruning with it is heuristic.
    TwoNearest,
    /// Minimum spanning tree over the current node, the pending destinations
    /// and, when the route must close, the depot
    #[default]
    SpanningTree,
}

impl LowerBound {
    /// Whether the estimate never exceeds the true remaining distance.
    pub fn is_admissible(self) -> bool {
        !matches!(self, LowerBound::TwoNearest)
    }

    /// Estimated remaining distance from `node`.
    pub fn estimate(self, ctx: &Context<'_>, node: usize, load: u32, remaining: u32, demand: &[u32]) -> f64 {
        if remaining == 0 {
            return 0.0;
        }
        match self {
            LowerBound::Distance => 0.0,
            LowerBound::NearestPending => pending_nodes(demand)
                .map(|v| ctx.distance(node, v))
                .fold(f64::INFINITY, f64::min),
            LowerBound::TwoNearest => two_nearest(ctx, node, load, remaining, demand),
            LowerBound::SpanningTree => spanning_tree(ctx, node, demand),
        }
    }
}

fn two_nearest(ctx: &Context<'_>, node: usize, load: u32, remaining: u32, demand: &[u32]) -> f64 {
    let mut distances: Vec<f64> = pending_nodes(demand)
        .map(|v| ctx.distance(node, v))
        .filter(|d| d.is_finite())
        .collect();
    if distances.is_empty() {
        return 0.0;
    }
    distances.sort_by_key(|&d| OrderedFloat(d));
    if remaining > load && distances.len() > 1 {
        distances[0] + distances[1]
    } else {
        distances[0]
    }
}

/// Prim's algorithm on the symmetric closure `min(d(a, b), d(b, a))`.
///
/// Every completion walks from `node` through all pending destinations (and
/// on to the depot when the route must close), so it spans this set and
/// costs at least its minimum spanning tree.
fn spanning_tree(ctx: &Context<'_>, node: usize, demand: &[u32]) -> f64 {
    let mut terminals: Vec<usize> = vec![node];
    for v in pending_nodes(demand) {
        if ctx.distance(node, v) == f64::INFINITY {
            return f64::INFINITY;
        }
        if v != node {
            terminals.push(v);
        }
    }
    if ctx.return_to_depot && !terminals.contains(&ctx.depot) {
        if ctx.distance(node, ctx.depot) == f64::INFINITY {
            return f64::INFINITY;
        }
        terminals.push(ctx.depot);
    }

    let weight = |a: usize, b: usize| ctx.distance(a, b).min(ctx.distance(b, a));

    let k = terminals.len();
    let mut in_tree = vec![false; k];
    let mut best: Vec<f64> = terminals.iter().map(|&t| weight(node, t)).collect();
    in_tree[0] = true;
    let mut total = 0.0;

    for _ in 1..k {
        let next = (0..k)
            .filter(|&i| !in_tree[i])
            .min_by_key(|&i| OrderedFloat(best[i]));
        let Some(next) = next else { break };
        total += best[next];
        in_tree[next] = true;
        for i in 0..k {
            if !in_tree[i] {
                best[i] = best[i].min(weight(terminals[next], terminals[i]));
            }
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::ShortestPaths;
    use crate::problem::Problem;
    use std::collections::BTreeMap;

    // 0 - 1 - 2 on a line with unit edges
    fn line_context(paths: &ShortestPaths, return_to_depot: bool) -> Context<'_> {
        let problem = Problem::new(
            vec![
                vec![0.0, 1.0, 0.0],
                vec![1.0, 0.0, 1.0],
                vec![0.0, 1.0, 0.0],
            ],
            0,
            vec![1],
            BTreeMap::from([(1, 1), (2, 1)]),
            1,
        );
        Context::new(&problem, paths, return_to_depot).unwrap()
    }

    fn line_paths() -> ShortestPaths {
        ShortestPaths::compute(&[
            vec![0.0, 1.0, 0.0],
            vec![1.0, 0.0, 1.0],
            vec![0.0, 1.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_no_remaining_demand_costs_nothing() {
        let paths = line_paths();
        let ctx = line_context(&paths, true);
        for bound in [LowerBound::Distance, LowerBound::NearestPending, LowerBound::TwoNearest, LowerBound::SpanningTree] {
            assert_eq!(bound.estimate(&ctx, 2, 0, 0, &[0, 0, 0]), 0.0);
        }
    }

    #[test]
    fn test_estimates_from_depot() {
        let paths = line_paths();
        let ctx = line_context(&paths, false);
        let demand = ctx.demand.clone();

        assert_eq!(LowerBound::Distance.estimate(&ctx, 0, 1, 2, &demand), 0.0);
        assert_eq!(LowerBound::NearestPending.estimate(&ctx, 0, 1, 2, &demand), 1.0);
        assert_eq!(LowerBound::TwoNearest.estimate(&ctx, 0, 1, 2, &demand), 3.0);
        assert_eq!(LowerBound::SpanningTree.estimate(&ctx, 0, 1, 2, &demand), 2.0);
    }

    #[test]
    fn test_two_nearest_overestimates_on_a_line() {
        // true remaining cost from 0 is 0 -> 1 (deliver, reload at hub 1) -> 2 = 2
        let paths = line_paths();
        let ctx = line_context(&paths, false);
        let demand = ctx.demand.clone();

        assert!(!LowerBound::TwoNearest.is_admissible());
        assert!(LowerBound::TwoNearest.estimate(&ctx, 0, 1, 2, &demand) > 2.0);
        assert!(LowerBound::SpanningTree.estimate(&ctx, 0, 1, 2, &demand) <= 2.0);
    }

    #[test]
    fn test_spanning_tree_includes_depot_when_closing() {
        let paths = line_paths();
        let ctx = line_context(&paths, true);
        // at node 2 with node 1 still pending: tree {2, 1, 0} costs 2
        assert_eq!(LowerBound::SpanningTree.estimate(&ctx, 2, 1, 1, &[0, 1, 0]), 2.0);
    }

    #[test]
    fn test_unreachable_pending_is_infinite() {
        let adjacency = vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 0.0]];
        let paths = ShortestPaths::compute(&adjacency).unwrap();
        let problem = Problem::new(adjacency, 0, vec![], BTreeMap::from([(2, 1)]), 1);
        let ctx = Context::new(&problem, &paths, false).unwrap();

        assert_eq!(LowerBound::SpanningTree.estimate(&ctx, 0, 1, 1, &ctx.demand), f64::INFINITY);
        assert_eq!(LowerBound::NearestPending.estimate(&ctx, 0, 1, 1, &ctx.demand), f64::INFINITY);
    }
}
