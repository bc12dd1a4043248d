//! Greedy warm start.
//!
//! Builds one complete route quickly so the branch-and-bound search starts
//! with a finite upper bound.

use crate::error::SolveError;
use crate::loading::load_from_source;
use crate::problem::{pending_nodes, Context};
use crate::solution::{Solution, Stop};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

pub trait ConstructionHeuristic {
    fn construct(&self, ctx: &Context<'_>) -> Result<Solution, SolveError>;
    fn name(&self) -> &str;
}

/// Nearest-destination construction with look-ahead reload choice
///
/// When empty, the vehicle reloads at the recharge node minimising the trip
/// to it plus the hop from it to the closest pending destination. When
/// loaded, it serves the nearest pending destination, preferring larger
/// pending demand on ties.
#[derive(Debug, Clone, Default)]
pub struct GreedyConstructor;

impl GreedyConstructor {
    pub fn new() -> Self {
        GreedyConstructor
    }

    /// Recharge node minimising `d(from, r) + min_v d(r, v)` over pending `v`.
    fn best_recharge(&self, ctx: &Context<'_>, from: usize, demand: &[u32]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;

        for &r in &ctx.recharge {
            let to_r = ctx.distance(from, r);
            if to_r == f64::INFINITY {
                continue;
            }
            let onward = pending_nodes(demand)
                .map(|v| ctx.distance(r, v))
                .filter(|d| d.is_finite())
                .fold(f64::INFINITY, f64::min);
            if onward == f64::INFINITY {
                continue;
            }
            let total = to_r + onward;
            if best.map_or(true, |(_, b)| total < b) {
                best = Some((r, total));
            }
        }

        best.map(|(r, _)| r)
    }

    /// Nearest reachable pending node; ties go to the larger pending demand.
    fn nearest_pending(&self, ctx: &Context<'_>, from: usize, demand: &[u32]) -> Option<usize> {
        let mut candidates: Vec<usize> = pending_nodes(demand)
            .filter(|&v| ctx.paths.is_reachable(from, v))
            .collect();
        candidates.sort_by_key(|&v| (OrderedFloat(ctx.distance(from, v)), Reverse(demand[v])));
        candidates.first().copied()
    }
}

impl ConstructionHeuristic for GreedyConstructor {
    fn construct(&self, ctx: &Context<'_>) -> Result<Solution, SolveError> {
        let start = std::time::Instant::now();

        let mut demand = ctx.demand.clone();
        let mut remaining = ctx.total_demand;
        let mut current = ctx.depot;
        let mut load = 0u32;
        let mut distance = 0.0;
        let mut stops = vec![Stop::visit(ctx.depot)];

        while remaining > 0 {
            if load == 0 {
                let r = self
                    .best_recharge(ctx, current, &demand)
                    .ok_or(SolveError::NoRechargeReachable { from: current })?;
                if r != current {
                    distance += ctx.distance(current, r);
                    stops.push(Stop::visit(r));
                    current = r;
                }
                let (loaded, _) = load_from_source(0, remaining, ctx.capacity);
                load = loaded;
                if let Some(stop) = stops.last_mut() {
                    stop.loaded += loaded;
                }
            }

            let target = self
                .nearest_pending(ctx, current, &demand)
                .ok_or(SolveError::UnreachableDemand { from: current })?;
            let delivered = load.min(demand[target]);
            distance += ctx.distance(current, target);
            demand[target] -= delivered;
            load -= delivered;
            remaining -= delivered;
            stops.push(Stop { node: target, loaded: 0, delivered });
            current = target;
        }

        if ctx.return_to_depot && current != ctx.depot {
            let back = ctx.distance(current, ctx.depot);
            if back == f64::INFINITY {
                return Err(SolveError::DepotUnreachable { from: current });
            }
            distance += back;
            stops.push(Stop::visit(ctx.depot));
        }

        log::debug!("greedy route: distance={:.2} stops={}", distance, stops.len());

        let mut solution = Solution::from_stops(stops, distance, ctx.depot, self.name());
        solution.computation_time = start.elapsed().as_secs_f64();
        Ok(solution)
    }

    fn name(&self) -> &str {
        "Greedy"
    }
}
