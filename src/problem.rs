//! Core problem input and the prepared context shared by the algorithms.

use crate::error::SolveError;
use crate::paths::ShortestPaths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single-vehicle delivery problem with free reloads at recharge nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    /// Weighted adjacency matrix; an off-diagonal zero means "no edge"
    pub adjacency: Vec<Vec<f64>>,
    /// Start (and, by default, end) of the route
    pub depot: usize,
    /// Auxiliary recharge nodes
    pub hubs: Vec<usize>,
    /// Units to deliver per node
    pub demand: BTreeMap<usize, u32>,
    /// Vehicle capacity
    pub capacity: u32,
}

impl Problem {
    pub fn new(
        adjacency: Vec<Vec<f64>>,
        depot: usize,
        hubs: Vec<usize>,
        demand: BTreeMap<usize, u32>,
        capacity: u32,
    ) -> Self {
        Problem { adjacency, depot, hubs, demand, capacity }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Sum of all demand, failing if it overflows.
    pub fn total_demand(&self) -> Result<u32, SolveError> {
        self.demand
            .values()
            .try_fold(0u32, |acc, &d| acc.checked_add(d))
            .ok_or(SolveError::DemandOverflow)
    }

    /// Number of nodes with strictly positive demand
    pub fn demand_destinations(&self) -> usize {
        self.demand.values().filter(|&&d| d > 0).count()
    }

    /// Reject inputs the algorithms cannot work with.
    ///
    /// Matrix shape and weights are checked by [`ShortestPaths::compute`].
    pub fn validate(&self) -> Result<(), SolveError> {
        let nodes = self.node_count();
        let check = |role: &'static str, node: usize| {
            if node < nodes {
                Ok(())
            } else {
                Err(SolveError::NodeOutOfRange { role, node, nodes })
            }
        };

        check("depot", self.depot)?;
        for &hub in &self.hubs {
            check("hub", hub)?;
        }
        for &node in self.demand.keys() {
            check("demand", node)?;
        }
        if self.capacity == 0 {
            return Err(SolveError::ZeroCapacity);
        }
        self.total_demand()?;
        Ok(())
    }
}

/// Everything the greedy constructor and the search read, prepared once.
#[derive(Debug, Clone)]
pub struct Context<'a> {
    pub paths: &'a ShortestPaths,
    pub depot: usize,
    /// Depot plus hubs, sorted and de-duplicated
    pub recharge: Vec<usize>,
    /// Dense per-node demand
    pub demand: Vec<u32>,
    pub total_demand: u32,
    pub capacity: u32,
    pub return_to_depot: bool,
}

impl<'a> Context<'a> {
    pub fn new(problem: &Problem, paths: &'a ShortestPaths, return_to_depot: bool) -> Result<Self, SolveError> {
        problem.validate()?;
        if paths.len() != problem.node_count() {
            return Err(SolveError::InvalidConfig(format!(
                "distance matrix has {} nodes but the problem has {}",
                paths.len(),
                problem.node_count()
            )));
        }

        let mut recharge: Vec<usize> = problem.hubs.clone();
        recharge.push(problem.depot);
        recharge.sort_unstable();
        recharge.dedup();

        let mut demand = vec![0u32; problem.node_count()];
        for (&node, &units) in &problem.demand {
            demand[node] = units;
        }

        Ok(Context {
            paths,
            depot: problem.depot,
            recharge,
            demand,
            total_demand: problem.total_demand()?,
            capacity: problem.capacity,
            return_to_depot,
        })
    }

    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.paths.distance(i, j)
    }

    #[inline]
    pub fn is_recharge(&self, node: usize) -> bool {
        self.recharge.binary_search(&node).is_ok()
    }

    pub fn node_count(&self) -> usize {
        self.demand.len()
    }
}

/// Nodes with pending demand, in ascending id order.
pub fn pending_nodes(demand: &[u32]) -> impl Iterator<Item = usize> + '_ {
    demand
        .iter()
        .enumerate()
        .filter(|&(_, &units)| units > 0)
        .map(|(node, _)| node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 2.0, 3.0],
            vec![2.0, 0.0, 4.0],
            vec![3.0, 4.0, 0.0],
        ]
    }

    #[test]
    fn test_validate_rejects_out_of_range_nodes() {
        let problem = Problem::new(triangle(), 0, vec![5], BTreeMap::new(), 3);
        assert_eq!(
            problem.validate(),
            Err(SolveError::NodeOutOfRange { role: "hub", node: 5, nodes: 3 })
        );

        let problem = Problem::new(triangle(), 0, vec![], BTreeMap::from([(3, 1)]), 3);
        assert!(matches!(problem.validate(), Err(SolveError::NodeOutOfRange { role: "demand", .. })));
    }

    #[test]
    fn test_validate_rejects_zero_capacity_and_overflow() {
        let problem = Problem::new(triangle(), 0, vec![], BTreeMap::from([(1, 1)]), 0);
        assert_eq!(problem.validate(), Err(SolveError::ZeroCapacity));

        let problem = Problem::new(triangle(), 0, vec![], BTreeMap::from([(1, u32::MAX), (2, 1)]), 4);
        assert_eq!(problem.validate(), Err(SolveError::DemandOverflow));
    }

    #[test]
    fn test_context_merges_depot_and_hubs() {
        let problem = Problem::new(triangle(), 1, vec![2, 1, 2], BTreeMap::from([(0, 4)]), 3);
        let paths = ShortestPaths::compute(&problem.adjacency).unwrap();
        let ctx = Context::new(&problem, &paths, true).unwrap();

        assert_eq!(ctx.recharge, vec![1, 2]);
        assert!(ctx.is_recharge(2));
        assert!(!ctx.is_recharge(0));
        assert_eq!(ctx.demand, vec![4, 0, 0]);
        assert_eq!(ctx.total_demand, 4);
        assert_eq!(pending_nodes(&ctx.demand).collect::<Vec<_>>(), vec![0]);
    }
}
