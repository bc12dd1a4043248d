//! All-pairs shortest paths with path reconstruction.
//!
//! Floyd-Warshall over a dense adjacency matrix where an off-diagonal zero
//! means "no direct edge". The next-hop table produced alongside the
//! distances lets callers recover the concrete node sequence for any pair.

use crate::error::SolveError;
use rayon::prelude::*;

/// Shortest distances and next hops for every ordered pair of nodes.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    distance: Vec<Vec<f64>>,
    next: Vec<Vec<Option<usize>>>,
}

impl ShortestPaths {
    /// Run Floyd-Warshall on a square, non-negative adjacency matrix.
    pub fn compute(adjacency: &[Vec<f64>]) -> Result<Self, SolveError> {
        validate_adjacency(adjacency)?;
        let n = adjacency.len();

        let mut distance = vec![vec![f64::INFINITY; n]; n];
        let mut next: Vec<Vec<Option<usize>>> = vec![vec![None; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i == j {
                    distance[i][j] = 0.0;
                    next[i][j] = Some(i);
                } else if adjacency[i][j] != 0.0 {
                    distance[i][j] = adjacency[i][j];
                    next[i][j] = Some(j);
                }
            }
        }

        for k in 0..n {
            // Row k cannot improve through itself, so a snapshot is safe to share.
            let through = distance[k].clone();
            distance
                .par_iter_mut()
                .zip(next.par_iter_mut())
                .for_each(|(row, hops)| {
                    let dik = row[k];
                    if dik == f64::INFINITY {
                        return;
                    }
                    let via = hops[k];
                    for j in 0..n {
                        let kj = through[j];
                        if kj == f64::INFINITY {
                            continue;
                        }
                        let candidate = dik + kj;
                        if candidate < row[j] {
                            row[j] = candidate;
                            hops[j] = via;
                        }
                    }
                });
        }

        Ok(ShortestPaths { distance, next })
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.distance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance.is_empty()
    }

    /// Shortest distance from `i` to `j`, `f64::INFINITY` when unreachable.
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distance[i][j]
    }

    pub fn is_reachable(&self, i: usize, j: usize) -> bool {
        self.distance[i][j] != f64::INFINITY
    }

    /// The full distance matrix.
    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.distance
    }

    /// Next-hop table: `next[i][j]` is the node following `i` on the way to `j`.
    pub fn next_hops(&self) -> &[Vec<Option<usize>>] {
        &self.next
    }

    /// Concrete shortest path from `i` to `j` (both inclusive), empty if unreachable.
    pub fn path(&self, i: usize, j: usize) -> Vec<usize> {
        if !self.is_reachable(i, j) {
            return Vec::new();
        }
        reconstruct_path(&self.next, i, j)
    }

    /// Path table for every ordered pair.
    pub fn paths(&self) -> Vec<Vec<Vec<usize>>> {
        let n = self.len();
        (0..n)
            .map(|i| (0..n).map(|j| self.path(i, j)).collect())
            .collect()
    }
}

/// Follow next-hop links from `from` to `to`.
///
/// Returns an empty path when a link is missing or the chain runs longer than
/// the number of nodes, so a corrupted table can never loop forever.
pub fn reconstruct_path(next: &[Vec<Option<usize>>], from: usize, to: usize) -> Vec<usize> {
    let n = next.len();
    if from >= n || to >= n {
        return Vec::new();
    }
    if next[from][to].is_none() {
        return Vec::new();
    }

    let mut path = vec![from];
    let mut current = from;
    while current != to {
        if path.len() > n {
            return Vec::new();
        }
        match next[current].get(to).copied().flatten() {
            Some(hop) if hop < n => {
                current = hop;
                path.push(current);
            }
            _ => return Vec::new(),
        }
    }
    path
}

fn validate_adjacency(adjacency: &[Vec<f64>]) -> Result<(), SolveError> {
    let n = adjacency.len();
    for (i, row) in adjacency.iter().enumerate() {
        if row.len() != n {
            return Err(SolveError::NonSquareMatrix {
                row: i,
                len: row.len(),
                expected: n,
            });
        }
        for (j, &weight) in row.iter().enumerate() {
            if weight.is_nan() || weight < 0.0 {
                return Err(SolveError::InvalidWeight { from: i, to: j, weight });
            }
        }
    }
    Ok(())
}
