//! Error types shared by the solver components.

use crate::solution::Termination;
use thiserror::Error;

/// Errors reported by the solver.
///
/// Malformed input is rejected before any work is done. Infeasibility is
/// reported distinctly from a zero-distance or empty route.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("adjacency matrix is not square: row {row} has {len} entries, expected {expected}")]
    NonSquareMatrix { row: usize, len: usize, expected: usize },

    #[error("edge weight {weight} from node {from} to node {to} is negative or not a number")]
    InvalidWeight { from: usize, to: usize, weight: f64 },

    #[error("{role} node {node} is out of range for a graph with {nodes} nodes")]
    NodeOutOfRange { role: &'static str, node: usize, nodes: usize },

    #[error("vehicle capacity must be positive")]
    ZeroCapacity,

    #[error("total demand does not fit in a 32-bit counter")]
    DemandOverflow,

    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error("no recharge node reachable from node {from} leads to pending demand")]
    NoRechargeReachable { from: usize },

    #[error("pending demand cannot be reached from node {from}")]
    UnreachableDemand { from: usize },

    #[error("depot cannot be reached from node {from}")]
    DepotUnreachable { from: usize },

    #[error("no complete route delivers all demand")]
    Infeasible,

    #[error("search stopped ({termination:?}) before finding a complete route")]
    NoRouteBeforeStop { termination: Termination },
}

/// Errors reported while reading an instance file.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("failed to read instance file {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value {value:?} for header {key} on line {line}")]
    InvalidHeader { key: &'static str, value: String, line: usize },

    #[error("missing required header {0}")]
    MissingHeader(&'static str),
}
