//! Hub Route Solver Library
//!
//! Routes a single capacity-limited vehicle that starts at a depot and must
//! deliver a number of units to destination nodes of a weighted graph. The
//! vehicle reloads for free at the depot or at any hub.
//!
//! # Features
//!
//! - All-pairs shortest paths with path reconstruction (Floyd-Warshall)
//! - Greedy constructor with look-ahead reload choice
//! - Anytime branch-and-bound with pluggable lower bounds, plateau stop,
//!   cancellation, time limit and an optional parallel mode
//! - Instance loader, random instances and benchmarking tools
//!
//! # Example
//!
//! ```no_run
//! use hub_route_solver::instance::Instance;
//! use hub_route_solver::solver::{Solver, SolverConfig};
//!
//! let instance = Instance::from_file("instance.txt").unwrap();
//! let solution = Solver::new(SolverConfig::default())
//!     .solve(&instance.problem())
//!     .unwrap();
//!
//! println!("Route: {:?} ({:.2})", solution.route, solution.distance);
//! ```

pub mod error;
pub mod loading;
pub mod paths;
pub mod problem;
pub mod solution;
pub mod greedy;
pub mod search;
pub mod solver;
pub mod instance;
pub mod benchmark;

pub use error::{InstanceError, SolveError};
pub use instance::Instance;
pub use problem::Problem;
pub use solution::Solution;
pub use solver::{solve, Solver, SolverConfig};
