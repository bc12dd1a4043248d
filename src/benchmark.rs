//! Benchmarking module.
//!
//! Runs the greedy constructor and the full solver on a set of instances,
//! records how much the search improved on the greedy seed, and exports
//! the records to CSV.

use crate::error::SolveError;
use crate::greedy::{ConstructionHeuristic, GreedyConstructor};
use crate::instance::Instance;
use crate::paths::ShortestPaths;
use crate::problem::Context;
use crate::solver::{Solver, SolverConfig};

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Result of solving one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    /// Instance name
    pub instance: String,
    pub nodes: usize,
    pub hubs: usize,
    /// Total units to deliver
    pub demand: u32,
    pub capacity: u32,
    /// Greedy seed distance, empty if the greedy failed
    pub greedy_distance: Option<f64>,
    /// Best distance found, empty if the instance is infeasible
    pub best_distance: Option<f64>,
    /// How much longer the greedy route is than the best, in percent
    pub gap_percent: Option<f64>,
    /// Search calls made
    pub calls: u64,
    pub termination: String,
    pub proven_optimal: bool,
    /// Computation time in seconds
    pub time: f64,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub solver: SolverConfig,
    /// Number of random instances
    pub instances: usize,
    pub nodes: usize,
    pub hubs: usize,
    pub packages: usize,
    pub capacity: u32,
    /// Seed of the first random instance; instance `i` uses `seed + i`
    pub seed: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            solver: SolverConfig::default(),
            instances: 5,
            nodes: 10,
            hubs: 2,
            packages: 8,
            capacity: 3,
            seed: 42,
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    records: Vec<BenchmarkRecord>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark { config, records: Vec::new() }
    }

    /// Generate and solve the configured random instances
    pub fn run_random(&mut self) {
        let instances: Vec<Instance> = (0..self.config.instances as u64)
            .map(|i| {
                Instance::random(
                    self.config.nodes,
                    self.config.hubs,
                    self.config.packages,
                    self.config.capacity,
                    self.config.seed + i,
                )
            })
            .collect();
        self.run_on_instances(&instances);
    }

    /// Run benchmark on multiple instances
    pub fn run_on_instances(&mut self, instances: &[Instance]) {
        for instance in instances {
            let record = self.run_instance(instance);
            self.records.push(record);
        }
    }

    /// Solve one instance and record the outcome
    pub fn run_instance(&self, instance: &Instance) -> BenchmarkRecord {
        log::info!("Running benchmark on instance: {}", instance.name);

        let problem = instance.problem();
        let stats = instance.statistics();
        let mut record = BenchmarkRecord {
            instance: instance.name.clone(),
            nodes: instance.node_count,
            hubs: instance.hubs.len(),
            demand: stats.total_demand,
            capacity: instance.capacity,
            greedy_distance: None,
            best_distance: None,
            gap_percent: None,
            calls: 0,
            termination: "Failed".to_string(),
            proven_optimal: false,
            time: 0.0,
        };

        let paths = match ShortestPaths::compute(&problem.adjacency) {
            Ok(paths) => paths,
            Err(e) => {
                log::error!("{}: {}", instance.name, e);
                return record;
            }
        };

        record.greedy_distance = Context::new(&problem, &paths, self.config.solver.return_to_depot)
            .and_then(|ctx| GreedyConstructor::new().construct(&ctx))
            .map(|seed| seed.distance)
            .ok();

        match Solver::new(self.config.solver.clone()).solve_with_paths(&problem, &paths) {
            Ok(solution) => {
                record.best_distance = Some(solution.distance);
                record.gap_percent = record.greedy_distance.map(|greedy| {
                    if solution.distance > 0.0 {
                        (greedy - solution.distance) / solution.distance * 100.0
                    } else {
                        0.0
                    }
                });
                record.calls = solution.calls;
                record.termination = format!("{:?}", solution.termination);
                record.proven_optimal = solution.is_proven_optimal();
                record.time = solution.computation_time;
            }
            Err(e) => {
                log::warn!("{}: {}", instance.name, e);
                record.termination = match e {
                    SolveError::NoRouteBeforeStop { termination } => format!("{:?}", termination),
                    _ => "Infeasible".to_string(),
                };
            }
        }

        record
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> csv::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for record in &self.records {
            writer.serialize(record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("       Hub Routing Benchmark Report\n");
        report.push_str("========================================\n\n");

        report.push_str(&format!(
            "{:<22} {:>6} {:>7} {:>10} {:>10} {:>8} {:>12} {:>16} {:>9}\n",
            "Instance", "Nodes", "Demand", "Greedy", "Best", "Gap%", "Calls", "Termination", "Time"
        ));
        report.push_str("-".repeat(108).as_str());
        report.push('\n');

        let fmt = |value: Option<f64>| value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());
        for r in &self.records {
            report.push_str(&format!(
                "{:<22} {:>6} {:>7} {:>10} {:>10} {:>8} {:>12} {:>16} {:>9.4}\n",
                r.instance,
                r.nodes,
                r.demand,
                fmt(r.greedy_distance),
                fmt(r.best_distance),
                fmt(r.gap_percent),
                r.calls,
                r.termination,
                r.time
            ));
        }
        report.push_str("-".repeat(108).as_str());
        report.push('\n');

        let solved = self.records.iter().filter(|r| r.best_distance.is_some()).count();
        let optimal = self.records.iter().filter(|r| r.proven_optimal).count();
        let gaps: Vec<f64> = self.records.iter().filter_map(|r| r.gap_percent).collect();
        report.push_str(&format!("Solved: {}/{} (proven optimal: {})\n", solved, self.records.len(), optimal));
        if !gaps.is_empty() {
            report.push_str(&format!(
                "Average greedy gap: {:.2}%\n",
                gaps.iter().sum::<f64>() / gaps.len() as f64
            ));
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[BenchmarkRecord] {
        &self.records
    }
}

/// Load every `.txt` instance in a directory, skipping files that fail to parse
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Vec<Instance> {
    let mut instances = Vec::new();

    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|e| e == "txt").unwrap_or(false) {
                match Instance::from_file(&path) {
                    Ok(instance) => instances.push(instance),
                    Err(e) => log::warn!("skipping {}: {}", path.display(), e),
                }
            }
        }
    }

    instances.sort_by_key(|i| i.node_count);

    instances
}
