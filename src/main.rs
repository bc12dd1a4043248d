//! Hub Route Solver - Command Line Interface
//!
//! Loads an instance file, solves it and prints or saves the best route.

use clap::{Parser, Subcommand, ValueEnum};
use hub_route_solver::benchmark::{load_instances_from_dir, Benchmark, BenchmarkConfig};
use hub_route_solver::greedy::{ConstructionHeuristic, GreedyConstructor};
use hub_route_solver::instance::Instance;
use hub_route_solver::paths::ShortestPaths;
use hub_route_solver::problem::Context;
use hub_route_solver::search::LowerBound;
use hub_route_solver::solver::{PlateauPolicy, Solver, SolverConfig};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hub-route-solver")]
#[command(version = "1.0")]
#[command(about = "Single-vehicle delivery routing with reloads at a depot and hubs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance
    Solve {
        #[arg(short, long)]
        instance: PathBuf,

        /// JSON solver configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Explore the whole search tree
        #[arg(long, conflicts_with = "plateau")]
        exact: bool,

        /// Stop after this many calls without improvement
        #[arg(long)]
        plateau: Option<u64>,

        /// Lower bound used for pruning
        #[arg(short, long, value_enum)]
        bound: Option<Bound>,

        /// Do not return to the depot at the end
        #[arg(long)]
        no_return: bool,

        /// Search subtrees in parallel
        #[arg(short, long)]
        parallel: bool,

        /// Time limit in seconds
        #[arg(short, long)]
        time_limit: Option<f64>,

        /// Output solution to file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,
    },

    /// Benchmark the solver on random instances or a directory of instance files
    Bench {
        /// Directory containing `.txt` instance files
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Number of random instances
        #[arg(long, default_value = "5")]
        instances: usize,

        #[arg(short, long, default_value = "10")]
        nodes: usize,

        #[arg(long, default_value = "2")]
        hubs: usize,

        #[arg(long, default_value = "8")]
        packages: usize,

        #[arg(short, long, default_value = "3")]
        capacity: u32,

        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Output CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Bound {
    /// Accumulated distance only
    Distance,
    /// Distance to the nearest pending destination
    Nearest,
    /// Two nearest pending destinations (heuristic, may cut the optimum)
    TwoNearest,
    /// Minimum spanning tree of the pending destinations
    Mst,
}

impl From<Bound> for LowerBound {
    fn from(bound: Bound) -> Self {
        match bound {
            Bound::Distance => LowerBound::Distance,
            Bound::Nearest => LowerBound::NearestPending,
            Bound::TwoNearest => LowerBound::TwoNearest,
            Bound::Mst => LowerBound::SpanningTree,
        }
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Solve {
            instance,
            config,
            exact,
            plateau,
            bound,
            no_return,
            parallel,
            time_limit,
            output,
            verbose,
        } => {
            let config = match config {
                Some(path) => SolverConfig::from_file(path),
                None => Ok(SolverConfig::default()),
            };
            config.and_then(|mut config| {
                if exact {
                    config.plateau = PlateauPolicy::Exact;
                }
                if let Some(limit) = plateau {
                    config.plateau = PlateauPolicy::Fixed(limit);
                }
                if let Some(bound) = bound {
                    config.lower_bound = bound.into();
                }
                if no_return {
                    config.return_to_depot = false;
                }
                if parallel {
                    config.parallel = true;
                }
                if time_limit.is_some() {
                    config.time_limit = time_limit;
                }
                solve_instance(&instance, config, output, verbose)
            })
        }

        Commands::Analyze { instance } => analyze_instance(&instance),

        Commands::Bench { dir, instances, nodes, hubs, packages, capacity, seed, output } => {
            let config = BenchmarkConfig {
                instances,
                nodes,
                hubs,
                packages,
                capacity,
                seed,
                ..Default::default()
            };
            run_benchmark(dir, config, output)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn solve_instance(path: &Path, config: SolverConfig, output: Option<PathBuf>, verbose: bool) -> Result<(), String> {
    println!("Loading instance from {:?}...", path);
    let instance = Instance::from_file(path).map_err(|e| e.to_string())?;

    if verbose {
        println!("{}", instance.statistics());
        println!("Config: {:?}", config);
    }

    let problem = instance.problem();
    let paths = ShortestPaths::compute(&problem.adjacency).map_err(|e| e.to_string())?;
    let solver = Solver::new(config);
    let solution = solver.solve_with_paths(&problem, &paths).map_err(|e| e.to_string())?;

    println!("\n========== Results ==========");
    print!("{}", solution);

    if verbose {
        println!("\nExpanded path: {:?}", solution.expanded_route(&paths));
        println!("Load profile: {:?}", solution.load_profile().unwrap_or_default());
        println!("Max load: {}", solution.max_load());
        println!("Deliveries: {:?}", solution.delivered_per_node());
        println!("Incumbent history: {:?}", solution.history);
    }

    if let Some(out_path) = output {
        let json = serde_json::to_string_pretty(&solution).map_err(|e| e.to_string())?;
        std::fs::write(&out_path, json).map_err(|e| format!("Failed to write output: {}", e))?;
        println!("\nSolution saved to {:?}", out_path);
    }

    Ok(())
}

fn analyze_instance(path: &Path) -> Result<(), String> {
    let instance = Instance::from_file(path).map_err(|e| e.to_string())?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    let problem = instance.problem();
    problem.validate().map_err(|e| e.to_string())?;
    let paths = ShortestPaths::compute(&problem.adjacency).map_err(|e| e.to_string())?;

    let unreachable: Vec<usize> = problem
        .demand
        .keys()
        .copied()
        .filter(|&node| !paths.is_reachable(problem.depot, node))
        .collect();
    println!("Reachability:");
    if unreachable.is_empty() {
        println!("  All destinations reachable from the depot");
    } else {
        println!("  Unreachable destinations: {:?}", unreachable);
    }

    let demands: Vec<u32> = problem.demand.values().copied().collect();
    if let (Some(min), Some(max)) = (demands.iter().min(), demands.iter().max()) {
        let avg = demands.iter().sum::<u32>() as f64 / demands.len() as f64;
        println!("\nDemand Statistics:");
        println!("  Average: {:.2}", avg);
        println!("  Min: {}", min);
        println!("  Max: {}", max);
        println!("  Capacity utilization ratio: {:.2}%", avg / problem.capacity.max(1) as f64 * 100.0);
    }

    let ctx = Context::new(&problem, &paths, true).map_err(|e| e.to_string())?;
    println!("\nQuick Solution Estimate:");
    match GreedyConstructor::new().construct(&ctx) {
        Ok(seed) => println!("  Greedy: {:.2} (hubs used: {:?})", seed.distance, seed.hubs_used),
        Err(e) => println!("  Greedy failed: {}", e),
    }

    Ok(())
}

fn run_benchmark(dir: Option<PathBuf>, config: BenchmarkConfig, output: Option<PathBuf>) -> Result<(), String> {
    let mut benchmark = Benchmark::new(config);

    match dir {
        Some(dir) => {
            println!("Loading instances from {:?}...", dir);
            let instances = load_instances_from_dir(&dir);
            println!("Found {} instances", instances.len());
            if instances.is_empty() {
                return Err("No instances found!".to_string());
            }
            benchmark.run_on_instances(&instances);
        }
        None => benchmark.run_random(),
    }

    println!("\n{}", benchmark.generate_report());

    if let Some(path) = output {
        benchmark
            .export_to_csv(&path)
            .map_err(|e| format!("Failed to export results: {}", e))?;
        println!("Results exported to {:?}", path);
    }

    Ok(())
}
