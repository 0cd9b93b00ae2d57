//! TSPd Solver - Command Line Interface
//!
//! Runs the TSPd heuristics on a TSPLIB instance, either one algorithm at a
//! time or as a batch experiment described by a JSON plan.

use clap::{Args, Parser, Subcommand, ValueEnum};
use tspd_solver::error::{Result, TspdError};
use tspd_solver::evaluate::Evaluator;
use tspd_solver::experiment::{
    AcoParams, AnnealingParams, DeliveryFilter, Experiment, ExperimentConfig, ExperimentPlan,
    RunSpec,
};
use tspd_solver::heuristics::construction::*;
use tspd_solver::heuristics::{AnnealingConfig, LocalSearch, SimulatedAnnealing};
use tspd_solver::instance::TspdInstance;
use tspd_solver::solution::{format_route, Solution};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "tspd-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Metaheuristic solver for the TSP with paired deliveries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Arguments shared by every single-instance command
#[derive(Args)]
struct CommonArgs {
    /// TSPLIB instance file
    #[arg(short, long)]
    file: PathBuf,

    /// Number of delivery pairs
    #[arg(short, default_value = "0")]
    k: usize,

    /// Value of a completed delivery
    #[arg(short, default_value = "0")]
    v: f64,

    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Print only the parameter line and `route cost time`
    #[arg(short, long)]
    exec_data: bool,

    /// Save the solution as JSON
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct AcoArgs {
    /// Maximum number of iterations
    #[arg(short = 'i', long, default_value = "100")]
    iter_max: usize,

    /// Iterations without improvement before stopping
    #[arg(short = 'n', long, default_value = "10")]
    iter_no_improve_max: usize,

    /// Pheromone rate (exponent on the trail)
    #[arg(short = 'p', long, default_value = "0.3")]
    pheromone_rate: f64,

    /// Upper bound of the pheromone rate
    #[arg(short = 'm', long, default_value = "0.8")]
    pheromone_max: f64,

    /// Evaporation rate
    #[arg(short = 'r', long, default_value = "0.02")]
    evaporation_rate: f64,

    /// Ants per iteration
    #[arg(short = 'a', long, default_value = "20")]
    ants: usize,

    /// Ants that deposit pheromone
    #[arg(short = 'b', long, default_value = "5")]
    best: usize,
}

impl AcoArgs {
    fn params(&self) -> AcoParams {
        AcoParams {
            p: self.pheromone_rate,
            pmax: self.pheromone_max,
            r: self.evaporation_rate,
            n_ants: self.ants,
            n_best: self.best,
            iter_max: self.iter_max,
            iter_no_improve_max: self.iter_no_improve_max,
        }
    }
}

#[derive(Args)]
struct AnnealingArgs {
    /// Initial temperature
    #[arg(long, default_value = "0.8")]
    t_max: f64,

    /// Final temperature
    #[arg(long, default_value = "0.2")]
    t_min: f64,

    /// Cooling rate
    #[arg(short = 'c', long, default_value = "0.01")]
    cooling_rate: f64,
}

impl AnnealingArgs {
    fn params(&self) -> AnnealingParams {
        AnnealingParams {
            t_max: self.t_max,
            t_min: self.t_min,
            c: self.cooling_rate,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Score a route (natural node order by default)
    Evaluate {
        #[command(flatten)]
        common: CommonArgs,

        /// Comma-separated node labels, e.g. 1,3,2
        #[arg(short, long, value_delimiter = ',')]
        solution: Vec<usize>,
    },

    /// Build a nearest-neighbor route
    Nn {
        #[command(flatten)]
        common: CommonArgs,

        /// Constructor variant
        #[arg(long, value_enum, default_value = "single")]
        variant: Variant,

        /// Label of the start node (first node of the file by default)
        #[arg(long)]
        start: Option<usize>,

        /// Refine the route with 2-opt local search
        #[arg(long)]
        local_search: bool,
    },

    /// GRASP with tabu-guided local search
    Grasp {
        #[command(flatten)]
        common: CommonArgs,

        /// Number of iterations
        #[arg(short = 'i', long, default_value = "100")]
        iter_max: usize,

        /// RCL fraction in (0, 1]
        #[arg(short = 'a', long, default_value = "0.2")]
        alpha: f64,
    },

    /// Ant Colony Optimization
    Aco {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        aco: AcoArgs,
    },

    /// Simulated Annealing from a double-ended nearest-neighbor route
    Sa {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        annealing: AnnealingArgs,
    },

    /// ACO followed by Simulated Annealing on its best route
    AcoSa {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        aco: AcoArgs,

        #[command(flatten)]
        annealing: AnnealingArgs,
    },

    /// Run a batch of experiments described by a JSON plan
    Experiment {
        /// Plan file
        #[arg(short, long)]
        plan: PathBuf,

        /// Root directory of the CSV logs
        #[arg(short, long, default_value = "results")]
        out_dir: PathBuf,

        /// Override the plan's repetition count
        #[arg(short, long)]
        repeat: Option<usize>,

        /// Only run parameter sets without deliveries (k = 0)
        #[arg(long, conflicts_with = "only_delivery")]
        no_delivery: bool,

        /// Only run parameter sets with deliveries (k > 0)
        #[arg(long)]
        only_delivery: bool,

        /// Seed of the first repetition
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Write the per-configuration summary to this CSV file
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },

    /// Print instance statistics
    Analyze {
        /// TSPLIB instance file
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    /// Extend the route at its tail only
    Single,
    /// Extend the route at whichever end is cheaper
    Double,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Evaluate { common, solution } => evaluate_route(&common, &solution),
        Commands::Nn {
            common,
            variant,
            start,
            local_search,
        } => run_nearest_neighbor(&common, variant, start, local_search),
        Commands::Grasp {
            common,
            iter_max,
            alpha,
        } => {
            let spec = RunSpec::Grasp {
                k: common.k,
                v: common.v,
                iter_max,
                a: alpha,
            };
            run_spec(&common, &spec)
        }
        Commands::Aco { common, aco } => {
            let spec = RunSpec::Aco {
                k: common.k,
                v: common.v,
                aco: aco.params(),
            };
            run_spec(&common, &spec)
        }
        Commands::Sa { common, annealing } => run_annealing(&common, &annealing),
        Commands::AcoSa {
            common,
            aco,
            annealing,
        } => {
            let spec = RunSpec::AcoSa {
                k: common.k,
                v: common.v,
                aco: aco.params(),
                sa: annealing.params(),
            };
            run_spec(&common, &spec)
        }
        Commands::Experiment {
            plan,
            out_dir,
            repeat,
            no_delivery,
            only_delivery,
            seed,
            summary,
            quiet,
        } => {
            let filter = if no_delivery {
                DeliveryFilter::NoDelivery
            } else if only_delivery {
                DeliveryFilter::OnlyDelivery
            } else {
                DeliveryFilter::All
            };
            let config = ExperimentConfig {
                out_dir,
                repeat,
                filter,
                seed,
                show_progress: !quiet,
            };
            run_experiment(&plan, config, summary)
        }
        Commands::Analyze { file } => analyze_instance(&file),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_instance(path: &PathBuf) -> Result<TspdInstance> {
    let instance = TspdInstance::from_file(path)?;
    log::info!(
        "Loaded {} ({} nodes, {})",
        instance.name,
        instance.dimension(),
        if instance.graph.is_directed() { "directed" } else { "symmetric" }
    );
    Ok(instance)
}

/// Map node labels of the input file to internal indices.
fn resolve_labels(instance: &TspdInstance, labels: &[usize]) -> Result<Vec<usize>> {
    labels
        .iter()
        .map(|&label| {
            instance
                .graph
                .index_of(label)
                .ok_or_else(|| TspdError::InvalidRoute(format!("unknown node label {}", label)))
        })
        .collect()
}

/// Print a solution, either as the two exec-data lines or as a summary, and
/// save it when `--output` is set.
fn report(
    common: &CommonArgs,
    instance: &TspdInstance,
    solution: &Solution,
    echo: &[String],
    elapsed: f64,
) -> Result<()> {
    let route = solution.labelled_route(&instance.graph);

    if common.exec_data {
        println!("{}", echo.join(" "));
        println!("{} {} {}", format_route(&route), solution.cost, elapsed);
    } else {
        println!("\n========== Results ==========");
        println!("Instance: {} (n={})", instance.name, instance.dimension());
        println!("Algorithm: {}", solution.algorithm);
        println!("Deliveries: k={} v={}", common.k, common.v);
        println!("Cost: {:.2}", solution.cost);
        println!("Time: {:.4}s", elapsed);
        if let Some(iter) = solution.iterations {
            println!("Iterations: {}", iter);
        }
        println!("\nRoute: {}", format_route(&route));
    }

    if let Some(out_path) = &common.output {
        let json = serde_json::to_string_pretty(solution)?;
        std::fs::write(out_path, json)?;
        if !common.exec_data {
            println!("\nSolution saved to {:?}", out_path);
        }
    }
    Ok(())
}

fn base_echo(common: &CommonArgs) -> Vec<String> {
    vec![common.k.to_string(), common.v.to_string()]
}

fn evaluate_route(common: &CommonArgs, labels: &[usize]) -> Result<()> {
    let instance = load_instance(&common.file)?;
    let evaluator = Evaluator::new(&instance.graph, common.k, common.v)?;

    let route = if labels.is_empty() {
        instance.graph.nodes().collect()
    } else {
        resolve_labels(&instance, labels)?
    };

    let start = Instant::now();
    let mut solution = Solution::from_route(&evaluator, route, "Evaluate")?;
    let elapsed = start.elapsed().as_secs_f64();
    solution.computation_time = elapsed;

    report(common, &instance, &solution, &base_echo(common), elapsed)
}

fn run_nearest_neighbor(
    common: &CommonArgs,
    variant: Variant,
    start_label: Option<usize>,
    local_search: bool,
) -> Result<()> {
    let instance = load_instance(&common.file)?;
    let evaluator = Evaluator::new(&instance.graph, common.k, common.v)?;

    let start_node = match start_label {
        Some(label) => resolve_labels(&instance, &[label])?[0],
        None => 0,
    };

    let start = Instant::now();
    let mut solution = match variant {
        Variant::Single => NearestNeighborHeuristic::from_node(start_node).construct(&evaluator)?,
        Variant::Double => {
            DoubleEndedNearestNeighbor::from_node(start_node, common.seed).construct(&evaluator)?
        }
    };

    if local_search {
        let mut rng = ChaCha8Rng::seed_from_u64(common.seed);
        let improved = LocalSearch::default().improve(&evaluator, &mut solution, &mut rng)?;
        log::debug!("Local search improved the route: {}", improved);
        solution.algorithm = format!("{}+LS", solution.algorithm);
    }
    let elapsed = start.elapsed().as_secs_f64();
    solution.computation_time = elapsed;

    let mut echo = base_echo(common);
    echo.push(instance.graph.label(start_node).to_string());
    report(common, &instance, &solution, &echo, elapsed)
}

fn run_annealing(common: &CommonArgs, args: &AnnealingArgs) -> Result<()> {
    let instance = load_instance(&common.file)?;
    let evaluator = Evaluator::new(&instance.graph, common.k, common.v)?;
    let config = AnnealingConfig {
        t_max: args.t_max,
        t_min: args.t_min,
        cooling_rate: args.cooling_rate,
        seed: common.seed,
        ..AnnealingConfig::default()
    };

    let start = Instant::now();
    let solution = SimulatedAnnealing::new(evaluator, config)?.find_solution()?;
    let elapsed = start.elapsed().as_secs_f64();

    let mut echo = base_echo(common);
    echo.extend([args.t_max, args.t_min, args.cooling_rate].iter().map(|x| x.to_string()));
    report(common, &instance, &solution, &echo, elapsed)
}

fn run_spec(common: &CommonArgs, spec: &RunSpec) -> Result<()> {
    let instance = load_instance(&common.file)?;

    let start = Instant::now();
    let solution = spec.execute(&instance.graph, common.seed)?;
    let elapsed = start.elapsed().as_secs_f64();

    report(common, &instance, &solution, &spec.parameters(), elapsed)
}

fn run_experiment(plan_path: &PathBuf, config: ExperimentConfig, summary: Option<PathBuf>) -> Result<()> {
    println!("Loading plan from {:?}...", plan_path);
    let plan = ExperimentPlan::from_file(plan_path)?;
    println!(
        "Found {} instances, {} repetitions per run",
        plan.instances.len(),
        config.repeat.unwrap_or(plan.repeat)
    );

    std::fs::create_dir_all(&config.out_dir)?;
    let out_dir = config.out_dir.clone();

    let mut experiment = Experiment::new(config);
    experiment.run_plan(&plan)?;
    println!("\nLogs written under {:?}", out_dir);

    if let Some(path) = summary {
        experiment.export_summary_csv(&path)?;
        println!("Summary exported to {:?}", path);
    }

    println!("\n{}", experiment.generate_report());

    if experiment.failures() > 0 {
        eprintln!("{} run(s) failed, see the log for details", experiment.failures());
    }
    Ok(())
}

fn analyze_instance(path: &PathBuf) -> Result<()> {
    let instance = load_instance(path)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());
    if !instance.comment.is_empty() {
        println!("Comment: {}", instance.comment);
    }

    let graph = &instance.graph;
    let max_k = graph.len().saturating_sub(1) / 2;
    println!("Maximum number of delivery pairs: {}", max_k);

    let evaluator = Evaluator::new(graph, 0, 0.0)?;
    println!("\nQuick Solution Estimates:");
    println!("  Natural order: {:.2}", evaluator.cost(&[])?);
    match NearestNeighborHeuristic::new().construct(&evaluator) {
        Ok(nn) => println!("  Nearest Neighbor: {:.2}", nn.cost),
        Err(e) => println!("  Nearest Neighbor: unavailable ({})", e),
    }
    Ok(())
}
