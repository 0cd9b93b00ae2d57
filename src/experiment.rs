//! Batch experiments for the TSPd solvers.
//!
//! An [`ExperimentPlan`] (read from JSON) lists instances and, for each, the
//! parameter sets to run. Every run appends one row to a per-instance CSV log
//! under `<out_dir>/experiments_<algorithm>/<instance>/<instance>_<k>_<v>.csv`,
//! and the runner keeps an in-memory record of all results to build a summary
//! report at the end.

use crate::error::Result;
use crate::evaluate::Evaluator;
use crate::graph::Graph;
use crate::heuristics::{
    aco_then_annealing, AcoConfig, AnnealingConfig, AntColony, Grasp, GraspConfig,
};
use crate::instance::TspdInstance;
use crate::solution::{format_route, Solution};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Timestamp format of the CSV logs.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y, %H:%M:%S";

/// ACO parameters as they appear in plans and CSV logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcoParams {
    pub p: f64,
    pub pmax: f64,
    pub r: f64,
    pub n_ants: usize,
    pub n_best: usize,
    pub iter_max: usize,
    pub iter_no_improve_max: usize,
}

impl Default for AcoParams {
    fn default() -> Self {
        let config = AcoConfig::default();
        AcoParams {
            p: config.pheromone_rate,
            pmax: config.pheromone_max,
            r: config.evaporation_rate,
            n_ants: config.num_ants,
            n_best: config.num_best,
            iter_max: config.iter_max,
            iter_no_improve_max: config.iter_no_improve_max,
        }
    }
}

impl AcoParams {
    pub fn config(&self, seed: u64) -> AcoConfig {
        AcoConfig {
            pheromone_rate: self.p,
            pheromone_max: self.pmax,
            evaporation_rate: self.r,
            num_ants: self.n_ants,
            num_best: self.n_best,
            iter_max: self.iter_max,
            iter_no_improve_max: self.iter_no_improve_max,
            seed,
            ..AcoConfig::default()
        }
    }

    fn values(&self) -> Vec<String> {
        vec![
            self.p.to_string(),
            self.pmax.to_string(),
            self.r.to_string(),
            self.n_ants.to_string(),
            self.n_best.to_string(),
            self.iter_max.to_string(),
            self.iter_no_improve_max.to_string(),
        ]
    }
}

/// Simulated Annealing parameters as they appear in plans and CSV logs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnealingParams {
    pub t_max: f64,
    pub t_min: f64,
    pub c: f64,
}

impl Default for AnnealingParams {
    fn default() -> Self {
        let config = AnnealingConfig::default();
        AnnealingParams {
            t_max: config.t_max,
            t_min: config.t_min,
            c: config.cooling_rate,
        }
    }
}

impl AnnealingParams {
    pub fn config(&self, seed: u64) -> AnnealingConfig {
        AnnealingConfig {
            t_max: self.t_max,
            t_min: self.t_min,
            cooling_rate: self.c,
            seed,
            ..AnnealingConfig::default()
        }
    }
}

/// One parameter set of a plan, tagged by algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum RunSpec {
    Grasp {
        k: usize,
        v: f64,
        iter_max: usize,
        a: f64,
    },
    Aco {
        k: usize,
        v: f64,
        #[serde(default)]
        aco: AcoParams,
    },
    AcoSa {
        k: usize,
        v: f64,
        #[serde(default)]
        aco: AcoParams,
        #[serde(default)]
        sa: AnnealingParams,
    },
}

impl RunSpec {
    pub fn k(&self) -> usize {
        match *self {
            RunSpec::Grasp { k, .. } | RunSpec::Aco { k, .. } | RunSpec::AcoSa { k, .. } => k,
        }
    }

    pub fn v(&self) -> f64 {
        match *self {
            RunSpec::Grasp { v, .. } | RunSpec::Aco { v, .. } | RunSpec::AcoSa { v, .. } => v,
        }
    }

    /// Short algorithm tag, also used in directory names.
    pub fn algorithm(&self) -> &'static str {
        match self {
            RunSpec::Grasp { .. } => "grasp",
            RunSpec::Aco { .. } => "aco",
            RunSpec::AcoSa { .. } => "aco_sa",
        }
    }

    /// CSV header for this algorithm's log files.
    pub fn header(&self) -> Vec<&'static str> {
        let mut header = vec!["instance", "k", "v"];
        match self {
            RunSpec::Grasp { .. } => header.extend(["iterMax", "a"]),
            RunSpec::Aco { .. } | RunSpec::AcoSa { .. } => header.extend([
                "p",
                "pmax",
                "r",
                "nAnts",
                "nBest",
                "iterMax",
                "iterNoImproveMax",
            ]),
        }
        if let RunSpec::AcoSa { .. } = self {
            header.extend(["Tmax", "Tmin", "c"]);
        }
        header.extend(["solution", "cost", "exec_time", "timestamp"]);
        header
    }

    /// Parameter values in header order, starting with `k` and `v`.
    pub fn parameters(&self) -> Vec<String> {
        let mut values = vec![self.k().to_string(), self.v().to_string()];
        match self {
            RunSpec::Grasp { iter_max, a, .. } => {
                values.push(iter_max.to_string());
                values.push(a.to_string());
            }
            RunSpec::Aco { aco, .. } => values.extend(aco.values()),
            RunSpec::AcoSa { aco, sa, .. } => {
                values.extend(aco.values());
                values.push(sa.t_max.to_string());
                values.push(sa.t_min.to_string());
                values.push(sa.c.to_string());
            }
        }
        values
    }

    /// Run the algorithm once on `graph`.
    pub fn execute(&self, graph: &Graph, seed: u64) -> Result<Solution> {
        let evaluator = Evaluator::new(graph, self.k(), self.v())?;
        match self {
            RunSpec::Grasp { iter_max, a, .. } => {
                let config = GraspConfig {
                    alpha: *a,
                    iter_max: *iter_max,
                    seed,
                    ..GraspConfig::default()
                };
                Grasp::new(evaluator, config)?.find_solution()
            }
            RunSpec::Aco { aco, .. } => AntColony::new(evaluator, aco.config(seed))?.find_solution(),
            RunSpec::AcoSa { aco, sa, .. } => {
                aco_then_annealing(&evaluator, aco.config(seed), sa.config(seed))
            }
        }
    }
}

/// Runs to perform on one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstancePlan {
    /// Instance name; loaded from `<data_dir>/<name>.tsp`
    pub name: String,
    pub runs: Vec<RunSpec>,
}

fn default_repeat() -> usize {
    10
}

/// A batch of experiments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentPlan {
    /// Directory holding the `.tsp` files
    pub data_dir: PathBuf,
    /// Repetitions of every run
    #[serde(default = "default_repeat")]
    pub repeat: usize,
    pub instances: Vec<InstancePlan>,
}

impl ExperimentPlan {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

/// Which runs to execute depending on their delivery count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryFilter {
    #[default]
    All,
    /// Only runs with `k = 0`
    NoDelivery,
    /// Only runs with `k > 0`
    OnlyDelivery,
}

impl DeliveryFilter {
    pub fn accepts(self, spec: &RunSpec) -> bool {
        match self {
            DeliveryFilter::All => true,
            DeliveryFilter::NoDelivery => spec.k() == 0,
            DeliveryFilter::OnlyDelivery => spec.k() > 0,
        }
    }
}

/// Experiment runner configuration
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    /// Root of the CSV logs
    pub out_dir: PathBuf,
    /// Overrides the plan's repetition count
    pub repeat: Option<usize>,
    pub filter: DeliveryFilter,
    /// Seed of the first repetition; repetition `r` uses `seed + r` (wrapping)
    pub seed: u64,
    /// Draw a progress bar on the terminal
    pub show_progress: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            out_dir: PathBuf::from("."),
            repeat: None,
            filter: DeliveryFilter::All,
            seed: 42,
            show_progress: true,
        }
    }
}

/// Result of a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub instance: String,
    pub algorithm: String,
    pub k: usize,
    pub v: f64,
    pub seed: u64,
    pub solution: String,
    pub cost: f64,
    pub exec_time: f64,
}

/// Aggregated statistics for one (instance, algorithm, k, v) group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub instance: String,
    pub algorithm: String,
    pub k: usize,
    pub v: f64,
    pub runs: usize,
    pub mean_cost: f64,
    pub std_cost: f64,
    pub min_cost: f64,
    pub max_cost: f64,
    pub mean_time: f64,
}

/// Experiment engine
pub struct Experiment {
    config: ExperimentConfig,
    records: Vec<RunRecord>,
    failures: usize,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Self {
        Experiment {
            config,
            records: Vec::new(),
            failures: 0,
        }
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    /// Number of runs that returned an error.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// CSV log for `spec` on `instance`, created with its header if absent.
    pub fn data_file(&self, instance: &str, spec: &RunSpec) -> Result<PathBuf> {
        let dir = self
            .config
            .out_dir
            .join(format!("experiments_{}", spec.algorithm()))
            .join(instance);
        fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}_{}_{}.csv", instance, spec.k(), spec.v()));
        if !path.is_file() {
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(spec.header())?;
            writer.flush()?;
        }
        Ok(path)
    }

    fn append_row(&self, path: &Path, instance: &str, spec: &RunSpec, record: &RunRecord) -> Result<()> {
        let file = OpenOptions::new().append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        let mut row = vec![instance.to_string()];
        row.extend(spec.parameters());
        row.push(record.solution.clone());
        row.push(record.cost.to_string());
        row.push(record.exec_time.to_string());
        row.push(chrono::Local::now().format(TIMESTAMP_FORMAT).to_string());

        writer.write_record(&row)?;
        writer.flush()?;
        Ok(())
    }

    /// Execute every accepted run of `plan`, logging rows as they complete.
    ///
    /// Instance loading and CSV errors abort the batch; a failing run is
    /// logged and counted but does not stop the others.
    pub fn run_plan(&mut self, plan: &ExperimentPlan) -> Result<()> {
        let repeat = self.config.repeat.unwrap_or(plan.repeat);
        let filter = self.config.filter;
        let total: usize = plan
            .instances
            .iter()
            .map(|i| i.runs.iter().filter(|s| filter.accepts(s)).count() * repeat)
            .sum();

        let progress = if self.config.show_progress {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        progress.set_style(
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        for entry in &plan.instances {
            let path = plan.data_dir.join(format!("{}.tsp", entry.name));
            let instance = TspdInstance::from_file(&path)?;
            info!("Running experiments on instance: {}", entry.name);

            for spec in entry.runs.iter().filter(|s| filter.accepts(s)) {
                let log_path = self.data_file(&entry.name, spec)?;
                progress.set_message(format!("{} {} k={}", entry.name, spec.algorithm(), spec.k()));

                for r in 0..repeat {
                    let seed = self.config.seed.wrapping_add(r as u64);
                    match spec.execute(&instance.graph, seed) {
                        Ok(solution) => {
                            let record = RunRecord {
                                instance: entry.name.clone(),
                                algorithm: spec.algorithm().to_string(),
                                k: spec.k(),
                                v: spec.v(),
                                seed,
                                solution: format_route(&solution.labelled_route(&instance.graph)),
                                cost: solution.cost,
                                exec_time: solution.computation_time,
                            };
                            self.append_row(&log_path, &entry.name, spec, &record)?;
                            info!(
                                "{} {} k={} v={} seed={}: cost {:.2} in {:.3}s",
                                record.instance, record.algorithm, record.k, record.v, seed,
                                record.cost, record.exec_time
                            );
                            self.records.push(record);
                        }
                        Err(e) => {
                            error!(
                                "{} {} k={} v={} seed={} failed: {}",
                                entry.name,
                                spec.algorithm(),
                                spec.k(),
                                spec.v(),
                                seed,
                                e
                            );
                            self.failures += 1;
                        }
                    }
                    progress.inc(1);
                }
            }
        }

        progress.finish_with_message("done");
        Ok(())
    }

    /// Statistics per (instance, algorithm, k, v), in a stable order.
    pub fn summarize(&self) -> Vec<RunSummary> {
        let mut groups: BTreeMap<(String, String, usize, String), Vec<&RunRecord>> = BTreeMap::new();
        for record in &self.records {
            groups
                .entry((
                    record.instance.clone(),
                    record.algorithm.clone(),
                    record.k,
                    record.v.to_string(),
                ))
                .or_default()
                .push(record);
        }

        groups
            .into_values()
            .map(|runs| {
                let costs: Vec<f64> = runs.iter().map(|r| r.cost).collect();
                let times: Vec<f64> = runs.iter().map(|r| r.exec_time).collect();
                let std_cost = if costs.len() > 1 {
                    Statistics::std_dev(&costs)
                } else {
                    0.0
                };

                RunSummary {
                    instance: runs[0].instance.clone(),
                    algorithm: runs[0].algorithm.clone(),
                    k: runs[0].k,
                    v: runs[0].v,
                    runs: runs.len(),
                    mean_cost: Statistics::mean(&costs),
                    std_cost,
                    min_cost: Statistics::min(&costs),
                    max_cost: Statistics::max(&costs),
                    mean_time: Statistics::mean(&times),
                }
            })
            .collect()
    }

    /// Export the summary to CSV
    pub fn export_summary_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for summary in self.summarize() {
            writer.serialize(summary)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("        TSPd Experiment Report\n");
        report.push_str("========================================\n\n");

        report.push_str(&format!(
            "{:<14} {:<8} {:>4} {:>8} {:>5} {:>12} {:>10} {:>12} {:>12} {:>10}\n",
            "Instance", "Algo", "k", "v", "Runs", "Mean Cost", "Std", "Min", "Max", "Mean Time"
        ));
        report.push_str("-".repeat(102).as_str());
        report.push('\n');

        for s in self.summarize() {
            report.push_str(&format!(
                "{:<14} {:<8} {:>4} {:>8} {:>5} {:>12.2} {:>10.2} {:>12.2} {:>12.2} {:>10.4}\n",
                s.instance,
                s.algorithm,
                s.k,
                s.v,
                s.runs,
                s.mean_cost,
                s.std_cost,
                s.min_cost,
                s.max_cost,
                s.mean_time
            ));
        }

        if self.failures > 0 {
            report.push_str(&format!("\n{} run(s) failed, see the log for details\n", self.failures));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = "NAME: square
TYPE: TSP
DIMENSION: 6
EDGE_WEIGHT_TYPE: EUC_2D
NODE_COORD_SECTION
1 0 0
2 10 0
3 20 0
4 20 10
5 10 10
6 0 10
EOF
";

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tspd_experiment_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn plan(data_dir: PathBuf) -> ExperimentPlan {
        serde_json::from_str::<ExperimentPlan>(&format!(
            r#"{{
                "data_dir": {:?},
                "repeat": 2,
                "instances": [{{
                    "name": "square",
                    "runs": [
                        {{ "algorithm": "grasp", "k": 0, "v": 0, "iter_max": 5, "a": 0.5 }},
                        {{ "algorithm": "aco", "k": 1, "v": 3,
                           "aco": {{ "p": 0.2, "pmax": 0.8, "r": 0.2, "n_ants": 4, "n_best": 2,
                                     "iter_max": 5, "iter_no_improve_max": 2 }} }},
                        {{ "algorithm": "aco_sa", "k": 0, "v": 0 }}
                    ]
                }}]
            }}"#,
            data_dir
        ))
        .unwrap()
    }

    #[test]
    fn test_headers() {
        let grasp = RunSpec::Grasp { k: 0, v: 0.0, iter_max: 10, a: 0.2 };
        assert_eq!(
            grasp.header().join(","),
            "instance,k,v,iterMax,a,solution,cost,exec_time,timestamp"
        );
        assert_eq!(grasp.parameters(), vec!["0", "0", "10", "0.2"]);

        let aco = RunSpec::Aco { k: 3, v: 80.0, aco: AcoParams::default() };
        assert_eq!(
            aco.header().join(","),
            "instance,k,v,p,pmax,r,nAnts,nBest,iterMax,iterNoImproveMax,solution,cost,exec_time,timestamp"
        );
        assert_eq!(aco.parameters()[..3], ["3", "80", "0.3"]);

        let chained = RunSpec::AcoSa {
            k: 0,
            v: 0.0,
            aco: AcoParams::default(),
            sa: AnnealingParams::default(),
        };
        assert!(chained
            .header()
            .join(",")
            .contains("iterNoImproveMax,Tmax,Tmin,c,solution"));
        assert_eq!(chained.parameters().len(), 12);
    }

    #[test]
    fn test_delivery_filter() {
        let plain = RunSpec::Grasp { k: 0, v: 0.0, iter_max: 1, a: 0.2 };
        let delivery = RunSpec::Grasp { k: 2, v: 5.0, iter_max: 1, a: 0.2 };

        assert!(DeliveryFilter::All.accepts(&plain));
        assert!(DeliveryFilter::NoDelivery.accepts(&plain));
        assert!(!DeliveryFilter::NoDelivery.accepts(&delivery));
        assert!(DeliveryFilter::OnlyDelivery.accepts(&delivery));
        assert!(!DeliveryFilter::OnlyDelivery.accepts(&plain));
    }

    #[test]
    fn test_run_plan_writes_logs() {
        let dir = scratch_dir("plan");
        fs::write(dir.join("square.tsp"), SQUARE).unwrap();
        let out_dir = dir.join("out");

        let mut experiment = Experiment::new(ExperimentConfig {
            out_dir: out_dir.clone(),
            show_progress: false,
            ..ExperimentConfig::default()
        });
        experiment.run_plan(&plan(dir.clone())).unwrap();

        assert_eq!(experiment.failures(), 0);
        assert_eq!(experiment.records().len(), 6);

        let grasp_log = out_dir.join("experiments_grasp/square/square_0_0.csv");
        let content = fs::read_to_string(&grasp_log).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "instance,k,v,iterMax,a,solution,cost,exec_time,timestamp");
        assert!(lines[1].starts_with("square,0,0,5,0.5,\"[") || lines[1].starts_with("square,0,0,5,0.5,["));
        assert!(out_dir.join("experiments_aco/square/square_1_3.csv").is_file());
        assert!(out_dir.join("experiments_aco_sa/square/square_0_0.csv").is_file());

        let summary = experiment.summarize();
        assert_eq!(summary.len(), 3);
        for s in &summary {
            assert_eq!(s.runs, 2);
            assert!(s.min_cost <= s.mean_cost && s.mean_cost <= s.max_cost);
        }
        assert!(experiment.generate_report().contains("square"));

        // a second batch appends below the existing header
        experiment.run_plan(&plan(dir.clone())).unwrap();
        let content = fs::read_to_string(&grasp_log).unwrap();
        assert_eq!(content.lines().count(), 5);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_seed_wraps_around() {
        let dir = scratch_dir("seed");
        fs::write(dir.join("square.tsp"), SQUARE).unwrap();

        let mut experiment = Experiment::new(ExperimentConfig {
            out_dir: dir.join("out"),
            filter: DeliveryFilter::OnlyDelivery,
            seed: u64::MAX,
            show_progress: false,
            ..ExperimentConfig::default()
        });
        experiment.run_plan(&plan(dir.clone())).unwrap();

        let seeds: Vec<u64> = experiment.records().iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![u64::MAX, 0]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_filter_skips_runs() {
        let dir = scratch_dir("filter");
        fs::write(dir.join("square.tsp"), SQUARE).unwrap();

        let mut experiment = Experiment::new(ExperimentConfig {
            out_dir: dir.join("out"),
            repeat: Some(1),
            filter: DeliveryFilter::OnlyDelivery,
            show_progress: false,
            ..ExperimentConfig::default()
        });
        experiment.run_plan(&plan(dir.clone())).unwrap();

        assert_eq!(experiment.records().len(), 1);
        assert_eq!(experiment.records()[0].algorithm, "aco");
        assert!(!dir.join("out/experiments_grasp").exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
