//! TSPd Solver Library
//!
//! Heuristics for the Traveling Salesman Problem with paired deliveries
//! (TSPd): a closed tour over every node of a weighted graph, where `k`
//! designated (pickup, dropoff) pairs each earn a bonus `v` when the pickup
//! is visited before its dropoff. The objective to minimize is the tour
//! weight minus the collected bonuses.
//!
//! # Features
//!
//! - TSPLIB instance loading (symmetric and asymmetric, explicit or coordinate weights)
//! - Nearest-neighbor constructors (single and double-ended)
//! - 2-opt and swap neighborhoods with tabu-aware best-improvement local search
//! - Metaheuristics: GRASP, Ant Colony Optimization, Simulated Annealing
//! - Batch experiments with CSV logs and summary statistics
//!
//! # Example
//!
//! ```no_run
//! use tspd_solver::evaluate::Evaluator;
//! use tspd_solver::heuristics::{AcoConfig, AntColony};
//! use tspd_solver::instance::TspdInstance;
//!
//! let instance = TspdInstance::from_file("gr17.tsp").unwrap();
//! let evaluator = Evaluator::new(&instance.graph, 3, 80.0).unwrap();
//!
//! let mut colony = AntColony::new(evaluator, AcoConfig::default()).unwrap();
//! let solution = colony.find_solution().unwrap();
//!
//! println!("Solution cost: {:.2}", solution.cost);
//! ```

pub mod error;
pub mod evaluate;
pub mod experiment;
pub mod graph;
pub mod heuristics;
pub mod instance;
pub mod solution;

pub use error::{Result, TspdError};
pub use evaluate::Evaluator;
pub use graph::Graph;
pub use instance::TspdInstance;
pub use solution::Solution;
