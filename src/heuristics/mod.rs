//! Heuristics module for the TSPd.
//!
//! This module exports the constructors, the neighborhood and local search
//! machinery, and the three metaheuristics built on top of them.

pub mod aco;
pub mod annealing;
pub mod construction;
pub mod grasp;
pub mod local_search;
pub mod neighborhood;
pub mod tabu;

pub use aco::*;
pub use annealing::*;
pub use construction::*;
pub use grasp::*;
pub use local_search::*;
pub use neighborhood::*;
pub use tabu::*;

use crate::error::Result;
use crate::evaluate::Evaluator;
use crate::solution::Solution;

/// Run ACO, then refine its best route with Simulated Annealing.
pub fn aco_then_annealing(
    evaluator: &Evaluator,
    aco: AcoConfig,
    annealing: AnnealingConfig,
) -> Result<Solution> {
    let start = std::time::Instant::now();
    let seed = AntColony::new(evaluator.clone(), aco)?.find_solution()?;
    log::debug!("ACO+SA: seed route cost {:.2}", seed.cost);

    let mut solution = SimulatedAnnealing::new(evaluator.clone(), annealing)?.run(&seed.route)?;
    solution.algorithm = "ACO+SA".to_string();
    solution.computation_time = start.elapsed().as_secs_f64();
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn assert_permutation(route: &[usize], n: usize) {
        let mut sorted = route.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn test_all_heuristics_on_uniform_five_nodes() {
        let g = Graph::complete(5, 1.0);
        let eval = Evaluator::new(&g, 0, 0.0).unwrap();

        let nn = NearestNeighborHeuristic::new().construct(&eval).unwrap();
        let grasp = Grasp::new(eval.clone(), GraspConfig::default())
            .unwrap()
            .find_solution()
            .unwrap();
        let aco = AntColony::new(eval.clone(), AcoConfig::default())
            .unwrap()
            .find_solution()
            .unwrap();

        for sol in [&nn, &grasp, &aco] {
            assert_eq!(sol.cost, 5.0, "{}", sol.algorithm);
            assert_permutation(&sol.route, 5);
        }
    }

    #[test]
    fn test_chain_on_points() {
        // two clusters of points on a line
        let xs = [0.0, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 13.0];
        let m: Vec<Vec<f64>> = xs
            .iter()
            .map(|a| xs.iter().map(|b| f64::abs(a - b)).collect())
            .collect();
        let g = Graph::from_matrix(&m, false).unwrap();
        let eval = Evaluator::new(&g, 2, 1.0).unwrap();

        let aco = AcoConfig { iter_max: 10, num_ants: 6, ..AcoConfig::default() };
        let sol = aco_then_annealing(&eval, aco, AnnealingConfig::default()).unwrap();

        assert_eq!(sol.algorithm, "ACO+SA");
        assert_permutation(&sol.route, 8);
        assert_eq!(sol.cost, eval.cost(&sol.route).unwrap());
    }
}
