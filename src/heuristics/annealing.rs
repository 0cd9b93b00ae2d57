//! Simulated Annealing over the 2-opt neighborhood.
//!
//! Each step picks a single candidate from the full neighborhood of the
//! current route and accepts it when it is cheaper, or otherwise with the
//! Metropolis probability `exp(-delta / T)`. The temperature starts at
//! `t_max` and is multiplied by `1 - cooling_rate` after every step until it
//! drops below `t_min`.
//!
//! By default the candidate is the *worst* neighbor, so the walk is driven
//! uphill and only the acceptance test pulls it back;
//! [`CandidateRule::BestNeighbor`] gives the conventional greedy pick.

use super::construction::nearest_neighbor_double;
use super::neighborhood::{neighborhood, MoveKind};
use crate::error::{check_unit_interval, Result, TspdError};
use crate::evaluate::Evaluator;
use crate::solution::Solution;
use log::{debug, info};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// How the single candidate of a step is chosen from the neighborhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateRule {
    /// Highest-cost neighbor (first one on ties)
    #[default]
    WorstNeighbor,
    /// Lowest-cost neighbor (first one on ties)
    BestNeighbor,
}

/// Simulated Annealing configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnealingConfig {
    /// Initial temperature
    pub t_max: f64,
    /// Final temperature
    pub t_min: f64,
    /// Cooling rate (c)
    pub cooling_rate: f64,
    pub candidate_rule: CandidateRule,
    /// Random seed
    pub seed: u64,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        AnnealingConfig {
            t_max: 0.8,
            t_min: 0.2,
            cooling_rate: 0.01,
            candidate_rule: CandidateRule::WorstNeighbor,
            seed: 42,
        }
    }
}

impl AnnealingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.t_min > 0.0 && self.t_min.is_finite()) {
            return Err(TspdError::config(format!("t_min must be positive, got {}", self.t_min)));
        }
        if !(self.t_max >= self.t_min && self.t_max.is_finite()) {
            return Err(TspdError::config(format!(
                "t_max {} must be at least t_min {}",
                self.t_max, self.t_min
            )));
        }
        check_unit_interval("cooling_rate", self.cooling_rate)?;
        if self.cooling_rate == 0.0 || self.cooling_rate == 1.0 {
            return Err(TspdError::config("cooling_rate must lie strictly between 0 and 1"));
        }
        Ok(())
    }
}

/// Simulated Annealing solver
pub struct SimulatedAnnealing<'a> {
    config: AnnealingConfig,
    evaluator: Evaluator<'a>,
    rng: ChaCha8Rng,
}

impl<'a> SimulatedAnnealing<'a> {
    pub fn new(evaluator: Evaluator<'a>, config: AnnealingConfig) -> Result<Self> {
        config.validate()?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(SimulatedAnnealing {
            config,
            evaluator,
            rng,
        })
    }

    pub fn config(&self) -> &AnnealingConfig {
        &self.config
    }

    fn pick(&self, neighbors: Vec<Vec<usize>>) -> Result<Option<(Vec<usize>, f64)>> {
        let mut chosen: Option<(Vec<usize>, f64)> = None;
        for candidate in neighbors {
            let cost = self.evaluator.cost(&candidate)?;
            let better = match (&chosen, self.config.candidate_rule) {
                (None, _) => true,
                (Some((_, c)), CandidateRule::WorstNeighbor) => cost > *c,
                (Some((_, c)), CandidateRule::BestNeighbor) => cost < *c,
            };
            if better {
                chosen = Some((candidate, cost));
            }
        }
        Ok(chosen)
    }

    /// Anneal from `initial` and return the route held when the schedule ends.
    pub fn run(&mut self, initial: &[usize]) -> Result<Solution> {
        let start = std::time::Instant::now();
        info!(
            "SA: t_max={} t_min={} c={} rule={:?} seed={}",
            self.config.t_max,
            self.config.t_min,
            self.config.cooling_rate,
            self.config.candidate_rule,
            self.config.seed
        );

        let graph = self.evaluator.graph();
        let mut route = initial.to_vec();
        let mut cost = self.evaluator.cost(&route)?;
        let mut temperature = self.config.t_max;
        let mut iterations = 0;

        while temperature >= self.config.t_min {
            let neighbors = neighborhood(graph, &route, MoveKind::TwoOpt, None);
            let (candidate, candidate_cost) = match self.pick(neighbors)? {
                Some(found) => found,
                None => {
                    debug!("SA: empty neighborhood, stopping at T={:.4}", temperature);
                    break;
                }
            };

            let delta = candidate_cost - cost;
            if candidate_cost < cost || self.rng.gen::<f64>() < (-delta / temperature).exp() {
                route = candidate;
                cost = candidate_cost;
            }

            temperature *= 1.0 - self.config.cooling_rate;
            iterations += 1;
        }

        let elapsed = start.elapsed().as_secs_f64();
        info!(
            "SA finished: cost {:.2} after {} iterations in {:.3}s",
            cost, iterations, elapsed
        );

        Ok(Solution {
            route,
            cost,
            algorithm: "SA".to_string(),
            computation_time: elapsed,
            iterations: Some(iterations),
        })
    }

    /// Anneal from a double-ended nearest-neighbor route built at node 0.
    pub fn find_solution(&mut self) -> Result<Solution> {
        let initial = nearest_neighbor_double(self.evaluator.graph(), 0, &mut self.rng)?;
        self.run(&initial)
    }
}
