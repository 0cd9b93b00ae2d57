//! Ant Colony Optimization for the TSPd.
//!
//! Rank-based offline pheromone update: every iteration each ant builds a full
//! route, the `num_best` cheapest ants deposit pheromone on their edges, and
//! the whole matrix evaporates. The pheromone influence `alpha` grows with
//! every evaporation up to `pheromone_max`, while the heuristic influence is
//! always `beta = 1 - alpha`.

use super::local_search::{relative_change, STAGNATION_RATE};
use super::tabu::TabuList;
use crate::error::{check_positive, check_unit_interval, Result, TspdError};
use crate::evaluate::Evaluator;
use crate::solution::Solution;
use log::{debug, info};
use ordered_float::OrderedFloat;
use rand::distributions::{Distribution, WeightedIndex};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Resampling attempts made to steer an ant away from a tabu edge.
const TABU_RETRIES: usize = 3;

/// Initial pheromone on every directed edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PheromoneInit {
    /// Same value everywhere
    Uniform { value: f64 },
    /// Uniform draw in `[low, high)` per edge
    Random { low: f64, high: f64 },
}

impl Default for PheromoneInit {
    fn default() -> Self {
        PheromoneInit::Random { low: 0.01, high: 1.0 }
    }
}

/// ACO configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcoConfig {
    /// Initial pheromone influence (alpha)
    pub pheromone_rate: f64,
    /// Ceiling for the pheromone influence
    pub pheromone_max: f64,
    /// Evaporation rate (rho)
    pub evaporation_rate: f64,
    /// Number of ants
    pub num_ants: usize,
    /// Number of best ants depositing pheromone
    pub num_best: usize,
    /// Number of iterations
    pub iter_max: usize,
    /// Stagnating iterations tolerated before stopping
    pub iter_no_improve_max: usize,
    /// Initial pheromone levels
    pub pheromone_init: PheromoneInit,
    /// Evaporate a second time at the end of every iteration
    pub double_evaporation: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for AcoConfig {
    fn default() -> Self {
        AcoConfig {
            pheromone_rate: 0.3,
            pheromone_max: 0.8,
            evaporation_rate: 0.02,
            num_ants: 20,
            num_best: 5,
            iter_max: 100,
            iter_no_improve_max: 10,
            pheromone_init: PheromoneInit::default(),
            double_evaporation: true,
            seed: 42,
        }
    }
}

impl AcoConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("pheromone_rate", self.pheromone_rate)?;
        check_unit_interval("pheromone_max", self.pheromone_max)?;
        check_unit_interval("evaporation_rate", self.evaporation_rate)?;
        if self.pheromone_rate > self.pheromone_max {
            return Err(TspdError::config(format!(
                "pheromone_rate {} exceeds pheromone_max {}",
                self.pheromone_rate, self.pheromone_max
            )));
        }
        check_positive("num_ants", self.num_ants)?;
        check_positive("num_best", self.num_best)?;
        check_positive("iter_max", self.iter_max)?;

        match self.pheromone_init {
            PheromoneInit::Uniform { value } if !(value.is_finite() && value > 0.0) => Err(
                TspdError::config(format!("initial pheromone must be positive, got {}", value)),
            ),
            PheromoneInit::Random { low, high } if !(low > 0.0 && low < high && high.is_finite()) => {
                Err(TspdError::config(format!(
                    "initial pheromone range [{}, {}) is invalid",
                    low, high
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Route built by one ant and its cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Ant {
    pub route: Vec<usize>,
    pub cost: f64,
}

/// Ant Colony Optimization solver
pub struct AntColony<'a> {
    config: AcoConfig,
    evaluator: Evaluator<'a>,
    /// Row-major `n * n` pheromone matrix; zero where there is no edge.
    pheromone: Vec<f64>,
    alpha: f64,
    beta: f64,
    tabu: TabuList,
    rng: ChaCha8Rng,
}

impl<'a> AntColony<'a> {
    pub fn new(evaluator: Evaluator<'a>, config: AcoConfig) -> Result<Self> {
        config.validate()?;
        let graph = evaluator.graph();
        if graph.is_empty() {
            return Err(TspdError::config("ACO needs a graph with at least one node"));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let n = graph.len();
        let mut pheromone = vec![0.0; n * n];
        for (u, v, _) in graph.edges() {
            pheromone[u * n + v] = match config.pheromone_init {
                PheromoneInit::Uniform { value } => value,
                PheromoneInit::Random { low, high } => rng.gen_range(low..high),
            };
        }

        let alpha = config.pheromone_rate;
        Ok(AntColony {
            config,
            evaluator,
            pheromone,
            alpha,
            beta: 1.0 - alpha,
            tabu: TabuList::new(),
            rng,
        })
    }

    pub fn config(&self) -> &AcoConfig {
        &self.config
    }

    /// Current pheromone influence.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Current heuristic influence, always `1 - alpha`.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Row-major view of the pheromone matrix.
    pub fn pheromone(&self) -> &[f64] {
        &self.pheromone
    }

    /// Pheromone on the directed edge `u -> v`.
    pub fn trail(&self, u: usize, v: usize) -> f64 {
        self.pheromone[u * self.evaluator.graph().len() + v]
    }

    /// Auxiliary tabu list consulted while ants pick their next node.
    pub fn tabu_mut(&mut self) -> &mut TabuList {
        &mut self.tabu
    }

    /// Draw one candidate proportionally to its desirability.
    fn sample(&mut self, candidates: &[(usize, f64)]) -> usize {
        match WeightedIndex::new(candidates.iter().map(|&(_, d)| d)) {
            Ok(dist) => candidates[dist.sample(&mut self.rng)].0,
            Err(_) => {
                debug!("ACO: degenerate desirabilities, drawing uniformly");
                candidates[self.rng.gen_range(0..candidates.len())].0
            }
        }
    }

    /// Build one route from a random start node.
    ///
    /// The desirability of moving from `i` to `j` is
    /// `pheromone(i, j)^alpha * weight(i, j)^beta`, using the raw edge weight.
    pub fn construct_ant(&mut self) -> Result<Ant> {
        let graph = self.evaluator.graph();
        let n = graph.len();
        let first = self.rng.gen_range(0..n);

        let mut visited = vec![false; n];
        visited[first] = true;
        let mut route = Vec::with_capacity(n);
        route.push(first);

        let mut current = first;
        while route.len() < n {
            let candidates: Vec<(usize, f64)> = graph
                .neighbors(current)
                .filter(|&(j, _)| !visited[j])
                .map(|(j, w)| {
                    let tau = self.pheromone[current * n + j];
                    (j, tau.powf(self.alpha) * w.powf(self.beta))
                })
                .collect();
            if candidates.is_empty() {
                return Err(TspdError::Construction {
                    node: current,
                    visited: route.len(),
                    total: n,
                });
            }

            let mut next = self.sample(&candidates);
            if candidates.len() > 1 {
                let mut tries = 0;
                while self.tabu.is_tabu(current, next) && tries < TABU_RETRIES {
                    next = self.sample(&candidates);
                    tries += 1;
                }
            }

            visited[next] = true;
            route.push(next);
            current = next;
        }

        let cost = self.evaluator.cost(&route)?;
        Ok(Ant { route, cost })
    }

    /// Rank the ants and let the `num_best` cheapest deposit pheromone.
    ///
    /// Every elite ant deposits `1 / |cost|` of the best ant on each directed
    /// edge of its closed tour. Costs are negative when the delivery bonuses
    /// outweigh the tour, so the magnitude keeps every trail non-negative.
    /// A zero or non-finite best cost has no usable deposit. Returns the best
    /// ant.
    pub fn reinforce(&mut self, mut ants: Vec<Ant>) -> Result<Ant> {
        ants.sort_by_key(|ant| OrderedFloat(ant.cost));
        let best_cost = match ants.first() {
            Some(ant) => ant.cost,
            None => return Err(TspdError::config("reinforcement needs at least one ant")),
        };
        if best_cost == 0.0 || !best_cost.is_finite() {
            return Err(TspdError::DegenerateInstance(format!(
                "elite ant cost {} gives no usable pheromone deposit",
                best_cost
            )));
        }

        let n = self.evaluator.graph().len();
        let deposit = 1.0 / best_cost.abs();
        let elite = self.config.num_best.min(ants.len());
        for ant in &ants[..elite] {
            let m = ant.route.len();
            if m < 2 {
                continue;
            }
            for i in 0..m {
                let (from, to) = (ant.route[i], ant.route[(i + 1) % m]);
                self.pheromone[from * n + to] += deposit;
            }
        }

        Ok(ants.swap_remove(0))
    }

    /// Decay every trail by `(1 - rho)` and raise `alpha` towards its ceiling.
    pub fn evaporate(&mut self) {
        let keep = 1.0 - self.config.evaporation_rate;
        for tau in self.pheromone.iter_mut() {
            *tau *= keep;
        }

        if self.alpha < self.config.pheromone_max {
            self.alpha = (self.alpha * (1.0 + self.config.evaporation_rate))
                .min(self.config.pheromone_max);
            self.beta = 1.0 - self.alpha;
        }
    }

    /// Run the colony and return the best route found.
    pub fn find_solution(&mut self) -> Result<Solution> {
        let start = std::time::Instant::now();
        info!(
            "ACO: p={} pmax={} r={} ants={} best={} iter_max={} no_improve_max={} seed={}",
            self.config.pheromone_rate,
            self.config.pheromone_max,
            self.config.evaporation_rate,
            self.config.num_ants,
            self.config.num_best,
            self.config.iter_max,
            self.config.iter_no_improve_max,
            self.config.seed
        );

        let mut best: Option<Ant> = None;
        let mut no_improve = 0;
        let mut iterations = 0;
        while iterations < self.config.iter_max {
            iterations += 1;

            let ants = (0..self.config.num_ants)
                .map(|_| self.construct_ant())
                .collect::<Result<Vec<_>>>()?;
            let iteration_best = self.reinforce(ants)?;
            self.evaporate();

            match best.as_ref() {
                None => best = Some(iteration_best),
                Some(current) if iteration_best.cost < current.cost => {
                    if relative_change(current.cost, iteration_best.cost) < STAGNATION_RATE {
                        no_improve += 1;
                    }
                    debug!(
                        "ACO iteration {}: cost {:.2} -> {:.2}",
                        iterations, current.cost, iteration_best.cost
                    );
                    best = Some(iteration_best);
                }
                Some(_) => no_improve += 1,
            }

            if self.config.double_evaporation {
                self.evaporate();
            }
            if no_improve > self.config.iter_no_improve_max {
                debug!("ACO: stopping after {} stagnating iterations", no_improve);
                break;
            }
        }

        let elapsed = start.elapsed().as_secs_f64();
        let best = best.ok_or_else(|| TspdError::config("ACO ran no iterations"))?;
        info!(
            "ACO finished: cost {:.2} after {} iterations in {:.3}s (alpha={:.3})",
            best.cost, iterations, elapsed, self.alpha
        );

        Ok(Solution {
            route: best.route,
            cost: best.cost,
            algorithm: "ACO".to_string(),
            computation_time: elapsed,
            iterations: Some(iterations),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn line_graph(n: usize) -> Graph {
        let m: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| (i as f64 - j as f64).abs()).collect())
            .collect();
        Graph::from_matrix(&m, false).unwrap()
    }

    fn small_config() -> AcoConfig {
        AcoConfig {
            num_ants: 5,
            num_best: 2,
            iter_max: 15,
            ..AcoConfig::default()
        }
    }

    #[test]
    fn test_initial_pheromone_in_range() {
        let g = Graph::complete(6, 1.0);
        let aco = AntColony::new(Evaluator::new(&g, 0, 0.0).unwrap(), small_config()).unwrap();

        for u in 0..6 {
            for v in 0..6 {
                let tau = aco.trail(u, v);
                if u == v {
                    assert_eq!(tau, 0.0);
                } else {
                    assert!((0.01..1.0).contains(&tau));
                }
            }
        }
        assert_eq!(aco.alpha(), 0.3);
        assert!((aco.beta() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_evaporation_keeps_trails_non_negative_and_alpha_bounded() {
        let g = Graph::complete(5, 1.0);
        let config = AcoConfig {
            evaporation_rate: 0.2,
            ..small_config()
        };
        let mut aco = AntColony::new(Evaluator::new(&g, 0, 0.0).unwrap(), config).unwrap();

        let mut previous_alpha = aco.alpha();
        for _ in 0..500 {
            aco.evaporate();
            assert!(aco.alpha() >= previous_alpha);
            assert!(aco.alpha() <= 0.8);
            assert!((aco.alpha() + aco.beta() - 1.0).abs() < 1e-12);
            previous_alpha = aco.alpha();
        }
        assert_eq!(aco.alpha(), 0.8);
        assert!(aco.pheromone().iter().all(|&tau| tau >= 0.0));
    }

    #[test]
    fn test_evaporation_steps() {
        let g = Graph::complete(4, 1.0);
        let config = AcoConfig {
            pheromone_init: PheromoneInit::Uniform { value: 0.5 },
            evaporation_rate: 0.2,
            ..small_config()
        };
        let mut aco = AntColony::new(Evaluator::new(&g, 0, 0.0).unwrap(), config).unwrap();

        aco.evaporate();
        assert!((aco.trail(1, 2) - 0.5 * 0.8).abs() < 1e-12);
        assert!((aco.alpha() - 0.3 * 1.2).abs() < 1e-12);

        aco.evaporate();
        assert!((aco.trail(1, 2) - 0.5 * 0.8 * 0.8).abs() < 1e-12);
        assert!((aco.alpha() - 0.3 * 1.2 * 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_double_evaporation_per_iteration() {
        let g = Graph::complete(5, 1.0);
        let run = |double_evaporation| {
            let config = AcoConfig {
                evaporation_rate: 0.1,
                iter_max: 1,
                double_evaporation,
                ..small_config()
            };
            let mut aco = AntColony::new(Evaluator::new(&g, 0, 0.0).unwrap(), config).unwrap();
            aco.find_solution().unwrap();
            aco.alpha()
        };

        assert!((run(true) - 0.3 * 1.1 * 1.1).abs() < 1e-12);
        assert!((run(false) - 0.3 * 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_stagnation_stops_the_colony() {
        // every route costs the same, so each iteration after the first stagnates
        let g = Graph::complete(5, 1.0);
        for (limit, expected) in [(0, 2), (3, 5)] {
            let config = AcoConfig {
                iter_max: 100,
                iter_no_improve_max: limit,
                ..small_config()
            };
            let mut aco = AntColony::new(Evaluator::new(&g, 0, 0.0).unwrap(), config).unwrap();
            let sol = aco.find_solution().unwrap();
            assert_eq!(sol.iterations, Some(expected));
        }
    }

    #[test]
    fn test_elite_deposit_uses_best_cost() {
        let g = Graph::complete(4, 1.0);
        let config = AcoConfig {
            pheromone_init: PheromoneInit::Uniform { value: 0.5 },
            num_best: 2,
            ..small_config()
        };
        let mut aco = AntColony::new(Evaluator::new(&g, 0, 0.0).unwrap(), config).unwrap();

        let ants = vec![
            Ant { route: vec![0, 2, 1, 3], cost: 8.0 },
            Ant { route: vec![0, 3, 2, 1], cost: 10.0 },
            Ant { route: vec![0, 1, 2, 3], cost: 4.0 },
        ];
        let best = aco.reinforce(ants).unwrap();
        assert_eq!(best.cost, 4.0);
        assert_eq!(best.route, vec![0, 1, 2, 3]);

        // deposit is 1/4 for both elite ants
        assert_eq!(aco.trail(0, 1), 0.75);
        assert_eq!(aco.trail(0, 2), 0.75);
        assert_eq!(aco.trail(2, 1), 0.75);
        assert_eq!(aco.trail(3, 0), 1.0);
        // only the third ant uses 0 -> 3
        assert_eq!(aco.trail(0, 3), 0.5);
    }

    #[test]
    fn test_zero_cost_elite_is_degenerate() {
        let g = Graph::complete(5, 0.0);
        let mut aco = AntColony::new(Evaluator::new(&g, 0, 0.0).unwrap(), small_config()).unwrap();
        assert!(matches!(
            aco.find_solution(),
            Err(TspdError::DegenerateInstance(_))
        ));
    }

    #[test]
    fn test_negative_elite_cost_deposits_magnitude() {
        let g = Graph::complete(4, 1.0);
        let config = AcoConfig {
            pheromone_init: PheromoneInit::Uniform { value: 0.5 },
            num_best: 1,
            ..small_config()
        };
        let mut aco = AntColony::new(Evaluator::new(&g, 1, 10.0).unwrap(), config).unwrap();

        let ants = vec![
            Ant { route: vec![0, 2, 1, 3], cost: 4.0 },
            Ant { route: vec![0, 1, 2, 3], cost: -6.0 },
        ];
        let best = aco.reinforce(ants).unwrap();
        assert_eq!(best.cost, -6.0);
        assert!((aco.trail(0, 1) - (0.5 + 1.0 / 6.0)).abs() < 1e-12);
        assert_eq!(aco.trail(0, 2), 0.5);
    }

    #[test]
    fn test_bonus_exceeding_tour_weight() {
        // tour weight 5, both pairs collected gives 5 - 2 * 10
        let g = Graph::complete(5, 1.0);
        let eval = Evaluator::new(&g, 2, 10.0).unwrap();
        let mut aco = AntColony::new(eval.clone(), AcoConfig::default()).unwrap();
        let sol = aco.find_solution().unwrap();

        assert_eq!(sol.cost, -15.0);
        assert_eq!(sol.cost, eval.cost(&sol.route).unwrap());
        assert!(aco.pheromone().iter().all(|&tau| tau >= 0.0));

        let chained = crate::heuristics::aco_then_annealing(
            &eval,
            AcoConfig::default(),
            crate::heuristics::AnnealingConfig::default(),
        )
        .unwrap();
        assert!(chained.cost < 0.0);
    }

    #[test]
    fn test_uniform_graph_cost() {
        let g = Graph::complete(5, 1.0);
        let mut aco = AntColony::new(Evaluator::new(&g, 0, 0.0).unwrap(), small_config()).unwrap();
        let sol = aco.find_solution().unwrap();

        assert_eq!(sol.cost, 5.0);
        assert!(sol.is_permutation(&g));
    }

    #[test]
    fn test_ants_build_permutations() {
        let g = line_graph(8);
        let mut aco = AntColony::new(Evaluator::new(&g, 2, 3.0).unwrap(), small_config()).unwrap();
        aco.tabu_mut().insert(0, 1, 5);

        for _ in 0..10 {
            let ant = aco.construct_ant().unwrap();
            let mut sorted = ant.route.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..8).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_seed_reproducibility() {
        let g = line_graph(7);
        let run = || {
            let mut aco =
                AntColony::new(Evaluator::new(&g, 1, 2.0).unwrap(), small_config()).unwrap();
            aco.find_solution().unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a.route, b.route);
        assert_eq!(a.cost, b.cost);
        assert!(a.iterations.unwrap() <= 15);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let g = Graph::complete(5, 1.0);
        let eval = Evaluator::new(&g, 0, 0.0).unwrap();
        let bad = [
            AcoConfig { evaporation_rate: 1.5, ..AcoConfig::default() },
            AcoConfig { pheromone_rate: 0.9, pheromone_max: 0.5, ..AcoConfig::default() },
            AcoConfig { num_ants: 0, ..AcoConfig::default() },
            AcoConfig {
                pheromone_init: PheromoneInit::Random { low: 1.0, high: 0.5 },
                ..AcoConfig::default()
            },
        ];
        for config in bad {
            assert!(AntColony::new(eval.clone(), config).is_err());
        }
    }
}
