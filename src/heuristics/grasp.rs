//! GRASP with tabu-guided local search.
//!
//! The incumbent starts from a single-ended nearest-neighbor route. Every
//! iteration builds a randomized greedy route from a restricted candidate list
//! (RCL), refines it with best-improvement local search that avoids tabu
//! edges, keeps it if it beats the incumbent, then ages the tabu list and
//! forbids one random edge of the incumbent.

use super::construction::nearest_neighbor;
use super::local_search::LocalSearch;
use super::tabu::TabuList;
use crate::error::{check_positive, Result, TspdError};
use crate::evaluate::Evaluator;
use crate::solution::Solution;
use log::{debug, info};
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Smallest RCL produced by truncation; shorter lists are used whole.
const MIN_RCL_SIZE: usize = 3;

/// GRASP configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraspConfig {
    /// Fraction of the candidate list kept in the RCL, in (0, 1]
    pub alpha: f64,
    /// Number of GRASP iterations (also the local search iteration cap)
    pub iter_max: usize,
    /// Iterations an edge stays tabu; 0 disables the tabu list
    pub tabu_tenure: usize,
    /// Random seed
    pub seed: u64,
}

impl Default for GraspConfig {
    fn default() -> Self {
        GraspConfig {
            alpha: 0.2,
            iter_max: 100,
            tabu_tenure: 2,
            seed: 42,
        }
    }
}

impl GraspConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(TspdError::config(format!(
                "GRASP alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        check_positive("GRASP iter_max", self.iter_max)
    }

    /// Stagnation cap of the nested local search: `ceil(iter_max * 0.1)`.
    pub fn local_search_no_improve(&self) -> usize {
        (self.iter_max as f64 * 0.1).ceil() as usize
    }
}

/// GRASP solver
pub struct Grasp<'a> {
    config: GraspConfig,
    evaluator: Evaluator<'a>,
    tabu: TabuList,
    rng: ChaCha8Rng,
}

impl<'a> Grasp<'a> {
    pub fn new(evaluator: Evaluator<'a>, config: GraspConfig) -> Result<Self> {
        config.validate()?;
        if evaluator.graph().is_empty() {
            return Err(TspdError::config("GRASP needs a graph with at least one node"));
        }

        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Ok(Grasp {
            config,
            evaluator,
            tabu: TabuList::new(),
            rng,
        })
    }

    pub fn config(&self) -> &GraspConfig {
        &self.config
    }

    pub fn tabu(&self) -> &TabuList {
        &self.tabu
    }

    pub fn tabu_mut(&mut self) -> &mut TabuList {
        &mut self.tabu
    }

    /// Restricted candidate list for extending a route ending at `node`.
    ///
    /// Unvisited neighbors reached through a non-tabu edge are preferred; the
    /// tabu edges are only used when nothing else keeps the route connected.
    /// The list is sorted by edge weight and cut to `ceil(len * alpha)`
    /// entries unless that leaves fewer than three.
    pub fn restricted_candidates(&self, node: usize, visited: &[bool]) -> Vec<(usize, f64)> {
        let mut all = Vec::new();
        let mut usable = Vec::new();
        for (next, w) in self.evaluator.graph().neighbors(node) {
            if visited[next] {
                continue;
            }
            all.push((next, w));
            if !self.tabu.is_tabu(node, next) {
                usable.push((next, w));
            }
        }

        let mut candidates = if usable.is_empty() { all } else { usable };
        candidates.sort_by_key(|&(_, w)| OrderedFloat(w));

        let size = (candidates.len() as f64 * self.config.alpha).ceil() as usize;
        if size >= MIN_RCL_SIZE {
            candidates.truncate(size);
        }
        candidates
    }

    /// Randomized greedy route from a random start node.
    pub fn construct(&mut self) -> Result<Vec<usize>> {
        let n = self.evaluator.graph().len();
        let first = self.rng.gen_range(0..n);

        let mut visited = vec![false; n];
        visited[first] = true;
        let mut route = Vec::with_capacity(n);
        route.push(first);

        let mut current = first;
        while route.len() < n {
            let candidates = self.restricted_candidates(current, &visited);
            let &(next, _) = candidates.choose(&mut self.rng).ok_or(TspdError::Construction {
                node: current,
                visited: route.len(),
                total: n,
            })?;
            visited[next] = true;
            route.push(next);
            current = next;
        }

        Ok(route)
    }

    /// Age the tabu list, then forbid the edge leaving a random position of
    /// `route`.
    fn update_tabu(&mut self, route: &[usize]) {
        if route.len() < 2 {
            return;
        }
        let t = self.rng.gen_range(0..route.len());
        self.tabu.decrement_all();
        self.tabu
            .insert(route[t], route[(t + 1) % route.len()], self.config.tabu_tenure);
    }

    /// Run GRASP for `iter_max` iterations and return the incumbent.
    pub fn find_solution(&mut self) -> Result<Solution> {
        let start = std::time::Instant::now();
        info!(
            "GRASP: alpha={} iter_max={} tabu_tenure={} seed={}",
            self.config.alpha, self.config.iter_max, self.config.tabu_tenure, self.config.seed
        );

        self.tabu.clear();
        let mut route = nearest_neighbor(self.evaluator.graph(), 0)?;
        let mut cost = self.evaluator.cost(&route)?;
        debug!("GRASP initial nearest-neighbor cost {:.2}", cost);

        let search = LocalSearch::new(self.config.iter_max, self.config.local_search_no_improve());
        for iteration in 0..self.config.iter_max {
            let candidate = self.construct()?;
            let (refined, refined_cost) =
                search.run(&self.evaluator, &candidate, Some(&self.tabu), &mut self.rng)?;

            if refined_cost < cost {
                debug!(
                    "GRASP iteration {}: cost {:.2} -> {:.2}",
                    iteration, cost, refined_cost
                );
                route = refined;
                cost = refined_cost;
            }

            self.update_tabu(&route);
        }

        let elapsed = start.elapsed().as_secs_f64();
        info!(
            "GRASP finished: cost {:.2} after {} iterations in {:.3}s",
            cost, self.config.iter_max, elapsed
        );

        Ok(Solution {
            route,
            cost,
            algorithm: "GRASP".to_string(),
            computation_time: elapsed,
            iterations: Some(self.config.iter_max),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    /// Complete graph where `w(i, j) = i + j`.
    fn sum_graph(n: usize) -> Graph {
        let m: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| (i + j) as f64).collect())
            .collect();
        Graph::from_matrix(&m, false).unwrap()
    }

    fn config(alpha: f64) -> GraspConfig {
        GraspConfig {
            alpha,
            iter_max: 20,
            ..GraspConfig::default()
        }
    }

    #[test]
    fn test_rcl_with_full_alpha_keeps_every_candidate() {
        let g = sum_graph(8);
        let grasp = Grasp::new(Evaluator::new(&g, 0, 0.0).unwrap(), config(1.0)).unwrap();

        let mut visited = vec![false; 8];
        visited[0] = true;
        visited[5] = true;
        let rcl = grasp.restricted_candidates(0, &visited);

        let nodes: Vec<usize> = rcl.iter().map(|&(j, _)| j).collect();
        assert_eq!(nodes, vec![1, 2, 3, 4, 6, 7]);
    }

    #[test]
    fn test_rcl_truncation_and_floor() {
        let g = sum_graph(11);
        let eval = Evaluator::new(&g, 0, 0.0).unwrap();
        let mut visited = vec![false; 11];
        visited[0] = true;

        // 10 candidates * 0.5 -> 5 cheapest
        let grasp = Grasp::new(eval.clone(), config(0.5)).unwrap();
        let nodes: Vec<usize> = grasp
            .restricted_candidates(0, &visited)
            .iter()
            .map(|&(j, _)| j)
            .collect();
        assert_eq!(nodes, vec![1, 2, 3, 4, 5]);

        // 10 candidates * 0.1 -> 1 entry, below the floor: whole list
        let grasp = Grasp::new(eval, config(0.1)).unwrap();
        assert_eq!(grasp.restricted_candidates(0, &visited).len(), 10);
    }

    #[test]
    fn test_rcl_avoids_tabu_unless_needed() {
        let g = sum_graph(4);
        let mut grasp = Grasp::new(Evaluator::new(&g, 0, 0.0).unwrap(), config(1.0)).unwrap();
        let visited = vec![true, false, false, true];

        grasp.tabu_mut().insert(0, 1, 2);
        let nodes: Vec<usize> = grasp
            .restricted_candidates(0, &visited)
            .iter()
            .map(|&(j, _)| j)
            .collect();
        assert_eq!(nodes, vec![2]);

        grasp.tabu_mut().insert(0, 2, 2);
        assert_eq!(grasp.restricted_candidates(0, &visited).len(), 2);
    }

    #[test]
    fn test_uniform_graph_cost() {
        let g = Graph::complete(5, 1.0);
        let mut grasp = Grasp::new(Evaluator::new(&g, 0, 0.0).unwrap(), config(0.2)).unwrap();
        let sol = grasp.find_solution().unwrap();

        assert_eq!(sol.cost, 5.0);
        assert!(sol.is_permutation(&g));
    }

    #[test]
    fn test_never_worse_than_nearest_neighbor() {
        let g = sum_graph(9);
        let eval = Evaluator::new(&g, 2, 4.0).unwrap();
        let nn_cost = eval.cost(&nearest_neighbor(&g, 0).unwrap()).unwrap();

        let mut grasp = Grasp::new(eval.clone(), config(0.3)).unwrap();
        let sol = grasp.find_solution().unwrap();
        assert!(sol.cost <= nn_cost);
        assert!(sol.is_permutation(&g));
        assert_eq!(sol.cost, eval.cost(&sol.route).unwrap());
    }

    fn forbids_route_edge(grasp: &Grasp, route: &[usize]) -> bool {
        let n = route.len();
        (0..n).any(|t| grasp.tabu().is_tabu(route[t], route[(t + 1) % n]))
    }

    #[test]
    fn test_tabu_update_after_one_iteration() {
        let g = sum_graph(7);
        let cfg = GraspConfig { iter_max: 1, ..config(0.5) };
        let mut grasp = Grasp::new(Evaluator::new(&g, 0, 0.0).unwrap(), cfg).unwrap();
        let sol = grasp.find_solution().unwrap();

        assert_eq!(grasp.tabu().active(), 1);
        assert!(forbids_route_edge(&grasp, &sol.route));
    }

    #[test]
    fn test_tabu_entries_age_out() {
        let g = sum_graph(7);
        let cfg = GraspConfig {
            iter_max: 4,
            tabu_tenure: 1,
            ..config(0.5)
        };
        let mut grasp = Grasp::new(Evaluator::new(&g, 0, 0.0).unwrap(), cfg).unwrap();
        let sol = grasp.find_solution().unwrap();

        // tenure 1: each iteration expires the previous edge before adding one
        assert_eq!(grasp.tabu().active(), 1);
        assert!(forbids_route_edge(&grasp, &sol.route));
    }

    #[test]
    fn test_seed_reproducibility() {
        let g = sum_graph(7);
        let run = |seed| {
            let cfg = GraspConfig { seed, ..config(0.5) };
            let mut grasp = Grasp::new(Evaluator::new(&g, 1, 2.0).unwrap(), cfg).unwrap();
            grasp.find_solution().unwrap()
        };
        let a = run(9);
        let b = run(9);
        assert_eq!(a.route, b.route);
        assert_eq!(a.cost, b.cost);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let g = Graph::complete(5, 1.0);
        let eval = Evaluator::new(&g, 0, 0.0).unwrap();
        assert!(Grasp::new(eval.clone(), config(0.0)).is_err());
        assert!(Grasp::new(eval.clone(), config(1.5)).is_err());
        let cfg = GraspConfig { iter_max: 0, ..GraspConfig::default() };
        assert!(Grasp::new(eval, cfg).is_err());
    }
}
