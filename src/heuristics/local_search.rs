//! Iterative best-improvement local search.
//!
//! Each iteration scans the whole neighborhood of the current route and moves
//! to its best member. The search stops on the iteration cap, on the
//! stagnation cap, when the neighborhood is empty, or when no neighbor beats
//! the current route. An adopted move whose relative gain is below 1% still
//! counts as a stagnating iteration.

use super::neighborhood::{neighborhood, MoveKind};
use super::tabu::TabuList;
use crate::error::{check_positive, Result};
use crate::evaluate::Evaluator;
use crate::solution::Solution;
use log::debug;
use rand::Rng;

/// Relative gain under which an adopted move still counts as stagnation.
pub const STAGNATION_RATE: f64 = 0.01;

/// Outcome of one best-improvement scan.
#[derive(Debug, Clone, PartialEq)]
pub enum Improvement {
    /// A neighbor strictly better than the current route.
    Found(Vec<usize>, f64),
    /// No neighbor beats the current route.
    NoImprovement,
}

/// Best-improvement hill climbing over a 2-opt or swap neighborhood.
#[derive(Debug, Clone)]
pub struct LocalSearch {
    /// Maximum number of adopted moves
    pub iter_max: usize,
    /// Maximum number of stagnating iterations
    pub no_improve_max: usize,
    /// Move defining the neighborhood
    pub kind: MoveKind,
}

impl Default for LocalSearch {
    fn default() -> Self {
        LocalSearch {
            iter_max: 100,
            no_improve_max: 10,
            kind: MoveKind::TwoOpt,
        }
    }
}

impl LocalSearch {
    pub fn new(iter_max: usize, no_improve_max: usize) -> Self {
        LocalSearch {
            iter_max,
            no_improve_max,
            kind: MoveKind::TwoOpt,
        }
    }

    pub fn with_kind(mut self, kind: MoveKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("local search iter_max", self.iter_max)?;
        check_positive("local search no_improve_max", self.no_improve_max)
    }

    /// Pick the best of `candidates` against the current route.
    ///
    /// The running best starts as the current route. A strictly cheaper
    /// candidate replaces it; an equally cheap one replaces it on a fair coin
    /// flip, so later ties are favored less than a uniform pick would.
    pub fn best_improvement<R: Rng>(
        evaluator: &Evaluator,
        current_cost: f64,
        candidates: Vec<Vec<usize>>,
        rng: &mut R,
    ) -> Result<Improvement> {
        let mut best: Option<Vec<usize>> = None;
        let mut best_cost = current_cost;

        for candidate in candidates {
            let cost = evaluator.cost(&candidate)?;
            if cost < best_cost || (cost == best_cost && rng.gen_bool(0.5)) {
                best_cost = cost;
                best = Some(candidate);
            }
        }

        match best {
            Some(route) if best_cost < current_cost => Ok(Improvement::Found(route, best_cost)),
            _ => Ok(Improvement::NoImprovement),
        }
    }

    /// Improve `start`, skipping moves that touch tabu edges.
    pub fn run<R: Rng>(
        &self,
        evaluator: &Evaluator,
        start: &[usize],
        tabu: Option<&TabuList>,
        rng: &mut R,
    ) -> Result<(Vec<usize>, f64)> {
        let graph = evaluator.graph();
        let mut route = start.to_vec();
        let mut cost = evaluator.cost(&route)?;

        let mut iteration = 0;
        let mut no_improve = 0;
        while iteration < self.iter_max && no_improve < self.no_improve_max {
            let candidates = neighborhood(graph, &route, self.kind, tabu);
            if candidates.is_empty() {
                debug!("local search: empty {} neighborhood at iteration {}", self.kind, iteration);
                break;
            }

            match Self::best_improvement(evaluator, cost, candidates, rng)? {
                Improvement::NoImprovement => break,
                Improvement::Found(next, next_cost) => {
                    if relative_change(cost, next_cost) < STAGNATION_RATE {
                        no_improve += 1;
                    }
                    route = next;
                    cost = next_cost;
                }
            }
            iteration += 1;
        }

        debug!(
            "local search finished: cost {:.2} after {} iterations ({} stagnating)",
            cost, iteration, no_improve
        );
        Ok((route, cost))
    }

    /// Improve a solution in place. Returns true when its cost went down.
    pub fn improve<R: Rng>(
        &self,
        evaluator: &Evaluator,
        solution: &mut Solution,
        rng: &mut R,
    ) -> Result<bool> {
        let before = evaluator.cost(&solution.route)?;
        let (route, cost) = self.run(evaluator, &solution.route, None, rng)?;
        solution.route = route;
        solution.cost = cost;
        Ok(cost < before)
    }
}

/// `|new / old - 1|`, infinite when `old` is zero and `new` is not.
pub(crate) fn relative_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        if new == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        (new / old - 1.0).abs()
    }
}
