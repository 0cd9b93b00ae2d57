//! Greedy nearest-neighbor constructors.
//!
//! Both variants grow an open route from a start node and fail with
//! [`TspdError::Construction`] when the frontier has no unvisited neighbor
//! (the graph is disconnected relative to what is left to visit).

use crate::error::{Result, TspdError};
use crate::evaluate::Evaluator;
use crate::graph::Graph;
use crate::solution::Solution;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

pub trait ConstructionHeuristic {
    fn construct(&self, evaluator: &Evaluator) -> Result<Solution>;
    fn name(&self) -> &str;
}

/// Cheapest unvisited entry of `candidates`; the first one seen wins ties.
fn cheapest(
    candidates: impl Iterator<Item = (usize, f64)>,
    visited: &[bool],
) -> Option<(usize, f64)> {
    candidates
        .filter(|&(node, _)| !visited[node])
        .fold(None, |best, (node, w)| match best {
            Some((_, best_w)) if w >= best_w => best,
            _ => Some((node, w)),
        })
}

fn check_start(graph: &Graph, start: usize) -> Result<()> {
    if start >= graph.len() {
        return Err(TspdError::config(format!(
            "start node {} out of range for {} nodes",
            start,
            graph.len()
        )));
    }
    Ok(())
}

/// Single-ended nearest neighbor: always extend the tail of the route.
pub fn nearest_neighbor(graph: &Graph, start: usize) -> Result<Vec<usize>> {
    let n = graph.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    check_start(graph, start)?;

    let mut visited = vec![false; n];
    visited[start] = true;
    let mut route = Vec::with_capacity(n);
    route.push(start);

    let mut current = start;
    while route.len() < n {
        let (next, _) = cheapest(graph.neighbors(current), &visited).ok_or(
            TspdError::Construction {
                node: current,
                visited: route.len(),
                total: n,
            },
        )?;
        visited[next] = true;
        route.push(next);
        current = next;
    }

    Ok(route)
}

/// Double-ended nearest neighbor.
///
/// At every step the cheapest unvisited successor of the tail is compared
/// with the cheapest unvisited predecessor of the head (weight of the edge
/// into the head). The cheaper side is extended; ties go to a random side.
pub fn nearest_neighbor_double<R: Rng>(
    graph: &Graph,
    start: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let n = graph.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    check_start(graph, start)?;

    let mut visited = vec![false; n];
    visited[start] = true;
    let mut route = std::collections::VecDeque::with_capacity(n);
    route.push_back(start);

    while route.len() < n {
        let (head, tail) = match (route.front(), route.back()) {
            (Some(&h), Some(&t)) => (h, t),
            _ => break,
        };
        let after_tail = cheapest(graph.neighbors(tail), &visited);
        let before_head = cheapest(graph.predecessors(head), &visited);

        let append = match (after_tail, before_head) {
            (Some((_, wt)), Some((_, wh))) if wt < wh => true,
            (Some((_, wt)), Some((_, wh))) if wh < wt => false,
            (Some(_), Some(_)) => rng.gen_bool(0.5),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => {
                return Err(TspdError::Construction {
                    node: tail,
                    visited: route.len(),
                    total: n,
                })
            }
        };

        if append {
            if let Some((next, _)) = after_tail {
                visited[next] = true;
                route.push_back(next);
            }
        } else if let Some((next, _)) = before_head {
            visited[next] = true;
            route.push_front(next);
        }
    }

    Ok(route.into_iter().collect())
}

/// Nearest Neighbor Heuristic
///
/// Builds a route by repeatedly visiting the nearest unvisited neighbor of
/// the last node.
pub struct NearestNeighborHeuristic {
    pub start: usize,
}

impl NearestNeighborHeuristic {
    pub fn new() -> Self {
        NearestNeighborHeuristic { start: 0 }
    }

    pub fn from_node(start: usize) -> Self {
        NearestNeighborHeuristic { start }
    }
}

impl Default for NearestNeighborHeuristic {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for NearestNeighborHeuristic {
    fn construct(&self, evaluator: &Evaluator) -> Result<Solution> {
        let start = std::time::Instant::now();
        let route = nearest_neighbor(evaluator.graph(), self.start)?;

        let mut solution = Solution::from_route(evaluator, route, self.name())?;
        solution.computation_time = start.elapsed().as_secs_f64();
        Ok(solution)
    }

    fn name(&self) -> &str {
        "NearestNeighbor"
    }
}

/// Double-ended Nearest Neighbor Heuristic
///
/// Grows the route at both ends, which avoids leaving an expensive closing
/// edge for the very end.
pub struct DoubleEndedNearestNeighbor {
    pub start: usize,
    pub seed: u64,
}

impl DoubleEndedNearestNeighbor {
    pub fn new(seed: u64) -> Self {
        DoubleEndedNearestNeighbor { start: 0, seed }
    }

    pub fn from_node(start: usize, seed: u64) -> Self {
        DoubleEndedNearestNeighbor { start, seed }
    }
}

impl ConstructionHeuristic for DoubleEndedNearestNeighbor {
    fn construct(&self, evaluator: &Evaluator) -> Result<Solution> {
        let start = std::time::Instant::now();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let route = nearest_neighbor_double(evaluator.graph(), self.start, &mut rng)?;

        let mut solution = Solution::from_route(evaluator, route, self.name())?;
        solution.computation_time = start.elapsed().as_secs_f64();
        Ok(solution)
    }

    fn name(&self) -> &str {
        "NearestNeighbor-DoubleEnded"
    }
}
