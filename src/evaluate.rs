//! Objective evaluation for the TSPd.
//!
//! The cost of a route is the total weight of the closed tour it describes
//! minus a bonus `v` for every delivery pair whose pickup is visited before
//! its dropoff. Routes are stored open (each node once); the closing edge back
//! to the first node is always added. A route that already repeats its start
//! node at the end is accepted and not double counted.

use crate::error::{Result, TspdError};
use crate::graph::Graph;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Role {
    Plain,
    Pickup(usize),
    Dropoff(usize),
}

/// The `k` delivery pairs of an instance and the bonus each is worth.
///
/// Pair `i` (1-based) is made of the nodes at positions `2i - 1` (pickup) and
/// `2i` (dropoff) in the graph's stable node order, so deriving the set is
/// deterministic and needs `2k < n`.
#[derive(Debug, Clone)]
pub struct DeliverySet {
    pairs: Vec<(usize, usize)>,
    value: f64,
    roles: Vec<Role>,
}

impl DeliverySet {
    pub fn new(graph: &Graph, k: usize, value: f64) -> Result<Self> {
        let n = graph.len();
        if k > 0 && 2 * k >= n {
            return Err(TspdError::config(format!(
                "{} delivery pairs need at least {} nodes, graph has {}",
                k,
                2 * k + 1,
                n
            )));
        }
        if !value.is_finite() {
            return Err(TspdError::config(format!("delivery value must be finite, got {}", value)));
        }

        let mut roles = vec![Role::Plain; n];
        let pairs: Vec<(usize, usize)> = (1..=k).map(|i| (2 * i - 1, 2 * i)).collect();
        for (idx, &(pickup, dropoff)) in pairs.iter().enumerate() {
            roles[pickup] = Role::Pickup(idx);
            roles[dropoff] = Role::Dropoff(idx);
        }

        Ok(DeliverySet { pairs, value, roles })
    }

    /// No deliveries: plain TSP objective.
    pub fn none(graph: &Graph) -> Self {
        DeliverySet {
            pairs: Vec::new(),
            value: 0.0,
            roles: vec![Role::Plain; graph.len()],
        }
    }

    /// `(pickup, dropoff)` node pairs.
    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Total bonus collected by `route` (pickup strictly before dropoff).
    pub fn bonus(&self, route: &[usize]) -> f64 {
        if self.pairs.is_empty() {
            return 0.0;
        }

        let mut picked = vec![false; self.pairs.len()];
        let mut collected = 0usize;
        for &node in route {
            match self.roles.get(node).copied().unwrap_or(Role::Plain) {
                Role::Pickup(pair) => picked[pair] = true,
                Role::Dropoff(pair) if picked[pair] => {
                    collected += 1;
                    picked[pair] = false;
                }
                _ => {}
            }
        }

        collected as f64 * self.value
    }
}

/// Scores routes on a fixed graph and delivery set. Side-effect free.
#[derive(Debug, Clone)]
pub struct Evaluator<'a> {
    graph: &'a Graph,
    deliveries: DeliverySet,
}

impl<'a> Evaluator<'a> {
    /// Evaluator for `k` delivery pairs each worth `v`.
    pub fn new(graph: &'a Graph, k: usize, v: f64) -> Result<Self> {
        Ok(Evaluator {
            graph,
            deliveries: DeliverySet::new(graph, k, v)?,
        })
    }

    pub fn with_deliveries(graph: &'a Graph, deliveries: DeliverySet) -> Self {
        Evaluator { graph, deliveries }
    }

    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    pub fn deliveries(&self) -> &DeliverySet {
        &self.deliveries
    }

    /// Cost of `route`: closed tour weight minus collected delivery bonuses.
    ///
    /// An empty route is scored as the graph's natural node order. Any edge
    /// missing from the graph yields [`TspdError::MissingEdge`].
    pub fn cost(&self, route: &[usize]) -> Result<f64> {
        if route.is_empty() {
            let natural: Vec<usize> = self.graph.nodes().collect();
            return self.cost(&natural);
        }

        let body = open_route(route);
        if let Some(&node) = body.iter().find(|&&node| node >= self.graph.len()) {
            return Err(TspdError::InvalidRoute(format!(
                "unknown node {} in a graph of {} nodes",
                node,
                self.graph.len()
            )));
        }
        let mut total = self.graph.path_length(body)?;
        if body.len() > 1 {
            let (last, first) = (body[body.len() - 1], body[0]);
            total += self
                .graph
                .weight(last, first)
                .ok_or(TspdError::MissingEdge { from: last, to: first })?;
        }

        Ok(total - self.deliveries.bonus(body))
    }
}

/// Drop the explicit trailing repeat of the start node, if present.
pub fn open_route(route: &[usize]) -> &[usize] {
    match route {
        [first, .., last] if first == last => &route[..route.len() - 1],
        _ => route,
    }
}

/// Check that `route` visits every node of `graph` exactly once
/// (a trailing repeat of the start node is allowed).
pub fn check_route(graph: &Graph, route: &[usize]) -> Result<()> {
    let body = open_route(route);
    if body.len() != graph.len() {
        return Err(TspdError::InvalidRoute(format!(
            "route visits {} nodes, graph has {}",
            body.len(),
            graph.len()
        )));
    }

    let mut seen = vec![false; graph.len()];
    for &node in body {
        if node >= graph.len() {
            return Err(TspdError::InvalidRoute(format!("unknown node {}", node)));
        }
        if seen[node] {
            return Err(TspdError::InvalidRoute(format!("node {} visited twice", node)));
        }
        seen[node] = true;
    }
    Ok(())
}
