//! Solution representation for the TSPd.
//!
//! A [`Solution`] is an open route (each node once, closing edge implied)
//! together with its evaluated cost and some bookkeeping about the run that
//! produced it.

use crate::evaluate::{check_route, Evaluator};
use crate::error::Result;
use crate::graph::Graph;
use serde::{Deserialize, Serialize};

/// Represents a solution to the TSPd
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// The route as a sequence of node indices (open, closing edge implied)
    pub route: Vec<usize>,
    /// Tour cost minus collected delivery bonuses
    pub cost: f64,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
    /// Number of iterations (if applicable)
    pub iterations: Option<usize>,
}

impl Solution {
    /// Create a new empty solution
    pub fn new() -> Self {
        Solution {
            route: Vec::new(),
            cost: f64::INFINITY,
            algorithm: String::new(),
            computation_time: 0.0,
            iterations: None,
        }
    }

    /// Evaluate `route` and wrap it.
    pub fn from_route(evaluator: &Evaluator, route: Vec<usize>, algorithm: &str) -> Result<Self> {
        let cost = evaluator.cost(&route)?;
        Ok(Solution {
            route,
            cost,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
            iterations: None,
        })
    }

    /// Check that the route is a permutation of the graph's nodes.
    pub fn is_permutation(&self, graph: &Graph) -> bool {
        check_route(graph, &self.route).is_ok()
    }

    /// Route expressed with the node labels of the input file.
    pub fn labelled_route(&self, graph: &Graph) -> Vec<usize> {
        self.route.iter().map(|&node| graph.label(node)).collect()
    }

    /// Position of a node in the route
    pub fn position(&self, node: usize) -> Option<usize> {
        self.route.iter().position(|&n| n == node)
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Cost: {:.2}", self.cost)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        if let Some(iter) = self.iterations {
            writeln!(f, "  Iterations: {}", iter)?;
        }
        writeln!(f, "  Route: {}", format_route(&self.route))
    }
}

/// `[a,b,c]` without spaces, the form used in CSV and exec-data output.
pub fn format_route(route: &[usize]) -> String {
    let body: Vec<String> = route.iter().map(|n| n.to_string()).collect();
    format!("[{}]", body.join(","))
}
