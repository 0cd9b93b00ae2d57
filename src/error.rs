//! Error types for the TSPd solver.
//!
//! Every fallible operation in the library returns [`Result<T>`]. The only
//! "failure" that is not an error is a local search running out of improving
//! moves, which is reported through [`crate::heuristics::Improvement`].

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TspdError>;

/// Unified error type for instance loading, evaluation and optimization.
#[derive(Debug, Error)]
pub enum TspdError {
    /// A constructor reached a frontier node with no admissible unvisited
    /// neighbor, so the route cannot be completed.
    #[error("construction failed at node {node}: no unvisited neighbor reachable ({visited}/{total} nodes visited)")]
    Construction {
        /// Frontier node that has no way forward.
        node: usize,
        /// Number of nodes placed in the partial route.
        visited: usize,
        /// Number of nodes in the graph.
        total: usize,
    },

    /// The instance makes an update rule undefined (e.g. zero-cost tours in
    /// pheromone reinforcement).
    #[error("degenerate instance: {0}")]
    DegenerateInstance(String),

    /// A parameter is outside its admissible range.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A route uses an edge that does not exist in the graph.
    #[error("route uses missing edge {from} -> {to}")]
    MissingEdge {
        /// Tail of the missing edge (node index).
        from: usize,
        /// Head of the missing edge (node index).
        to: usize,
    },

    /// A route is not a permutation of the node set.
    #[error("invalid route: {0}")]
    InvalidRoute(String),

    /// Malformed TSPLIB input.
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number in the input.
        line: usize,
        /// What went wrong.
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TspdError {
    /// Shorthand for a [`TspdError::Configuration`] error.
    pub fn config(message: impl Into<String>) -> Self {
        TspdError::Configuration(message.into())
    }
}

/// Reject a rate outside the closed interval `[0, 1]`.
pub(crate) fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(TspdError::config(format!("{} must be in [0, 1], got {}", name, value)));
    }
    Ok(())
}

/// Reject a count that must be strictly positive.
pub(crate) fn check_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(TspdError::config(format!("{} must be positive", name)));
    }
    Ok(())
}
