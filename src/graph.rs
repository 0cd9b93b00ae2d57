//! Weighted graph model for TSPd instances.
//!
//! Nodes are addressed internally by dense indices `0..n` in a stable order;
//! each node also carries the label it had in the input file. Weights live in
//! a flat row-major matrix so that edge lookups on the evaluation hot path are
//! O(1). Adjacency queries walk a row (successors) or a column (predecessors)
//! in index order, which makes every iteration order deterministic.

use crate::error::{Result, TspdError};
use std::ops::Range;

/// Weighted, optionally directed graph. Immutable once built by the loader.
#[derive(Debug, Clone)]
pub struct Graph {
    labels: Vec<usize>,
    directed: bool,
    weights: Vec<Option<f64>>,
}

impl Graph {
    /// Create a graph with `n` isolated nodes labelled `0..n`.
    pub fn new(n: usize, directed: bool) -> Self {
        Self::with_labels((0..n).collect(), directed)
    }

    /// Create a graph with isolated nodes carrying the given labels.
    pub fn with_labels(labels: Vec<usize>, directed: bool) -> Self {
        let n = labels.len();
        Graph {
            labels,
            directed,
            weights: vec![None; n * n],
        }
    }

    /// Complete undirected graph on `n` nodes where every edge weighs `weight`.
    pub fn complete(n: usize, weight: f64) -> Self {
        let mut weights = vec![Some(weight); n * n];
        for i in 0..n {
            weights[i * n + i] = None;
        }
        Graph {
            labels: (0..n).collect(),
            directed: false,
            weights,
        }
    }

    /// Build a complete graph from a square weight matrix. The diagonal is
    /// ignored. For undirected graphs the matrix must be symmetric.
    pub fn from_matrix(matrix: &[Vec<f64>], directed: bool) -> Result<Self> {
        let n = matrix.len();
        if let Some((i, row)) = matrix.iter().enumerate().find(|(_, row)| row.len() != n) {
            return Err(TspdError::config(format!(
                "weight matrix row {} has {} entries, expected {}",
                i,
                row.len(),
                n
            )));
        }

        let mut graph = Graph::new(n, directed);
        for (i, row) in matrix.iter().enumerate() {
            for (j, &w) in row.iter().enumerate() {
                if i == j {
                    continue;
                }
                if !directed && (w - matrix[j][i]).abs() > 1e-9 {
                    return Err(TspdError::config(format!(
                        "undirected weight matrix is not symmetric at ({}, {})",
                        i, j
                    )));
                }
                graph.set_weight(i, j, w)?;
            }
        }

        Ok(graph)
    }

    /// Add (or overwrite) an edge. Undirected graphs store both directions.
    pub fn add_edge(&mut self, u: usize, v: usize, weight: f64) -> Result<()> {
        self.set_weight(u, v, weight)?;
        if !self.directed {
            self.set_weight(v, u, weight)?;
        }
        Ok(())
    }

    fn set_weight(&mut self, u: usize, v: usize, weight: f64) -> Result<()> {
        let n = self.len();
        if u >= n || v >= n {
            return Err(TspdError::config(format!(
                "edge ({}, {}) out of range for {} nodes",
                u, v, n
            )));
        }
        if u == v {
            return Err(TspdError::config(format!("self-loop on node {}", u)));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(TspdError::config(format!(
                "edge ({}, {}) has invalid weight {}",
                u, v, weight
            )));
        }
        self.weights[u * n + v] = Some(weight);
        Ok(())
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Node indices in stable order.
    pub fn nodes(&self) -> Range<usize> {
        0..self.len()
    }

    /// Label of a node as it appeared in the input.
    pub fn label(&self, node: usize) -> usize {
        self.labels[node]
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Index of the node carrying `label`, if any.
    pub fn index_of(&self, label: usize) -> Option<usize> {
        self.labels.iter().position(|&l| l == label)
    }

    /// Weight of the edge `u -> v`, or `None` when the edge does not exist
    /// or either endpoint is out of range.
    #[inline]
    pub fn weight(&self, u: usize, v: usize) -> Option<f64> {
        let n = self.len();
        if u >= n || v >= n {
            return None;
        }
        self.weights[u * n + v]
    }

    #[inline]
    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.weight(u, v).is_some()
    }

    /// Reachable neighbors of `node` with edge weights, in index order.
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let n = self.len();
        self.weights[node * n..(node + 1) * n]
            .iter()
            .enumerate()
            .filter_map(|(j, w)| w.map(|w| (j, w)))
    }

    /// Nodes with an edge into `node`, with the weight of that edge.
    /// Identical to [`Graph::neighbors`] for undirected graphs.
    pub fn predecessors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let n = self.len();
        (0..n).filter_map(move |i| self.weights[i * n + node].map(|w| (i, w)))
    }

    /// Out-degree of a node.
    pub fn degree(&self, node: usize) -> usize {
        self.neighbors(node).count()
    }

    /// All directed edges `(u, v, weight)`; undirected edges appear twice.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let n = self.len();
        self.weights
            .iter()
            .enumerate()
            .filter_map(move |(idx, w)| w.map(|w| (idx / n, idx % n, w)))
    }

    /// True when every ordered pair of distinct nodes is connected.
    pub fn is_complete(&self) -> bool {
        let n = self.len();
        self.nodes().all(|u| self.degree(u) == n.saturating_sub(1))
    }

    /// Sum of consecutive edge weights along `route`, not closed.
    pub fn path_length(&self, route: &[usize]) -> Result<f64> {
        route.windows(2).try_fold(0.0, |acc, pair| {
            self.weight(pair[0], pair[1])
                .map(|w| acc + w)
                .ok_or(TspdError::MissingEdge { from: pair[0], to: pair[1] })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undirected_edges_are_symmetric() {
        let mut g = Graph::new(3, false);
        g.add_edge(0, 2, 4.5).unwrap();

        assert_eq!(g.weight(0, 2), Some(4.5));
        assert_eq!(g.weight(2, 0), Some(4.5));
        assert_eq!(g.weight(0, 1), None);
        assert_eq!(g.neighbors(2).collect::<Vec<_>>(), vec![(0, 4.5)]);
    }

    #[test]
    fn test_directed_edges() {
        let mut g = Graph::new(3, true);
        g.add_edge(0, 1, 1.0).unwrap();
        g.add_edge(2, 1, 3.0).unwrap();

        assert!(g.has_edge(0, 1));
        assert!(!g.has_edge(1, 0));
        assert_eq!(g.predecessors(1).collect::<Vec<_>>(), vec![(0, 1.0), (2, 3.0)]);
        assert_eq!(g.neighbors(1).count(), 0);
    }

    #[test]
    fn test_complete_graph() {
        let g = Graph::complete(5, 1.0);
        assert!(g.is_complete());
        assert_eq!(g.edges().count(), 20);
        assert_eq!(g.degree(3), 4);
        assert!(!g.has_edge(2, 2));
    }

    #[test]
    fn test_from_matrix_rejects_asymmetry() {
        let m = vec![vec![0.0, 1.0], vec![2.0, 0.0]];
        assert!(Graph::from_matrix(&m, false).is_err());
        let g = Graph::from_matrix(&m, true).unwrap();
        assert_eq!(g.weight(1, 0), Some(2.0));
    }

    #[test]
    fn test_invalid_edges_rejected() {
        let mut g = Graph::new(2, false);
        assert!(g.add_edge(0, 0, 1.0).is_err());
        assert!(g.add_edge(0, 5, 1.0).is_err());
        assert!(g.add_edge(0, 1, -1.0).is_err());
        assert!(g.add_edge(0, 1, f64::NAN).is_err());
    }

    #[test]
    fn test_out_of_range_weight_is_none() {
        let g = Graph::complete(3, 2.0);
        assert_eq!(g.weight(0, 3), None);
        assert_eq!(g.weight(4, 0), None);
        assert!(g.path_length(&[0, 1, 5]).is_err());
    }

    #[test]
    fn test_path_length_and_labels() {
        let mut g = Graph::with_labels(vec![10, 20, 30], false);
        g.add_edge(0, 1, 2.0).unwrap();
        g.add_edge(1, 2, 3.0).unwrap();

        assert_eq!(g.path_length(&[0, 1, 2]).unwrap(), 5.0);
        assert!(matches!(
            g.path_length(&[0, 2]),
            Err(TspdError::MissingEdge { from: 0, to: 2 })
        ));
        assert_eq!(g.index_of(30), Some(2));
        assert_eq!(g.label(1), 20);
    }
}
