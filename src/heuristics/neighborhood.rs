//! Neighborhood generation for local search.
//!
//! Both moves pick two positions `i + 1` and `j` of the base route with
//! `0 <= i < n - 3` and `i + 2 <= j < n` (`j < n - 1` when `i == 0`, so the
//! whole tour is never reversed against its start).
//!
//! - **2-opt** reverses the segment `route[i + 1..=j]`.
//! - **Swap** exchanges `route[i + 1]` and `route[j]`.
//!
//! A candidate is kept only when every edge of the candidate between positions
//! `i` and `j + 1` exists in the graph and none of them is tabu. For 2-opt
//! these are the two new boundary edges plus the reversed inner edges in their
//! new direction; for swap, the four edges around the exchanged nodes. Edges
//! the move removes are not checked against the tabu list. Generation order is
//! deterministic; each candidate is a fresh vector, never a view on a scratch
//! buffer.

use super::tabu::TabuList;
use crate::graph::Graph;
use serde::{Deserialize, Serialize};

/// Local move used to derive neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    #[default]
    TwoOpt,
    Swap,
}

impl std::fmt::Display for MoveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveKind::TwoOpt => write!(f, "2-opt"),
            MoveKind::Swap => write!(f, "swap"),
        }
    }
}

impl MoveKind {
    /// Node found at position `p` once the move `(i, j)` is applied.
    #[inline]
    fn node_at(self, route: &[usize], i: usize, j: usize, p: usize) -> usize {
        match self {
            MoveKind::TwoOpt if p > i && p <= j => route[i + 1 + j - p],
            MoveKind::Swap if p == i + 1 => route[j],
            MoveKind::Swap if p == j => route[i + 1],
            _ => route[p],
        }
    }

    /// Positions `p` whose outgoing edge `p -> p + 1` changes under `(i, j)`.
    fn touched(self, i: usize, j: usize) -> Vec<usize> {
        match self {
            MoveKind::TwoOpt => (i..=j).collect(),
            MoveKind::Swap => vec![i, i + 1, j - 1, j],
        }
    }

    fn apply(self, route: &mut [usize], i: usize, j: usize) {
        match self {
            MoveKind::TwoOpt => route[i + 1..=j].reverse(),
            MoveKind::Swap => route.swap(i + 1, j),
        }
    }
}

/// Every valid, non-tabu neighbor of `route` under `kind`.
///
/// Routes with fewer than 4 nodes have no neighbors.
pub fn neighborhood(
    graph: &Graph,
    route: &[usize],
    kind: MoveKind,
    tabu: Option<&TabuList>,
) -> Vec<Vec<usize>> {
    let n = route.len();
    let mut neighbors = Vec::new();
    if n < 4 {
        return neighbors;
    }

    for i in 0..n - 3 {
        let end = if i == 0 { n - 1 } else { n };
        for j in i + 2..end {
            let usable = kind.touched(i, j).into_iter().all(|p| {
                let from = kind.node_at(route, i, j, p);
                let to = kind.node_at(route, i, j, (p + 1) % n);
                graph.has_edge(from, to) && !tabu.map_or(false, |t| t.is_tabu(from, to))
            });
            if !usable {
                continue;
            }

            let mut candidate = route.to_vec();
            kind.apply(&mut candidate, i, j);
            neighbors.push(candidate);
        }
    }

    neighbors
}
