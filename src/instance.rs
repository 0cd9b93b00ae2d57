//! Module for parsing TSPLIB instances into the graph model.
//!
//! This module handles the TSP-LIB format files used for the TSPd experiments.
//! Both coordinate instances (EUC_2D, CEIL_2D, MAN_2D, MAX_2D, ATT, GEO) and
//! explicit edge-weight matrices (full or triangular) are supported. The
//! result is always a complete graph; ATSP instances produce a directed one.

use crate::error::{Result, TspdError};
use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Symmetric (`TSP`) or asymmetric (`ATSP`) problem.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ProblemType {
    Symmetric,
    Asymmetric,
}

/// How edge weights are obtained
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum EdgeWeightType {
    Explicit,
    Euclidean2D,
    Ceil2D,
    Manhattan2D,
    Maximum2D,
    PseudoEuclidean,
    Geographical,
}

/// Layout of an explicit EDGE_WEIGHT_SECTION
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum EdgeWeightFormat {
    FullMatrix,
    UpperRow,
    LowerRow,
    UpperDiagRow,
    LowerDiagRow,
}

/// A loaded TSPd instance
#[derive(Debug, Clone)]
pub struct TspdInstance {
    /// Name of the instance
    pub name: String,
    /// Comment/description
    pub comment: String,
    pub problem_type: ProblemType,
    /// Complete graph over the instance's cities
    pub graph: Graph,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Section {
    Header,
    Coords,
    Weights,
    Ignored,
}

fn parse_error(line: usize, message: impl Into<String>) -> TspdError {
    TspdError::Parse { line, message: message.into() }
}

impl TspdInstance {
    /// Parse a TSPLIB file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(&path)?;
        let mut instance = Self::parse(&text)?;
        if instance.name.is_empty() {
            instance.name = path
                .as_ref()
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
        }
        Ok(instance)
    }

    /// Parse TSPLIB content held in memory
    pub fn parse(text: &str) -> Result<Self> {
        let mut name = String::new();
        let mut comment = String::new();
        let mut problem_type = ProblemType::Symmetric;
        let mut dimension: Option<usize> = None;
        let mut weight_type: Option<EdgeWeightType> = None;
        let mut weight_format: Option<EdgeWeightFormat> = None;
        let mut coords: Vec<(usize, f64, f64)> = Vec::new();
        let mut weights: Vec<f64> = Vec::new();

        let mut section = Section::Header;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.is_empty() {
                continue;
            }
            if line == "EOF" {
                break;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                let value = value.trim();
                section = Section::Header;
                match key {
                    "NAME" => name = value.to_string(),
                    "COMMENT" => {
                        if !comment.is_empty() {
                            comment.push(' ');
                        }
                        comment.push_str(value);
                    }
                    "TYPE" => {
                        problem_type = match value {
                            "TSP" => ProblemType::Symmetric,
                            "ATSP" => ProblemType::Asymmetric,
                            other => {
                                return Err(parse_error(line_no, format!("unsupported problem type {}", other)))
                            }
                        }
                    }
                    "DIMENSION" => {
                        dimension = Some(
                            value
                                .parse()
                                .map_err(|_| parse_error(line_no, "invalid dimension"))?,
                        )
                    }
                    "EDGE_WEIGHT_TYPE" => {
                        weight_type = Some(match value {
                            "EXPLICIT" => EdgeWeightType::Explicit,
                            "EUC_2D" => EdgeWeightType::Euclidean2D,
                            "CEIL_2D" => EdgeWeightType::Ceil2D,
                            "MAN_2D" => EdgeWeightType::Manhattan2D,
                            "MAX_2D" => EdgeWeightType::Maximum2D,
                            "ATT" => EdgeWeightType::PseudoEuclidean,
                            "GEO" => EdgeWeightType::Geographical,
                            other => {
                                return Err(parse_error(line_no, format!("unsupported edge weight type {}", other)))
                            }
                        })
                    }
                    "EDGE_WEIGHT_FORMAT" => {
                        weight_format = Some(match value {
                            "FULL_MATRIX" => EdgeWeightFormat::FullMatrix,
                            "UPPER_ROW" => EdgeWeightFormat::UpperRow,
                            "LOWER_ROW" => EdgeWeightFormat::LowerRow,
                            "UPPER_DIAG_ROW" => EdgeWeightFormat::UpperDiagRow,
                            "LOWER_DIAG_ROW" => EdgeWeightFormat::LowerDiagRow,
                            other => {
                                return Err(parse_error(line_no, format!("unsupported edge weight format {}", other)))
                            }
                        })
                    }
                    // DISPLAY_DATA_TYPE, NODE_COORD_TYPE, CAPACITY...
                    _ => {}
                }
                continue;
            }

            match line {
                "NODE_COORD_SECTION" => {
                    section = Section::Coords;
                    continue;
                }
                "EDGE_WEIGHT_SECTION" => {
                    section = Section::Weights;
                    continue;
                }
                _ if line.ends_with("_SECTION") => {
                    section = Section::Ignored;
                    continue;
                }
                _ => {}
            }

            match section {
                Section::Coords => {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    if parts.len() < 3 {
                        return Err(parse_error(line_no, "coordinate line needs id, x and y"));
                    }
                    let id: usize = parts[0].parse().map_err(|_| parse_error(line_no, "invalid node id"))?;
                    let x: f64 = parts[1].parse().map_err(|_| parse_error(line_no, "invalid x coordinate"))?;
                    let y: f64 = parts[2].parse().map_err(|_| parse_error(line_no, "invalid y coordinate"))?;
                    coords.push((id, x, y));
                }
                Section::Weights => {
                    for token in line.split_whitespace() {
                        let w: f64 = token
                            .parse()
                            .map_err(|_| parse_error(line_no, format!("invalid weight {}", token)))?;
                        weights.push(w);
                    }
                }
                Section::Header => {
                    return Err(parse_error(line_no, format!("unexpected line {}", line)));
                }
                Section::Ignored => {}
            }
        }

        let weight_type = weight_type.ok_or_else(|| parse_error(0, "missing EDGE_WEIGHT_TYPE"))?;
        let directed = problem_type == ProblemType::Asymmetric;

        let graph = match weight_type {
            EdgeWeightType::Explicit => {
                let n = dimension.ok_or_else(|| parse_error(0, "missing DIMENSION"))?;
                let format = weight_format.unwrap_or(EdgeWeightFormat::FullMatrix);
                let matrix = explicit_matrix(n, format, &weights)?;
                Graph::from_matrix(&matrix, directed)?
            }
            metric => {
                if let Some(n) = dimension {
                    if n != coords.len() {
                        return Err(parse_error(
                            0,
                            format!("DIMENSION is {} but {} coordinates were given", n, coords.len()),
                        ));
                    }
                }
                coordinate_graph(&coords, metric, directed)?
            }
        };

        log::debug!(
            "parsed instance {} ({} nodes, {:?}, {:?})",
            name,
            graph.len(),
            problem_type,
            weight_type
        );

        Ok(TspdInstance {
            name,
            comment,
            problem_type,
            graph,
        })
    }

    /// Number of cities
    pub fn dimension(&self) -> usize {
        self.graph.len()
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let weights: Vec<f64> = self.graph.edges().map(|(_, _, w)| w).collect();
        let (min_weight, max_weight, avg_weight) = if weights.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                weights.iter().cloned().fold(f64::INFINITY, f64::min),
                weights.iter().cloned().fold(0.0, f64::max),
                weights.iter().sum::<f64>() / weights.len() as f64,
            )
        };

        InstanceStatistics {
            name: self.name.clone(),
            dimension: self.graph.len(),
            directed: self.graph.is_directed(),
            num_edges: weights.len(),
            min_weight,
            max_weight,
            avg_weight,
        }
    }
}

/// Expand the flat token list of an EDGE_WEIGHT_SECTION into a square matrix
fn explicit_matrix(n: usize, format: EdgeWeightFormat, weights: &[f64]) -> Result<Vec<Vec<f64>>> {
    let cells: Vec<(usize, usize)> = match format {
        EdgeWeightFormat::FullMatrix => (0..n).flat_map(|i| (0..n).map(move |j| (i, j))).collect(),
        EdgeWeightFormat::UpperRow => (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect(),
        EdgeWeightFormat::LowerRow => (0..n).flat_map(|i| (0..i).map(move |j| (i, j))).collect(),
        EdgeWeightFormat::UpperDiagRow => (0..n).flat_map(|i| (i..n).map(move |j| (i, j))).collect(),
        EdgeWeightFormat::LowerDiagRow => (0..n).flat_map(|i| (0..=i).map(move |j| (i, j))).collect(),
    };

    if weights.len() != cells.len() {
        return Err(parse_error(
            0,
            format!("{:?} with dimension {} needs {} weights, found {}", format, n, cells.len(), weights.len()),
        ));
    }

    let mut matrix = vec![vec![0.0; n]; n];
    for (&(i, j), &w) in cells.iter().zip(weights) {
        matrix[i][j] = w;
        if format != EdgeWeightFormat::FullMatrix {
            matrix[j][i] = w;
        }
    }
    Ok(matrix)
}

fn nint(x: f64) -> f64 {
    (x + 0.5).floor()
}

fn geo_radians(x: f64) -> f64 {
    const PI: f64 = 3.141592;
    let deg = x.trunc();
    let min = x - deg;
    PI * (deg + 5.0 * min / 3.0) / 180.0
}

/// TSPLIB distance between two coordinates
fn metric_distance(metric: EdgeWeightType, a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    match metric {
        EdgeWeightType::Euclidean2D => nint((dx * dx + dy * dy).sqrt()),
        EdgeWeightType::Ceil2D => (dx * dx + dy * dy).sqrt().ceil(),
        EdgeWeightType::Manhattan2D => nint(dx.abs() + dy.abs()),
        EdgeWeightType::Maximum2D => nint(dx.abs()).max(nint(dy.abs())),
        EdgeWeightType::PseudoEuclidean => {
            let r = ((dx * dx + dy * dy) / 10.0).sqrt();
            let t = nint(r);
            if t < r {
                t + 1.0
            } else {
                t
            }
        }
        EdgeWeightType::Geographical => {
            const RRR: f64 = 6378.388;
            let (lat_a, lon_a) = (geo_radians(a.0), geo_radians(a.1));
            let (lat_b, lon_b) = (geo_radians(b.0), geo_radians(b.1));
            let q1 = (lon_a - lon_b).cos();
            let q2 = (lat_a - lat_b).cos();
            let q3 = (lat_a + lat_b).cos();
            let cos = (0.5 * ((1.0 + q1) * q2 - (1.0 - q1) * q3)).clamp(-1.0, 1.0);
            (RRR * cos.acos() + 1.0).trunc()
        }
        EdgeWeightType::Explicit => unreachable!("explicit weights have no coordinates"),
    }
}

fn coordinate_graph(coords: &[(usize, f64, f64)], metric: EdgeWeightType, directed: bool) -> Result<Graph> {
    let labels: Vec<usize> = coords.iter().map(|&(id, _, _)| id).collect();
    let mut graph = Graph::with_labels(labels, directed);

    for (i, &(_, xi, yi)) in coords.iter().enumerate() {
        for (j, &(_, xj, yj)) in coords.iter().enumerate() {
            if i == j || (!directed && j < i) {
                continue;
            }
            graph.add_edge(i, j, metric_distance(metric, (xi, yi), (xj, yj)))?;
        }
    }

    Ok(graph)
}

/// Statistics about a TSPd instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub dimension: usize,
    pub directed: bool,
    pub num_edges: usize,
    pub min_weight: f64,
    pub max_weight: f64,
    pub avg_weight: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Nodes: {}", self.dimension)?;
        writeln!(f, "  Directed: {}", self.directed)?;
        writeln!(f, "  Edges (directed): {}", self.num_edges)?;
        writeln!(f, "  Min weight: {:.2}", self.min_weight)?;
        writeln!(f, "  Avg weight: {:.2}", self.avg_weight)?;
        writeln!(f, "  Max weight: {:.2}", self.max_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOWER_DIAG: &str = "\
NAME: tiny4
TYPE: TSP
COMMENT: 4 cities
DIMENSION: 4
EDGE_WEIGHT_TYPE: EXPLICIT
EDGE_WEIGHT_FORMAT: LOWER_DIAG_ROW
EDGE_WEIGHT_SECTION
0
3 0
4 5 0
2 6 7 0
EOF
";

    #[test]
    fn test_lower_diag_row() {
        let instance = TspdInstance::parse(LOWER_DIAG).unwrap();
        let g = &instance.graph;

        assert_eq!(instance.name, "tiny4");
        assert_eq!(instance.dimension(), 4);
        assert!(g.is_complete());
        assert_eq!(g.weight(1, 0), Some(3.0));
        assert_eq!(g.weight(0, 2), Some(4.0));
        assert_eq!(g.weight(3, 2), Some(7.0));
        assert_eq!(g.labels(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_upper_row_spanning_lines() {
        let text = "NAME : up\nTYPE : TSP\nDIMENSION : 3\nEDGE_WEIGHT_TYPE : EXPLICIT\n\
                    EDGE_WEIGHT_FORMAT : UPPER_ROW\nEDGE_WEIGHT_SECTION\n 10\n 20 30\nEOF\n";
        let instance = TspdInstance::parse(text).unwrap();
        assert_eq!(instance.graph.weight(0, 1), Some(10.0));
        assert_eq!(instance.graph.weight(2, 0), Some(20.0));
        assert_eq!(instance.graph.weight(1, 2), Some(30.0));
    }

    #[test]
    fn test_euclidean_coordinates() {
        let text = "NAME: euc\nTYPE: TSP\nDIMENSION: 3\nEDGE_WEIGHT_TYPE: EUC_2D\n\
                    NODE_COORD_SECTION\n1 0 0\n2 3 4\n3 0 1.4\nEOF\n";
        let instance = TspdInstance::parse(text).unwrap();
        let g = &instance.graph;

        assert_eq!(g.weight(0, 1), Some(5.0));
        assert_eq!(g.weight(0, 2), Some(1.0));
        assert_eq!(g.labels(), &[1, 2, 3]);
    }

    #[test]
    fn test_atsp_is_directed() {
        let text = "NAME: a\nTYPE: ATSP\nDIMENSION: 2\nEDGE_WEIGHT_TYPE: EXPLICIT\n\
                    EDGE_WEIGHT_FORMAT: FULL_MATRIX\nEDGE_WEIGHT_SECTION\n0 1\n9 0\nEOF\n";
        let instance = TspdInstance::parse(text).unwrap();
        assert!(instance.graph.is_directed());
        assert_eq!(instance.graph.weight(0, 1), Some(1.0));
        assert_eq!(instance.graph.weight(1, 0), Some(9.0));
    }

    #[test]
    fn test_malformed_inputs() {
        let missing_type = "NAME: x\nDIMENSION: 2\nEOF\n";
        assert!(TspdInstance::parse(missing_type).is_err());

        let short = "NAME: x\nDIMENSION: 3\nEDGE_WEIGHT_TYPE: EXPLICIT\nEDGE_WEIGHT_FORMAT: UPPER_ROW\n\
                     EDGE_WEIGHT_SECTION\n1 2\nEOF\n";
        assert!(matches!(TspdInstance::parse(short), Err(TspdError::Parse { .. })));

        let bad_coord = "NAME: x\nEDGE_WEIGHT_TYPE: EUC_2D\nNODE_COORD_SECTION\n1 a 2\nEOF\n";
        assert!(matches!(
            TspdInstance::parse(bad_coord),
            Err(TspdError::Parse { line: 4, .. })
        ));
    }

    #[test]
    fn test_pseudo_euclidean_rounds_up() {
        let d = metric_distance(EdgeWeightType::PseudoEuclidean, (0.0, 0.0), (10.0, 0.0));
        // sqrt(100 / 10) = 3.162..., nint = 3 < r, so 4
        assert_eq!(d, 4.0);
    }
}
