//! Edge types and co-occurrence strength calculations.

use serde::{Deserialize, Serialize};

use crate::HIERARCHICAL_WEIGHT;

/// Kind of relationship between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    /// Undirected concept-concept co-occurrence, weighted by PPMI.
    Associative,
    /// Directed concept-topic membership with a fixed weight.
    Hierarchical,
}

/// A single directed adjacency entry.
///
/// Associative relationships are stored as two entries, one per direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEdge {
    pub source_id: String,
    pub target_id: String,
    pub weight: f64,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}

impl MemoryEdge {
    pub fn associative(source: &str, target: &str, weight: f64) -> Self {
        Self {
            source_id: source.to_string(),
            target_id: target.to_string(),
            weight,
            edge_type: EdgeType::Associative,
        }
    }

    pub fn hierarchical(source: &str, target: &str) -> Self {
        Self {
            source_id: source.to_string(),
            target_id: target.to_string(),
            weight: HIERARCHICAL_WEIGHT,
            edge_type: EdgeType::Hierarchical,
        }
    }
}

/// Canonical key for an unordered pair of concepts (smaller first).
pub type PairKey = (String, String);

/// Canonicalize two ids for pair storage (smaller first).
pub(crate) fn canonicalize(a: &str, b: &str) -> PairKey {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Positive pointwise mutual information of a concept pair.
///
/// `log2(p(x,y) / (p(x) * p(y)))` clamped at zero. Any zero probability
/// yields 0.0.
pub fn ppmi(pair_count: u64, count_x: u64, count_y: u64, total: u64) -> f64 {
    if total == 0 || pair_count == 0 || count_x == 0 || count_y == 0 {
        return 0.0;
    }

    let total = total as f64;
    let p_xy = pair_count as f64 / total;
    let p_x = count_x as f64 / total;
    let p_y = count_y as f64 / total;

    (p_xy / (p_x * p_y)).log2().max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("Vite", "React"), ("React".into(), "Vite".into()));
        assert_eq!(canonicalize("React", "Vite"), ("React".into(), "Vite".into()));
    }

    #[test]
    fn test_ppmi_single_observation_is_zero() {
        assert_eq!(ppmi(1, 1, 1, 1), 0.0);
    }

    #[test]
    fn test_ppmi_zero_probabilities() {
        assert_eq!(ppmi(0, 3, 3, 10), 0.0);
        assert_eq!(ppmi(1, 0, 3, 10), 0.0);
        assert_eq!(ppmi(1, 3, 0, 10), 0.0);
        assert_eq!(ppmi(1, 1, 1, 0), 0.0);
    }

    #[test]
    fn test_ppmi_positive_association() {
        // Pair seen 2 of 4 observations, each concept only in those 2.
        // p(x,y) = 0.5, p(x) = p(y) = 0.5 => log2(0.5 / 0.25) = 1.
        let w = ppmi(2, 2, 2, 4);
        assert!((w - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ppmi_clamps_negative() {
        // Concepts common on their own but rarely together.
        // p(x,y) = 0.1, p(x) = p(y) = 0.9 => log2(0.1 / 0.81) < 0.
        assert_eq!(ppmi(1, 9, 9, 10), 0.0);
    }

    #[test]
    fn test_hierarchical_edge_weight() {
        let edge = MemoryEdge::hierarchical("React", "Frontend");
        assert_eq!(edge.weight, 1.0);
        assert_eq!(edge.edge_type, EdgeType::Hierarchical);
    }
}
