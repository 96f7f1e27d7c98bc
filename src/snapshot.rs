//! Lossless snapshot format for cold restarts.
//!
//! Snapshots are deterministic: nodes are ordered by id, edges by
//! `(source, target)` and pair counts by pair. Associative edges are written
//! once per undirected pair and re-expanded on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MemoryError;
use crate::memory::{MemoryNode, NodeType};
use crate::relationship::{EdgeType, MemoryEdge, canonicalize};
use crate::store::MemoryGraph;

/// Co-occurrence count of an unordered concept pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCount {
    /// Canonical pair, smaller id first.
    pub pair: (String, String),
    pub count: u64,
}

/// Serialized form of a [`MemoryGraph`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedGraph {
    pub nodes: Vec<MemoryNode>,
    pub edges: Vec<MemoryEdge>,
    #[serde(default)]
    pub concept_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub pair_counts: Vec<PairCount>,
    #[serde(default)]
    pub total_observations: u64,
}

impl SerializedGraph {
    /// Encode as a JSON document.
    pub fn encode(&self) -> Result<String, MemoryError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON document produced by [`encode`](Self::encode).
    pub fn decode(json: &str) -> Result<Self, MemoryError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl MemoryGraph {
    /// Capture the full state: nodes, edges and counters.
    pub fn to_json(&self) -> SerializedGraph {
        let edges = self
            .edges()
            .filter(|edge| match edge.edge_type {
                // One direction per undirected pair.
                EdgeType::Associative => edge.source_id < edge.target_id,
                EdgeType::Hierarchical => true,
            })
            .cloned()
            .collect();

        let pair_counts = self
            .pair_counts
            .iter()
            .map(|(pair, count)| PairCount {
                pair: pair.clone(),
                count: *count,
            })
            .collect();

        SerializedGraph {
            nodes: self.nodes.values().cloned().collect(),
            edges,
            concept_counts: self.concept_counts.clone(),
            pair_counts,
            total_observations: self.total_observations,
        }
    }

    /// Rebuild a graph from a snapshot.
    ///
    /// Edges go through the regular edge-creation path, so associative edges
    /// regain their reverse direction. Edges naming an unknown node are
    /// dropped, and topic nodes lose any passage ids they were saved with.
    pub fn from_json(data: SerializedGraph) -> Self {
        let mut graph = MemoryGraph::new();

        for mut node in data.nodes {
            if node.node_type == NodeType::Topic {
                node.source_passage_ids.clear();
            }
            graph.nodes.insert(node.id.clone(), node);
        }

        let mut dropped = 0usize;
        for edge in &data.edges {
            if !graph.nodes.contains_key(&edge.source_id) || !graph.nodes.contains_key(&edge.target_id)
            {
                dropped += 1;
                continue;
            }
            graph.add_edge(&edge.source_id, &edge.target_id, edge.weight, edge.edge_type);
        }
        if dropped > 0 {
            warn!(dropped, "snapshot edges referenced unknown nodes");
        }

        graph.concept_counts = data.concept_counts;
        for PairCount { pair: (a, b), count } in data.pair_counts {
            graph.pair_counts.insert(canonicalize(&a, &b), count);
        }
        graph.total_observations = data.total_observations;

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            total_observations = graph.total_observations,
            "graph restored from snapshot"
        );
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractedElements;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn update(graph: &mut MemoryGraph, concepts: &[&str], topics: &[&str], passage: &str) {
        let elements = ExtractedElements::new(
            concepts.iter().map(|s| s.to_string()).collect(),
            topics.iter().map(|s| s.to_string()).collect(),
        );
        graph.incremental_update(&elements, passage);
    }

    fn sample_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        update(&mut graph, &["React", "Vite"], &["Frontend Development"], "p1");
        update(&mut graph, &["React", "Redux", "Vite"], &["Frontend Development", "State"], "p2");
        update(&mut graph, &["Tokio"], &["Async"], "p3");
        update(&mut graph, &["Tokio", "React"], &[], "p4");
        graph
    }

    fn assert_symmetric(graph: &MemoryGraph) {
        for edge in graph.edges() {
            let reverse = graph.edge(&edge.target_id, &edge.source_id);
            match edge.edge_type {
                EdgeType::Associative => {
                    let reverse = reverse.expect("associative edge without reverse");
                    assert_eq!(reverse.edge_type, EdgeType::Associative);
                    assert_eq!(reverse.weight, edge.weight);
                }
                EdgeType::Hierarchical => {
                    assert!(reverse.is_none_or(|r| r.edge_type != EdgeType::Hierarchical));
                }
            }
        }
    }

    #[test]
    fn test_associative_edges_deduplicated() {
        let graph = sample_graph();
        let data = graph.to_json();

        let associative = data
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Associative)
            .count();
        // React-Vite, React-Redux, Redux-Vite, React-Tokio
        assert_eq!(associative, 4);
        assert_eq!(graph.stats().associative_edge_count, 4);

        let hierarchical = data
            .edges
            .iter()
            .filter(|e| e.edge_type == EdgeType::Hierarchical)
            .count();
        assert_eq!(hierarchical, graph.stats().hierarchical_edge_count);
    }

    #[test]
    fn test_round_trip_restores_graph() {
        let graph = sample_graph();
        let restored = MemoryGraph::from_json(graph.to_json());

        assert_eq!(restored, graph);
        assert_symmetric(&restored);
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let graph = sample_graph();
        let first = graph.to_json().encode().unwrap();

        let decoded = SerializedGraph::decode(&first).unwrap();
        let second = MemoryGraph::from_json(decoded).to_json().encode().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_snapshot_field_names() {
        let graph = sample_graph();
        let json: serde_json::Value = serde_json::from_str(&graph.to_json().encode().unwrap()).unwrap();

        assert_eq!(json["totalObservations"], 4);
        assert_eq!(json["conceptCounts"]["React"], 3);
        let react = json["nodes"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["id"] == "React")
            .unwrap();
        assert_eq!(react["type"], "concept");
        assert_eq!(react["sourcePassageIds"], serde_json::json!(["p1", "p2", "p4"]));
        assert!(react["lastAccessed"].is_string());
    }

    #[test]
    fn test_drops_dangling_edges_and_topic_passages() {
        let mut data = sample_graph().to_json();
        data.edges.push(MemoryEdge::associative("React", "Ghost", 2.0));
        for node in &mut data.nodes {
            if node.node_type == NodeType::Topic {
                node.source_passage_ids.insert("leak".to_string());
            }
        }

        let graph = MemoryGraph::from_json(data);
        assert!(graph.edge("React", "Ghost").is_none());
        assert!(graph.neighbors("Ghost").next().is_none());
        assert!(
            graph
                .nodes()
                .filter(|n| n.node_type == NodeType::Topic)
                .all(|n| n.source_passage_ids.is_empty())
        );
    }

    #[test]
    fn test_empty_graph_round_trip() {
        let json = MemoryGraph::new().to_json().encode().unwrap();
        assert_eq!(
            json,
            r#"{"nodes":[],"edges":[],"conceptCounts":{},"pairCounts":[],"totalObservations":0}"#
        );
        let graph = MemoryGraph::from_json(SerializedGraph::decode(&json).unwrap());
        assert_eq!(graph, MemoryGraph::new());
    }

    fn label() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["rust", "tokio", "serde", "axum", "sqlite"]).prop_map(String::from)
    }

    proptest! {
        #[test]
        fn serialization_is_idempotent(
            history in prop::collection::vec(
                (prop::collection::vec(label(), 0..4), prop::collection::vec(label(), 0..2)),
                0..10,
            ),
            lambda in 0.0f64..0.2,
            threshold in 0.0f64..1.5,
        ) {
            let mut graph = MemoryGraph::new();
            for (i, (concepts, topics)) in history.into_iter().enumerate() {
                graph.incremental_update(&ExtractedElements::new(concepts, topics), &format!("p{}", i));
            }
            graph.apply_decay(lambda);
            graph.prune_graph(threshold);

            let first = graph.to_json().encode().unwrap();
            let restored = MemoryGraph::from_json(SerializedGraph::decode(&first).unwrap());
            let second = restored.to_json().encode().unwrap();

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(restored.edge_count(), graph.edge_count());
            for edge in restored.edges().filter(|e| e.edge_type == EdgeType::Associative) {
                prop_assert!(restored.edge(&edge.target_id, &edge.source_id).is_some());
            }
        }
    }
}
