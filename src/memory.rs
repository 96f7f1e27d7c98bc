//! Memory node data structures.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ACTIVATION_BOOST, INITIAL_ACTIVATION, MAX_ACTIVATION};

/// Opaque identifier of a source text chunk.
pub type PassageId = String;

/// Kind of node in the memory graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// A content-bearing concept. Holds the passages it was mentioned in.
    Concept,
    /// A topic hub. Routes activation but never holds passages.
    Topic,
}

/// A concept or topic in the memory graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Long-term salience, independent of any single retrieval.
    pub base_activation: f64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Always empty for topic nodes.
    #[serde(default)]
    pub source_passage_ids: BTreeSet<PassageId>,
}

impl MemoryNode {
    /// Create a freshly mentioned node.
    pub fn new(id: impl Into<String>, node_type: NodeType, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            node_type,
            base_activation: INITIAL_ACTIVATION,
            created_at: now,
            last_accessed: now,
            source_passage_ids: BTreeSet::new(),
        }
    }

    pub fn is_concept(&self) -> bool {
        self.node_type == NodeType::Concept
    }

    /// Record a re-mention: bump the access time and boost activation up to the cap.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed = now;
        self.base_activation = (self.base_activation + ACTIVATION_BOOST).min(MAX_ACTIVATION);
    }

    /// Attach a passage. Topic nodes ignore this.
    pub(crate) fn attach_passage(&mut self, passage_id: &str) {
        if self.is_concept() {
            self.source_passage_ids.insert(passage_id.to_string());
        }
    }
}

/// Summary statistics of a graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub concept_count: usize,
    pub topic_count: usize,
    /// Undirected associative pairs (each counted once).
    pub associative_edge_count: usize,
    pub hierarchical_edge_count: usize,
    pub total_observations: u64,
    /// Mean base activation over all nodes (0.0 for an empty graph).
    pub mean_activation: f64,
}
