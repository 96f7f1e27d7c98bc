//! MemoryGraph - the main API for the associative memory system.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::extract::ExtractedElements;
use crate::memory::{GraphStats, MemoryNode, NodeType, PassageId};
use crate::relationship::{EdgeType, MemoryEdge, PairKey, canonicalize, ppmi};
use crate::search::{RetrievalResult, spread_activation};
use crate::{HIERARCHICAL_WEIGHT, MS_PER_HOUR, RetrievalParams};

/// An incremental associative memory over concepts and topics.
///
/// Owns every node, the adjacency maps and the co-occurrence counters. All
/// state is per instance, so one graph per user or session is safe. The graph
/// performs no I/O and no locking: callers that share it across threads must
/// serialize access themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryGraph {
    pub(crate) nodes: BTreeMap<String, MemoryNode>,
    /// source id -> target id -> edge
    pub(crate) adjacency: BTreeMap<String, BTreeMap<String, MemoryEdge>>,
    pub(crate) concept_counts: BTreeMap<String, u64>,
    pub(crate) pair_counts: BTreeMap<PairKey, u64>,
    pub(crate) total_observations: u64,
}

impl MemoryGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one extraction result for a passage.
    ///
    /// An empty concept list is a no-op, whatever the topics are.
    pub fn incremental_update(&mut self, elements: &ExtractedElements, passage_id: &str) {
        self.incremental_update_at(elements, passage_id, Utc::now());
    }

    /// Same as [`incremental_update`](Self::incremental_update) with an explicit clock.
    pub fn incremental_update_at(
        &mut self,
        elements: &ExtractedElements,
        passage_id: &str,
        now: DateTime<Utc>,
    ) {
        let concepts = unique(&elements.concepts);
        if concepts.is_empty() {
            debug!(passage_id, "no concepts extracted, graph unchanged");
            return;
        }
        let topics = unique(&elements.topics);

        for concept in &concepts {
            self.upsert_node(concept, NodeType::Concept, passage_id, now);
        }
        for topic in &topics {
            self.upsert_node(topic, NodeType::Topic, passage_id, now);
        }

        self.total_observations += 1;
        for concept in &concepts {
            *self.concept_counts.entry((*concept).to_string()).or_insert(0) += 1;
        }

        let mut pairs = Vec::new();
        for i in 0..concepts.len() {
            for j in (i + 1)..concepts.len() {
                let key = canonicalize(concepts[i], concepts[j]);
                *self.pair_counts.entry(key.clone()).or_insert(0) += 1;
                pairs.push(key);
            }
        }

        // Weights are recomputed from the global statistics after all counters moved.
        for (a, b) in &pairs {
            let weight = self.pair_weight(a, b);
            self.add_edge(a, b, weight, EdgeType::Associative);
        }

        for concept in &concepts {
            for topic in &topics {
                self.add_edge(concept, topic, HIERARCHICAL_WEIGHT, EdgeType::Hierarchical);
            }
        }

        debug!(
            passage_id,
            concepts = concepts.len(),
            topics = topics.len(),
            pairs = pairs.len(),
            total_observations = self.total_observations,
            "graph updated"
        );
    }

    /// Spread activation from the seed concepts and return the passages of the
    /// most activated concepts.
    pub fn retrieve_context(
        &self,
        seed_concepts: &[String],
        params: &RetrievalParams,
    ) -> BTreeSet<PassageId> {
        self.retrieve_activations(seed_concepts, params).passage_ids
    }

    /// Full retrieval result including the ranked activation list.
    pub fn retrieve_activations(
        &self,
        seed_concepts: &[String],
        params: &RetrievalParams,
    ) -> RetrievalResult {
        spread_activation(self, seed_concepts, params)
    }

    /// Exponentially decay every node's base activation by the hours since it
    /// was last accessed.
    pub fn apply_decay(&mut self, lambda: f64) {
        self.apply_decay_at(lambda, Utc::now());
    }

    /// Same as [`apply_decay`](Self::apply_decay) with an explicit clock.
    pub fn apply_decay_at(&mut self, lambda: f64, now: DateTime<Utc>) {
        for node in self.nodes.values_mut() {
            // Clock skew must not boost activation.
            let elapsed_ms = (now - node.last_accessed).num_milliseconds().max(0);
            let delta_hours = elapsed_ms as f64 / MS_PER_HOUR;
            node.base_activation *= (-lambda * delta_hours).exp();
        }
        info!(lambda, nodes = self.nodes.len(), "decay applied");
    }

    /// Remove every node whose base activation is below `threshold`, together
    /// with every edge touching it. Returns the number of removed nodes.
    ///
    /// Co-occurrence counters are left untouched.
    pub fn prune_graph(&mut self, threshold: f64) -> usize {
        let doomed: BTreeSet<String> = self
            .nodes
            .values()
            .filter(|n| n.base_activation < threshold)
            .map(|n| n.id.clone())
            .collect();

        if doomed.is_empty() {
            return 0;
        }

        for id in &doomed {
            self.nodes.remove(id);
            self.adjacency.remove(id);
        }
        for edges in self.adjacency.values_mut() {
            edges.retain(|target, _| !doomed.contains(target));
        }
        self.adjacency.retain(|_, edges| !edges.is_empty());

        info!(threshold, removed = doomed.len(), remaining = self.nodes.len(), "graph pruned");
        doomed.len()
    }

    /// Drop all nodes, edges and counters.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn node(&self, id: &str) -> Option<&MemoryNode> {
        self.nodes.get(id)
    }

    /// All nodes, ordered by id.
    pub fn nodes(&self) -> impl Iterator<Item = &MemoryNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Directed adjacency entries. An associative pair counts twice.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|edges| edges.len()).sum()
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&MemoryEdge> {
        self.adjacency.get(source).and_then(|edges| edges.get(target))
    }

    /// Outgoing edges of a node, ordered by target id.
    pub fn neighbors(&self, id: &str) -> impl Iterator<Item = &MemoryEdge> {
        self.adjacency.get(id).into_iter().flat_map(|edges| edges.values())
    }

    /// All directed adjacency entries, ordered by (source, target).
    pub fn edges(&self) -> impl Iterator<Item = &MemoryEdge> {
        self.adjacency.values().flat_map(|edges| edges.values())
    }

    pub fn concept_count(&self, concept: &str) -> u64 {
        self.concept_counts.get(concept).copied().unwrap_or(0)
    }

    pub fn pair_count(&self, a: &str, b: &str) -> u64 {
        self.pair_counts.get(&canonicalize(a, b)).copied().unwrap_or(0)
    }

    pub fn total_observations(&self) -> u64 {
        self.total_observations
    }

    pub fn stats(&self) -> GraphStats {
        let concept_count = self.nodes.values().filter(|n| n.is_concept()).count();
        let mut associative = 0;
        let mut hierarchical = 0;
        for edge in self.edges() {
            match edge.edge_type {
                EdgeType::Associative => associative += 1,
                EdgeType::Hierarchical => hierarchical += 1,
            }
        }
        let mean_activation = if self.nodes.is_empty() {
            0.0
        } else {
            self.nodes.values().map(|n| n.base_activation).sum::<f64>() / self.nodes.len() as f64
        };

        GraphStats {
            concept_count,
            topic_count: self.nodes.len() - concept_count,
            associative_edge_count: associative / 2,
            hierarchical_edge_count: hierarchical,
            total_observations: self.total_observations,
            mean_activation,
        }
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Create a node on first mention, otherwise record the re-mention.
    fn upsert_node(&mut self, id: &str, node_type: NodeType, passage_id: &str, now: DateTime<Utc>) {
        match self.nodes.entry(id.to_string()) {
            Entry::Vacant(slot) => {
                let mut node = MemoryNode::new(id, node_type, now);
                node.attach_passage(passage_id);
                slot.insert(node);
            }
            Entry::Occupied(mut slot) => {
                let node = slot.get_mut();
                node.touch(now);
                node.attach_passage(passage_id);
            }
        }
    }

    /// Current PPMI weight of a canonical concept pair.
    fn pair_weight(&self, a: &str, b: &str) -> f64 {
        ppmi(
            self.pair_count(a, b),
            self.concept_count(a),
            self.concept_count(b),
            self.total_observations,
        )
    }

    /// Single edge-creation path, shared by updates and snapshot loading.
    ///
    /// Self-loops are ignored. Associative edges overwrite both directions;
    /// hierarchical edges are only inserted into an empty slot.
    pub(crate) fn add_edge(&mut self, source: &str, target: &str, weight: f64, edge_type: EdgeType) {
        if source == target {
            return;
        }

        match edge_type {
            EdgeType::Associative => {
                self.adjacency
                    .entry(source.to_string())
                    .or_default()
                    .insert(target.to_string(), MemoryEdge::associative(source, target, weight));
                self.adjacency
                    .entry(target.to_string())
                    .or_default()
                    .insert(source.to_string(), MemoryEdge::associative(target, source, weight));
            }
            EdgeType::Hierarchical => {
                self.adjacency
                    .entry(source.to_string())
                    .or_default()
                    .entry(target.to_string())
                    .or_insert_with(|| MemoryEdge {
                        weight,
                        ..MemoryEdge::hierarchical(source, target)
                    });
            }
        }
    }
}

/// Deduplicate while keeping first-seen order.
fn unique(items: &[String]) -> Vec<&str> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .map(String::as_str)
        .filter(|item| seen.insert(*item))
        .collect()
}
