//! Retrieval with round-based spreading activation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::memory::{NodeType, PassageId};
use crate::store::MemoryGraph;
use crate::{RetrievalParams, SEED_ACTIVATION};

/// A node with its final activation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivatedNode {
    pub id: String,
    pub node_type: NodeType,
    pub activation: f64,
}

/// Result of a spreading-activation retrieval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    /// Seeds that matched a node, in request order.
    pub seeds: Vec<String>,
    /// Number of propagation rounds performed.
    pub iterations: usize,
    /// Top-N nodes by activation (highest first, ties by id).
    pub activated: Vec<ActivatedNode>,
    /// Union of the passages held by the concept nodes in `activated`.
    pub passage_ids: BTreeSet<PassageId>,
}

/// Spread activation from `seeds` through the graph.
///
/// Rounds are synchronous: every fired node propagates the activation it held
/// at the start of the round, so the outcome does not depend on iteration
/// order. A fired node keeps `1 - propagation_decay` of its own energy plus
/// whatever its neighbors send it in the same round.
///
/// Only nodes with positive activation are ranked, so unknown seeds and
/// `max_iterations == 0` never pull in unrelated passages.
pub(crate) fn spread_activation(
    graph: &MemoryGraph,
    seeds: &[String],
    params: &RetrievalParams,
) -> RetrievalResult {
    let mut activation: BTreeMap<&str, f64> =
        graph.nodes().map(|node| (node.id.as_str(), 0.0)).collect();

    let mut matched = Vec::new();
    for seed in seeds {
        if let Some(value) = activation.get_mut(seed.as_str()) {
            if *value == 0.0 {
                matched.push(seed.clone());
            }
            *value = SEED_ACTIVATION;
        }
    }

    let decay = params.propagation_decay;
    let mut iterations = 0;

    for _ in 0..params.max_iterations {
        let fired: Vec<(&str, f64)> = activation
            .iter()
            .filter(|(_, value)| **value > params.firing_threshold)
            .map(|(id, value)| (*id, *value))
            .collect();

        if fired.is_empty() {
            break;
        }
        iterations += 1;

        let mut next = activation.clone();
        for &(id, value) in &fired {
            next.insert(id, value * (1.0 - decay));
        }
        for &(id, value) in &fired {
            for edge in graph.neighbors(id) {
                if let Some(target) = next.get_mut(edge.target_id.as_str()) {
                    *target += value * edge.weight * decay;
                }
            }
        }

        activation = next;
    }

    let mut ranked: Vec<(&str, f64)> = activation
        .into_iter()
        .filter(|(_, value)| *value > 0.0)
        .collect();
    // Activation descending, then id ascending.
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    ranked.truncate(params.top_n);

    let mut activated = Vec::with_capacity(ranked.len());
    let mut passage_ids = BTreeSet::new();
    for (id, value) in ranked {
        let Some(node) = graph.node(id) else {
            continue;
        };
        if node.is_concept() {
            passage_ids.extend(node.source_passage_ids.iter().cloned());
        }
        activated.push(ActivatedNode {
            id: node.id.clone(),
            node_type: node.node_type,
            activation: value,
        });
    }

    debug!(
        seeds = matched.len(),
        iterations,
        activated = activated.len(),
        passages = passage_ids.len(),
        "spreading activation finished"
    );

    RetrievalResult {
        seeds: matched,
        iterations,
        activated,
        passage_ids,
    }
}
