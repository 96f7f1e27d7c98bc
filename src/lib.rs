//! Associative Memory Graph
//!
//! An incremental concept graph with spreading-activation retrieval. Concepts
//! that co-occur in the same passage are linked by PPMI-weighted associative
//! edges, concepts point at their topics through hierarchical edges, and a
//! query spreads energy from seed concepts to surface related passages.
//!
//! # Example
//!
//! ```no_run
//! use associative_memory::{ExtractedElements, MemoryGraph, RetrievalParams};
//!
//! let mut graph = MemoryGraph::new();
//!
//! // Feed extractor output for each passage
//! let elements = ExtractedElements::new(
//!     vec!["React".into(), "Vite".into()],
//!     vec!["Frontend Development".into()],
//! );
//! graph.incremental_update(&elements, "p1");
//!
//! // Recall passages related to a query's concepts
//! let passages = graph.retrieve_context(&["React".to_string()], &RetrievalParams::default());
//! for id in passages {
//!     println!("{}", id);
//! }
//!
//! // Periodic maintenance
//! graph.apply_decay(0.01);
//! graph.prune_graph(0.1);
//! ```

pub mod db;
pub mod error;
pub mod extract;
pub mod memory;
pub mod relationship;
pub mod search;
pub mod snapshot;
pub mod store;

use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration Constants
// ============================================================================
//
// ## Node salience
//
// ### INITIAL_ACTIVATION (1.0) / ACTIVATION_BOOST (0.5) / MAX_ACTIVATION (5.0)
// A node starts at 1.0, every re-mention adds 0.5, and the total is capped at
// 5.0 so a single chatty topic cannot dominate forever.
//
// ## Retrieval
//
// ### SEED_ACTIVATION (1.0)
// Energy injected into each seed concept before the first round.
//
// ### Defaults (see RetrievalParams)
// Three rounds, fire above 0.1, half the energy crosses an edge, top 10 nodes.
//
// ## Maintenance
//
// ### DEFAULT_DECAY_LAMBDA (0.01 per hour)
// A node untouched for ~69 hours loses half its base activation.
//
// ### DEFAULT_PRUNE_THRESHOLD (0.1)
// Nodes below this base activation are forgotten on prune.

/// Base activation of a newly created node.
pub const INITIAL_ACTIVATION: f64 = 1.0;

/// Base activation added on every re-mention.
pub const ACTIVATION_BOOST: f64 = 0.5;

/// Upper bound on base activation.
pub const MAX_ACTIVATION: f64 = 5.0;

/// Fixed weight of concept -> topic edges.
pub const HIERARCHICAL_WEIGHT: f64 = 1.0;

/// Activation assigned to each matched seed.
pub const SEED_ACTIVATION: f64 = 1.0;

/// Milliseconds per hour, the time unit of the decay rate.
pub const MS_PER_HOUR: f64 = 3_600_000.0;

/// Default number of propagation rounds.
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Default minimum activation a node needs to fire.
pub const DEFAULT_FIRING_THRESHOLD: f64 = 0.1;

/// Default share of energy that crosses an edge per round.
pub const DEFAULT_PROPAGATION_DECAY: f64 = 0.5;

/// Default number of top activated nodes considered for passages.
pub const DEFAULT_TOP_N: usize = 10;

/// Default temporal decay rate (per hour).
pub const DEFAULT_DECAY_LAMBDA: f64 = 0.01;

/// Default base activation below which nodes are pruned.
pub const DEFAULT_PRUNE_THRESHOLD: f64 = 0.1;

/// Default key under which a graph is persisted.
pub const DEFAULT_GRAPH_KEY: &str = "default";

// ============================================================================
// Runtime Configuration
// ============================================================================

/// Runtime retrieval parameters.
///
/// All parameters are configurable per query,
/// allowing experimentation without recompiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalParams {
    /// Maximum number of propagation rounds. 0 disables propagation.
    pub max_iterations: usize,
    /// A node fires only while its activation is strictly above this value.
    pub firing_threshold: f64,
    /// Share of energy carried across an edge; a firing node keeps `1 - decay`.
    pub propagation_decay: f64,
    /// Number of top activated nodes whose passages are returned.
    pub top_n: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            firing_threshold: DEFAULT_FIRING_THRESHOLD,
            propagation_decay: DEFAULT_PROPAGATION_DECAY,
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl RetrievalParams {
    /// Check parameters coming from an untrusted boundary (CLI, config file).
    ///
    /// The graph itself accepts any values; this only rejects ones that make
    /// the propagation meaningless.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if !(0.0..=1.0).contains(&self.propagation_decay) {
            return Err(MemoryError::InvalidInput(format!(
                "propagation decay must be within [0, 1] (got {})",
                self.propagation_decay
            )));
        }
        if self.firing_threshold.is_nan() {
            return Err(MemoryError::InvalidInput(
                "firing threshold must be a number".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Re-exports
// ============================================================================

pub use db::{GraphStore, SqliteGraphStore, default_db_path, load_or_empty};
pub use error::MemoryError;
pub use extract::{ExtractedElements, Extractor, ingest};
pub use memory::{GraphStats, MemoryNode, NodeType, PassageId};
pub use relationship::{EdgeType, MemoryEdge, ppmi};
pub use search::{ActivatedNode, RetrievalResult};
pub use snapshot::{PairCount, SerializedGraph};
pub use store::MemoryGraph;
