use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use associative_memory::{
    DEFAULT_DECAY_LAMBDA, DEFAULT_FIRING_THRESHOLD, DEFAULT_GRAPH_KEY, DEFAULT_MAX_ITERATIONS,
    DEFAULT_PROPAGATION_DECAY, DEFAULT_PRUNE_THRESHOLD, DEFAULT_TOP_N, ExtractedElements,
    GraphStore, MemoryError, MemoryGraph, RetrievalParams, SerializedGraph, SqliteGraphStore,
    default_db_path, load_or_empty,
};

#[derive(Parser)]
#[command(name = "associative-memory")]
#[command(about = "Associative concept memory with spreading-activation recall", long_about = None)]
struct Cli {
    /// Path to the database file (default: ~/.associative_memory.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Graph to operate on (one per user or session)
    #[arg(long, global = true, default_value = DEFAULT_GRAPH_KEY)]
    key: String,

    /// Output in JSON format (default is compact text)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record the concepts and topics extracted from a passage
    Add {
        /// Opaque passage identifier
        passage_id: String,

        /// Concept mentioned in the passage (repeatable)
        #[arg(short, long = "concept")]
        concepts: Vec<String>,

        /// Topic of the passage (repeatable)
        #[arg(short, long = "topic")]
        topics: Vec<String>,

        /// Raw extractor output: {"concepts": [...], "topics": [...]}
        #[arg(short, long, conflicts_with_all = ["concepts", "topics"])]
        extraction: Option<String>,
    },

    /// Recall passages related to seed concepts
    Retrieve {
        /// Seed concepts
        #[arg(required = true)]
        seeds: Vec<String>,

        /// Maximum propagation rounds (0 = seeds only)
        #[arg(short = 'i', long, default_value_t = DEFAULT_MAX_ITERATIONS)]
        max_iterations: usize,

        /// Minimum activation a node needs to fire
        #[arg(short = 'f', long, default_value_t = DEFAULT_FIRING_THRESHOLD)]
        firing_threshold: f64,

        /// Share of energy that crosses an edge per round (0-1)
        #[arg(short = 'd', long, default_value_t = DEFAULT_PROPAGATION_DECAY)]
        propagation_decay: f64,

        /// Number of top activated nodes to collect passages from
        #[arg(short = 'n', long, default_value_t = DEFAULT_TOP_N)]
        top_n: usize,
    },

    /// Decay base activation by time since last access
    Decay {
        /// Decay rate per hour (0 = no-op)
        #[arg(short, long, default_value_t = DEFAULT_DECAY_LAMBDA)]
        lambda: f64,
    },

    /// Forget nodes whose base activation fell below a threshold
    Prune {
        #[arg(short, long, default_value_t = DEFAULT_PRUNE_THRESHOLD)]
        threshold: f64,
    },

    /// Show graph statistics
    Stats,

    /// Print the graph snapshot as JSON
    Export,

    /// Replace the graph with a snapshot file
    Import {
        /// Snapshot produced by `export`
        file: PathBuf,
    },

    /// Delete the graph
    Reset,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(default_db_path);

    if let Err(e) = run(cli.command, &db_path, &cli.key, cli.json) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(
    command: Commands,
    db_path: &PathBuf,
    key: &str,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = SqliteGraphStore::open(db_path)?;

    match command {
        Commands::Add {
            passage_id,
            concepts,
            topics,
            extraction,
        } => {
            let elements = match extraction {
                Some(raw) => ExtractedElements::from_json_str(&raw)?,
                None => ExtractedElements::new(concepts, topics),
            };
            let graph = if elements.concepts.is_empty() {
                load_or_empty(&store, key)
            } else {
                let mut graph = load_for_update(&store, key)?;
                graph.incremental_update(&elements, &passage_id);
                store.save(key, &graph.to_json())?;
                graph
            };

            if json_output {
                let result = serde_json::json!({
                    "passage_id": passage_id,
                    "elements": elements,
                    "stats": graph.stats(),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if elements.concepts.is_empty() {
                println!("NO CONCEPTS: graph unchanged");
            } else {
                println!(
                    "ADDED {}: {} concepts, {} topics ({} nodes, {} observations)",
                    passage_id,
                    elements.concepts.len(),
                    elements.topics.len(),
                    graph.node_count(),
                    graph.total_observations()
                );
            }
        }

        Commands::Retrieve {
            seeds,
            max_iterations,
            firing_threshold,
            propagation_decay,
            top_n,
        } => {
            let params = RetrievalParams {
                max_iterations,
                firing_threshold,
                propagation_decay,
                top_n,
            };
            params.validate()?;

            let graph = load_or_empty(&store, key);
            let result = graph.retrieve_activations(&seeds, &params);
            if json_output {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "# {} passages for {:?} ({} seeds matched, {} iters)\n",
                    result.passage_ids.len(),
                    seeds,
                    result.seeds.len(),
                    result.iterations
                );
                for node in &result.activated {
                    println!("  {:.3}  {} ({:?})", node.activation, node.id, node.node_type);
                }
                if !result.passage_ids.is_empty() {
                    println!();
                }
                for id in &result.passage_ids {
                    println!("{}", id);
                }
            }
        }

        Commands::Decay { lambda } => {
            if lambda < 0.0 || lambda.is_nan() {
                return Err(MemoryError::InvalidInput(format!(
                    "Decay rate must be non-negative (got {})",
                    lambda
                ))
                .into());
            }
            let graph = if lambda == 0.0 {
                load_or_empty(&store, key)
            } else {
                let mut graph = load_for_update(&store, key)?;
                graph.apply_decay(lambda);
                store.save(key, &graph.to_json())?;
                graph
            };
            print_stats(&graph, json_output)?;
        }

        Commands::Prune { threshold } => {
            let mut graph = load_for_update(&store, key)?;
            let removed = graph.prune_graph(threshold);
            if removed > 0 {
                store.save(key, &graph.to_json())?;
            }
            if json_output {
                let result = serde_json::json!({
                    "removed": removed,
                    "stats": graph.stats(),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("PRUNED {} nodes below {}", removed, threshold);
            }
        }

        Commands::Stats => {
            let graph = load_or_empty(&store, key);
            print_stats(&graph, json_output)?;
        }

        Commands::Export => {
            let graph = load_or_empty(&store, key);
            println!("{}", serde_json::to_string_pretty(&graph.to_json())?);
        }

        Commands::Import { file } => {
            let contents = fs::read_to_string(&file)?;
            let graph = MemoryGraph::from_json(SerializedGraph::decode(&contents)?);
            store.save(key, &graph.to_json())?;
            print_stats(&graph, json_output)?;
        }

        Commands::Reset => {
            let existed = store.delete(key)?;
            if json_output {
                let result = serde_json::json!({ "key": key, "deleted": existed });
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if existed {
                println!("RESET: graph '{}' deleted", key);
            } else {
                println!("RESET: graph '{}' did not exist", key);
            }
        }
    }

    Ok(())
}

/// Load a graph that is about to be saved back.
///
/// Unlike [`load_or_empty`], a snapshot that cannot be read is an error: saving
/// over it would replace the stored graph with an empty one.
fn load_for_update<S: GraphStore>(store: &S, key: &str) -> Result<MemoryGraph, MemoryError> {
    match store.load(key) {
        Ok(Some(snapshot)) => Ok(MemoryGraph::from_json(snapshot)),
        Ok(None) => Ok(MemoryGraph::new()),
        Err(e) => {
            warn!(key, error = %e, "stored graph unreadable, refusing to overwrite it");
            Err(e)
        }
    }
}

fn print_stats(graph: &MemoryGraph, json_output: bool) -> Result<(), serde_json::Error> {
    let stats = graph.stats();
    if json_output {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("STATS:");
        println!("  Concepts:      {}", stats.concept_count);
        println!("  Topics:        {}", stats.topic_count);
        println!("  Associations:  {}", stats.associative_edge_count);
        println!("  Hierarchical:  {}", stats.hierarchical_edge_count);
        println!("  Observations:  {}", stats.total_observations);
        println!("  Avg Activation: {:.3}", stats.mean_activation);
    }
    Ok(())
}
