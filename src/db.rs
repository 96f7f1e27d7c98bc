//! Snapshot persistence and low-level database helpers.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{info, warn};

use crate::error::MemoryError;
use crate::snapshot::SerializedGraph;
use crate::store::MemoryGraph;

/// Get the default database path (~/.associative_memory.db).
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .expect("Could not find home directory")
        .join(".associative_memory.db")
}

/// Storage for graph snapshots, one per key (user, session, ...).
pub trait GraphStore {
    /// Load the snapshot stored under `key`, or `None` if there is none.
    fn load(&self, key: &str) -> Result<Option<SerializedGraph>, MemoryError>;

    /// Store `snapshot` under `key`, replacing any previous one.
    fn save(&mut self, key: &str, snapshot: &SerializedGraph) -> Result<(), MemoryError>;

    /// Remove the snapshot under `key`. Returns whether one existed.
    fn delete(&mut self, key: &str) -> Result<bool, MemoryError>;

    /// All stored keys, sorted.
    fn keys(&self) -> Result<Vec<String>, MemoryError>;
}

/// Load a graph without letting persistence failures escape.
///
/// A missing, unreadable or corrupt snapshot yields an empty graph.
pub fn load_or_empty<S: GraphStore + ?Sized>(store: &S, key: &str) -> MemoryGraph {
    match store.load(key) {
        Ok(Some(snapshot)) => MemoryGraph::from_json(snapshot),
        Ok(None) => {
            info!(key, "no stored graph, starting empty");
            MemoryGraph::new()
        }
        Err(e) => {
            warn!(key, error = %e, "failed to load graph, starting empty");
            MemoryGraph::new()
        }
    }
}

/// SQLite-backed [`GraphStore`]. Each key holds one JSON snapshot.
pub struct SqliteGraphStore {
    conn: Connection,
}

impl SqliteGraphStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, MemoryError> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }
}

impl GraphStore for SqliteGraphStore {
    fn load(&self, key: &str) -> Result<Option<SerializedGraph>, MemoryError> {
        let snapshot: Option<String> = self
            .conn
            .query_row(
                "SELECT snapshot FROM graphs WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        snapshot
            .map(|json| SerializedGraph::decode(&json))
            .transpose()
    }

    fn save(&mut self, key: &str, snapshot: &SerializedGraph) -> Result<(), MemoryError> {
        if key.is_empty() {
            return Err(MemoryError::InvalidInput(
                "Graph key cannot be empty".to_string(),
            ));
        }

        let json = snapshot.encode()?;
        self.conn.execute(
            "INSERT INTO graphs (key, snapshot, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                 snapshot = excluded.snapshot,
                 updated_at = excluded.updated_at",
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, MemoryError> {
        let removed = self
            .conn
            .execute("DELETE FROM graphs WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn keys(&self) -> Result<Vec<String>, MemoryError> {
        let mut stmt = self.conn.prepare("SELECT key FROM graphs ORDER BY key")?;
        let keys: Result<Vec<String>, _> = stmt.query_map([], |row| row.get(0))?.collect();
        Ok(keys?)
    }
}

/// Initialize the database schema.
pub(crate) fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    // One row per graph; the snapshot is the serialized graph as JSON
    conn.execute(
        "CREATE TABLE IF NOT EXISTS graphs (
            key TEXT PRIMARY KEY,
            snapshot TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractedElements;
    use pretty_assertions::assert_eq;

    fn sample_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph.incremental_update(
            &ExtractedElements::new(
                vec!["React".into(), "Vite".into()],
                vec!["Frontend Development".into()],
            ),
            "p1",
        );
        graph
    }

    #[test]
    fn test_open_in_memory() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        assert!(store.keys().unwrap().is_empty());
        assert!(store.load("default").unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let mut store = SqliteGraphStore::open_in_memory().unwrap();
        let graph = sample_graph();

        store.save("alice", &graph.to_json()).unwrap();
        let loaded = store.load("alice").unwrap().unwrap();
        assert_eq!(MemoryGraph::from_json(loaded), graph);

        // Keys are independent
        assert!(store.load("bob").unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites() {
        let mut store = SqliteGraphStore::open_in_memory().unwrap();
        let mut graph = sample_graph();
        store.save("alice", &graph.to_json()).unwrap();

        graph.reset();
        store.save("alice", &graph.to_json()).unwrap();

        let loaded = store.load("alice").unwrap().unwrap();
        assert!(loaded.nodes.is_empty());
        assert_eq!(store.keys().unwrap(), vec!["alice"]);
    }

    #[test]
    fn test_save_rejects_empty_key() {
        let mut store = SqliteGraphStore::open_in_memory().unwrap();
        let err = store.save("", &SerializedGraph::default()).unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
    }

    #[test]
    fn test_delete() {
        let mut store = SqliteGraphStore::open_in_memory().unwrap();
        store.save("alice", &sample_graph().to_json()).unwrap();

        assert!(store.delete("alice").unwrap());
        assert!(!store.delete("alice").unwrap());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        let graph = sample_graph();

        {
            let mut store = SqliteGraphStore::open(&path).unwrap();
            store.save("default", &graph.to_json()).unwrap();
        }

        let store = SqliteGraphStore::open(&path).unwrap();
        assert_eq!(load_or_empty(&store, "default"), graph);
    }

    #[test]
    fn test_load_or_empty_degrades_on_corrupt_snapshot() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO graphs (key, snapshot, updated_at) VALUES ('broken', '{not json', '')",
                [],
            )
            .unwrap();

        assert!(store.load("broken").is_err());
        assert_eq!(load_or_empty(&store, "broken"), MemoryGraph::new());
        assert_eq!(load_or_empty(&store, "missing"), MemoryGraph::new());
    }
}
