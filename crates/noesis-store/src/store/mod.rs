//! Knowledge store implementation using SQLite.
//!
//! Nodes, edges, suggestion feedback and deployment metadata live in one
//! database file. Structural invariants are enforced twice: by explicit
//! checks that produce precise errors, and by table constraints as a
//! backstop.

mod edge_ops;
mod feedback_ops;
mod node_ops;

use std::path::Path;

use noesis_types::{EdgeId, KnowledgeNode, NodeId, Relationship, RelationshipType};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{debug, info};

use crate::backend::KnowledgeStore;
use crate::error::{Result, StoreError};
use crate::filter::NodeFilter;
use crate::types::{NodeEdges, StoreStats, SuggestionFeedback};

// ─────────────────────────────────────────────────────────────────────────────
// Schema Version
// ─────────────────────────────────────────────────────────────────────────────

/// Current schema version for migrations.
const SCHEMA_VERSION: i32 = 1;

const META_DIMENSIONS: &str = "embedding.dimensions";
const META_PROVIDER: &str = "embedding.provider";

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Store
// ─────────────────────────────────────────────────────────────────────────────

/// Knowledge store backed by SQLite.
///
/// Uses WAL mode for better concurrent read performance. The connection is
/// guarded by a mutex that is never held across an await point.
pub struct SqliteStore {
    pub(crate) conn: Mutex<Connection>,
    pub(crate) dimensions: usize,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Initialization
// ─────────────────────────────────────────────────────────────────────────────

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// `dimensions` is the deployment-wide embedding size. A database created
    /// with a different size is refused with `DimensionMismatch`.
    pub fn open(path: impl AsRef<Path>, dimensions: usize) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|_| {
                StoreError::Database(rusqlite::Error::InvalidPath(path.to_path_buf()))
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        let store = Self::with_connection(conn, dimensions)?;
        info!(path = ?path, dimensions, "Knowledge store opened");
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory(dimensions: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self::with_connection(conn, dimensions)?;
        debug!(dimensions, "In-memory knowledge store created");
        Ok(store)
    }

    fn with_connection(conn: Connection, dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(StoreError::InvalidData(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        let store = Self {
            conn: Mutex::new(conn),
            dimensions,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Initialize the database with schema and pragmas.
    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::create_schema(&conn)?;
        self.check_dimensions(&conn)?;

        Ok(())
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        let current_version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if current_version >= SCHEMA_VERSION {
            debug!("Schema up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating schema from version {} to {}",
            current_version, SCHEMA_VERSION
        );

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                node_type TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                embedding BLOB,
                metadata TEXT NOT NULL DEFAULT '{}',
                owner TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_updated_at ON nodes(updated_at);
            CREATE INDEX IF NOT EXISTS idx_nodes_owner ON nodes(owner);

            CREATE TABLE IF NOT EXISTS edges (
                id TEXT PRIMARY KEY,
                source_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
                target_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
                relationship_type TEXT NOT NULL,
                weight REAL NOT NULL DEFAULT 1.0,
                confidence REAL,
                comment TEXT,
                created_at TEXT NOT NULL,
                CHECK (source_id <> target_id),
                UNIQUE (source_id, target_id, relationship_type)
            );

            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);

            -- Suggestion outcomes outlive the nodes they mention
            CREATE TABLE IF NOT EXISTS suggestion_feedback (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                relationship_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                outcome TEXT NOT NULL,
                edge_id TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        info!("Schema created (version {})", SCHEMA_VERSION);
        Ok(())
    }

    /// Record the configured dimension on first open and refuse a different
    /// one afterwards.
    fn check_dimensions(&self, conn: &Connection) -> Result<()> {
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![META_DIMENSIONS],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                    params![META_DIMENSIONS, self.dimensions.to_string()],
                )?;
                Ok(())
            }
            Some(value) => {
                let expected: usize = value.parse().map_err(|_| {
                    StoreError::InvalidData(format!("corrupt {} value '{}'", META_DIMENSIONS, value))
                })?;
                if expected != self.dimensions {
                    return Err(StoreError::DimensionMismatch {
                        expected,
                        actual: self.dimensions,
                    });
                }
                Ok(())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Utility Operations
// ─────────────────────────────────────────────────────────────────────────────

impl SqliteStore {
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn set_embedding_provider(&self, provider: &str) -> Result<()> {
        self.set_meta(META_PROVIDER, provider)
    }

    /// Get database statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();

        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let node_count = count("SELECT COUNT(*) FROM nodes")?;
        let active_node_count = count("SELECT COUNT(*) FROM nodes WHERE is_active = 1")?;
        let embedded_node_count = count("SELECT COUNT(*) FROM nodes WHERE embedding IS NOT NULL")?;
        let edge_count = count("SELECT COUNT(*) FROM edges")?;
        let feedback_count = count("SELECT COUNT(*) FROM suggestion_feedback")?;

        let embedding_provider: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![META_PROVIDER],
                |row| row.get(0),
            )
            .optional()?;

        Ok(StoreStats {
            node_count,
            active_node_count,
            embedded_node_count,
            edge_count,
            feedback_count,
            embedding_dimensions: self.dimensions,
            embedding_provider,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row Helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn format_timestamp(ts: &noesis_types::Timestamp) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<noesis_types::Timestamp> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| StoreError::InvalidData(format!("invalid timestamp '{}': {}", value, e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl KnowledgeStore for SqliteStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn insert_node(&self, node: &KnowledgeNode) -> Result<()> {
        SqliteStore::insert_node(self, node)
    }

    fn update_node(&self, node: &KnowledgeNode) -> Result<()> {
        SqliteStore::update_node(self, node)
    }

    fn get_node(&self, id: &NodeId) -> Result<Option<KnowledgeNode>> {
        SqliteStore::get_node(self, id)
    }

    fn list_nodes(&self, filter: &NodeFilter) -> Result<Vec<KnowledgeNode>> {
        SqliteStore::list_nodes(self, filter)
    }

    fn delete_node(&self, id: &NodeId) -> Result<bool> {
        SqliteStore::delete_node(self, id)
    }

    fn update_node_embedding(&self, id: &NodeId, embedding: &[f32]) -> Result<()> {
        SqliteStore::update_node_embedding(self, id, embedding)
    }

    fn clear_node_embedding(&self, id: &NodeId) -> Result<()> {
        SqliteStore::clear_node_embedding(self, id)
    }

    fn create_edge(&self, edge: &Relationship) -> Result<EdgeId> {
        SqliteStore::create_edge(self, edge)
    }

    fn get_edge(&self, id: &EdgeId) -> Result<Option<Relationship>> {
        SqliteStore::get_edge(self, id)
    }

    fn delete_edge(&self, id: &EdgeId) -> Result<bool> {
        SqliteStore::delete_edge(self, id)
    }

    fn list_edges_for_node(&self, id: &NodeId) -> Result<NodeEdges> {
        SqliteStore::list_edges_for_node(self, id)
    }

    fn list_edges(&self) -> Result<Vec<Relationship>> {
        SqliteStore::list_edges(self)
    }

    fn edge_exists(
        &self,
        source: &NodeId,
        target: &NodeId,
        relationship_type: RelationshipType,
    ) -> Result<bool> {
        SqliteStore::edge_exists(self, source, target, relationship_type)
    }

    fn has_any_edge_between(&self, a: &NodeId, b: &NodeId) -> Result<bool> {
        SqliteStore::has_any_edge_between(self, a, b)
    }

    fn record_suggestion_feedback(&self, feedback: &SuggestionFeedback) -> Result<()> {
        SqliteStore::record_suggestion_feedback(self, feedback)
    }

    fn set_embedding_provider(&self, provider: &str) -> Result<()> {
        SqliteStore::set_embedding_provider(self, provider)
    }

    fn stats(&self) -> Result<StoreStats> {
        SqliteStore::stats(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory(3).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.node_count, 0);
        assert_eq!(stats.edge_count, 0);
        assert_eq!(stats.embedding_dimensions, 3);
        assert_eq!(stats.embedding_provider, None);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            SqliteStore::open_in_memory(0),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("noesis.db");
        let _store = SqliteStore::open(&path, 4).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_with_different_dimension_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("noesis.db");

        {
            let store = SqliteStore::open(&path, 4).unwrap();
            store.insert_node(&KnowledgeNode::new("a", "b")).unwrap();
        }

        let same = SqliteStore::open(&path, 4).unwrap();
        assert_eq!(same.stats().unwrap().node_count, 1);
        drop(same);

        match SqliteStore::open(&path, 8) {
            Err(StoreError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 8);
            }
            other => panic!("expected dimension mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_meta_and_provider() {
        let store = SqliteStore::open_in_memory(2).unwrap();
        assert_eq!(store.get_meta("missing").unwrap(), None);
        store.set_meta("k", "v").unwrap();
        assert_eq!(store.get_meta("k").unwrap().as_deref(), Some("v"));

        store.set_embedding_provider("mock").unwrap();
        assert_eq!(
            store.stats().unwrap().embedding_provider.as_deref(),
            Some("mock")
        );
    }

    #[test]
    fn test_timestamp_round_trip_is_sortable() {
        let ts = noesis_types::now();
        let text = format_timestamp(&ts);
        assert!(text.ends_with('Z'));
        let parsed = parse_timestamp(&text).unwrap();
        assert_eq!(format_timestamp(&parsed), text);
    }
}
