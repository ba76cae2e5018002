//! SQLite-backed stores

use super::{
    decode_vector, encode_vector, GraphStats, GraphStore, HashStore, ReplaceJournal,
    ReplaceMarker, VectorMatch, VectorStore, SCHEMA,
};
use crate::graph::{Edge, EdgeType, Node, NodeType, Resolution};
use crate::semantic::cosine_similarity;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Database connection wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", path.as_ref()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("Failed to enable WAL mode")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .context("Failed to set busy timeout")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn initialize(&self) -> Result<()> {
        self.conn()?
            .execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))
    }

    // ==================== Queries ====================

    /// Nodes whose name contains `pattern`
    pub fn find_nodes(&self, pattern: &str, limit: usize) -> Result<Vec<Node>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, node_type, name, file_path, start_line, end_line,
                   signature, summary, metadata
            FROM nodes WHERE name LIKE ?1
            ORDER BY file_path, start_line
            LIMIT ?2
            "#,
        )?;

        let rows = stmt.query_map(params![format!("%{}%", pattern), limit as i64], NodeRow::read)?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?.into_node()?);
        }

        Ok(nodes)
    }

    // ==================== Scan Runs ====================

    /// Record a finished scan
    pub fn record_scan_run<S: Serialize>(&self, kind: &str, stats: &S, failures: usize) -> Result<()> {
        let stats_json = serde_json::to_string(stats)?;
        self.conn()?
            .execute(
                "INSERT INTO scan_runs (kind, stats, failures, finished_at) VALUES (?1, ?2, ?3, ?4)",
                params![kind, stats_json, failures as i64, Utc::now().to_rfc3339()],
            )
            .context("Failed to record scan run")?;
        Ok(())
    }

    /// The most recent scan
    pub fn last_scan_run(&self) -> Result<Option<ScanRun>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT kind, stats, failures, finished_at FROM scan_runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .context("Failed to get last scan run")?;

        row.map(|(kind, stats, failures, finished_at)| {
            Ok(ScanRun {
                kind,
                stats: serde_json::from_str(&stats)?,
                failures: failures as usize,
                finished_at: DateTime::parse_from_rfc3339(&finished_at)?.with_timezone(&Utc),
            })
        })
        .transpose()
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let graph = self.graph_stats()?;
        let conn = self.conn()?;

        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(DatabaseStats {
            graph,
            vectors: count("SELECT COUNT(*) FROM vectors")?,
            tracked_files: count("SELECT COUNT(*) FROM file_hashes")?,
            pending_replaces: count("SELECT COUNT(*) FROM replace_markers")?,
        })
    }

    fn graph_stats(&self) -> Result<GraphStats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(GraphStats {
            nodes: count("SELECT COUNT(*) FROM nodes")?,
            edges: count("SELECT COUNT(*) FROM edges")?,
            files: count("SELECT COUNT(*) FROM nodes WHERE node_type = 'module'")?,
            packages: count("SELECT COUNT(*) FROM nodes WHERE node_type = 'package'")?,
            speculative_edges: count("SELECT COUNT(*) FROM edges WHERE resolution = 'speculative'")?,
        })
    }
}

#[async_trait]
impl GraphStore for Database {
    async fn get_nodes_by_path(&self, path: &str) -> Result<Vec<Node>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, node_type, name, file_path, start_line, end_line,
                   signature, summary, metadata
            FROM nodes WHERE file_path = ?1
            ORDER BY start_line
            "#,
        )?;

        let rows = stmt.query_map(params![path], NodeRow::read)?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?.into_node()?);
        }

        Ok(nodes)
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let row = self
            .conn()?
            .query_row(
                r#"
                SELECT id, node_type, name, file_path, start_line, end_line,
                       signature, summary, metadata
                FROM nodes WHERE id = ?1
                "#,
                params![id],
                NodeRow::read,
            )
            .optional()
            .context("Failed to get node")?;

        row.map(NodeRow::into_node).transpose()
    }

    async fn get_edges_by_node(&self, id: &str) -> Result<Vec<Edge>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, from_node, to_node, edge_type, resolution, metadata
            FROM edges WHERE from_node = ?1 OR to_node = ?1
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map(params![id], EdgeRow::read)?;

        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?.into_edge()?);
        }

        Ok(edges)
    }

    async fn upsert_node(&self, node: &Node) -> Result<bool> {
        let metadata = serde_json::to_string(&node.metadata)?;
        let conn = self.conn()?;

        let exists = conn
            .query_row("SELECT 1 FROM nodes WHERE id = ?1", params![node.id], |_| Ok(()))
            .optional()?
            .is_some();

        conn.execute(
            r#"
            INSERT INTO nodes (
                id, node_type, name, file_path, start_line, end_line,
                signature, summary, metadata, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                node_type = excluded.node_type,
                name = excluded.name,
                file_path = excluded.file_path,
                start_line = excluded.start_line,
                end_line = excluded.end_line,
                signature = excluded.signature,
                summary = excluded.summary,
                metadata = excluded.metadata,
                updated_at = datetime('now')
            "#,
            params![
                node.id,
                node.node_type.as_str(),
                node.name,
                node.file_path,
                node.start_line as i64,
                node.end_line as i64,
                node.signature,
                node.summary,
                metadata,
            ],
        )
        .with_context(|| format!("Failed to upsert node {}", node.id))?;

        Ok(!exists)
    }

    async fn upsert_edge(&self, edge: &Edge) -> Result<bool> {
        let metadata = serde_json::to_string(&edge.metadata)?;
        let conn = self.conn()?;

        let exists = conn
            .query_row("SELECT 1 FROM edges WHERE id = ?1", params![edge.id], |_| Ok(()))
            .optional()?
            .is_some();

        conn.execute(
            r#"
            INSERT INTO edges (
                id, from_node, to_node, edge_type, resolution, metadata, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                from_node = excluded.from_node,
                to_node = excluded.to_node,
                edge_type = excluded.edge_type,
                resolution = excluded.resolution,
                metadata = excluded.metadata,
                updated_at = datetime('now')
            "#,
            params![
                edge.id,
                edge.from_node,
                edge.to_node,
                edge.edge_type.as_str(),
                edge.resolution.as_str(),
                metadata,
            ],
        )
        .with_context(|| format!("Failed to upsert edge {}", edge.id))?;

        Ok(!exists)
    }

    async fn delete_node(&self, id: &str) -> Result<bool> {
        let count = self
            .conn()?
            .execute("DELETE FROM nodes WHERE id = ?1", params![id])
            .context("Failed to delete node")?;
        Ok(count > 0)
    }

    async fn delete_edges_by_node(&self, id: &str) -> Result<usize> {
        let count = self
            .conn()?
            .execute(
                "DELETE FROM edges WHERE from_node = ?1 OR to_node = ?1",
                params![id],
            )
            .context("Failed to delete edges")?;
        Ok(count)
    }

    async fn stats(&self) -> Result<GraphStats> {
        self.graph_stats()
    }
}

#[async_trait]
impl VectorStore for Database {
    async fn upsert(&self, id: &str, vector: &[f32], payload: &serde_json::Value) -> Result<()> {
        let payload = serde_json::to_string(payload)?;
        self.conn()?
            .execute(
                r#"
                INSERT INTO vectors (id, embedding, dimension, payload, updated_at)
                VALUES (?1, ?2, ?3, ?4, datetime('now'))
                ON CONFLICT(id) DO UPDATE SET
                    embedding = excluded.embedding,
                    dimension = excluded.dimension,
                    payload = excluded.payload,
                    updated_at = datetime('now')
                "#,
                params![id, encode_vector(vector), vector.len() as i64, payload],
            )
            .with_context(|| format!("Failed to upsert vector {}", id))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let count = self
            .conn()?
            .execute("DELETE FROM vectors WHERE id = ?1", params![id])
            .context("Failed to delete vector")?;
        Ok(count > 0)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, embedding, payload FROM vectors")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut matches = Vec::new();
        for row in rows {
            let (id, embedding, payload) = row?;
            let score = cosine_similarity(query, &decode_vector(&embedding)) as f32;
            matches.push(VectorMatch {
                id,
                score,
                payload: serde_json::from_str(&payload)?,
            });
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(k);
        Ok(matches)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

#[async_trait]
impl HashStore for Database {
    async fn load_hashes(&self) -> Result<HashMap<String, String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT path, hash FROM file_hashes")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut hashes = HashMap::new();
        for row in rows {
            let (path, hash): (String, String) = row?;
            hashes.insert(path, hash);
        }

        Ok(hashes)
    }

    async fn save_hash(&self, path: &str, hash: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO file_hashes (path, hash, updated_at) VALUES (?1, ?2, datetime('now'))",
                params![path, hash],
            )
            .context("Failed to save file hash")?;
        Ok(())
    }

    async fn remove_hash(&self, path: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM file_hashes WHERE path = ?1", params![path])
            .context("Failed to remove file hash")?;
        Ok(())
    }
}

#[async_trait]
impl ReplaceJournal for Database {
    async fn begin_replace(&self, path: &str) -> Result<ReplaceMarker> {
        let marker = ReplaceMarker::new(path);
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO replace_markers (file_path, marker_id, started_at) VALUES (?1, ?2, ?3)",
                params![marker.file_path, marker.marker_id, marker.started_at.to_rfc3339()],
            )
            .context("Failed to write replace marker")?;
        Ok(marker)
    }

    async fn complete_replace(&self, path: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM replace_markers WHERE file_path = ?1", params![path])
            .context("Failed to clear replace marker")?;
        Ok(())
    }

    async fn pending_replaces(&self) -> Result<Vec<ReplaceMarker>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT file_path, marker_id, started_at FROM replace_markers ORDER BY started_at",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut markers = Vec::new();
        for row in rows {
            let (file_path, marker_id, started_at) = row?;
            markers.push(ReplaceMarker {
                file_path,
                marker_id,
                started_at: DateTime::parse_from_rfc3339(&started_at)?.with_timezone(&Utc),
            });
        }

        Ok(markers)
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub graph: GraphStats,
    pub vectors: usize,
    pub tracked_files: usize,
    pub pending_replaces: usize,
}

/// A recorded scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanRun {
    pub kind: String,
    pub stats: serde_json::Value,
    pub failures: usize,
    pub finished_at: DateTime<Utc>,
}

// Internal row types for database mapping

struct NodeRow {
    id: String,
    node_type: String,
    name: String,
    file_path: String,
    start_line: i64,
    end_line: i64,
    signature: Option<String>,
    summary: Option<String>,
    metadata: String,
}

impl NodeRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            node_type: row.get(1)?,
            name: row.get(2)?,
            file_path: row.get(3)?,
            start_line: row.get(4)?,
            end_line: row.get(5)?,
            signature: row.get(6)?,
            summary: row.get(7)?,
            metadata: row.get(8)?,
        })
    }

    fn into_node(self) -> Result<Node> {
        let node_type = NodeType::parse(&self.node_type)
            .ok_or_else(|| anyhow!("Unknown node type '{}' for {}", self.node_type, self.id))?;

        Ok(Node {
            metadata: serde_json::from_str(&self.metadata)
                .with_context(|| format!("Invalid metadata for node {}", self.id))?,
            id: self.id,
            node_type,
            name: self.name,
            file_path: self.file_path,
            start_line: self.start_line as usize,
            end_line: self.end_line as usize,
            signature: self.signature,
            summary: self.summary,
        })
    }
}

struct EdgeRow {
    id: String,
    from_node: String,
    to_node: String,
    edge_type: String,
    resolution: String,
    metadata: String,
}

impl EdgeRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            from_node: row.get(1)?,
            to_node: row.get(2)?,
            edge_type: row.get(3)?,
            resolution: row.get(4)?,
            metadata: row.get(5)?,
        })
    }

    fn into_edge(self) -> Result<Edge> {
        let edge_type = EdgeType::parse(&self.edge_type)
            .ok_or_else(|| anyhow!("Unknown edge type '{}' for {}", self.edge_type, self.id))?;
        let resolution = Resolution::parse(&self.resolution).unwrap_or(Resolution::Speculative);

        Ok(Edge {
            metadata: serde_json::from_str(&self.metadata)
                .with_context(|| format!("Invalid metadata for edge {}", self.id))?,
            id: self.id,
            from_node: self.from_node,
            to_node: self.to_node,
            edge_type,
            resolution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{node_id, NodeMetadata};

    fn function(path: &str, name: &str) -> Node {
        Node {
            id: node_id(path, NodeType::Function, name),
            node_type: NodeType::Function,
            name: name.to_string(),
            file_path: path.to_string(),
            start_line: 1,
            end_line: 3,
            signature: Some(format!("fn {}()", name)),
            summary: None,
            metadata: NodeMetadata {
                language: "rust".to_string(),
                is_exported: true,
                ..NodeMetadata::default()
            },
        }
    }

    #[test]
    fn test_database_creation() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.graph.nodes, 0);
        assert_eq!(stats.vectors, 0);
        assert!(db.last_scan_run().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_node_upsert_reports_insert_then_update() {
        let db = Database::open_in_memory().unwrap();
        let node = function("/p/a.rs", "run");

        assert!(db.upsert_node(&node).await.unwrap());
        assert!(!db.upsert_node(&node).await.unwrap());

        let stored = db.get_node(&node.id).await.unwrap().unwrap();
        assert_eq!(stored, node);
        assert_eq!(db.get_nodes_by_path("/p/a.rs").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_edges_deleted_from_both_endpoints() {
        let db = Database::open_in_memory().unwrap();
        let a = function("/p/a.rs", "a");
        let b = function("/p/b.rs", "b");

        db.upsert_edge(&Edge::new(&a.id, EdgeType::Calls, &b.id, Resolution::Resolved))
            .await
            .unwrap();
        db.upsert_edge(&Edge::new(&b.id, EdgeType::Calls, &a.id, Resolution::Resolved))
            .await
            .unwrap();
        db.upsert_edge(&Edge::new(&b.id, EdgeType::Calls, "x", Resolution::Speculative))
            .await
            .unwrap();

        assert_eq!(db.get_edges_by_node(&a.id).await.unwrap().len(), 2);
        assert_eq!(db.delete_edges_by_node(&a.id).await.unwrap(), 2);
        assert_eq!(db.stats().await.unwrap().edges, 1);
        assert_eq!(db.stats().await.unwrap().speculative_edges, 1);
    }

    #[tokio::test]
    async fn test_vector_search_ranks_by_similarity() {
        let db = Database::open_in_memory().unwrap();
        let payload = serde_json::json!({"name": "a"});

        db.upsert("v1", &[1.0, 0.0], &payload).await.unwrap();
        db.upsert("v2", &[0.0, 1.0], &payload).await.unwrap();
        db.upsert("v1", &[0.9, 0.1], &payload).await.unwrap();

        assert_eq!(VectorStore::count(&db).await.unwrap(), 2);
        let hits = db.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "v1");

        assert!(VectorStore::delete(&db, "v2").await.unwrap());
        assert!(!VectorStore::delete(&db, "v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_hashes_and_replace_markers() {
        let db = Database::open_in_memory().unwrap();

        db.save_hash("/p/a.rs", "h1").await.unwrap();
        db.save_hash("/p/a.rs", "h2").await.unwrap();
        assert_eq!(db.load_hashes().await.unwrap()["/p/a.rs"], "h2");
        db.remove_hash("/p/a.rs").await.unwrap();
        assert!(db.load_hashes().await.unwrap().is_empty());

        let marker = db.begin_replace("/p/a.rs").await.unwrap();
        let pending = db.pending_replaces().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].marker_id, marker.marker_id);
        db.complete_replace("/p/a.rs").await.unwrap();
        assert!(db.pending_replaces().await.unwrap().is_empty());
    }

    #[test]
    fn test_scan_runs() {
        let db = Database::open_in_memory().unwrap();
        db.record_scan_run("scan", &serde_json::json!({"files_scanned": 3}), 1)
            .unwrap();

        let run = db.last_scan_run().unwrap().unwrap();
        assert_eq!(run.kind, "scan");
        assert_eq!(run.stats["files_scanned"], 3);
        assert_eq!(run.failures, 1);
    }
}
