//! Storage layer for codeatlas
//!
//! The scanner talks to its stores through the async traits defined here:
//! - [`GraphStore`]: nodes and edges
//! - [`VectorStore`]: embeddings keyed by vector id
//! - [`HashStore`]: the path to content-hash table of the change detector
//! - [`ReplaceJournal`]: markers for in-flight Modified replaces
//!
//! [`Database`] implements all of them on SQLite; [`MemoryStore`] keeps
//! everything in process for tests and dry runs.

mod database;
mod memory;
mod schema;

pub use database::{Database, DatabaseStats, ScanRun};
pub use memory::MemoryStore;
pub use schema::SCHEMA;

use crate::graph::{Edge, Node};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persistence for the structural graph
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// All nodes whose `file_path` equals `path`
    async fn get_nodes_by_path(&self, path: &str) -> Result<Vec<Node>>;

    async fn get_node(&self, id: &str) -> Result<Option<Node>>;

    /// Edges with `id` at either endpoint
    async fn get_edges_by_node(&self, id: &str) -> Result<Vec<Edge>>;

    /// Insert or replace by id; returns `true` when the node was new
    async fn upsert_node(&self, node: &Node) -> Result<bool>;

    /// Insert or replace by id; returns `true` when the edge was new
    async fn upsert_edge(&self, edge: &Edge) -> Result<bool>;

    async fn delete_node(&self, id: &str) -> Result<bool>;

    /// Delete every edge touching `id`; returns the number removed
    async fn delete_edges_by_node(&self, id: &str) -> Result<usize>;

    async fn stats(&self) -> Result<GraphStats>;
}

/// Persistence for embeddings
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the vector at `id`
    async fn upsert(&self, id: &str, vector: &[f32], payload: &serde_json::Value) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<bool>;

    /// The `k` vectors most similar to `query`, best first
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorMatch>>;

    async fn count(&self) -> Result<usize>;
}

/// Persisted content hashes
#[async_trait]
pub trait HashStore: Send + Sync {
    async fn load_hashes(&self) -> Result<HashMap<String, String>>;

    async fn save_hash(&self, path: &str, hash: &str) -> Result<()>;

    async fn remove_hash(&self, path: &str) -> Result<()>;
}

/// Journal of Modified replaces that started but may not have finished
#[async_trait]
pub trait ReplaceJournal: Send + Sync {
    async fn begin_replace(&self, path: &str) -> Result<ReplaceMarker>;

    async fn complete_replace(&self, path: &str) -> Result<()>;

    async fn pending_replaces(&self) -> Result<Vec<ReplaceMarker>>;
}

/// An in-flight replace of one file's records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceMarker {
    pub file_path: String,
    pub marker_id: String,
    pub started_at: DateTime<Utc>,
}

impl ReplaceMarker {
    pub fn new(file_path: &str) -> Self {
        Self {
            file_path: file_path.to_string(),
            marker_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        }
    }
}

/// Graph size summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub files: usize,
    pub packages: usize,
    pub speculative_edges: usize,
}

/// A vector search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    pub payload: serde_json::Value,
}

/// Encode an embedding as little-endian f32 bytes
pub(crate) fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub(crate) fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_bytes() {
        let vector = vec![0.5, -1.25, 3.0];
        assert_eq!(decode_vector(&encode_vector(&vector)), vector);
        assert!(decode_vector(&[1, 2, 3]).is_empty());
    }

    #[test]
    fn test_replace_marker_ids_unique() {
        let a = ReplaceMarker::new("/p/a.ts");
        let b = ReplaceMarker::new("/p/a.ts");
        assert_ne!(a.marker_id, b.marker_id);
        assert_eq!(a.file_path, "/p/a.ts");
    }
}
