//! In-process stores

use super::{
    GraphStats, GraphStore, HashStore, ReplaceJournal, ReplaceMarker, VectorMatch, VectorStore,
};
use crate::graph::{Edge, Node, NodeType, Resolution};
use crate::semantic::cosine_similarity;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<String, Edge>,
    vectors: BTreeMap<String, (Vec<f32>, serde_json::Value)>,
    hashes: HashMap<String, String>,
    markers: BTreeMap<String, ReplaceMarker>,
}

/// Every store trait over maps behind one lock
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))
    }

    /// Ids of every stored node
    pub fn node_ids(&self) -> Result<Vec<String>> {
        Ok(self.state()?.nodes.keys().cloned().collect())
    }

    /// Ids of every stored edge
    pub fn edge_ids(&self) -> Result<Vec<String>> {
        Ok(self.state()?.edges.keys().cloned().collect())
    }

    /// Ids of every stored vector
    pub fn vector_ids(&self) -> Result<Vec<String>> {
        Ok(self.state()?.vectors.keys().cloned().collect())
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn get_nodes_by_path(&self, path: &str) -> Result<Vec<Node>> {
        let mut nodes: Vec<Node> = self
            .state()?
            .nodes
            .values()
            .filter(|node| node.file_path == path)
            .cloned()
            .collect();
        nodes.sort_by_key(|node| node.start_line);
        Ok(nodes)
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.state()?.nodes.get(id).cloned())
    }

    async fn get_edges_by_node(&self, id: &str) -> Result<Vec<Edge>> {
        Ok(self
            .state()?
            .edges
            .values()
            .filter(|edge| edge.touches(id))
            .cloned()
            .collect())
    }

    async fn upsert_node(&self, node: &Node) -> Result<bool> {
        Ok(self
            .state()?
            .nodes
            .insert(node.id.clone(), node.clone())
            .is_none())
    }

    async fn upsert_edge(&self, edge: &Edge) -> Result<bool> {
        Ok(self
            .state()?
            .edges
            .insert(edge.id.clone(), edge.clone())
            .is_none())
    }

    async fn delete_node(&self, id: &str) -> Result<bool> {
        Ok(self.state()?.nodes.remove(id).is_some())
    }

    async fn delete_edges_by_node(&self, id: &str) -> Result<usize> {
        let mut state = self.state()?;
        let before = state.edges.len();
        state.edges.retain(|_, edge| !edge.touches(id));
        Ok(before - state.edges.len())
    }

    async fn stats(&self) -> Result<GraphStats> {
        let state = self.state()?;
        let files: HashSet<&str> = state
            .nodes
            .values()
            .filter(|node| node.node_type == NodeType::Module)
            .map(|node| node.file_path.as_str())
            .collect();

        Ok(GraphStats {
            nodes: state.nodes.len(),
            edges: state.edges.len(),
            files: files.len(),
            packages: state
                .nodes
                .values()
                .filter(|node| node.node_type == NodeType::Package)
                .count(),
            speculative_edges: state
                .edges
                .values()
                .filter(|edge| edge.resolution == Resolution::Speculative)
                .count(),
        })
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, id: &str, vector: &[f32], payload: &serde_json::Value) -> Result<()> {
        self.state()?
            .vectors
            .insert(id.to_string(), (vector.to_vec(), payload.clone()));
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.state()?.vectors.remove(id).is_some())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorMatch>> {
        let mut matches: Vec<VectorMatch> = self
            .state()?
            .vectors
            .iter()
            .map(|(id, (vector, payload))| VectorMatch {
                id: id.clone(),
                score: cosine_similarity(query, vector) as f32,
                payload: payload.clone(),
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(k);
        Ok(matches)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.state()?.vectors.len())
    }
}

#[async_trait]
impl HashStore for MemoryStore {
    async fn load_hashes(&self) -> Result<HashMap<String, String>> {
        Ok(self.state()?.hashes.clone())
    }

    async fn save_hash(&self, path: &str, hash: &str) -> Result<()> {
        self.state()?
            .hashes
            .insert(path.to_string(), hash.to_string());
        Ok(())
    }

    async fn remove_hash(&self, path: &str) -> Result<()> {
        self.state()?.hashes.remove(path);
        Ok(())
    }
}

#[async_trait]
impl ReplaceJournal for MemoryStore {
    async fn begin_replace(&self, path: &str) -> Result<ReplaceMarker> {
        let marker = ReplaceMarker::new(path);
        self.state()?
            .markers
            .insert(path.to_string(), marker.clone());
        Ok(marker)
    }

    async fn complete_replace(&self, path: &str) -> Result<()> {
        self.state()?.markers.remove(path);
        Ok(())
    }

    async fn pending_replaces(&self) -> Result<Vec<ReplaceMarker>> {
        Ok(self.state()?.markers.values().cloned().collect())
    }
}
