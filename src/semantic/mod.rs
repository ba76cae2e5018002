//! Semantic index support
//!
//! Vector identity, the text that gets embedded for a node, and the
//! providers that turn that text into vectors.

mod embedding;

pub use embedding::{
    provider_from_config, EmbeddingProvider, LocalEmbedding, MockEmbedding, OpenAIEmbedding,
};

use crate::graph::Node;
use sha2::{Digest, Sha256};

/// Stable vector id for a node: `code_` plus the first 16 hex chars of
/// `sha256(file_path:name)`
pub fn vector_id(file_path: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update(b":");
    hasher.update(name.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("code_{}", &digest[..16])
}

/// Text embedded for a node: name, signature, summary, then the head of its source
pub fn embedding_text(node: &Node, source: &str, source_chars: usize) -> String {
    let mut parts = vec![node.name.clone()];
    if let Some(signature) = &node.signature {
        parts.push(signature.clone());
    }
    if let Some(summary) = &node.summary {
        parts.push(summary.clone());
    }

    let head: String = source.chars().take(source_chars).collect();
    if !head.trim().is_empty() {
        parts.push(head);
    }

    parts.join("\n")
}

/// Payload stored next to a node's vector
pub fn vector_payload(node: &Node) -> serde_json::Value {
    serde_json::json!({
        "node_id": node.id,
        "name": node.name,
        "node_type": node.node_type.as_str(),
        "file_path": node.file_path,
        "start_line": node.start_line,
        "end_line": node.end_line,
        "language": node.metadata.language,
    })
}

/// Compute cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
