//! Source extraction
//!
//! This module turns raw source text into structural units:
//! - Grammar registry and per-language syntax configuration
//! - Shared parser pool
//! - Token counting
//! - Structural chunking

pub mod chunker;
pub mod language;
pub mod pool;
pub mod tokens;

pub use chunker::{Chunk, ChunkOptions, Chunker, IMPORTS_NODE_TYPE, LINES_NODE_TYPE};
pub use language::{Language, LanguageSpec, SourceLanguage, SyntaxRole};
pub use pool::ParserPool;
pub use tokens::{LexicalTokenCounter, TokenCounter};

use sha2::{Digest, Sha256};

/// Compute a stable hash for content
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(content_hash("a"), content_hash("a"));
        assert_ne!(content_hash("a"), content_hash("b"));
    }
}
