//! codeatlas - incremental structural and semantic index for source trees
//!
//! Source files are split into token-bounded chunks, turned into a typed
//! graph of modules, declarations and packages, and mirrored into a vector
//! index. Rescans only touch files whose content hash changed.

pub mod cli;
pub mod extract;
pub mod graph;
pub mod llm;
pub mod repo;
pub mod scan;
pub mod semantic;
pub mod storage;

/// Re-export commonly used types
pub use extract::{Chunk, Chunker, Language, ParserPool};
pub use graph::{Edge, GraphExtractor, Node};
pub use repo::{ChangeDetector, FileChange, Project, ScanOptions, SourceFile};
pub use scan::{IncrementalScanResult, IncrementalScanner, ScanStats};
pub use storage::{Database, MemoryStore};

/// Application-wide error type
pub use anyhow::Result;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "codeatlas";
