//! Incremental scanning
//!
//! [`IncrementalScanner`] turns a list of source files into graph and vector
//! store updates. Each changed file is handled on its own:
//! - Added: chunk, extract, summarize, then write nodes, edges and vectors
//! - Modified: prepare the new records first, then journal the replace,
//!   delete everything the old version left behind, and write the new records
//! - Deleted: delete everything attributable to the path
//!
//! A file's hash is only persisted once all of its writes succeeded, so a
//! failed file is picked up again by the next scan.

mod error;
mod repair;

pub use error::{FailureCategory, ScanError, ScanFailure};
pub use repair::RepairReport;

use crate::extract::{Chunker, LexicalTokenCounter, ParserPool, SourceLanguage, TokenCounter};
use crate::graph::{EdgeType, ExtractContext, FileGraph, GraphExtractor, Node, NodeType};
use crate::llm::Summarizer;
use crate::repo::{ChangeDetector, ChangeKind, FileChange, ScanOptions, SourceFile};
use crate::semantic::{embedding_text, vector_id, vector_payload, EmbeddingProvider};
use crate::storage::{GraphStore, HashStore, ReplaceJournal, VectorStore};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Counts of operations a scan actually performed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    pub nodes_added: usize,
    pub nodes_updated: usize,
    pub nodes_deleted: usize,
    pub edges_added: usize,
    pub edges_deleted: usize,
    pub documents_updated: usize,
    pub embeddings_regenerated: usize,
    pub vectors_deleted: usize,
    pub summaries_generated: usize,
}

/// Outcome of [`IncrementalScanner::scan_incremental`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncrementalScanResult {
    pub changes: Vec<FileChange>,
    pub stats: ScanStats,
    pub failures: Vec<ScanFailure>,
}

impl IncrementalScanResult {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

/// Input files that have a usable language
struct Inputs<'f> {
    files: Vec<(&'f SourceFile, SourceLanguage)>,
    /// Position in `files` of the first entry for each path
    by_path: HashMap<&'f str, usize>,
    known: HashSet<String>,
    skipped: usize,
}

impl<'f> Inputs<'f> {
    fn get(&self, path: &str) -> Option<&(&'f SourceFile, SourceLanguage)> {
        self.by_path.get(path).map(|&i| &self.files[i])
    }

    fn sources(&self) -> Vec<SourceFile> {
        self.files.iter().map(|(file, _)| (*file).clone()).collect()
    }
}

/// Keeps the graph and vector stores in step with a source tree
pub struct IncrementalScanner {
    pool: Arc<ParserPool>,
    chunker: Chunker,
    extractor: GraphExtractor,
    graph: Arc<dyn GraphStore>,
    journal: Arc<dyn ReplaceJournal>,
    detector: ChangeDetector,
    vector_index: Option<VectorIndex>,
    summarizer: Option<Arc<dyn Summarizer>>,
    options: ScanOptions,
}

impl IncrementalScanner {
    /// Create a scanner whose graph, hashes and replace journal live in `store`
    pub fn new<S>(pool: Arc<ParserPool>, store: Arc<S>, options: ScanOptions) -> Self
    where
        S: GraphStore + HashStore + ReplaceJournal + 'static,
    {
        let counter: Arc<dyn TokenCounter> = Arc::new(LexicalTokenCounter);
        Self {
            chunker: Chunker::new(pool.clone(), counter),
            extractor: GraphExtractor::new(pool.clone()),
            pool,
            graph: store.clone(),
            journal: store.clone(),
            detector: ChangeDetector::new(store),
            vector_index: None,
            summarizer: None,
            options,
        }
    }

    /// Maintain vectors for indexable nodes
    pub fn with_vector_index(
        mut self,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        self.vector_index = Some(VectorIndex { store, embedder });
        self
    }

    /// Summarize declarations when `ScanOptions::summarize` is set
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.chunker = Chunker::new(self.pool.clone(), counter);
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Bring the stores in line with `files`
    pub async fn scan_incremental(&self, files: &[SourceFile]) -> Result<IncrementalScanResult> {
        let inputs = self.classify_inputs(files);
        let mut stats = ScanStats {
            files_skipped: inputs.skipped,
            ..ScanStats::default()
        };
        let mut failures = Vec::new();

        let changes = self.detector.detect_changes(&inputs.sources()).await?;
        tracing::debug!("{} changed files out of {}", changes.len(), inputs.files.len());

        for change in &changes {
            stats.files_scanned += 1;

            let outcome = match change.kind {
                ChangeKind::Deleted => self
                    .delete_file_data(&change.path, &mut stats)
                    .await
                    .map_err(|e| ScanError::storage(&change.path, e)),
                kind => match inputs.get(&change.path) {
                    Some((file, language)) => {
                        self.index_file(file, language, kind, &inputs.known, &mut stats)
                            .await
                    }
                    None => Err(ScanError::Unsupported(change.path.clone())),
                },
            };

            let outcome = match outcome {
                Ok(()) => self
                    .detector
                    .update_hash(change)
                    .await
                    .map_err(|e| ScanError::storage(&change.path, e)),
                Err(e) => Err(e),
            };

            if let Err(err) = outcome {
                tracing::warn!("Failed to process {} ({}): {}", change.path, change.kind, err);
                stats.files_failed += 1;
                failures.push(ScanFailure::new(&change.path, &err));
            }
        }

        if changes.iter().any(|c| c.kind != ChangeKind::Added) {
            if let Err(e) = self.prune_packages(&mut stats).await {
                tracing::warn!("Failed to prune unused packages: {}", e);
            }
        }

        tracing::info!(
            "Scan complete: {} files, +{} ~{} -{} nodes, +{} -{} edges, {} embeddings, {} failed",
            stats.files_scanned,
            stats.nodes_added,
            stats.nodes_updated,
            stats.nodes_deleted,
            stats.edges_added,
            stats.edges_deleted,
            stats.embeddings_regenerated,
            stats.files_failed
        );

        Ok(IncrementalScanResult {
            changes,
            stats,
            failures,
        })
    }

    /// Delete every node, edge and vector attributable to `path`
    pub async fn delete_file_data(&self, path: &str, stats: &mut ScanStats) -> Result<()> {
        let nodes = self.graph.get_nodes_by_path(path).await?;

        for node in &nodes {
            if node.is_indexable() {
                if let Some(index) = &self.vector_index {
                    match index.store.delete(&vector_id(path, &node.name)).await {
                        Ok(true) => stats.vectors_deleted += 1,
                        Ok(false) => {}
                        Err(e) => tracing::warn!("Failed to delete vector of {}: {}", node.id, e),
                    }
                }
            }

            stats.edges_deleted += self.graph.delete_edges_by_node(&node.id).await?;

            if self.graph.delete_node(&node.id).await? {
                stats.nodes_deleted += 1;
            }
        }

        tracing::debug!("Removed {} nodes of {}", nodes.len(), path);
        Ok(())
    }

    /// Delete package nodes no module depends on any more.
    ///
    /// Package nodes belong to no file (empty path), so file deletes never
    /// reach them.
    pub async fn prune_packages(&self, stats: &mut ScanStats) -> Result<()> {
        for node in self.graph.get_nodes_by_path("").await? {
            if node.node_type != NodeType::Package {
                continue;
            }

            let edges = self.graph.get_edges_by_node(&node.id).await?;
            let depended_on = edges
                .iter()
                .any(|e| e.edge_type == EdgeType::DependsOn && e.to_node == node.id);
            if depended_on {
                continue;
            }

            stats.edges_deleted += self.graph.delete_edges_by_node(&node.id).await?;
            if self.graph.delete_node(&node.id).await? {
                stats.nodes_deleted += 1;
                tracing::debug!("Pruned unused package {}", node.name);
            }
        }

        Ok(())
    }

    fn classify_inputs<'f>(&self, files: &'f [SourceFile]) -> Inputs<'f> {
        let mut inputs = Inputs {
            files: Vec::with_capacity(files.len()),
            by_path: HashMap::with_capacity(files.len()),
            known: HashSet::new(),
            skipped: 0,
        };

        for file in files {
            match SourceLanguage::for_path(&file.path, &self.options.extension_overrides) {
                Some(language) => {
                    inputs.known.insert(file.path.clone());
                    inputs
                        .by_path
                        .entry(file.path.as_str())
                        .or_insert(inputs.files.len());
                    inputs.files.push((file, language));
                }
                None => {
                    tracing::warn!("Skipping {}: unsupported language", file.path);
                    inputs.skipped += 1;
                }
            }
        }

        inputs
    }

    /// Write an added or modified file
    async fn index_file(
        &self,
        file: &SourceFile,
        language: &SourceLanguage,
        kind: ChangeKind,
        known: &HashSet<String>,
        stats: &mut ScanStats,
    ) -> Result<(), ScanError> {
        let graph = self.prepare(file, language, known, stats).await?;
        let path = file.path.as_str();

        if kind == ChangeKind::Modified {
            self.replace(path, &graph, stats).await
        } else {
            self.write_file(&graph, stats)
                .await
                .map_err(|e| ScanError::storage(path, e))
        }
    }

    /// Journaled delete-then-write of one file's records
    async fn replace(
        &self,
        path: &str,
        graph: &FileGraph,
        stats: &mut ScanStats,
    ) -> Result<(), ScanError> {
        let storage = |e| ScanError::storage(path, e);

        let marker = self.journal.begin_replace(path).await.map_err(storage)?;
        self.delete_file_data(path, stats).await.map_err(storage)?;
        self.write_file(graph, stats).await.map_err(storage)?;
        self.journal.complete_replace(path).await.map_err(storage)?;

        tracing::debug!("Replaced {} (marker {})", path, marker.marker_id);
        Ok(())
    }

    /// Chunk, extract and summarize without touching storage
    async fn prepare(
        &self,
        file: &SourceFile,
        language: &SourceLanguage,
        known: &HashSet<String>,
        stats: &mut ScanStats,
    ) -> Result<FileGraph, ScanError> {
        let chunks = self
            .chunker
            .chunk_file(&file.content, language, &self.options.chunk_options())
            .map_err(|e| ScanError::parse(&file.path, e))?;

        let ctx = ExtractContext {
            file_path: &file.path,
            project_root: self.options.project_root.as_deref(),
            known_files: known,
            path_aliases: &self.options.path_aliases,
        };

        let mut graph = self
            .extractor
            .extract_file(&ctx, &file.content, language, &chunks)
            .map_err(|e| ScanError::parse(&file.path, e))?;

        self.summarize(&mut graph, stats).await;

        Ok(graph)
    }

    async fn summarize(&self, graph: &mut FileGraph, stats: &mut ScanStats) {
        if !self.options.summarize {
            return;
        }
        let Some(summarizer) = &self.summarizer else {
            return;
        };

        for node in graph.nodes.iter_mut().filter(|n| n.is_indexable()) {
            let Some(chunk) = graph.chunks.get(&node.id) else {
                continue;
            };

            match summarizer.summarize(chunk).await {
                Ok(result) => {
                    node.summary = Some(result.summary);
                    node.metadata.summary_confidence = Some(result.confidence);
                    node.metadata.summary_generated_by = Some(result.generated_by);
                    stats.summaries_generated += 1;
                }
                Err(e) => tracing::warn!("Summary failed for {}: {}", node.id, e),
            }
        }
    }

    async fn write_file(&self, graph: &FileGraph, stats: &mut ScanStats) -> Result<()> {
        for node in &graph.nodes {
            if self.graph.upsert_node(node).await? {
                stats.nodes_added += 1;
            } else {
                stats.nodes_updated += 1;
            }
        }

        for edge in &graph.edges {
            if self.graph.upsert_edge(edge).await? {
                stats.edges_added += 1;
            }
        }

        self.index_vectors(graph, stats).await;
        Ok(())
    }

    /// Embed indexable nodes in batches; vector failures never fail the file
    async fn index_vectors(&self, graph: &FileGraph, stats: &mut ScanStats) {
        let Some(index) = &self.vector_index else {
            return;
        };

        let items: Vec<(&Node, String)> = graph
            .nodes
            .iter()
            .filter(|n| n.is_indexable())
            .map(|node| {
                let source = graph.chunks.get(&node.id).map(|c| c.source()).unwrap_or("");
                let text = embedding_text(node, source, self.options.embedding_source_chars);
                (node, text)
            })
            .collect();

        for batch in items.chunks(self.options.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();

            let vectors = match index.embedder.embed_batch(&texts).await {
                Ok(vectors) if vectors.len() == texts.len() => {
                    vectors.into_iter().map(Some).collect()
                }
                Ok(vectors) => {
                    tracing::warn!(
                        "Embedding batch returned {} vectors for {} texts, embedding one at a time",
                        vectors.len(),
                        texts.len()
                    );
                    embed_each(index.embedder.as_ref(), &texts).await
                }
                Err(e) => {
                    tracing::warn!("Embedding batch failed, embedding one at a time: {}", e);
                    embed_each(index.embedder.as_ref(), &texts).await
                }
            };

            for ((node, _), vector) in batch.iter().zip(vectors) {
                let Some(vector) = vector else {
                    continue;
                };
                stats.embeddings_regenerated += 1;

                let id = vector_id(&node.file_path, &node.name);
                match index.store.upsert(&id, &vector, &vector_payload(node)).await {
                    Ok(()) => stats.documents_updated += 1,
                    Err(e) => tracing::warn!("Failed to store vector of {}: {}", node.id, e),
                }
            }
        }
    }
}

async fn embed_each(embedder: &dyn EmbeddingProvider, texts: &[String]) -> Vec<Option<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(texts.len());
    for text in texts {
        match embedder.embed(text).await {
            Ok(vector) => vectors.push(Some(vector)),
            Err(e) => {
                tracing::warn!("Embedding failed: {}", e);
                vectors.push(None);
            }
        }
    }
    vectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{
        module_id, node_id, package_id, Edge, EdgeType, NodeMetadata, NodeType, Resolution,
    };
    use crate::llm::SummaryResult;
    use crate::semantic::MockEmbedding;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scanner(store: Arc<MemoryStore>) -> IncrementalScanner {
        IncrementalScanner::new(Arc::new(ParserPool::new()), store, ScanOptions::default())
    }

    fn with_vectors(store: Arc<MemoryStore>) -> IncrementalScanner {
        scanner(store.clone()).with_vector_index(store, Arc::new(MockEmbedding::new(8)))
    }

    const APP_TS: &str = "import { helper } from './utils';\n\nexport function main() {\n  return helper();\n}\n";
    const UTILS_TS: &str = "export function helper() {\n  return 1;\n}\n";

    #[tokio::test]
    async fn test_added_files_written() {
        let store = Arc::new(MemoryStore::new());
        let scanner = with_vectors(store.clone());
        let files = vec![
            SourceFile::new("/p/src/app.ts", APP_TS),
            SourceFile::new("/p/src/utils.ts", UTILS_TS),
        ];

        let result = scanner.scan_incremental(&files).await.unwrap();
        assert!(result.is_clean());
        assert_eq!(result.changes.len(), 2);
        assert_eq!(result.stats.files_scanned, 2);
        assert_eq!(result.stats.nodes_added, 4);
        assert_eq!(result.stats.embeddings_regenerated, 2);
        assert_eq!(result.stats.documents_updated, 2);

        let ids = store.node_ids().unwrap();
        assert!(ids.contains(&node_id("/p/src/app.ts", NodeType::Function, "main")));
        assert!(ids.contains(&module_id("/p/src/utils.ts")));

        let edges = store
            .get_edges_by_node(&module_id("/p/src/app.ts"))
            .await
            .unwrap();
        let import = edges
            .iter()
            .find(|e| e.edge_type == EdgeType::Imports)
            .unwrap();
        assert_eq!(import.to_node, module_id("/p/src/utils.ts"));
        assert_eq!(import.resolution, Resolution::Resolved);

        assert!(store
            .vector_ids()
            .unwrap()
            .contains(&vector_id("/p/src/app.ts", "main")));
    }

    #[tokio::test]
    async fn test_unchanged_rescan_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let scanner = with_vectors(store.clone());
        let files = vec![SourceFile::new("/p/src/utils.ts", UTILS_TS)];

        scanner.scan_incremental(&files).await.unwrap();
        let nodes_before = store.node_ids().unwrap();

        let result = scanner.scan_incremental(&files).await.unwrap();
        assert!(result.changes.is_empty());
        assert_eq!(result.stats, ScanStats::default());
        assert_eq!(store.node_ids().unwrap(), nodes_before);
    }

    #[tokio::test]
    async fn test_modification_replaces_previous_records() {
        let store = Arc::new(MemoryStore::new());
        let path = "/p/src/svc.ts";
        let old_a = node_id(path, NodeType::Function, "oldA");
        let old_b = node_id(path, NodeType::Function, "oldB");

        for (id, name) in [(&old_a, "oldA"), (&old_b, "oldB")] {
            store
                .upsert_node(&Node {
                    id: id.clone(),
                    node_type: NodeType::Function,
                    name: name.to_string(),
                    file_path: path.to_string(),
                    start_line: 1,
                    end_line: 2,
                    signature: None,
                    summary: None,
                    metadata: NodeMetadata::default(),
                })
                .await
                .unwrap();
        }
        for edge in [
            Edge::new(&old_a, EdgeType::Calls, &old_b, Resolution::Resolved),
            Edge::new(&old_b, EdgeType::Calls, "elsewhere", Resolution::Speculative),
            Edge::new("/p/src/other.ts:module", EdgeType::Calls, &old_a, Resolution::Speculative),
        ] {
            store.upsert_edge(&edge).await.unwrap();
        }
        store.save_hash(path, "stale").await.unwrap();

        let scanner = scanner(store.clone());
        let content = "export function fresh() {\n  return 2;\n}\n";
        let result = scanner
            .scan_incremental(&[SourceFile::new(path, content)])
            .await
            .unwrap();

        assert_eq!(result.changes[0].kind, ChangeKind::Modified);
        assert_eq!(result.stats.nodes_deleted, 2);
        assert!(result.stats.edges_deleted >= 3);
        assert_eq!(result.stats.nodes_added, 2);

        let ids = store.node_ids().unwrap();
        assert!(!ids.contains(&old_a));
        assert!(!ids.contains(&old_b));
        assert!(ids.contains(&node_id(path, NodeType::Function, "fresh")));
        assert!(store.edge_ids().unwrap().is_empty());
        assert!(store.pending_replaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_file_leaves_nothing() {
        let store = Arc::new(MemoryStore::new());
        let scanner = with_vectors(store.clone());
        let files = vec![
            SourceFile::new("/p/src/app.ts", APP_TS),
            SourceFile::new("/p/src/utils.ts", UTILS_TS),
        ];
        scanner.scan_incremental(&files).await.unwrap();

        let result = scanner.scan_incremental(&files[..1]).await.unwrap();
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].kind, ChangeKind::Deleted);
        assert_eq!(result.stats.nodes_deleted, 2);
        assert_eq!(result.stats.vectors_deleted, 1);

        assert!(store.get_nodes_by_path("/p/src/utils.ts").await.unwrap().is_empty());
        assert!(!store
            .vector_ids()
            .unwrap()
            .contains(&vector_id("/p/src/utils.ts", "helper")));
        assert!(!store.load_hashes().await.unwrap().contains_key("/p/src/utils.ts"));
    }

    #[tokio::test]
    async fn test_unused_packages_pruned() {
        let store = Arc::new(MemoryStore::new());
        let scanner = scanner(store.clone());
        let web = SourceFile::new("/p/src/web.ts", "import express from 'express';\n\nexport function serve() {\n  return express();\n}\n");
        let api = SourceFile::new("/p/src/api.ts", "import express from 'express';\nimport zod from 'zod';\n\nexport function route() {\n  return zod;\n}\n");

        scanner.scan_incremental(&[web.clone(), api.clone()]).await.unwrap();
        let ids = store.node_ids().unwrap();
        assert!(ids.contains(&package_id("express")));
        assert!(ids.contains(&package_id("zod")));

        // express is still used by web.ts; zod lost its only importer
        let result = scanner.scan_incremental(&[web.clone()]).await.unwrap();
        assert_eq!(result.stats.nodes_deleted, 3);
        let ids = store.node_ids().unwrap();
        assert!(ids.contains(&package_id("express")));
        assert!(!ids.contains(&package_id("zod")));

        let result = scanner.scan_incremental(&[]).await.unwrap();
        assert_eq!(result.changes[0].kind, ChangeKind::Deleted);
        assert!(store.node_ids().unwrap().is_empty());
        assert!(store.edge_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_paths_use_first_entry() {
        let store = Arc::new(MemoryStore::new());
        let scanner = scanner(store.clone());
        let files = vec![
            SourceFile::new("/p/src/utils.ts", UTILS_TS),
            SourceFile::new("/p/src/utils.ts", "export function other() {}\n"),
        ];

        let result = scanner.scan_incremental(&files).await.unwrap();
        assert_eq!(result.changes.len(), 1);
        let ids = store.node_ids().unwrap();
        assert!(ids.contains(&node_id("/p/src/utils.ts", NodeType::Function, "helper")));
        assert!(!ids.contains(&node_id("/p/src/utils.ts", NodeType::Function, "other")));
        assert_eq!(
            store.load_hashes().await.unwrap()["/p/src/utils.ts"],
            crate::extract::content_hash(UTILS_TS)
        );
    }

    #[tokio::test]
    async fn test_unsupported_files_skipped() {
        let store = Arc::new(MemoryStore::new());
        let scanner = scanner(store.clone());
        let files = vec![
            SourceFile::new("/p/README.md", "# hi\n"),
            SourceFile::new("/p/src/utils.ts", UTILS_TS),
        ];

        let result = scanner.scan_incremental(&files).await.unwrap();
        assert_eq!(result.stats.files_skipped, 1);
        assert_eq!(result.stats.files_scanned, 1);
        assert!(!store.load_hashes().await.unwrap().contains_key("/p/README.md"));
    }

    #[tokio::test]
    async fn test_text_override_chunks_lines() {
        let store = Arc::new(MemoryStore::new());
        let mut options = ScanOptions::default();
        options
            .extension_overrides
            .insert("txt".to_string(), "text".to_string());
        let scanner = IncrementalScanner::new(Arc::new(ParserPool::new()), store.clone(), options);

        let result = scanner
            .scan_incremental(&[SourceFile::new("/p/notes.txt", "alpha\nbeta\n")])
            .await
            .unwrap();
        assert!(result.is_clean());
        assert_eq!(result.stats.nodes_added, 1);
        assert!(store.node_ids().unwrap().contains(&module_id("/p/notes.txt")));
    }

    struct FlakyEmbedding {
        batches: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedding {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.len() > 1 {
                self.batches.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("batch rejected");
            }
            if texts[0].starts_with("broken") {
                anyhow::bail!("bad input");
            }
            Ok(vec![vec![1.0, 0.0]])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_failed_batch_falls_back_per_node() {
        let store = Arc::new(MemoryStore::new());
        let embedder = Arc::new(FlakyEmbedding {
            batches: AtomicUsize::new(0),
        });
        let scanner = scanner(store.clone()).with_vector_index(store.clone(), embedder.clone());

        let content = "def broken():\n    pass\n\ndef fine():\n    pass\n";
        let result = scanner
            .scan_incremental(&[SourceFile::new("/p/m.py", content)])
            .await
            .unwrap();

        assert!(result.is_clean());
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);
        assert_eq!(result.stats.embeddings_regenerated, 1);
        assert_eq!(store.vector_ids().unwrap(), vec![vector_id("/p/m.py", "fine")]);
        assert_eq!(store.node_ids().unwrap().len(), 3);
    }

    struct FixedSummarizer;

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(&self, chunk: &crate::extract::Chunk) -> Result<SummaryResult> {
            match chunk.name.as_deref() {
                Some("secret") => anyhow::bail!("refused"),
                name => Ok(SummaryResult {
                    summary: format!("Does {}", name.unwrap_or_default()),
                    confidence: 0.8,
                    generated_by: "fixed".to_string(),
                    needs_ai_summary: false,
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_summaries_attached_and_failures_tolerated() {
        let store = Arc::new(MemoryStore::new());
        let options = ScanOptions {
            summarize: true,
            ..ScanOptions::default()
        };
        let scanner = IncrementalScanner::new(Arc::new(ParserPool::new()), store.clone(), options)
            .with_summarizer(Arc::new(FixedSummarizer));

        let content = "def visible():\n    pass\n\ndef secret():\n    pass\n";
        let result = scanner
            .scan_incremental(&[SourceFile::new("/p/s.py", content)])
            .await
            .unwrap();
        assert_eq!(result.stats.summaries_generated, 1);

        let visible = store
            .get_node(&node_id("/p/s.py", NodeType::Function, "visible"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(visible.summary.as_deref(), Some("Does visible"));
        assert_eq!(visible.metadata.summary_generated_by.as_deref(), Some("fixed"));

        let secret = store
            .get_node(&node_id("/p/s.py", NodeType::Function, "secret"))
            .await
            .unwrap()
            .unwrap();
        assert!(secret.summary.is_none());
    }
}
