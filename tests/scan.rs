//! Incremental scanning against an on-disk database

use codeatlas::extract::{ChunkOptions, LexicalTokenCounter, SourceLanguage};
use codeatlas::graph::{module_id, node_id, package_id, EdgeType, NodeType, Resolution};
use codeatlas::repo::ChangeKind;
use codeatlas::semantic::{vector_id, EmbeddingProvider, MockEmbedding};
use codeatlas::storage::{GraphStore, HashStore, ReplaceJournal, VectorStore};
use codeatlas::{Chunker, Database, IncrementalScanner, ParserPool, ScanOptions, SourceFile};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

const APP_TS: &str = "import express from 'express';\nimport { Client } from '@scope/sdk/client';\nimport { helper } from './utils';\n\nexport function main() {\n  return helper(express(), new Client());\n}\n";
const UTILS_TS: &str = "export function helper() {\n  return 1;\n}\n";

fn open_db(dir: &TempDir) -> Arc<Database> {
    Arc::new(Database::open(dir.path().join("atlas.db")).unwrap())
}

fn scanner(db: Arc<Database>) -> IncrementalScanner {
    IncrementalScanner::new(Arc::new(ParserPool::new()), db.clone(), ScanOptions::default())
        .with_vector_index(db, Arc::new(MockEmbedding::new(16)))
}

#[tokio::test]
async fn test_scan_tracks_add_modify_delete() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let scanner = scanner(db.clone());

    let app = "/proj/src/app.ts";
    let utils = "/proj/src/utils.ts";
    let files = vec![SourceFile::new(app, APP_TS), SourceFile::new(utils, UTILS_TS)];

    let first = scanner.scan_incremental(&files).await.unwrap();
    assert!(first.is_clean());
    assert!(first.changes.iter().all(|c| c.kind == ChangeKind::Added));
    assert_eq!(db.count().await.unwrap(), 2);
    assert_eq!(db.load_hashes().await.unwrap().len(), 2);

    // Modify utils: helper is replaced by assist
    let changed = "export function assist() {\n  return 2;\n}\n";
    let files = vec![SourceFile::new(app, APP_TS), SourceFile::new(utils, changed)];
    let second = scanner.scan_incremental(&files).await.unwrap();
    assert_eq!(second.changes.len(), 1);
    assert_eq!(second.changes[0].kind, ChangeKind::Modified);

    let nodes = db.get_nodes_by_path(utils).await.unwrap();
    let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    assert!(names.contains(&"assist"));
    assert!(!names.contains(&"helper"));
    assert!(db
        .get_node(&node_id(utils, NodeType::Function, "helper"))
        .await
        .unwrap()
        .is_none());
    assert!(db.pending_replaces().await.unwrap().is_empty());

    // Delete utils entirely
    let third = scanner
        .scan_incremental(&[SourceFile::new(app, APP_TS)])
        .await
        .unwrap();
    assert_eq!(third.changes.len(), 1);
    assert_eq!(third.changes[0].kind, ChangeKind::Deleted);
    assert!(db.get_nodes_by_path(utils).await.unwrap().is_empty());
    assert!(!db.load_hashes().await.unwrap().contains_key(utils));
    assert_eq!(db.count().await.unwrap(), 1);
    assert_eq!(third.stats.vectors_deleted, 1);
}

#[tokio::test]
async fn test_external_imports_become_packages() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let scanner = scanner(db.clone());

    scanner
        .scan_incremental(&[
            SourceFile::new("/proj/src/app.ts", APP_TS),
            SourceFile::new("/proj/src/utils.ts", UTILS_TS),
        ])
        .await
        .unwrap();

    let edges = db
        .get_edges_by_node(&module_id("/proj/src/app.ts"))
        .await
        .unwrap();

    let packages: Vec<&str> = edges
        .iter()
        .filter(|e| e.edge_type == EdgeType::DependsOn)
        .map(|e| e.to_node.as_str())
        .collect();
    assert!(packages.contains(&package_id("express").as_str()));
    assert!(packages.contains(&package_id("@scope/sdk").as_str()));
    assert!(edges
        .iter()
        .filter(|e| e.edge_type == EdgeType::DependsOn)
        .all(|e| e.resolution == Resolution::External));

    let local = edges
        .iter()
        .find(|e| e.edge_type == EdgeType::Imports)
        .unwrap();
    assert_eq!(local.to_node, module_id("/proj/src/utils.ts"));
    assert_eq!(local.resolution, Resolution::Resolved);

    let stats = db.get_stats().unwrap();
    assert_eq!(stats.graph.packages, 2);
    assert_eq!(stats.graph.files, 2);
}

#[tokio::test]
async fn test_hashes_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let files = vec![SourceFile::new("/proj/src/utils.ts", UTILS_TS)];

    {
        let db = open_db(&dir);
        let result = scanner(db).scan_incremental(&files).await.unwrap();
        assert_eq!(result.changes.len(), 1);
    }

    let db = open_db(&dir);
    let result = scanner(db.clone()).scan_incremental(&files).await.unwrap();
    assert!(result.changes.is_empty());
    assert!(db
        .get_node(&node_id("/proj/src/utils.ts", NodeType::Function, "helper"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_vector_ids_are_stable() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let scanner = scanner(db.clone());
    let path = "/proj/src/utils.ts";

    scanner
        .scan_incremental(&[SourceFile::new(path, UTILS_TS)])
        .await
        .unwrap();

    let id = vector_id(path, "helper");
    assert_eq!(id, vector_id(path, "helper"));
    assert!(id.starts_with("code_"));

    let query = MockEmbedding::new(16).embed("helper").await.unwrap();
    let hits = db.search(&query, 5).await.unwrap();
    assert!(hits.iter().any(|hit| hit.id == id));
}

#[test]
fn test_oversized_function_tiles_its_source() {
    let mut source = String::from("export function big() {\n");
    for i in 0..60 {
        source.push_str(&format!("  const value{} = compute({}, {});\n", i, i, i + 1));
    }
    source.push_str("}\n");

    let chunker = Chunker::new(Arc::new(ParserPool::new()), Arc::new(LexicalTokenCounter));
    let language = SourceLanguage::for_path("big.ts", &HashMap::new()).unwrap();
    let options = ChunkOptions {
        max_tokens: 40,
        inline_imports: false,
    };

    let chunks = chunker.chunk_file(&source, &language, &options).unwrap();
    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| c.is_partial()));
    assert!(chunks.iter().all(|c| c.name.as_deref() == Some("big")));

    assert_eq!(chunks[0].start_byte, 0);
    assert_eq!(chunks[0].start_line, 1);
    for pair in chunks.windows(2) {
        assert_eq!(pair[1].start_byte, pair[0].end_byte);
        assert_eq!(pair[1].start_line, pair[0].end_line + 1);
    }

    let joined: String = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(joined.trim_end(), source.trim_end());
}
