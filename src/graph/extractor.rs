//! Graph extraction
//!
//! Turns a file's chunks into nodes and edges. Nodes are built first so call
//! and heritage targets can be checked against the declarations of the same
//! pass; imports are then parsed and classified into project-module and
//! package dependencies.

use super::imports::{parse_imports, resolve_import, ImportTarget, ParsedImport};
use super::relations::detectors;
use super::{
    module_id, node_id, package_id, Edge, EdgeMetadata, EdgeType, Node, NodeMetadata, NodeType,
    Resolution,
};
use crate::extract::chunker::{first_code_line, import_spans};
use crate::extract::{Chunk, Language, ParserPool, SourceLanguage};
use anyhow::Result;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tree_sitter::Tree;

/// Per-file inputs to extraction
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext<'a> {
    pub file_path: &'a str,
    /// Base for alias and crate-root resolution
    pub project_root: Option<&'a Path>,
    /// Paths of every file in the project, used to confirm import targets
    pub known_files: &'a HashSet<String>,
    pub path_aliases: &'a BTreeMap<String, String>,
}

/// Everything extracted from one file
#[derive(Debug, Clone, Default)]
pub struct FileGraph {
    /// Module node first, then declarations, then packages
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub imports: Vec<ParsedImport>,
    /// Declaration chunk per node id; partials are merged into one chunk
    pub chunks: HashMap<String, Chunk>,
}

impl FileGraph {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edges_of_type(&self, edge_type: EdgeType) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.edge_type == edge_type)
    }
}

/// Declaration names of one pass mapped to node ids
#[derive(Debug, Default)]
pub struct SymbolTable {
    by_name: HashMap<String, String>,
}

impl SymbolTable {
    pub fn insert(&mut self, node: &Node) {
        self.by_name
            .entry(node.name.clone())
            .or_insert_with(|| node.id.clone());
        if let Some((_, short)) = node.name.rsplit_once('.') {
            self.by_name
                .entry(short.to_string())
                .or_insert_with(|| node.id.clone());
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }
}

/// Collects edges, collapsing duplicates by id
#[derive(Default)]
struct EdgeSet {
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
}

impl EdgeSet {
    fn insert(&mut self, edge: Edge) {
        match self.index.get(&edge.id) {
            Some(&i) => {
                let existing = &mut self.edges[i].metadata.imported_symbols;
                for symbol in edge.metadata.imported_symbols {
                    if !existing.contains(&symbol) {
                        existing.push(symbol);
                    }
                }
            }
            None => {
                self.index.insert(edge.id.clone(), self.edges.len());
                self.edges.push(edge);
            }
        }
    }
}

pub struct GraphExtractor {
    pool: Arc<ParserPool>,
}

impl GraphExtractor {
    pub fn new(pool: Arc<ParserPool>) -> Self {
        Self { pool }
    }

    /// Extract the module node, declarations, relationships and imports of one file
    pub fn extract_file(
        &self,
        ctx: &ExtractContext<'_>,
        content: &str,
        language: &SourceLanguage,
        chunks: &[Chunk],
    ) -> Result<FileGraph> {
        let mut graph = FileGraph::default();
        let module = module_node(ctx.file_path, content, &language.name(), chunks);
        let module_node_id = module.id.clone();
        graph.nodes.push(module);

        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut sources: Vec<(usize, &Chunk)> = Vec::new();

        for chunk in chunks.iter().filter(|c| c.is_function || c.is_class) {
            let Some(node) = chunk_node(ctx.file_path, chunk) else {
                continue;
            };

            match positions.get(&node.id) {
                Some(&i) => {
                    match graph.chunks.get_mut(&node.id) {
                        Some(merged) if continues(merged, chunk) => {
                            merge_node(&mut graph.nodes[i], &node);
                            merge_chunk(merged, chunk);
                        }
                        // e.g. `struct Foo` then `impl Foo`: same id, separate code
                        _ => tracing::debug!(
                            "{} declared again at line {}, keeping lines {}-{}",
                            node.id,
                            chunk.start_line,
                            graph.nodes[i].start_line,
                            graph.nodes[i].end_line
                        ),
                    }
                    sources.push((i, chunk));
                }
                None => {
                    positions.insert(node.id.clone(), graph.nodes.len());
                    sources.push((graph.nodes.len(), chunk));
                    graph.chunks.insert(node.id.clone(), chunk.clone());
                    graph.nodes.push(node);
                }
            }
        }

        let mut symbols = SymbolTable::default();
        for node in graph.nodes.iter().skip(1) {
            symbols.insert(node);
        }

        let mut edges = EdgeSet::default();

        if let Some(lang) = language.grammar() {
            for (i, chunk) in sources {
                let from = graph.nodes[i].id.clone();
                match self.chunk_relations(ctx.file_path, lang, chunk, &from, &symbols) {
                    Ok(found) => found.into_iter().for_each(|e| edges.insert(e)),
                    Err(e) => {
                        tracing::warn!(
                            "Skipping relationships of {} in {}: {}",
                            from,
                            ctx.file_path,
                            e
                        );
                    }
                }
            }

            let tree = match self.pool.parse(lang, content) {
                Ok(tree) => Some(tree),
                Err(e) => {
                    tracing::warn!("Reading imports of {} as plain text: {}", ctx.file_path, e);
                    None
                }
            };
            graph.imports = file_imports(lang, content, tree.as_ref());
            let mut packages: HashSet<String> = HashSet::new();

            for import in &graph.imports {
                let metadata = EdgeMetadata {
                    imported_symbols: import.symbols.clone(),
                    line: Some(import.line),
                    source: Some(import.source.clone()),
                    is_default: import.is_default,
                    is_namespace: import.is_namespace,
                };

                match resolve_import(ctx, lang, import) {
                    ImportTarget::Module { path, resolution } => {
                        if path.is_empty() || path == ctx.file_path {
                            continue;
                        }
                        edges.insert(
                            Edge::new(&module_node_id, EdgeType::Imports, &module_id(&path), resolution)
                                .with_metadata(metadata),
                        );
                    }
                    ImportTarget::Package(name) => {
                        let target = package_id(&name);
                        edges.insert(
                            Edge::new(&module_node_id, EdgeType::DependsOn, &target, Resolution::External)
                                .with_metadata(metadata),
                        );
                        if packages.insert(target) {
                            graph.nodes.push(package_node(&name, lang));
                        }
                    }
                }
            }
        }

        graph.edges = edges.edges;

        tracing::debug!(
            "Extracted {} nodes, {} edges from {}",
            graph.nodes.len(),
            graph.edges.len(),
            ctx.file_path
        );

        Ok(graph)
    }

    /// Extract the node of a single chunk and the relationships found in it.
    ///
    /// Only the chunk's own declaration is known here, so calls to anything
    /// else stay speculative.
    pub fn extract_chunk(&self, file_path: &str, chunk: &Chunk) -> Result<Option<(Node, Vec<Edge>)>> {
        let Some(node) = chunk_node(file_path, chunk) else {
            return Ok(None);
        };
        let Some(language) = Language::from_name(&chunk.language) else {
            return Ok(Some((node, Vec::new())));
        };

        let mut symbols = SymbolTable::default();
        symbols.insert(&node);
        let edges = self.chunk_relations(file_path, language, chunk, &node.id, &symbols)?;
        Ok(Some((node, edges)))
    }

    /// Calls and heritage found by re-parsing the chunk's own text
    fn chunk_relations(
        &self,
        file_path: &str,
        language: Language,
        chunk: &Chunk,
        from: &str,
        symbols: &SymbolTable,
    ) -> Result<Vec<Edge>> {
        let source = chunk.source();
        let tree = self.pool.parse(language, source)?;
        let detectors = detectors(language);
        let mut edges = Vec::new();

        for site in detectors.calls(tree.root_node(), source) {
            let (target, resolution) = resolve_target(file_path, NodeType::Function, &site.callee, symbols);
            let metadata = EdgeMetadata {
                line: Some(chunk.start_line + site.row),
                ..EdgeMetadata::default()
            };
            edges.push(Edge::new(from, EdgeType::Calls, &target, resolution).with_metadata(metadata));
        }

        if chunk.is_class {
            if let Some(heritage) = detectors.heritage(tree.root_node(), source) {
                let line = Some(chunk.start_line);
                let parent_type = if heritage.is_interface {
                    NodeType::Interface
                } else {
                    NodeType::Class
                };

                if let Some(parent) = heritage.extends {
                    let (target, resolution) = resolve_target(file_path, parent_type, &parent, symbols);
                    edges.push(
                        Edge::new(from, EdgeType::Extends, &target, resolution)
                            .with_metadata(EdgeMetadata { line, ..EdgeMetadata::default() }),
                    );
                }
                for interface in heritage.implements {
                    let (target, resolution) =
                        resolve_target(file_path, NodeType::Interface, &interface, symbols);
                    edges.push(
                        Edge::new(from, EdgeType::Implements, &target, resolution)
                            .with_metadata(EdgeMetadata { line, ..EdgeMetadata::default() }),
                    );
                }
            }
        }

        Ok(edges)
    }
}

fn resolve_target(
    file_path: &str,
    node_type: NodeType,
    name: &str,
    symbols: &SymbolTable,
) -> (String, Resolution) {
    match symbols.resolve(name) {
        Some(id) => (id.to_string(), Resolution::Resolved),
        None => (node_id(file_path, node_type, name), Resolution::Speculative),
    }
}

fn module_node(file_path: &str, content: &str, language: &str, chunks: &[Chunk]) -> Node {
    let name = Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.to_string());

    let mut exported_symbols: Vec<String> = Vec::new();
    for chunk in chunks {
        if (chunk.is_function || chunk.is_class) && chunk.is_exported == Some(true) {
            if let Some(symbol) = &chunk.name {
                if !exported_symbols.contains(symbol) {
                    exported_symbols.push(symbol.clone());
                }
            }
        }
    }

    Node {
        id: module_id(file_path),
        node_type: NodeType::Module,
        name,
        file_path: file_path.to_string(),
        start_line: 1,
        end_line: content.lines().count().max(1),
        signature: None,
        summary: None,
        metadata: NodeMetadata {
            language: language.to_string(),
            is_exported: !exported_symbols.is_empty(),
            exported_symbols,
            ..NodeMetadata::default()
        },
    }
}

/// Node for a function-like or class-like chunk
pub fn chunk_node(file_path: &str, chunk: &Chunk) -> Option<Node> {
    let name = chunk.name.as_ref()?;
    let spec = Language::from_name(&chunk.language).map(|l| l.spec());

    let node_type = if chunk.is_class {
        let is_interface = spec.is_some_and(|s| s.interfaces.contains(&chunk.base_kind()));
        if is_interface {
            NodeType::Interface
        } else {
            NodeType::Class
        }
    } else if chunk.is_function {
        NodeType::Function
    } else {
        return None;
    };

    let display_name = match &chunk.parent_name {
        Some(parent) => format!("{}.{}", parent, name),
        None => name.clone(),
    };

    let signature = first_code_line(chunk.source());
    let is_exported = chunk
        .is_exported
        .unwrap_or_else(|| spec.is_some_and(|s| s.is_exported(signature, Some(name))));
    let is_async = spec.is_some_and(|s| s.is_async(signature));

    Some(Node {
        id: node_id(file_path, node_type, &display_name),
        node_type,
        name: display_name,
        file_path: file_path.to_string(),
        start_line: chunk.start_line,
        end_line: chunk.end_line,
        signature: (!signature.is_empty()).then(|| signature.to_string()),
        summary: None,
        metadata: NodeMetadata {
            language: chunk.language.clone(),
            is_exported,
            is_async,
            parent: chunk.parent_name.clone(),
            ..NodeMetadata::default()
        },
    })
}

/// Widen `existing` to cover a later partial of the same declaration
fn merge_node(existing: &mut Node, partial: &Node) {
    existing.start_line = existing.start_line.min(partial.start_line);
    existing.end_line = existing.end_line.max(partial.end_line);
    existing.metadata.is_exported |= partial.metadata.is_exported;
    existing.metadata.is_async |= partial.metadata.is_async;
    if existing.signature.is_none() {
        existing.signature = partial.signature.clone();
    }
}

/// Whether `next` is the following line window of the declaration in `merged`
fn continues(merged: &Chunk, next: &Chunk) -> bool {
    merged.is_partial()
        && next.is_partial()
        && merged.node_type == next.node_type
        && merged.end_byte == next.start_byte
}

fn merge_chunk(existing: &mut Chunk, partial: &Chunk) {
    existing.content.push_str(partial.source());
    existing.end_byte = partial.end_byte;
    existing.end_line = existing.end_line.max(partial.end_line);
    existing.token_count += partial.token_count;
}

/// Imports of a file, each statement parsed at its own line
fn file_imports(language: Language, content: &str, tree: Option<&Tree>) -> Vec<ParsedImport> {
    let syntax = language.spec().import_syntax;
    let spans = tree
        .map(|tree| import_spans(language, tree.root_node()))
        .unwrap_or_default();

    if spans.is_empty() {
        return parse_imports(syntax, content, 1);
    }

    spans
        .into_iter()
        .filter_map(|(range, line)| content.get(range).map(|text| (text, line)))
        .flat_map(|(text, line)| parse_imports(syntax, text, line))
        .collect()
}

fn package_node(name: &str, language: Language) -> Node {
    Node {
        id: package_id(name),
        node_type: NodeType::Package,
        name: name.to_string(),
        file_path: String::new(),
        start_line: 0,
        end_line: 0,
        signature: None,
        summary: None,
        metadata: NodeMetadata {
            language: language.to_string(),
            ..NodeMetadata::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ChunkOptions, Chunker, LexicalTokenCounter};

    struct Fixture {
        pool: Arc<ParserPool>,
        known: HashSet<String>,
        aliases: BTreeMap<String, String>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                pool: Arc::new(ParserPool::new()),
                known: HashSet::new(),
                aliases: BTreeMap::new(),
            }
        }

        fn extract(&self, path: &str, content: &str, max_tokens: usize) -> FileGraph {
            let language = SourceLanguage::for_path(path, &HashMap::new()).unwrap();
            let chunker = Chunker::new(Arc::clone(&self.pool), Arc::new(LexicalTokenCounter));
            let options = ChunkOptions {
                max_tokens,
                inline_imports: false,
            };
            let chunks = chunker.chunk_file(content, &language, &options).unwrap();
            let ctx = ExtractContext {
                file_path: path,
                project_root: Some(Path::new("/p")),
                known_files: &self.known,
                path_aliases: &self.aliases,
            };
            GraphExtractor::new(Arc::clone(&self.pool))
                .extract_file(&ctx, content, &language, &chunks)
                .unwrap()
        }
    }

    #[test]
    fn test_module_node_and_exports() {
        let source = "import express from 'express';\nimport { z } from '@scope/sdk';\n\nexport function handler(req) {\n  return validate(req);\n}\n\nfunction validate(req) {\n  return z.parse(req);\n}\n";
        let graph = Fixture::new().extract("/p/src/app.ts", source, 512);

        let module = &graph.nodes[0];
        assert_eq!(module.id, "/p/src/app.ts:module");
        assert_eq!(module.name, "app.ts");
        assert_eq!(module.metadata.exported_symbols, vec!["handler"]);
        assert_eq!(module.end_line, 10);

        let handler = graph.node("/p/src/app.ts:function:handler").unwrap();
        assert!(handler.metadata.is_exported);
        assert_eq!(handler.signature.as_deref(), Some("export function handler(req) {"));

        let deps: Vec<&str> = graph
            .edges_of_type(EdgeType::DependsOn)
            .map(|e| e.to_node.as_str())
            .collect();
        assert_eq!(deps, vec!["pkg:express", "pkg:@scope/sdk"]);
        assert!(graph.node("pkg:express").is_some_and(|n| n.file_path.is_empty()));
    }

    #[test]
    fn test_call_resolution() {
        let source = "export function handler(req) {\n  return validate(req);\n}\n\nfunction validate(req) {\n  return check(req);\n}\n";
        let graph = Fixture::new().extract("/p/src/app.ts", source, 512);

        let calls: Vec<&Edge> = graph.edges_of_type(EdgeType::Calls).collect();
        assert_eq!(calls.len(), 2);

        assert_eq!(calls[0].from_node, "/p/src/app.ts:function:handler");
        assert_eq!(calls[0].to_node, "/p/src/app.ts:function:validate");
        assert_eq!(calls[0].resolution, Resolution::Resolved);
        assert_eq!(calls[0].metadata.line, Some(2));

        assert_eq!(calls[1].to_node, "/p/src/app.ts:function:check");
        assert_eq!(calls[1].resolution, Resolution::Speculative);
    }

    #[test]
    fn test_relative_import_edge() {
        let graph = Fixture::new().extract(
            "/p/src/app.ts",
            "import { helper } from './utils';\n\nexport const run = () => helper();\n",
            512,
        );

        let imports: Vec<&Edge> = graph.edges_of_type(EdgeType::Imports).collect();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].from_node, "/p/src/app.ts:module");
        assert_eq!(imports[0].to_node, "/p/src/utils.ts:module");
        assert_eq!(imports[0].resolution, Resolution::Speculative);
        assert_eq!(imports[0].metadata.imported_symbols, vec!["helper"]);
    }

    #[test]
    fn test_heritage_edges() {
        let source = "interface Store {\n  save(): void;\n}\n\nclass Base {}\n\nexport class Repo extends Base implements Store, Closeable {\n  save() {}\n}\n";
        let graph = Fixture::new().extract("/p/src/repo.ts", source, 512);

        let extends: Vec<&Edge> = graph.edges_of_type(EdgeType::Extends).collect();
        assert_eq!(extends.len(), 1);
        assert_eq!(extends[0].to_node, "/p/src/repo.ts:class:Base");
        assert_eq!(extends[0].resolution, Resolution::Resolved);

        let implements: Vec<(&str, Resolution)> = graph
            .edges_of_type(EdgeType::Implements)
            .map(|e| (e.to_node.as_str(), e.resolution))
            .collect();
        assert_eq!(
            implements,
            vec![
                ("/p/src/repo.ts:interface:Store", Resolution::Resolved),
                ("/p/src/repo.ts:interface:Closeable", Resolution::Speculative),
            ]
        );
        assert_eq!(
            graph.node("/p/src/repo.ts:interface:Store").map(|n| n.node_type),
            Some(NodeType::Interface)
        );
    }

    #[test]
    fn test_partials_merge_into_one_node() {
        let mut source = String::from("def big(items):\n");
        for i in 0..30 {
            source.push_str(&format!("    total_{} = compute(items, {})\n", i, i));
        }
        source.push_str("    return total_0\n");

        let graph = Fixture::new().extract("/p/jobs.py", &source, 40);
        let functions: Vec<&Node> = graph
            .nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Function)
            .collect();

        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].start_line, 1);
        assert_eq!(functions[0].end_line, 32);
        assert_eq!(graph.chunks["/p/jobs.py:function:big"].source(), source.trim_end());

        let calls: Vec<&Edge> = graph.edges_of_type(EdgeType::Calls).collect();
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_import_lines_survive_gaps() {
        let source = "import a from 'alpha';\n\n// http\nimport b from 'beta';\n\nexport function f() {\n  return a(b);\n}\n";
        let graph = Fixture::new().extract("/p/src/app.ts", source, 512);

        let line_of = |target: &str| {
            graph
                .edges_of_type(EdgeType::DependsOn)
                .find(|e| e.to_node == target)
                .and_then(|e| e.metadata.line)
        };
        assert_eq!(line_of("pkg:alpha"), Some(1));
        assert_eq!(line_of("pkg:beta"), Some(4));
    }

    #[test]
    fn test_same_id_declarations_keep_first_range() {
        let source = "pub struct Foo {\n    a: u32,\n}\n\nfn between() -> u32 {\n    7\n}\n\nimpl Foo {\n    fn get(&self) -> u32 {\n        between()\n    }\n}\n";
        let graph = Fixture::new().extract("/p/src/foo.rs", source, 512);

        let foo = graph.node("/p/src/foo.rs:class:Foo").unwrap();
        assert_eq!((foo.start_line, foo.end_line), (1, 3));
        assert!(graph.chunks["/p/src/foo.rs:class:Foo"].source().starts_with("pub struct Foo"));

        // calls inside the impl still belong to Foo
        assert!(graph
            .edges_of_type(EdgeType::Calls)
            .any(|e| e.from_node == foo.id && e.to_node == "/p/src/foo.rs:function:between"));
    }

    #[test]
    fn test_split_methods_named_with_parent() {
        let mut source = String::from("class Service:\n");
        for i in 0..5 {
            source.push_str(&format!(
                "    def handle_{}(self, request):\n        return self.process(request, {})\n\n",
                i, i
            ));
        }
        let graph = Fixture::new().extract("/p/service.py", &source, 30);

        let method = graph.node("/p/service.py:function:Service.handle_0").unwrap();
        assert_eq!(method.metadata.parent.as_deref(), Some("Service"));
        assert!(graph.node("/p/service.py:class:Service").is_none());
    }

    #[test]
    fn test_ids_stable_across_budgets() {
        let source = "fn alpha() -> u32 {\n    beta() + 1\n}\n\nfn beta() -> u32 {\n    41\n}\n";
        let fixture = Fixture::new();
        let small = fixture.extract("/p/src/lib.rs", source, 8);
        let large = fixture.extract("/p/src/lib.rs", source, 512);

        let ids = |g: &FileGraph| {
            let mut ids: Vec<String> = g.nodes.iter().map(|n| n.id.clone()).collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&small), ids(&large));
    }

    #[test]
    fn test_extract_single_chunk() {
        let pool = Arc::new(ParserPool::new());
        let chunker = Chunker::new(Arc::clone(&pool), Arc::new(LexicalTokenCounter));
        let chunks = chunker
            .chunk_file(
                "pub async fn fetch() {\n    client.get();\n}\n",
                &SourceLanguage::Grammar(Language::Rust),
                &ChunkOptions::default(),
            )
            .unwrap();

        let (node, edges) = GraphExtractor::new(pool)
            .extract_chunk("/p/src/net.rs", &chunks[0])
            .unwrap()
            .unwrap();
        assert_eq!(node.id, "/p/src/net.rs:function:fetch");
        assert!(node.metadata.is_async);
        assert!(node.metadata.is_exported);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].to_node, "/p/src/net.rs:function:get");
    }

    #[test]
    fn test_text_language_yields_module_only() {
        let pool = Arc::new(ParserPool::new());
        let chunker = Chunker::new(Arc::clone(&pool), Arc::new(LexicalTokenCounter));
        let language = SourceLanguage::Text("text".to_string());
        let chunks = chunker
            .chunk_file("hello\nworld\n", &language, &ChunkOptions::default())
            .unwrap();
        let known = HashSet::new();
        let aliases = BTreeMap::new();
        let ctx = ExtractContext {
            file_path: "/p/notes.txt",
            project_root: None,
            known_files: &known,
            path_aliases: &aliases,
        };

        let graph = GraphExtractor::new(pool)
            .extract_file(&ctx, "hello\nworld\n", &language, &chunks)
            .unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());
    }
}
