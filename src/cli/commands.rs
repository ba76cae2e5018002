//! Command implementations

use super::{ConfigArgs, OutputFormat, ScanArgs};
use crate::extract::ParserPool;
use crate::graph::{Edge, Node};
use crate::llm::{LlmClient, LlmSummarizer};
use crate::repo::{ProjectConfig, Project};
use crate::scan::{IncrementalScanResult, IncrementalScanner, RepairReport};
use crate::semantic::provider_from_config;
use crate::storage::{Database, DatabaseStats, GraphStore, HashStore, ScanRun, VectorMatch, VectorStore};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Open an initialized project and its database
pub fn open_project(path: &Path) -> Result<(Project, Arc<Database>)> {
    let project = Project::open(path)?;
    if !project.is_initialized() {
        anyhow::bail!("codeatlas not initialized. Run 'codeatlas init' first.");
    }

    let db = Database::open(project.database_path())?;
    Ok((project, Arc::new(db)))
}

/// Build a scanner wired to the project's configuration
pub fn build_scanner(
    project: &Project,
    db: Arc<Database>,
    args: &ScanArgs,
) -> IncrementalScanner {
    let config = project.config();
    let mut options = project.scan_options();
    options.summarize |= args.summarize;

    let summarize = options.summarize;
    let mut scanner = IncrementalScanner::new(Arc::new(ParserPool::new()), db.clone(), options);

    if !args.no_embeddings {
        if let Some(embedder) = provider_from_config(&config.embedding) {
            scanner = scanner.with_vector_index(db, embedder);
        }
    }

    if summarize {
        let client = LlmClient::new(&config.llm);
        scanner = scanner.with_summarizer(Arc::new(LlmSummarizer::new(client)));
    }

    scanner
}

/// Initialize codeatlas in a project
pub fn init(path: &Path, force: bool) -> Result<Project> {
    let existing = Project::open(path)?;
    if existing.is_initialized() && existing.root() == path.canonicalize()?.as_path() && !force {
        anyhow::bail!("codeatlas already initialized. Use --force to re-initialize.");
    }

    let project = Project::init(path)?;
    if force {
        ProjectConfig::default().save(&project.config_path())?;
    }

    let _db = Database::open(project.database_path())?;

    println!("✓ Initialized codeatlas in {:?}", project.root());
    println!("  Database: {:?}", project.database_path());
    println!("  Config: {:?}", project.config_path());

    Ok(project)
}

/// Scan the project and record the run
pub async fn scan(path: &Path, args: &ScanArgs) -> Result<IncrementalScanResult> {
    let (project, db) = open_project(path)?;

    if args.full {
        // An empty stored hash never matches, so every tracked file is replaced
        for tracked in db.load_hashes().await?.keys() {
            db.save_hash(tracked, "").await?;
        }
    }

    let files = project.discover_files()?;
    tracing::info!("Scanning {} files in {:?}", files.len(), project.root());

    let scanner = build_scanner(&project, db.clone(), args);
    let result = scanner.scan_incremental(&files).await?;

    db.record_scan_run("scan", &result.stats, result.failures.len())
        .context("Failed to record scan")?;

    Ok(result)
}

/// Finish interrupted replaces
pub async fn repair(path: &Path) -> Result<RepairReport> {
    let (project, db) = open_project(path)?;
    let files = project.discover_files()?;

    let scanner = build_scanner(&project, db.clone(), &ScanArgs::default());
    let report = scanner.repair(&files).await?;

    db.record_scan_run("repair", &report.stats, report.failures.len())?;
    Ok(report)
}

/// Index statistics
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub root: String,
    pub stats: DatabaseStats,
    pub last_scan: Option<ScanRun>,
}

pub fn status(path: &Path) -> Result<StatusReport> {
    let (project, db) = open_project(path)?;

    Ok(StatusReport {
        root: project.root().display().to_string(),
        stats: db.get_stats()?,
        last_scan: db.last_scan_run()?,
    })
}

/// Nodes and edges for a file or symbol
#[derive(Debug, Serialize)]
pub struct Analysis {
    pub target: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

pub async fn analyze(path: &Path, target: &str, limit: usize) -> Result<Analysis> {
    let (project, db) = open_project(path)?;

    let candidate = project.root().join(target);
    let nodes = match candidate.canonicalize() {
        Ok(file) if file.is_file() => {
            let file = file.display().to_string();
            db.get_nodes_by_path(&file).await?
        }
        _ => db.find_nodes(target, limit)?,
    };

    let mut edges: Vec<Edge> = Vec::new();
    for node in &nodes {
        for edge in db.get_edges_by_node(&node.id).await? {
            if !edges.iter().any(|e| e.id == edge.id) {
                edges.push(edge);
            }
        }
    }

    Ok(Analysis {
        target: target.to_string(),
        nodes,
        edges,
    })
}

/// Semantic search over stored vectors
pub async fn search(path: &Path, query: &str, limit: usize) -> Result<Vec<VectorMatch>> {
    let (project, db) = open_project(path)?;

    let embedder = provider_from_config(&project.config().embedding).ok_or_else(|| {
        anyhow::anyhow!("No embedding provider configured. Set embedding.provider first.")
    })?;

    let vector = embedder.embed(query).await?;
    db.search(&vector, limit).await
}

/// Show or modify configuration
pub fn config(path: &Path, args: &ConfigArgs) -> Result<()> {
    let mut project = Project::open(path)?;
    let config_path = project.config_path();

    if args.reset {
        ProjectConfig::default().save(&config_path)?;
        println!("✓ Configuration reset to defaults");
        return Ok(());
    }

    if let Some(ref assignment) = args.set {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected key=value, got '{}'", assignment))?;
        let updated = set_config_value(project.config(), key.trim(), value.trim())?;
        updated.save(&config_path)?;
        *project.config_mut() = updated;
        println!("✓ Set {} = {}", key.trim(), value.trim());
        return Ok(());
    }

    if let Some(ref key) = args.get {
        let value = get_config_value(project.config(), key)?;
        println!("{}", value);
        return Ok(());
    }

    println!("codeatlas Configuration");
    println!("=======================\n");
    println!("{}", toml::to_string_pretty(project.config())?);
    Ok(())
}

/// Read a dotted key such as `scan.max_tokens`
pub fn get_config_value(config: &ProjectConfig, key: &str) -> Result<String> {
    let root = toml::Value::try_from(config)?;
    let mut value = &root;
    for part in key.split('.') {
        value = value
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Unknown configuration key: {}", key))?;
    }

    Ok(match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Return a copy of `config` with the dotted key set to `raw`
pub fn set_config_value(config: &ProjectConfig, key: &str, raw: &str) -> Result<ProjectConfig> {
    let mut root = toml::Value::try_from(config)?;
    let parts: Vec<&str> = key.split('.').collect();
    let (last, parents) = parts
        .split_last()
        .ok_or_else(|| anyhow::anyhow!("Empty configuration key"))?;

    let mut table = root
        .as_table_mut()
        .ok_or_else(|| anyhow::anyhow!("Configuration is not a table"))?;
    for part in parents {
        table = table
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("{} is not a table", part))?;
    }

    let value = toml::from_str::<toml::Table>(&format!("v = {}", raw))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()));
    table.insert(last.to_string(), value);

    root.try_into()
        .with_context(|| format!("Invalid value for {}: {}", key, raw))
}

/// Print anything serializable as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_scan(result: &IncrementalScanResult, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(result);
    }

    let stats = &result.stats;
    if result.changes.is_empty() && result.failures.is_empty() {
        println!("✓ Index is up to date");
        return Ok(());
    }

    println!("\n✓ Scan complete");
    println!("  Files changed: {}", result.changes.len());
    println!(
        "  Nodes: +{} ~{} -{}",
        stats.nodes_added, stats.nodes_updated, stats.nodes_deleted
    );
    println!("  Edges: +{} -{}", stats.edges_added, stats.edges_deleted);
    println!(
        "  Vectors: {} written, {} deleted",
        stats.documents_updated, stats.vectors_deleted
    );
    if stats.summaries_generated > 0 {
        println!("  Summaries: {}", stats.summaries_generated);
    }
    if stats.files_skipped > 0 {
        println!("  Skipped (unsupported): {}", stats.files_skipped);
    }

    if !result.failures.is_empty() {
        println!("\n⚠ {} file(s) failed:", result.failures.len());
        for failure in &result.failures {
            println!("  {}: {}", failure.path, failure.message);
        }
    }

    Ok(())
}

pub fn print_repair(report: &RepairReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    if report.repaired.is_empty() && report.removed.is_empty() && report.failures.is_empty() {
        println!("✓ Nothing to repair");
        return Ok(());
    }

    for path in &report.repaired {
        println!("✓ Rewrote {}", path);
    }
    for path in &report.removed {
        println!("✓ Removed {}", path);
    }
    for failure in &report.failures {
        println!("⚠ {}: {}", failure.path, failure.message);
    }
    Ok(())
}

pub fn print_status(report: &StatusReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    let graph = &report.stats.graph;
    println!("codeatlas Status");
    println!("================\n");
    println!("Project: {}", report.root);
    println!("Files indexed: {}", graph.files);
    println!("Nodes: {}", graph.nodes);
    println!(
        "Edges: {} ({} speculative)",
        graph.edges, graph.speculative_edges
    );
    println!("Packages: {}", graph.packages);
    println!("Vectors: {}", report.stats.vectors);
    println!("Tracked hashes: {}", report.stats.tracked_files);

    if report.stats.pending_replaces > 0 {
        println!(
            "\n⚠ {} interrupted replace(s). Run 'codeatlas repair'.",
            report.stats.pending_replaces
        );
    }

    match &report.last_scan {
        Some(run) => println!(
            "\nLast {}: {} ({} failures)",
            run.kind,
            run.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.failures
        ),
        None => println!("\nNo scans yet."),
    }

    Ok(())
}

pub fn print_analysis(analysis: &Analysis, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(analysis);
    }

    if analysis.nodes.is_empty() {
        println!("No nodes found for '{}'", analysis.target);
        return Ok(());
    }

    for node in &analysis.nodes {
        println!(
            "{} {} ({}:{}-{})",
            node.node_type, node.name, node.file_path, node.start_line, node.end_line
        );
        if let Some(ref signature) = node.signature {
            println!("    {}", signature);
        }
        if let Some(ref summary) = node.summary {
            println!("    {}", summary);
        }
    }

    if !analysis.edges.is_empty() {
        println!("\nEdges:");
        for edge in &analysis.edges {
            println!(
                "  {} -[{}, {}]-> {}",
                edge.from_node,
                edge.edge_type,
                edge.resolution.as_str(),
                edge.to_node
            );
        }
    }

    Ok(())
}

pub fn print_matches(matches: &[VectorMatch], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(&matches);
    }

    if matches.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    for hit in matches {
        let name = hit.payload["name"].as_str().unwrap_or(&hit.id);
        let file = hit.payload["file_path"].as_str().unwrap_or("");
        let line = hit.payload["start_line"].as_u64().unwrap_or(0);
        println!("{:.3}  {}  {}:{}", hit.score, name, file, line);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_get_and_set() {
        let config = ProjectConfig::default();
        assert_eq!(get_config_value(&config, "scan.max_tokens").unwrap(), "512");
        assert_eq!(get_config_value(&config, "llm.model").unwrap(), "llama3");
        assert!(get_config_value(&config, "scan.nope").is_err());

        let updated = set_config_value(&config, "scan.max_tokens", "128").unwrap();
        assert_eq!(updated.scan.max_tokens, 128);

        let updated = set_config_value(&updated, "embedding.provider", "mock").unwrap();
        assert_eq!(
            updated.embedding.provider,
            crate::repo::EmbeddingProviderKind::Mock
        );

        assert!(set_config_value(&config, "scan.max_tokens", "lots").is_err());
    }

    #[tokio::test]
    async fn test_scan_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan(dir.path(), &ScanArgs::default()).await.unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }

    #[tokio::test]
    async fn test_init_scan_status() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/lib.rs"),
            "use serde::Serialize;\n\npub fn run() -> u32 {\n    helper()\n}\n\nfn helper() -> u32 {\n    1\n}\n",
        )
        .unwrap();

        init(dir.path(), false).unwrap();
        assert!(init(dir.path(), false).is_err());

        let result = scan(dir.path(), &ScanArgs::default()).await.unwrap();
        assert!(result.is_clean());
        assert_eq!(result.changes.len(), 1);

        let report = status(dir.path()).unwrap();
        assert_eq!(report.stats.graph.files, 1);
        assert_eq!(report.stats.graph.packages, 1);
        assert_eq!(report.last_scan.unwrap().kind, "scan");

        let again = scan(dir.path(), &ScanArgs::default()).await.unwrap();
        assert!(again.changes.is_empty());

        let full = scan(
            dir.path(),
            &ScanArgs {
                full: true,
                ..ScanArgs::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(full.changes.len(), 1);
        assert_eq!(full.stats.nodes_deleted, 3);

        let analysis = analyze(dir.path(), "run", 10).await.unwrap();
        assert_eq!(analysis.nodes.len(), 1);
        assert!(analysis.edges.iter().any(|e| e.to_node.ends_with(":function:helper")));
    }
}
