//! CLI interface using clap

mod commands;
mod watch;

pub use commands::*;
pub use watch::watch;

use clap::{Parser, Subcommand};

/// codeatlas - structural and semantic index of a source tree
#[derive(Parser, Debug)]
#[command(name = "codeatlas")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the project (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub path: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(short = 'o', long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the .codeatlas directory and default configuration
    Init(InitArgs),

    /// Index files that changed since the last scan
    Scan(ScanArgs),

    /// Show index statistics
    Status,

    /// Watch the project and rescan on change
    Watch(WatchArgs),

    /// Finish replaces interrupted by a crash or storage failure
    Repair,

    /// Show the nodes and edges of a file or symbol
    Analyze(AnalyzeArgs),

    /// Semantic search over indexed declarations
    Search(SearchArgs),

    /// Show or change configuration
    Config(ConfigArgs),
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration with defaults
    #[arg(short, long)]
    pub force: bool,

    /// Skip initial scan
    #[arg(long)]
    pub no_scan: bool,
}

/// Arguments for scan command
#[derive(Parser, Debug, Default, Clone)]
pub struct ScanArgs {
    /// Reindex every file, not just changed ones
    #[arg(short, long)]
    pub full: bool,

    /// Skip embedding generation
    #[arg(long)]
    pub no_embeddings: bool,

    /// Generate summaries with the configured LLM
    #[arg(long)]
    pub summarize: bool,
}

/// Arguments for watch command
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Debounce interval in milliseconds (overrides watch.debounce_ms)
    #[arg(short, long)]
    pub debounce: Option<u64>,

    /// Skip embedding generation
    #[arg(long)]
    pub no_embeddings: bool,
}

/// Arguments for analyze command
#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// File path or symbol name
    pub target: String,

    /// Maximum symbols listed for a name search
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

/// Arguments for search command
#[derive(Parser, Debug)]
pub struct SearchArgs {
    /// Natural language or code query
    pub query: String,

    /// Number of results
    #[arg(short = 'k', long, default_value = "10")]
    pub limit: usize,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Show current configuration
    #[arg(long)]
    pub show: bool,

    /// Set a configuration value (key=value, e.g. scan.max_tokens=256)
    #[arg(long)]
    pub set: Option<String>,

    /// Get a configuration value
    #[arg(long)]
    pub get: Option<String>,

    /// Reset to defaults
    #[arg(long)]
    pub reset: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
