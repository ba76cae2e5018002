//! Project configuration for codeatlas

use crate::extract::ChunkOptions;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Configuration stored at `.codeatlas/config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Glob patterns (relative to the project root) excluded from discovery
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    #[serde(default)]
    pub scan: ScanOptions,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

/// Per-scan parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Token budget per chunk
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Prepend a file's imports to every chunk instead of emitting an imports chunk
    #[serde(default)]
    pub inline_imports: bool,

    /// Characters of source included in a node's embedding text
    #[serde(default = "default_embedding_source_chars")]
    pub embedding_source_chars: usize,

    /// Set at runtime from the discovered project
    #[serde(skip)]
    pub project_root: Option<PathBuf>,

    /// Request summaries for function, class and interface nodes
    #[serde(default)]
    pub summarize: bool,

    /// Extension (without dot) to language name; unknown names chunk as plain lines
    #[serde(default)]
    pub extension_overrides: HashMap<String, String>,

    /// Import prefix to project-relative directory
    #[serde(default = "default_path_aliases")]
    pub path_aliases: BTreeMap<String, String>,
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    #[default]
    None,
    Ollama,
    Openai,
    Mock,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

/// LLM configuration for summaries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API endpoint URL; Ollama when it targets port 11434
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Maximum tokens for response
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

/// File watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period before a burst of events triggers a scan
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        "target/**".to_string(),
        "node_modules/**".to_string(),
        "dist/**".to_string(),
        "build/**".to_string(),
        "vendor/**".to_string(),
        "**/__pycache__/**".to_string(),
        "**/*.min.js".to_string(),
        "**/*.d.ts".to_string(),
    ]
}

fn default_max_tokens() -> usize {
    512
}

fn default_batch_size() -> usize {
    32
}

fn default_embedding_source_chars() -> usize {
    1000
}

fn default_path_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("@/".to_string(), "src/".to_string()),
        ("~/".to_string(), "src/".to_string()),
    ])
}

fn default_embedding_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_dimension() -> usize {
    768
}

fn default_max_retries() -> usize {
    3
}

fn default_llm_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3".to_string()
}

fn default_llm_max_tokens() -> usize {
    256
}

fn default_temperature() -> f32 {
    0.2
}

fn default_debounce_ms() -> u64 {
    400
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            ignore_patterns: default_ignore_patterns(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            batch_size: default_batch_size(),
            extension_overrides: HashMap::new(),
            inline_imports: false,
            embedding_source_chars: default_embedding_source_chars(),
            path_aliases: default_path_aliases(),
            project_root: None,
            summarize: false,
        }
    }
}

impl ScanOptions {
    pub fn chunk_options(&self) -> ChunkOptions {
        ChunkOptions {
            max_tokens: self.max_tokens.max(1),
            inline_imports: self.inline_imports,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::None,
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            api_key_env: None,
            max_retries: default_max_retries(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key_env: None,
            max_tokens: default_llm_max_tokens(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl ProjectConfig {
    /// Load configuration from `config_path` or return defaults
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: ProjectConfig = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `config_path`
    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Compile the ignore patterns
    pub fn ignore_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore_patterns {
            builder.add(
                Glob::new(pattern)
                    .with_context(|| format!("Invalid ignore pattern: {}", pattern))?,
            );
        }
        builder.build().context("Failed to build ignore set")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProjectConfig::default();
        assert_eq!(config.scan.max_tokens, 512);
        assert_eq!(config.watch.debounce_ms, 400);
        assert_eq!(config.scan.path_aliases["@/"], "src/");
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::None);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ProjectConfig = toml::from_str(
            r#"
            [scan]
            max_tokens = 128
            inline_imports = true

            [scan.extension_overrides]
            txt = "text"

            [embedding]
            provider = "mock"
            "#,
        )
        .unwrap();

        assert_eq!(config.scan.max_tokens, 128);
        assert!(config.scan.inline_imports);
        assert_eq!(config.scan.batch_size, 32);
        assert_eq!(config.scan.extension_overrides["txt"], "text");
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Mock);
        assert_eq!(config.embedding.dimension, 768);
        assert!(!config.ignore_patterns.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".codeatlas").join("config.toml");

        let mut config = ProjectConfig::default();
        config.scan.batch_size = 8;
        config.save(&path).unwrap();

        let loaded = ProjectConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.scan.batch_size, 8);
    }

    #[test]
    fn test_ignore_set() {
        let config = ProjectConfig::default();
        let set = config.ignore_set().unwrap();
        assert!(set.is_match("node_modules/react/index.js"));
        assert!(set.is_match("web/app.min.js"));
        assert!(!set.is_match("src/app.ts"));
    }
}
