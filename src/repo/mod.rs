//! Project discovery and change detection
//!
//! This module handles:
//! - Locating the project root and its `.codeatlas` state directory
//! - Loading configuration
//! - Walking the source tree into [`SourceFile`]s
//! - Classifying files as added, modified or deleted

mod change;
mod config;

pub use change::{ChangeDetector, ChangeKind, FileChange};
pub use config::{
    EmbeddingConfig, EmbeddingProviderKind, LlmConfig, ProjectConfig, ScanOptions, WatchConfig,
};

use crate::extract::SourceLanguage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the state directory at the project root
pub const STATE_DIR: &str = ".codeatlas";

/// A file handed to the scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// A source tree being indexed
pub struct Project {
    root: PathBuf,
    config: ProjectConfig,
}

impl Project {
    /// Open the project containing `path`.
    ///
    /// Walks up to the nearest directory holding `.codeatlas`; without one,
    /// `path` itself is the root.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let start = path
            .as_ref()
            .canonicalize()
            .with_context(|| format!("Failed to resolve project path {:?}", path.as_ref()))?;

        let root = start
            .ancestors()
            .find(|dir| dir.join(STATE_DIR).is_dir())
            .unwrap_or(&start)
            .to_path_buf();

        let config = ProjectConfig::load_or_default(&root.join(STATE_DIR).join("config.toml"))?;

        Ok(Self { root, config })
    }

    /// Create the state directory and a default configuration
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path
            .as_ref()
            .canonicalize()
            .with_context(|| format!("Failed to resolve project path {:?}", path.as_ref()))?;

        let state_dir = root.join(STATE_DIR);
        std::fs::create_dir_all(&state_dir)
            .with_context(|| format!("Failed to create {:?}", state_dir))?;

        let config_path = state_dir.join("config.toml");
        let config = ProjectConfig::load_or_default(&config_path)?;
        if !config_path.exists() {
            config.save(&config_path)?;
        }

        Ok(Self { root, config })
    }

    /// Get the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn is_initialized(&self) -> bool {
        self.state_dir().is_dir()
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir().join("config.toml")
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir().join("atlas.db")
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ProjectConfig {
        &mut self.config
    }

    /// Scan options with the project root filled in
    pub fn scan_options(&self) -> ScanOptions {
        let mut options = self.config.scan.clone();
        options.project_root = Some(self.root.clone());
        options
    }

    /// Whether `path` (absolute) belongs in the index, given the compiled ignore set
    pub fn accepts(&self, path: &Path, ignore: &globset::GlobSet) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        {
            return false;
        }
        if ignore.is_match(relative) {
            return false;
        }
        path.to_str()
            .and_then(|p| SourceLanguage::for_path(p, &self.config.scan.extension_overrides))
            .is_some()
    }

    /// Read every indexable file under the root, sorted by path
    pub fn discover_files(&self) -> Result<Vec<SourceFile>> {
        let ignore = self.config.ignore_set()?;
        let mut files = Vec::new();

        let walker = walkdir::WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 {
                    return true;
                }
                let name = e.file_name().to_str().unwrap_or("");
                !name.starts_with('.') && name != "target" && name != "node_modules"
            });

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() || !self.accepts(entry.path(), &ignore) {
                continue;
            }

            let Some(path) = entry.path().to_str() else {
                tracing::warn!("Skipping non UTF-8 path {:?}", entry.path());
                continue;
            };

            match std::fs::read_to_string(entry.path()) {
                Ok(content) => files.push(SourceFile::new(path, content)),
                Err(e) => tracing::warn!("Skipping unreadable file {}: {}", path, e),
            }
        }

        tracing::debug!("Discovered {} source files under {:?}", files.len(), self.root);
        Ok(files)
    }
}
