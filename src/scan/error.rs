//! Per-file scan failures

use serde::{Deserialize, Serialize};

/// Why one file could not be indexed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("Unsupported language: {0}")]
    Unsupported(String),

    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Storage error for {path}: {message}")]
    Storage { path: String, message: String },
}

impl ScanError {
    pub(crate) fn parse(path: &str, err: anyhow::Error) -> Self {
        Self::Parse {
            path: path.to_string(),
            message: format!("{:#}", err),
        }
    }

    pub(crate) fn storage(path: &str, err: anyhow::Error) -> Self {
        Self::Storage {
            path: path.to_string(),
            message: format!("{:#}", err),
        }
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            ScanError::Unsupported(_) => FailureCategory::Unsupported,
            ScanError::Parse { .. } => FailureCategory::Parse,
            ScanError::Storage { .. } => FailureCategory::Storage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCategory {
    Unsupported,
    Parse,
    Storage,
}

/// A file the scan gave up on; its hash was left untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub path: String,
    pub category: FailureCategory,
    pub message: String,
}

impl ScanFailure {
    pub fn new(path: &str, error: &ScanError) -> Self {
        Self {
            path: path.to_string(),
            category: error.category(),
            message: error.to_string(),
        }
    }
}
