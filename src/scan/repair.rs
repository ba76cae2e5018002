//! Recovery of interrupted replaces
//!
//! A Modified file is deleted and rewritten without a transaction spanning
//! both stores. The replace journal records each replace before the delete;
//! any marker still present afterwards means the file may be half written.

use super::{IncrementalScanner, ScanError, ScanFailure, ScanStats};
use crate::extract::{content_hash, SourceLanguage};
use crate::repo::{ChangeKind, FileChange, SourceFile};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Outcome of [`IncrementalScanner::repair`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairReport {
    /// Files rewritten from their current content
    pub repaired: Vec<String>,
    /// Files no longer present whose records were dropped
    pub removed: Vec<String>,
    pub stats: ScanStats,
    pub failures: Vec<ScanFailure>,
}

impl IncrementalScanner {
    /// Finish every replace the journal still lists
    pub async fn repair(&self, files: &[SourceFile]) -> Result<RepairReport> {
        let markers = self.journal.pending_replaces().await?;
        let mut report = RepairReport::default();
        if markers.is_empty() {
            return Ok(report);
        }

        tracing::info!("Repairing {} interrupted replaces", markers.len());
        let inputs = self.classify_inputs(files);

        for marker in markers {
            let path = marker.file_path.as_str();
            report.stats.files_scanned += 1;

            let outcome = match inputs.get(path) {
                Some((file, language)) => self
                    .rewrite(file, language, &inputs.known, &mut report.stats)
                    .await
                    .map(|()| report.repaired.push(path.to_string())),
                None => self
                    .drop_missing(path, &mut report.stats)
                    .await
                    .map_err(|e| ScanError::storage(path, e))
                    .map(|()| report.removed.push(path.to_string())),
            };

            if let Err(err) = outcome {
                tracing::warn!("Failed to repair {}: {}", path, err);
                report.stats.files_failed += 1;
                report.failures.push(ScanFailure::new(path, &err));
            }
        }

        if !report.repaired.is_empty() || !report.removed.is_empty() {
            if let Err(e) = self.prune_packages(&mut report.stats).await {
                tracing::warn!("Failed to prune unused packages: {}", e);
            }
        }

        Ok(report)
    }

    async fn rewrite(
        &self,
        file: &SourceFile,
        language: &SourceLanguage,
        known: &HashSet<String>,
        stats: &mut ScanStats,
    ) -> Result<(), ScanError> {
        let graph = self.prepare(file, language, known, stats).await?;
        self.replace(&file.path, &graph, stats).await?;
        self.detector
            .update_hash(&FileChange {
                path: file.path.clone(),
                kind: ChangeKind::Modified,
                old_hash: None,
                new_hash: Some(content_hash(&file.content)),
            })
            .await
            .map_err(|e| ScanError::storage(&file.path, e))
    }

    async fn drop_missing(&self, path: &str, stats: &mut ScanStats) -> Result<()> {
        self.delete_file_data(path, stats).await?;
        self.detector
            .update_hash(&FileChange {
                path: path.to_string(),
                kind: ChangeKind::Deleted,
                old_hash: None,
                new_hash: None,
            })
            .await?;
        self.journal.complete_replace(path).await
    }
}
