//! Content-hash change detection

use super::SourceFile;
use crate::extract::content_hash;
use crate::storage::HashStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Type of change made to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// One changed file of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
    pub old_hash: Option<String>,
    pub new_hash: Option<String>,
}

/// Classifies files against the persisted path to hash table
pub struct ChangeDetector {
    hashes: Arc<dyn HashStore>,
}

impl ChangeDetector {
    pub fn new(hashes: Arc<dyn HashStore>) -> Self {
        Self { hashes }
    }

    /// Compare `files` with the stored hashes.
    ///
    /// Added and modified entries keep input order; deleted entries follow,
    /// sorted by path. Unchanged files produce nothing.
    pub async fn detect_changes(&self, files: &[SourceFile]) -> Result<Vec<FileChange>> {
        let stored = self.hashes.load_hashes().await?;
        let mut seen = HashSet::new();
        let mut changes = Vec::new();

        for file in files {
            if !seen.insert(file.path.as_str()) {
                continue;
            }

            let new_hash = content_hash(&file.content);
            match stored.get(&file.path) {
                None => changes.push(FileChange {
                    path: file.path.clone(),
                    kind: ChangeKind::Added,
                    old_hash: None,
                    new_hash: Some(new_hash),
                }),
                Some(old) if *old != new_hash => changes.push(FileChange {
                    path: file.path.clone(),
                    kind: ChangeKind::Modified,
                    old_hash: Some(old.clone()),
                    new_hash: Some(new_hash),
                }),
                Some(_) => {}
            }
        }

        let mut deleted: Vec<FileChange> = stored
            .iter()
            .filter(|(path, _)| !seen.contains(path.as_str()))
            .map(|(path, hash)| FileChange {
                path: path.clone(),
                kind: ChangeKind::Deleted,
                old_hash: Some(hash.clone()),
                new_hash: None,
            })
            .collect();
        deleted.sort_by(|a, b| a.path.cmp(&b.path));
        changes.extend(deleted);

        Ok(changes)
    }

    /// Persist the outcome of one change
    pub async fn update_hash(&self, change: &FileChange) -> Result<()> {
        match (&change.kind, &change.new_hash) {
            (ChangeKind::Deleted, _) | (_, None) => self.hashes.remove_hash(&change.path).await,
            (_, Some(hash)) => self.hashes.save_hash(&change.path, hash).await,
        }
    }

    pub async fn update_hashes(&self, changes: &[FileChange]) -> Result<()> {
        for change in changes {
            self.update_hash(change).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile::new(path, content)
    }

    #[tokio::test]
    async fn test_classification() {
        let store = Arc::new(MemoryStore::new());
        let detector = ChangeDetector::new(store.clone());

        let first = vec![file("/p/b.ts", "b"), file("/p/a.ts", "a"), file("/p/z.ts", "z")];
        let changes = detector.detect_changes(&first).await.unwrap();
        assert_eq!(changes.len(), 3);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Added));
        assert_eq!(changes[0].path, "/p/b.ts");
        detector.update_hashes(&changes).await.unwrap();

        let second = vec![file("/p/a.ts", "a2"), file("/p/b.ts", "b")];
        let changes = detector.detect_changes(&second).await.unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].path, "/p/a.ts");
        assert_eq!(changes[0].old_hash.as_deref(), Some(content_hash("a").as_str()));
        assert_eq!(changes[1].kind, ChangeKind::Deleted);
        assert_eq!(changes[1].path, "/p/z.ts");
        assert!(changes[1].new_hash.is_none());

        detector.update_hashes(&changes).await.unwrap();
        let hashes = store.load_hashes().await.unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(!hashes.contains_key("/p/z.ts"));
    }

    #[tokio::test]
    async fn test_unchanged_rescan_is_empty() {
        let detector = ChangeDetector::new(Arc::new(MemoryStore::new()));
        let files = vec![file("/p/a.py", "x = 1\n")];

        let changes = detector.detect_changes(&files).await.unwrap();
        detector.update_hashes(&changes).await.unwrap();
        assert!(detector.detect_changes(&files).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_sorted() {
        let store = Arc::new(MemoryStore::new());
        store.save_hash("/p/c.go", "1").await.unwrap();
        store.save_hash("/p/a.go", "2").await.unwrap();
        let detector = ChangeDetector::new(store);

        let changes = detector.detect_changes(&[]).await.unwrap();
        let paths: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["/p/a.go", "/p/c.go"]);
    }
}
