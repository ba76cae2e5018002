//! Watch mode
//!
//! Filesystem events are coalesced: after the first relevant event the
//! watcher waits until no further event arrives for the debounce window,
//! then runs one incremental scan. Scans never overlap.

use super::commands::{open_project, print_scan};
use super::{OutputFormat, ScanArgs};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Rescan `path` whenever indexable files change
pub async fn watch(
    path: &Path,
    debounce_override: Option<u64>,
    no_embeddings: bool,
    format: OutputFormat,
) -> Result<()> {
    let (project, db) = open_project(path)?;
    let debounce = Duration::from_millis(
        debounce_override.unwrap_or(project.config().watch.debounce_ms),
    );
    let ignore = project.config().ignore_set()?;
    let args = ScanArgs {
        no_embeddings,
        ..ScanArgs::default()
    };
    let scanner = super::commands::build_scanner(&project, db.clone(), &args);

    let (tx, mut rx) = mpsc::unbounded_channel::<PathBuf>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_content_change(&event.kind) => {
            for changed in event.paths {
                let _ = tx.send(changed);
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Watch error: {}", e),
    })
    .context("Failed to create file watcher")?;

    watcher
        .watch(project.root(), RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {:?}", project.root()))?;

    println!("Watching for changes in {:?}...", project.root());
    println!("Press Ctrl+C to stop.\n");

    let relevant = |changed: &Path| project.accepts(changed, &ignore);

    while let Some(burst) = next_burst(&mut rx, debounce, relevant).await {
        tracing::debug!("{} change events, scanning", burst.events);
        println!("\n📝 Changes detected, scanning...");

        let files = match project.discover_files() {
            Ok(files) => files,
            Err(e) => {
                eprintln!("Discovery error: {}", e);
                continue;
            }
        };

        match scanner.scan_incremental(&files).await {
            Ok(result) => {
                if let Err(e) = db.record_scan_run("watch", &result.stats, result.failures.len()) {
                    tracing::warn!("Failed to record scan: {}", e);
                }
                print_scan(&result, format)?;
            }
            Err(e) => eprintln!("Scan error: {}", e),
        }

        if burst.closed {
            break;
        }
    }

    Ok(())
}

/// Relevant events coalesced into one rescan
#[derive(Debug, PartialEq, Eq)]
struct Burst {
    events: usize,
    /// The event channel closed before the debounce window elapsed
    closed: bool,
}

/// Wait for a relevant event, then absorb events until `debounce` passes
/// quietly. Returns `None` once the channel is closed with nothing pending.
async fn next_burst(
    rx: &mut mpsc::UnboundedReceiver<PathBuf>,
    debounce: Duration,
    relevant: impl Fn(&Path) -> bool,
) -> Option<Burst> {
    loop {
        let first = rx.recv().await?;
        if relevant(first.as_path()) {
            break;
        }
    }

    let mut burst = Burst {
        events: 1,
        closed: false,
    };
    loop {
        match tokio::time::timeout(debounce, rx.recv()).await {
            Ok(Some(changed)) => {
                if relevant(changed.as_path()) {
                    burst.events += 1;
                }
            }
            Ok(None) => {
                burst.closed = true;
                break;
            }
            Err(_) => break,
        }
    }
    Some(burst)
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    #[test]
    fn test_content_change_kinds() {
        assert!(is_content_change(&EventKind::Create(CreateKind::File)));
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_content_change(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Any)));
    }

    fn is_source(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == "rs")
    }

    #[tokio::test]
    async fn test_closed_channel_still_yields_pending_burst() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(PathBuf::from("/p/notes.txt")).unwrap();
        tx.send(PathBuf::from("/p/src/lib.rs")).unwrap();
        tx.send(PathBuf::from("/p/src/main.rs")).unwrap();
        drop(tx);

        let burst = next_burst(&mut rx, Duration::from_millis(50), is_source).await;
        assert_eq!(
            burst,
            Some(Burst {
                events: 2,
                closed: true,
            })
        );
        assert_eq!(next_burst(&mut rx, Duration::from_millis(50), is_source).await, None);
    }

    #[tokio::test]
    async fn test_irrelevant_events_never_trigger() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(PathBuf::from("/p/target/debug/build.log")).unwrap();
        drop(tx);

        assert_eq!(next_burst(&mut rx, Duration::from_millis(50), is_source).await, None);
    }

    #[tokio::test]
    async fn test_quiet_window_ends_burst() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(PathBuf::from("/p/src/lib.rs")).unwrap();

        let burst = next_burst(&mut rx, Duration::from_millis(20), is_source).await;
        assert_eq!(
            burst,
            Some(Burst {
                events: 1,
                closed: false,
            })
        );
        drop(tx);
    }
}
