//! Source File Watcher
//!
//! Watches crate source directories and regenerates stores when Rust files
//! change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use flowstore_codegen::{BatchReport, Builder};

/// Quiet period collapsing editor save bursts into one batch
const DEBOUNCE: Duration = Duration::from_millis(150);

/// Source directory watcher
pub struct SourceWatcher {
    /// Generator run on every change
    builder: Builder,
    /// Channel receiver for changed files
    rx: mpsc::Receiver<PathBuf>,
    /// The underlying watcher (kept alive)
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Create a watcher over the builder's source directories
    pub fn new(builder: Builder) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel(100);

        // Generated files must not retrigger a batch
        let out_roots = match builder.resolved_out_dir() {
            Ok(dir) => {
                if let Err(e) = std::fs::create_dir_all(&dir) {
                    warn!("Failed to create {}: {}", dir.display(), e);
                }
                output_roots(&dir)
            }
            Err(_) => Vec::new(),
        };

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if let Some(path) = Self::event_to_change(&out_roots, &event) {
                        let _ = tx.blocking_send(path);
                    }
                }
                Err(e) => {
                    error!("File watcher error: {}", e);
                }
            }
        })?;

        for dir in builder.source_dirs() {
            watcher.watch(&dir, RecursiveMode::Recursive)?;
            info!("Watching source directory: {}", dir.display());
        }

        Ok(Self {
            builder,
            rx,
            _watcher: watcher,
        })
    }

    /// Convert a notify event to the changed Rust source file, if any
    fn event_to_change(out_roots: &[PathBuf], event: &Event) -> Option<PathBuf> {
        match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) => {}
            _ => {
                debug!("Ignoring event kind: {:?}", event.kind);
                return None;
            }
        }

        let path = event.paths.first()?;
        if path.extension().is_none_or(|ext| ext != "rs") {
            return None;
        }
        if out_roots.iter().any(|out| path.starts_with(out)) {
            return None;
        }

        debug!("Source change detected: {}", path.display());
        Some(path.clone())
    }

    /// Run one batch on a blocking thread
    pub async fn regenerate(&self) -> Option<BatchReport> {
        let builder = self.builder.clone();
        match tokio::task::spawn_blocking(move || builder.generate()).await {
            Ok(Ok(report)) => {
                for line in report.diagnostics() {
                    warn!("{}", line);
                }
                Some(report)
            }
            Ok(Err(e)) => {
                error!("Store generation failed: {}", e);
                None
            }
            Err(e) => {
                error!("Store generation task failed: {}", e);
                None
            }
        }
    }

    /// Run the watcher loop
    pub async fn run(mut self) {
        info!("Starting source watcher loop");

        while let Some(path) = self.rx.recv().await {
            tokio::time::sleep(DEBOUNCE).await;
            let mut changed = 1;
            while self.rx.try_recv().is_ok() {
                changed += 1;
            }

            info!(changed, "Sources changed ({}), regenerating", path.display());
            self.regenerate().await;
        }

        info!("Source watcher loop ended");
    }
}

/// Every form of `dir` an event path may start with: as given, absolute and
/// canonical (the latter only once the directory exists)
fn output_roots(dir: &Path) -> Vec<PathBuf> {
    let mut roots = vec![dir.to_path_buf()];
    if let Ok(absolute) = std::path::absolute(dir) {
        roots.push(absolute);
    }
    if let Ok(canonical) = dir.canonicalize() {
        roots.push(canonical);
    }
    roots.dedup();
    roots
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
