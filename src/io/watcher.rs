use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::warn;

/// Events sent from the file watcher to its consumer.
#[derive(Debug)]
pub enum FileEvent {
    /// One or more list documents were created, modified or removed.
    Changed(Vec<PathBuf>),
}

/// A file system watcher for one store directory.
pub struct ListWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<FileEvent>,
}

impl ListWatcher {
    /// Start watching `dir` (not recursively) for documents with the given
    /// extension.
    pub fn start(dir: &Path, extension: &str) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let dir_owned = dir.to_path_buf();
        let extension = extension.to_string();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(error = %e, "file watcher error");
                        return;
                    }
                };

                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }

                let relevant: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| {
                        if p.parent() != Some(dir_owned.as_path()) {
                            return false;
                        }
                        // Temp files from atomic writes and the lock file
                        if let Some(name) = p.file_name().and_then(|n| n.to_str())
                            && name.starts_with('.')
                        {
                            return false;
                        }
                        p.extension().and_then(|e| e.to_str()) == Some(extension.as_str())
                    })
                    .collect();

                if !relevant.is_empty() {
                    let _ = tx.send(FileEvent::Changed(relevant));
                }
            },
            Config::default(),
        )?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        Ok(ListWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Wait up to `timeout` for something to change, then keep collecting
    /// until `settle` passes without another event. Returns the changed
    /// paths, deduplicated, in arrival order.
    pub fn wait(&self, timeout: Duration, settle: Duration) -> Result<Vec<PathBuf>, mpsc::RecvTimeoutError> {
        let FileEvent::Changed(mut paths) = self.rx.recv_timeout(timeout)?;
        while let Ok(FileEvent::Changed(more)) = self.rx.recv_timeout(settle) {
            paths.extend(more);
        }
        let mut seen = HashSet::new();
        paths.retain(|p| seen.insert(p.clone()));
        Ok(paths)
    }
}
