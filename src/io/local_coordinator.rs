use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::controller::{CoordinatorError, ListCoordinator, SetUpdate, SetUpdateSink};
use crate::io::store_io::{self, Store, StoreError};
use crate::io::watcher::ListWatcher;
use crate::model::List;
use crate::util::sync::lock;

/// How long the watch thread blocks before checking whether it was stopped
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Quiet period that ends a burst of filesystem events
const SETTLE: Duration = Duration::from_millis(50);

/// Known documents and their modification times
type Scan = BTreeMap<PathBuf, Option<SystemTime>>;

/// A [`ListCoordinator`] over one directory of list documents.
///
/// Observation scans the directory, then follows filesystem events,
/// re-scanning and diffing on each burst. Creates and removes re-scan
/// immediately so their effect is reported without waiting for the watcher.
pub struct LocalCoordinator {
    dir: PathBuf,
    extension: String,
    state: Arc<Mutex<LocalState>>,
}

#[derive(Default)]
struct LocalState {
    sink: Option<SetUpdateSink>,
    known: Scan,
    /// Bumped on every start and stop; a watch thread exits once it no
    /// longer matches
    session: u64,
}

impl LocalCoordinator {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let dir = dir.into();
        // Watcher events carry resolved paths
        let dir = dir.canonicalize().unwrap_or(dir);
        LocalCoordinator {
            dir,
            extension: extension.into(),
            state: Arc::new(Mutex::new(LocalState::default())),
        }
    }

    pub fn for_store(store: &Store) -> Self {
        LocalCoordinator::new(&store.dir, store.extension())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where a list called `name` would be stored
    pub fn location_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        store_io::list_path(&self.dir, name, &self.extension)
    }

    fn refresh_now(&self, hints: &[PathBuf]) {
        let mut state = lock(&self.state);
        refresh(&mut state, &self.dir, &self.extension, hints);
    }
}

impl ListCoordinator for LocalCoordinator {
    fn start_observing(&self, sink: SetUpdateSink) {
        // Watch before scanning so nothing between the two is missed
        let watcher = match ListWatcher::start(&self.dir, &self.extension) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(
                    dir = %self.dir.display(),
                    error = %e,
                    "could not watch list directory; outside changes will not be seen"
                );
                None
            }
        };

        let session = {
            let mut state = lock(&self.state);
            state.session += 1;
            state.known = scan(&self.dir, &self.extension);
            sink.send(SetUpdate {
                inserted: state.known.keys().cloned().collect(),
                ..SetUpdate::default()
            });
            state.sink = Some(sink);
            state.session
        };
        info!(dir = %self.dir.display(), "observing list directory");

        let Some(watcher) = watcher else {
            return;
        };
        let state = Arc::clone(&self.state);
        let dir = self.dir.clone();
        let extension = self.extension.clone();
        let spawned = thread::Builder::new()
            .name("lk-watch".into())
            .spawn(move || watch_loop(watcher, state, session, &dir, &extension));
        if let Err(e) = spawned {
            warn!(error = %e, "could not start watch thread");
        }
    }

    fn stop_observing(&self) {
        let mut state = lock(&self.state);
        state.session += 1;
        state.sink = None;
        debug!(dir = %self.dir.display(), "stopped observing list directory");
    }

    fn create_list(&self, list: &List, name: &str) -> Result<PathBuf, CoordinatorError> {
        let path = self.location_for(name)?;
        store_io::create_list(&path, list)?;
        info!(list = name, path = %path.display(), "created list");
        self.refresh_now(std::slice::from_ref(&path));
        Ok(path)
    }

    fn remove_list(&self, location: &Path) -> Result<(), CoordinatorError> {
        match store_io::delete_list(location) {
            Ok(()) => {}
            Err(StoreError::NoSuchList(_)) => {
                return Err(CoordinatorError::NotFound {
                    path: location.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        }
        info!(path = %location.display(), "removed list");
        self.refresh_now(&[]);
        Ok(())
    }

    fn read_list(&self, location: &Path) -> Result<List, CoordinatorError> {
        Ok(store_io::read_list(location)?.list)
    }

    fn label(&self) -> &str {
        "local"
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists(name) => CoordinatorError::AlreadyExists(name),
            StoreError::ReadError { path, source } if source.kind() == std::io::ErrorKind::NotFound => {
                CoordinatorError::NotFound { path }
            }
            StoreError::ReadError { path, source } | StoreError::WriteError { path, source } => {
                CoordinatorError::Io { path, source }
            }
            other => CoordinatorError::Backend(other.to_string()),
        }
    }
}

fn watch_loop(
    watcher: ListWatcher,
    state: Arc<Mutex<LocalState>>,
    session: u64,
    dir: &Path,
    extension: &str,
) {
    loop {
        let result = watcher.wait(POLL_INTERVAL, SETTLE);
        let mut guard = lock(&state);
        if guard.session != session {
            break;
        }
        match result {
            Ok(paths) => refresh(&mut guard, dir, extension, &paths),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!(dir = %dir.display(), "watch thread exiting");
}

/// Re-scan, diff against the last scan, and report any difference
fn refresh(state: &mut LocalState, dir: &Path, extension: &str, hints: &[PathBuf]) {
    let current = scan(dir, extension);
    let update = diff_scans(&state.known, &current, hints);
    state.known = current;
    if update.is_empty() {
        return;
    }
    debug!(
        inserted = update.inserted.len(),
        removed = update.removed.len(),
        updated = update.updated.len(),
        "list directory changed"
    );
    if let Some(sink) = &state.sink {
        sink.send(update);
    }
}

fn scan(dir: &Path, extension: &str) -> Scan {
    match store_io::list_locations(dir, extension) {
        Ok(locations) => locations
            .into_iter()
            .map(|path| {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
                (path, modified)
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "could not scan list directory");
            Scan::new()
        }
    }
}

/// Paths that appeared, disappeared, or changed between two scans. A path
/// present in both counts as changed when its modification time differs or
/// the watcher named it.
fn diff_scans(before: &Scan, after: &Scan, hints: &[PathBuf]) -> SetUpdate {
    let hinted: HashSet<&PathBuf> = hints.iter().collect();
    let mut update = SetUpdate::default();
    for (path, modified) in after {
        match before.get(path) {
            None => update.inserted.push(path.clone()),
            Some(previous) if previous != modified || hinted.contains(path) => {
                update.updated.push(path.clone())
            }
            Some(_) => {}
        }
    }
    update.removed = before
        .keys()
        .filter(|path| !after.contains_key(*path))
        .cloned()
        .collect();
    update
}
