use std::path::{Path, PathBuf};
use std::sync::mpsc;

use super::worker::Command;
use crate::model::List;

/// Error type for storage backend operations
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("a list named {0:?} already exists")]
    AlreadyExists(String),
    #[error("no list at {path}")]
    NotFound { path: PathBuf },
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{0}")]
    Backend(String),
}

/// A storage backend that holds list documents and reports changes to them.
///
/// Implementations own their observation mechanism (filesystem watching,
/// remote queries, message relays). The controller only sees location sets.
pub trait ListCoordinator: Send + Sync {
    /// Begin reporting. The first update sent through `sink` must be the
    /// complete current set, as insertions.
    fn start_observing(&self, sink: SetUpdateSink);

    /// Stop reporting. Updates sent after this returns are ignored anyway.
    fn stop_observing(&self);

    /// Store a new list under `name`, returning its location. Called off the
    /// controller's worker; may block.
    fn create_list(&self, list: &List, name: &str) -> Result<PathBuf, CoordinatorError>;

    /// Delete the list at `location`. Called off the controller's worker.
    fn remove_list(&self, location: &Path) -> Result<(), CoordinatorError>;

    /// Read the list stored at `location`. Used to resolve record colors.
    fn read_list(&self, location: &Path) -> Result<List, CoordinatorError>;

    /// Short name for log output
    fn label(&self) -> &str {
        "coordinator"
    }
}

/// One batch of location changes reported by a coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetUpdate {
    pub inserted: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
}

impl SetUpdate {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// Handle a coordinator uses to push set updates to its controller.
///
/// Cheap to clone and safe to call from any thread; updates are queued and
/// applied in the order they were sent. A sink handed out before the
/// coordinator was stopped or replaced goes quiet.
#[derive(Debug, Clone)]
pub struct SetUpdateSink {
    slot: u64,
    epoch: u64,
    tx: mpsc::Sender<Command>,
}

impl SetUpdateSink {
    pub(crate) fn new(slot: u64, epoch: u64, tx: mpsc::Sender<Command>) -> Self {
        SetUpdateSink { slot, epoch, tx }
    }

    pub fn update(&self, inserted: Vec<PathBuf>, removed: Vec<PathBuf>, updated: Vec<PathBuf>) {
        self.send(SetUpdate {
            inserted,
            removed,
            updated,
        });
    }

    pub fn send(&self, update: SetUpdate) {
        let _ = self.tx.send(Command::SetUpdate {
            slot: self.slot,
            epoch: self.epoch,
            update,
        });
    }
}
