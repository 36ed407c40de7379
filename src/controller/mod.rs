//! The lists controller: one ordered, de-duplicated view of every list the
//! attached storage backends hold.
//!
//! Backends implement [`ListCoordinator`] and push location sets through a
//! [`SetUpdateSink`]. The controller derives a [`ListInfo`] per location,
//! merges backends primary-first, diffs the result against what it already
//! tracks, and tells its [`ListsControllerDelegate`] about each insert,
//! removal and update, bracketed per change set.
//!
//! All state changes happen on a private worker thread, in the order their
//! causes were queued. Delegate callbacks run on that thread too, outside the
//! state lock, so they can query the controller.

mod coordinator;
mod delegate;
mod fetch;
mod reconcile;
mod worker;

pub use coordinator::{CoordinatorError, ListCoordinator, SetUpdate, SetUpdateSink};
pub use delegate::{ControllerEvent, ListsControllerDelegate};
pub use reconcile::FetchedColor;

use std::fmt;
use std::sync::{Arc, Mutex, mpsc};
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::model::{ControllerConfig, List, ListColor, ListInfo};
use crate::util::sync::lock;
use worker::{Command, Shared, Slot, SlotRole};

/// Lifecycle of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerPhase {
    /// Not observing any backend
    #[default]
    Idle,
    /// Observing, waiting for every backend's first snapshot
    Searching,
    /// Every backend has reported; changes are applied as they arrive
    Tracking,
}

/// Requests the controller refuses before involving a backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    #[error("list name cannot be empty")]
    EmptyName,
    #[error("a list named {0:?} already exists")]
    DuplicateName(String),
}

pub struct ListsController {
    shared: Arc<Mutex<Shared>>,
    tx: mpsc::Sender<Command>,
    /// Serializes start, stop and backend swaps so coordinator start/stop
    /// calls are never reordered against each other
    lifecycle: Mutex<()>,
    worker: Option<JoinHandle<()>>,
}

impl ListsController {
    pub fn new(primary: Arc<dyn ListCoordinator>, config: ControllerConfig) -> Self {
        let shared = Arc::new(Mutex::new(Shared::new(primary, config)));
        let (tx, rx) = mpsc::channel();
        let worker = {
            let shared = Arc::clone(&shared);
            let tx = tx.clone();
            thread::Builder::new()
                .name("lists-controller".into())
                .spawn(move || worker::run(shared, tx, rx))
                .ok()
        };
        if worker.is_none() {
            tracing::error!("could not start lists controller worker");
        }
        ListsController {
            shared,
            tx,
            lifecycle: Mutex::new(()),
            worker,
        }
    }

    pub fn set_delegate(&self, delegate: Option<Arc<dyn ListsControllerDelegate>>) {
        lock(&self.shared).delegate = delegate;
    }

    pub fn phase(&self) -> ControllerPhase {
        lock(&self.shared).phase
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start observing every attached coordinator. No-op unless idle.
    ///
    /// Nothing is reported until each coordinator has sent its first
    /// snapshot; the controller then moves to [`ControllerPhase::Tracking`].
    pub fn start_searching(&self) {
        let _lifecycle = lock(&self.lifecycle);
        let starts: Vec<_> = {
            let mut shared = lock(&self.shared);
            if shared.phase != ControllerPhase::Idle {
                return;
            }
            shared.phase = ControllerPhase::Searching;
            let epoch = shared.epoch;
            shared
                .slots
                .iter_mut()
                .map(|slot| {
                    slot.reported = false;
                    slot.locations.clear();
                    (
                        Arc::clone(&slot.coordinator),
                        SetUpdateSink::new(slot.id, epoch, self.tx.clone()),
                    )
                })
                .collect()
        };
        info!(coordinators = starts.len(), "searching for lists");
        for (coordinator, sink) in starts {
            coordinator.start_observing(sink);
        }
    }

    /// Stop observing. Records are kept. Failures of create and remove
    /// requests still in flight are no longer reported.
    pub fn stop_searching(&self) {
        let _lifecycle = lock(&self.lifecycle);
        let stops: Vec<_> = {
            let mut shared = lock(&self.shared);
            if shared.phase == ControllerPhase::Idle {
                return;
            }
            shared.phase = ControllerPhase::Idle;
            shared.epoch += 1;
            shared
                .slots
                .iter()
                .map(|slot| Arc::clone(&slot.coordinator))
                .collect()
        };
        info!("stopped searching");
        for coordinator in stops {
            coordinator.stop_observing();
        }
    }

    /// Swap the primary backend. While observing, the old primary is stopped
    /// and the new one started; the next pass runs once it has reported, so
    /// records it shares by name with the old one are updated in place.
    pub fn set_primary_coordinator(&self, coordinator: Arc<dyn ListCoordinator>) {
        let _lifecycle = lock(&self.lifecycle);
        let (old, start) = {
            let mut shared = lock(&self.shared);
            let id = shared.allocate_slot();
            let slot = Slot::new(id, SlotRole::Primary, Arc::clone(&coordinator));
            let old = std::mem::replace(&mut shared.slots[0], slot);
            let start = if shared.phase == ControllerPhase::Idle {
                None
            } else {
                shared.phase = ControllerPhase::Searching;
                Some(SetUpdateSink::new(id, shared.epoch, self.tx.clone()))
            };
            (old.coordinator, start)
        };
        info!(from = old.label(), to = coordinator.label(), "switching primary coordinator");
        if let Some(sink) = start {
            old.stop_observing();
            coordinator.start_observing(sink);
        }
    }

    /// Add a secondary backend. Its lists appear alongside the primary's;
    /// copies of lists the primary already holds are deleted from it.
    pub fn attach_secondary_coordinator(&self, coordinator: Arc<dyn ListCoordinator>) {
        let _lifecycle = lock(&self.lifecycle);
        let start = {
            let mut shared = lock(&self.shared);
            let id = shared.allocate_slot();
            shared
                .slots
                .push(Slot::new(id, SlotRole::Secondary, Arc::clone(&coordinator)));
            (shared.phase != ControllerPhase::Idle)
                .then(|| SetUpdateSink::new(id, shared.epoch, self.tx.clone()))
        };
        debug!(coordinator = coordinator.label(), "attached secondary coordinator");
        if let Some(sink) = start {
            coordinator.start_observing(sink);
        }
    }

    /// Detach every secondary backend. Their lists disappear on the next pass.
    pub fn detach_secondary_coordinators(&self) {
        let _lifecycle = lock(&self.lifecycle);
        let (detached, observing) = {
            let mut shared = lock(&self.shared);
            let (secondaries, kept): (Vec<Slot>, Vec<Slot>) = std::mem::take(&mut shared.slots)
                .into_iter()
                .partition(|s| s.role == SlotRole::Secondary);
            shared.slots = kept;
            (secondaries, shared.phase != ControllerPhase::Idle)
        };
        if detached.is_empty() {
            return;
        }
        if observing {
            for slot in &detached {
                slot.coordinator.stop_observing();
            }
        }
        let _ = self.tx.send(Command::Reconcile);
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Whether [`create_record`](Self::create_record) would accept `name`
    pub fn can_create_record(&self, name: &str) -> bool {
        let shared = lock(&self.shared);
        validate_name(&shared, name).is_ok()
    }

    /// Ask the primary backend to create an empty list called `name`.
    ///
    /// Rejected synchronously, without touching the backend, when the name is
    /// empty or already taken (including by a creation still in flight).
    /// The new record appears once the backend reports it; a backend failure
    /// is reported through
    /// [`did_fail_creating`](ListsControllerDelegate::did_fail_creating).
    pub fn create_record(&self, name: &str, color: ListColor) -> Result<(), ControllerError> {
        let (coordinator, epoch) = {
            let mut shared = lock(&self.shared);
            validate_name(&shared, name)?;
            shared.pending_creations.insert(name.to_string());
            (Arc::clone(shared.primary()), shared.epoch)
        };
        debug!(list = name, %color, "creating list");
        let list = List::new(color, Vec::new());
        let name = name.to_string();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = coordinator.create_list(&list, &name);
            let _ = tx.send(Command::CreateFinished {
                name,
                epoch,
                result,
            });
        });
        Ok(())
    }

    /// Ask the owning backend to delete a tracked list. The record goes away
    /// once the backend reports the removal.
    ///
    /// # Panics
    ///
    /// Panics if `info` is not a tracked record.
    pub fn remove_record(&self, info: &ListInfo) {
        let (coordinator, location, epoch) = {
            let shared = lock(&self.shared);
            let record = shared
                .records
                .get(&info.name)
                .unwrap_or_else(|| panic!("list {:?} is not tracked by this controller", info.name));
            (
                shared.coordinator_for(record.slot),
                record.info.location.clone(),
                shared.epoch,
            )
        };
        debug!(list = %info.name, location = %location.display(), "removing list");
        let info = info.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = coordinator.remove_list(&location);
            let _ = tx.send(Command::RemoveFinished {
                info,
                epoch,
                result,
            });
        });
    }

    /// Replace a record's cached metadata after an out-of-band edit (for
    /// example a color change). Always reports an update.
    ///
    /// # Panics
    ///
    /// Panics if `info` is not a tracked record.
    pub fn mark_record_dirty(&self, info: ListInfo) {
        assert!(
            self.contains(&info.name),
            "list {:?} is not tracked by this controller",
            info.name
        );
        let _ = self.tx.send(Command::MarkDirty(info));
    }

    /// Resolve a record's color. Calls back immediately when it is cached;
    /// otherwise reads the list in the background, reports the update, then
    /// calls back on the worker thread. A failed read resolves to the default
    /// color.
    pub fn fetch_color(&self, info: &ListInfo, callback: impl FnOnce(ListColor) + Send + 'static) {
        let cached = {
            let shared = lock(&self.shared);
            match shared.records.get(&info.name) {
                Some(record) if record.info.color.is_some() => record.info.color,
                Some(_) => {
                    let name = info.name.clone();
                    shared.schedule_fetch(
                        &self.tx,
                        [name],
                        Some(Box::new(move |fetched: &[FetchedColor]| {
                            callback(fetched.first().map(|f| f.color).unwrap_or_default())
                        })),
                    );
                    return;
                }
                None => Some(info.color.unwrap_or_default()),
            }
        };
        callback(cached.unwrap_or_default());
    }

    /// Fetch the color of every record that has none yet, then call back.
    pub fn resolve_all_colors(&self, callback: impl FnOnce() + Send + 'static) {
        let shared = lock(&self.shared);
        let unresolved: Vec<String> = shared
            .records
            .values()
            .filter(|r| r.info.color.is_none())
            .map(|r| r.info.name.clone())
            .collect();
        shared.schedule_fetch(
            &self.tx,
            unresolved,
            Some(Box::new(move |_: &[FetchedColor]| callback())),
        );
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn count(&self) -> usize {
        lock(&self.shared).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn record(&self, index: usize) -> ListInfo {
        let shared = lock(&self.shared);
        let count = shared.records.len();
        match shared.records.get_index(index) {
            Some((_, record)) => record.info.clone(),
            None => panic!("record index {} out of bounds ({} records)", index, count),
        }
    }

    /// Snapshot of every record, in order
    pub fn records(&self) -> Vec<ListInfo> {
        lock(&self.shared)
            .records
            .values()
            .map(|r| r.info.clone())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.shared).records.contains_key(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        lock(&self.shared).records.get_index_of(name)
    }

    /// Block until every command queued before this call has been applied
    /// and its notifications delivered. Must not be called from a delegate.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

fn validate_name(shared: &Shared, name: &str) -> Result<(), ControllerError> {
    if name.trim().is_empty() {
        return Err(ControllerError::EmptyName);
    }
    if shared.records.contains_key(name) || shared.pending_creations.contains(name) {
        return Err(ControllerError::DuplicateName(name.to_string()));
    }
    Ok(())
}

impl fmt::Debug for ListsController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = lock(&self.shared);
        f.debug_struct("ListsController")
            .field("phase", &shared.phase)
            .field("records", &shared.records.len())
            .field("coordinators", &shared.slots.len())
            .finish()
    }
}

impl Drop for ListsController {
    fn drop(&mut self) {
        self.stop_searching();
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.worker.take()
            && handle.thread().id() != thread::current().id()
        {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests;
