use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use indexmap::IndexSet;
use tracing::{debug, info, warn};

use super::coordinator::{CoordinatorError, ListCoordinator, SetUpdate};
use super::delegate::{ControllerEvent, ListsControllerDelegate};
use super::fetch::{FetchJob, fetch_colors};
use super::reconcile::{self, Candidate, FetchedColor, Records};
use super::ControllerPhase;
use crate::model::{ControllerConfig, ListInfo, name_from_location};
use crate::util::sync::lock;

/// Completion for a color fetch, called on the worker after results land
pub(crate) type FetchDone = Box<dyn FnOnce(&[FetchedColor]) + Send>;

/// Everything the worker thread processes, in arrival order
pub(crate) enum Command {
    SetUpdate {
        slot: u64,
        epoch: u64,
        update: SetUpdate,
    },
    /// Re-run a pass over the current slot sets
    Reconcile,
    CreateFinished {
        name: String,
        epoch: u64,
        result: Result<PathBuf, CoordinatorError>,
    },
    RemoveFinished {
        info: ListInfo,
        epoch: u64,
        result: Result<(), CoordinatorError>,
    },
    MarkDirty(ListInfo),
    ColorsFetched {
        epoch: u64,
        fetched: Vec<FetchedColor>,
        done: Option<FetchDone>,
    },
    Flush(mpsc::Sender<()>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotRole {
    Primary,
    Secondary,
}

/// One attached coordinator and the location set it has reported so far
pub(crate) struct Slot {
    pub id: u64,
    pub role: SlotRole,
    pub coordinator: Arc<dyn ListCoordinator>,
    pub locations: IndexSet<PathBuf>,
    /// Whether the first snapshot since the last start has arrived
    pub reported: bool,
}

impl Slot {
    pub fn new(id: u64, role: SlotRole, coordinator: Arc<dyn ListCoordinator>) -> Self {
        Slot {
            id,
            role,
            coordinator,
            locations: IndexSet::new(),
            reported: false,
        }
    }
}

/// Controller state shared between the public handle and the worker
pub(crate) struct Shared {
    pub phase: ControllerPhase,
    pub records: Records,
    /// Primary first, then secondaries in attach order. Never empty.
    pub slots: Vec<Slot>,
    pub pending_creations: HashSet<String>,
    /// Redundant secondary copies we have already asked to delete
    pub redundant_in_flight: HashSet<PathBuf>,
    /// Bumped on every stop; completions from older epochs are dropped
    pub epoch: u64,
    pub next_slot: u64,
    pub config: ControllerConfig,
    pub delegate: Option<Arc<dyn ListsControllerDelegate>>,
}

impl Shared {
    pub fn new(primary: Arc<dyn ListCoordinator>, config: ControllerConfig) -> Self {
        Shared {
            phase: ControllerPhase::Idle,
            records: Records::new(),
            slots: vec![Slot::new(1, SlotRole::Primary, primary)],
            pending_creations: HashSet::new(),
            redundant_in_flight: HashSet::new(),
            epoch: 0,
            next_slot: 2,
            config,
            delegate: None,
        }
    }

    pub fn allocate_slot(&mut self) -> u64 {
        let id = self.next_slot;
        self.next_slot += 1;
        id
    }

    pub fn primary(&self) -> &Arc<dyn ListCoordinator> {
        &self.slots[0].coordinator
    }

    /// The coordinator that owns a record's location, falling back to the
    /// primary when its slot has since been detached
    pub fn coordinator_for(&self, slot: u64) -> Arc<dyn ListCoordinator> {
        self.slots
            .iter()
            .find(|s| s.id == slot)
            .map_or_else(|| Arc::clone(self.primary()), |s| Arc::clone(&s.coordinator))
    }

    /// Start a background color fetch for the named records. `done` runs on
    /// the worker once every read has finished.
    pub fn schedule_fetch(
        &self,
        tx: &mpsc::Sender<Command>,
        names: impl IntoIterator<Item = String>,
        done: Option<FetchDone>,
    ) {
        let jobs: Vec<FetchJob> = names
            .into_iter()
            .filter_map(|name| {
                let record = self.records.get(&name)?;
                Some(FetchJob {
                    location: record.info.location.clone(),
                    coordinator: self.coordinator_for(record.slot),
                    name,
                })
            })
            .collect();
        if jobs.is_empty() && done.is_none() {
            return;
        }
        let epoch = self.epoch;
        let max_workers = self.config.max_concurrent_fetches;
        let tx = tx.clone();
        thread::spawn(move || {
            let fetched = fetch_colors(&jobs, max_workers);
            let _ = tx.send(Command::ColorsFetched {
                epoch,
                fetched,
                done,
            });
        });
    }
}

/// What a handled command wants told to the outside world, delivered after
/// the state lock is released
#[derive(Default)]
struct Delivery {
    events: Vec<ControllerEvent>,
    create_failure: Option<(String, CoordinatorError)>,
    remove_failure: Option<(ListInfo, CoordinatorError)>,
    done: Option<(FetchDone, Vec<FetchedColor>)>,
}

impl Delivery {
    fn events(events: Vec<ControllerEvent>) -> Self {
        Delivery {
            events,
            ..Default::default()
        }
    }

    fn deliver(self, delegate: Option<Arc<dyn ListsControllerDelegate>>) {
        if let Some(delegate) = delegate {
            for event in &self.events {
                event.deliver(delegate.as_ref());
            }
            if let Some((name, error)) = &self.create_failure {
                delegate.did_fail_creating(name, error);
            }
            if let Some((info, error)) = &self.remove_failure {
                delegate.did_fail_removing(info, error);
            }
        }
        if let Some((done, fetched)) = self.done {
            done(&fetched);
        }
    }
}

/// Worker loop: one command at a time until `Shutdown`.
pub(crate) fn run(shared: Arc<Mutex<Shared>>, tx: mpsc::Sender<Command>, rx: mpsc::Receiver<Command>) {
    for command in rx {
        let (delivery, delegate) = match command {
            Command::Shutdown => break,
            Command::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
            command => {
                let mut state = lock(&shared);
                let delivery = handle(&mut state, &tx, command);
                (delivery, state.delegate.clone())
            }
        };
        delivery.deliver(delegate);
    }
    debug!("lists controller worker stopped");
}

fn handle(shared: &mut Shared, tx: &mpsc::Sender<Command>, command: Command) -> Delivery {
    match command {
        Command::SetUpdate {
            slot,
            epoch,
            update,
        } => handle_set_update(shared, tx, slot, epoch, update),
        Command::Reconcile => match pass_when_ready(shared, tx) {
            Some(events) => Delivery::events(events),
            None => Delivery::default(),
        },
        Command::CreateFinished {
            name,
            epoch,
            result,
        } => {
            shared.pending_creations.remove(&name);
            match result {
                Ok(location) => {
                    debug!(list = %name, location = %location.display(), "list created");
                    Delivery::default()
                }
                Err(e) if epoch == shared.epoch => {
                    warn!(list = %name, error = %e, "could not create list");
                    Delivery {
                        create_failure: Some((name, e)),
                        ..Default::default()
                    }
                }
                Err(e) => {
                    debug!(list = %name, error = %e, "dropping create failure from a stopped session");
                    Delivery::default()
                }
            }
        }
        Command::RemoveFinished {
            info,
            epoch,
            result,
        } => match result {
            Ok(()) => {
                debug!(list = %info.name, "list removed");
                Delivery::default()
            }
            Err(e) if epoch == shared.epoch => {
                warn!(list = %info.name, error = %e, "could not remove list");
                Delivery {
                    remove_failure: Some((info, e)),
                    ..Default::default()
                }
            }
            Err(_) => Delivery::default(),
        },
        Command::MarkDirty(info) => {
            Delivery::events(reconcile::bracket(reconcile::apply_dirty(&mut shared.records, &info)))
        }
        Command::ColorsFetched {
            epoch,
            fetched,
            done,
        } => {
            let events = if epoch == shared.epoch {
                reconcile::bracket(reconcile::apply_colors(&mut shared.records, &fetched))
            } else {
                Vec::new()
            };
            Delivery {
                events,
                done: done.map(|done| (done, fetched)),
                ..Default::default()
            }
        }
        // Handled by the loop
        Command::Flush(_) | Command::Shutdown => Delivery::default(),
    }
}

fn handle_set_update(
    shared: &mut Shared,
    tx: &mpsc::Sender<Command>,
    slot_id: u64,
    epoch: u64,
    update: SetUpdate,
) -> Delivery {
    if epoch != shared.epoch || shared.phase == ControllerPhase::Idle {
        debug!("dropping set update from a stopped session");
        return Delivery::default();
    }
    let Some(slot) = shared.slots.iter_mut().find(|s| s.id == slot_id) else {
        debug!("dropping set update from a detached coordinator");
        return Delivery::default();
    };
    for location in &update.removed {
        slot.locations.shift_remove(location);
    }
    for location in &update.inserted {
        slot.locations.insert(location.clone());
    }
    slot.reported = true;
    debug!(
        coordinator = slot.coordinator.label(),
        inserted = update.inserted.len(),
        removed = update.removed.len(),
        updated = update.updated.len(),
        "set update"
    );

    let Some(events) = pass_when_ready(shared, tx) else {
        return Delivery::default();
    };

    // Content changed in place: re-read colors we show (or would show)
    let eager = shared.config.eager_colors;
    let stale: Vec<String> = update
        .updated
        .iter()
        .filter_map(|location| {
            let name = name_from_location(location);
            let record = shared.records.get(&name)?;
            (record.info.location == *location && (eager || record.info.color.is_some()))
                .then_some(name)
        })
        .collect();
    shared.schedule_fetch(tx, stale, None);

    Delivery::events(events)
}

/// Run a pass if tracking, or start tracking once every attached slot has
/// sent its first snapshot. `None` while still searching.
fn pass_when_ready(shared: &mut Shared, tx: &mpsc::Sender<Command>) -> Option<Vec<ControllerEvent>> {
    match shared.phase {
        ControllerPhase::Idle => return None,
        ControllerPhase::Searching => {
            if !shared.slots.iter().all(|s| s.reported) {
                return None;
            }
            shared.phase = ControllerPhase::Tracking;
            info!(lists = shared.slots.iter().map(|s| s.locations.len()).sum::<usize>(), "tracking");
        }
        ControllerPhase::Tracking => {}
    }
    Some(run_pass(shared, tx))
}

/// Rebuild the candidate set from every slot, diff it into the records, and
/// kick off follow-up work (redundant copy cleanup, color reads).
fn run_pass(shared: &mut Shared, tx: &mpsc::Sender<Command>) -> Vec<ControllerEvent> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();
    let mut redundant = Vec::new();
    for slot in &shared.slots {
        for location in &slot.locations {
            let info = ListInfo::from_location(location.clone());
            if info.name.is_empty() {
                continue;
            }
            if seen.insert(info.name.clone()) {
                candidates.push(Candidate {
                    info,
                    slot: slot.id,
                });
            } else if slot.role == SlotRole::Secondary {
                redundant.push((Arc::clone(&slot.coordinator), location.clone()));
            } else {
                warn!(list = %info.name, location = %location.display(), "ignoring second list with the same name");
            }
        }
    }

    let slots = &shared.slots;
    shared
        .redundant_in_flight
        .retain(|location| slots.iter().any(|s| s.locations.contains(location)));
    for (coordinator, location) in redundant {
        if shared.redundant_in_flight.insert(location.clone()) {
            remove_redundant_copy(coordinator, location);
        }
    }

    let diff = reconcile::reconcile(&mut shared.records, &candidates);
    let eager = shared.config.eager_colors;
    let refetch: Vec<String> = diff
        .touched
        .into_iter()
        .filter(|name| {
            eager
                || shared
                    .records
                    .get(name)
                    .is_some_and(|r| r.info.color.is_some())
        })
        .collect();
    shared.schedule_fetch(tx, refetch, None);

    reconcile::bracket(diff.events)
}

fn remove_redundant_copy(coordinator: Arc<dyn ListCoordinator>, location: PathBuf) {
    info!(
        coordinator = coordinator.label(),
        location = %location.display(),
        "removing copy already held by the primary store"
    );
    thread::spawn(move || {
        if let Err(e) = coordinator.remove_list(&location) {
            warn!(location = %location.display(), error = %e, "could not remove redundant copy");
        }
    });
}
