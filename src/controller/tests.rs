use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use pretty_assertions::assert_eq;

use super::*;

// ---------------------------------------------------------------------------
// In-memory coordinator
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    lists: IndexMap<PathBuf, List>,
    sink: Option<SetUpdateSink>,
    last_sink: Option<SetUpdateSink>,
    hold_snapshot: bool,
    fail_create: bool,
    fail_remove: bool,
    unreadable: HashSet<String>,
    removed: Vec<PathBuf>,
    create_gate: Option<Receiver<()>>,
}

struct MemoryStore {
    dir: String,
    state: Mutex<MemoryState>,
    create_calls: AtomicUsize,
    reads: AtomicUsize,
}

impl MemoryStore {
    fn new(dir: &str, lists: &[(&str, ListColor)]) -> Arc<Self> {
        let store = Arc::new(MemoryStore {
            dir: dir.to_string(),
            state: Mutex::new(MemoryState::default()),
            create_calls: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        });
        for (name, color) in lists {
            let location = store.location(name);
            lock(&store.state)
                .lists
                .insert(location, List::new(*color, Vec::new()));
        }
        store
    }

    fn location(&self, name: &str) -> PathBuf {
        PathBuf::from(format!("/{}/{}.list", self.dir, name))
    }

    fn with_state(&self, f: impl FnOnce(&mut MemoryState)) {
        f(&mut lock(&self.state));
    }

    /// Apply a change set and report it as one update
    fn change(&self, add: &[&str], remove: &[&str]) {
        let mut state = lock(&self.state);
        let inserted: Vec<PathBuf> = add.iter().map(|n| self.location(n)).collect();
        let removed: Vec<PathBuf> = remove.iter().map(|n| self.location(n)).collect();
        for location in &removed {
            state.lists.shift_remove(location);
        }
        for location in &inserted {
            state.lists.insert(location.clone(), List::default());
        }
        if let Some(sink) = &state.sink {
            sink.update(inserted, removed, Vec::new());
        }
    }

    fn recolor(&self, name: &str, color: ListColor) {
        let mut state = lock(&self.state);
        let location = self.location(name);
        if let Some(list) = state.lists.get_mut(&location) {
            list.color = color;
        }
        if let Some(sink) = &state.sink {
            sink.update(Vec::new(), Vec::new(), vec![location]);
        }
    }

    fn resend_snapshot(&self) {
        let state = lock(&self.state);
        if let Some(sink) = &state.sink {
            sink.update(state.lists.keys().cloned().collect(), Vec::new(), Vec::new());
        }
    }

    fn release_snapshot(&self) {
        self.with_state(|s| s.hold_snapshot = false);
        self.resend_snapshot();
    }

    fn removed(&self) -> Vec<PathBuf> {
        lock(&self.state).removed.clone()
    }

    fn color_of(&self, name: &str) -> Option<ListColor> {
        lock(&self.state).lists.get(&self.location(name)).map(|l| l.color)
    }
}

impl ListCoordinator for MemoryStore {
    fn start_observing(&self, sink: SetUpdateSink) {
        let mut state = lock(&self.state);
        if !state.hold_snapshot {
            sink.update(state.lists.keys().cloned().collect(), Vec::new(), Vec::new());
        }
        state.last_sink = Some(sink.clone());
        state.sink = Some(sink);
    }

    fn stop_observing(&self) {
        lock(&self.state).sink = None;
    }

    fn create_list(&self, list: &List, name: &str) -> Result<PathBuf, CoordinatorError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let gate = lock(&self.state).create_gate.take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        let mut state = lock(&self.state);
        if state.fail_create {
            return Err(CoordinatorError::Backend("disk full".into()));
        }
        let location = self.location(name);
        if state.lists.contains_key(&location) {
            return Err(CoordinatorError::AlreadyExists(name.to_string()));
        }
        state.lists.insert(location.clone(), list.clone());
        if let Some(sink) = &state.sink {
            sink.update(vec![location.clone()], Vec::new(), Vec::new());
        }
        Ok(location)
    }

    fn remove_list(&self, location: &Path) -> Result<(), CoordinatorError> {
        let mut state = lock(&self.state);
        if state.fail_remove {
            return Err(CoordinatorError::Backend("permission denied".into()));
        }
        if state.lists.shift_remove(location).is_none() {
            return Err(CoordinatorError::NotFound {
                path: location.to_path_buf(),
            });
        }
        state.removed.push(location.to_path_buf());
        if let Some(sink) = &state.sink {
            sink.update(Vec::new(), vec![location.to_path_buf()], Vec::new());
        }
        Ok(())
    }

    fn read_list(&self, location: &Path) -> Result<List, CoordinatorError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let state = lock(&self.state);
        let name = crate::model::name_from_location(location);
        if state.unreadable.contains(&name) {
            return Err(CoordinatorError::Backend("corrupt".into()));
        }
        state
            .lists
            .get(location)
            .cloned()
            .ok_or_else(|| CoordinatorError::NotFound {
                path: location.to_path_buf(),
            })
    }

    fn label(&self) -> &str {
        &self.dir
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn lazy() -> ControllerConfig {
    ControllerConfig {
        eager_colors: false,
        ..ControllerConfig::default()
    }
}

fn new_controller(store: &Arc<MemoryStore>, config: ControllerConfig) -> (ListsController, Receiver<ControllerEvent>) {
    let controller = ListsController::new(store.clone(), config);
    let (tx, rx) = mpsc::channel();
    controller.set_delegate(Some(Arc::new(tx)));
    (controller, rx)
}

/// Flush until `done` holds, then flush once more so the notifications of
/// the command that made it true have been delivered too.
fn wait_for(controller: &ListsController, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        controller.flush();
        if done() {
            controller.flush();
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for the controller");
        thread::sleep(Duration::from_millis(5));
    }
}

fn summary(rx: &Receiver<ControllerEvent>) -> Vec<String> {
    rx.try_iter()
        .map(|e| match e {
            ControllerEvent::WillChangeContent => "will".to_string(),
            ControllerEvent::DidChangeContent => "did".to_string(),
            ControllerEvent::Insert { info, index } => format!("+{}@{}", info.name, index),
            ControllerEvent::Remove { info, index } => format!("-{}@{}", info.name, index),
            ControllerEvent::Update { info, index } => format!("~{}@{}", info.name, index),
            ControllerEvent::CreateFailed { name, error } => format!("create {} failed: {}", name, error),
            ControllerEvent::RemoveFailed { info, error } => {
                format!("remove {} failed: {}", info.name, error)
            }
        })
        .collect()
}

fn names(controller: &ListsController) -> Vec<String> {
    controller.records().into_iter().map(|r| r.name).collect()
}

fn tracking(store: &Arc<MemoryStore>, config: ControllerConfig) -> (ListsController, Receiver<ControllerEvent>) {
    let (controller, rx) = new_controller(store, config);
    controller.start_searching();
    wait_for(&controller, || controller.phase() == ControllerPhase::Tracking);
    (controller, rx)
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[test]
fn initial_snapshot_inserts_in_backend_order() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red), ("B", ListColor::Blue)]);
    let (controller, rx) = tracking(&store, lazy());
    assert_eq!(summary(&rx), vec!["will", "+A@0", "+B@1", "did"]);
    assert_eq!(names(&controller), vec!["A", "B"]);
    assert_eq!(controller.record(1).location, PathBuf::from("/local/B.list"));
    assert_eq!(controller.record(0).color, None);
}

#[test]
fn remove_and_insert_in_one_change_set() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red), ("B", ListColor::Blue)]);
    let (controller, rx) = tracking(&store, lazy());
    summary(&rx);

    store.change(&["C"], &["A"]);
    wait_for(&controller, || controller.contains("C"));
    assert_eq!(summary(&rx), vec!["will", "-A@0", "+C@1", "did"]);
    assert_eq!(names(&controller), vec!["B", "C"]);
}

#[test]
fn repeated_snapshot_is_quiet() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red), ("B", ListColor::Blue)]);
    let (controller, rx) = tracking(&store, lazy());
    summary(&rx);

    store.resend_snapshot();
    controller.flush();
    assert!(summary(&rx).is_empty());
    assert_eq!(controller.count(), 2);
}

#[test]
fn searching_waits_for_every_coordinator() {
    let local = MemoryStore::new("local", &[("A", ListColor::Red)]);
    let cloud = MemoryStore::new("cloud", &[("B", ListColor::Green)]);
    cloud.with_state(|s| s.hold_snapshot = true);
    let (controller, rx) = new_controller(&local, lazy());
    controller.attach_secondary_coordinator(cloud.clone());

    controller.start_searching();
    controller.flush();
    assert_eq!(controller.phase(), ControllerPhase::Searching);
    assert!(controller.is_empty());
    assert!(summary(&rx).is_empty());

    cloud.release_snapshot();
    wait_for(&controller, || controller.phase() == ControllerPhase::Tracking);
    assert_eq!(summary(&rx), vec!["will", "+A@0", "+B@1", "did"]);
}

#[test]
fn detaching_a_silent_coordinator_starts_tracking() {
    let local = MemoryStore::new("local", &[("A", ListColor::Red)]);
    let cloud = MemoryStore::new("cloud", &[("B", ListColor::Green)]);
    cloud.with_state(|s| s.hold_snapshot = true);
    let (controller, rx) = new_controller(&local, lazy());
    controller.attach_secondary_coordinator(cloud.clone());

    controller.start_searching();
    controller.flush();
    assert_eq!(controller.phase(), ControllerPhase::Searching);

    controller.detach_secondary_coordinators();
    controller.flush();
    assert_eq!(controller.phase(), ControllerPhase::Tracking);
    assert_eq!(names(&controller), vec!["A"]);
    assert_eq!(summary(&rx), vec!["will", "+A@0", "did"]);
}

#[test]
fn secondary_copy_of_a_primary_list_is_deleted() {
    let local = MemoryStore::new("local", &[("A", ListColor::Red), ("B", ListColor::Blue)]);
    let cloud = MemoryStore::new("cloud", &[("B", ListColor::Gray), ("C", ListColor::Green)]);
    let (controller, rx) = new_controller(&local, lazy());
    controller.attach_secondary_coordinator(cloud.clone());
    controller.start_searching();

    wait_for(&controller, || !cloud.removed().is_empty());
    assert_eq!(names(&controller), vec!["A", "B", "C"]);
    assert_eq!(controller.record(1).location, PathBuf::from("/local/B.list"));
    assert_eq!(controller.record(2).location, PathBuf::from("/cloud/C.list"));
    assert_eq!(cloud.removed(), vec![PathBuf::from("/cloud/B.list")]);
    assert!(local.removed().is_empty());

    // The secondary reporting the deletion changes nothing visible
    assert_eq!(summary(&rx), vec!["will", "+A@0", "+B@1", "+C@2", "did"]);
}

#[test]
fn swapping_primary_updates_shared_records_in_place() {
    let local = MemoryStore::new("local", &[("A", ListColor::Red), ("B", ListColor::Blue)]);
    let cloud = MemoryStore::new(
        "cloud",
        &[("A", ListColor::Red), ("B", ListColor::Blue), ("C", ListColor::Green)],
    );
    let (controller, rx) = tracking(&local, lazy());
    summary(&rx);

    controller.set_primary_coordinator(cloud.clone());
    wait_for(&controller, || controller.count() == 3);
    assert_eq!(summary(&rx), vec!["will", "+C@2", "~A@0", "~B@1", "did"]);
    assert_eq!(controller.record(0).location, PathBuf::from("/cloud/A.list"));
    assert_eq!(controller.phase(), ControllerPhase::Tracking);

    // The old primary no longer reports
    local.change(&["Z"], &[]);
    controller.flush();
    assert!(!controller.contains("Z"));
}

#[test]
fn detaching_secondaries_drops_their_lists() {
    let local = MemoryStore::new("local", &[("A", ListColor::Red)]);
    let cloud = MemoryStore::new("cloud", &[("B", ListColor::Green)]);
    let (controller, rx) = new_controller(&local, lazy());
    controller.attach_secondary_coordinator(cloud.clone());
    controller.start_searching();
    wait_for(&controller, || controller.count() == 2);
    summary(&rx);

    controller.detach_secondary_coordinators();
    wait_for(&controller, || controller.count() == 1);
    assert_eq!(summary(&rx), vec!["will", "-B@1", "did"]);
}

#[test]
fn updates_after_stop_are_ignored() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red)]);
    let (controller, rx) = tracking(&store, lazy());
    summary(&rx);

    controller.stop_searching();
    assert_eq!(controller.phase(), ControllerPhase::Idle);
    let stale = lock(&store.state).last_sink.clone();
    if let Some(sink) = stale {
        sink.update(vec![store.location("Late")], Vec::new(), Vec::new());
    }
    controller.flush();
    assert!(summary(&rx).is_empty());
    assert_eq!(names(&controller), vec!["A"]);

    // Restarting re-diffs against the retained records
    store.change(&["B"], &[]);
    controller.start_searching();
    wait_for(&controller, || controller.count() == 2);
    assert_eq!(summary(&rx), vec!["will", "+B@1", "did"]);
}

// ---------------------------------------------------------------------------
// Create / remove
// ---------------------------------------------------------------------------

#[test]
fn create_appears_once_the_backend_reports_it() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red)]);
    let (controller, rx) = tracking(&store, lazy());
    summary(&rx);

    controller.create_record("Groceries", ListColor::Green).unwrap();
    wait_for(&controller, || controller.contains("Groceries"));
    assert_eq!(summary(&rx), vec!["will", "+Groceries@1", "did"]);
    assert_eq!(store.color_of("Groceries"), Some(ListColor::Green));
    assert!(!controller.can_create_record("Groceries"));
}

#[test]
fn duplicate_or_empty_names_never_reach_the_backend() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red)]);
    let (controller, _rx) = tracking(&store, lazy());

    assert_eq!(
        controller.create_record("A", ListColor::Blue),
        Err(ControllerError::DuplicateName("A".into()))
    );
    assert_eq!(controller.create_record("", ListColor::Blue), Err(ControllerError::EmptyName));
    assert_eq!(controller.create_record("   ", ListColor::Blue), Err(ControllerError::EmptyName));
    assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn creation_in_flight_reserves_its_name() {
    let store = MemoryStore::new("local", &[]);
    let (gate_tx, gate_rx) = mpsc::channel();
    store.with_state(|s| s.create_gate = Some(gate_rx));
    let (controller, _rx) = tracking(&store, lazy());

    controller.create_record("Trip", ListColor::Blue).unwrap();
    assert_eq!(
        controller.create_record("Trip", ListColor::Blue),
        Err(ControllerError::DuplicateName("Trip".into()))
    );
    gate_tx.send(()).unwrap();
    wait_for(&controller, || controller.contains("Trip"));
    assert_eq!(store.create_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn backend_create_failure_is_reported() {
    let store = MemoryStore::new("local", &[]);
    store.with_state(|s| s.fail_create = true);
    let (controller, rx) = tracking(&store, lazy());

    controller.create_record("Trip", ListColor::Blue).unwrap();
    wait_for(&controller, || controller.can_create_record("Trip"));
    assert_eq!(summary(&rx), vec!["create Trip failed: disk full"]);
    assert!(controller.is_empty());
}

#[test]
fn remove_goes_to_the_owning_backend() {
    let local = MemoryStore::new("local", &[("A", ListColor::Red)]);
    let cloud = MemoryStore::new("cloud", &[("B", ListColor::Green)]);
    let (controller, rx) = new_controller(&local, lazy());
    controller.attach_secondary_coordinator(cloud.clone());
    controller.start_searching();
    wait_for(&controller, || controller.count() == 2);
    summary(&rx);

    controller.remove_record(&controller.record(1));
    wait_for(&controller, || controller.count() == 1);
    assert_eq!(summary(&rx), vec!["will", "-B@1", "did"]);
    assert_eq!(cloud.removed(), vec![PathBuf::from("/cloud/B.list")]);
    assert!(local.removed().is_empty());
}

#[test]
fn backend_remove_failure_is_reported() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red)]);
    store.with_state(|s| s.fail_remove = true);
    let (controller, rx) = tracking(&store, lazy());
    summary(&rx);

    controller.remove_record(&controller.record(0));
    let deadline = Instant::now() + Duration::from_secs(5);
    let event = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(event @ ControllerEvent::RemoveFailed { .. }) => break event,
            Ok(_) => continue,
            Err(e) => panic!("no failure reported: {}", e),
        }
    };
    assert_eq!(
        event,
        ControllerEvent::RemoveFailed {
            info: ListInfo::from_location("/local/A.list"),
            error: "permission denied".into(),
        }
    );
    assert_eq!(names(&controller), vec!["A"]);
}

#[test]
fn stopping_cancels_pending_failure_reports() {
    let store = MemoryStore::new("local", &[]);
    let (gate_tx, gate_rx) = mpsc::channel();
    store.with_state(|s| {
        s.fail_create = true;
        s.create_gate = Some(gate_rx);
    });
    let (controller, rx) = tracking(&store, lazy());

    controller.create_record("Trip", ListColor::Blue).unwrap();
    controller.stop_searching();
    gate_tx.send(()).unwrap();
    wait_for(&controller, || controller.can_create_record("Trip"));
    assert!(summary(&rx).is_empty());
}

#[test]
#[should_panic(expected = "not tracked")]
fn removing_an_untracked_record_panics() {
    let store = MemoryStore::new("local", &[]);
    let (controller, _rx) = tracking(&store, lazy());
    controller.remove_record(&ListInfo::from_location("/local/Nope.list"));
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[test]
fn marking_dirty_always_reports_an_update() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red), ("B", ListColor::Blue)]);
    let (controller, rx) = tracking(&store, lazy());
    summary(&rx);

    let edited = controller.record(1).with_color(ListColor::Orange);
    controller.mark_record_dirty(edited.clone());
    controller.mark_record_dirty(edited);
    controller.flush();
    assert_eq!(summary(&rx), vec!["will", "~B@1", "did", "will", "~B@1", "did"]);
    assert_eq!(controller.record(1).color, Some(ListColor::Orange));
}

#[test]
fn fetched_color_is_cached() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red)]);
    let (controller, rx) = tracking(&store, lazy());
    summary(&rx);

    let (tx, colors) = mpsc::channel();
    let info = controller.record(0);
    let first = tx.clone();
    controller.fetch_color(&info, move |color| first.send(color).unwrap());
    assert_eq!(colors.recv_timeout(Duration::from_secs(5)), Ok(ListColor::Red));
    controller.flush();
    assert_eq!(summary(&rx), vec!["will", "~A@0", "did"]);
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);

    controller.fetch_color(&info, move |color| tx.send(color).unwrap());
    assert_eq!(colors.try_recv(), Ok(ListColor::Red));
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
}

#[test]
fn unreadable_list_gets_the_default_color() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red)]);
    store.with_state(|s| {
        s.unreadable.insert("A".into());
    });
    let (controller, _rx) = tracking(&store, lazy());

    let (tx, colors) = mpsc::channel();
    controller.fetch_color(&controller.record(0), move |color| tx.send(color).unwrap());
    assert_eq!(colors.recv_timeout(Duration::from_secs(5)), Ok(ListColor::Gray));
}

#[test]
fn fetching_an_unknown_record_uses_what_the_caller_knows() {
    let store = MemoryStore::new("local", &[]);
    let (controller, _rx) = tracking(&store, lazy());
    let (tx, colors) = mpsc::channel();
    let info = ListInfo::from_location("/elsewhere/X.list").with_color(ListColor::Yellow);
    controller.fetch_color(&info, move |color| tx.send(color).unwrap());
    assert_eq!(colors.try_recv(), Ok(ListColor::Yellow));
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}

#[test]
fn resolve_all_colors_fills_every_record() {
    let store = MemoryStore::new(
        "local",
        &[("A", ListColor::Red), ("B", ListColor::Blue), ("C", ListColor::Green)],
    );
    let (controller, _rx) = tracking(&store, lazy());

    let (tx, done) = mpsc::channel();
    controller.resolve_all_colors(move || tx.send(()).unwrap());
    done.recv_timeout(Duration::from_secs(5)).unwrap();
    let colors: Vec<_> = controller.records().into_iter().map(|r| r.color).collect();
    assert_eq!(
        colors,
        vec![Some(ListColor::Red), Some(ListColor::Blue), Some(ListColor::Green)]
    );
}

#[test]
fn eager_colors_resolve_on_discovery() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red), ("B", ListColor::Blue)]);
    let (controller, _rx) = tracking(&store, ControllerConfig::default());
    wait_for(&controller, || controller.records().iter().all(|r| r.color.is_some()));
    assert_eq!(controller.record(1).color, Some(ListColor::Blue));
}

#[test]
fn content_change_refreshes_a_resolved_color() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red)]);
    let (controller, rx) = tracking(&store, lazy());
    let (tx, done) = mpsc::channel();
    controller.resolve_all_colors(move || tx.send(()).unwrap());
    done.recv_timeout(Duration::from_secs(5)).unwrap();
    controller.flush();
    summary(&rx);

    store.recolor("A", ListColor::Yellow);
    wait_for(&controller, || controller.record(0).color == Some(ListColor::Yellow));
    assert_eq!(summary(&rx), vec!["will", "~A@0", "did"]);
}

/// Wait until the store has served `count` reads and the worker has taken
/// in the fetch results that follow them.
fn wait_for_reads(controller: &ListsController, store: &MemoryStore, count: usize) {
    wait_for(controller, || store.reads.load(Ordering::SeqCst) >= count);
    thread::sleep(Duration::from_millis(50));
    controller.flush();
}

#[test]
fn repeated_mixed_update_is_quiet() {
    let store = MemoryStore::new(
        "local",
        &[("A", ListColor::Red), ("B", ListColor::Blue), ("C", ListColor::Green)],
    );
    let (controller, rx) = tracking(&store, ControllerConfig::default());
    wait_for(&controller, || controller.records().iter().all(|r| r.color.is_some()));
    wait_for_reads(&controller, &store, 3);
    summary(&rx);

    let sink = lock(&store.state).sink.clone().unwrap();
    let (a, c, d) = (store.location("A"), store.location("C"), store.location("D"));
    store.with_state(|s| {
        s.lists.shift_remove(&c);
        s.lists.insert(d.clone(), List::new(ListColor::Orange, Vec::new()));
    });

    sink.update(vec![d.clone()], vec![c.clone()], vec![a.clone()]);
    wait_for(&controller, || controller.contains("D") && controller.record(2).color.is_some());
    wait_for_reads(&controller, &store, 5);
    let first = summary(&rx);
    assert!(first.contains(&"-C@2".to_string()), "{:?}", first);
    assert!(first.contains(&"+D@2".to_string()), "{:?}", first);
    assert_eq!(names(&controller), vec!["A", "B", "D"]);

    sink.update(vec![d], vec![c], vec![a]);
    wait_for_reads(&controller, &store, 6);
    assert!(summary(&rx).is_empty());
    assert_eq!(names(&controller), vec!["A", "B", "D"]);
    assert_eq!(controller.record(2).color, Some(ListColor::Orange));
}

// ---------------------------------------------------------------------------
// Delegates
// ---------------------------------------------------------------------------

/// Reads the controller back from inside its own callbacks
#[derive(Default)]
struct Counting {
    controller: OnceLock<Weak<ListsController>>,
    seen: Mutex<Vec<usize>>,
}

impl ListsControllerDelegate for Counting {
    fn did_change_content(&self) {
        if let Some(controller) = self.controller.get().and_then(Weak::upgrade) {
            lock(&self.seen).push(controller.count());
        }
    }
}

#[test]
fn delegate_can_read_the_controller() {
    let store = MemoryStore::new("local", &[("A", ListColor::Red)]);
    let controller = Arc::new(ListsController::new(store.clone(), lazy()));
    let delegate = Arc::new(Counting::default());
    let _ = delegate.controller.set(Arc::downgrade(&controller));
    controller.set_delegate(Some(delegate.clone()));

    controller.start_searching();
    wait_for(&controller, || controller.count() == 1);
    store.change(&["B"], &[]);
    wait_for(&controller, || controller.count() == 2);
    assert_eq!(*lock(&delegate.seen), vec![1, 2]);
}
