use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use crate::cli::commands::{ListNameArg, NewArgs, WatchArgs};
use crate::cli::output::*;
use crate::controller::{ControllerEvent, ListsController};
use crate::io::LocalCoordinator;
use crate::io::lock::StoreLock;
use crate::io::store_io::{Store, StoreError};
use crate::model::ListColor;

use super::load_store_cwd;

/// How long `new` and `rm` wait for the store to confirm the change
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);

/// A controller over the store's directory that has caught up with its
/// contents. Every notification, the initial inserts included, lands in the
/// returned receiver.
fn open_controller(store: &Store) -> (ListsController, Receiver<ControllerEvent>) {
    let coordinator = Arc::new(LocalCoordinator::for_store(store));
    let controller = ListsController::new(coordinator, store.config.controller.clone());
    let (tx, rx) = mpsc::channel();
    controller.set_delegate(Some(Arc::new(tx)));
    controller.start_searching();
    controller.flush();
    (controller, rx)
}

/// Receive until `pick` accepts an event or `timeout` runs out
fn wait_for<T>(
    rx: &Receiver<ControllerEvent>,
    timeout: Duration,
    mut pick: impl FnMut(ControllerEvent) -> Option<T>,
) -> Option<T> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        let event = rx.recv_timeout(remaining).ok()?;
        if let Some(found) = pick(event) {
            return Some(found);
        }
    }
}

pub fn cmd_lists(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_store_cwd()?;
    let (controller, _rx) = open_controller(&store);

    let (done_tx, done_rx) = mpsc::channel();
    controller.resolve_all_colors(move || {
        let _ = done_tx.send(());
    });
    done_rx
        .recv_timeout(CONFIRM_TIMEOUT)
        .map_err(|_| "timed out reading list colors")?;
    let records = controller.records();

    if json {
        let out: Vec<ListInfoJson> = records.iter().map(info_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if records.is_empty() {
        println!("no lists (create one with `lk new <name>`)");
    } else {
        for line in format_lists(&records) {
            println!("{}", line);
        }
    }
    Ok(())
}

pub fn cmd_new(args: NewArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_store_cwd()?;
    let color = match args.color {
        Some(ref name) => name.parse::<ListColor>()?,
        None => store.config.lists.default_color,
    };
    let _lock = StoreLock::acquire_default(&store.dir)?;
    let (controller, rx) = open_controller(&store);

    controller.create_record(&args.name, color)?;
    let outcome = wait_for(&rx, CONFIRM_TIMEOUT, |event| match event {
        ControllerEvent::Insert { info, .. } if info.name == args.name => Some(Ok(info)),
        ControllerEvent::CreateFailed { name, error } if name == args.name => Some(Err(error)),
        _ => None,
    });
    let info = match outcome {
        Some(Ok(info)) => info.with_color(color),
        Some(Err(error)) => return Err(error.into()),
        None => return Err(format!("timed out creating {}", args.name).into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info_to_json(&info))?);
    } else {
        println!("{}", info.location.display());
    }
    Ok(())
}

pub fn cmd_rm(args: ListNameArg) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_store_cwd()?;
    let _lock = StoreLock::acquire_default(&store.dir)?;
    let (controller, rx) = open_controller(&store);

    let index = controller
        .index_of(&args.name)
        .ok_or_else(|| StoreError::NoSuchList(args.name.clone()))?;
    let info = controller.record(index);

    controller.remove_record(&info);
    let outcome = wait_for(&rx, CONFIRM_TIMEOUT, |event| match event {
        ControllerEvent::Remove { info, .. } if info.name == args.name => Some(Ok(())),
        ControllerEvent::RemoveFailed { info, error } if info.name == args.name => Some(Err(error)),
        _ => None,
    });
    match outcome {
        Some(Ok(())) => {
            println!("removed {}", args.name);
            Ok(())
        }
        Some(Err(error)) => Err(error.into()),
        None => Err(format!("timed out removing {}", args.name).into()),
    }
}

pub fn cmd_watch(args: WatchArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_store_cwd()?;
    let (_controller, rx) = open_controller(&store);
    let deadline = args.timeout.map(|ms| Instant::now() + Duration::from_millis(ms));

    loop {
        let event = match deadline {
            Some(deadline) => {
                let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                    break;
                };
                match rx.recv_timeout(remaining) {
                    Ok(event) => event,
                    Err(mpsc::RecvTimeoutError::Timeout) => break,
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(event) => event,
                Err(_) => break,
            },
        };
        if json {
            if let Some(out) = event_to_json(&event) {
                println!("{}", serde_json::to_string(&out)?);
            }
        } else if let Some(line) = format_event(&event) {
            println!("{}", line);
        }
    }
    Ok(())
}
