//! Pure diffing of the controller's record list against a candidate set.
//!
//! Everything here is keyed by derived list name. Nothing here can fail;
//! callers wrap the returned changes in a content bracket.

use std::collections::HashSet;
use std::path::PathBuf;

use indexmap::IndexMap;

use super::delegate::ControllerEvent;
use crate::model::{ListColor, ListInfo};

/// A tracked record and the coordinator slot its location belongs to
#[derive(Debug, Clone)]
pub(crate) struct Record {
    pub info: ListInfo,
    pub slot: u64,
}

/// Ordered records, keyed by name
pub(crate) type Records = IndexMap<String, Record>;

/// A record the backends currently report, in backend order
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub info: ListInfo,
    pub slot: u64,
}

/// Outcome of one pass
#[derive(Debug, Default)]
pub(crate) struct Diff {
    pub events: Vec<ControllerEvent>,
    /// Names whose record was inserted or moved to a new location
    pub touched: Vec<String>,
}

/// Bring `records` in line with `candidates`: removals first (at their index
/// before each removal), then insertions (in candidate order, each placed
/// right after the nearest preceding candidate already present), then
/// updates for surviving records whose location or known color changed.
pub(crate) fn reconcile(records: &mut Records, candidates: &[Candidate]) -> Diff {
    let mut diff = Diff::default();
    let wanted: HashSet<&str> = candidates.iter().map(|c| c.info.name.as_str()).collect();

    let doomed: Vec<String> = records
        .keys()
        .filter(|name| !wanted.contains(name.as_str()))
        .cloned()
        .collect();
    for name in doomed {
        if let Some((index, _, record)) = records.shift_remove_full(&name) {
            diff.events.push(ControllerEvent::Remove {
                info: record.info,
                index,
            });
        }
    }

    let mut survivors: Vec<&Candidate> = Vec::new();
    let mut anchor: Option<usize> = None;
    for candidate in candidates {
        let name = &candidate.info.name;
        if let Some(index) = records.get_index_of(name) {
            if !survivors.iter().any(|c| &c.info.name == name) {
                survivors.push(candidate);
            }
            anchor = Some(index);
            continue;
        }
        let index = anchor.map_or(0, |i| i + 1);
        let record = Record {
            info: candidate.info.clone(),
            slot: candidate.slot,
        };
        records.shift_insert(index, name.clone(), record);
        diff.events.push(ControllerEvent::Insert {
            info: candidate.info.clone(),
            index,
        });
        diff.touched.push(name.clone());
        anchor = Some(index);
    }

    for candidate in survivors {
        let name = &candidate.info.name;
        let Some((index, _, record)) = records.get_full_mut(name) else {
            continue;
        };
        let mut changed = false;
        if record.info.location != candidate.info.location {
            record.info.location = candidate.info.location.clone();
            record.slot = candidate.slot;
            diff.touched.push(name.clone());
            changed = true;
        }
        if let Some(color) = candidate.info.color
            && record.info.color != Some(color)
        {
            record.info.color = Some(color);
            changed = true;
        }
        if changed {
            diff.events.push(ControllerEvent::Update {
                info: record.info.clone(),
                index,
            });
        }
    }

    diff
}

/// A color read back from storage
#[derive(Debug, Clone)]
pub struct FetchedColor {
    pub name: String,
    pub location: PathBuf,
    pub color: ListColor,
}

/// Store fetched colors, producing an update for each record whose color is
/// newly resolved or different. Results for records that have since moved
/// or disappeared are ignored.
pub(crate) fn apply_colors(records: &mut Records, fetched: &[FetchedColor]) -> Vec<ControllerEvent> {
    let mut events = Vec::new();
    for result in fetched {
        let Some((index, _, record)) = records.get_full_mut(&result.name) else {
            continue;
        };
        if record.info.location != result.location || record.info.color == Some(result.color) {
            continue;
        }
        record.info.color = Some(result.color);
        events.push(ControllerEvent::Update {
            info: record.info.clone(),
            index,
        });
    }
    events
}

/// Replace a record's cached metadata with a caller-edited copy. Always
/// produces an update when the record exists.
pub(crate) fn apply_dirty(records: &mut Records, info: &ListInfo) -> Vec<ControllerEvent> {
    let Some((index, _, record)) = records.get_full_mut(&info.name) else {
        return Vec::new();
    };
    if info.color.is_some() {
        record.info.color = info.color;
    }
    vec![ControllerEvent::Update {
        info: record.info.clone(),
        index,
    }]
}

/// Wrap a non-empty change list in a content bracket
pub(crate) fn bracket(changes: Vec<ControllerEvent>) -> Vec<ControllerEvent> {
    if changes.is_empty() {
        return changes;
    }
    let mut events = Vec::with_capacity(changes.len() + 2);
    events.push(ControllerEvent::WillChangeContent);
    events.extend(changes);
    events.push(ControllerEvent::DidChangeContent);
    events
}
