use serde::Serialize;

use crate::controller::ControllerEvent;
use crate::model::{ListColor, ListInfo, ListItem};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ListInfoJson {
    pub name: String,
    pub color: ListColor,
    pub path: String,
}

#[derive(Serialize)]
pub struct ItemJson {
    /// 1-based position in the printed view
    pub number: usize,
    pub text: String,
    pub done: bool,
}

#[derive(Serialize)]
pub struct ListJson {
    pub name: String,
    pub color: ListColor,
    pub items: Vec<ItemJson>,
    /// Items hidden by the current view
    #[serde(skip_serializing_if = "is_zero")]
    pub hidden: usize,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum WatchEventJson {
    Inserted { name: String, index: usize },
    Removed { name: String, index: usize },
    Updated {
        name: String,
        index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<ListColor>,
    },
    CreateFailed { name: String, error: String },
    RemoveFailed { name: String, error: String },
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn info_to_json(info: &ListInfo) -> ListInfoJson {
    ListInfoJson {
        name: info.name.clone(),
        color: info.color.unwrap_or_default(),
        path: info.location.display().to_string(),
    }
}

pub fn items_to_json(items: &[ListItem]) -> Vec<ItemJson> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| ItemJson {
            number: i + 1,
            text: item.text.clone(),
            done: item.is_complete,
        })
        .collect()
}

/// Watch output for one controller event. Content brackets have no output.
pub fn event_to_json(event: &ControllerEvent) -> Option<WatchEventJson> {
    let json = match event {
        ControllerEvent::WillChangeContent | ControllerEvent::DidChangeContent => return None,
        ControllerEvent::Insert { info, index } => WatchEventJson::Inserted {
            name: info.name.clone(),
            index: *index,
        },
        ControllerEvent::Remove { info, index } => WatchEventJson::Removed {
            name: info.name.clone(),
            index: *index,
        },
        ControllerEvent::Update { info, index } => WatchEventJson::Updated {
            name: info.name.clone(),
            index: *index,
            color: info.color,
        },
        ControllerEvent::CreateFailed { name, error } => WatchEventJson::CreateFailed {
            name: name.clone(),
            error: error.clone(),
        },
        ControllerEvent::RemoveFailed { info, error } => WatchEventJson::RemoveFailed {
            name: info.name.clone(),
            error: error.clone(),
        },
    };
    Some(json)
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// `  1 [ ] buy milk`, numbered from 1, one line per item
pub fn format_items(items: &[ListItem]) -> Vec<String> {
    let width = items.len().to_string().len();
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format_item(i + 1, item, width))
        .collect()
}

/// One item line. Embedded line breaks are shown escaped so every item
/// stays on one line.
pub fn format_item(number: usize, item: &ListItem, width: usize) -> String {
    let check = if item.is_complete { 'x' } else { ' ' };
    format!(
        "{:>width$} [{}] {}",
        number,
        check,
        crate::parse::list_serializer::escape(&item.text),
        width = width
    )
}

/// `Groceries  green`, names padded to a common width
pub fn format_lists(infos: &[ListInfo]) -> Vec<String> {
    let width = infos.iter().map(|i| i.name.chars().count()).max().unwrap_or(0);
    infos
        .iter()
        .map(|info| {
            format!(
                "{:<width$}  {}",
                info.name,
                info.color.unwrap_or_default(),
                width = width
            )
        })
        .collect()
}

pub fn format_event(event: &ControllerEvent) -> Option<String> {
    let line = match event {
        ControllerEvent::WillChangeContent | ControllerEvent::DidChangeContent => return None,
        ControllerEvent::Insert { info, index } => format!("+ {} (at {})", info.name, index + 1),
        ControllerEvent::Remove { info, index } => format!("- {} (was {})", info.name, index + 1),
        ControllerEvent::Update { info, .. } => match info.color {
            Some(color) => format!("~ {} ({})", info.name, color),
            None => format!("~ {}", info.name),
        },
        ControllerEvent::CreateFailed { name, error } => {
            format!("! could not create {}: {}", name, error)
        }
        ControllerEvent::RemoveFailed { info, error } => {
            format!("! could not remove {}: {}", info.name, error)
        }
    };
    Some(line)
}
