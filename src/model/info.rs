use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::color::ListColor;

/// Lightweight metadata for a stored list, available without loading its items.
///
/// Equality is by `name` only: two records with the same name are the same
/// logical list even while they live at different locations or before either
/// color has been fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListInfo {
    pub name: String,
    /// `None` until the list's content has been read
    pub color: Option<ListColor>,
    pub location: PathBuf,
}

impl ListInfo {
    /// Build a record for a storage location, deriving the display name
    pub fn from_location(location: impl Into<PathBuf>) -> Self {
        let location = location.into();
        ListInfo {
            name: name_from_location(&location),
            color: None,
            location,
        }
    }

    pub fn with_color(mut self, color: ListColor) -> Self {
        self.color = Some(color);
        self
    }

    pub fn is_color_resolved(&self) -> bool {
        self.color.is_some()
    }
}

impl PartialEq for ListInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ListInfo {}

impl std::hash::Hash for ListInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Display name for a location: the file name without its extension
/// (`lists/Groceries.list` → `Groceries`).
pub fn name_from_location(location: &Path) -> String {
    location
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}
