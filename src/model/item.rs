use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a list item.
///
/// Two items with the same text and completion state are still distinct
/// entities; presenters index and move items by this id, never by content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    /// Allocate a fresh id
    pub fn next() -> ItemId {
        ItemId(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single checklist entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItem {
    /// Identity, assigned at creation and kept across clones
    #[serde(skip, default = "ItemId::next")]
    id: ItemId,
    pub text: String,
    pub is_complete: bool,
}

impl ListItem {
    /// Create a new incomplete item with a fresh identity
    pub fn new(text: impl Into<String>) -> Self {
        ListItem::with_state(text, false)
    }

    pub fn with_state(text: impl Into<String>, is_complete: bool) -> Self {
        ListItem {
            id: ItemId::next(),
            text: text.into(),
            is_complete,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    /// True if both values refer to the same logical item, regardless of content
    pub fn is_same_item(&self, other: &ListItem) -> bool {
        self.id == other.id
    }

    /// Give this item a brand new identity (used when duplicating content into
    /// a list that must not share identities with its source)
    pub fn refresh_identity(&mut self) {
        self.id = ItemId::next();
    }
}

/// Content equality: text and completion state, not identity.
impl PartialEq for ListItem {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.is_complete == other.is_complete
    }
}

impl Eq for ListItem {}
