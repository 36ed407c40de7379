use serde::{Deserialize, Serialize};

use super::color::ListColor;
use super::item::{ItemId, ListItem};

/// A colored, ordered collection of checklist items.
///
/// `Clone` is deep: the copy owns its own items (with the same identities),
/// so mutating one list never shows through the other.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct List {
    pub color: ListColor,
    items: Vec<ListItem>,
}

impl List {
    /// Build a list. Panics if two items share an identity.
    pub fn new(color: ListColor, items: Vec<ListItem>) -> Self {
        let list = List { color, items };
        assert!(list.has_unique_ids(), "list items must have distinct identities");
        list
    }

    pub fn items(&self) -> &[ListItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn index_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn item(&self, id: ItemId) -> Option<&ListItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut ListItem> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    /// Insert at a raw storage index. Panics if the item is already present.
    pub fn insert(&mut self, index: usize, item: ListItem) {
        assert!(!self.contains(item.id()), "item {} is already in the list", item.id());
        self.items.insert(index, item);
    }

    pub fn push(&mut self, item: ListItem) {
        let index = self.items.len();
        self.insert(index, item);
    }

    /// Remove by identity, returning the item and the storage index it held
    pub fn remove(&mut self, id: ItemId) -> Option<(usize, ListItem)> {
        let index = self.index_of(id)?;
        Some((index, self.items.remove(index)))
    }

    pub fn incomplete_items(&self) -> impl Iterator<Item = &ListItem> {
        self.items.iter().filter(|item| !item.is_complete)
    }

    pub fn complete_items(&self) -> impl Iterator<Item = &ListItem> {
        self.items.iter().filter(|item| item.is_complete)
    }

    /// Stable partition: incomplete items first, then complete items, each
    /// group keeping its relative order
    pub(crate) fn group_by_completion(&mut self) {
        let (incomplete, complete): (Vec<ListItem>, Vec<ListItem>) =
            self.items.drain(..).partition(|item| !item.is_complete);
        self.items = incomplete;
        self.items.extend(complete);
    }

    /// Copy this list with brand new item identities
    pub fn duplicate(&self) -> List {
        let mut copy = self.clone();
        for item in &mut copy.items {
            item.refresh_identity();
        }
        copy
    }

    fn has_unique_ids(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.items.iter().all(|item| seen.insert(item.id()))
    }
}

/// Lists are equal when their colors match and their items match by content,
/// in order.
impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.color == other.color && self.items == other.items
    }
}

impl Eq for List {}
