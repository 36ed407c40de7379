use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::delegate::PresenterEvent;
use crate::model::{ItemId, List, ListColor, ListItem};

/// Which items a presenter shows, and in what order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresentationPolicy {
    /// Every item; incomplete items first, then complete items.
    #[default]
    ShowAllGrouped,
    /// Only incomplete items, in list order.
    IncompleteOnly,
}

/// The presenter's state without any locking or delivery: the owned list and
/// the rules that map it to a presented sequence. Every mutation returns the
/// notifications it produced, in order.
///
/// Under `ShowAllGrouped` the list's storage order *is* the presented order
/// (kept grouped). Under `IncompleteOnly` the presented order is the storage
/// order filtered to incomplete items.
#[derive(Debug)]
pub(crate) struct Layout {
    policy: PresentationPolicy,
    list: List,
}

impl Layout {
    pub fn new(policy: PresentationPolicy) -> Self {
        Layout {
            policy,
            list: List::default(),
        }
    }

    pub fn policy(&self) -> PresentationPolicy {
        self.policy
    }

    pub fn list(&self) -> &List {
        &self.list
    }

    pub fn count(&self) -> usize {
        match self.policy {
            PresentationPolicy::ShowAllGrouped => self.list.len(),
            PresentationPolicy::IncompleteOnly => self.list.incomplete_items().count(),
        }
    }

    pub fn presented_items(&self) -> Vec<ListItem> {
        match self.policy {
            PresentationPolicy::ShowAllGrouped => self.list.items().to_vec(),
            PresentationPolicy::IncompleteOnly => self.list.incomplete_items().cloned().collect(),
        }
    }

    pub fn presented_index(&self, id: ItemId) -> Option<usize> {
        match self.policy {
            PresentationPolicy::ShowAllGrouped => self.list.index_of(id),
            PresentationPolicy::IncompleteOnly => {
                self.list.incomplete_items().position(|item| item.id() == id)
            }
        }
    }

    pub fn set_list(&mut self, mut list: List) -> Vec<PresenterEvent> {
        if self.policy == PresentationPolicy::ShowAllGrouped {
            list.group_by_completion();
        }
        self.list = list;
        vec![PresenterEvent::RefreshCompleteLayout]
    }

    pub fn set_color(&mut self, color: ListColor) -> Vec<PresenterEvent> {
        self.list.color = color;
        vec![PresenterEvent::UpdateColor(color)]
    }

    /// Panics, before inserting anything, if an item is already in the list
    /// or appears twice in `items`.
    pub fn insert_items(&mut self, items: Vec<ListItem>) -> Vec<PresenterEvent> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            assert!(
                !self.list.contains(item.id()) && seen.insert(item.id()),
                "item {} is already in the list",
                item.id()
            );
        }
        self.batch(|layout, changes| {
            for item in items {
                layout.insert_one(item, changes);
            }
        })
    }

    pub fn remove_items(&mut self, ids: &[ItemId]) -> Vec<PresenterEvent> {
        self.batch(|layout, changes| {
            for &id in ids {
                if let Some(index) = layout.presented_index(id)
                    && let Some((_, item)) = layout.list.remove(id)
                {
                    changes.push(PresenterEvent::Remove { item, index });
                }
            }
        })
    }

    pub fn update_item(&mut self, id: ItemId, text: String) -> Vec<PresenterEvent> {
        self.batch(|layout, changes| {
            let (storage_index, mut item) = layout.take_item(id);
            item.text = text;
            layout.list.insert(storage_index, item.clone());
            if let Some(index) = layout.presented_index(id) {
                changes.push(PresenterEvent::Update { item, index });
            }
        })
    }

    pub fn toggle_item(&mut self, id: ItemId) -> Vec<PresenterEvent> {
        self.batch(|layout, changes| layout.toggle_one(id, changes))
    }

    /// Toggle every presented item whose state differs from `complete`, in
    /// presented order, as one batch.
    pub fn update_presented_items_to_completion_state(
        &mut self,
        complete: bool,
    ) -> Vec<PresenterEvent> {
        let ids: Vec<ItemId> = self
            .presented_items()
            .iter()
            .filter(|item| item.is_complete != complete)
            .map(ListItem::id)
            .collect();
        self.batch(|layout, changes| {
            for id in ids {
                layout.toggle_one(id, changes);
            }
        })
    }

    pub fn can_move_item(&self, id: ItemId, to: usize) -> bool {
        let item = self.expect_item(id);
        if self.presented_index(id).is_none() {
            return false;
        }
        match self.policy {
            PresentationPolicy::ShowAllGrouped => {
                let incomplete = self.list.incomplete_items().count();
                if item.is_complete {
                    to >= incomplete && to < self.list.len()
                } else {
                    to < incomplete
                }
            }
            PresentationPolicy::IncompleteOnly => to < self.count(),
        }
    }

    /// Returns whether the move was accepted. Moving onto the current index
    /// is accepted and produces no events.
    pub fn move_item(&mut self, id: ItemId, to: usize) -> (bool, Vec<PresenterEvent>) {
        if !self.can_move_item(id, to) {
            return (false, Vec::new());
        }
        let Some(from) = self.presented_index(id) else {
            return (false, Vec::new());
        };
        if from == to {
            return (true, Vec::new());
        }
        let events = self.batch(|layout, changes| {
            let (_, item) = layout.take_item(id);
            let storage_index = match layout.policy {
                PresentationPolicy::ShowAllGrouped => to,
                PresentationPolicy::IncompleteOnly => layout.storage_index_for_presented(to),
            };
            layout.list.insert(storage_index, item.clone());
            changes.push(PresenterEvent::Move { item, from, to });
        });
        (true, events)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Run `f`, wrapping whatever it produced in a layout bracket. A batch
    /// that changes nothing produces no events at all.
    fn batch(
        &mut self,
        f: impl FnOnce(&mut Self, &mut Vec<PresenterEvent>),
    ) -> Vec<PresenterEvent> {
        let is_initial = self.count() == 0;
        let mut changes = Vec::new();
        f(self, &mut changes);
        if changes.is_empty() {
            return changes;
        }
        let mut events = Vec::with_capacity(changes.len() + 2);
        events.push(PresenterEvent::WillChangeLayout { is_initial });
        events.extend(changes);
        events.push(PresenterEvent::DidChangeLayout { is_initial });
        events
    }

    fn insert_one(&mut self, item: ListItem, changes: &mut Vec<PresenterEvent>) {
        match (self.policy, item.is_complete) {
            (_, false) => {
                self.list.insert(0, item.clone());
                changes.push(PresenterEvent::Insert { item, index: 0 });
            }
            (PresentationPolicy::ShowAllGrouped, true) => {
                let index = self.list.len();
                self.list.push(item.clone());
                changes.push(PresenterEvent::Insert { item, index });
            }
            // Stored, but not shown
            (PresentationPolicy::IncompleteOnly, true) => self.list.push(item),
        }
    }

    fn toggle_one(&mut self, id: ItemId, changes: &mut Vec<PresenterEvent>) {
        let was_presented_at = self.presented_index(id);
        let (storage_index, mut item) = self.take_item(id);
        item.is_complete = !item.is_complete;

        match self.policy {
            PresentationPolicy::ShowAllGrouped => {
                let from = storage_index;
                // Completed items go to the tail, reactivated items lead.
                let to = if item.is_complete { self.list.len() } else { 0 };
                self.list.insert(to, item.clone());
                if from != to {
                    changes.push(PresenterEvent::Move {
                        item: item.clone(),
                        from,
                        to,
                    });
                }
                changes.push(PresenterEvent::Update { item, index: to });
            }
            PresentationPolicy::IncompleteOnly => {
                self.list.insert(storage_index, item.clone());
                if item.is_complete {
                    if let Some(index) = was_presented_at {
                        changes.push(PresenterEvent::Remove { item, index });
                    }
                } else if let Some(index) = self.presented_index(id) {
                    changes.push(PresenterEvent::Insert { item, index });
                }
            }
        }
    }

    /// Storage index at which an item must be inserted to appear at presented
    /// index `to` (incomplete-only policy, item already taken out).
    fn storage_index_for_presented(&self, to: usize) -> usize {
        let presented: Vec<usize> = self
            .list
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.is_complete)
            .map(|(index, _)| index)
            .collect();
        match presented.get(to) {
            Some(&index) => index,
            None => presented.last().map_or(0, |&index| index + 1),
        }
    }

    fn expect_item(&self, id: ItemId) -> &ListItem {
        self.list
            .item(id)
            .unwrap_or_else(|| panic!("item {} is not part of the presented list", id))
    }

    fn take_item(&mut self, id: ItemId) -> (usize, ListItem) {
        self.list
            .remove(id)
            .unwrap_or_else(|| panic!("item {} is not part of the presented list", id))
    }
}
