//! List presenters: the single point of mutation for one list's items.
//!
//! A [`ListPresenter`] owns a [`List`] and exposes it as an ordered
//! "presented" sequence shaped by a [`PresentationPolicy`]. Every mutation is
//! translated into the minimal set of ordered notifications for its
//! [`ListPresenterDelegate`].

mod delegate;
mod layout;

pub use delegate::{ListPresenterDelegate, PresenterEvent};
pub use layout::PresentationPolicy;

use std::sync::{Arc, Mutex};

use layout::Layout;

use crate::model::{ItemId, List, ListColor, ListItem};
use crate::util::sync::lock;

/// A thread-safe presenter over one list.
///
/// Calls from any number of threads are applied one at a time, and the
/// notifications of one call are delivered in full before the next call's
/// begin. Operations on an item that does not belong to the current list
/// (other than [`remove_item`](Self::remove_item)) panic.
pub struct ListPresenter {
    layout: Mutex<Layout>,
    delegate: Mutex<Option<Arc<dyn ListPresenterDelegate>>>,
    /// Held for the whole of mutate-then-deliver so batches never interleave
    delivery: Mutex<()>,
}

impl ListPresenter {
    pub fn new(policy: PresentationPolicy) -> Self {
        ListPresenter {
            layout: Mutex::new(Layout::new(policy)),
            delegate: Mutex::new(None),
            delivery: Mutex::new(()),
        }
    }

    /// Create a presenter already showing `list`. No notification is sent.
    pub fn with_list(policy: PresentationPolicy, list: List) -> Self {
        let presenter = ListPresenter::new(policy);
        lock(&presenter.layout).set_list(list);
        presenter
    }

    pub fn set_delegate(&self, delegate: Option<Arc<dyn ListPresenterDelegate>>) {
        let _delivery = lock(&self.delivery);
        *lock(&self.delegate) = delegate;
    }

    pub fn policy(&self) -> PresentationPolicy {
        lock(&self.layout).policy()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn count(&self) -> usize {
        lock(&self.layout).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Snapshot of the presented items, in presented order
    pub fn presented_items(&self) -> Vec<ListItem> {
        lock(&self.layout).presented_items()
    }

    pub fn color(&self) -> ListColor {
        lock(&self.layout).list().color
    }

    /// Snapshot of the whole backing list, hidden items included
    pub fn list(&self) -> List {
        lock(&self.layout).list().clone()
    }

    pub fn item(&self, id: ItemId) -> Option<ListItem> {
        lock(&self.layout).list().item(id).cloned()
    }

    pub fn has_item(&self, id: ItemId) -> bool {
        lock(&self.layout).list().contains(id)
    }

    pub fn presented_index(&self, id: ItemId) -> Option<usize> {
        lock(&self.layout).presented_index(id)
    }

    /// Whether `move_item(id, to)` would be accepted
    pub fn can_move_item(&self, id: ItemId, to: usize) -> bool {
        lock(&self.layout).can_move_item(id, to)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Replace the backing list. Sends one complete-refresh notification.
    pub fn set_list(&self, list: List) {
        self.apply(|layout| ((), layout.set_list(list)));
    }

    pub fn insert_item(&self, item: ListItem) {
        self.insert_items(vec![item]);
    }

    /// Insert several items in one bracket. Each incomplete item is inserted
    /// at the head, so the last one ends up first.
    pub fn insert_items(&self, items: Vec<ListItem>) {
        self.apply(|layout| ((), layout.insert_items(items)));
    }

    /// Remove an item. Does nothing if the item is not currently presented.
    pub fn remove_item(&self, id: ItemId) {
        self.remove_items(&[id]);
    }

    pub fn remove_items(&self, ids: &[ItemId]) {
        self.apply(|layout| ((), layout.remove_items(ids)));
    }

    pub fn update_item(&self, id: ItemId, text: impl Into<String>) {
        let text = text.into();
        self.apply(|layout| ((), layout.update_item(id, text)));
    }

    pub fn toggle_item(&self, id: ItemId) {
        self.apply(|layout| ((), layout.toggle_item(id)));
    }

    /// Mark every presented item complete (or incomplete) in one bracket
    pub fn update_presented_items_to_completion_state(&self, complete: bool) {
        self.apply(|layout| ((), layout.update_presented_items_to_completion_state(complete)));
    }

    /// Move an item within its group. Returns `false`, and changes nothing,
    /// if the destination is outside the range the item may occupy.
    pub fn move_item(&self, id: ItemId, to: usize) -> bool {
        self.apply(|layout| layout.move_item(id, to))
    }

    pub fn set_color(&self, color: ListColor) {
        self.apply(|layout| ((), layout.set_color(color)));
    }

    fn apply<R>(&self, f: impl FnOnce(&mut Layout) -> (R, Vec<PresenterEvent>)) -> R {
        let _delivery = lock(&self.delivery);
        let (result, events) = {
            let mut layout = lock(&self.layout);
            f(&mut layout)
        };
        if events.is_empty() {
            return result;
        }
        let delegate = lock(&self.delegate).clone();
        if let Some(delegate) = delegate {
            for event in &events {
                event.deliver(delegate.as_ref());
            }
        }
        result
    }
}

impl std::fmt::Debug for ListPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListPresenter")
            .field("layout", &*lock(&self.layout))
            .finish_non_exhaustive()
    }
}
