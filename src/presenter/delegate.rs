use std::sync::mpsc;

use crate::model::{ListColor, ListItem};

/// Receives change notifications from a [`ListPresenter`](super::ListPresenter).
///
/// Structural changes arrive bracketed by `will_change_layout` /
/// `did_change_layout`, with per-item events in between. A complete refresh
/// and color changes arrive on their own. Every method defaults to a no-op.
///
/// Callbacks run on the thread that performed the mutation. They may read
/// from the presenter but must not mutate it.
pub trait ListPresenterDelegate: Send + Sync {
    /// The whole presented view was replaced; redraw from scratch.
    fn did_refresh_complete_layout(&self) {}

    fn will_change_layout(&self, _is_initial: bool) {}

    fn did_insert_item(&self, _item: &ListItem, _index: usize) {}

    fn did_remove_item(&self, _item: &ListItem, _index: usize) {}

    fn did_update_item(&self, _item: &ListItem, _index: usize) {}

    fn did_move_item(&self, _item: &ListItem, _from: usize, _to: usize) {}

    fn did_update_list_color(&self, _color: ListColor) {}

    fn did_change_layout(&self, _is_initial: bool) {}
}

/// One presenter notification, as an owned value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterEvent {
    RefreshCompleteLayout,
    WillChangeLayout { is_initial: bool },
    Insert { item: ListItem, index: usize },
    Remove { item: ListItem, index: usize },
    Update { item: ListItem, index: usize },
    Move { item: ListItem, from: usize, to: usize },
    UpdateColor(ListColor),
    DidChangeLayout { is_initial: bool },
}

impl PresenterEvent {
    /// Invoke the matching delegate callback
    pub fn deliver(&self, delegate: &dyn ListPresenterDelegate) {
        match self {
            PresenterEvent::RefreshCompleteLayout => delegate.did_refresh_complete_layout(),
            PresenterEvent::WillChangeLayout { is_initial } => {
                delegate.will_change_layout(*is_initial)
            }
            PresenterEvent::Insert { item, index } => delegate.did_insert_item(item, *index),
            PresenterEvent::Remove { item, index } => delegate.did_remove_item(item, *index),
            PresenterEvent::Update { item, index } => delegate.did_update_item(item, *index),
            PresenterEvent::Move { item, from, to } => delegate.did_move_item(item, *from, *to),
            PresenterEvent::UpdateColor(color) => delegate.did_update_list_color(*color),
            PresenterEvent::DidChangeLayout { is_initial } => {
                delegate.did_change_layout(*is_initial)
            }
        }
    }
}

/// Forward every notification into a channel, e.g. to a UI event loop.
/// Send errors (receiver gone) are ignored.
impl ListPresenterDelegate for mpsc::Sender<PresenterEvent> {
    fn did_refresh_complete_layout(&self) {
        let _ = self.send(PresenterEvent::RefreshCompleteLayout);
    }

    fn will_change_layout(&self, is_initial: bool) {
        let _ = self.send(PresenterEvent::WillChangeLayout { is_initial });
    }

    fn did_insert_item(&self, item: &ListItem, index: usize) {
        let _ = self.send(PresenterEvent::Insert {
            item: item.clone(),
            index,
        });
    }

    fn did_remove_item(&self, item: &ListItem, index: usize) {
        let _ = self.send(PresenterEvent::Remove {
            item: item.clone(),
            index,
        });
    }

    fn did_update_item(&self, item: &ListItem, index: usize) {
        let _ = self.send(PresenterEvent::Update {
            item: item.clone(),
            index,
        });
    }

    fn did_move_item(&self, item: &ListItem, from: usize, to: usize) {
        let _ = self.send(PresenterEvent::Move {
            item: item.clone(),
            from,
            to,
        });
    }

    fn did_update_list_color(&self, color: ListColor) {
        let _ = self.send(PresenterEvent::UpdateColor(color));
    }

    fn did_change_layout(&self, is_initial: bool) {
        let _ = self.send(PresenterEvent::DidChangeLayout { is_initial });
    }
}
