use std::sync::mpsc;

use super::coordinator::CoordinatorError;
use crate::model::ListInfo;

/// Receives structural changes and failures from a
/// [`ListsController`](super::ListsController). Every method defaults to a
/// no-op.
///
/// Callbacks run on the controller's worker thread, one at a time, in the
/// order the changes were applied. They may read from the controller.
pub trait ListsControllerDelegate: Send + Sync {
    fn will_change_content(&self) {}

    fn did_insert_record(&self, _info: &ListInfo, _index: usize) {}

    fn did_remove_record(&self, _info: &ListInfo, _index: usize) {}

    fn did_update_record(&self, _info: &ListInfo, _index: usize) {}

    fn did_change_content(&self) {}

    /// A create request reached the backend and failed there.
    fn did_fail_creating(&self, _name: &str, _error: &CoordinatorError) {}

    /// A remove request reached the backend and failed there.
    fn did_fail_removing(&self, _info: &ListInfo, _error: &CoordinatorError) {}
}

/// One controller notification, as an owned value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    WillChangeContent,
    Insert { info: ListInfo, index: usize },
    Remove { info: ListInfo, index: usize },
    Update { info: ListInfo, index: usize },
    DidChangeContent,
    CreateFailed { name: String, error: String },
    RemoveFailed { info: ListInfo, error: String },
}

impl ControllerEvent {
    /// Invoke the matching delegate callback. Failure events carry only the
    /// rendered error, so they are re-wrapped as backend errors.
    pub fn deliver(&self, delegate: &dyn ListsControllerDelegate) {
        match self {
            ControllerEvent::WillChangeContent => delegate.will_change_content(),
            ControllerEvent::Insert { info, index } => delegate.did_insert_record(info, *index),
            ControllerEvent::Remove { info, index } => delegate.did_remove_record(info, *index),
            ControllerEvent::Update { info, index } => delegate.did_update_record(info, *index),
            ControllerEvent::DidChangeContent => delegate.did_change_content(),
            ControllerEvent::CreateFailed { name, error } => {
                delegate.did_fail_creating(name, &CoordinatorError::Backend(error.clone()))
            }
            ControllerEvent::RemoveFailed { info, error } => {
                delegate.did_fail_removing(info, &CoordinatorError::Backend(error.clone()))
            }
        }
    }
}

/// Forward every notification into a channel. Send errors are ignored.
impl ListsControllerDelegate for mpsc::Sender<ControllerEvent> {
    fn will_change_content(&self) {
        let _ = self.send(ControllerEvent::WillChangeContent);
    }

    fn did_insert_record(&self, info: &ListInfo, index: usize) {
        let _ = self.send(ControllerEvent::Insert {
            info: info.clone(),
            index,
        });
    }

    fn did_remove_record(&self, info: &ListInfo, index: usize) {
        let _ = self.send(ControllerEvent::Remove {
            info: info.clone(),
            index,
        });
    }

    fn did_update_record(&self, info: &ListInfo, index: usize) {
        let _ = self.send(ControllerEvent::Update {
            info: info.clone(),
            index,
        });
    }

    fn did_change_content(&self) {
        let _ = self.send(ControllerEvent::DidChangeContent);
    }

    fn did_fail_creating(&self, name: &str, error: &CoordinatorError) {
        let _ = self.send(ControllerEvent::CreateFailed {
            name: name.to_string(),
            error: error.to_string(),
        });
    }

    fn did_fail_removing(&self, info: &ListInfo, error: &CoordinatorError) {
        let _ = self.send(ControllerEvent::RemoveFailed {
            info: info.clone(),
            error: error.to_string(),
        });
    }
}
