//! Local change notifications
//!
//! Writes that commit successfully are announced to every subscriber of the
//! same handle. Notifications never cross handles or processes.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::mpsc;
use serde::Serialize;
use serde_json::Value;

/// Stream of changes returned by [`crate::KvStore::subscribe`].
pub type ChangeStream = mpsc::UnboundedReceiver<Change>;

/// A committed write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Change {
    Set { key: String, value: Value },
    Add { key: String, value: Value },
    Remove { key: String },
    Clear,
}

#[derive(Clone, Default)]
pub(crate) struct Notifier {
    subscribers: Rc<RefCell<Vec<mpsc::UnboundedSender<Change>>>>,
}

impl Notifier {
    pub(crate) fn subscribe(&self) -> ChangeStream {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.borrow_mut().push(tx);
        rx
    }

    /// Deliver to live subscribers, pruning the ones that hung up.
    pub(crate) fn emit(&self, change: Change) {
        self.subscribers
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(change.clone()).is_ok());
    }

    /// End every stream.
    pub(crate) fn close(&self) {
        self.subscribers.borrow_mut().clear();
    }
}
