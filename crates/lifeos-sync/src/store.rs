//! Shared tree state with change notification.
//!
//! [`TreeStore`] wraps the reducer state in a `tokio::sync::watch` channel.
//! Every dispatch runs the reducer under the channel's lock, so events from
//! user intents and from the push pump apply one at a time, and every
//! subscriber sees the state as of its last `changed()`.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use lifeos_core::{NodeId, Outcome, TreeEvent, TreeNode, TreeState};

/// Cheaply cloneable handle to the session's tree state.
#[derive(Clone)]
pub struct TreeStore {
    state: Arc<watch::Sender<TreeState>>,
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore {
    pub fn new() -> Self {
        Self::with_state(TreeState::default())
    }

    pub fn with_state(state: TreeState) -> Self {
        let (sender, _) = watch::channel(state);
        TreeStore {
            state: Arc::new(sender),
        }
    }

    /// Applies one event and notifies subscribers.
    ///
    /// Subscribers are woken when the event was applied. A rejected event
    /// leaves the tree untouched; the only session field it may still change
    /// is the selection (deleting an unknown but selected ID).
    pub fn dispatch(&self, event: TreeEvent) -> Outcome {
        let mut outcome = Outcome::Applied;
        self.state.send_if_modified(|state| {
            let selected_before = state.selected_id.clone();
            outcome = state.apply(event);
            outcome.is_applied() || state.selected_id != selected_before
        });
        if let Outcome::Rejected(reason) = &outcome {
            debug!(%reason, "tree event rejected");
        }
        outcome
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> TreeState {
        self.state.borrow().clone()
    }

    /// Runs `f` against the current state without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&TreeState) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn find_node(&self, id: &NodeId) -> Option<TreeNode> {
        self.read(|state| state.find_node(id).cloned())
    }

    /// A receiver that observes every applied change from now on.
    pub fn subscribe(&self) -> watch::Receiver<TreeState> {
        self.state.subscribe()
    }
}
