//! The tree reducer: canonical tree plus UI-session state.
//!
//! [`TreeState`] is the single owner of the materialized tree and of the
//! session fields (selection, expansion, loading, error). Every change is a
//! [`TreeEvent`] fed to [`TreeState::apply`], which runs to completion
//! synchronously and reports an [`Outcome`].
//!
//! Structural events are validated before anything is touched, so a
//! rejected event leaves the tree exactly as it was. Rejections are reported
//! instead of raised: a push event for a node this client never saw is
//! routine, not a fault.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::NodeId;
use crate::node::{Message, NodePatch, TreeNode};
use crate::tree;

/// Result of applying one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Nothing in the tree changed; the reason says why.
    Rejected(CoreError),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    pub fn rejection(&self) -> Option<&CoreError> {
        match self {
            Outcome::Applied => None,
            Outcome::Rejected(err) => Some(err),
        }
    }
}

/// Every transition the reducer accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent {
    /// Replace the tree wholesale; clears error and loading.
    SetTree(Vec<TreeNode>),
    SetLoading(bool),
    /// Set (or clear) the session error; clears loading.
    SetError(Option<String>),
    SelectNode(Option<NodeId>),
    /// Flip one expansion flag (absent counts as collapsed).
    ToggleExpand(NodeId),
    SetExpanded(BTreeMap<NodeId, bool>),
    /// Append `node` under `parent_id`, or at root level when `None`.
    AddNode {
        parent_id: Option<NodeId>,
        node: TreeNode,
    },
    /// Merge fields into an existing node, keeping its children.
    UpdateNode { id: NodeId, patch: NodePatch },
    /// Remove a node and its whole subtree.
    DeleteNode(NodeId),
    UpdateMessages { id: NodeId, messages: Vec<Message> },
    /// Re-attach a subtree under another parent (or at root level).
    MoveNode {
        id: NodeId,
        new_parent: Option<NodeId>,
    },
}

/// Canonical client state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeState {
    pub tree: Vec<TreeNode>,
    pub selected_id: Option<NodeId>,
    pub expanded: BTreeMap<NodeId, bool>,
    pub loading: bool,
    pub error: Option<String>,
}

impl TreeState {
    pub fn new() -> Self {
        TreeState::default()
    }

    /// Applies one event in place.
    pub fn apply(&mut self, event: TreeEvent) -> Outcome {
        match event {
            TreeEvent::SetTree(nodes) => {
                self.tree = nodes;
                self.loading = false;
                self.error = None;
                Outcome::Applied
            }
            TreeEvent::SetLoading(loading) => {
                self.loading = loading;
                Outcome::Applied
            }
            TreeEvent::SetError(error) => {
                self.error = error;
                self.loading = false;
                Outcome::Applied
            }
            TreeEvent::SelectNode(id) => {
                self.selected_id = id;
                Outcome::Applied
            }
            TreeEvent::ToggleExpand(id) => {
                let open = self.expanded.entry(id).or_insert(false);
                *open = !*open;
                Outcome::Applied
            }
            TreeEvent::SetExpanded(expanded) => {
                self.expanded = expanded;
                Outcome::Applied
            }
            TreeEvent::AddNode { parent_id, node } => self.add_node(parent_id, node),
            TreeEvent::UpdateNode { id, patch } => self.update_node(&id, &patch),
            TreeEvent::DeleteNode(id) => self.delete_node(&id),
            TreeEvent::UpdateMessages { id, messages } => {
                self.update_node(&id, &NodePatch::messages(messages))
            }
            TreeEvent::MoveNode { id, new_parent } => self.move_node(&id, new_parent),
        }
    }

    /// Applies one event to a copy, leaving `self` untouched.
    pub fn reduce(&self, event: TreeEvent) -> (TreeState, Outcome) {
        let mut next = self.clone();
        let outcome = next.apply(event);
        (next, outcome)
    }

    pub fn find_node(&self, id: &NodeId) -> Option<&TreeNode> {
        tree::find_node(&self.tree, id)
    }

    pub fn selected_node(&self) -> Option<&TreeNode> {
        self.selected_id.as_ref().and_then(|id| self.find_node(id))
    }

    pub fn is_expanded(&self, id: &NodeId) -> bool {
        self.expanded.get(id).copied().unwrap_or(false)
    }

    fn add_node(&mut self, parent_id: Option<NodeId>, mut node: TreeNode) -> Outcome {
        if tree::contains(&self.tree, &node.id) {
            return Outcome::Rejected(CoreError::DuplicateNode { id: node.id });
        }
        let Some(parent_id) = parent_id else {
            node.parent_id = None;
            self.tree.push(node);
            return Outcome::Applied;
        };
        let Some(parent) = tree::find_node_mut(&mut self.tree, &parent_id) else {
            return Outcome::Rejected(CoreError::ParentNotFound { id: parent_id });
        };
        if !parent.kind.can_contain(node.kind) {
            return Outcome::Rejected(CoreError::InvalidHierarchy {
                parent: parent.kind,
                child: node.kind,
            });
        }
        node.parent_id = Some(parent_id);
        parent.children.push(node);
        Outcome::Applied
    }

    fn update_node(&mut self, id: &NodeId, patch: &NodePatch) -> Outcome {
        match tree::find_node_mut(&mut self.tree, id) {
            Some(node) => {
                patch.apply_to(node);
                Outcome::Applied
            }
            None => Outcome::Rejected(CoreError::NodeNotFound { id: id.clone() }),
        }
    }

    fn delete_node(&mut self, id: &NodeId) -> Outcome {
        if self.selected_id.as_ref() == Some(id) {
            self.selected_id = None;
        }
        match tree::remove_node(&mut self.tree, id) {
            Some(_) => Outcome::Applied,
            None => Outcome::Rejected(CoreError::NodeNotFound { id: id.clone() }),
        }
    }

    fn move_node(&mut self, id: &NodeId, new_parent: Option<NodeId>) -> Outcome {
        let Some(node) = tree::find_node(&self.tree, id) else {
            return Outcome::Rejected(CoreError::NodeNotFound { id: id.clone() });
        };
        if let Some(target) = &new_parent {
            if tree::contains(std::slice::from_ref(node), target) {
                return Outcome::Rejected(CoreError::MoveIntoSubtree {
                    id: id.clone(),
                    target: target.clone(),
                });
            }
            let Some(parent) = tree::find_node(&self.tree, target) else {
                return Outcome::Rejected(CoreError::ParentNotFound { id: target.clone() });
            };
            if !parent.kind.can_contain(node.kind) {
                return Outcome::Rejected(CoreError::InvalidHierarchy {
                    parent: parent.kind,
                    child: node.kind,
                });
            }
        }

        // Validated above; detach and re-attach cannot fail from here on.
        let Some(mut node) = tree::remove_node(&mut self.tree, id) else {
            return Outcome::Rejected(CoreError::NodeNotFound { id: id.clone() });
        };
        node.parent_id = new_parent.clone();
        if let Some(parent_id) = &new_parent {
            if let Some(parent) = tree::find_node_mut(&mut self.tree, parent_id) {
                parent.children.push(node);
                return Outcome::Applied;
            }
        }
        self.tree.push(node);
        Outcome::Applied
    }
}
