//! Core error types for lifeos-core.
//!
//! Uses `thiserror` for structured, matchable variants. These are never
//! raised out of the reducer; they travel inside [`crate::state::Outcome`]
//! so that a rejected transition is observable without being fatal.

use thiserror::Error;

use crate::id::NodeId;
use crate::node::NodeKind;

/// Reasons a tree transition was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The node targeted by an update, delete or move does not exist.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// The parent named by an add or move does not exist.
    #[error("parent not found: {id}")]
    ParentNotFound { id: NodeId },

    /// A node with this ID is already part of the tree.
    #[error("duplicate node id: {id}")]
    DuplicateNode { id: NodeId },

    /// The parent's kind may not contain the child's kind.
    #[error("a {parent} cannot contain a {child}")]
    InvalidHierarchy { parent: NodeKind, child: NodeKind },

    /// A node cannot be moved underneath itself or one of its descendants.
    #[error("cannot move {id} into its own subtree (target {target})")]
    MoveIntoSubtree { id: NodeId, target: NodeId },
}
