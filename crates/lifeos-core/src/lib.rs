//! Client-side knowledge tree model and synchronization core for Life OS.
//!
//! The server hands out a flat list of nodes; [`builder::build_tree`] turns it
//! into the nested tree the client works with, and [`state::TreeState`] owns
//! that tree together with the UI-session fields (selection, expansion,
//! loading, error). Every change goes through [`state::TreeState::apply`],
//! which is synchronous and reports an [`state::Outcome`].

pub mod builder;
pub mod error;
pub mod id;
pub mod node;
pub mod state;
pub mod tree;

// Re-export commonly used types
pub use builder::build_tree;
pub use error::CoreError;
pub use id::NodeId;
pub use node::{ApiNode, Artifact, Message, MessageRole, NodeDraft, NodeKind, NodePatch, TreeNode};
pub use state::{Outcome, TreeEvent, TreeState};
