//! Node value types for both representations of the knowledge tree.
//!
//! The server speaks in flat [`ApiNode`]s (each carrying a `parentId` and an
//! ordered list of child IDs). The client materializes them into nested
//! [`TreeNode`]s. [`NodePatch`] and [`NodeDraft`] are the partial shapes used
//! for updates and creation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// The three levels of the hierarchy. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Theme,
    Subtopic,
    Topic,
}

impl NodeKind {
    /// Returns `true` if a node of this kind may own a child of `child` kind.
    ///
    /// Themes hold subtopics and topics, subtopics hold topics, topics are
    /// leaves. Every allowed edge strictly lowers the [`rank`](Self::rank), so
    /// a tree built under this rule cannot contain a cycle.
    pub fn can_contain(self, child: NodeKind) -> bool {
        matches!(
            (self, child),
            (NodeKind::Theme, NodeKind::Subtopic)
                | (NodeKind::Theme, NodeKind::Topic)
                | (NodeKind::Subtopic, NodeKind::Topic)
        )
    }

    /// Depth class of the kind: theme 2, subtopic 1, topic 0.
    pub fn rank(self) -> u8 {
        match self {
            NodeKind::Theme => 2,
            NodeKind::Subtopic => 1,
            NodeKind::Topic => 0,
        }
    }

    pub fn is_leaf(self) -> bool {
        self == NodeKind::Topic
    }

    /// Icon given to a new node when the user picks none.
    pub fn default_icon(self) -> &'static str {
        match self {
            NodeKind::Theme => "📚",
            NodeKind::Subtopic => "📂",
            NodeKind::Topic => "💡",
        }
    }

    /// Kind of a node created under `parent`.
    ///
    /// Root-level creations are themes, children of a theme are subtopics,
    /// anything deeper is a topic.
    pub fn default_child_kind(parent: Option<NodeKind>) -> NodeKind {
        match parent {
            None => NodeKind::Theme,
            Some(NodeKind::Theme) => NodeKind::Subtopic,
            Some(_) => NodeKind::Topic,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Theme => "theme",
            NodeKind::Subtopic => "subtopic",
            NodeKind::Topic => "topic",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Ai,
}

/// A single chat message attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub role: MessageRole,
    pub text: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<String>,
}

/// An uploaded file attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Flat wire node
// ---------------------------------------------------------------------------

/// A node as the server reports it: flat, with child IDs instead of children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    /// Ordered child IDs. Used only to order materialized children.
    #[serde(default)]
    pub children: Vec<NodeId>,
    #[serde(default)]
    pub has_messages: bool,
    #[serde(default)]
    pub date_created: String,
    #[serde(default)]
    pub date_modified: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub has_summary: bool,
    #[serde(default)]
    pub has_artifacts: bool,
    #[serde(default)]
    pub has_prompt: bool,
}

// ---------------------------------------------------------------------------
// Materialized node
// ---------------------------------------------------------------------------

/// A node of the nested, client-side tree.
///
/// `messages`, `artifacts` and `prompt` stay `None` until the content is
/// fetched; the `has_*` flags say whether there is anything to fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    pub icon: String,
    pub parent_id: Option<NodeId>,
    /// Child order as last reported by the server.
    pub child_ids: Vec<NodeId>,
    pub date_created: String,
    pub date_modified: String,
    pub has_messages: bool,
    pub has_summary: bool,
    pub has_artifacts: bool,
    pub has_prompt: bool,
    pub summary: Option<String>,
    pub messages: Option<Vec<Message>>,
    pub artifacts: Option<Vec<Artifact>>,
    pub prompt: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Creates a childless node with default icon and no content.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, label: impl Into<String>) -> Self {
        TreeNode {
            id: id.into(),
            kind,
            label: label.into(),
            icon: kind.default_icon().to_string(),
            parent_id: None,
            child_ids: Vec::new(),
            date_created: String::new(),
            date_modified: String::new(),
            has_messages: false,
            has_summary: false,
            has_artifacts: false,
            has_prompt: false,
            summary: None,
            messages: None,
            artifacts: None,
            prompt: None,
            children: Vec::new(),
        }
    }

    /// Sets the parent reference (builder style, used by tests and fixtures).
    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn with_children(mut self, children: Vec<TreeNode>) -> Self {
        self.children = children;
        self
    }

    /// Converts back to the flat wire shape, keeping the server child order.
    pub fn to_api(&self) -> ApiNode {
        ApiNode {
            id: self.id.clone(),
            kind: self.kind,
            label: self.label.clone(),
            icon: self.icon.clone(),
            parent_id: self.parent_id.clone(),
            children: self.child_ids.clone(),
            has_messages: self.has_messages,
            date_created: self.date_created.clone(),
            date_modified: self.date_modified.clone(),
            summary: self.summary.clone(),
            has_summary: self.has_summary,
            has_artifacts: self.has_artifacts,
            has_prompt: self.has_prompt,
        }
    }
}

impl From<ApiNode> for TreeNode {
    fn from(api: ApiNode) -> Self {
        TreeNode {
            id: api.id,
            kind: api.kind,
            label: api.label,
            icon: api.icon,
            parent_id: api.parent_id,
            child_ids: api.children,
            date_created: api.date_created,
            date_modified: api.date_modified,
            has_messages: api.has_messages,
            has_summary: api.has_summary,
            has_artifacts: api.has_artifacts,
            has_prompt: api.has_prompt,
            summary: api.summary,
            messages: None,
            artifacts: None,
            prompt: None,
            children: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Partial shapes
// ---------------------------------------------------------------------------

/// Fields to merge into an existing node. `None` leaves the field untouched.
///
/// Identity, kind, parent and children are deliberately absent: a patch can
/// never reshape the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_messages: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_summary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_artifacts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_prompt: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
}

impl NodePatch {
    pub fn label(label: impl Into<String>) -> Self {
        NodePatch {
            label: Some(label.into()),
            ..NodePatch::default()
        }
    }

    pub fn messages(messages: Vec<Message>) -> Self {
        NodePatch {
            messages: Some(messages),
            ..NodePatch::default()
        }
    }

    /// Builds the patch a remote `node:updated` carries: every descriptive
    /// field of the server node, none of its structure. An empty icon or
    /// modification date means the server left it out and is not applied.
    pub fn from_api(api: &ApiNode) -> Self {
        NodePatch {
            label: Some(api.label.clone()),
            icon: (!api.icon.is_empty()).then(|| api.icon.clone()),
            summary: api.summary.clone(),
            has_messages: Some(api.has_messages),
            has_summary: Some(api.has_summary),
            has_artifacts: Some(api.has_artifacts),
            has_prompt: Some(api.has_prompt),
            date_modified: (!api.date_modified.is_empty()).then(|| api.date_modified.clone()),
            ..NodePatch::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == NodePatch::default()
    }

    /// Merges the set fields into `node`, leaving children untouched.
    pub fn apply_to(&self, node: &mut TreeNode) {
        if let Some(label) = &self.label {
            node.label = label.clone();
        }
        if let Some(icon) = &self.icon {
            node.icon = icon.clone();
        }
        if let Some(summary) = &self.summary {
            node.summary = Some(summary.clone());
        }
        if let Some(prompt) = &self.prompt {
            node.prompt = Some(prompt.clone());
        }
        if let Some(messages) = &self.messages {
            node.messages = Some(messages.clone());
        }
        if let Some(artifacts) = &self.artifacts {
            node.artifacts = Some(artifacts.clone());
        }
        if let Some(flag) = self.has_messages {
            node.has_messages = flag;
        }
        if let Some(flag) = self.has_summary {
            node.has_summary = flag;
        }
        if let Some(flag) = self.has_artifacts {
            node.has_artifacts = flag;
        }
        if let Some(flag) = self.has_prompt {
            node.has_prompt = flag;
        }
        if let Some(date) = &self.date_modified {
            node.date_modified = date.clone();
        }
    }
}

/// Body of a create request. The ID travels out-of-band (path segment), so
/// it is not serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDraft {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    pub icon: String,
    /// Serialized as `null` for root-level nodes.
    pub parent_id: Option<NodeId>,
    pub date_created: String,
    pub date_modified: String,
}

impl NodeDraft {
    /// The node this draft would become if the server echoed it unchanged.
    pub fn to_tree_node(&self) -> TreeNode {
        TreeNode {
            icon: self.icon.clone(),
            parent_id: self.parent_id.clone(),
            date_created: self.date_created.clone(),
            date_modified: self.date_modified.clone(),
            ..TreeNode::new(self.id.clone(), self.kind, self.label.clone())
        }
    }
}
