//! Traversal, lookup and structural edit helpers over a root sequence.
//!
//! All searches are depth-first and linear in tree size. The trees are a
//! personal knowledge base, so nothing here is indexed.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::id::NodeId;
use crate::node::{ApiNode, TreeNode};

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Finds the node with `id` anywhere in the tree.
pub fn find_node<'a>(nodes: &'a [TreeNode], id: &NodeId) -> Option<&'a TreeNode> {
    for node in nodes {
        if &node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node(&node.children, id) {
            return Some(found);
        }
    }
    None
}

pub fn find_node_mut<'a>(nodes: &'a mut [TreeNode], id: &NodeId) -> Option<&'a mut TreeNode> {
    for node in nodes {
        if &node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

pub fn contains(nodes: &[TreeNode], id: &NodeId) -> bool {
    find_node(nodes, id).is_some()
}

/// Returns the path from a root down to the node with `id`, inclusive.
pub fn ancestors<'a>(nodes: &'a [TreeNode], id: &NodeId) -> Option<Vec<&'a TreeNode>> {
    for node in nodes {
        if &node.id == id {
            return Some(vec![node]);
        }
        if let Some(mut path) = ancestors(&node.children, id) {
            path.insert(0, node);
            return Some(path);
        }
    }
    None
}

/// Total number of nodes, all levels.
pub fn count(nodes: &[TreeNode]) -> usize {
    walk(nodes).count()
}

// ---------------------------------------------------------------------------
// Iteration
// ---------------------------------------------------------------------------

/// Pre-order iterator over every node of a root sequence.
pub struct Walk<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

pub fn walk(nodes: &[TreeNode]) -> Walk<'_> {
    Walk {
        stack: nodes.iter().rev().collect(),
    }
}

/// Flattens the tree back into the server's wire shape, pre-order.
///
/// Child ordering lists are carried over as reported, so building the
/// result again yields the same tree.
pub fn flatten(nodes: &[TreeNode]) -> Vec<ApiNode> {
    walk(nodes).map(TreeNode::to_api).collect()
}

// ---------------------------------------------------------------------------
// Structural edits
// ---------------------------------------------------------------------------

/// Removes the node with `id` (root or nested) together with its subtree.
pub fn remove_node(nodes: &mut Vec<TreeNode>, id: &NodeId) -> Option<TreeNode> {
    if let Some(position) = nodes.iter().position(|n| &n.id == id) {
        return Some(nodes.remove(position));
    }
    nodes
        .iter_mut()
        .find_map(|node| remove_node(&mut node.children, id))
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// A summary found somewhere below a node.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    pub id: NodeId,
    pub label: String,
    pub summary: String,
    pub date_modified: String,
}

/// Collects the summaries of every descendant of `node`, newest first.
/// Undated entries go last.
pub fn summaries_under(node: &TreeNode) -> Vec<SummaryEntry> {
    let mut entries: Vec<SummaryEntry> = walk(&node.children)
        .filter_map(|n| {
            let summary = n.summary.as_ref().filter(|s| !s.is_empty())?;
            Some(SummaryEntry {
                id: n.id.clone(),
                label: n.label.clone(),
                summary: summary.clone(),
                date_modified: n.date_modified.clone(),
            })
        })
        .collect();
    entries.sort_by(|a, b| {
        match (a.date_modified.is_empty(), b.date_modified.is_empty()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => b.date_modified.cmp(&a.date_modified),
        }
    });
    entries
}

/// Renders an indented outline. Collapsed nodes hide their children and
/// show `▸`; expanded ones show `▾`; leaves show a blank marker.
pub fn render_outline(nodes: &[TreeNode], expanded: &BTreeMap<NodeId, bool>) -> String {
    let mut out = String::new();
    for node in nodes {
        render_into(&mut out, node, expanded, 0);
    }
    out.truncate(out.trim_end().len());
    out
}

fn render_into(out: &mut String, node: &TreeNode, expanded: &BTreeMap<NodeId, bool>, depth: usize) {
    let open = expanded.get(&node.id).copied().unwrap_or(false);
    let marker = match (node.children.is_empty(), open) {
        (true, _) => ' ',
        (false, true) => '▾',
        (false, false) => '▸',
    };
    let _ = writeln!(
        out,
        "{}{} {} {} [{}]",
        "  ".repeat(depth),
        marker,
        node.icon,
        node.label,
        node.id
    );
    if open {
        for child in &node.children {
            render_into(out, child, expanded, depth + 1);
        }
    }
}
