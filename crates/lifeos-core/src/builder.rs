//! Flat-to-nested tree construction.
//!
//! [`build_tree`] is pure: it takes the server's flat node list and returns
//! the root sequence of the materialized tree. It never fails. Malformed
//! input degrades instead:
//!
//! - a `parentId` that names no known node makes the node a root;
//! - a `parentId` naming a node whose kind may not contain this one (see
//!   [`NodeKind::can_contain`](crate::node::NodeKind::can_contain)) also makes
//!   it a root, which is why topics never materialize children;
//! - a repeated ID keeps the first position and the last data.
//!
//! Because every accepted parent edge lowers the kind rank, the result is
//! acyclic without any runtime cycle check.

use indexmap::IndexMap;

use crate::id::NodeId;
use crate::node::{ApiNode, TreeNode};

/// Builds the nested tree from a flat node list.
///
/// Siblings are ordered by the position of their ID in the parent's
/// `children` list; siblings the list does not mention follow, in input
/// order. Roots keep input order.
pub fn build_tree(flat: impl IntoIterator<Item = ApiNode>) -> Vec<TreeNode> {
    let mut nodes: IndexMap<NodeId, TreeNode> = IndexMap::new();
    for api in flat {
        nodes.insert(api.id.clone(), TreeNode::from(api));
    }

    // Resolve each node's effective parent by index.
    let parents: Vec<Option<usize>> = nodes
        .values()
        .map(|node| {
            let parent_id = node.parent_id.as_ref()?;
            let index = nodes.get_index_of(parent_id)?;
            let (_, parent) = nodes.get_index(index)?;
            parent.kind.can_contain(node.kind).then_some(index)
        })
        .collect();

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (index, parent) in parents.iter().enumerate() {
        match parent {
            Some(p) => children[*p].push(index),
            None => roots.push(index),
        }
    }

    for (parent_index, kids) in children.iter_mut().enumerate() {
        let Some((_, parent)) = nodes.get_index(parent_index) else {
            continue;
        };
        if parent.child_ids.is_empty() || kids.len() < 2 {
            continue;
        }
        // `sort_by_key` is stable, so unlisted children keep insertion order.
        kids.sort_by_key(|&kid| {
            nodes
                .get_index(kid)
                .and_then(|(id, _)| parent.child_ids.iter().position(|c| c == id))
                .unwrap_or(usize::MAX)
        });
    }

    let mut slots: Vec<Option<TreeNode>> = nodes.into_values().map(Some).collect();
    roots
        .into_iter()
        .filter_map(|root| assemble(root, &mut slots, &children))
        .collect()
}

/// Moves node `index` out of `slots` and attaches its already-ordered
/// children, depth-first.
fn assemble(
    index: usize,
    slots: &mut [Option<TreeNode>],
    children: &[Vec<usize>],
) -> Option<TreeNode> {
    let mut node = slots.get_mut(index)?.take()?;
    node.children = children[index]
        .iter()
        .filter_map(|&kid| assemble(kid, slots, children))
        .collect();
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::tree;
    use proptest::prelude::*;

    fn api(id: &str, kind: NodeKind, parent: Option<&str>, children: &[&str]) -> ApiNode {
        ApiNode {
            id: id.into(),
            kind,
            label: id.to_uppercase(),
            icon: kind.default_icon().to_string(),
            parent_id: parent.map(NodeId::from),
            children: children.iter().map(|c| NodeId::from(*c)).collect(),
            has_messages: false,
            date_created: String::new(),
            date_modified: String::new(),
            summary: None,
            has_summary: false,
            has_artifacts: false,
            has_prompt: false,
        }
    }

    fn ids(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn empty_input_builds_empty_tree() {
        assert!(build_tree(Vec::new()).is_empty());
    }

    #[test]
    fn single_theme_with_topic() {
        let tree = build_tree(vec![
            api("a", NodeKind::Theme, None, &["b"]),
            api("b", NodeKind::Topic, Some("a"), &[]),
        ]);
        assert_eq!(ids(&tree), ["a"]);
        assert_eq!(ids(&tree[0].children), ["b"]);
        assert!(tree[0].children[0].children.is_empty());
    }

    #[test]
    fn children_follow_child_id_order() {
        let tree = build_tree(vec![
            api("t", NodeKind::Theme, None, &["c", "a", "b"]),
            api("a", NodeKind::Topic, Some("t"), &[]),
            api("b", NodeKind::Topic, Some("t"), &[]),
            api("c", NodeKind::Subtopic, Some("t"), &[]),
        ]);
        assert_eq!(ids(&tree[0].children), ["c", "a", "b"]);
    }

    #[test]
    fn unlisted_children_sort_last_in_input_order() {
        let tree = build_tree(vec![
            api("t", NodeKind::Theme, None, &["b"]),
            api("x", NodeKind::Topic, Some("t"), &[]),
            api("a", NodeKind::Topic, Some("t"), &[]),
            api("b", NodeKind::Topic, Some("t"), &[]),
        ]);
        assert_eq!(ids(&tree[0].children), ["b", "x", "a"]);
    }

    #[test]
    fn dangling_parent_becomes_root() {
        let tree = build_tree(vec![
            api("a", NodeKind::Theme, None, &[]),
            api("orphan", NodeKind::Topic, Some("ghost"), &[]),
        ]);
        assert_eq!(ids(&tree), ["a", "orphan"]);
        assert_eq!(tree[1].parent_id, Some(NodeId::from("ghost")));
    }

    #[test]
    fn topic_never_materializes_children() {
        let tree = build_tree(vec![
            api("t", NodeKind::Topic, None, &["u"]),
            api("u", NodeKind::Topic, Some("t"), &[]),
        ]);
        assert_eq!(ids(&tree), ["t", "u"]);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn self_parent_and_mutual_parents_stay_reachable() {
        let tree = build_tree(vec![
            api("s", NodeKind::Subtopic, Some("s"), &["s"]),
            api("a", NodeKind::Theme, Some("b"), &[]),
            api("b", NodeKind::Theme, Some("a"), &[]),
        ]);
        assert_eq!(ids(&tree), ["s", "a", "b"]);
    }

    #[test]
    fn duplicate_id_keeps_first_position_and_last_data() {
        let mut second = api("a", NodeKind::Theme, None, &[]);
        second.label = "second".into();
        let tree = build_tree(vec![
            api("a", NodeKind::Theme, None, &[]),
            api("z", NodeKind::Theme, None, &[]),
            second,
        ]);
        assert_eq!(ids(&tree), ["a", "z"]);
        assert_eq!(tree[0].label, "second");
    }

    #[test]
    fn nested_three_levels() {
        let tree = build_tree(vec![
            api("topic", NodeKind::Topic, Some("sub"), &[]),
            api("sub", NodeKind::Subtopic, Some("theme"), &["topic"]),
            api("theme", NodeKind::Theme, None, &["sub"]),
        ]);
        assert_eq!(ids(&tree), ["theme"]);
        assert_eq!(ids(&tree[0].children), ["sub"]);
        assert_eq!(ids(&tree[0].children[0].children), ["topic"]);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn kind_strategy() -> impl Strategy<Value = NodeKind> {
        prop_oneof![
            Just(NodeKind::Theme),
            Just(NodeKind::Subtopic),
            Just(NodeKind::Topic),
        ]
    }

    /// Flat lists over ids `n0..nN` with random parents (some dangling) and
    /// random, possibly partial or bogus, child orderings.
    fn flat_strategy() -> impl Strategy<Value = Vec<ApiNode>> {
        prop::collection::vec(
            (
                kind_strategy(),
                prop::option::of(0usize..14),
                prop::collection::vec(0usize..14, 0..6),
            ),
            0..12,
        )
        .prop_map(|entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, (kind, parent, order))| {
                    let parent = parent.map(|p| format!("n{p}"));
                    let order: Vec<String> = order.into_iter().map(|c| format!("n{c}")).collect();
                    let order: Vec<&str> = order.iter().map(String::as_str).collect();
                    api(&format!("n{i}"), kind, parent.as_deref(), &order)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn build_is_idempotent(flat in flat_strategy()) {
            let first = build_tree(flat.clone());
            let again = build_tree(flat);
            prop_assert_eq!(&first, &again);

            let rebuilt = build_tree(tree::flatten(&first));
            prop_assert_eq!(first, rebuilt);
        }

        #[test]
        fn build_never_drops_a_node(flat in flat_strategy()) {
            let distinct: std::collections::HashSet<_> = flat.iter().map(|n| n.id.clone()).collect();
            let tree = build_tree(flat);
            prop_assert_eq!(tree::count(&tree), distinct.len());
        }

        #[test]
        fn topics_are_leaves(flat in flat_strategy()) {
            let tree = build_tree(flat);
            for node in tree::walk(&tree) {
                if node.kind == NodeKind::Topic {
                    prop_assert!(node.children.is_empty());
                }
                for child in &node.children {
                    prop_assert!(node.kind.can_contain(child.kind));
                }
            }
        }

        #[test]
        fn listed_children_precede_unlisted_in_order(flat in flat_strategy()) {
            let tree = build_tree(flat);
            for node in tree::walk(&tree) {
                let positions: Vec<Option<usize>> = node
                    .children
                    .iter()
                    .map(|c| node.child_ids.iter().position(|id| id == &c.id))
                    .collect();
                let mut seen_unlisted = false;
                let mut last = None;
                for position in positions {
                    match position {
                        Some(p) => {
                            prop_assert!(!seen_unlisted);
                            prop_assert!(last.map_or(true, |l| l < p));
                            last = Some(p);
                        }
                        None => seen_unlisted = true,
                    }
                }
            }
        }
    }
}
