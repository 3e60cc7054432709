//! The id-indexed node map of a parsed document.
//!
//! The parser produces one [`NodeIdMap`] per parse. Inspection borrows it
//! read-only; all relationships are stored as indexes rather than owning
//! references, so the forest has no cyclic ownership.

use std::collections::HashMap;
use std::collections::VecDeque;

use crate::node::AstNode;
use crate::node::ContextNode;
use crate::node::NodeId;
use crate::node::XorNode;

/// The node map of a parsed document.
///
/// Five parallel mappings, all keyed by node id:
///
/// - fully parsed nodes,
/// - partially parsed (context) nodes,
/// - child ids in source order,
/// - parent ids (the transpose of the child mapping),
/// - leaf ids in document order.
///
/// Every id is present in exactly one of the first two mappings.
#[derive(Debug, Clone, Default)]
pub struct NodeIdMap {
    /// The fully parsed nodes, keyed by id.
    ast_nodes: HashMap<NodeId, AstNode>,
    /// The partially parsed nodes, keyed by id.
    context_nodes: HashMap<NodeId, ContextNode>,
    /// The child ids of each node, in source order.
    ///
    /// A child's attribute index is its role under its parent's kind, not
    /// its position in this list; an unparsed earlier sibling is simply
    /// absent.
    child_ids: HashMap<NodeId, Vec<NodeId>>,
    /// The parent id of each non-root node.
    parent_ids: HashMap<NodeId, NodeId>,
    /// The ids of all leaves, in document order.
    leaf_ids: Vec<NodeId>,
}

impl NodeIdMap {
    /// Constructs a node map from its five parallel mappings.
    ///
    /// Debug builds assert that every id is present in exactly one of the
    /// node tables and that the parent mapping is the transpose of the
    /// child mapping.
    pub fn from_parts(
        ast_nodes: HashMap<NodeId, AstNode>,
        context_nodes: HashMap<NodeId, ContextNode>,
        child_ids: HashMap<NodeId, Vec<NodeId>>,
        parent_ids: HashMap<NodeId, NodeId>,
        leaf_ids: Vec<NodeId>,
    ) -> Self {
        #[cfg(debug_assertions)]
        {
            for id in ast_nodes.keys() {
                debug_assert!(
                    !context_nodes.contains_key(id),
                    "node {id} is both fully and partially parsed"
                );
            }

            for (parent, children) in &child_ids {
                for child in children {
                    debug_assert_eq!(
                        parent_ids.get(child),
                        Some(parent),
                        "parent mapping is not the transpose of the child mapping"
                    );
                }
            }
        }

        Self {
            ast_nodes,
            context_nodes,
            child_ids,
            parent_ids,
            leaf_ids,
        }
    }

    /// Gets a fully parsed node by id.
    pub fn ast_node(&self, id: NodeId) -> Option<&AstNode> {
        self.ast_nodes.get(&id)
    }

    /// Gets a partially parsed node by id.
    pub fn context_node(&self, id: NodeId) -> Option<&ContextNode> {
        self.context_nodes.get(&id)
    }

    /// Gets either view of a node by id.
    pub fn xor_node(&self, id: NodeId) -> Option<XorNode<'_>> {
        self.ast_nodes
            .get(&id)
            .map(XorNode::Ast)
            .or_else(|| self.context_nodes.get(&id).map(XorNode::Context))
    }

    /// Gets the child ids of a node, in source order.
    pub fn child_ids(&self, id: NodeId) -> &[NodeId] {
        self.child_ids.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Gets the parent id of a node.
    ///
    /// Returns `None` for a root.
    pub fn parent_id(&self, id: NodeId) -> Option<NodeId> {
        self.parent_ids.get(&id).copied()
    }

    /// Gets the ids of all leaves, in document order.
    pub fn leaf_ids(&self) -> &[NodeId] {
        &self.leaf_ids
    }

    /// Finds the child of a node with the given attribute index.
    pub fn child_by_attribute_index(&self, id: NodeId, attribute: u32) -> Option<XorNode<'_>> {
        self.child_ids(id)
            .iter()
            .filter_map(|child| self.xor_node(*child))
            .find(|child| child.attribute_index() == Some(attribute))
    }

    /// Finds the fully parsed child of a node with the given attribute
    /// index.
    ///
    /// Returns `None` when the child is absent or still partially parsed.
    pub fn ast_child_by_attribute_index(&self, id: NodeId, attribute: u32) -> Option<&AstNode> {
        self.child_by_attribute_index(id, attribute)
            .and_then(|child| match child {
                XorNode::Ast(node) => Some(node),
                XorNode::Context(_) => None,
            })
    }

    /// Finds the right-most fully parsed leaf under a node.
    ///
    /// This is how the effective end of a partially parsed node is
    /// computed. The exploration works in reverse source order and culls
    /// any subtree that cannot end later than the best leaf found so far.
    pub fn right_most_leaf(&self, id: NodeId) -> Option<&AstNode> {
        let mut best: Option<&AstNode> = None;
        let mut queue: VecDeque<NodeId> =
            self.child_ids(id).iter().rev().copied().collect();

        while let Some(current) = queue.pop_front() {
            match self.ast_nodes.get(&current) {
                Some(node) => {
                    if best
                        .map(|b| node.token_range.index_end <= b.token_range.index_end)
                        .unwrap_or(false)
                    {
                        continue;
                    }

                    if node.is_leaf {
                        best = Some(node);
                    } else {
                        queue.extend(self.child_ids(current).iter().rev().copied());
                    }
                }
                None => {
                    queue.extend(self.child_ids(current).iter().rev().copied());
                }
            }
        }

        best
    }

    /// Gets the leaf-first chain of nodes from the given id up to its
    /// root.
    ///
    /// The first element is the node itself and the last is the root.
    /// Returns an empty vector when the id is unknown.
    pub fn ancestry(&self, id: NodeId) -> Vec<XorNode<'_>> {
        let mut ancestry = Vec::new();
        let mut current = self.xor_node(id);
        while let Some(node) = current {
            ancestry.push(node);
            current = self.parent_id(node.id()).and_then(|p| self.xor_node(p));
        }

        ancestry
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::builder::TreeBuilder;
    use crate::node::AstNodePayload;
    use crate::node::ConstantKind;
    use crate::node::LiteralKind;
    use crate::node::NodeKind;

    /// Builds `[a=1]` as a record expression.
    fn record_fixture() -> super::NodeIdMap {
        let mut builder = TreeBuilder::new();
        builder.start(NodeKind::RecordExpression, None);
        builder.constant(0, ConstantKind::OpenBracket, "[");
        builder.start(NodeKind::ArrayWrapper, Some(1));
        builder.start(NodeKind::Csv, Some(0));
        builder.start(NodeKind::GeneralizedIdentifierPairedExpression, Some(0));
        builder.leaf(
            NodeKind::GeneralizedIdentifier,
            Some(0),
            AstNodePayload::GeneralizedIdentifier("a".into()),
            "a",
        );
        builder.constant(1, ConstantKind::Equal, "=");
        builder.leaf(
            NodeKind::LiteralExpression,
            Some(2),
            AstNodePayload::Literal {
                kind: LiteralKind::Numeric,
                text: "1".into(),
            },
            "1",
        );
        builder.finish();
        builder.finish();
        builder.finish();
        builder.constant(2, ConstantKind::CloseBracket, "]");
        builder.finish();
        builder.build()
    }

    #[test]
    fn ancestry_is_leaf_first_and_root_anchored() {
        let map = record_fixture();
        let leaf = *map.leaf_ids().first().expect("should have leaves");
        let ancestry = map.ancestry(leaf);
        assert_eq!(ancestry[0].id(), leaf);
        assert_eq!(
            ancestry.last().expect("should have a root").kind(),
            NodeKind::RecordExpression
        );

        for pair in ancestry.windows(2) {
            assert_eq!(map.parent_id(pair[0].id()), Some(pair[1].id()));
        }
    }

    #[test]
    fn child_lookup_by_attribute_index() {
        let map = record_fixture();
        let root = map
            .ancestry(*map.leaf_ids().first().expect("should have leaves"))
            .last()
            .expect("should have a root")
            .id();

        let close = map
            .ast_child_by_attribute_index(root, 2)
            .expect("should have a close bracket");
        assert_eq!(close.constant_kind(), Some(ConstantKind::CloseBracket));
        assert!(map.child_by_attribute_index(root, 5).is_none());
    }

    #[test]
    fn right_most_leaf_finds_the_last_token() {
        let map = record_fixture();
        let root = map
            .ancestry(*map.leaf_ids().first().expect("should have leaves"))
            .last()
            .expect("should have a root")
            .id();

        let leaf = map.right_most_leaf(root).expect("should have a leaf");
        assert_eq!(leaf.constant_kind(), Some(ConstantKind::CloseBracket));
    }
}
