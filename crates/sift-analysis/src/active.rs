//! Resolution of a caret position to an active node.

use sift_syntax::AstNode;
use sift_syntax::AstNodePayload;
use sift_syntax::LiteralKind;
use sift_syntax::NodeIdMap;
use sift_syntax::NodeKind;
use sift_syntax::Position;
use sift_syntax::XorNode;
use tracing::trace;

use crate::position::is_in_ast;

/// The node ancestry a caret position resolves to.
///
/// The ancestry is leaf-first: the first element is the smallest node
/// enclosing the caret and the last element is the root. An active node
/// is constructed at most once per position and shared by the
/// inspections.
#[derive(Debug, Clone)]
pub struct ActiveNode<'a> {
    /// The caret position the ancestry was resolved for.
    position: Position,
    /// The leaf-first chain of nodes from the caret to the root.
    ancestry: Vec<XorNode<'a>>,
    /// The identifier-like leaf under the caret, when there is one.
    identifier_under_position: Option<&'a AstNode>,
}

impl<'a> ActiveNode<'a> {
    /// Resolves a caret position against a document's node map.
    ///
    /// Returns `None` when the document has no leaves or the caret sits
    /// before all of them.
    pub fn from_position(map: &'a NodeIdMap, position: Position) -> Option<Self> {
        let leaf = select_leaf(map, &position)?;
        trace!(leaf = %leaf.id, "resolved active leaf");

        let ancestry = map.ancestry(leaf.id);
        let identifier_under_position = identifier_under_position(&position, leaf);

        Some(Self {
            position,
            ancestry,
            identifier_under_position,
        })
    }

    /// Gets the caret position the ancestry was resolved for.
    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Gets the leaf-first chain of nodes from the caret to the root.
    pub fn ancestry(&self) -> &[XorNode<'a>] {
        &self.ancestry
    }

    /// Gets the identifier-like leaf under the caret.
    ///
    /// This is set when the caret is inside (or at the end of) an
    /// identifier, a generalized identifier, or a `true`/`false`/`null`
    /// literal the user may still be completing.
    pub fn identifier_under_position(&self) -> Option<&'a AstNode> {
        self.identifier_under_position
    }

    /// Gets the literal text of the identifier-like leaf under the caret.
    pub fn identifier_under_position_text(&self) -> Option<&'a str> {
        self.identifier_under_position
            .map(|leaf| match &leaf.payload {
                AstNodePayload::Identifier(literal)
                | AstNodePayload::GeneralizedIdentifier(literal) => literal.as_str(),
                AstNodePayload::Literal { text, .. } => text.as_str(),
                _ => "",
            })
    }
}

/// Selects the leaf a caret position anchors to.
///
/// This is the leaf whose token range contains the position, the last
/// leaf when the position is past every leaf, or `None` when the
/// position is before every leaf. When the position falls exactly on the
/// boundary between two adjacent leaves, the left leaf wins unless it is
/// a closing constant and an identifier or literal starts exactly at the
/// position.
fn select_leaf<'a>(map: &'a NodeIdMap, position: &Position) -> Option<&'a AstNode> {
    let mut selected: Option<(usize, &AstNode)> = None;
    for (index, id) in map.leaf_ids().iter().enumerate() {
        let Some(leaf) = map.ast_node(*id) else {
            continue;
        };

        if position.cmp_token_position(&leaf.token_range.position_start).is_lt() {
            break;
        }

        selected = Some((index, leaf));
    }

    let (index, leaf) = selected?;
    if !position
        .cmp_token_position(&leaf.token_range.position_start)
        .is_eq()
    {
        return Some(leaf);
    }

    // The selected leaf starts exactly at the caret; when the previous
    // leaf ends exactly there as well the caret is on a boundary.
    let previous = index
        .checked_sub(1)
        .and_then(|i| map.leaf_ids().get(i))
        .and_then(|id| map.ast_node(*id));
    match previous {
        Some(previous)
            if position
                .cmp_token_position(&previous.token_range.position_end)
                .is_eq() =>
        {
            let closing = previous
                .constant_kind()
                .map(|kind| kind.is_closing())
                .unwrap_or(false);
            if closing && is_identifier_or_literal(leaf) {
                Some(leaf)
            } else {
                Some(previous)
            }
        }
        _ => Some(leaf),
    }
}

/// Determines if a leaf is an identifier or a literal.
fn is_identifier_or_literal(leaf: &AstNode) -> bool {
    matches!(
        leaf.kind,
        NodeKind::Identifier | NodeKind::GeneralizedIdentifier | NodeKind::LiteralExpression
    )
}

/// Computes the identifier-like leaf under a caret position.
///
/// A caret at the end boundary of the leaf counts as under it; a caret
/// at its start boundary does not, as that caret belongs to whatever
/// precedes the leaf.
fn identifier_under_position<'a>(
    position: &Position,
    leaf: &'a AstNode,
) -> Option<&'a AstNode> {
    if !is_in_ast(position, leaf, false, true) {
        return None;
    }

    match leaf.kind {
        NodeKind::Identifier | NodeKind::GeneralizedIdentifier => Some(leaf),
        NodeKind::LiteralExpression
            if matches!(
                leaf.literal_kind(),
                Some(LiteralKind::Logical) | Some(LiteralKind::Null)
            ) =>
        {
            Some(leaf)
        }
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use sift_syntax::ConstantKind;
    use sift_syntax::NodeKind;
    use sift_syntax::TreeBuilder;

    use super::*;

    /// Builds `each foo` and returns its map.
    fn each_foo() -> NodeIdMap {
        let mut builder = TreeBuilder::new();
        builder.start(NodeKind::EachExpression, None);
        builder.constant(0, ConstantKind::Each, "each");
        builder.space();
        builder.identifier_expression(Some(1), "foo");
        builder.finish();
        builder.build()
    }

    #[test]
    fn empty_documents_have_no_active_node() {
        let map = NodeIdMap::default();
        assert!(ActiveNode::from_position(&map, Position::new(0, 0)).is_none());
    }

    #[test]
    fn caret_before_all_leaves_has_no_active_node() {
        let mut builder = TreeBuilder::new();
        builder.space();
        builder.space();
        builder.identifier_expression(None, "foo");
        let map = builder.build();

        assert!(ActiveNode::from_position(&map, Position::new(0, 0)).is_none());
        assert!(ActiveNode::from_position(&map, Position::new(0, 3)).is_some());
    }

    #[test]
    fn ancestry_is_leaf_first_and_root_anchored() {
        let map = each_foo();
        // Caret at the end of `foo`.
        let active = ActiveNode::from_position(&map, Position::new(0, 8))
            .expect("should resolve");

        let ancestry = active.ancestry();
        assert_eq!(ancestry[0].kind(), NodeKind::Identifier);
        assert_eq!(
            ancestry.last().expect("should have a root").kind(),
            NodeKind::EachExpression
        );
    }

    #[test]
    fn caret_at_identifier_end_is_under_the_identifier() {
        let map = each_foo();
        let active = ActiveNode::from_position(&map, Position::new(0, 8))
            .expect("should resolve");
        assert_eq!(active.identifier_under_position_text(), Some("foo"));

        // A caret at the identifier's start is not under it.
        let active = ActiveNode::from_position(&map, Position::new(0, 5))
            .expect("should resolve");
        assert_eq!(active.identifier_under_position_text(), None);
    }

    #[test]
    fn caret_past_all_leaves_anchors_to_the_last_leaf() {
        let map = each_foo();
        let active = ActiveNode::from_position(&map, Position::new(0, 20))
            .expect("should resolve");
        assert_eq!(active.ancestry()[0].kind(), NodeKind::Identifier);
        assert_eq!(active.identifier_under_position_text(), None);
    }

    #[test]
    fn boundary_prefers_the_left_leaf() {
        // `foo(bar` caret between `foo` and `(`: prefers `foo`.
        let mut builder = TreeBuilder::new();
        builder.start(NodeKind::RecursivePrimaryExpression, None);
        builder.identifier_expression(Some(0), "foo");
        builder.start(NodeKind::ArrayWrapper, Some(1));
        builder.start(NodeKind::InvokeExpression, Some(0));
        builder.constant(0, ConstantKind::OpenParenthesis, "(");
        builder.start(NodeKind::ArrayWrapper, Some(1));
        builder.start(NodeKind::Csv, Some(0));
        builder.identifier_expression(Some(0), "bar");
        builder.finish();
        builder.finish();
        builder.constant(2, ConstantKind::CloseParenthesis, ")");
        builder.finish();
        builder.finish();
        builder.finish();
        let map = builder.build();

        let active = ActiveNode::from_position(&map, Position::new(0, 3))
            .expect("should resolve");
        assert_eq!(active.identifier_under_position_text(), Some("foo"));
    }

    #[test]
    fn boundary_on_a_closing_constant_yields_to_a_following_identifier() {
        // `(a)&b`: the boundary between `)` and `&` stays on the closing
        // constant since `&` is not an identifier, while the boundary
        // between `&` and `b` belongs to `&` (the left leaf).
        let mut builder = TreeBuilder::new();
        builder.start(NodeKind::ArithmeticExpression, None);
        builder.start(NodeKind::ParenthesizedExpression, Some(0));
        builder.constant(0, ConstantKind::OpenParenthesis, "(");
        builder.identifier_expression(Some(1), "a");
        builder.constant(2, ConstantKind::CloseParenthesis, ")");
        builder.finish();
        builder.constant(1, ConstantKind::Concatenation, "&");
        builder.identifier_expression(Some(2), "b");
        builder.finish();
        let map = builder.build();

        let active = ActiveNode::from_position(&map, Position::new(0, 3))
            .expect("should resolve");
        assert_eq!(
            active.ancestry()[0].as_ast().and_then(|n| n.constant_kind()),
            Some(ConstantKind::CloseParenthesis)
        );

        // `(a)b`: an identifier directly after the closing constant wins
        // the boundary.
        let mut builder = TreeBuilder::new();
        builder.start(NodeKind::ArrayWrapper, None);
        builder.start(NodeKind::ParenthesizedExpression, Some(0));
        builder.constant(0, ConstantKind::OpenParenthesis, "(");
        builder.identifier_expression(Some(1), "a");
        builder.constant(2, ConstantKind::CloseParenthesis, ")");
        builder.finish();
        builder.identifier_expression(Some(1), "b");
        builder.finish();
        let map = builder.build();

        let active = ActiveNode::from_position(&map, Position::new(0, 3))
            .expect("should resolve");
        assert_eq!(active.ancestry()[0].kind(), NodeKind::Identifier);
    }
}
