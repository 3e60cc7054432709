//! Relations between caret positions and tokens or nodes.
//!
//! A caret sits between code units, so the same caret may be on the end
//! boundary of one token and the start boundary of the next. Callers pick
//! whether a boundary counts as "inside" through the inclusivity flags;
//! the engine's caret rules are: a caret at the end of an identifier is in
//! the identifier, a caret at the start of the next token is not.

use std::cmp::Ordering;

use sift_syntax::AstNode;
use sift_syntax::ContextNode;
use sift_syntax::NodeIdMap;
use sift_syntax::Position;
use sift_syntax::Token;
use sift_syntax::TokenPosition;
use sift_syntax::XorNode;

/// Determines if a caret is strictly before a token boundary.
pub fn is_before_token_position(position: &Position, boundary: &TokenPosition) -> bool {
    position.cmp_token_position(boundary) == Ordering::Less
}

/// Determines if a caret is exactly on a token boundary.
pub fn is_on_token_position(position: &Position, boundary: &TokenPosition) -> bool {
    position.cmp_token_position(boundary) == Ordering::Equal
}

/// Determines if a caret is strictly after a token boundary.
pub fn is_after_token_position(position: &Position, boundary: &TokenPosition) -> bool {
    position.cmp_token_position(boundary) == Ordering::Greater
}

/// Determines if a caret is within a token.
///
/// The token's start boundary does not count as within; its end
/// boundary does (a caret at the end of a token is still completing
/// it).
pub fn is_in_token(position: &Position, token: &Token) -> bool {
    position.cmp_token_position(&token.position_start) == Ordering::Greater
        && position.cmp_token_position(&token.position_end) != Ordering::Greater
}

/// Determines if a caret is before the start of a fully parsed node.
pub fn is_before_ast(position: &Position, node: &AstNode) -> bool {
    is_before_token_position(position, &node.token_range.position_start)
}

/// Determines if a caret is on or before the start of a fully parsed
/// node.
///
/// A caret exactly on a node's start boundary belongs to whatever
/// precedes the node, so positions expecting something *before* the
/// node usually want this relation.
pub fn is_on_or_before_ast_start(position: &Position, node: &AstNode) -> bool {
    position
        .cmp_token_position(&node.token_range.position_start)
        .is_le()
}

/// Determines if a caret is within a fully parsed node.
///
/// The inclusivity flags control whether the node's start and end
/// boundaries count as within.
pub fn is_in_ast(
    position: &Position,
    node: &AstNode,
    lower_inclusive: bool,
    upper_inclusive: bool,
) -> bool {
    let start = position.cmp_token_position(&node.token_range.position_start);
    let end = position.cmp_token_position(&node.token_range.position_end);

    let after_start = match start {
        Ordering::Less => false,
        Ordering::Equal => lower_inclusive,
        Ordering::Greater => true,
    };
    let before_end = match end {
        Ordering::Less => true,
        Ordering::Equal => upper_inclusive,
        Ordering::Greater => false,
    };

    after_start && before_end
}

/// Determines if a caret is after a fully parsed node.
///
/// With `end_inclusive` the node's end boundary counts as within the
/// node, so only carets strictly past it are after.
pub fn is_after_ast(position: &Position, node: &AstNode, end_inclusive: bool) -> bool {
    match position.cmp_token_position(&node.token_range.position_end) {
        Ordering::Less => false,
        Ordering::Equal => !end_inclusive,
        Ordering::Greater => true,
    }
}

/// Gets the effective end boundary of a partially parsed node.
///
/// A context node has no recorded end; its effective end is the end of
/// its right-most fully parsed leaf. Returns `None` when it has none.
pub fn context_end(map: &NodeIdMap, node: &ContextNode) -> Option<TokenPosition> {
    map.right_most_leaf(node.id)
        .map(|leaf| leaf.token_range.position_end)
}

/// Determines if a caret is before the start of a partially parsed node.
///
/// A context node that consumed no tokens has no extent; every relation
/// against it is false.
pub fn is_before_context(position: &Position, node: &ContextNode) -> bool {
    match &node.token_start {
        Some(token) => is_before_token_position(position, &token.position_start),
        None => false,
    }
}

/// Determines if a caret is within a partially parsed node.
///
/// A context node extends from its first token to the end of its
/// right-most parsed leaf; with no parsed leaf it extends indefinitely
/// past its start.
pub fn is_in_context(
    position: &Position,
    map: &NodeIdMap,
    node: &ContextNode,
    lower_inclusive: bool,
    upper_inclusive: bool,
) -> bool {
    let Some(token) = &node.token_start else {
        return false;
    };

    let after_start = match position.cmp_token_position(&token.position_start) {
        Ordering::Less => false,
        Ordering::Equal => lower_inclusive,
        Ordering::Greater => true,
    };
    if !after_start {
        return false;
    }

    match context_end(map, node) {
        Some(end) => match position.cmp_token_position(&end) {
            Ordering::Less => true,
            Ordering::Equal => upper_inclusive,
            Ordering::Greater => false,
        },
        None => true,
    }
}

/// Determines if a caret is after a partially parsed node.
pub fn is_after_context(
    position: &Position,
    map: &NodeIdMap,
    node: &ContextNode,
    end_inclusive: bool,
) -> bool {
    match context_end(map, node) {
        Some(end) => match position.cmp_token_position(&end) {
            Ordering::Less => false,
            Ordering::Equal => !end_inclusive,
            Ordering::Greater => true,
        },
        None => false,
    }
}

/// Determines if a caret is before the start of a node.
pub fn is_before_xor(position: &Position, node: &XorNode<'_>) -> bool {
    match node {
        XorNode::Ast(node) => is_before_ast(position, node),
        XorNode::Context(node) => is_before_context(position, node),
    }
}

/// Determines if a caret is within a node.
pub fn is_in_xor(
    position: &Position,
    map: &NodeIdMap,
    node: &XorNode<'_>,
    lower_inclusive: bool,
    upper_inclusive: bool,
) -> bool {
    match node {
        XorNode::Ast(node) => is_in_ast(position, node, lower_inclusive, upper_inclusive),
        XorNode::Context(node) => {
            is_in_context(position, map, node, lower_inclusive, upper_inclusive)
        }
    }
}

/// Determines if a caret is after a node.
pub fn is_after_xor(
    position: &Position,
    map: &NodeIdMap,
    node: &XorNode<'_>,
    end_inclusive: bool,
) -> bool {
    match node {
        XorNode::Ast(node) => is_after_ast(position, node, end_inclusive),
        XorNode::Context(node) => is_after_context(position, map, node, end_inclusive),
    }
}
