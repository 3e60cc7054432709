//! Keyword autocomplete.
//!
//! Suggestion runs as a three-stage pipeline:
//!
//! 1. edge cases that bypass the walk (a fresh document, a parameter
//!    name awaiting `as`, a partially typed conjunction),
//! 2. a walk up the ancestry dispatching on each parent kind, where the
//!    first stage to produce a result wins,
//! 3. a prefix filter against whatever identifier-like text sits under
//!    the caret.
//!
//! Results are deduplicated and emitted in the keyword enumeration's
//! canonical order.

use std::collections::HashMap;
use std::sync::LazyLock;

use sift_syntax::ConstantKind;
use sift_syntax::Keyword;
use sift_syntax::NodeIdMap;
use sift_syntax::NodeKind;
use sift_syntax::XorNode;
use sift_syntax::EXPRESSION_KEYWORDS;
use tracing::debug;

use crate::active::ActiveNode;
use crate::completion::TrailingToken;
use crate::config::Settings;
use crate::diagnostics::InspectionError;
use crate::position::is_after_ast;
use crate::position::is_after_xor;
use crate::position::is_in_ast;
use crate::position::is_on_or_before_ast_start;

/// The keyword constant mandated at a `(parent kind, child attribute)`
/// slot.
static CONSTANT_MAP: LazyLock<HashMap<(NodeKind, u32), Keyword>> = LazyLock::new(|| {
    HashMap::from([
        ((NodeKind::ErrorRaisingExpression, 0), Keyword::Error),
        ((NodeKind::IfExpression, 0), Keyword::If),
        ((NodeKind::IfExpression, 2), Keyword::Then),
        ((NodeKind::IfExpression, 4), Keyword::Else),
        ((NodeKind::LetExpression, 2), Keyword::In),
        ((NodeKind::OtherwiseExpression, 0), Keyword::Otherwise),
        ((NodeKind::Section, 1), Keyword::Section),
    ])
});

/// The `(parent kind, child attribute)` slots that hold an expression.
const EXPRESSION_POSITIONS: &[(NodeKind, u32)] = &[
    (NodeKind::EachExpression, 1),
    (NodeKind::ErrorRaisingExpression, 1),
    (NodeKind::FunctionExpression, 3),
    (NodeKind::GeneralizedIdentifierPairedExpression, 2),
    (NodeKind::IdentifierPairedExpression, 2),
    (NodeKind::IfExpression, 1),
    (NodeKind::IfExpression, 3),
    (NodeKind::IfExpression, 5),
    (NodeKind::LetExpression, 3),
    (NodeKind::OtherwiseExpression, 1),
    (NodeKind::ParenthesizedExpression, 1),
];

/// The node kinds that produce a value a conjunction may follow.
const CONJOINABLE_KINDS: &[NodeKind] = &[
    NodeKind::ArithmeticExpression,
    NodeKind::AsExpression,
    NodeKind::EachExpression,
    NodeKind::EqualityExpression,
    NodeKind::ErrorHandlingExpression,
    NodeKind::FieldProjection,
    NodeKind::FieldSelector,
    NodeKind::FunctionExpression,
    NodeKind::IdentifierExpression,
    NodeKind::IfExpression,
    NodeKind::InvokeExpression,
    NodeKind::IsExpression,
    NodeKind::ItemAccessExpression,
    NodeKind::LetExpression,
    NodeKind::ListExpression,
    NodeKind::LiteralExpression,
    NodeKind::LogicalExpression,
    NodeKind::MetadataExpression,
    NodeKind::ParenthesizedExpression,
    NodeKind::RecordExpression,
    NodeKind::RecursivePrimaryExpression,
    NodeKind::RelationalExpression,
    NodeKind::UnaryExpression,
];

/// Computes the keywords admissible at the caret.
///
/// Without an active node (an empty document) any expression keyword or
/// `section` may start the document.
pub fn autocomplete(
    _settings: &Settings,
    map: &NodeIdMap,
    active: Option<&ActiveNode<'_>>,
    trailing: Option<&TrailingToken>,
) -> Result<Vec<Keyword>, InspectionError> {
    let Some(active) = active else {
        let mut keywords = EXPRESSION_KEYWORDS.to_vec();
        keywords.push(Keyword::Section);
        keywords.sort();
        return Ok(keywords);
    };

    let mut keywords = edge_case(map, active, trailing)
        .or_else(|| ancestry_walk(map, active, trailing))
        .unwrap_or_default();

    // Filter by the text being typed: the trailing error token when the
    // caret is in it, otherwise the identifier under the caret.
    let prefix = match trailing {
        Some(trailing) if trailing.is_in_or_on_position => Some(trailing.token.text.as_str()),
        _ => active.identifier_under_position_text(),
    };
    if let Some(prefix) = prefix {
        keywords.retain(|keyword| keyword.as_str().starts_with(prefix));
    }

    keywords.sort();
    keywords.dedup();
    debug!(count = keywords.len(), "keyword autocomplete");
    Ok(keywords)
}

/// Detects the edge cases that bypass the ancestry walk.
fn edge_case(
    map: &NodeIdMap,
    active: &ActiveNode<'_>,
    trailing: Option<&TrailingToken>,
) -> Option<Vec<Keyword>> {
    let ancestry = active.ancestry();
    let position = active.position();

    // A fresh document holds nothing but the identifier being typed;
    // any expression keyword or `section` completes it.
    if trailing.is_none()
        && ancestry.len() == 2
        && ancestry[0].kind() == NodeKind::Identifier
        && ancestry[1].kind() == NodeKind::IdentifierExpression
    {
        let literal = ancestry[0].as_ast()?.identifier_literal()?;
        let mut keywords: Vec<Keyword> = EXPRESSION_KEYWORDS.to_vec();
        keywords.push(Keyword::Section);
        keywords.retain(|keyword| keyword.as_str().starts_with(literal));
        return Some(keywords);
    }

    // A parameter name with the caret past it awaits its `as` clause.
    if ancestry.len() >= 2
        && ancestry[0].kind() == NodeKind::Identifier
        && ancestry[1].kind() == NodeKind::Parameter
    {
        if let Some(name) = ancestry[0].as_ast() {
            if is_after_ast(position, name, true) {
                return Some(vec![Keyword::As]);
            }
        }
    }

    // A partially typed conjunction after a completed expression, e.g.
    // `x a|` completing `and` or `as`.
    if let Some(trailing) = trailing {
        if trailing.is_in_or_on_position && !excluded_conjunction_position(map, active) {
            let candidates: &[Keyword] = match trailing.token.text.chars().next() {
                Some('a') => &[Keyword::And, Keyword::As],
                Some('o') => &[Keyword::Or],
                Some('m') => &[Keyword::Meta],
                _ => &[],
            };

            let conjoinable = ancestry
                .iter()
                .any(|node| CONJOINABLE_KINDS.contains(&node.kind()));
            if conjoinable {
                let keywords: Vec<Keyword> = candidates
                    .iter()
                    .copied()
                    .filter(|keyword| keyword.as_str().starts_with(&trailing.token.text))
                    .collect();
                if !keywords.is_empty() {
                    return Some(keywords);
                }
            }
        }
    }

    None
}

/// Detects the positions where the generic conjunction logic must not
/// apply because a more specific completion owns them.
///
/// These are: directly after a `then` or `in` constant (an expression
/// is expected there), and directly after the protected body of a `try`
/// (where `or`/`otherwise` disambiguation applies instead).
fn excluded_conjunction_position(map: &NodeIdMap, active: &ActiveNode<'_>) -> bool {
    let ancestry = active.ancestry();
    let position = active.position();

    if let Some(XorNode::Ast(leaf)) = ancestry.first() {
        if matches!(
            leaf.constant_kind(),
            Some(ConstantKind::Then) | Some(ConstantKind::In)
        ) && is_after_ast(position, leaf, false)
        {
            return true;
        }
    }

    for index in 1..ancestry.len() {
        if ancestry[index].kind() == NodeKind::ErrorHandlingExpression {
            let child = &ancestry[index - 1];
            if child.attribute_index() == Some(1) && is_after_xor(position, map, child, true) {
                return true;
            }
        }
    }

    false
}

/// Walks the ancestry from the leaf's parent upward, dispatching on
/// each parent kind; the first pair that produces a result ends the
/// walk.
fn ancestry_walk(
    map: &NodeIdMap,
    active: &ActiveNode<'_>,
    trailing: Option<&TrailingToken>,
) -> Option<Vec<Keyword>> {
    let ancestry = active.ancestry();
    for index in 1..ancestry.len() {
        let parent = &ancestry[index];
        let child = &ancestry[index - 1];

        let result = match parent.kind() {
            NodeKind::ErrorHandlingExpression => {
                error_handling_expression(map, active, trailing, child)
            }
            NodeKind::ListExpression | NodeKind::ListLiteral => {
                list_expression(active, parent, child)
            }
            NodeKind::SectionMember => section_member(map, active, parent, child),
            _ => walk_default(map, active, parent, child),
        };

        if result.is_some() {
            return result;
        }
    }

    None
}

/// The generic per-pair dispatch: mandated keyword constants and
/// expression slots.
fn walk_default(
    map: &NodeIdMap,
    active: &ActiveNode<'_>,
    parent: &XorNode<'_>,
    child: &XorNode<'_>,
) -> Option<Vec<Keyword>> {
    let attribute = child.attribute_index()?;
    let position = active.position();

    // The child itself sits in a mandated keyword constant slot.
    if let Some(keyword) = CONSTANT_MAP.get(&(parent.kind(), attribute)) {
        match child {
            XorNode::Context(_) => return Some(vec![*keyword]),
            XorNode::Ast(node) => {
                if is_in_ast(position, node, true, true) {
                    return Some(vec![*keyword]);
                }
            }
        }
    }

    if is_after_xor(position, map, child, true) {
        // The caret is past the child; the next slot may mandate a
        // keyword constant that has not been typed yet.
        if let Some(keyword) = CONSTANT_MAP.get(&(parent.kind(), attribute + 1)) {
            let emit = match map.child_by_attribute_index(parent.id(), attribute + 1) {
                None | Some(XorNode::Context(_)) => true,
                Some(XorNode::Ast(node)) => !is_after_ast(position, node, true),
            };
            if emit {
                return Some(vec![*keyword]);
            }
        }

        // Or the next slot may expect an expression that has not been
        // started.
        if parent.is_context()
            && EXPRESSION_POSITIONS.contains(&(parent.kind(), attribute + 1))
            && map
                .child_by_attribute_index(parent.id(), attribute + 1)
                .is_none()
        {
            return Some(expression_keywords());
        }
    }

    // The child itself is an expression slot: either nothing has been
    // typed into it yet, or an identifier is mid-keystroke (the prefix
    // filter narrows the set afterwards).
    if EXPRESSION_POSITIONS.contains(&(parent.kind(), attribute)) {
        match child {
            XorNode::Context(_) => return Some(expression_keywords()),
            XorNode::Ast(node) => {
                if is_on_or_before_ast_start(position, node) {
                    return Some(expression_keywords());
                }
                if node.kind == NodeKind::IdentifierExpression
                    && active.identifier_under_position().is_some()
                    && is_in_ast(position, node, false, true)
                {
                    return Some(expression_keywords());
                }
            }
        }
    }

    None
}

/// Completion under a `try` expression.
///
/// After the protected body either `or` continues the expression or
/// `otherwise` introduces the fallback; with nothing typed only
/// `otherwise` is offered.
fn error_handling_expression(
    map: &NodeIdMap,
    active: &ActiveNode<'_>,
    trailing: Option<&TrailingToken>,
    child: &XorNode<'_>,
) -> Option<Vec<Keyword>> {
    if child.attribute_index() != Some(1) {
        return None;
    }
    let position = active.position();

    if let Some(trailing) = trailing {
        if trailing.is_in_or_on_position {
            return Some(vec![Keyword::Or, Keyword::Otherwise]);
        }
    }

    if is_after_xor(position, map, child, true) {
        return Some(vec![Keyword::Otherwise]);
    }

    match child {
        XorNode::Context(_) => Some(expression_keywords()),
        XorNode::Ast(node) if is_on_or_before_ast_start(position, node) => {
            Some(expression_keywords())
        }
        XorNode::Ast(_) => None,
    }
}

/// Completion inside the braces of a list.
fn list_expression(
    active: &ActiveNode<'_>,
    parent: &XorNode<'_>,
    child: &XorNode<'_>,
) -> Option<Vec<Keyword>> {
    let position = active.position();

    match child.attribute_index()? {
        // The element wrapper: anywhere inside it an element expression
        // may be typed; past it the list may still be unfinished.
        1 => match child {
            XorNode::Context(_) => Some(expression_keywords()),
            XorNode::Ast(node) => {
                if is_in_ast(position, node, true, true)
                    || (parent.is_context() && is_after_ast(position, node, true))
                {
                    Some(expression_keywords())
                } else {
                    None
                }
            }
        },
        // The closing brace: a caret at or before it is still inside
        // the braces.
        2 => match child {
            XorNode::Ast(node)
                if !position
                    .cmp_token_position(&node.token_range.position_start)
                    .is_gt() =>
            {
                Some(expression_keywords())
            }
            _ => None,
        },
        _ => None,
    }
}

/// Completion while typing a section member's name.
///
/// Until a `shared` constant has been parsed, a member name starting
/// with `s` may still become the `shared` modifier.
fn section_member(
    map: &NodeIdMap,
    active: &ActiveNode<'_>,
    parent: &XorNode<'_>,
    child: &XorNode<'_>,
) -> Option<Vec<Keyword>> {
    if child.attribute_index() != Some(2) {
        return None;
    }

    let has_shared = map.child_by_attribute_index(parent.id(), 1).is_some();
    if has_shared {
        return None;
    }

    let name = map
        .ast_child_by_attribute_index(child.id(), 0)
        .and_then(|name| name.identifier_literal())?;
    let under_caret = active
        .identifier_under_position()
        .map(|leaf| leaf.identifier_literal() == Some(name))
        .unwrap_or(false);
    if under_caret && name.starts_with('s') {
        return Some(vec![Keyword::Shared]);
    }

    None
}

/// The expression keyword set as an owned list.
fn expression_keywords() -> Vec<Keyword> {
    EXPRESSION_KEYWORDS.to_vec()
}
