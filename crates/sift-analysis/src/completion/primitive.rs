//! Primitive-type autocomplete.
//!
//! Type names become admissible after the `as`, `is`, and `nullable`
//! constants, and while a type name is being retyped in place.

use sift_syntax::ConstantKind;
use sift_syntax::NodeIdMap;
use sift_syntax::NodeKind;
use sift_syntax::PrimitiveTypeKind;
use sift_syntax::XorNode;
use strum::VariantArray;
use tracing::debug;

use crate::active::ActiveNode;
use crate::completion::TrailingToken;
use crate::config::Settings;
use crate::diagnostics::InspectionError;
use crate::position::is_after_ast;
use crate::position::is_in_ast;

/// Computes the primitive-type names admissible at the caret.
///
/// Results follow the type enumeration's canonical order and are
/// filtered by the partially typed name, whether it reached the tree
/// (an identifier under the caret) or not (the parse error's trailing
/// token).
pub fn autocomplete(
    _settings: &Settings,
    map: &NodeIdMap,
    active: Option<&ActiveNode<'_>>,
    trailing: Option<&TrailingToken>,
) -> Result<Vec<PrimitiveTypeKind>, InspectionError> {
    let Some(active) = active else {
        return Ok(Vec::new());
    };

    if !expects_type(map, active) {
        return Ok(Vec::new());
    }

    let prefix = match trailing {
        Some(trailing) if trailing.is_in_or_on_position => Some(trailing.token.text.as_str()),
        _ => active.identifier_under_position_text(),
    };

    let kinds: Vec<PrimitiveTypeKind> = PrimitiveTypeKind::VARIANTS
        .iter()
        .copied()
        .filter(|kind| {
            prefix
                .map(|prefix| kind.as_str().starts_with(prefix))
                .unwrap_or(true)
        })
        .collect();
    debug!(count = kinds.len(), "primitive-type autocomplete");
    Ok(kinds)
}

/// Determines if the caret sits where a primitive-type name belongs.
fn expects_type(map: &NodeIdMap, active: &ActiveNode<'_>) -> bool {
    let ancestry = active.ancestry();
    let position = active.position();

    // Retyping an existing type name counts, wherever it is.
    if let Some(XorNode::Ast(leaf)) = ancestry.first() {
        if matches!(leaf.constant_kind(), Some(ConstantKind::Primitive(_)))
            && is_in_ast(position, leaf, false, true)
        {
            return true;
        }
    }

    for index in 1..ancestry.len() {
        let parent = &ancestry[index];
        let child = &ancestry[index - 1];

        // The constant whose slot precedes the type name, per parent
        // kind.
        let introducing = match parent.kind() {
            NodeKind::AsNullablePrimitiveType
            | NodeKind::AsType
            | NodeKind::IsNullablePrimitiveType
            | NodeKind::NullablePrimitiveType
            | NodeKind::NullableType => Some(0),
            NodeKind::AsExpression | NodeKind::IsExpression => Some(1),
            _ => None,
        };

        let Some(introducing) = introducing else {
            continue;
        };
        if child.attribute_index() != Some(introducing) {
            continue;
        }

        let Some(XorNode::Ast(constant)) = map.child_by_attribute_index(parent.id(), introducing)
        else {
            continue;
        };
        if constant.constant_kind().is_none() {
            continue;
        }
        if is_after_ast(position, constant, false) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use sift_syntax::AstNodePayload;
    use sift_syntax::Position;
    use sift_syntax::Token;
    use sift_syntax::TokenKind;
    use sift_syntax::TokenPosition;
    use sift_syntax::TreeBuilder;

    use super::*;

    /// Runs the autocomplete against a built map.
    fn complete(
        map: &NodeIdMap,
        position: Position,
        trailing: Option<TrailingToken>,
    ) -> Vec<PrimitiveTypeKind> {
        let active = ActiveNode::from_position(map, position);
        autocomplete(
            &Settings::default(),
            map,
            active.as_ref(),
            trailing.as_ref(),
        )
        .expect("autocomplete should succeed")
    }

    /// Builds `(x as ` with the type clause unfinished.
    fn unfinished_parameter_type() -> NodeIdMap {
        let mut builder = TreeBuilder::new();
        builder.start(NodeKind::FunctionExpression, None);
        builder.start(NodeKind::ParameterList, Some(0));
        builder.constant(0, ConstantKind::OpenParenthesis, "(");
        builder.start(NodeKind::ArrayWrapper, Some(1));
        builder.start(NodeKind::Csv, Some(0));
        builder.start(NodeKind::Parameter, Some(0));
        builder.leaf(
            NodeKind::Identifier,
            Some(1),
            AstNodePayload::Identifier("x".into()),
            "x",
        );
        builder.space();
        builder.start(NodeKind::AsNullablePrimitiveType, Some(2));
        builder.constant(0, ConstantKind::As, "as");
        builder.space();
        builder.build()
    }

    #[test]
    fn a_type_follows_the_as_constant() {
        let map = unfinished_parameter_type();
        let kinds = complete(&map, Position::new(0, 5), None);
        assert_eq!(kinds, PrimitiveTypeKind::VARIANTS.to_vec());
    }

    #[test]
    fn trailing_text_narrows_the_type_names() {
        // `(x as n|` with the parse error stopped on `n`.
        let map = unfinished_parameter_type();
        let token = Token::new(
            TokenKind::Identifier,
            "n",
            TokenPosition::new(0, 6, 6),
            TokenPosition::new(0, 7, 7),
        );
        let position = Position::new(0, 7);
        let trailing = TrailingToken::new(token, &position);

        let kinds = complete(&map, position, Some(trailing));
        assert_eq!(kinds, vec![
            PrimitiveTypeKind::None,
            PrimitiveTypeKind::Null,
            PrimitiveTypeKind::Number,
        ]);
    }

    #[test]
    fn expression_positions_offer_no_type_names() {
        let mut builder = TreeBuilder::new();
        builder.start(NodeKind::EachExpression, None);
        builder.constant(0, ConstantKind::Each, "each");
        builder.space();
        builder.numeric_literal(Some(1), "1");
        builder.finish();
        let map = builder.build();

        assert_eq!(complete(&map, Position::new(0, 5), None), Vec::new());
    }
}
