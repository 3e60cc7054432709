//! Shared fixtures for the inspection tests.
//!
//! Fixtures are built the way the parser would drive the builder; the
//! caret position for "end of input" is read off the builder's cursor
//! before the map is built.

use sift_syntax::AstNodePayload;
use sift_syntax::ConstantKind;
use sift_syntax::NodeId;
use sift_syntax::NodeKind;
use sift_syntax::Position;
use sift_syntax::PrimitiveTypeKind;
use sift_syntax::TreeBuilder;

/// A literal field value of a record fixture.
#[derive(Debug, Clone, Copy)]
pub enum Field {
    /// A numeric literal.
    Number(&'static str),
    /// A text literal.
    Text(&'static str),
}

/// Gets the caret position at the builder's cursor.
pub fn caret(builder: &TreeBuilder) -> Position {
    let cursor = builder.cursor();
    Position::new(cursor.line_number, cursor.line_code_unit)
}

/// Emits a record expression such as `[a=1, b="x"]`.
pub fn record(
    builder: &mut TreeBuilder,
    attribute: Option<u32>,
    fields: &[(&str, Field)],
) -> NodeId {
    let id = builder.start(NodeKind::RecordExpression, attribute);
    builder.constant(0, ConstantKind::OpenBracket, "[");
    builder.start(NodeKind::ArrayWrapper, Some(1));
    for (index, (name, value)) in fields.iter().enumerate() {
        builder.start(NodeKind::Csv, Some(index as u32));
        builder.start(NodeKind::GeneralizedIdentifierPairedExpression, Some(0));
        builder.leaf(
            NodeKind::GeneralizedIdentifier,
            Some(0),
            AstNodePayload::GeneralizedIdentifier((*name).into()),
            name,
        );
        builder.constant(1, ConstantKind::Equal, "=");
        match value {
            Field::Number(text) => builder.numeric_literal(Some(2), text),
            Field::Text(text) => builder.text_literal(Some(2), text),
        };
        builder.finish();
        if index + 1 < fields.len() {
            builder.constant(1, ConstantKind::Comma, ",");
            builder.space();
        }
        builder.finish();
    }
    builder.finish();
    builder.constant(2, ConstantKind::CloseBracket, "]");
    builder.finish();
    id
}

/// Emits a `let` variable pair such as `x = 1`.
pub fn let_pair(
    builder: &mut TreeBuilder,
    csv_attribute: u32,
    name: &str,
    trailing_comma: bool,
    value: impl FnOnce(&mut TreeBuilder) -> NodeId,
) -> NodeId {
    builder.start(NodeKind::Csv, Some(csv_attribute));
    builder.start(NodeKind::IdentifierPairedExpression, Some(0));
    builder.leaf(
        NodeKind::Identifier,
        Some(0),
        AstNodePayload::Identifier(name.into()),
        name,
    );
    builder.space();
    builder.constant(1, ConstantKind::Equal, "=");
    builder.space();
    let value = value(builder);
    builder.finish();
    if trailing_comma {
        builder.constant(1, ConstantKind::Comma, ",");
    }
    builder.finish();
    if trailing_comma {
        builder.space();
    }
    value
}

/// Emits a function parameter such as `foo as number` or
/// `bar as nullable number`.
pub fn parameter(
    builder: &mut TreeBuilder,
    csv_attribute: u32,
    name: &str,
    nullable: bool,
    kind: PrimitiveTypeKind,
    trailing_comma: bool,
) {
    builder.start(NodeKind::Csv, Some(csv_attribute));
    builder.start(NodeKind::Parameter, Some(0));
    builder.leaf(
        NodeKind::Identifier,
        Some(1),
        AstNodePayload::Identifier(name.into()),
        name,
    );
    builder.space();
    builder.start(NodeKind::AsNullablePrimitiveType, Some(2));
    builder.constant(0, ConstantKind::As, "as");
    builder.space();
    if nullable {
        builder.start(NodeKind::NullablePrimitiveType, Some(1));
        builder.constant(0, ConstantKind::Nullable, "nullable");
        builder.space();
        builder.primitive_type(Some(1), kind);
        builder.finish();
    } else {
        builder.primitive_type(Some(1), kind);
    }
    builder.finish();
    builder.finish();
    if trailing_comma {
        builder.constant(1, ConstantKind::Comma, ",");
    }
    builder.finish();
    if trailing_comma {
        builder.space();
    }
}
