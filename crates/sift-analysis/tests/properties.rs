//! Cross-cutting invariants of the inspection engine.

use pretty_assertions::assert_eq;
use sift_analysis::scope::scope_for_root;
use sift_analysis::types::eval::node_type;
use sift_analysis::types::Type;
use sift_analysis::types::TypeKind;
use sift_analysis::ActiveNode;
use sift_analysis::Settings;
use sift_syntax::AstNodePayload;
use sift_syntax::ConstantKind;
use sift_syntax::NodeId;
use sift_syntax::NodeKind;
use sift_syntax::Position;
use sift_syntax::PrimitiveTypeKind;
use sift_syntax::TreeBuilder;

mod common;

use common::caret;
use common::let_pair;
use common::parameter;
use common::record;
use common::Field;

/// Emits a field selector such as `[a]` or `[a]?`.
fn field_selector(builder: &mut TreeBuilder, attribute: u32, key: &str, optional: bool) -> NodeId {
    let id = builder.start(NodeKind::FieldSelector, Some(attribute));
    builder.constant(0, ConstantKind::OpenBracket, "[");
    builder.leaf(
        NodeKind::GeneralizedIdentifier,
        Some(1),
        AstNodePayload::GeneralizedIdentifier(key.into()),
        key,
    );
    builder.constant(2, ConstantKind::CloseBracket, "]");
    if optional {
        builder.constant(3, ConstantKind::QuestionMark, "?");
    }
    builder.finish();
    id
}

/// Builds `[a=1][<key>]` and returns the selector's type.
fn select(key: &str, optional: bool) -> Type {
    let mut builder = TreeBuilder::new();
    builder.start(NodeKind::RecursivePrimaryExpression, None);
    record(&mut builder, Some(0), &[("a", Field::Number("1"))]);
    builder.start(NodeKind::ArrayWrapper, Some(1));
    let selector = field_selector(&mut builder, 0, key, optional);
    builder.finish();
    builder.finish();
    let map = builder.build();

    node_type(&Settings::default(), &map, selector, None).expect("typing should succeed")
}

#[test]
fn field_selection_is_exhaustive() {
    assert_eq!(select("a", false), Type::primitive(TypeKind::Number));
    assert_eq!(select("a", true), Type::primitive(TypeKind::Number));
    assert_eq!(select("b", false), Type::primitive(TypeKind::None));
    assert_eq!(select("b", true), Type::primitive(TypeKind::Null));
}

/// Builds `(r as record) => (r & [a=1])<accessor>` and returns the
/// accessor's type.
///
/// Merging a `record`-typed parameter with a literal record leaves the
/// merged fields open.
fn open_record_access(build: impl FnOnce(&mut TreeBuilder) -> NodeId) -> Type {
    let mut builder = TreeBuilder::new();
    builder.start(NodeKind::FunctionExpression, None);
    builder.start(NodeKind::ParameterList, Some(0));
    builder.constant(0, ConstantKind::OpenParenthesis, "(");
    builder.start(NodeKind::ArrayWrapper, Some(1));
    parameter(&mut builder, 0, "r", false, PrimitiveTypeKind::Record, false);
    builder.finish();
    builder.constant(2, ConstantKind::CloseParenthesis, ")");
    builder.finish();
    builder.space();
    builder.constant(2, ConstantKind::FatArrow, "=>");
    builder.space();
    builder.start(NodeKind::RecursivePrimaryExpression, Some(3));
    builder.start(NodeKind::ParenthesizedExpression, Some(0));
    builder.constant(0, ConstantKind::OpenParenthesis, "(");
    builder.start(NodeKind::ArithmeticExpression, Some(1));
    builder.identifier_expression(Some(0), "r");
    builder.space();
    builder.constant(1, ConstantKind::Concatenation, "&");
    builder.space();
    record(&mut builder, Some(2), &[("a", Field::Number("1"))]);
    builder.finish();
    builder.constant(2, ConstantKind::CloseParenthesis, ")");
    builder.finish();
    builder.start(NodeKind::ArrayWrapper, Some(1));
    let accessor = build(&mut builder);
    builder.finish();
    builder.finish();
    builder.finish();
    let map = builder.build();

    node_type(&Settings::default(), &map, accessor, None).expect("typing should succeed")
}

#[test]
fn open_records_answer_optional_misses_with_null() {
    // `(r as record) => (r & [a=1])[b]?`: the merge is open, but an
    // optional miss is still null.
    let ty = open_record_access(|b| field_selector(b, 0, "b", true));
    assert_eq!(ty, Type::primitive(TypeKind::Null));

    // Without `?` the open record may still carry the field.
    let ty = open_record_access(|b| field_selector(b, 0, "b", false));
    assert_eq!(ty, Type::primitive(TypeKind::Any));

    // Known fields select exactly.
    let ty = open_record_access(|b| field_selector(b, 0, "a", false));
    assert_eq!(ty, Type::primitive(TypeKind::Number));
}

#[test]
fn open_records_project_optional_misses_as_null() {
    // `(r as record) => (r & [a=1])[[b]?]`.
    let ty = open_record_access(|b| {
        let projection = b.start(NodeKind::FieldProjection, Some(0));
        b.constant(0, ConstantKind::OpenBracket, "[");
        b.start(NodeKind::ArrayWrapper, Some(1));
        b.start(NodeKind::Csv, Some(0));
        field_selector(b, 0, "b", true);
        b.finish();
        b.finish();
        b.constant(2, ConstantKind::CloseBracket, "]");
        b.finish();
        projection
    });

    assert_eq!(ty.kind, TypeKind::Record);
    match &ty.extended {
        Some(sift_analysis::types::ExtendedType::DefinedRecord { fields, is_open }) => {
            assert!(!is_open);
            assert_eq!(fields["b"], Type::primitive(TypeKind::Null));
        }
        other => panic!("expected a defined record, got {other:?}"),
    }
}

#[test]
fn projections_keep_the_selected_keys() {
    // `[a=1][[a], [b]?]`.
    let mut builder = TreeBuilder::new();
    builder.start(NodeKind::RecursivePrimaryExpression, None);
    record(&mut builder, Some(0), &[("a", Field::Number("1"))]);
    builder.start(NodeKind::ArrayWrapper, Some(1));
    let projection = builder.start(NodeKind::FieldProjection, Some(0));
    builder.constant(0, ConstantKind::OpenBracket, "[");
    builder.start(NodeKind::ArrayWrapper, Some(1));
    builder.start(NodeKind::Csv, Some(0));
    field_selector(&mut builder, 0, "a", false);
    builder.constant(1, ConstantKind::Comma, ",");
    builder.finish();
    builder.space();
    builder.start(NodeKind::Csv, Some(1));
    field_selector(&mut builder, 0, "b", true);
    builder.finish();
    builder.finish();
    builder.constant(2, ConstantKind::CloseBracket, "]");
    builder.finish();
    builder.finish();
    builder.finish();
    let map = builder.build();

    let ty = node_type(&Settings::default(), &map, projection, None)
        .expect("typing should succeed");
    assert_eq!(ty.kind, TypeKind::Record);
    match &ty.extended {
        Some(sift_analysis::types::ExtendedType::DefinedRecord { fields, is_open }) => {
            assert!(!is_open);
            assert_eq!(fields["a"], Type::primitive(TypeKind::Number));
            assert_eq!(fields["b"], Type::primitive(TypeKind::Null));
        }
        other => panic!("expected a defined record, got {other:?}"),
    }
}

/// Builds `let a = 1 in let b = 2 in a` and returns the map along with
/// the ids of the outer body and the innermost leaf.
fn nested_lets() -> (sift_syntax::NodeIdMap, NodeId, NodeId) {
    let mut builder = TreeBuilder::new();
    builder.start(NodeKind::LetExpression, None);
    builder.constant(0, ConstantKind::Let, "let");
    builder.space();
    builder.start(NodeKind::ArrayWrapper, Some(1));
    let_pair(&mut builder, 0, "a", false, |b| b.numeric_literal(Some(2), "1"));
    builder.finish();
    builder.space();
    builder.constant(2, ConstantKind::In, "in");
    builder.space();
    let outer_body = builder.start(NodeKind::LetExpression, Some(3));
    builder.constant(0, ConstantKind::Let, "let");
    builder.space();
    builder.start(NodeKind::ArrayWrapper, Some(1));
    let_pair(&mut builder, 0, "b", false, |b| b.numeric_literal(Some(2), "2"));
    builder.finish();
    builder.space();
    builder.constant(2, ConstantKind::In, "in");
    builder.space();
    let leaf = builder.identifier_expression(Some(3), "a");
    builder.finish();
    builder.finish();
    (builder.build(), outer_body, leaf)
}

#[test]
fn scopes_grow_monotonically_along_the_ancestry() {
    let (map, outer_body, leaf) = nested_lets();
    let settings = Settings::default();

    let outer = scope_for_root(&settings, &map, &map.ancestry(outer_body), None)
        .expect("scope should resolve");
    let inner = scope_for_root(&settings, &map, &map.ancestry(leaf), None)
        .expect("scope should resolve");

    assert_eq!(outer.len(), 1);
    assert_eq!(inner.len(), 2);
    for key in outer.keys() {
        assert!(inner.contains_key(key), "inner scope lost `{key}`");
    }
}

#[test]
fn inner_references_resolve_through_outer_bindings() {
    let (map, _, leaf) = nested_lets();
    let settings = Settings::default();

    // `a` in the innermost body types through `a = 1`.
    let ty = node_type(&settings, &map, leaf, None).expect("typing should succeed");
    assert_eq!(ty, Type::primitive(TypeKind::Number));
}

#[test]
fn ancestries_are_root_anchored() {
    let (map, _, leaf) = nested_lets();
    let leaf_node = map.ast_node(leaf).expect("leaf should exist");
    let position = Position::new(
        leaf_node.token_range.position_end.line_number,
        leaf_node.token_range.position_end.line_code_unit,
    );

    let active = ActiveNode::from_position(&map, position).expect("should resolve");
    let ancestry = active.ancestry();
    assert!(ancestry.len() >= 2);
    assert_eq!(
        ancestry.last().expect("should have a root").kind(),
        NodeKind::LetExpression
    );
    assert_eq!(
        map.parent_id(ancestry.last().expect("should have a root").id()),
        None
    );
    for pair in ancestry.windows(2) {
        assert_eq!(map.parent_id(pair[0].id()), Some(pair[1].id()));
    }
}

#[test]
fn exactly_one_binding_is_recursive_under_a_value() {
    // `let a = 1, b = a in b` with the caret inside `b`'s value.
    let mut builder = TreeBuilder::new();
    builder.start(NodeKind::LetExpression, None);
    builder.constant(0, ConstantKind::Let, "let");
    builder.space();
    builder.start(NodeKind::ArrayWrapper, Some(1));
    let_pair(&mut builder, 0, "a", true, |b| b.numeric_literal(Some(2), "1"));
    let value = let_pair(&mut builder, 1, "b", false, |b| {
        b.identifier_expression(Some(2), "a")
    });
    builder.finish();
    builder.space();
    builder.constant(2, ConstantKind::In, "in");
    builder.space();
    builder.identifier_expression(Some(3), "b");
    builder.finish();
    let map = builder.build();
    let settings = Settings::default();

    let scope = scope_for_root(&settings, &map, &map.ancestry(value), None)
        .expect("scope should resolve");
    let recursive: Vec<_> = scope
        .iter()
        .filter(|(_, item)| item.is_recursive())
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(recursive, vec!["b"]);
}

#[test]
fn keyword_results_honor_the_typed_prefix() {
    // `let x = 1 in t|` completing `true`, `try`, or `type`.
    let mut builder = TreeBuilder::new();
    builder.start(NodeKind::LetExpression, None);
    builder.constant(0, ConstantKind::Let, "let");
    builder.space();
    builder.start(NodeKind::ArrayWrapper, Some(1));
    let_pair(&mut builder, 0, "x", false, |b| b.numeric_literal(Some(2), "1"));
    builder.finish();
    builder.space();
    builder.constant(2, ConstantKind::In, "in");
    builder.space();
    builder.identifier_expression(Some(3), "t");
    let position = caret(&builder);
    builder.finish();
    let map = builder.build();
    let settings = Settings::default();

    let inspection = sift_analysis::inspect(&settings, &map, position, None, None);
    let keywords = inspection.keyword.expect("keywords should resolve");
    assert_eq!(keywords, vec![
        sift_syntax::Keyword::True,
        sift_syntax::Keyword::Try,
        sift_syntax::Keyword::Type,
    ]);
    for keyword in &keywords {
        assert!(
            keyword.as_str().starts_with('t'),
            "`{keyword}` does not extend the typed prefix"
        );
    }
}
