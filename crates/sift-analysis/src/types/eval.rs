//! Bottom-up type evaluation over the node forest.
//!
//! Evaluation dispatches on node kind and memoizes per call: shared
//! subtrees are typed once, and a self-referential binding chain
//! resolves to `unknown` instead of recursing forever. Binary operators
//! go through a dispatch table built once at first use; when the right
//! operand of an operator has not been parsed, a partial table derived
//! from it supplies the possible result kinds.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::LazyLock;

use indexmap::IndexMap;
use sift_syntax::ConstantKind;
use sift_syntax::NodeId;
use sift_syntax::NodeIdMap;
use sift_syntax::NodeKind;
use sift_syntax::XorNode;
use tracing::trace;

use crate::config::Settings;
use crate::diagnostics::unknown_node_id;
use crate::diagnostics::InspectionError;
use crate::scope::function_parameters;
use crate::scope::parameters_of;
use crate::scope::wrapped_elements;
use crate::scope::NodeScope;
use crate::scope::ScopeById;
use crate::scope::ScopeItem;
use crate::scope::ScopeState;
use crate::types::any_union;
use crate::types::ExtendedType;
use crate::types::FunctionParameter;
use crate::types::Type;
use crate::types::TypeKind;

/// A binary operator the dispatch table understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Operator {
    /// The `+` operator.
    Add,
    /// The `-` operator.
    Subtract,
    /// The `*` operator.
    Multiply,
    /// The `/` operator.
    Divide,
    /// The `&` operator.
    Concatenate,
    /// The `=` operator.
    Equal,
    /// The `<>` operator.
    NotEqual,
    /// The `<` operator.
    LessThan,
    /// The `<=` operator.
    LessThanEqualTo,
    /// The `>` operator.
    GreaterThan,
    /// The `>=` operator.
    GreaterThanEqualTo,
    /// The `and` operator.
    And,
    /// The `or` operator.
    Or,
}

/// Maps an operator constant to its dispatch-table operator.
fn operator_from_constant(kind: ConstantKind) -> Option<Operator> {
    match kind {
        ConstantKind::Addition => Some(Operator::Add),
        ConstantKind::Minus => Some(Operator::Subtract),
        ConstantKind::Multiplication => Some(Operator::Multiply),
        ConstantKind::Division => Some(Operator::Divide),
        ConstantKind::Concatenation => Some(Operator::Concatenate),
        ConstantKind::Equal => Some(Operator::Equal),
        ConstantKind::NotEqual => Some(Operator::NotEqual),
        ConstantKind::LessThan => Some(Operator::LessThan),
        ConstantKind::LessThanEqualTo => Some(Operator::LessThanEqualTo),
        ConstantKind::GreaterThan => Some(Operator::GreaterThan),
        ConstantKind::GreaterThanEqualTo => Some(Operator::GreaterThanEqualTo),
        ConstantKind::And => Some(Operator::And),
        ConstantKind::Or => Some(Operator::Or),
        _ => None,
    }
}

/// The clock-like kinds that combine with durations.
const CLOCK_KINDS: &[TypeKind] = &[
    TypeKind::Date,
    TypeKind::DateTime,
    TypeKind::DateTimeZone,
    TypeKind::Time,
];

/// The kinds that admit equality comparison.
const EQUATABLE_KINDS: &[TypeKind] = &[
    TypeKind::Null,
    TypeKind::Logical,
    TypeKind::Number,
    TypeKind::Time,
    TypeKind::Date,
    TypeKind::DateTime,
    TypeKind::DateTimeZone,
    TypeKind::Duration,
    TypeKind::Text,
    TypeKind::Binary,
    TypeKind::List,
    TypeKind::Record,
    TypeKind::Table,
];

/// The kinds that admit ordered comparison.
const ORDERABLE_KINDS: &[TypeKind] = &[
    TypeKind::Null,
    TypeKind::Logical,
    TypeKind::Number,
    TypeKind::Time,
    TypeKind::Date,
    TypeKind::DateTime,
    TypeKind::DateTimeZone,
    TypeKind::Duration,
    TypeKind::Text,
    TypeKind::Binary,
];

/// Builds the ordered entry list of the binary-operator table.
fn bin_op_entries() -> Vec<((TypeKind, Operator, TypeKind), TypeKind)> {
    let mut entries = Vec::new();

    for kind in EQUATABLE_KINDS {
        for op in [Operator::Equal, Operator::NotEqual] {
            entries.push(((*kind, op, *kind), TypeKind::Logical));
        }
    }

    for kind in ORDERABLE_KINDS {
        for op in [
            Operator::LessThan,
            Operator::LessThanEqualTo,
            Operator::GreaterThan,
            Operator::GreaterThanEqualTo,
        ] {
            entries.push(((*kind, op, *kind), TypeKind::Logical));
        }
    }

    for op in [
        Operator::Add,
        Operator::Subtract,
        Operator::Multiply,
        Operator::Divide,
    ] {
        entries.push(((TypeKind::Number, op, TypeKind::Number), TypeKind::Number));
    }

    for kind in CLOCK_KINDS {
        entries.push(((*kind, Operator::Add, TypeKind::Duration), *kind));
        entries.push(((TypeKind::Duration, Operator::Add, *kind), *kind));
        entries.push(((*kind, Operator::Subtract, TypeKind::Duration), *kind));
        entries.push(((*kind, Operator::Subtract, *kind), TypeKind::Duration));
    }
    entries.push((
        (TypeKind::Date, Operator::Add, TypeKind::Time),
        TypeKind::DateTime,
    ));
    entries.push((
        (TypeKind::Time, Operator::Add, TypeKind::Date),
        TypeKind::DateTime,
    ));

    for op in [Operator::Add, Operator::Subtract] {
        entries.push((
            (TypeKind::Duration, op, TypeKind::Duration),
            TypeKind::Duration,
        ));
    }
    entries.push((
        (TypeKind::Duration, Operator::Multiply, TypeKind::Number),
        TypeKind::Duration,
    ));
    entries.push((
        (TypeKind::Number, Operator::Multiply, TypeKind::Duration),
        TypeKind::Duration,
    ));
    entries.push((
        (TypeKind::Duration, Operator::Divide, TypeKind::Number),
        TypeKind::Duration,
    ));

    for kind in [
        TypeKind::Text,
        TypeKind::List,
        TypeKind::Record,
        TypeKind::Table,
    ] {
        entries.push(((kind, Operator::Concatenate, kind), kind));
    }

    for op in [Operator::And, Operator::Or] {
        entries.push(((TypeKind::Logical, op, TypeKind::Logical), TypeKind::Logical));
    }

    entries
}

/// The binary-operator dispatch table.
static BIN_OP_LOOKUP: LazyLock<HashMap<(TypeKind, Operator, TypeKind), TypeKind>> =
    LazyLock::new(|| bin_op_entries().into_iter().collect());

/// The partial dispatch table keyed by the left operand alone.
///
/// Derived from the full table in entry order, so the result-kind lists
/// are deterministic.
static BIN_OP_PARTIAL_LOOKUP: LazyLock<HashMap<(TypeKind, Operator), Vec<TypeKind>>> =
    LazyLock::new(|| {
        let mut partial: HashMap<(TypeKind, Operator), Vec<TypeKind>> = HashMap::new();
        for ((left, op, _), result) in bin_op_entries() {
            let results = partial.entry((left, op)).or_default();
            if !results.contains(&result) {
                results.push(result);
            }
        }

        partial
    });

/// The working state of a type evaluation.
#[derive(Debug)]
struct TypeState<'a> {
    /// The scope state used to resolve identifiers.
    scope: ScopeState<'a>,
    /// The per-call memo of already-typed nodes.
    cache: HashMap<NodeId, Type>,
    /// The nodes currently being typed, for cycle detection.
    in_progress: HashSet<NodeId>,
}

impl<'a> TypeState<'a> {
    /// Gets the node map of the document.
    fn map(&self) -> &'a NodeIdMap {
        self.scope.map
    }
}

/// Computes the type of a node.
///
/// The caller's scope cache, when given, accelerates identifier
/// resolution and is never mutated. The type memo lives only for the
/// duration of the call.
pub fn node_type(
    settings: &Settings,
    map: &NodeIdMap,
    id: NodeId,
    cache: Option<&ScopeById>,
) -> Result<Type, InspectionError> {
    if map.xor_node(id).is_none() {
        return Err(unknown_node_id(id));
    }

    let mut state = TypeState {
        scope: ScopeState::new(map, cache),
        cache: HashMap::new(),
        in_progress: HashSet::new(),
    };

    let ty = type_of(&mut state, id)?;
    trace!(node = %id, %ty, locale = settings.locale(), "typed node");
    Ok(ty)
}

/// Computes the type of each binding in a scope.
///
/// Parameters type from their declaration, `each` bindings are `any`,
/// and value bindings type from their bound value.
pub fn scope_types(
    _settings: &Settings,
    map: &NodeIdMap,
    scope: &NodeScope,
    cache: Option<&ScopeById>,
) -> Result<IndexMap<String, Type>, InspectionError> {
    let mut state = TypeState {
        scope: ScopeState::new(map, cache),
        cache: HashMap::new(),
        in_progress: HashSet::new(),
    };

    let mut types = IndexMap::with_capacity(scope.len());
    for (name, item) in scope {
        let ty = scope_item_type(&mut state, item)?;
        types.insert(name.clone(), ty);
    }

    Ok(types)
}

/// Computes the type of a single scope item.
fn scope_item_type(
    state: &mut TypeState<'_>,
    item: &ScopeItem,
) -> Result<Type, InspectionError> {
    match item {
        ScopeItem::Each { .. } => Ok(Type::primitive(TypeKind::Any)),
        ScopeItem::Parameter {
            is_nullable,
            primitive_type,
            ..
        } => Ok(parameter_type(*primitive_type, *is_nullable)),
        ScopeItem::KeyValuePair { value, .. } | ScopeItem::SectionMember { value, .. } => {
            match value {
                Some(value) => type_of(state, *value),
                None => Ok(Type::primitive(TypeKind::Unknown)),
            }
        }
        ScopeItem::Undefined { .. } => Ok(Type::primitive(TypeKind::Unknown)),
    }
}

/// Computes the type a declared parameter admits.
fn parameter_type(
    primitive_type: Option<sift_syntax::PrimitiveTypeKind>,
    is_nullable: bool,
) -> Type {
    match primitive_type {
        Some(kind) => {
            let ty = Type::from_primitive_constant(kind);
            Type::with_nullability(ty.kind, ty.is_nullable || is_nullable)
        }
        None => Type::primitive(TypeKind::Any),
    }
}

/// Computes the type of a node, memoized.
fn type_of(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    if let Some(ty) = state.cache.get(&id) {
        return Ok(ty.clone());
    }

    if !state.in_progress.insert(id) {
        // A self-referential chain; its type cannot be determined.
        return Ok(Type::primitive(TypeKind::Unknown));
    }

    let ty = dispatch(state, id);
    state.in_progress.remove(&id);

    let ty = ty?;
    state.cache.insert(id, ty.clone());
    Ok(ty)
}

/// Dispatches the type computation on the node's kind.
fn dispatch(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    let Some(node) = state.map().xor_node(id) else {
        return Err(unknown_node_id(id));
    };

    match node.kind() {
        NodeKind::LiteralExpression => Ok(literal_type(&node)),
        NodeKind::Constant => Ok(constant_type(&node)),
        NodeKind::ArithmeticExpression
        | NodeKind::EqualityExpression
        | NodeKind::LogicalExpression
        | NodeKind::RelationalExpression => binary_type(state, id),
        NodeKind::IsExpression => Ok(Type::primitive(TypeKind::Logical)),
        NodeKind::AsExpression => child_type(state, id, 2),
        NodeKind::MetadataExpression => child_type(state, id, 0),
        NodeKind::AsNullablePrimitiveType | NodeKind::AsType => child_type(state, id, 1),
        NodeKind::NullablePrimitiveType | NodeKind::NullableType => {
            let inner = child_type(state, id, 1)?;
            Ok(Type::with_nullability(inner.kind, true))
        }
        NodeKind::PrimitiveType => child_type(state, id, 0),
        NodeKind::IfExpression => if_type(state, id),
        NodeKind::EachExpression | NodeKind::OtherwiseExpression => child_type(state, id, 1),
        NodeKind::FunctionExpression => function_expression_type(state, id),
        NodeKind::ListExpression | NodeKind::ListLiteral => list_type(state, id),
        NodeKind::RecordExpression | NodeKind::RecordLiteral => record_type(state, id),
        NodeKind::FieldSelector => field_selector_type(state, id),
        NodeKind::FieldProjection => field_projection_type(state, id),
        NodeKind::ErrorHandlingExpression => error_handling_type(state, id),
        NodeKind::ErrorRaisingExpression => Ok(Type::primitive(TypeKind::Any)),
        NodeKind::UnaryExpression => unary_type(state, id),
        NodeKind::InvokeExpression => invoke_type(state, id),
        NodeKind::IdentifierExpression => identifier_expression_type(state, id, &node),
        NodeKind::Identifier => {
            match state.map().parent_id(id).and_then(|p| state.map().xor_node(p)) {
                Some(parent) if parent.kind() == NodeKind::IdentifierExpression => {
                    type_of(state, parent.id())
                }
                _ => Ok(Type::primitive(TypeKind::Unknown)),
            }
        }
        NodeKind::ParenthesizedExpression => child_type(state, id, 1),
        NodeKind::RecursivePrimaryExpression => recursive_primary_type(state, id),
        NodeKind::TypePrimaryType => {
            let inner = child_type(state, id, 1)?;
            Ok(Type {
                kind: TypeKind::Type,
                is_nullable: false,
                extended: Some(ExtendedType::DefinedType(Box::new(inner))),
            })
        }
        NodeKind::ListType => {
            let item = child_type(state, id, 1)?;
            Ok(Type {
                kind: TypeKind::Type,
                is_nullable: false,
                extended: Some(ExtendedType::ListType(Box::new(item))),
            })
        }
        NodeKind::RecordType => {
            let (fields, is_open) = match state.map().child_by_attribute_index(id, 0) {
                Some(list) => field_specifications(state, list.id())?,
                None => (IndexMap::new(), false),
            };
            Ok(Type {
                kind: TypeKind::Type,
                is_nullable: false,
                extended: Some(ExtendedType::DefinedRecord { fields, is_open }),
            })
        }
        NodeKind::TableType => table_type(state, id),
        NodeKind::FunctionType => function_type(state, id),
        _ => Ok(Type::primitive(TypeKind::Unknown)),
    }
}

/// Computes the type of a child by attribute index.
///
/// A missing or partially parsed child is `unknown`.
fn child_type(
    state: &mut TypeState<'_>,
    id: NodeId,
    attribute: u32,
) -> Result<Type, InspectionError> {
    match state.map().child_by_attribute_index(id, attribute) {
        Some(XorNode::Ast(child)) => type_of(state, child.id),
        Some(XorNode::Context(_)) | None => Ok(Type::primitive(TypeKind::Unknown)),
    }
}

/// Computes the type of a literal.
fn literal_type(node: &XorNode<'_>) -> Type {
    let Some(kind) = node.as_ast().and_then(|ast| ast.literal_kind()) else {
        return Type::primitive(TypeKind::Unknown);
    };

    match kind {
        sift_syntax::LiteralKind::Logical => Type::primitive(TypeKind::Logical),
        sift_syntax::LiteralKind::Null => Type::primitive(TypeKind::Null),
        sift_syntax::LiteralKind::Numeric => Type::primitive(TypeKind::Number),
        sift_syntax::LiteralKind::Text => Type::primitive(TypeKind::Text),
    }
}

/// Computes the type of a constant.
///
/// Only primitive-type constants have a type; every other constant is
/// not applicable.
fn constant_type(node: &XorNode<'_>) -> Type {
    match node.as_ast().and_then(|ast| ast.constant_kind()) {
        Some(ConstantKind::Primitive(kind)) => Type::from_primitive_constant(kind),
        _ => Type::primitive(TypeKind::NotApplicable),
    }
}

/// Computes the type of a binary operator expression.
fn binary_type(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    let Some(operator) = state
        .map()
        .ast_child_by_attribute_index(id, 1)
        .and_then(|constant| constant.constant_kind())
        .and_then(operator_from_constant)
    else {
        return Ok(Type::primitive(TypeKind::Unknown));
    };

    let Some(XorNode::Ast(left)) = state.map().child_by_attribute_index(id, 0) else {
        return Ok(Type::primitive(TypeKind::Unknown));
    };
    let left = type_of(state, left.id)?;

    let right = match state.map().child_by_attribute_index(id, 2) {
        Some(XorNode::Ast(right)) => Some(type_of(state, right.id)?),
        Some(XorNode::Context(_)) | None => None,
    };

    let Some(right) = right else {
        return Ok(partial_lookup(&left, operator));
    };

    // Record and table concatenation merges the field maps instead of
    // consulting the table.
    if operator == Operator::Concatenate
        && left.kind == right.kind
        && matches!(left.kind, TypeKind::Record | TypeKind::Table)
    {
        return Ok(merge_fielded(&left, &right));
    }

    match BIN_OP_LOOKUP.get(&(left.kind, operator, right.kind)) {
        Some(result) => Ok(Type::with_nullability(
            *result,
            left.is_nullable || right.is_nullable,
        )),
        None => Ok(Type::primitive(TypeKind::None)),
    }
}

/// Computes the result type when only the left operand is known.
fn partial_lookup(left: &Type, operator: Operator) -> Type {
    let results = BIN_OP_PARTIAL_LOOKUP
        .get(&(left.kind, operator))
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    match results {
        [] => Type::primitive(TypeKind::None),
        [kind] => Type::with_nullability(*kind, left.is_nullable),
        kinds => {
            let mut ty = any_union(kinds.iter().map(|kind| Type::primitive(*kind)).collect());
            ty.is_nullable = true;
            ty
        }
    }
}

/// Merges two record or table types under concatenation.
///
/// Fields from the right side win on key collision. A primitive side
/// contributes unknown fields, opening the result.
fn merge_fielded(left: &Type, right: &Type) -> Type {
    let is_nullable = left.is_nullable || right.is_nullable;
    let kind = left.kind;

    let left_fields = defined_fields(left);
    let right_fields = defined_fields(right);

    match (left_fields, right_fields) {
        (None, None) => Type::with_nullability(kind, is_nullable),
        // A primitive side has unknown fields, so the merge is open no
        // matter what the defined side says.
        (Some((fields, _)), None) | (None, Some((fields, _))) => {
            fielded(kind, fields.clone(), true, is_nullable)
        }
        (Some((left_fields, left_open)), Some((right_fields, right_open))) => {
            let mut fields = left_fields.clone();
            for (key, value) in right_fields {
                fields.insert(key.clone(), value.clone());
            }
            fielded(kind, fields, left_open || right_open, is_nullable)
        }
    }
}

/// Gets the field map and openness of a defined record or table type.
pub(crate) fn defined_fields(ty: &Type) -> Option<(&IndexMap<String, Type>, bool)> {
    match &ty.extended {
        Some(ExtendedType::DefinedRecord { fields, is_open })
        | Some(ExtendedType::DefinedTable { fields, is_open }) => Some((fields, *is_open)),
        _ => None,
    }
}

/// Constructs a defined record or table type.
fn fielded(kind: TypeKind, fields: IndexMap<String, Type>, is_open: bool, is_nullable: bool) -> Type {
    let extended = if kind == TypeKind::Table {
        ExtendedType::DefinedTable { fields, is_open }
    } else {
        ExtendedType::DefinedRecord { fields, is_open }
    };

    Type {
        kind,
        is_nullable,
        extended: Some(extended),
    }
}

/// Computes the type of an `if` expression.
fn if_type(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    let true_branch = match state.map().child_by_attribute_index(id, 3) {
        Some(XorNode::Ast(child)) => Some(type_of(state, child.id)?),
        _ => None,
    };
    let false_branch = match state.map().child_by_attribute_index(id, 5) {
        Some(XorNode::Ast(child)) => Some(type_of(state, child.id)?),
        _ => None,
    };

    // An unfinished branch makes the whole expression indeterminate,
    // before the condition is even considered.
    let (Some(true_branch), Some(false_branch)) = (true_branch, false_branch) else {
        return Ok(Type::primitive(TypeKind::Unknown));
    };
    if true_branch.kind == TypeKind::Unknown || false_branch.kind == TypeKind::Unknown {
        return Ok(Type::primitive(TypeKind::Unknown));
    }

    let condition = child_type(state, id, 1)?;
    if !matches!(condition.kind, TypeKind::Logical | TypeKind::Any) {
        return Ok(Type::primitive(TypeKind::None));
    }

    if true_branch.is_primitive() && true_branch.kind == TypeKind::Any {
        let is_nullable = true_branch.is_nullable || false_branch.is_nullable;
        return Ok(Type::with_nullability(TypeKind::Any, is_nullable));
    }
    if false_branch.is_primitive() && false_branch.kind == TypeKind::Any {
        let is_nullable = true_branch.is_nullable || false_branch.is_nullable;
        return Ok(Type::with_nullability(TypeKind::Any, is_nullable));
    }

    Ok(any_union(vec![true_branch, false_branch]))
}

/// Computes the type of a function expression.
fn function_expression_type(
    state: &mut TypeState<'_>,
    id: NodeId,
) -> Result<Type, InspectionError> {
    let parameters = function_parameters(state.map(), id)
        .into_iter()
        .map(|parameter| FunctionParameter {
            name: parameter.name,
            is_optional: parameter.is_optional,
            is_nullable: parameter.is_nullable,
            maybe_type: parameter
                .primitive_type
                .map(|kind| Type::from_primitive_constant(kind).kind),
        })
        .collect();
    let return_type = child_type(state, id, 3)?;

    Ok(Type {
        kind: TypeKind::Function,
        is_nullable: false,
        extended: Some(ExtendedType::DefinedFunction {
            parameters,
            return_type: Box::new(return_type),
        }),
    })
}

/// Computes the type of a list expression.
fn list_type(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    let mut elements = Vec::new();
    if let Some(wrapper) = state.map().child_by_attribute_index(id, 1) {
        let items: Vec<NodeId> = wrapped_elements(state.map(), wrapper.id())
            .into_iter()
            .map(|element| element.id())
            .collect();
        for item in items {
            elements.push(type_of(state, item)?);
        }
    }

    Ok(Type {
        kind: TypeKind::List,
        is_nullable: false,
        extended: Some(ExtendedType::DefinedList(elements)),
    })
}

/// Computes the type of a record expression.
fn record_type(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    let mut fields = IndexMap::new();
    if let Some(wrapper) = state.map().child_by_attribute_index(id, 1) {
        let pairs: Vec<NodeId> = wrapped_elements(state.map(), wrapper.id())
            .into_iter()
            .filter(|element| element.kind().is_key_value_pair())
            .map(|element| element.id())
            .collect();

        for pair in pairs {
            let Some(key) = state
                .map()
                .ast_child_by_attribute_index(pair, 0)
                .and_then(|key| key.identifier_literal())
                .map(str::to_string)
            else {
                continue;
            };

            let value = child_type(state, pair, 2)?;
            fields.insert(key, value);
        }
    }

    Ok(fielded(TypeKind::Record, fields, false, false))
}

/// Finds the expression a trailing accessor applies to.
///
/// Accessors (invocations, field selectors, projections, item accesses)
/// hang off a primary expression in a sequence; the subject of each is
/// the previous accessor, or the head for the first.
pub(crate) fn accessor_subject(map: &NodeIdMap, id: NodeId) -> Option<NodeId> {
    let wrapper = map.parent_id(id)?;
    let primary = map.parent_id(wrapper)?;
    let primary_node = map.xor_node(primary)?;
    if primary_node.kind() != NodeKind::RecursivePrimaryExpression {
        return None;
    }

    let siblings = map.child_ids(wrapper);
    let position = siblings.iter().position(|sibling| *sibling == id)?;
    match position {
        0 => map.child_by_attribute_index(primary, 0).map(|head| head.id()),
        _ => Some(siblings[position - 1]),
    }
}

/// Computes the type of a field selector.
fn field_selector_type(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    let Some(key) = state
        .map()
        .ast_child_by_attribute_index(id, 1)
        .and_then(|key| key.identifier_literal())
        .map(str::to_string)
    else {
        return Ok(Type::primitive(TypeKind::Unknown));
    };
    let optional = state.map().child_by_attribute_index(id, 3).is_some();

    let Some(subject) = accessor_subject(state.map(), id) else {
        return Ok(Type::primitive(TypeKind::Unknown));
    };
    let subject = type_of(state, subject)?;

    Ok(select_field(&subject, &key, optional))
}

/// Selects a field from a record or table type.
///
/// An optional miss is `null` no matter how open the record is; only a
/// required miss distinguishes open (`any`) from closed (`none`).
fn select_field(subject: &Type, key: &str, optional: bool) -> Type {
    match defined_fields(subject) {
        Some((fields, is_open)) => match fields.get(key) {
            Some(ty) => ty.clone(),
            None if optional => Type::primitive(TypeKind::Null),
            None if is_open => Type::primitive(TypeKind::Any),
            None => Type::primitive(TypeKind::None),
        },
        None => match subject.kind {
            // A primitive record or table has unknown fields.
            TypeKind::Record | TypeKind::Table | TypeKind::Any => {
                if optional {
                    Type::primitive(TypeKind::Null)
                } else {
                    Type::primitive(TypeKind::Any)
                }
            }
            TypeKind::Unknown => Type::primitive(TypeKind::Unknown),
            _ => Type::primitive(TypeKind::None),
        },
    }
}

/// Computes the type of a field projection.
fn field_projection_type(
    state: &mut TypeState<'_>,
    id: NodeId,
) -> Result<Type, InspectionError> {
    let keys = projection_keys(state.map(), id);
    if keys.is_empty() {
        return Ok(Type::primitive(TypeKind::Unknown));
    }

    let Some(subject) = accessor_subject(state.map(), id) else {
        return Ok(Type::primitive(TypeKind::Unknown));
    };
    let subject = type_of(state, subject)?;

    match defined_fields(&subject) {
        Some((fields, is_open)) => {
            let mut projected = IndexMap::new();
            for (key, optional) in &keys {
                match fields.get(key) {
                    Some(ty) => {
                        projected.insert(key.clone(), ty.clone());
                    }
                    None if *optional => {
                        projected.insert(key.clone(), Type::primitive(TypeKind::Null));
                    }
                    None if is_open => {
                        projected.insert(key.clone(), Type::primitive(TypeKind::Any));
                    }
                    None => return Ok(Type::primitive(TypeKind::None)),
                }
            }

            Ok(fielded(subject.kind, projected, false, false))
        }
        None => {
            let any_fields = || {
                keys.iter()
                    .map(|(key, _)| (key.clone(), Type::primitive(TypeKind::Any)))
                    .collect::<IndexMap<_, _>>()
            };

            match subject.kind {
                TypeKind::Record => Ok(fielded(TypeKind::Record, any_fields(), false, false)),
                TypeKind::Table => Ok(fielded(TypeKind::Table, any_fields(), false, false)),
                TypeKind::Any => Ok(any_union(vec![
                    fielded(TypeKind::Record, any_fields(), false, false),
                    fielded(TypeKind::Table, any_fields(), false, false),
                ])),
                TypeKind::Unknown => Ok(Type::primitive(TypeKind::Unknown)),
                _ => Ok(Type::primitive(TypeKind::None)),
            }
        }
    }
}

/// Reads the selected keys of a field projection.
fn projection_keys(map: &NodeIdMap, id: NodeId) -> Vec<(String, bool)> {
    let Some(wrapper) = map.child_by_attribute_index(id, 1) else {
        return Vec::new();
    };

    wrapped_elements(map, wrapper.id())
        .into_iter()
        .filter(|element| element.kind() == NodeKind::FieldSelector)
        .filter_map(|selector| {
            let key = map
                .ast_child_by_attribute_index(selector.id(), 1)
                .and_then(|key| key.identifier_literal())?
                .to_string();
            let optional = map.child_by_attribute_index(selector.id(), 3).is_some();
            Some((key, optional))
        })
        .collect()
}

/// Computes the type of a `try` expression.
fn error_handling_type(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    let body = child_type(state, id, 1)?;

    match state.map().child_by_attribute_index(id, 2) {
        Some(XorNode::Ast(otherwise)) => {
            let fallback = type_of(state, otherwise.id)?;
            Ok(any_union(vec![body, fallback]))
        }
        Some(XorNode::Context(_)) => Ok(Type::primitive(TypeKind::Unknown)),
        // Without an `otherwise` clause the expression yields either the
        // protected value or an error record.
        None => Ok(any_union(vec![body, Type::primitive(TypeKind::Record)])),
    }
}

/// Computes the type of a unary expression.
fn unary_type(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    let mut current = child_type(state, id, 1)?;

    let operators: Vec<ConstantKind> = match state.map().child_by_attribute_index(id, 0) {
        Some(wrapper) => state
            .map()
            .child_ids(wrapper.id())
            .iter()
            .filter_map(|child| state.map().ast_node(*child))
            .filter_map(|constant| constant.constant_kind())
            .collect(),
        None => Vec::new(),
    };

    // Operators apply innermost (right-most) first.
    for operator in operators.iter().rev() {
        current = match operator {
            ConstantKind::Not => match current.kind {
                TypeKind::Logical => Type::with_nullability(TypeKind::Logical, current.is_nullable),
                _ => Type::primitive(TypeKind::None),
            },
            ConstantKind::Addition | ConstantKind::Minus => match current.kind {
                TypeKind::Number => Type::with_nullability(TypeKind::Number, current.is_nullable),
                _ => Type::primitive(TypeKind::None),
            },
            _ => Type::primitive(TypeKind::None),
        };
    }

    Ok(current)
}

/// Computes the type of an invocation.
fn invoke_type(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    let Some(subject) = accessor_subject(state.map(), id) else {
        return Ok(Type::primitive(TypeKind::Unknown));
    };
    let subject = type_of(state, subject)?;

    match &subject.extended {
        Some(ExtendedType::DefinedFunction { return_type, .. }) => Ok((**return_type).clone()),
        _ => match subject.kind {
            TypeKind::Function | TypeKind::Any => Ok(Type::primitive(TypeKind::Any)),
            TypeKind::Unknown => Ok(Type::primitive(TypeKind::Unknown)),
            _ => Ok(Type::primitive(TypeKind::None)),
        },
    }
}

/// Computes the type of an identifier in expression position.
fn identifier_expression_type(
    state: &mut TypeState<'_>,
    id: NodeId,
    node: &XorNode<'_>,
) -> Result<Type, InspectionError> {
    let Some(literal) = state
        .map()
        .ast_child_by_attribute_index(id, 1)
        .and_then(|identifier| identifier.identifier_literal())
        .map(str::to_string)
    else {
        return Ok(Type::primitive(TypeKind::Unknown));
    };
    let inclusive = state.map().child_by_attribute_index(id, 0).is_some();

    let ancestry = state.map().ancestry(node.id());
    state.scope.inspect_ancestry(&ancestry);
    let scope = state.scope.get_or_create(id);

    let item = match scope.get(&literal) {
        Some(item) if item.is_recursive() == inclusive => item.clone(),
        _ => return Ok(Type::primitive(TypeKind::Unknown)),
    };

    scope_item_type(state, &item)
}

/// Computes the type of a primary expression with trailing accessors.
fn recursive_primary_type(
    state: &mut TypeState<'_>,
    id: NodeId,
) -> Result<Type, InspectionError> {
    let last = state
        .map()
        .child_by_attribute_index(id, 1)
        .and_then(|wrapper| state.map().child_ids(wrapper.id()).last().copied());

    match last {
        Some(last) => type_of(state, last),
        None => child_type(state, id, 0),
    }
}

/// Computes the type of a table type.
fn table_type(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    match state.map().child_by_attribute_index(id, 1) {
        Some(row) if row.kind() == NodeKind::FieldSpecificationList => {
            let (fields, is_open) = field_specifications(state, row.id())?;
            Ok(Type {
                kind: TypeKind::Type,
                is_nullable: false,
                extended: Some(ExtendedType::DefinedTable { fields, is_open }),
            })
        }
        Some(XorNode::Ast(row)) => {
            let inner = type_of(state, row.id)?;
            Ok(Type {
                kind: TypeKind::Type,
                is_nullable: false,
                extended: Some(ExtendedType::PrimaryExpressionTable(Box::new(inner))),
            })
        }
        _ => Ok(Type::primitive(TypeKind::Unknown)),
    }
}

/// Computes the type of a function type.
fn function_type(state: &mut TypeState<'_>, id: NodeId) -> Result<Type, InspectionError> {
    let parameters = match state.map().child_by_attribute_index(id, 1) {
        Some(list) => parameters_of(state.map(), list.id())
            .into_iter()
            .map(|parameter| FunctionParameter {
                name: parameter.name,
                is_optional: parameter.is_optional,
                is_nullable: parameter.is_nullable,
                maybe_type: parameter
                    .primitive_type
                    .map(|kind| Type::from_primitive_constant(kind).kind),
            })
            .collect(),
        None => Vec::new(),
    };
    let return_type = child_type(state, id, 2)?;

    Ok(Type {
        kind: TypeKind::Type,
        is_nullable: false,
        extended: Some(ExtendedType::DefinedFunction {
            parameters,
            return_type: Box::new(return_type),
        }),
    })
}

/// Reads the fields of a field specification list.
fn field_specifications(
    state: &mut TypeState<'_>,
    id: NodeId,
) -> Result<(IndexMap<String, Type>, bool), InspectionError> {
    let is_open = state.map().child_by_attribute_index(id, 2).is_some();
    let mut fields = IndexMap::new();

    if let Some(wrapper) = state.map().child_by_attribute_index(id, 1) {
        let specifications: Vec<NodeId> = wrapped_elements(state.map(), wrapper.id())
            .into_iter()
            .filter(|element| element.kind() == NodeKind::FieldSpecification)
            .map(|element| element.id())
            .collect();

        for specification in specifications {
            let Some(name) = state
                .map()
                .ast_child_by_attribute_index(specification, 1)
                .and_then(|name| name.identifier_literal())
                .map(str::to_string)
            else {
                continue;
            };

            let ty = match state.map().child_by_attribute_index(specification, 2) {
                Some(clause) => child_type(state, clause.id(), 1)?,
                None => Type::primitive(TypeKind::Any),
            };
            fields.insert(name, ty);
        }
    }

    Ok((fields, is_open))
}
