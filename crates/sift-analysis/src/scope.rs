//! Scope resolution for Sift documents.
//!
//! A scope maps identifiers to the bindings in force at a node. Scopes
//! are computed by walking an ancestry from the root down to the node of
//! interest: each binder kind along the way (each, function, let,
//! record, section) extends the scopes of the children it binds.
//!
//! A caller may hand back the scope map returned by an earlier
//! inspection as a cache. The cache is never mutated: all writes go to a
//! fresh delta map which is returned (as the merged view) only when the
//! inspection succeeds.

use std::collections::HashMap;
use std::collections::HashSet;

use indexmap::IndexMap;
use sift_syntax::NodeId;
use sift_syntax::NodeIdMap;
use sift_syntax::NodeKind;
use sift_syntax::PrimitiveTypeKind;
use sift_syntax::XorNode;
use tracing::trace;

use crate::config::Settings;
use crate::diagnostics::ancestry_too_short;
use crate::diagnostics::InspectionError;
use crate::traversal;
use crate::traversal::Strategy;

/// A binding visible at a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeItem {
    /// The implicit `_` binding of an `each` expression.
    Each {
        /// The id of the `each` expression that introduced the binding.
        id: NodeId,
        /// Whether the binding may only be referenced inclusively.
        is_recursive: bool,
    },
    /// A key/value binding from a `let` variable list or a record field.
    KeyValuePair {
        /// The id of the pair that introduced the binding.
        id: NodeId,
        /// Whether the binding may only be referenced inclusively.
        is_recursive: bool,
        /// The bound identifier.
        key: String,
        /// The id of the bound value, when it parsed.
        value: Option<NodeId>,
    },
    /// A function parameter.
    Parameter {
        /// The id of the parameter node that introduced the binding.
        id: NodeId,
        /// Whether the binding may only be referenced inclusively.
        is_recursive: bool,
        /// The parameter name.
        name: String,
        /// Whether the parameter was declared `optional`.
        is_optional: bool,
        /// Whether the parameter's declared type admits null.
        is_nullable: bool,
        /// The declared primitive type, when one was declared.
        primitive_type: Option<PrimitiveTypeKind>,
    },
    /// A member binding of a section document.
    SectionMember {
        /// The id of the member that introduced the binding.
        id: NodeId,
        /// Whether the binding may only be referenced inclusively.
        is_recursive: bool,
        /// The member name.
        key: String,
        /// The id of the member's value, when it parsed.
        value: Option<NodeId>,
    },
    /// A binding whose introduction could not be classified.
    Undefined {
        /// The id of the node that introduced the binding.
        id: NodeId,
        /// Whether the binding may only be referenced inclusively.
        is_recursive: bool,
    },
}

impl ScopeItem {
    /// Gets the id of the node that introduced the binding.
    pub fn id(&self) -> NodeId {
        match self {
            Self::Each { id, .. }
            | Self::KeyValuePair { id, .. }
            | Self::Parameter { id, .. }
            | Self::SectionMember { id, .. }
            | Self::Undefined { id, .. } => *id,
        }
    }

    /// Determines if the binding may only be referenced inclusively
    /// (with an `@` prefix).
    pub fn is_recursive(&self) -> bool {
        match self {
            Self::Each { is_recursive, .. }
            | Self::KeyValuePair { is_recursive, .. }
            | Self::Parameter { is_recursive, .. }
            | Self::SectionMember { is_recursive, .. }
            | Self::Undefined { is_recursive, .. } => *is_recursive,
        }
    }

    /// Gets the id of the bound value, for bindings that carry one.
    pub fn value(&self) -> Option<NodeId> {
        match self {
            Self::KeyValuePair { value, .. } | Self::SectionMember { value, .. } => *value,
            Self::Each { .. } | Self::Parameter { .. } | Self::Undefined { .. } => None,
        }
    }

    /// Returns the binding with its recursion flag replaced.
    fn with_recursive(mut self, recursive: bool) -> Self {
        match &mut self {
            Self::Each { is_recursive, .. }
            | Self::KeyValuePair { is_recursive, .. }
            | Self::Parameter { is_recursive, .. }
            | Self::SectionMember { is_recursive, .. }
            | Self::Undefined { is_recursive, .. } => *is_recursive = recursive,
        }

        self
    }
}

/// The bindings in force at a single node, in introduction order.
pub type NodeScope = IndexMap<String, ScopeItem>;

/// A cache of computed scopes, keyed by node id.
pub type ScopeById = HashMap<NodeId, NodeScope>;

/// The working state of a scope inspection.
#[derive(Debug)]
pub(crate) struct ScopeState<'a> {
    /// The node map of the document.
    pub(crate) map: &'a NodeIdMap,
    /// The caller's cache, read but never written.
    pub(crate) given: Option<&'a ScopeById>,
    /// The scopes written during this inspection.
    pub(crate) delta: ScopeById,
}

impl<'a> ScopeState<'a> {
    /// Constructs a new scope inspection state.
    pub(crate) fn new(map: &'a NodeIdMap, given: Option<&'a ScopeById>) -> Self {
        Self {
            map,
            given,
            delta: ScopeById::new(),
        }
    }

    /// Gets a node's scope from the delta or the caller's cache.
    fn lookup(&self, id: NodeId) -> Option<&NodeScope> {
        self.delta
            .get(&id)
            .or_else(|| self.given.and_then(|given| given.get(&id)))
    }

    /// Ensures the delta holds a scope for the given node and returns a
    /// clone of it.
    ///
    /// Resolution order: the delta, the caller's cache, then inheritance
    /// from the nearest ancestor that has a scope; a node with no scoped
    /// ancestor gets an empty scope.
    pub(crate) fn get_or_create(&mut self, id: NodeId) -> NodeScope {
        if let Some(scope) = self.delta.get(&id) {
            return scope.clone();
        }

        if let Some(scope) = self.given.and_then(|given| given.get(&id)) {
            let scope = scope.clone();
            self.delta.insert(id, scope.clone());
            return scope;
        }

        let mut current = self.map.parent_id(id);
        let mut inherited = NodeScope::new();
        while let Some(ancestor) = current {
            if let Some(scope) = self.lookup(ancestor) {
                inherited = scope.clone();
                break;
            }

            current = self.map.parent_id(ancestor);
        }

        self.delta.insert(id, inherited.clone());
        inherited
    }

    /// Extends a node's scope with the given bindings.
    ///
    /// A binding shadows any inherited binding of the same identifier.
    fn extend(&mut self, id: NodeId, items: &[(String, ScopeItem)]) {
        let mut scope = self.get_or_create(id);
        for (key, item) in items {
            scope.insert(key.clone(), item.clone());
        }

        self.delta.insert(id, scope);
    }

    /// Processes every binder along an ancestry, from the root down.
    pub(crate) fn inspect_ancestry(&mut self, ancestry: &[XorNode<'_>]) {
        for ancestor in ancestry.iter().rev() {
            // Make sure the ancestor itself has a scope before its
            // bindings extend any children.
            self.get_or_create(ancestor.id());

            match ancestor.kind() {
                NodeKind::EachExpression => self.inspect_each(ancestor),
                NodeKind::FunctionExpression => self.inspect_function(ancestor),
                NodeKind::LetExpression => self.inspect_let(ancestor),
                NodeKind::RecordExpression | NodeKind::RecordLiteral => {
                    self.inspect_record(ancestor)
                }
                NodeKind::Section => self.inspect_section(ancestor),
                _ => {}
            }
        }
    }

    /// Extends the body of an `each` expression with the `_` binding.
    fn inspect_each(&mut self, node: &XorNode<'_>) {
        let item = ScopeItem::Each {
            id: node.id(),
            is_recursive: false,
        };

        if let Some(body) = self.map.child_by_attribute_index(node.id(), 1) {
            self.extend(body.id(), &[("_".to_string(), item)]);
        }
    }

    /// Extends the body of a function expression with its parameters.
    fn inspect_function(&mut self, node: &XorNode<'_>) {
        let items: Vec<(String, ScopeItem)> = function_parameters(self.map, node.id())
            .into_iter()
            .map(|parameter| {
                (parameter.name.clone(), ScopeItem::Parameter {
                    id: parameter.id,
                    is_recursive: false,
                    name: parameter.name,
                    is_optional: parameter.is_optional,
                    is_nullable: parameter.is_nullable,
                    primitive_type: parameter.primitive_type,
                })
            })
            .collect();

        if let Some(body) = self.map.child_by_attribute_index(node.id(), 3) {
            self.extend(body.id(), &items);
        }
    }

    /// Extends a `let` expression's variable values and body.
    ///
    /// Each value sees every pair, with its own pair marked recursive;
    /// the body sees every pair, none marked recursive.
    fn inspect_let(&mut self, node: &XorNode<'_>) {
        let pairs = key_value_pairs(self.map, node.id(), 1, NodeKind::IdentifierPairedExpression);
        self.extend_pair_values(&pairs, |pair| ScopeItem::KeyValuePair {
            id: pair.id,
            is_recursive: false,
            key: pair.key.clone(),
            value: pair.value,
        });

        if let Some(body) = self.map.child_by_attribute_index(node.id(), 3) {
            let items: Vec<(String, ScopeItem)> = pairs
                .iter()
                .map(|pair| {
                    (pair.key.clone(), ScopeItem::KeyValuePair {
                        id: pair.id,
                        is_recursive: false,
                        key: pair.key.clone(),
                        value: pair.value,
                    })
                })
                .collect();
            self.extend(body.id(), &items);
        }
    }

    /// Extends a record's field values.
    ///
    /// Each value sees every field, with its own field marked recursive.
    fn inspect_record(&mut self, node: &XorNode<'_>) {
        let mut pairs =
            key_value_pairs(self.map, node.id(), 1, NodeKind::GeneralizedIdentifierPairedExpression);
        if pairs.is_empty() {
            pairs = key_value_pairs(
                self.map,
                node.id(),
                1,
                NodeKind::GeneralizedIdentifierPairedAnyLiteral,
            );
        }

        self.extend_pair_values(&pairs, |pair| ScopeItem::KeyValuePair {
            id: pair.id,
            is_recursive: false,
            key: pair.key.clone(),
            value: pair.value,
        });
    }

    /// Extends a section's member values.
    ///
    /// Each value sees every member, with its own member marked
    /// recursive. The section itself extends no enclosing scope.
    fn inspect_section(&mut self, node: &XorNode<'_>) {
        let mut members = Vec::new();
        if let Some(list) = self.map.child_by_attribute_index(node.id(), 4) {
            for member in wrapped_elements(self.map, list.id()) {
                if member.kind() != NodeKind::SectionMember {
                    continue;
                }

                let Some(paired) = self.map.child_by_attribute_index(member.id(), 2) else {
                    continue;
                };
                let Some(pair) = read_pair(self.map, &paired) else {
                    continue;
                };
                members.push(pair);
            }
        }

        self.extend_pair_values(&members, |pair| ScopeItem::SectionMember {
            id: pair.id,
            is_recursive: false,
            key: pair.key.clone(),
            value: pair.value,
        });
    }

    /// Extends the value of each pair with every pair, marking the
    /// value's own pair recursive.
    fn extend_pair_values(
        &mut self,
        pairs: &[KeyValue],
        to_item: impl Fn(&KeyValue) -> ScopeItem,
    ) {
        for pair in pairs {
            let Some(value) = pair.value else {
                continue;
            };

            let items: Vec<(String, ScopeItem)> = pairs
                .iter()
                .map(|other| {
                    let item = to_item(other).with_recursive(other.id == pair.id);
                    (other.key.clone(), item)
                })
                .collect();

            self.extend(value, &items);
        }
    }
}

/// A key/value pair read out of a binder construct.
#[derive(Debug, Clone)]
struct KeyValue {
    /// The id of the pair node.
    id: NodeId,
    /// The bound identifier.
    key: String,
    /// The id of the bound value, when it parsed.
    value: Option<NodeId>,
}

/// Reads the key/value pairs under a wrapper child of a binder.
fn key_value_pairs(
    map: &NodeIdMap,
    parent: NodeId,
    wrapper_attribute: u32,
    pair_kind: NodeKind,
) -> Vec<KeyValue> {
    let Some(wrapper) = map.child_by_attribute_index(parent, wrapper_attribute) else {
        return Vec::new();
    };

    wrapped_elements(map, wrapper.id())
        .into_iter()
        .filter(|element| element.kind() == pair_kind)
        .filter_map(|element| read_pair(map, &element))
        .collect()
}

/// Reads a single key/value pair node.
///
/// Returns `None` when the pair's key has not been parsed.
fn read_pair(map: &NodeIdMap, pair: &XorNode<'_>) -> Option<KeyValue> {
    let key = map
        .ast_child_by_attribute_index(pair.id(), 0)
        .and_then(|key| key.identifier_literal())?
        .to_string();
    let value = map
        .child_by_attribute_index(pair.id(), 2)
        .map(|value| value.id());

    Some(KeyValue {
        id: pair.id(),
        key,
        value,
    })
}

/// Gets the elements of a sequence wrapper, unwrapping comma-separated
/// elements when present.
pub(crate) fn wrapped_elements<'a>(map: &'a NodeIdMap, wrapper: NodeId) -> Vec<XorNode<'a>> {
    map.child_ids(wrapper)
        .iter()
        .filter_map(|id| map.xor_node(*id))
        .map(|element| {
            if element.kind() == NodeKind::Csv {
                map.child_by_attribute_index(element.id(), 0)
                    .unwrap_or(element)
            } else {
                element
            }
        })
        .collect()
}

/// A function parameter read out of a parameter list.
#[derive(Debug, Clone)]
pub(crate) struct FunctionParameterInfo {
    /// The id of the parameter node.
    pub(crate) id: NodeId,
    /// The parameter name.
    pub(crate) name: String,
    /// Whether the parameter was declared `optional`.
    pub(crate) is_optional: bool,
    /// Whether the parameter's declared type admits null.
    pub(crate) is_nullable: bool,
    /// The declared primitive type, when one was declared.
    pub(crate) primitive_type: Option<PrimitiveTypeKind>,
}

/// Reads the parameters of a function expression.
///
/// The parameter list is the function's first child.
pub(crate) fn function_parameters(
    map: &NodeIdMap,
    function: NodeId,
) -> Vec<FunctionParameterInfo> {
    match map.child_by_attribute_index(function, 0) {
        Some(list) => parameters_of(map, list.id()),
        None => Vec::new(),
    }
}

/// Reads the parameters of a parameter list node.
///
/// Parameters whose names have not been parsed are skipped. A parameter
/// without a declared type is nullable (its values are unconstrained).
pub(crate) fn parameters_of(map: &NodeIdMap, list: NodeId) -> Vec<FunctionParameterInfo> {
    let Some(wrapper) = map.child_by_attribute_index(list, 1) else {
        return Vec::new();
    };

    wrapped_elements(map, wrapper.id())
        .into_iter()
        .filter(|element| element.kind() == NodeKind::Parameter)
        .filter_map(|parameter| {
            let name = map
                .ast_child_by_attribute_index(parameter.id(), 1)
                .and_then(|name| name.identifier_literal())?
                .to_string();
            let is_optional = map
                .child_by_attribute_index(parameter.id(), 0)
                .is_some();

            let (is_nullable, primitive_type) =
                match map.child_by_attribute_index(parameter.id(), 2) {
                    Some(clause) => declared_type(map, clause.id()),
                    None => (true, None),
                };

            Some(FunctionParameterInfo {
                id: parameter.id(),
                name,
                is_optional,
                is_nullable,
                primitive_type,
            })
        })
        .collect()
}

/// Reads the nullability and primitive kind of an `as` type clause.
fn declared_type(map: &NodeIdMap, clause: NodeId) -> (bool, Option<PrimitiveTypeKind>) {
    let Some(ty) = map.child_by_attribute_index(clause, 1) else {
        return (true, None);
    };

    match ty.kind() {
        NodeKind::NullablePrimitiveType => {
            let kind = map
                .child_by_attribute_index(ty.id(), 1)
                .and_then(|primitive| primitive_kind(map, &primitive));
            (true, kind)
        }
        NodeKind::PrimitiveType => {
            let kind = primitive_kind(map, &ty);
            let nullable = matches!(
                kind,
                Some(PrimitiveTypeKind::Null) | Some(PrimitiveTypeKind::Any)
            );
            (nullable, kind)
        }
        _ => (true, None),
    }
}

/// Reads the constant kind of a primitive type node.
fn primitive_kind(map: &NodeIdMap, node: &XorNode<'_>) -> Option<PrimitiveTypeKind> {
    map.ast_child_by_attribute_index(node.id(), 0)
        .and_then(|constant| constant.constant_kind())
        .and_then(|constant| match constant {
            sift_syntax::ConstantKind::Primitive(kind) => Some(kind),
            _ => None,
        })
}

/// Computes the scope in force at the first node of an ancestry.
///
/// The ancestry must be leaf-first, as produced by
/// [`ActiveNode`](crate::active::ActiveNode) or
/// [`NodeIdMap::ancestry`]. The caller's cache, when given, is consulted
/// but never written.
pub fn scope_for_root(
    _settings: &Settings,
    map: &NodeIdMap,
    ancestry: &[XorNode<'_>],
    cache: Option<&ScopeById>,
) -> Result<NodeScope, InspectionError> {
    let Some(root) = ancestry.first() else {
        return Err(ancestry_too_short(0, 1));
    };

    let mut state = ScopeState::new(map, cache);
    state.inspect_ancestry(ancestry);
    Ok(state.get_or_create(root.id()))
}

/// Computes the scope of every node in the subtree rooted at the given
/// node.
///
/// The returned map is the caller's cache merged with everything
/// computed during this inspection, and may be handed back as the cache
/// of a later inspection. The cache itself is never mutated, and no
/// partial writes escape on failure.
pub fn inspect_scope(
    _settings: &Settings,
    map: &NodeIdMap,
    root: NodeId,
    cache: Option<&ScopeById>,
) -> Result<ScopeById, InspectionError> {
    let root = map
        .xor_node(root)
        .ok_or_else(|| crate::diagnostics::unknown_node_id(root))?;

    let mut state = ScopeState::new(map, cache);
    traversal::traverse::<_, _, InspectionError>(
        map,
        root,
        Strategy::BreadthFirst,
        &mut state,
        &mut |state, node: &XorNode<'_>| {
            let ancestry = state.map.ancestry(node.id());
            state.inspect_ancestry(&ancestry);
            state.get_or_create(node.id());
            Ok(())
        },
        &traversal::xor_children,
        None::<&fn(&ScopeState<'_>, &XorNode<'_>) -> bool>,
    )?;

    trace!(scopes = state.delta.len(), "inspected subtree scopes");

    let mut merged = cache.cloned().unwrap_or_default();
    merged.extend(state.delta);
    Ok(merged)
}

/// Transitively resolves an identifier expression to the node it
/// references.
///
/// A bare identifier resolves only against a non-recursive binding; an
/// `@`-prefixed identifier resolves only against a recursive one. When
/// the resolved value is itself an identifier expression, resolution
/// continues through it. Each node is visited at most once, so a cyclic
/// chain terminates; the last resolvable node is returned.
///
/// Returns `None` when the identifier does not resolve at all.
pub fn dereferenced_identifier<'a>(
    settings: &Settings,
    map: &'a NodeIdMap,
    id: NodeId,
    cache: Option<&'a ScopeById>,
) -> Result<Option<XorNode<'a>>, InspectionError> {
    let mut state = ScopeState::new(map, cache);
    dereferenced_identifier_with(settings, &mut state, id)
}

/// Transitively resolves an identifier expression using an existing
/// scope state.
pub(crate) fn dereferenced_identifier_with<'a>(
    _settings: &Settings,
    state: &mut ScopeState<'a>,
    id: NodeId,
) -> Result<Option<XorNode<'a>>, InspectionError> {
    let map = state.map;
    let mut current = map
        .xor_node(id)
        .ok_or_else(|| crate::diagnostics::unknown_node_id(id))?;
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut resolved_any = false;

    loop {
        if !visited.insert(current.id()) {
            // A cycle; the current node is the last resolvable one.
            return Ok(Some(current));
        }

        let Some((literal, inclusive)) = read_identifier_expression(map, &current) else {
            return Ok(Some(current));
        };

        let ancestry = map.ancestry(current.id());
        state.inspect_ancestry(&ancestry);
        let scope = state.get_or_create(current.id());

        let item = match scope.get(literal) {
            Some(item) if item.is_recursive() == inclusive => item,
            _ => {
                return Ok(if resolved_any { Some(current) } else { None });
            }
        };

        let Some(value) = item.value() else {
            // The binding has no value to follow (a parameter or an
            // `each` binding); the identifier itself is the result.
            return Ok(Some(current));
        };

        let Some(value) = map.xor_node(value) else {
            return Ok(Some(current));
        };

        resolved_any = true;
        if value.kind() == NodeKind::IdentifierExpression {
            current = value;
        } else {
            return Ok(Some(value));
        }
    }
}

/// Reads the literal and inclusiveness of an identifier expression.
///
/// Accepts either an identifier expression or a bare identifier leaf.
fn read_identifier_expression<'a>(
    map: &'a NodeIdMap,
    node: &XorNode<'a>,
) -> Option<(&'a str, bool)> {
    match node.kind() {
        NodeKind::IdentifierExpression => {
            let literal = map
                .ast_child_by_attribute_index(node.id(), 1)?
                .identifier_literal()?;
            let inclusive = map.child_by_attribute_index(node.id(), 0).is_some();
            Some((literal, inclusive))
        }
        NodeKind::Identifier => {
            let literal = node.as_ast()?.identifier_literal()?;
            Some((literal, false))
        }
        _ => None,
    }
}
