//! The composite inspection entry point.
//!
//! One call resolves the caret once and drives every sub-inspection:
//! keyword, field-access, and primitive-type autocomplete, scope, and
//! type. Each sub-inspection is wrapped independently: a failure in one
//! is reported in its own result and never aborts its peers.

use sift_syntax::Keyword;
use sift_syntax::NodeIdMap;
use sift_syntax::Position;
use sift_syntax::PrimitiveTypeKind;
use sift_syntax::Token;
use tracing::debug;

use crate::active::ActiveNode;
use crate::completion::field;
use crate::completion::keyword;
use crate::completion::primitive;
use crate::completion::TrailingToken;
use crate::config::Settings;
use crate::diagnostics::InspectionError;
use crate::scope::scope_for_root;
use crate::scope::NodeScope;
use crate::scope::ScopeById;
use crate::types::eval::node_type;
use crate::types::Type;

/// The combined result of the four sub-inspections at a caret.
///
/// Callers examine each field on its own; one failing inspection does
/// not invalidate the others. The scope and type results are `None`
/// when the caret resolves to no active node.
#[derive(Debug)]
pub struct Inspection<'a> {
    /// The active node the caret resolved to, when it resolved.
    pub active: Option<ActiveNode<'a>>,
    /// The admissible keywords at the caret.
    pub keyword: Result<Vec<Keyword>, InspectionError>,
    /// The admissible field names at the caret.
    pub field_access: Result<Vec<String>, InspectionError>,
    /// The admissible primitive-type names at the caret.
    pub primitive_type: Result<Vec<PrimitiveTypeKind>, InspectionError>,
    /// The bindings in force at the caret.
    pub scope: Result<Option<NodeScope>, InspectionError>,
    /// The type of the smallest node enclosing the caret.
    pub node_type: Result<Option<Type>, InspectionError>,
}

/// Inspects a document at a caret position.
///
/// `parse_error_token` is the token the most recent parse error
/// stopped on, when the document did not parse cleanly. The caller's
/// scope cache, when given, is read but never mutated.
pub fn inspect<'a>(
    settings: &Settings,
    map: &'a NodeIdMap,
    position: Position,
    parse_error_token: Option<Token>,
    scope_cache: Option<&ScopeById>,
) -> Inspection<'a> {
    let active = ActiveNode::from_position(map, position);
    let trailing = parse_error_token.map(|token| TrailingToken::new(token, &position));
    debug!(
        resolved = active.is_some(),
        trailing = trailing.is_some(),
        %position,
        "inspecting"
    );

    let keyword = keyword::autocomplete(settings, map, active.as_ref(), trailing.as_ref());
    let field_access = field::autocomplete(settings, map, active.as_ref());
    let primitive_type =
        primitive::autocomplete(settings, map, active.as_ref(), trailing.as_ref());

    let scope = match &active {
        Some(active) => {
            scope_for_root(settings, map, active.ancestry(), scope_cache).map(Some)
        }
        None => Ok(None),
    };

    let node_type = match &active {
        Some(active) => {
            let leaf = active.ancestry()[0].id();
            node_type(settings, map, leaf, scope_cache).map(Some)
        }
        None => Ok(None),
    };

    Inspection {
        active,
        keyword,
        field_access,
        primitive_type,
        scope,
        node_type,
    }
}
