//! Field-access autocomplete.
//!
//! When the caret sits inside a field selector or projection, the type
//! of the expression being selected from supplies the candidate field
//! names.

use sift_syntax::NodeIdMap;
use sift_syntax::NodeKind;
use tracing::debug;

use crate::active::ActiveNode;
use crate::config::Settings;
use crate::diagnostics::InspectionError;
use crate::types::eval::accessor_subject;
use crate::types::eval::defined_fields;
use crate::types::eval::node_type;

/// Computes the field names admissible at the caret.
///
/// Suggestions come from the known fields of the record or table being
/// selected from; anything without known fields yields no suggestions
/// (that is not an error). Results are filtered by the partially typed
/// field name under the caret.
pub fn autocomplete(
    settings: &Settings,
    map: &NodeIdMap,
    active: Option<&ActiveNode<'_>>,
) -> Result<Vec<String>, InspectionError> {
    let Some(active) = active else {
        return Ok(Vec::new());
    };

    let Some(access) = active.ancestry().iter().find(|node| {
        matches!(
            node.kind(),
            NodeKind::FieldSelector | NodeKind::FieldProjection
        )
    }) else {
        return Ok(Vec::new());
    };

    let Some(subject) = accessor_subject(map, access.id()) else {
        return Ok(Vec::new());
    };

    let subject = node_type(settings, map, subject, None)?;
    let Some((fields, _)) = defined_fields(&subject) else {
        return Ok(Vec::new());
    };

    let prefix = active.identifier_under_position_text().unwrap_or("");
    let names: Vec<String> = fields
        .keys()
        .filter(|name| name.starts_with(prefix))
        .cloned()
        .collect();
    debug!(count = names.len(), "field-access autocomplete");
    Ok(names)
}
