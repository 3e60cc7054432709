//! Module for all inspection error creation functions.

use sift_syntax::NodeId;
use sift_syntax::NodeKind;

/// An error raised by an inspection.
///
/// Each sub-inspection is wrapped independently; an error in one never
/// aborts its peers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InspectionError {
    /// A condition the engine guarantees cannot happen was observed.
    #[error("invariant violation: {description}")]
    InvariantViolation {
        /// A description of the violated invariant.
        description: String,
        /// Additional context for diagnostics, when available.
        details: Option<String>,
    },
    /// The input handed to the inspection was malformed.
    #[error("malformed input: {description}")]
    MalformedInput {
        /// A description of the malformed input.
        description: String,
    },
}

/// Creates an "invariant violation" error with a free-form description.
pub fn invariant_violation(description: impl Into<String>) -> InspectionError {
    InspectionError::InvariantViolation {
        description: description.into(),
        details: None,
    }
}

/// Creates an "unknown node id" error.
///
/// Every id reachable from the node map's tables must resolve to a node.
pub fn unknown_node_id(id: NodeId) -> InspectionError {
    InspectionError::InvariantViolation {
        description: format!("node {id} is absent from the node map"),
        details: None,
    }
}

/// Creates a "missing child" error for a child a kind guarantees.
pub fn missing_child(parent: NodeId, kind: NodeKind, attribute: u32) -> InspectionError {
    InspectionError::MalformedInput {
        description: format!(
            "node {parent} of kind {kind:?} is missing its guaranteed child at attribute {attribute}"
        ),
    }
}

/// Creates an "unexpected node kind" error.
pub fn unexpected_node_kind(id: NodeId, actual: NodeKind) -> InspectionError {
    InspectionError::InvariantViolation {
        description: format!("node {id} has unexpected kind {actual:?}"),
        details: None,
    }
}

/// Creates an "ancestry too short" error.
pub fn ancestry_too_short(actual: usize, expected: usize) -> InspectionError {
    InspectionError::MalformedInput {
        description: format!(
            "ancestry of length {actual} is shorter than the expected {expected}"
        ),
    }
}
