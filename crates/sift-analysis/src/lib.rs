//! Caret-position inspection of Sift documents.
//!
//! The inspection engine answers the questions an editor asks at a
//! caret: which keywords are admissible here, which field names could
//! be selected, which bindings are in scope, and what is the type of
//! the expression under the caret. It operates entirely over the node
//! map a parser produced, and it works on documents that did not parse
//! cleanly: partially parsed constructs participate in every answer.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod active;
pub mod completion;
mod config;
pub mod diagnostics;
mod inspect;
pub mod position;
pub mod scope;
pub mod traversal;
pub mod types;

pub use active::ActiveNode;
pub use completion::TrailingToken;
pub use config::Settings;
pub use diagnostics::InspectionError;
pub use inspect::inspect;
pub use inspect::Inspection;
pub use scope::NodeScope;
pub use scope::ScopeById;
pub use scope::ScopeItem;
pub use types::Type;
pub use types::TypeKind;
