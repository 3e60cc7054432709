//! Syntax surface for Sift data-preparation query expressions.
//!
//! This crate defines the data the parsing collaborator hands to the
//! inspection engine: caret and token positions, tokens, the keyword set,
//! the node kinds of the language, and the id-indexed node map of a parsed
//! (possibly incomplete) document.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod builder;
pub mod keyword;
pub mod map;
pub mod node;
pub mod position;
pub mod token;

pub use builder::TreeBuilder;
pub use keyword::EXPRESSION_KEYWORDS;
pub use keyword::Keyword;
pub use map::NodeIdMap;
pub use node::AstNode;
pub use node::AstNodePayload;
pub use node::ConstantKind;
pub use node::ContextNode;
pub use node::LiteralKind;
pub use node::NodeId;
pub use node::NodeKind;
pub use node::PrimitiveTypeKind;
pub use node::TokenRange;
pub use node::XorNode;
pub use position::GraphemePosition;
pub use position::Position;
pub use position::TokenPosition;
pub use token::Token;
pub use token::TokenKind;
