//! Construction of node maps.
//!
//! The parser drives a [`TreeBuilder`] as it recognizes constructs:
//! `start` opens a node, `leaf` emits a single-token node, and `finish`
//! closes the innermost open node. When a parse error truncates the
//! input, the parser simply stops driving the builder; `build` turns any
//! still-open nodes into context nodes, which is exactly the partially
//! parsed state the inspection engine expects.

use std::collections::HashMap;

use crate::keyword::Keyword;
use crate::map::NodeIdMap;
use crate::node::AstNode;
use crate::node::AstNodePayload;
use crate::node::ConstantKind;
use crate::node::ContextNode;
use crate::node::LiteralKind;
use crate::node::NodeId;
use crate::node::NodeKind;
use crate::node::PrimitiveTypeKind;
use crate::node::TokenRange;
use crate::node::XorNode;
use crate::position::TokenPosition;
use crate::token::Token;
use crate::token::TokenKind;

/// A node that has been started but not yet finished.
#[derive(Debug)]
struct OpenNode {
    /// The identity assigned to the node.
    id: NodeId,
    /// The kind of the node.
    kind: NodeKind,
    /// The node's attribute index under its parent.
    attribute_index: Option<u32>,
    /// The index of the first token the node covers.
    token_index_start: u32,
}

/// A builder of [`NodeIdMap`]s.
///
/// Ids are assigned in creation (preorder) order. The builder tracks a
/// cursor through the source text; token positions are derived from the
/// text handed to [`TreeBuilder::leaf`] and the explicit
/// [`TreeBuilder::space`] / [`TreeBuilder::newline`] calls between
/// tokens. Text lengths are measured in UTF-16 code units.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    /// The next id to assign.
    next_id: u32,
    /// The tokens emitted so far.
    tokens: Vec<Token>,
    /// The current line of the cursor.
    line: u32,
    /// The current code-unit offset of the cursor within its line.
    column: u32,
    /// The current absolute code-unit offset of the cursor.
    offset: u32,
    /// The stack of open nodes, outermost first.
    stack: Vec<OpenNode>,
    /// The fully parsed nodes so far.
    ast_nodes: HashMap<NodeId, AstNode>,
    /// The child lists so far, in source order.
    child_ids: HashMap<NodeId, Vec<NodeId>>,
    /// The parent links so far.
    parent_ids: HashMap<NodeId, NodeId>,
    /// The leaf ids so far, in document order.
    leaf_ids: Vec<NodeId>,
}

impl TreeBuilder {
    /// Constructs a new, empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the cursor by one space without emitting a token.
    pub fn space(&mut self) -> &mut Self {
        self.column += 1;
        self.offset += 1;
        self
    }

    /// Advances the cursor to the start of the next line without emitting
    /// a token.
    pub fn newline(&mut self) -> &mut Self {
        self.line += 1;
        self.column = 0;
        self.offset += 1;
        self
    }

    /// Gets the current cursor as a caret position would see it.
    pub fn cursor(&self) -> TokenPosition {
        TokenPosition::new(self.line, self.column, self.offset)
    }

    /// Opens a new node of the given kind.
    pub fn start(&mut self, kind: NodeKind, attribute_index: Option<u32>) -> NodeId {
        let id = self.allocate(attribute_index);
        self.stack.push(OpenNode {
            id,
            kind,
            attribute_index,
            token_index_start: self.tokens.len() as u32,
        });

        id
    }

    /// Emits a single-token leaf node.
    pub fn leaf(
        &mut self,
        kind: NodeKind,
        attribute_index: Option<u32>,
        payload: AstNodePayload,
        text: &str,
    ) -> NodeId {
        let id = self.allocate(attribute_index);
        let token_index = self.tokens.len() as u32;
        let position_start = self.cursor();
        let length = text.encode_utf16().count() as u32;
        self.column += length;
        self.offset += length;
        let position_end = self.cursor();

        self.tokens.push(Token::new(
            token_kind_for(&payload, text),
            text,
            position_start,
            position_end,
        ));

        self.ast_nodes.insert(id, AstNode {
            id,
            kind,
            attribute_index,
            token_range: TokenRange {
                index_start: token_index,
                index_end: token_index + 1,
                position_start,
                position_end,
            },
            is_leaf: true,
            payload,
        });
        self.leaf_ids.push(id);

        id
    }

    /// Emits a constant leaf node.
    pub fn constant(&mut self, attribute_index: u32, kind: ConstantKind, text: &str) -> NodeId {
        self.leaf(
            NodeKind::Constant,
            Some(attribute_index),
            AstNodePayload::Constant(kind),
            text,
        )
    }

    /// Closes the innermost open node, making it fully parsed.
    ///
    /// # Panics
    ///
    /// Panics if no node is open or the node covers no tokens; the parser
    /// only finishes a construct once it has consumed the construct's
    /// final token.
    pub fn finish(&mut self) -> NodeId {
        let open = self.stack.pop().expect("no open node to finish");
        let index_end = self.tokens.len() as u32;
        assert!(
            index_end > open.token_index_start,
            "a finished node must cover at least one token"
        );

        let position_start = self.tokens[open.token_index_start as usize].position_start;
        let position_end = self.tokens[index_end as usize - 1].position_end;

        self.ast_nodes.insert(open.id, AstNode {
            id: open.id,
            kind: open.kind,
            attribute_index: open.attribute_index,
            token_range: TokenRange {
                index_start: open.token_index_start,
                index_end,
                position_start,
                position_end,
            },
            is_leaf: false,
            payload: AstNodePayload::None,
        });

        open.id
    }

    /// Consumes the builder, producing the node map.
    ///
    /// Any still-open nodes become context nodes.
    pub fn build(mut self) -> NodeIdMap {
        let mut context_nodes = HashMap::new();
        while let Some(open) = self.stack.pop() {
            let token_start = self
                .tokens
                .get(open.token_index_start as usize)
                .cloned();

            context_nodes.insert(open.id, ContextNode {
                id: open.id,
                kind: open.kind,
                attribute_index: open.attribute_index,
                token_index_start: open.token_index_start,
                token_start,
            });
        }

        NodeIdMap::from_parts(
            self.ast_nodes,
            context_nodes,
            self.child_ids,
            self.parent_ids,
            self.leaf_ids,
        )
    }

    /// Gets a copy of the tokens emitted so far.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Allocates an id and links it under the current open node.
    fn allocate(&mut self, attribute_index: Option<u32>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        if let Some(parent) = self.stack.last() {
            debug_assert!(
                attribute_index.is_some(),
                "a non-root node must carry an attribute index"
            );
            self.parent_ids.insert(id, parent.id);
            self.child_ids.entry(parent.id).or_default().push(id);
        }

        id
    }
}

/// Derives the lexical token kind of a leaf from its payload.
fn token_kind_for(payload: &AstNodePayload, text: &str) -> TokenKind {
    match payload {
        AstNodePayload::None => TokenKind::Identifier,
        AstNodePayload::Identifier(_) | AstNodePayload::GeneralizedIdentifier(_) => {
            TokenKind::Identifier
        }
        AstNodePayload::Literal { kind, .. } => match kind {
            LiteralKind::Numeric => TokenKind::NumericLiteral,
            LiteralKind::Text => TokenKind::TextLiteral,
            LiteralKind::Logical => TokenKind::Keyword(if text == "true" {
                Keyword::True
            } else {
                Keyword::False
            }),
            LiteralKind::Null => TokenKind::Keyword(Keyword::Null),
        },
        AstNodePayload::Constant(kind) => match kind {
            ConstantKind::Addition => TokenKind::Plus,
            ConstantKind::And => TokenKind::Keyword(Keyword::And),
            ConstantKind::As => TokenKind::Keyword(Keyword::As),
            ConstantKind::AtSign => TokenKind::AtSign,
            ConstantKind::CloseBrace => TokenKind::RightBrace,
            ConstantKind::CloseBracket => TokenKind::RightBracket,
            ConstantKind::CloseParenthesis => TokenKind::RightParenthesis,
            ConstantKind::Comma => TokenKind::Comma,
            ConstantKind::Concatenation => TokenKind::Ampersand,
            ConstantKind::Division => TokenKind::Division,
            ConstantKind::DotDot => TokenKind::DotDot,
            ConstantKind::Each => TokenKind::Keyword(Keyword::Each),
            ConstantKind::Ellipsis => TokenKind::Ellipsis,
            ConstantKind::Else => TokenKind::Keyword(Keyword::Else),
            ConstantKind::Equal => TokenKind::Equal,
            ConstantKind::Error => TokenKind::Keyword(Keyword::Error),
            ConstantKind::FatArrow => TokenKind::FatArrow,
            ConstantKind::GreaterThan => TokenKind::GreaterThan,
            ConstantKind::GreaterThanEqualTo => TokenKind::GreaterThanEqualTo,
            ConstantKind::If => TokenKind::Keyword(Keyword::If),
            ConstantKind::In => TokenKind::Keyword(Keyword::In),
            ConstantKind::Is => TokenKind::Keyword(Keyword::Is),
            ConstantKind::Let => TokenKind::Keyword(Keyword::Let),
            ConstantKind::LessThan => TokenKind::LessThan,
            ConstantKind::LessThanEqualTo => TokenKind::LessThanEqualTo,
            ConstantKind::Meta => TokenKind::Keyword(Keyword::Meta),
            ConstantKind::Minus => TokenKind::Minus,
            ConstantKind::Multiplication => TokenKind::Asterisk,
            ConstantKind::Not => TokenKind::Keyword(Keyword::Not),
            ConstantKind::NotEqual => TokenKind::NotEqual,
            ConstantKind::Nullable => TokenKind::Identifier,
            ConstantKind::OpenBrace => TokenKind::LeftBrace,
            ConstantKind::OpenBracket => TokenKind::LeftBracket,
            ConstantKind::OpenParenthesis => TokenKind::LeftParenthesis,
            ConstantKind::Optional => TokenKind::Identifier,
            ConstantKind::Or => TokenKind::Keyword(Keyword::Or),
            ConstantKind::Otherwise => TokenKind::Keyword(Keyword::Otherwise),
            ConstantKind::Primitive(_) => TokenKind::Identifier,
            ConstantKind::QuestionMark => TokenKind::QuestionMark,
            ConstantKind::Section => TokenKind::Keyword(Keyword::Section),
            ConstantKind::Semicolon => TokenKind::Semicolon,
            ConstantKind::Shared => TokenKind::Keyword(Keyword::Shared),
            ConstantKind::Then => TokenKind::Keyword(Keyword::Then),
            ConstantKind::Try => TokenKind::Keyword(Keyword::Try),
            ConstantKind::Type => TokenKind::Keyword(Keyword::Type),
        },
    }
}

/// Convenience constructors for common single-token constructs.
impl TreeBuilder {
    /// Emits an identifier in expression position (`IdentifierExpression`
    /// wrapping an `Identifier` leaf).
    pub fn identifier_expression(&mut self, attribute_index: Option<u32>, name: &str) -> NodeId {
        let id = self.start(NodeKind::IdentifierExpression, attribute_index);
        self.leaf(
            NodeKind::Identifier,
            Some(1),
            AstNodePayload::Identifier(name.into()),
            name,
        );
        self.finish();
        id
    }

    /// Emits an `@`-prefixed identifier in expression position.
    pub fn inclusive_identifier_expression(
        &mut self,
        attribute_index: Option<u32>,
        name: &str,
    ) -> NodeId {
        let id = self.start(NodeKind::IdentifierExpression, attribute_index);
        self.constant(0, ConstantKind::AtSign, "@");
        self.leaf(
            NodeKind::Identifier,
            Some(1),
            AstNodePayload::Identifier(name.into()),
            name,
        );
        self.finish();
        id
    }

    /// Emits a numeric literal leaf.
    pub fn numeric_literal(&mut self, attribute_index: Option<u32>, text: &str) -> NodeId {
        self.leaf(
            NodeKind::LiteralExpression,
            attribute_index,
            AstNodePayload::Literal {
                kind: LiteralKind::Numeric,
                text: text.into(),
            },
            text,
        )
    }

    /// Emits a text literal leaf.
    pub fn text_literal(&mut self, attribute_index: Option<u32>, text: &str) -> NodeId {
        self.leaf(
            NodeKind::LiteralExpression,
            attribute_index,
            AstNodePayload::Literal {
                kind: LiteralKind::Text,
                text: text.into(),
            },
            text,
        )
    }

    /// Emits a logical literal leaf.
    pub fn logical_literal(&mut self, attribute_index: Option<u32>, value: bool) -> NodeId {
        let text = if value { "true" } else { "false" };
        self.leaf(
            NodeKind::LiteralExpression,
            attribute_index,
            AstNodePayload::Literal {
                kind: LiteralKind::Logical,
                text: text.into(),
            },
            text,
        )
    }

    /// Emits a primitive-type node wrapping its constant.
    pub fn primitive_type(&mut self, attribute_index: Option<u32>, kind: PrimitiveTypeKind) -> NodeId {
        let id = self.start(NodeKind::PrimitiveType, attribute_index);
        self.constant(0, ConstantKind::Primitive(kind), kind.as_str());
        self.finish();
        id
    }
}

/// Looks up the root of a map built from a single construct.
///
/// This is a convenience for callers that build one expression and want
/// its root id back.
pub fn root_of(map: &NodeIdMap) -> Option<XorNode<'_>> {
    let first = *map.leaf_ids().first()?;
    map.ancestry(first).into_iter().last()
}
