//! Positions within a Sift document.
//!
//! All positions are measured in UTF-16 code units, matching what editor
//! hosts report for caret locations; they are not grapheme counts.

use std::cmp::Ordering;
use std::fmt;

/// A caret position within a document.
///
/// Carets sit between code units, so a position may equal the end boundary
/// of one token and the start boundary of the next at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// The zero-based line number of the position.
    pub line_number: u32,
    /// The zero-based code-unit offset of the position within its line.
    pub line_code_unit: u32,
}

impl Position {
    /// Constructs a new position from a line number and a code-unit offset
    /// within that line.
    pub fn new(line_number: u32, line_code_unit: u32) -> Self {
        Self {
            line_number,
            line_code_unit,
        }
    }

    /// Compares the position against a token boundary.
    pub fn cmp_token_position(&self, other: &TokenPosition) -> Ordering {
        (self.line_number, self.line_code_unit)
            .cmp(&(other.line_number, other.line_code_unit))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{line}:{column}",
            line = self.line_number,
            column = self.line_code_unit
        )
    }
}

/// A caret position together with its user-facing column.
///
/// Hosts that render positions to users count graphemes, not code
/// units; the column number is derived by the host's grapheme counter
/// and carried alongside the raw position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphemePosition {
    /// The zero-based line number of the position.
    pub line_number: u32,
    /// The zero-based code-unit offset of the position within its line.
    pub line_code_unit: u32,
    /// The zero-based grapheme column of the position within its line.
    pub column_number: u32,
}

impl GraphemePosition {
    /// Gets the raw caret position, dropping the derived column.
    pub fn position(&self) -> Position {
        Position {
            line_number: self.line_number,
            line_code_unit: self.line_code_unit,
        }
    }
}

impl fmt::Display for GraphemePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{line}:{column}",
            line = self.line_number,
            column = self.column_number
        )
    }
}

/// A token boundary within a document.
///
/// In addition to the line-relative coordinates of [`Position`], a token
/// boundary records its absolute code-unit offset from the start of the
/// document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenPosition {
    /// The zero-based line number of the boundary.
    pub line_number: u32,
    /// The zero-based code-unit offset of the boundary within its line.
    pub line_code_unit: u32,
    /// The absolute code-unit offset of the boundary within the document.
    pub code_unit: u32,
}

impl TokenPosition {
    /// Constructs a new token boundary.
    pub fn new(line_number: u32, line_code_unit: u32, code_unit: u32) -> Self {
        Self {
            line_number,
            line_code_unit,
            code_unit,
        }
    }
}

impl fmt::Display for TokenPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{line}:{column}",
            line = self.line_number,
            column = self.line_code_unit
        )
    }
}
