//! # pcypher — Cypher query parser
//!
//! Turns Cypher query text into a typed abstract syntax tree.
//!
//! ## Design Principles
//!
//! 1. **Parser owns nothing**: Cypher → AST is a pure function of its input
//! 2. **One direction**: text → tokens → AST; the lexer knows no grammar, the AST knows neither
//! 3. **Closed trees**: every AST family is an enum, consumers match exhaustively
//! 4. **First error wins**: a parse yields exactly one tree or exactly one error
//!
//! ## Quick Start
//!
//! ```rust
//! use pcypher::cypher::ast::{Clause, Direction};
//!
//! let query = pcypher::parse("MATCH (a)-[:KNOWS]->(b) RETURN a").unwrap();
//! let Clause::Match(m) = &query.clauses[0] else { unreachable!() };
//! let rel = &m.pattern.paths[0].steps[0].relationship;
//! assert_eq!(rel.direction, Direction::Right);
//! assert_eq!(rel.types.as_slice(), ["KNOWS"]);
//!
//! let err = pcypher::parse("MATCH (a RETURN a").unwrap_err();
//! assert_eq!((err.line(), err.column()), (1, 10));
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod cypher;

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Re-exports
// ============================================================================

pub use config::ParserConfig;
pub use cypher::ast::Query;
pub use cypher::{parse, parse_with_config};

// ============================================================================
// Source positions
// ============================================================================

/// A location in the query text.
///
/// `line` and `column` are 1-based, columns count characters.
/// `offset` is the 0-based byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    /// Start of input.
    pub const START: Position = Position { line: 1, column: 1, offset: 0 };
}

impl Default for Position {
    fn default() -> Self {
        Self::START
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Cypher lexical error at {position}: {message}")]
    LexicalError { position: Position, message: String },

    #[error("Cypher syntax error at {position}: {message}")]
    SyntaxError { position: Position, message: String },
}

/// The error returned by [`parse`].
pub type ParseError = Error;

/// Which stage rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::LexicalError { .. } => ErrorKind::Lexical,
            Error::SyntaxError { .. } => ErrorKind::Syntax,
        }
    }

    /// Human-readable description, without the position prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::LexicalError { message, .. } | Error::SyntaxError { message, .. } => message,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Error::LexicalError { position, .. } | Error::SyntaxError { position, .. } => *position,
        }
    }

    /// 1-based line of the offending token.
    pub fn line(&self) -> usize {
        self.position().line
    }

    /// 1-based column of the offending token.
    pub fn column(&self) -> usize {
        self.position().column
    }

    pub fn offset(&self) -> usize {
        self.position().offset
    }
}

pub type Result<T> = std::result::Result<T, Error>;
