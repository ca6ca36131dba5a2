//! # Cypher Language
//!
//! openCypher read/write query parser producing a clean AST.
//! Pure functions — no I/O, no shared state.

pub mod ast;
pub mod lexer;
pub mod parser;

use tracing::debug;

use crate::config::ParserConfig;
use crate::Result;
use ast::Query;

/// Parse a Cypher query string into an AST.
pub fn parse(query: &str) -> Result<Query> {
    parse_with_config(query, &ParserConfig::default())
}

/// Parse with explicit parser limits.
pub fn parse_with_config(query: &str, config: &ParserConfig) -> Result<Query> {
    debug!(len = query.len(), max_depth = config.max_depth, "parsing cypher query");
    parser::parse_query(query, config)
        .inspect(|q| debug!(clauses = q.clauses.len(), unions = q.unions.len(), "parsed cypher query"))
        .inspect_err(|e| debug!(error = %e, "cypher query rejected"))
}
