//! Parser configuration.

use serde::Deserialize;

/// Knobs for [`crate::parse_with_config`].
///
/// Deserializable so a host application can embed it in its own config file:
///
/// ```toml
/// [parser]
/// max_depth = 64
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum nesting of expressions (parentheses, lists, maps, CASE,
    /// function arguments, subscripts, NOT and unary minus) before the parser
    /// gives up with a syntax error instead of exhausting the stack.
    ///
    /// The default fits an unoptimized build on a 2 MiB thread stack, the
    /// size Rust gives spawned threads. Raise it only together with the
    /// stack size of the thread that parses.
    pub max_depth: usize,
}

impl ParserConfig {
    pub const DEFAULT_MAX_DEPTH: usize = 64;

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self { max_depth: Self::DEFAULT_MAX_DEPTH }
    }
}
