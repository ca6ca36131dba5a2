//! Cypher lexer — turns a query string into a lazy stream of tokens.
//!
//! The stream ends with a single [`TokenKind::Eof`] token, or with the first
//! lexical error. Either way the lexer is fused afterwards.

use std::fmt;
use std::iter::{FusedIterator, Peekable};
use std::str::CharIndices;

use tracing::trace;

use crate::{Error, Position, Result};

/// A token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Decoded value for strings and escaped identifiers, the name without
    /// `$` for parameters, the raw source slice otherwise.
    pub text: String,
    pub position: Position,
}

impl Token {
    /// Description used in "found ..." error messages.
    pub fn describe(&self) -> String {
        match self.kind.category() {
            TokenCategory::Identifier => format!("identifier `{}`", self.text),
            TokenCategory::Integer | TokenCategory::Float => format!("number {}", self.text),
            TokenCategory::String => format!("string {:?}", self.text),
            TokenCategory::Parameter => format!("parameter ${}", self.text),
            TokenCategory::Keyword => format!("keyword {}", self.kind),
            TokenCategory::EndOfInput => "end of input".to_string(),
            TokenCategory::Operator | TokenCategory::Punctuation => self.kind.to_string(),
        }
    }
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    Match, Optional, Where, Return, With, Unwind,
    Create, Merge, Delete, Detach, Set, Remove,
    Order, By, Skip, Limit, Asc, Desc, Distinct, As,
    And, Or, Xor, Not, In, Is, Null, True, False,
    Starts, Ends, Contains,
    Case, When, Then, Else, End,
    Union, All, On, Call, Yield, Mandatory, Cypher,

    // Literals
    Integer, Float, String,

    // Identifiers and parameters
    Identifier, Parameter,

    // Punctuation
    LParen, RParen, LBracket, RBracket, LBrace, RBrace,
    Dot, DotDot, Comma, Colon, Semicolon, Pipe,

    // Operators
    Eq, Neq, Lt, Lte, Gt, Gte,
    Plus, Minus, Star, Slash, Percent, Caret,
    PlusEq,     // +=
    RegexMatch, // =~

    Eof,
}

/// Coarse classification of a [`TokenKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    Keyword,
    Identifier,
    Integer,
    Float,
    String,
    Parameter,
    Operator,
    Punctuation,
    EndOfInput,
}

impl TokenKind {
    pub fn category(self) -> TokenCategory {
        use TokenKind::*;
        match self {
            Integer => TokenCategory::Integer,
            Float => TokenCategory::Float,
            String => TokenCategory::String,
            Identifier => TokenCategory::Identifier,
            Parameter => TokenCategory::Parameter,
            LParen | RParen | LBracket | RBracket | LBrace | RBrace
            | Dot | DotDot | Comma | Colon | Semicolon | Pipe => TokenCategory::Punctuation,
            Eq | Neq | Lt | Lte | Gt | Gte | Plus | Minus | Star | Slash
            | Percent | Caret | PlusEq | RegexMatch => TokenCategory::Operator,
            Eof => TokenCategory::EndOfInput,
            _ => TokenCategory::Keyword,
        }
    }

    pub fn is_keyword(self) -> bool {
        self.category() == TokenCategory::Keyword
    }

    /// Canonical spelling, used in diagnostics.
    pub fn as_str(self) -> &'static str {
        use TokenKind::*;
        match self {
            Match => "MATCH", Optional => "OPTIONAL", Where => "WHERE",
            Return => "RETURN", With => "WITH", Unwind => "UNWIND",
            Create => "CREATE", Merge => "MERGE", Delete => "DELETE",
            Detach => "DETACH", Set => "SET", Remove => "REMOVE",
            Order => "ORDER", By => "BY", Skip => "SKIP", Limit => "LIMIT",
            Asc => "ASC", Desc => "DESC", Distinct => "DISTINCT", As => "AS",
            And => "AND", Or => "OR", Xor => "XOR", Not => "NOT", In => "IN",
            Is => "IS", Null => "NULL", True => "TRUE", False => "FALSE",
            Starts => "STARTS", Ends => "ENDS", Contains => "CONTAINS",
            Case => "CASE", When => "WHEN", Then => "THEN", Else => "ELSE", End => "END",
            Union => "UNION", All => "ALL", On => "ON", Call => "CALL", Yield => "YIELD",
            Mandatory => "MANDATORY", Cypher => "CYPHER",
            Integer => "integer", Float => "float", String => "string",
            Identifier => "identifier", Parameter => "parameter",
            LParen => "'('", RParen => "')'", LBracket => "'['", RBracket => "']'",
            LBrace => "'{'", RBrace => "'}'", Dot => "'.'", DotDot => "'..'",
            Comma => "','", Colon => "':'", Semicolon => "';'", Pipe => "'|'",
            Eq => "'='", Neq => "'<>'", Lt => "'<'", Lte => "'<='", Gt => "'>'", Gte => "'>='",
            Plus => "'+'", Minus => "'-'", Star => "'*'", Slash => "'/'",
            Percent => "'%'", Caret => "'^'", PlusEq => "'+='", RegexMatch => "'=~'",
            Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tokenize a Cypher query string.
///
/// Nothing is scanned until the returned lexer is iterated.
pub fn tokenize(input: &str) -> Lexer<'_> {
    Lexer::new(input)
}

/// Lazy tokenizer over a single source string.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
            finished: false,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.clone().nth(n).map(|(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        let len = self.input.len();
        self.chars.peek().map_or(len, |&(i, _)| i)
    }

    fn position(&mut self) -> Position {
        Position { line: self.line, column: self.column, offset: self.offset() }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn bump_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
    }

    fn slice_from(&mut self, start: Position) -> String {
        let end = self.offset();
        self.input[start.offset..end].to_string()
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_nth(1) == Some('/') => {
                    self.bump_while(|c| c != '\n');
                }
                Some('/') if self.peek_nth(1) == Some('*') => {
                    let start = self.position();
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') => {
                                if self.eat('/') {
                                    break;
                                }
                            }
                            Some(_) => {}
                            None => return Err(lexical(start, "unterminated block comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia()?;
        let start = self.position();
        let Some(ch) = self.peek() else {
            return Ok(Token { kind: TokenKind::Eof, text: String::new(), position: start });
        };
        match ch {
            '\'' | '"' => self.lex_string(start, ch),
            '`' => self.lex_escaped_identifier(start),
            '$' => self.lex_parameter(start),
            c if c.is_ascii_digit() => self.lex_number(start),
            c if is_ident_start(c) => {
                self.bump_while(is_ident_part);
                let text = self.slice_from(start);
                Ok(Token { kind: keyword_or_ident(&text), text, position: start })
            }
            _ => self.lex_symbol(start, ch),
        }
    }

    fn lex_string(&mut self, start: Position, quote: char) -> Result<Token> {
        self.bump();
        let mut value = String::new();
        loop {
            let escape_pos = self.position();
            match self.bump() {
                None => return Err(lexical(start, "unterminated string literal")),
                Some(c) if c == quote => break,
                Some('\\') => {
                    let decoded = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('b') => '\u{8}',
                        Some('f') => '\u{c}',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('"') => '"',
                        Some('u') => self.lex_unicode_escape(escape_pos, 4)?,
                        Some('U') => self.lex_unicode_escape(escape_pos, 8)?,
                        Some(other) => {
                            return Err(lexical(escape_pos, format!("invalid escape sequence '\\{other}'")));
                        }
                        None => return Err(lexical(start, "unterminated string literal")),
                    };
                    value.push(decoded);
                }
                Some(c) => value.push(c),
            }
        }
        Ok(Token { kind: TokenKind::String, text: value, position: start })
    }

    fn lex_unicode_escape(&mut self, escape_pos: Position, digits: usize) -> Result<char> {
        let mut code = 0u32;
        for _ in 0..digits {
            let digit = self.peek().and_then(|c| c.to_digit(16));
            let Some(digit) = digit else {
                return Err(lexical(escape_pos, format!("unicode escape needs {digits} hex digits")));
            };
            self.bump();
            code = code * 16 + digit;
        }
        char::from_u32(code)
            .ok_or_else(|| lexical(escape_pos, format!("invalid unicode code point U+{code:X}")))
    }

    fn lex_escaped_identifier(&mut self, start: Position) -> Result<Token> {
        self.bump();
        let mut name = String::new();
        loop {
            match self.bump() {
                None => return Err(lexical(start, "unterminated escaped identifier")),
                Some('`') => {
                    // `` inside an escaped name stands for a literal backtick
                    if self.eat('`') {
                        name.push('`');
                    } else {
                        break;
                    }
                }
                Some(c) => name.push(c),
            }
        }
        if name.is_empty() {
            return Err(lexical(start, "empty escaped identifier"));
        }
        Ok(Token { kind: TokenKind::Identifier, text: name, position: start })
    }

    fn lex_parameter(&mut self, start: Position) -> Result<Token> {
        self.bump();
        match self.peek() {
            Some(c) if is_ident_start(c) => self.bump_while(is_ident_part),
            Some(c) if c.is_ascii_digit() => {
                self.bump_while(|c| c.is_ascii_digit());
                if self.peek().is_some_and(is_ident_part) {
                    self.bump_while(is_ident_part);
                    let text = self.slice_from(start);
                    return Err(lexical(start, format!("invalid parameter name '{text}'")));
                }
            }
            _ => return Err(lexical(start, "expected a parameter name after '$'")),
        }
        let text = self.slice_from(start);
        Ok(Token { kind: TokenKind::Parameter, text: text[1..].to_string(), position: start })
    }

    fn lex_number(&mut self, start: Position) -> Result<Token> {
        let mut kind = TokenKind::Integer;
        let radix_prefix = match (self.peek(), self.peek_nth(1)) {
            (Some('0'), Some('x' | 'X')) => Some(16),
            (Some('0'), Some('o' | 'O')) => Some(8),
            _ => None,
        };

        if let Some(radix) = radix_prefix {
            self.bump();
            self.bump();
            let digits_start = self.offset();
            self.bump_while(|c| c.is_digit(radix));
            if self.offset() == digits_start {
                return Err(self.malformed_number(start));
            }
        } else {
            self.bump_while(|c| c.is_ascii_digit());
            // `1..3` is a range, not a float
            if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
                kind = TokenKind::Float;
                self.bump();
                self.bump_while(|c| c.is_ascii_digit());
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                let exponent_ok = match self.peek_nth(1) {
                    Some(c) if c.is_ascii_digit() => true,
                    Some('+' | '-') => self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
                    _ => false,
                };
                if !exponent_ok {
                    return Err(self.malformed_number(start));
                }
                kind = TokenKind::Float;
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.bump_while(|c| c.is_ascii_digit());
            }
        }

        if self.peek().is_some_and(is_ident_part) {
            return Err(self.malformed_number(start));
        }

        let text = self.slice_from(start);
        match kind {
            TokenKind::Integer if parse_integer_literal(&text).is_none() => {
                Err(lexical(start, format!("integer literal '{text}' is out of range")))
            }
            TokenKind::Float if !text.parse::<f64>().is_ok_and(f64::is_finite) => {
                Err(lexical(start, format!("float literal '{text}' is out of range")))
            }
            _ => Ok(Token { kind, text, position: start }),
        }
    }

    fn malformed_number(&mut self, start: Position) -> Error {
        self.bump_while(is_ident_part);
        let text = self.slice_from(start);
        lexical(start, format!("malformed numeric literal '{text}'"))
    }

    fn lex_symbol(&mut self, start: Position, ch: char) -> Result<Token> {
        self.bump();
        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '|' => TokenKind::Pipe,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '-' => TokenKind::Minus,
            '.' => {
                if self.eat('.') { TokenKind::DotDot } else { TokenKind::Dot }
            }
            '+' => {
                if self.eat('=') { TokenKind::PlusEq } else { TokenKind::Plus }
            }
            '=' => {
                if self.eat('~') { TokenKind::RegexMatch } else { TokenKind::Eq }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::Lte
                } else if self.eat('>') {
                    TokenKind::Neq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') { TokenKind::Gte } else { TokenKind::Gt }
            }
            other => return Err(lexical(start, format!("unexpected character '{other}'"))),
        };
        let text = self.slice_from(start);
        Ok(Token { kind, text, position: start })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(tok) => {
                trace!(kind = ?tok.kind, line = tok.position.line, column = tok.position.column, "token");
                self.finished = tok.kind == TokenKind::Eof;
            }
            Err(_) => self.finished = true,
        }
        Some(result)
    }
}

impl FusedIterator for Lexer<'_> {}

/// Value of an integer token's text (decimal, `0x` hex or `0o` octal).
pub fn parse_integer_literal(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        i64::from_str_radix(oct, 8).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

fn lexical(position: Position, message: impl Into<String>) -> Error {
    Error::LexicalError { position, message: message.into() }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn keyword_or_ident(s: &str) -> TokenKind {
    // ASCII folding only: `ſet` is an identifier, not SET
    match s.to_ascii_uppercase().as_str() {
        "MATCH" => TokenKind::Match,
        "OPTIONAL" => TokenKind::Optional,
        "WHERE" => TokenKind::Where,
        "RETURN" => TokenKind::Return,
        "WITH" => TokenKind::With,
        "UNWIND" => TokenKind::Unwind,
        "CREATE" => TokenKind::Create,
        "MERGE" => TokenKind::Merge,
        "DELETE" => TokenKind::Delete,
        "DETACH" => TokenKind::Detach,
        "SET" => TokenKind::Set,
        "REMOVE" => TokenKind::Remove,
        "ORDER" => TokenKind::Order,
        "BY" => TokenKind::By,
        "SKIP" => TokenKind::Skip,
        "LIMIT" => TokenKind::Limit,
        "ASC" | "ASCENDING" => TokenKind::Asc,
        "DESC" | "DESCENDING" => TokenKind::Desc,
        "DISTINCT" => TokenKind::Distinct,
        "AS" => TokenKind::As,
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "XOR" => TokenKind::Xor,
        "NOT" => TokenKind::Not,
        "IN" => TokenKind::In,
        "IS" => TokenKind::Is,
        "NULL" => TokenKind::Null,
        "TRUE" => TokenKind::True,
        "FALSE" => TokenKind::False,
        "STARTS" => TokenKind::Starts,
        "ENDS" => TokenKind::Ends,
        "CONTAINS" => TokenKind::Contains,
        "CASE" => TokenKind::Case,
        "WHEN" => TokenKind::When,
        "THEN" => TokenKind::Then,
        "ELSE" => TokenKind::Else,
        "END" => TokenKind::End,
        "UNION" => TokenKind::Union,
        "ALL" => TokenKind::All,
        "ON" => TokenKind::On,
        "CALL" => TokenKind::Call,
        "YIELD" => TokenKind::Yield,
        "MANDATORY" => TokenKind::Mandatory,
        "CYPHER" => TokenKind::Cypher,
        _ => TokenKind::Identifier,
    }
}
