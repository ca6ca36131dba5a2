//! Cypher recursive descent parser.
//!
//! Parses a token stream into AST nodes. Supports:
//! - MATCH / OPTIONAL MATCH / MANDATORY MATCH with patterns and WHERE
//! - RETURN / WITH projections with ORDER BY, SKIP, LIMIT
//! - CREATE, MERGE (ON CREATE / ON MATCH), DELETE / DETACH DELETE, SET, REMOVE
//! - UNWIND, CALL ... YIELD, UNION [ALL], a leading `CYPHER <version>` header
//! - Expressions via precedence climbing
//!
//! Tokens are pulled from the lexer on demand with a single token of
//! lookahead; nothing is ever rewound.

use hashbrown::HashSet;

use super::ast::*;
use super::lexer::{parse_integer_literal, tokenize, Lexer, Token, TokenKind};
use crate::config::ParserConfig;
use crate::{Error, Position, Result};

/// Parser state — wraps the lexer with a one-token cursor.
struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    depth: usize,
    max_depth: usize,
    /// `:` after an expression starts a label predicate, except inside
    /// subscript brackets where it separates slice bounds.
    label_predicates: bool,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, config: &ParserConfig) -> Result<Self> {
        let mut lexer = tokenize(source);
        let current = pull(&mut lexer, Position::START)?;
        Ok(Self {
            lexer,
            current,
            depth: 0,
            max_depth: config.max_depth,
            label_predicates: true,
        })
    }

    fn peek(&self) -> &Token {
        &self.current
    }

    fn peek_kind(&self) -> TokenKind {
        self.current.kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    /// Consume the current token and return it. At end of input the EOF
    /// token is returned again without touching the lexer.
    fn advance(&mut self) -> Result<Token> {
        if self.at(TokenKind::Eof) {
            return Ok(self.current.clone());
        }
        let next = pull(&mut self.lexer, self.current.position)?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn eat(&mut self, kind: TokenKind) -> Result<bool> {
        if self.at(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        self.expect_described(kind, kind.as_str())
    }

    fn expect_described(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.at(kind) {
            self.advance()
        } else {
            Err(self.error_expected(what))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<String> {
        Ok(self.expect_described(TokenKind::Identifier, what)?.text)
    }

    fn error_expected(&self, what: &str) -> Error {
        let found = self.peek().describe();
        syntax(self.peek().position, format!("expected {what}, found {found}"))
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(syntax(
                self.peek().position,
                format!("expression nesting exceeds the maximum depth of {}", self.max_depth),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn with_label_predicates<T>(
        &mut self,
        enabled: bool,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = std::mem::replace(&mut self.label_predicates, enabled);
        let result = f(self);
        self.label_predicates = saved;
        result
    }

    /// Check if current token is a keyword that starts a new clause.
    fn at_clause_start(&self) -> bool {
        matches!(self.peek_kind(),
            TokenKind::Match | TokenKind::Optional | TokenKind::Mandatory | TokenKind::Create |
            TokenKind::Merge | TokenKind::Return | TokenKind::With |
            TokenKind::Unwind | TokenKind::Delete | TokenKind::Detach |
            TokenKind::Set | TokenKind::Remove | TokenKind::Call
        )
    }
}

fn pull(lexer: &mut Lexer<'_>, fallback: Position) -> Result<Token> {
    lexer.next().unwrap_or_else(|| {
        Ok(Token { kind: TokenKind::Eof, text: String::new(), position: fallback })
    })
}

fn syntax(position: Position, message: impl Into<String>) -> Error {
    Error::SyntaxError { position, message: message.into() }
}

/// Parse a complete Cypher query.
pub fn parse_query(source: &str, config: &ParserConfig) -> Result<Query> {
    let mut p = Parser::new(source, config)?;

    let version = parse_version_header(&mut p)?;
    let clauses = parse_query_part(&mut p)?;
    let mut unions = Vec::new();
    while p.eat(TokenKind::Union)? {
        let all = p.eat(TokenKind::All)?;
        let clauses = parse_query_part(&mut p)?;
        unions.push(UnionPart { all, clauses });
    }

    // Allow optional semicolon + EOF
    p.eat(TokenKind::Semicolon)?;
    if !p.at(TokenKind::Eof) {
        return Err(p.error_expected("a clause keyword or end of input"));
    }

    Ok(Query { version, clauses, unions })
}

/// `CYPHER 5` / `CYPHER 4.4` ahead of the first clause.
fn parse_version_header(p: &mut Parser) -> Result<Option<String>> {
    if !p.eat(TokenKind::Cypher)? {
        return Ok(None);
    }
    match p.peek_kind() {
        TokenKind::Integer | TokenKind::Float => Ok(Some(p.advance()?.text)),
        _ => Err(p.error_expected("a version number after CYPHER")),
    }
}

// ============================================================================
// Clause parsers
// ============================================================================

fn parse_query_part(p: &mut Parser) -> Result<Vec<Clause>> {
    let mut clauses = Vec::new();
    while p.at_clause_start() {
        if let Some(Clause::Return(_)) = clauses.last() {
            let found = p.peek().describe();
            return Err(syntax(
                p.peek().position,
                format!("RETURN must be the last clause of a query, found {found}"),
            ));
        }
        clauses.push(parse_clause(p)?);
    }
    if clauses.is_empty() {
        return Err(p.error_expected("a clause keyword such as MATCH, CREATE or RETURN"));
    }
    Ok(clauses)
}

fn parse_clause(p: &mut Parser) -> Result<Clause> {
    match p.peek_kind() {
        TokenKind::Match | TokenKind::Optional | TokenKind::Mandatory => {
            parse_match_clause(p).map(Clause::Match)
        }
        TokenKind::Create => {
            p.advance()?;
            let pattern = parse_pattern(p)?;
            Ok(Clause::Create(CreateClause { pattern }))
        }
        TokenKind::Merge => parse_merge_clause(p).map(Clause::Merge),
        TokenKind::Return => {
            p.advance()?;
            let projection = parse_projection(p)?;
            Ok(Clause::Return(ReturnClause { projection }))
        }
        TokenKind::With => {
            p.advance()?;
            let projection = parse_projection(p)?;
            let where_clause = parse_where(p)?;
            Ok(Clause::With(WithClause { projection, where_clause }))
        }
        TokenKind::Unwind => {
            p.advance()?;
            let expr = parse_expr(p)?;
            p.expect_described(TokenKind::As, "AS after UNWIND expression")?;
            let variable = p.expect_identifier("a variable name after AS")?;
            Ok(Clause::Unwind(UnwindClause { expr, variable }))
        }
        TokenKind::Delete | TokenKind::Detach => parse_delete_clause(p).map(Clause::Delete),
        TokenKind::Set => {
            p.advance()?;
            let items = parse_set_items(p)?;
            Ok(Clause::Set(SetClause { items }))
        }
        TokenKind::Remove => {
            p.advance()?;
            let items = parse_remove_items(p)?;
            Ok(Clause::Remove(RemoveClause { items }))
        }
        TokenKind::Call => parse_call_clause(p).map(Clause::Call),
        _ => Err(p.error_expected("a clause keyword")),
    }
}

fn parse_match_clause(p: &mut Parser) -> Result<MatchClause> {
    let optional = p.eat(TokenKind::Optional)?;
    let mandatory = !optional && p.eat(TokenKind::Mandatory)?;
    p.expect(TokenKind::Match)?;
    let pattern = parse_pattern(p)?;
    let where_clause = parse_where(p)?;
    Ok(MatchClause { optional, mandatory, pattern, where_clause })
}

fn parse_where(p: &mut Parser) -> Result<Option<Expr>> {
    if p.eat(TokenKind::Where)? {
        Ok(Some(parse_expr(p)?))
    } else {
        Ok(None)
    }
}

fn parse_merge_clause(p: &mut Parser) -> Result<MergeClause> {
    p.expect(TokenKind::Merge)?;
    let path = parse_pattern_path(p)?;

    // ON CREATE SET ... / ON MATCH SET ..., in any order, repeatable
    let mut on_create = Vec::new();
    let mut on_match = Vec::new();
    while p.eat(TokenKind::On)? {
        if p.eat(TokenKind::Create)? {
            p.expect(TokenKind::Set)?;
            on_create.extend(parse_set_items(p)?);
        } else if p.eat(TokenKind::Match)? {
            p.expect(TokenKind::Set)?;
            on_match.extend(parse_set_items(p)?);
        } else {
            return Err(p.error_expected("CREATE or MATCH after ON"));
        }
    }

    Ok(MergeClause { path, on_create, on_match })
}

fn parse_delete_clause(p: &mut Parser) -> Result<DeleteClause> {
    let detach = p.eat(TokenKind::Detach)?;
    p.expect(TokenKind::Delete)?;
    let mut exprs = vec![parse_expr(p)?];
    while p.eat(TokenKind::Comma)? {
        exprs.push(parse_expr(p)?);
    }
    Ok(DeleteClause { detach, exprs })
}

fn parse_call_clause(p: &mut Parser) -> Result<CallClause> {
    p.expect(TokenKind::Call)?;

    // Procedure name: name or ns.ns.name
    let mut procedure = vec![p.expect_identifier("a procedure name")?];
    while p.eat(TokenKind::Dot)? {
        procedure.push(p.expect_identifier("a procedure name part after '.'")?);
    }

    let args = if p.eat(TokenKind::LParen)? {
        let args = parse_argument_list(p)?;
        p.expect_described(TokenKind::RParen, "')' to close procedure arguments")?;
        Some(args)
    } else {
        None
    };

    let mut yields = Vec::new();
    let mut where_clause = None;
    if p.eat(TokenKind::Yield)? {
        loop {
            let field = p.expect_identifier("a field name after YIELD")?;
            let alias = if p.eat(TokenKind::As)? {
                Some(p.expect_identifier("an alias after AS")?)
            } else {
                None
            };
            yields.push(YieldItem { field, alias });
            if !p.eat(TokenKind::Comma)? {
                break;
            }
        }
        where_clause = parse_where(p)?;
    }

    Ok(CallClause { procedure, args, yields, where_clause })
}

// ============================================================================
// RETURN / WITH projections
// ============================================================================

fn parse_projection(p: &mut Parser) -> Result<Projection> {
    let distinct = p.eat(TokenKind::Distinct)?;

    let star = p.eat(TokenKind::Star)?;
    let items = if !star || p.eat(TokenKind::Comma)? {
        parse_projection_items(p)?
    } else {
        Vec::new()
    };

    let mut order_by = Vec::new();
    if p.eat(TokenKind::Order)? {
        p.expect_described(TokenKind::By, "BY after ORDER")?;
        loop {
            order_by.push(parse_sort_item(p)?);
            if !p.eat(TokenKind::Comma)? {
                break;
            }
        }
    }

    let skip = if p.eat(TokenKind::Skip)? { Some(parse_row_count(p, "SKIP")?) } else { None };
    let limit = if p.eat(TokenKind::Limit)? { Some(parse_row_count(p, "LIMIT")?) } else { None };

    Ok(Projection { distinct, star, items, order_by, skip, limit })
}

fn parse_projection_items(p: &mut Parser) -> Result<Vec<ProjectionItem>> {
    let mut items = Vec::new();
    let mut columns = HashSet::new();
    loop {
        let item_pos = p.peek().position;
        let expr = parse_expr(p)?;
        let (alias, name_pos) = if p.eat(TokenKind::As)? {
            let alias_pos = p.peek().position;
            (Some(p.expect_identifier("an alias after AS")?), alias_pos)
        } else {
            (None, item_pos)
        };

        let item = ProjectionItem { expr, alias };
        if let Some(name) = item.column_name() {
            if !columns.insert(name.to_string()) {
                return Err(syntax(name_pos, format!("duplicate column name `{name}` in projection")));
            }
        }
        items.push(item);

        if !p.eat(TokenKind::Comma)? {
            return Ok(items);
        }
    }
}

fn parse_sort_item(p: &mut Parser) -> Result<SortItem> {
    let expr = parse_expr(p)?;
    let ascending = if p.eat(TokenKind::Desc)? {
        false
    } else {
        p.eat(TokenKind::Asc)?;
        true
    };
    Ok(SortItem { expr, ascending })
}

fn parse_row_count(p: &mut Parser, clause: &str) -> Result<RowCount> {
    match p.peek_kind() {
        TokenKind::Integer => {
            let tok = p.advance()?;
            parse_integer_literal(&tok.text)
                .and_then(|n| u64::try_from(n).ok())
                .map(RowCount::Count)
                .ok_or_else(|| syntax(tok.position, format!("invalid {clause} count '{}'", tok.text)))
        }
        TokenKind::Parameter => Ok(RowCount::Parameter(p.advance()?.text)),
        _ => Err(p.error_expected(&format!("an integer or parameter after {clause}"))),
    }
}

// ============================================================================
// SET / REMOVE items
// ============================================================================

fn parse_set_items(p: &mut Parser) -> Result<Vec<SetItem>> {
    let mut items = vec![parse_set_item(p)?];
    while p.eat(TokenKind::Comma)? {
        items.push(parse_set_item(p)?);
    }
    Ok(items)
}

fn parse_set_item(p: &mut Parser) -> Result<SetItem> {
    let variable = p.expect_identifier("a variable in SET item")?;

    match p.peek_kind() {
        TokenKind::Dot => {
            // SET n.prop = expr
            p.advance()?;
            let key = p.expect_identifier("a property key after '.'")?;
            p.expect(TokenKind::Eq)?;
            let value = parse_expr(p)?;
            Ok(SetItem::Property { variable, key, value })
        }
        TokenKind::PlusEq => {
            // SET n += {map}
            p.advance()?;
            let value = parse_expr(p)?;
            Ok(SetItem::Merge { variable, value })
        }
        TokenKind::Eq => {
            // SET n = {map}
            p.advance()?;
            let value = parse_expr(p)?;
            Ok(SetItem::Replace { variable, value })
        }
        TokenKind::Colon => {
            // SET n:Label
            let labels = parse_label_list(p)?;
            Ok(SetItem::Labels { variable, labels })
        }
        _ => Err(p.error_expected("'.', '=', '+=' or ':' after SET variable")),
    }
}

fn parse_remove_items(p: &mut Parser) -> Result<Vec<RemoveItem>> {
    let mut items = vec![parse_remove_item(p)?];
    while p.eat(TokenKind::Comma)? {
        items.push(parse_remove_item(p)?);
    }
    Ok(items)
}

fn parse_remove_item(p: &mut Parser) -> Result<RemoveItem> {
    let variable = p.expect_identifier("a variable in REMOVE item")?;

    if p.eat(TokenKind::Dot)? {
        // REMOVE n.prop
        let key = p.expect_identifier("a property key after '.'")?;
        Ok(RemoveItem::Property { variable, key })
    } else if p.at(TokenKind::Colon) {
        // REMOVE n:Label
        let labels = parse_label_list(p)?;
        Ok(RemoveItem::Labels { variable, labels })
    } else {
        Err(p.error_expected("'.' or ':' after REMOVE variable"))
    }
}

/// `:A:B` — at least one label; repeats are dropped.
fn parse_label_list(p: &mut Parser) -> Result<NameList> {
    let mut labels = NameList::new();
    p.expect(TokenKind::Colon)?;
    loop {
        let label = p.expect_identifier("a label name after ':'")?;
        if !labels.contains(&label) {
            labels.push(label);
        }
        if !p.eat(TokenKind::Colon)? {
            return Ok(labels);
        }
    }
}

// ============================================================================
// Pattern parsing
// ============================================================================

fn parse_pattern(p: &mut Parser) -> Result<Pattern> {
    let mut paths = vec![parse_pattern_path(p)?];
    while p.eat(TokenKind::Comma)? {
        paths.push(parse_pattern_path(p)?);
    }
    Ok(Pattern { paths })
}

fn parse_pattern_path(p: &mut Parser) -> Result<PatternPath> {
    // Named path: p = (a)-->(b)
    let variable = if p.at(TokenKind::Identifier) {
        let name = p.advance()?.text;
        p.expect_described(TokenKind::Eq, "'=' after path variable")?;
        Some(name)
    } else {
        None
    };

    // A path starts with a node, then alternates relationship, node, ...
    let start = parse_node_pattern(p)?;
    let mut steps = Vec::new();
    while p.at(TokenKind::Minus) || p.at(TokenKind::Lt) {
        let relationship = parse_relationship_pattern(p)?;
        let node = parse_node_pattern(p)?;
        steps.push(PatternStep { relationship, node });
    }

    Ok(PatternPath { variable, start, steps })
}

fn parse_node_pattern(p: &mut Parser) -> Result<NodePattern> {
    p.expect_described(TokenKind::LParen, "'(' to start a node pattern")?;

    let variable = if p.at(TokenKind::Identifier) {
        Some(p.advance()?.text)
    } else {
        None
    };

    // Labels: :Label1:Label2
    let labels = if p.at(TokenKind::Colon) { parse_label_list(p)? } else { NameList::new() };

    let properties = parse_pattern_properties(p)?;

    p.expect_described(TokenKind::RParen, "')' to close node pattern")?;

    Ok(NodePattern { variable, labels, properties })
}

fn parse_relationship_pattern(p: &mut Parser) -> Result<RelationshipPattern> {
    // <-[...]- or -[...]-> or -[...]-, brackets optional
    let left_arrow = p.eat(TokenKind::Lt)?;
    p.expect_described(TokenKind::Minus, "'-' to start a relationship pattern")?;

    let mut variable = None;
    let mut types = NameList::new();
    let mut length = None;
    let mut properties = None;

    if p.eat(TokenKind::LBracket)? {
        if p.at(TokenKind::Identifier) {
            variable = Some(p.advance()?.text);
        }

        // Rel types: :TYPE1|TYPE2 (a repeated ':' after '|' is tolerated)
        if p.eat(TokenKind::Colon)? {
            loop {
                let rel_type = p.expect_identifier("a relationship type")?;
                if !types.contains(&rel_type) {
                    types.push(rel_type);
                }
                if !p.eat(TokenKind::Pipe)? {
                    break;
                }
                p.eat(TokenKind::Colon)?;
            }
        }

        // Variable length: *min..max
        if p.at(TokenKind::Star) {
            length = Some(parse_path_length(p)?);
        }

        properties = parse_pattern_properties(p)?;

        p.expect_described(TokenKind::RBracket, "']' to close relationship pattern")?;
    }

    p.expect_described(TokenKind::Minus, "'-' to finish relationship pattern")?;
    let right_arrow = p.eat(TokenKind::Gt)?;

    let direction = match (left_arrow, right_arrow) {
        (true, false) => Direction::Left,
        (false, true) => Direction::Right,
        // <-[]-> carries no usable direction
        _ => Direction::Undirected,
    };

    Ok(RelationshipPattern { variable, direction, types, length, properties })
}

fn parse_path_length(p: &mut Parser) -> Result<PathLength> {
    let star = p.expect(TokenKind::Star)?;
    let min = parse_hop_count(p)?;
    let length = if p.eat(TokenKind::DotDot)? {
        PathLength { min, max: parse_hop_count(p)? }
    } else {
        // `*` is unbounded, `*3` is exactly three hops
        PathLength { min, max: min }
    };

    if let (Some(min), Some(max)) = (length.min, length.max) {
        if min > max {
            return Err(syntax(
                star.position,
                format!("invalid hop range *{min}..{max}: minimum exceeds maximum"),
            ));
        }
    }
    Ok(length)
}

fn parse_hop_count(p: &mut Parser) -> Result<Option<u64>> {
    if !p.at(TokenKind::Integer) {
        return Ok(None);
    }
    let tok = p.advance()?;
    parse_integer_literal(&tok.text)
        .and_then(|n| u64::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| syntax(tok.position, format!("invalid hop count '{}'", tok.text)))
}

/// Property maps in patterns must be literal maps, never parameters or
/// other expressions.
fn parse_pattern_properties(p: &mut Parser) -> Result<Option<MapLiteral>> {
    match p.peek_kind() {
        TokenKind::LBrace => Ok(Some(parse_map_literal(p)?)),
        TokenKind::Parameter => Err(p.error_expected("a map literal for pattern properties")),
        _ => Ok(None),
    }
}

// ============================================================================
// Expression parsing (precedence climbing)
// ============================================================================

/// Binding power, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Or,
    And,
    Not,
    Comparison,
    Predicate,
    Additive,
    Multiplicative,
    Power,
    Unary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Not,
            Precedence::Not => Precedence::Comparison,
            Precedence::Comparison => Precedence::Predicate,
            Precedence::Predicate => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Power,
            Precedence::Power | Precedence::Unary => Precedence::Unary,
        }
    }
}

fn infix_operator(kind: TokenKind) -> Option<(BinaryOp, Precedence)> {
    let entry = match kind {
        TokenKind::Or => (BinaryOp::Or, Precedence::Or),
        TokenKind::Xor => (BinaryOp::Xor, Precedence::Or),
        TokenKind::And => (BinaryOp::And, Precedence::And),
        TokenKind::Eq => (BinaryOp::Eq, Precedence::Comparison),
        TokenKind::Neq => (BinaryOp::Neq, Precedence::Comparison),
        TokenKind::Lt => (BinaryOp::Lt, Precedence::Comparison),
        TokenKind::Lte => (BinaryOp::Lte, Precedence::Comparison),
        TokenKind::Gt => (BinaryOp::Gt, Precedence::Comparison),
        TokenKind::Gte => (BinaryOp::Gte, Precedence::Comparison),
        TokenKind::Starts => (BinaryOp::StartsWith, Precedence::Predicate),
        TokenKind::Ends => (BinaryOp::EndsWith, Precedence::Predicate),
        TokenKind::Contains => (BinaryOp::Contains, Precedence::Predicate),
        TokenKind::RegexMatch => (BinaryOp::RegexMatch, Precedence::Predicate),
        TokenKind::In => (BinaryOp::In, Precedence::Predicate),
        TokenKind::Plus => (BinaryOp::Add, Precedence::Additive),
        TokenKind::Minus => (BinaryOp::Sub, Precedence::Additive),
        TokenKind::Star => (BinaryOp::Mul, Precedence::Multiplicative),
        TokenKind::Slash => (BinaryOp::Div, Precedence::Multiplicative),
        TokenKind::Percent => (BinaryOp::Mod, Precedence::Multiplicative),
        TokenKind::Caret => (BinaryOp::Pow, Precedence::Power),
        _ => return None,
    };
    Some(entry)
}

fn parse_expr(p: &mut Parser) -> Result<Expr> {
    parse_expr_bp(p, Precedence::Or)
}

/// Expression inside delimiters, where `:` is a label predicate again.
fn parse_nested_expr(p: &mut Parser) -> Result<Expr> {
    p.with_label_predicates(true, parse_expr)
}

fn parse_expr_bp(p: &mut Parser, min: Precedence) -> Result<Expr> {
    p.enter()?;
    let result = parse_operators(p, min);
    p.leave();
    result
}

fn parse_operators(p: &mut Parser, min: Precedence) -> Result<Expr> {
    let mut lhs = parse_prefix(p, min)?;

    loop {
        // IS [NOT] NULL binds like the other predicates
        if p.at(TokenKind::Is) && Precedence::Predicate >= min {
            p.advance()?;
            let negated = p.eat(TokenKind::Not)?;
            p.expect_described(TokenKind::Null, "NULL after IS")?;
            lhs = Expr::IsNull { expr: Box::new(lhs), negated };
            continue;
        }

        let Some((op, prec)) = infix_operator(p.peek_kind()) else {
            break;
        };
        if prec < min {
            break;
        }
        p.advance()?;
        if matches!(op, BinaryOp::StartsWith | BinaryOp::EndsWith) {
            p.expect_described(TokenKind::With, "WITH")?;
        }

        // ^ is right-associative, everything else left-associative
        let rhs_min = if op == BinaryOp::Pow { prec } else { prec.next() };
        let rhs = parse_expr_bp(p, rhs_min)?;
        lhs = Expr::binary(op, lhs, rhs);
    }

    Ok(lhs)
}

fn parse_prefix(p: &mut Parser, min: Precedence) -> Result<Expr> {
    match p.peek_kind() {
        // `a = NOT b`: NOT sits below comparison, so it cannot be the operand here
        TokenKind::Not if min > Precedence::Not => Err(syntax(
            p.peek().position,
            "NOT cannot be the operand of a tighter-binding operator; wrap it in parentheses",
        )),
        TokenKind::Not => {
            p.advance()?;
            let expr = parse_expr_bp(p, Precedence::Not)?;
            Ok(Expr::unary(UnaryOp::Not, expr))
        }
        TokenKind::Minus => {
            p.advance()?;
            let expr = parse_expr_bp(p, Precedence::Unary)?;
            Ok(Expr::unary(UnaryOp::Negate, expr))
        }
        _ => parse_postfix(p),
    }
}

fn parse_postfix(p: &mut Parser) -> Result<Expr> {
    let mut expr = parse_primary(p)?;

    loop {
        match p.peek_kind() {
            // Property access chain: n.name, n.address.city
            TokenKind::Dot => {
                p.advance()?;
                let key = p.expect_identifier("a property key after '.'")?;
                if p.at(TokenKind::LParen) {
                    // Namespaced function: apoc.text.join(...)
                    if let Some(namespace) = dotted_name(&expr) {
                        expr = parse_function_call(p, format!("{namespace}.{key}"))?;
                        continue;
                    }
                }
                expr = match expr {
                    Expr::Property { base, mut keys } => {
                        keys.push(key);
                        Expr::Property { base, keys }
                    }
                    base => Expr::Property { base: Box::new(base), keys: vec![key] },
                };
            }
            TokenKind::LBracket => expr = parse_subscript(p, expr)?,
            // Label check: n:Person
            TokenKind::Colon if p.label_predicates => {
                let labels = parse_label_list(p)?;
                expr = Expr::HasLabels { expr: Box::new(expr), labels };
            }
            _ => return Ok(expr),
        }
    }
}

/// `a` or `a.b.c` as a plain dotted name, if the expression is one.
fn dotted_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Variable(name) => Some(name.clone()),
        Expr::Property { base, keys } => match base.as_ref() {
            Expr::Variable(name) => Some(format!("{name}.{}", keys.join("."))),
            _ => None,
        },
        _ => None,
    }
}

fn parse_subscript(p: &mut Parser, base: Expr) -> Result<Expr> {
    p.expect(TokenKind::LBracket)?;
    let base = Box::new(base);

    let at_separator = p.at(TokenKind::DotDot) || p.at(TokenKind::Colon);
    let from = if at_separator { None } else { Some(parse_subscript_bound(p)?) };
    let is_slice = p.eat(TokenKind::DotDot)? || p.eat(TokenKind::Colon)?;

    let expr = match (from, is_slice) {
        (Some(index), false) => Expr::Index { base, index: Box::new(index) },
        (from, _) => {
            let to = if p.at(TokenKind::RBracket) { None } else { Some(parse_subscript_bound(p)?) };
            Expr::Slice { base, from: from.map(Box::new), to: to.map(Box::new) }
        }
    };

    p.expect_described(TokenKind::RBracket, "']' to close subscript")?;
    Ok(expr)
}

fn parse_subscript_bound(p: &mut Parser) -> Result<Expr> {
    p.with_label_predicates(false, parse_expr)
}

fn parse_primary(p: &mut Parser) -> Result<Expr> {
    match p.peek_kind() {
        // Literals
        TokenKind::Integer => {
            let tok = p.advance()?;
            let value = parse_integer_literal(&tok.text).ok_or_else(|| {
                syntax(tok.position, format!("integer literal '{}' is out of range", tok.text))
            })?;
            Ok(Expr::Literal(Literal::Integer(value)))
        }
        TokenKind::Float => {
            let tok = p.advance()?;
            let value = tok.text.parse::<f64>().map_err(|_| {
                syntax(tok.position, format!("invalid float literal '{}'", tok.text))
            })?;
            Ok(Expr::Literal(Literal::Float(value)))
        }
        TokenKind::String => Ok(Expr::Literal(Literal::String(p.advance()?.text))),
        TokenKind::True => {
            p.advance()?;
            Ok(Expr::Literal(Literal::Bool(true)))
        }
        TokenKind::False => {
            p.advance()?;
            Ok(Expr::Literal(Literal::Bool(false)))
        }
        TokenKind::Null => {
            p.advance()?;
            Ok(Expr::Literal(Literal::Null))
        }

        TokenKind::Parameter => Ok(Expr::Parameter(p.advance()?.text)),

        // Parenthesized expression
        TokenKind::LParen => {
            p.advance()?;
            let expr = parse_nested_expr(p)?;
            p.expect_described(TokenKind::RParen, "')' to close parenthesized expression")?;
            Ok(expr)
        }

        // List literal
        TokenKind::LBracket => {
            p.advance()?;
            let items = parse_argument_list(p)?;
            p.expect_described(TokenKind::RBracket, "']' to close list literal")?;
            Ok(Expr::List(items))
        }

        TokenKind::LBrace => Ok(Expr::Map(parse_map_literal(p)?)),

        TokenKind::Case => parse_case(p),

        // Identifier — variable or function call
        TokenKind::Identifier => {
            let name = p.advance()?.text;
            if p.at(TokenKind::LParen) {
                parse_function_call(p, name)
            } else {
                Ok(Expr::Variable(name))
            }
        }

        _ => Err(p.error_expected("an expression")),
    }
}

/// Comma-separated expressions up to (not including) a closing delimiter.
/// Empty when the next token cannot start an expression item.
fn parse_argument_list(p: &mut Parser) -> Result<Vec<Expr>> {
    let mut items = Vec::new();
    if p.at(TokenKind::RParen) || p.at(TokenKind::RBracket) {
        return Ok(items);
    }
    loop {
        items.push(parse_nested_expr(p)?);
        if !p.eat(TokenKind::Comma)? {
            return Ok(items);
        }
    }
}

fn parse_function_call(p: &mut Parser, name: String) -> Result<Expr> {
    p.expect(TokenKind::LParen)?;

    // count(*)
    if name.eq_ignore_ascii_case("count") && p.eat(TokenKind::Star)? {
        p.expect_described(TokenKind::RParen, "')' after count(*")?;
        return Ok(Expr::CountStar);
    }

    // count(DISTINCT n)
    let distinct = p.eat(TokenKind::Distinct)?;
    let args = parse_argument_list(p)?;
    p.expect_described(TokenKind::RParen, "')' to close function arguments")?;
    Ok(Expr::FunctionCall { name, args, distinct })
}

fn parse_case(p: &mut Parser) -> Result<Expr> {
    p.expect(TokenKind::Case)?;

    // Simple form: CASE x WHEN 1 THEN ...; searched form: CASE WHEN cond THEN ...
    let operand = if p.at(TokenKind::When) {
        None
    } else {
        Some(Box::new(parse_nested_expr(p)?))
    };

    let mut alternatives = Vec::new();
    while p.eat(TokenKind::When)? {
        let when = parse_nested_expr(p)?;
        p.expect(TokenKind::Then)?;
        let then = parse_nested_expr(p)?;
        alternatives.push((when, then));
    }
    if alternatives.is_empty() {
        return Err(p.error_expected("WHEN in CASE expression"));
    }

    let default = if p.eat(TokenKind::Else)? {
        Some(Box::new(parse_nested_expr(p)?))
    } else {
        None
    };
    p.expect_described(TokenKind::End, "END to close CASE expression")?;

    Ok(Expr::Case { operand, alternatives, default })
}

fn parse_map_literal(p: &mut Parser) -> Result<MapLiteral> {
    p.expect(TokenKind::LBrace)?;
    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    if !p.at(TokenKind::RBrace) {
        loop {
            let key_pos = p.peek().position;
            let key = p.expect_identifier("a map key")?;
            if !seen.insert(key.clone()) {
                return Err(syntax(key_pos, format!("duplicate key `{key}` in map literal")));
            }
            p.expect(TokenKind::Colon)?;
            let value = parse_nested_expr(p)?;
            entries.push((key, value));
            if !p.eat(TokenKind::Comma)? {
                break;
            }
        }
    }
    p.expect_described(TokenKind::RBrace, "'}' to close map literal")?;
    Ok(MapLiteral { entries })
}

// ============================================================================
// Tests
// ============================================================================
