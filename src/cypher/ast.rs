//! Cypher AST (Abstract Syntax Tree)
//!
//! These types represent parsed Cypher queries. They are pure data —
//! no behavior beyond a few read-only accessors, no back-references.
//! Every node is owned by exactly one parent.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Label and relationship-type lists; almost always one or two entries.
pub type NameList = SmallVec<[String; 2]>;

/// A complete Cypher query: one or more clauses, optionally combined
/// with further query parts through `UNION`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Number after a leading `CYPHER` header (`CYPHER 5 MATCH ...`), as written.
    pub version: Option<String>,
    pub clauses: Vec<Clause>,
    pub unions: Vec<UnionPart>,
}

/// `UNION [ALL] <clauses>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionPart {
    pub all: bool,
    pub clauses: Vec<Clause>,
}

/// One clause, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    Match(MatchClause),
    Create(CreateClause),
    Merge(MergeClause),
    Return(ReturnClause),
    With(WithClause),
    Unwind(UnwindClause),
    Delete(DeleteClause),
    Set(SetClause),
    Remove(RemoveClause),
    Call(CallClause),
}

impl Clause {
    /// Leading keyword(s) of the clause, for diagnostics and logs.
    pub fn keyword(&self) -> &'static str {
        match self {
            Clause::Match(m) if m.optional => "OPTIONAL MATCH",
            Clause::Match(m) if m.mandatory => "MANDATORY MATCH",
            Clause::Match(_) => "MATCH",
            Clause::Create(_) => "CREATE",
            Clause::Merge(_) => "MERGE",
            Clause::Return(_) => "RETURN",
            Clause::With(_) => "WITH",
            Clause::Unwind(_) => "UNWIND",
            Clause::Delete(d) if d.detach => "DETACH DELETE",
            Clause::Delete(_) => "DELETE",
            Clause::Set(_) => "SET",
            Clause::Remove(_) => "REMOVE",
            Clause::Call(_) => "CALL",
        }
    }
}

/// `[OPTIONAL | MANDATORY] MATCH pattern [WHERE expr]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchClause {
    pub optional: bool,
    pub mandatory: bool,
    pub pattern: Pattern,
    pub where_clause: Option<Expr>,
}

/// `CREATE pattern`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClause {
    pub pattern: Pattern,
}

/// `MERGE path [ON CREATE SET ...] [ON MATCH SET ...]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeClause {
    pub path: PatternPath,
    pub on_create: Vec<SetItem>,
    pub on_match: Vec<SetItem>,
}

/// `RETURN projection`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnClause {
    pub projection: Projection,
}

/// `WITH projection [WHERE expr]` (pipeline boundary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithClause {
    pub projection: Projection,
    pub where_clause: Option<Expr>,
}

/// `UNWIND expr AS variable`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnwindClause {
    pub expr: Expr,
    pub variable: String,
}

/// `[DETACH] DELETE expr, ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteClause {
    pub detach: bool,
    pub exprs: Vec<Expr>,
}

/// `SET item, ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetClause {
    pub items: Vec<SetItem>,
}

/// `REMOVE item, ...`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveClause {
    pub items: Vec<RemoveItem>,
}

/// `CALL ns.proc(args) [YIELD field [AS alias], ... [WHERE expr]]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallClause {
    /// Namespace parts followed by the procedure name.
    pub procedure: Vec<String>,
    /// `None` when the argument list was omitted entirely (`CALL db.labels`).
    pub args: Option<Vec<Expr>>,
    pub yields: Vec<YieldItem>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldItem {
    pub field: String,
    pub alias: Option<String>,
}

// ============================================================================
// Projections
// ============================================================================

/// Shared body of `RETURN` and `WITH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub distinct: bool,
    /// `RETURN *` / `WITH *`, possibly followed by further items.
    pub star: bool,
    pub items: Vec<ProjectionItem>,
    pub order_by: Vec<SortItem>,
    pub skip: Option<RowCount>,
    pub limit: Option<RowCount>,
}

/// `expr [AS alias]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl ProjectionItem {
    /// Result column name: the alias, the name of a bare variable, or the
    /// dotted text of a property chain on a variable (`a.address.city`).
    /// Other unaliased expressions have no name that can be compared.
    pub fn column_name(&self) -> Option<Cow<'_, str>> {
        match (&self.alias, &self.expr) {
            (Some(alias), _) => Some(Cow::Borrowed(alias)),
            (None, Expr::Variable(name)) => Some(Cow::Borrowed(name)),
            (None, Expr::Property { base, keys }) => match base.as_ref() {
                Expr::Variable(name) => Some(Cow::Owned(format!("{name}.{}", keys.join(".")))),
                _ => None,
            },
            _ => None,
        }
    }
}

/// ORDER BY item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortItem {
    pub expr: Expr,
    pub ascending: bool,
}

/// Argument of SKIP / LIMIT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowCount {
    Count(u64),
    Parameter(String),
}

// ============================================================================
// Write items
// ============================================================================

/// Single SET item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetItem {
    /// SET n.prop = expr
    Property { variable: String, key: String, value: Expr },
    /// SET n = {map}
    Replace { variable: String, value: Expr },
    /// SET n += {map}
    Merge { variable: String, value: Expr },
    /// SET n:Label1:Label2
    Labels { variable: String, labels: NameList },
}

/// Single REMOVE item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RemoveItem {
    /// REMOVE n.prop
    Property { variable: String, key: String },
    /// REMOVE n:Label1:Label2
    Labels { variable: String, labels: NameList },
}

// ============================================================================
// Patterns
// ============================================================================

/// Comma-separated paths: `(a)-->(b), (c)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub paths: Vec<PatternPath>,
}

/// A path always starts with a node, and every relationship is followed by
/// a node: `p = (a:Person)-[:KNOWS]->(b)<-[:LIKES]-(c)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternPath {
    /// Named path variable (`p = ...`).
    pub variable: Option<String>,
    pub start: NodePattern,
    pub steps: Vec<PatternStep>,
}

/// A relationship and the node it leads to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternStep {
    pub relationship: RelationshipPattern,
    pub node: NodePattern,
}

/// Borrowed view of one element of a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PatternElement<'a> {
    Node(&'a NodePattern),
    Relationship(&'a RelationshipPattern),
}

impl PatternPath {
    /// The path as an alternating node, relationship, node, ... sequence.
    pub fn elements(&self) -> impl Iterator<Item = PatternElement<'_>> + '_ {
        std::iter::once(PatternElement::Node(&self.start)).chain(self.steps.iter().flat_map(|step| {
            [PatternElement::Relationship(&step.relationship), PatternElement::Node(&step.node)]
        }))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodePattern> + '_ {
        std::iter::once(&self.start).chain(self.steps.iter().map(|s| &s.node))
    }

    pub fn relationships(&self) -> impl Iterator<Item = &RelationshipPattern> + '_ {
        self.steps.iter().map(|s| &s.relationship)
    }

    pub fn end(&self) -> &NodePattern {
        self.steps.last().map_or(&self.start, |s| &s.node)
    }
}

/// Node pattern: `(variable:Label1:Label2 {prop: value})`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: NameList,
    pub properties: Option<MapLiteral>,
}

/// Relationship pattern: `-[variable:TYPE1|TYPE2 *min..max {props}]->`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipPattern {
    pub variable: Option<String>,
    pub direction: Direction,
    pub types: NameList,
    pub length: Option<PathLength>,
    pub properties: Option<MapLiteral>,
}

/// Pattern direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// `<-[]-`
    Left,
    /// `-[]->`
    Right,
    /// `-[]-`
    Undirected,
}

/// Variable-length hop bounds. `*` leaves both open, `*3` fixes both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathLength {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

// ============================================================================
// Expressions
// ============================================================================

/// `{key: expr, ...}` with keys in source order, no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapLiteral {
    pub entries: Vec<(String, Expr)>,
}

impl MapLiteral {
    pub fn get(&self, key: &str) -> Option<&Expr> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Expression in Cypher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal value
    Literal(Literal),
    /// List: `[1, 2, 3]`
    List(Vec<Expr>),
    /// Map: `{name: 'Ada', age: 3}`
    Map(MapLiteral),
    /// Parameter: `$name` or positional `$0`
    Parameter(String),
    /// Variable reference: `n`, `r`, `p`
    Variable(String),
    /// Property access chain: `n.address.city` has keys `["address", "city"]`
    Property { base: Box<Expr>, keys: Vec<String> },
    /// Function call: `count(DISTINCT n)`, `apoc.text.join(xs, ',')`
    FunctionCall { name: String, args: Vec<Expr>, distinct: bool },
    /// `count(*)`
    CountStar,
    /// Unary operation: `NOT a`, `-a`
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// Binary operation: `a + b`, `a = b`, `a AND b`, `a STARTS WITH b`
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// `expr IS NULL` / `expr IS NOT NULL`
    IsNull { expr: Box<Expr>, negated: bool },
    /// Label predicate: `n:Person:Admin`
    HasLabels { expr: Box<Expr>, labels: NameList },
    /// `list[i]`, `map['key']`
    Index { base: Box<Expr>, index: Box<Expr> },
    /// `list[from..to]`, either bound optional
    Slice { base: Box<Expr>, from: Option<Box<Expr>>, to: Option<Box<Expr>> },
    /// `CASE [operand] WHEN .. THEN .. [ELSE ..] END`
    Case { operand: Option<Box<Expr>>, alternatives: Vec<(Expr, Expr)>, default: Option<Box<Expr>> },
}

impl Expr {
    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal(Literal::Integer(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Literal(Literal::String(value.into()))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::Unary { op, expr: Box::new(expr) }
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Logical
    Or, Xor, And,
    // Comparison
    Eq, Neq, Lt, Lte, Gt, Gte,
    // String / list predicates
    StartsWith, EndsWith, Contains, RegexMatch, In,
    // Arithmetic
    Add, Sub, Mul, Div, Mod, Pow,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Or => "OR",
            BinaryOp::Xor => "XOR",
            BinaryOp::And => "AND",
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::StartsWith => "STARTS WITH",
            BinaryOp::EndsWith => "ENDS WITH",
            BinaryOp::Contains => "CONTAINS",
            BinaryOp::RegexMatch => "=~",
            BinaryOp::In => "IN",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn node(name: &str) -> NodePattern {
        NodePattern { variable: Some(name.into()), ..Default::default() }
    }

    fn rel(direction: Direction) -> RelationshipPattern {
        RelationshipPattern { variable: None, direction, types: smallvec![], length: None, properties: None }
    }

    #[test]
    fn test_path_elements_alternate() {
        let path = PatternPath {
            variable: None,
            start: node("a"),
            steps: vec![
                PatternStep { relationship: rel(Direction::Right), node: node("b") },
                PatternStep { relationship: rel(Direction::Left), node: node("c") },
            ],
        };
        let elements: Vec<_> = path.elements().collect();
        assert_eq!(elements.len(), 5);
        assert!(matches!(elements[0], PatternElement::Node(_)));
        assert!(matches!(elements[1], PatternElement::Relationship(r) if r.direction == Direction::Right));
        assert!(matches!(elements[4], PatternElement::Node(n) if n.variable.as_deref() == Some("c")));
        assert_eq!(path.nodes().count(), 3);
        assert_eq!(path.relationships().count(), 2);
        assert_eq!(path.end().variable.as_deref(), Some("c"));
    }

    #[test]
    fn test_single_node_path() {
        let path = PatternPath { variable: None, start: node("a"), steps: vec![] };
        assert_eq!(path.elements().count(), 1);
        assert_eq!(path.end().variable.as_deref(), Some("a"));
    }

    #[test]
    fn test_map_literal_lookup() {
        let map = MapLiteral {
            entries: vec![("name".into(), Expr::string("Ada")), ("age".into(), Expr::int(3))],
        };
        assert_eq!(map.get("age"), Some(&Expr::int(3)));
        assert_eq!(map.get("missing"), None);
        assert_eq!(map.keys().collect::<Vec<_>>(), ["name", "age"]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_column_name() {
        let aliased = ProjectionItem { expr: Expr::int(1), alias: Some("one".into()) };
        let bare = ProjectionItem { expr: Expr::variable("n"), alias: None };
        let chain = ProjectionItem {
            expr: Expr::Property { base: Box::new(Expr::variable("a")), keys: vec!["address".into(), "city".into()] },
            alias: None,
        };
        let computed = ProjectionItem { expr: Expr::int(1), alias: None };
        assert_eq!(aliased.column_name().as_deref(), Some("one"));
        assert_eq!(bare.column_name().as_deref(), Some("n"));
        assert_eq!(chain.column_name().as_deref(), Some("a.address.city"));
        assert_eq!(computed.column_name(), None);
    }
}
