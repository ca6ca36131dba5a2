//! End-to-end integration tests for successful parses.
//!
//! Each test feeds complete query text through `pcypher::parse` and checks
//! the shape of the resulting tree: clause order, patterns, projections
//! and expression structure.

use pcypher::cypher::ast::*;
use pcypher::parse;
use pretty_assertions::assert_eq;

fn keywords(query: &Query) -> Vec<&'static str> {
    query.clauses.iter().map(Clause::keyword).collect()
}

fn sole_return_expr(source: &str) -> Expr {
    let query = parse(source).unwrap();
    match query.clauses.last() {
        Some(Clause::Return(r)) => {
            assert_eq!(r.projection.items.len(), 1);
            r.projection.items[0].expr.clone()
        }
        other => panic!("Expected Return, got {other:?}"),
    }
}

// ============================================================================
// 1. Clause order is preserved exactly
// ============================================================================

#[test]
fn test_clause_order_read_query() {
    let q = parse(
        "MATCH (a:Person) OPTIONAL MATCH (a)-[:KNOWS]->(b) \
         WITH a, count(b) AS friends WHERE friends > 2 \
         UNWIND [1, 2] AS x \
         RETURN a.name AS name, friends, x ORDER BY friends DESC LIMIT 5",
    )
    .unwrap();
    assert_eq!(keywords(&q), ["MATCH", "OPTIONAL MATCH", "WITH", "UNWIND", "RETURN"]);
    assert!(q.unions.is_empty());
}

#[test]
fn test_clause_order_write_query() {
    let q = parse(
        "MATCH (a:Person {name: 'Ada'}) \
         CREATE (a)-[:WROTE {year: 1843}]->(n:Note) \
         MERGE (t:Topic {name: 'engines'}) ON CREATE SET t.created = timestamp() \
         SET n.title = 'Notes', n:Published \
         REMOVE a.draft \
         DETACH DELETE t",
    )
    .unwrap();
    assert_eq!(keywords(&q), ["MATCH", "CREATE", "MERGE", "SET", "REMOVE", "DETACH DELETE"]);
}

#[test]
fn test_version_header_and_mandatory_match() {
    let q = parse("CYPHER 5\nMANDATORY MATCH (a:Person)-[:KNOWS]->(b)\nOPTIONAL MATCH (b)-->(c)\nRETURN a, b, c").unwrap();
    assert_eq!(q.version.as_deref(), Some("5"));
    assert_eq!(keywords(&q), ["MANDATORY MATCH", "OPTIONAL MATCH", "RETURN"]);
}

#[test]
fn test_keywords_are_case_insensitive() {
    let upper = parse("MATCH (n:Person) WHERE n.age >= 18 RETURN n ORDER BY n.age DESC").unwrap();
    let lower = parse("match (n:Person) where n.age >= 18 return n order by n.age desc").unwrap();
    assert_eq!(upper, lower);
}

#[test]
fn test_comments_and_multiline() {
    let q = parse(
        "// find people\n\
         MATCH (n:Person) /* any age */\n\
         RETURN n;",
    )
    .unwrap();
    assert_eq!(keywords(&q), ["MATCH", "RETURN"]);
}

#[test]
fn test_union_parts() {
    let q = parse("MATCH (a:A) RETURN a.name AS name UNION ALL MATCH (b:B) RETURN b.name AS name").unwrap();
    assert_eq!(keywords(&q), ["MATCH", "RETURN"]);
    assert_eq!(q.unions.len(), 1);
    assert!(q.unions[0].all);
    assert_eq!(q.unions[0].clauses.len(), 2);
}

// ============================================================================
// 2. Patterns
// ============================================================================

#[test]
fn test_direction_and_type() {
    let q = parse("MATCH (a)-[:KNOWS]->(b) RETURN a").unwrap();
    let Clause::Match(m) = &q.clauses[0] else { panic!("Expected Match") };
    let path = &m.pattern.paths[0];
    let rel = &path.steps[0].relationship;
    assert_eq!(rel.direction, Direction::Right);
    assert_eq!(rel.types.as_slice(), ["KNOWS"]);
    assert_eq!(path.start.variable.as_deref(), Some("a"));
    assert_eq!(path.end().variable.as_deref(), Some("b"));
}

#[test]
fn test_paths_alternate_nodes_and_relationships() {
    let q = parse("MATCH p = (a)<-[:R1]-(b)-[:R2*2..]->(c)-[r]-(d) RETURN p").unwrap();
    let Clause::Match(m) = &q.clauses[0] else { panic!("Expected Match") };
    let path = &m.pattern.paths[0];
    assert_eq!(path.variable.as_deref(), Some("p"));

    let kinds: Vec<&str> = path
        .elements()
        .map(|e| match e {
            PatternElement::Node(_) => "node",
            PatternElement::Relationship(_) => "rel",
        })
        .collect();
    assert_eq!(kinds, ["node", "rel", "node", "rel", "node", "rel", "node"]);

    let rels: Vec<_> = path.relationships().collect();
    assert_eq!(rels[0].direction, Direction::Left);
    assert_eq!(rels[1].length, Some(PathLength { min: Some(2), max: None }));
    assert_eq!(rels[2].direction, Direction::Undirected);
    assert_eq!(rels[2].variable.as_deref(), Some("r"));
}

#[test]
fn test_pattern_properties_are_map_literals() {
    let q = parse("MATCH (n:Person {name: $name, age: 30})-[:LIVES_IN {since: 2001}]->(c) RETURN c").unwrap();
    let Clause::Match(m) = &q.clauses[0] else { panic!("Expected Match") };
    let path = &m.pattern.paths[0];
    let node_props = path.start.properties.as_ref().unwrap();
    assert_eq!(node_props.keys().collect::<Vec<_>>(), ["name", "age"]);
    assert_eq!(node_props.get("name"), Some(&Expr::Parameter("name".into())));
    let rel_props = path.steps[0].relationship.properties.as_ref().unwrap();
    assert_eq!(rel_props.get("since"), Some(&Expr::int(2001)));
}

#[test]
fn test_backtick_identifiers() {
    let q = parse("MATCH (`where`:`Odd Label`) RETURN `where`").unwrap();
    let Clause::Match(m) = &q.clauses[0] else { panic!("Expected Match") };
    let node = &m.pattern.paths[0].start;
    assert_eq!(node.variable.as_deref(), Some("where"));
    assert_eq!(node.labels.as_slice(), ["Odd Label"]);
    let Clause::Return(r) = &q.clauses[1] else { panic!("Expected Return") };
    assert_eq!(r.projection.items[0].expr, Expr::variable("where"));
}

// ============================================================================
// 3. Expressions
// ============================================================================

#[test]
fn test_precedence_add_mul() {
    assert_eq!(
        sole_return_expr("RETURN 1 + 2 * 3"),
        Expr::binary(BinaryOp::Add, Expr::int(1), Expr::binary(BinaryOp::Mul, Expr::int(2), Expr::int(3)))
    );
}

#[test]
fn test_precedence_full_ladder() {
    // a OR b AND NOT c = d + e * f ^ g
    let expected = Expr::binary(
        BinaryOp::Or,
        Expr::variable("a"),
        Expr::binary(
            BinaryOp::And,
            Expr::variable("b"),
            Expr::unary(
                UnaryOp::Not,
                Expr::binary(
                    BinaryOp::Eq,
                    Expr::variable("c"),
                    Expr::binary(
                        BinaryOp::Add,
                        Expr::variable("d"),
                        Expr::binary(
                            BinaryOp::Mul,
                            Expr::variable("e"),
                            Expr::binary(BinaryOp::Pow, Expr::variable("f"), Expr::variable("g")),
                        ),
                    ),
                ),
            ),
        ),
    );
    assert_eq!(sole_return_expr("RETURN a OR b AND NOT c = d + e * f ^ g"), expected);
}

#[test]
fn test_in_binds_tighter_than_comparison() {
    assert_eq!(
        sole_return_expr("RETURN x IN [1] = true"),
        Expr::binary(
            BinaryOp::Eq,
            Expr::binary(BinaryOp::In, Expr::variable("x"), Expr::List(vec![Expr::int(1)])),
            Expr::Literal(Literal::Bool(true)),
        )
    );
}

#[test]
fn test_function_calls_and_case() {
    let e = sole_return_expr(
        "RETURN CASE WHEN size(n.tags) > 0 THEN toUpper(head(n.tags)) ELSE 'none' END",
    );
    let Expr::Case { operand, alternatives, default } = e else { panic!("Expected Case") };
    assert!(operand.is_none());
    assert_eq!(alternatives.len(), 1);
    assert!(matches!(&alternatives[0].1, Expr::FunctionCall { name, .. } if name == "toUpper"));
    assert_eq!(default.as_deref(), Some(&Expr::string("none")));
}

#[test]
fn test_list_index_and_slice() {
    let e = sole_return_expr("RETURN range(0, 10)[2..5][0]");
    let Expr::Index { base, index } = e else { panic!("Expected Index") };
    assert_eq!(*index, Expr::int(0));
    assert!(matches!(*base, Expr::Slice { from: Some(_), to: Some(_), .. }));
}

#[test]
fn test_string_operators_in_where() {
    let q = parse(
        "MATCH (n) WHERE n.name STARTS WITH 'A' AND n.name ENDS WITH 'a' \
         AND n.name CONTAINS 'd' AND n.email =~ '.*@example\\\\.com' RETURN n",
    )
    .unwrap();
    let Clause::Match(m) = &q.clauses[0] else { panic!("Expected Match") };
    let mut ops = Vec::new();
    let mut cur = m.where_clause.as_ref().unwrap();
    while let Expr::Binary { op: BinaryOp::And, lhs, rhs } = cur {
        if let Expr::Binary { op, .. } = rhs.as_ref() {
            ops.push(*op);
        }
        cur = lhs.as_ref();
    }
    if let Expr::Binary { op, .. } = cur {
        ops.push(*op);
    }
    ops.reverse();
    assert_eq!(ops, [BinaryOp::StartsWith, BinaryOp::EndsWith, BinaryOp::Contains, BinaryOp::RegexMatch]);
}

#[test]
fn test_call_procedure() {
    let q = parse("CALL db.labels() YIELD label RETURN label").unwrap();
    let Clause::Call(c) = &q.clauses[0] else { panic!("Expected Call") };
    assert_eq!(c.procedure, ["db", "labels"]);
    assert_eq!(c.args, Some(vec![]));
    assert_eq!(c.yields[0].field, "label");
}

// ============================================================================
// 4. The tree is plain data
// ============================================================================

#[test]
fn test_ast_serializes() {
    let q = parse("MATCH (a:Person)-[:KNOWS]->(b) WHERE a.age > 30 RETURN b.name AS name").unwrap();
    let json = serde_json::to_value(&q).unwrap();
    assert_eq!(json["clauses"][0]["Match"]["pattern"]["paths"][0]["steps"][0]["relationship"]["direction"], "Right");
    let back: Query = serde_json::from_value(json).unwrap();
    assert_eq!(back, q);
}

#[test]
fn test_parse_from_many_threads() {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            std::thread::spawn(move || {
                let q = parse(&format!("MATCH (n) WHERE n.id = {i} RETURN n")).unwrap();
                q.clauses.len()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 2);
    }
}
