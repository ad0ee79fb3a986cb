//! End-to-end tests for the basic read pipeline.
//!
//! Each test exercises the full path: route -> substitute -> match ->
//! project against the in-memory backend.

use nornicdb::{Engine, Params, Value};

fn params(pairs: &[(&str, Value)]) -> Params {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

// ============================================================================
// 1. CREATE a node, then MATCH it back
// ============================================================================

#[test]
fn test_create_and_query_node() {
    let engine = Engine::open_memory();

    engine.execute("CREATE (n:Person)", Params::new()).unwrap();

    let result = engine.execute("MATCH (n:Person) RETURN n", Params::new()).unwrap();
    assert_eq!(result.columns, vec!["n"]);
    assert_eq!(result.rows.len(), 1);

    // Nodes surface as maps with _nodeId and labels
    match &result.rows[0][0] {
        Value::Map(map) => {
            assert!(map.contains_key("_nodeId"));
            assert_eq!(
                map.get("labels"),
                Some(&Value::List(vec![Value::String("Person".into())]))
            );
        }
        other => panic!("expected node map, got {other:?}"),
    }
}

// ============================================================================
// 2. CREATE with properties and parameters
// ============================================================================

#[test]
fn test_create_with_parameters() {
    let engine = Engine::open_memory();

    engine
        .execute(
            "CREATE (n:Person {name: $name, age: $age})",
            params(&[("name", Value::from("Ada")), ("age", Value::Int(36))]),
        )
        .unwrap();

    let result = engine
        .execute("MATCH (n:Person) RETURN n.name, n.age", Params::new())
        .unwrap();
    assert_eq!(result.columns, vec!["n.name", "n.age"]);
    assert_eq!(result.rows[0], vec![Value::String("Ada".into()), Value::Int(36)]);
}

// ============================================================================
// 3. The two-statement scenario: create two people and a relationship,
//    then count
// ============================================================================

#[test]
fn test_create_two_nodes_and_relationship_then_count() {
    let engine = Engine::open_memory();

    let write = engine
        .execute(
            "CREATE (a:Person {name:'Alice', age:30}) \
             CREATE (b:Person {name:'Bob', age:25}) \
             CREATE (a)-[:KNOWS]->(b)",
            Params::new(),
        )
        .unwrap();
    assert_eq!(write.stats.nodes_created, 2);
    assert_eq!(write.stats.relationships_created, 1);

    let result = engine
        .execute("MATCH (p:Person) RETURN count(p) AS c", Params::new())
        .unwrap();
    assert_eq!(result.columns, vec!["c"]);
    assert_eq!(result.rows, vec![vec![Value::Int(2)]]);
}

// ============================================================================
// 4. WHERE filter with ORDER BY / SKIP / LIMIT
// ============================================================================

#[test]
fn test_where_order_skip_limit() {
    let engine = Engine::open_memory();
    engine
        .execute("CREATE (a:Person {name:'Alice', age:30})", Params::new())
        .unwrap();
    engine
        .execute("CREATE (b:Person {name:'Bob', age:25})", Params::new())
        .unwrap();

    let result = engine
        .execute(
            "MATCH (n:Person) WHERE n.age > 21 RETURN n.name ORDER BY n.age DESC SKIP 0 LIMIT 5",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.columns, vec!["n.name"]);
    assert_eq!(
        result.rows,
        vec![
            vec![Value::String("Alice".into())],
            vec![Value::String("Bob".into())]
        ]
    );

    let result = engine
        .execute(
            "MATCH (n:Person) WHERE n.age > 26 RETURN n.name ORDER BY n.age DESC SKIP 0 LIMIT 5",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::String("Alice".into())]]);
}

// ============================================================================
// 5. ORDER BY ascending with SKIP
// ============================================================================

#[test]
fn test_order_by_ascending_and_skip() {
    let engine = Engine::open_memory();
    for (name, age) in [("c", 3), ("a", 1), ("b", 2)] {
        engine
            .execute(
                "CREATE (n:Person {name: $name, age: $age})",
                params(&[("name", Value::from(name)), ("age", Value::Int(age))]),
            )
            .unwrap();
    }

    let result = engine
        .execute(
            "MATCH (n:Person) RETURN n.name ORDER BY n.age SKIP 1",
            Params::new(),
        )
        .unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::String("b".into())],
            vec![Value::String("c".into())]
        ]
    );
}

// ============================================================================
// 6. DISTINCT
// ============================================================================

#[test]
fn test_return_distinct() {
    let engine = Engine::open_memory();
    for city in ["Oslo", "Oslo", "Bergen"] {
        engine
            .execute(
                "CREATE (n:Person {city: $city})",
                params(&[("city", Value::from(city))]),
            )
            .unwrap();
    }

    let result = engine
        .execute(
            "MATCH (n:Person) RETURN DISTINCT n.city ORDER BY n.city",
            Params::new(),
        )
        .unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::String("Bergen".into())],
            vec![Value::String("Oslo".into())]
        ]
    );
}

// ============================================================================
// 7. Expression-only RETURN
// ============================================================================

#[test]
fn test_standalone_return_expressions() {
    let engine = Engine::open_memory();

    let result = engine.execute("RETURN 1 + 2 AS x, 'a' + 'b' AS y", Params::new()).unwrap();
    assert_eq!(result.columns, vec!["x", "y"]);
    assert_eq!(result.rows, vec![vec![Value::Int(3), Value::String("ab".into())]]);

    // Scenario: sprintf-style formatting
    let result = engine
        .execute(
            "RETURN format('User %s: age %d, balance $%.2f', 'Bob', 25, 100.50) AS out",
            Params::new(),
        )
        .unwrap();
    assert_eq!(
        result.rows,
        vec![vec![Value::String("User Bob: age 25, balance $100.50".into())]]
    );
}

// ============================================================================
// 8. Parameter substitution is string-literal-safe
// ============================================================================

#[test]
fn test_parameter_in_string_literal_preserved() {
    let engine = Engine::open_memory();
    engine
        .execute("CREATE (n:Note {text: 'worth $amount'})", Params::new())
        .unwrap();

    // `$amount` inside the literal must not be substituted, so this query
    // needs no parameters at all
    let result = engine
        .execute(
            "MATCH (n:Note) WHERE n.text = 'worth $amount' RETURN count(n) AS c",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(1)]]);
}

// ============================================================================
// 9. Label predicates and IN lists
// ============================================================================

#[test]
fn test_label_test_and_in_operator() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (n:Person:Admin {name: 'root'})", Params::new()).unwrap();
    engine.execute("CREATE (n:Person {name: 'guest'})", Params::new()).unwrap();

    let result = engine
        .execute("MATCH (n:Person) WHERE n:Admin RETURN n.name", Params::new())
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::String("root".into())]]);

    let result = engine
        .execute(
            "MATCH (n:Person) WHERE n.name IN ['root', 'other'] RETURN count(n) AS c",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(1)]]);
}

// ============================================================================
// 10. Errors: syntax, unbalanced, unknown variables
// ============================================================================

#[test]
fn test_syntax_errors_are_statement_fatal() {
    let engine = Engine::open_memory();

    assert!(engine.execute("MATCH (n RETURN n", Params::new()).is_err());
    assert!(engine.execute("MATCH (n)) RETURN n", Params::new()).is_err());
    assert!(engine.execute("RETURN 'unterminated", Params::new()).is_err());
    assert!(engine.execute("", Params::new()).is_err());

    // The engine stays usable after a failed statement
    assert!(engine.execute("RETURN 1 AS x", Params::new()).is_ok());
}

#[test]
fn test_missing_parameter_errors() {
    let engine = Engine::open_memory();
    let err = engine
        .execute("MATCH (n:Person {name: $missing}) RETURN n", Params::new())
        .unwrap_err();
    assert!(err.to_string().contains("missing"));
}
