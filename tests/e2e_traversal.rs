//! End-to-end tests for relationship expansion, OPTIONAL MATCH,
//! variable-length paths, shortestPath, and path bindings.

use nornicdb::{Engine, Params, Value};

/// a -KNOWS-> b -KNOWS-> c, a -WORKS_WITH-> c
fn seed_triangle(engine: &Engine) {
    engine
        .execute(
            "CREATE (a:Person {name:'a'}) CREATE (b:Person {name:'b'}) \
             CREATE (c:Person {name:'c'}) \
             CREATE (a)-[:KNOWS {since: 2020}]->(b) \
             CREATE (b)-[:KNOWS {since: 2021}]->(c) \
             CREATE (a)-[:WORKS_WITH]->(c)",
            Params::new(),
        )
        .unwrap();
}

#[test]
fn test_directed_expansion() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH (a:Person)-[:KNOWS]->(b:Person) RETURN a.name, b.name ORDER BY a.name",
            Params::new(),
        )
        .unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::String("a".into()), Value::String("b".into())],
            vec![Value::String("b".into()), Value::String("c".into())],
        ]
    );
}

#[test]
fn test_incoming_direction() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH (b:Person)<-[:KNOWS]-(a:Person) WHERE b.name = 'b' RETURN a.name",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::String("a".into())]]);
}

#[test]
fn test_undirected_expansion() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH (b:Person {name:'b'})-[:KNOWS]-(x:Person) RETURN x.name ORDER BY x.name",
            Params::new(),
        )
        .unwrap();
    assert_eq!(
        result.rows,
        vec![vec![Value::String("a".into())], vec![Value::String("c".into())]]
    );
}

#[test]
fn test_relationship_properties_and_type() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH (:Person)-[r:KNOWS {since: 2020}]->(:Person) RETURN r.since, type(r)",
            Params::new(),
        )
        .unwrap();
    assert_eq!(
        result.rows,
        vec![vec![Value::Int(2020), Value::String("KNOWS".into())]]
    );
}

#[test]
fn test_multi_type_patterns() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH (a:Person {name:'a'})-[r:KNOWS|WORKS_WITH]->(x) RETURN x.name ORDER BY x.name",
            Params::new(),
        )
        .unwrap();
    assert_eq!(
        result.rows,
        vec![vec![Value::String("b".into())], vec![Value::String("c".into())]]
    );
}

// ============================================================================
// OPTIONAL MATCH
// ============================================================================

#[test]
fn test_optional_match_null_extension() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (a:Person {name:'lonely'})", Params::new()).unwrap();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH (p:Person) OPTIONAL MATCH (p)-[:KNOWS]->(friend) \
             RETURN p.name, friend.name ORDER BY p.name",
            Params::new(),
        )
        .unwrap();
    // a->b, b->c, and null rows for c and lonely
    assert_eq!(result.rows.len(), 4);
    assert_eq!(result.rows[2], vec![Value::String("c".into()), Value::Null]);
    assert_eq!(result.rows[3], vec![Value::String("lonely".into()), Value::Null]);
}

#[test]
fn test_optional_match_where_keeps_row() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    // The WHERE belongs to the OPTIONAL MATCH: rows with no qualifying
    // friend survive with NULL
    let result = engine
        .execute(
            "MATCH (p:Person {name:'a'}) OPTIONAL MATCH (p)-[:KNOWS]->(f) WHERE f.name = 'zzz' \
             RETURN p.name, f.name",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::String("a".into()), Value::Null]]);
}

// ============================================================================
// Variable length
// ============================================================================

#[test]
fn test_variable_length_expansion() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH (a:Person {name:'a'})-[:KNOWS*1..2]->(x) RETURN x.name ORDER BY x.name",
            Params::new(),
        )
        .unwrap();
    // one hop: b; two hops: c
    assert_eq!(
        result.rows,
        vec![vec![Value::String("b".into())], vec![Value::String("c".into())]]
    );
}

#[test]
fn test_variable_length_binds_relationship_list() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH (a:Person {name:'a'})-[r:KNOWS*2..2]->(x) RETURN size(r), x.name",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(2), Value::String("c".into())]]);
}

// ============================================================================
// Paths and shortestPath
// ============================================================================

#[test]
fn test_path_variable_length_function() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH p = (a:Person {name:'a'})-[:KNOWS*1..2]->(x:Person {name:'c'}) \
             RETURN length(p)",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(2)]]);
}

#[test]
fn test_shortest_path() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    // Two routes a->c exist: KNOWS*2 and WORKS_WITH*1; unrestricted types
    // must find the single hop
    let result = engine
        .execute(
            "MATCH p = shortestPath((a:Person {name:'a'})-[*..5]->(c:Person {name:'c'})) \
             RETURN length(p)",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(1)]]);

    // Restricted to KNOWS it takes two hops
    let result = engine
        .execute(
            "MATCH p = shortestPath((a:Person {name:'a'})-[:KNOWS*..5]->(c:Person {name:'c'})) \
             RETURN length(p)",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(2)]]);
}

// ============================================================================
// Graph-aware functions
// ============================================================================

#[test]
fn test_degree_functions() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH (a:Person {name:'a'}) RETURN degree(a), outDegree(a), inDegree(a)",
            Params::new(),
        )
        .unwrap();
    assert_eq!(
        result.rows,
        vec![vec![Value::Int(2), Value::Int(2), Value::Int(0)]]
    );
}

#[test]
fn test_start_and_end_node() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH (:Person {name:'a'})-[r:KNOWS]->(:Person) \
             RETURN startNode(r).name, endNode(r).name",
            Params::new(),
        )
        .unwrap();
    assert_eq!(
        result.rows,
        vec![vec![Value::String("a".into()), Value::String("b".into())]]
    );
}

// ============================================================================
// Cartesian products and multi-pattern MATCH
// ============================================================================

#[test]
fn test_comma_patterns_cartesian() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (a:Left) CREATE (b:Left)", Params::new()).unwrap();
    engine.execute("CREATE (x:Right)", Params::new()).unwrap();

    let result = engine
        .execute("MATCH (l:Left), (r:Right) RETURN count(*) AS c", Params::new())
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(2)]]);
}

#[test]
fn test_multi_match_blocks_carry_bindings() {
    let engine = Engine::open_memory();
    seed_triangle(&engine);

    let result = engine
        .execute(
            "MATCH (a:Person {name:'a'}) MATCH (a)-[:KNOWS]->(b) RETURN b.name",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::String("b".into())]]);
}
