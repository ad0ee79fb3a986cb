//! End-to-end tests for aggregation: implicit GROUP BY, DISTINCT
//! aggregates, aggregate arithmetic, WITH-stage aggregation.

use nornicdb::{Engine, Params, Value};

fn seed_people(engine: &Engine) {
    for (name, city, age) in [
        ("Alice", "Oslo", 30),
        ("Bob", "Oslo", 25),
        ("Carol", "Bergen", 35),
        ("Dave", "Bergen", 40),
        ("Eve", "Bergen", 28),
    ] {
        let mut params = Params::new();
        params.insert("name".into(), Value::from(name));
        params.insert("city".into(), Value::from(city));
        params.insert("age".into(), Value::Int(age));
        engine
            .execute(
                "CREATE (n:Person {name: $name, city: $city, age: $age})",
                params,
            )
            .unwrap();
    }
}

// ============================================================================
// Basic aggregates
// ============================================================================

#[test]
fn test_count_sum_avg_min_max() {
    let engine = Engine::open_memory();
    seed_people(&engine);

    let result = engine
        .execute(
            "MATCH (n:Person) RETURN count(n) AS c, sum(n.age) AS s, avg(n.age) AS a, \
             min(n.age) AS lo, max(n.age) AS hi",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Value::Int(5));
    assert_eq!(result.rows[0][1], Value::Int(158));
    assert_eq!(result.rows[0][2], Value::Float(158.0 / 5.0));
    assert_eq!(result.rows[0][3], Value::Int(25));
    assert_eq!(result.rows[0][4], Value::Int(40));
}

#[test]
fn test_implicit_group_by() {
    let engine = Engine::open_memory();
    seed_people(&engine);

    let result = engine
        .execute(
            "MATCH (n:Person) RETURN n.city AS city, count(n) AS c ORDER BY city",
            Params::new(),
        )
        .unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::String("Bergen".into()), Value::Int(3)],
            vec![Value::String("Oslo".into()), Value::Int(2)],
        ]
    );
}

#[test]
fn test_group_total_matches_input_rows() {
    let engine = Engine::open_memory();
    seed_people(&engine);

    // sum of per-group counts equals total input rows
    let grouped = engine
        .execute("MATCH (n:Person) RETURN n.city AS city, count(n) AS c", Params::new())
        .unwrap();
    let total: i64 = grouped
        .rows
        .iter()
        .map(|r| match &r[1] {
            Value::Int(i) => *i,
            other => panic!("expected int, got {other:?}"),
        })
        .sum();
    assert_eq!(total, 5);
}

#[test]
fn test_collect_and_distinct_count() {
    let engine = Engine::open_memory();
    seed_people(&engine);

    let result = engine
        .execute(
            "MATCH (n:Person) RETURN count(DISTINCT n.city) AS cities, collect(n.city) AS all",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows[0][0], Value::Int(2));
    match &result.rows[0][1] {
        Value::List(items) => assert_eq!(items.len(), 5),
        other => panic!("expected list, got {other:?}"),
    }
}

#[test]
fn test_empty_input_aggregates() {
    let engine = Engine::open_memory();

    let result = engine
        .execute(
            "MATCH (n:Ghost) RETURN count(n) AS c, sum(n.age) AS s, avg(n.age) AS a, \
             min(n.age) AS lo, collect(n.age) AS all",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Value::Int(0));
    assert_eq!(result.rows[0][1], Value::Int(0));
    assert_eq!(result.rows[0][2], Value::Null);
    assert_eq!(result.rows[0][3], Value::Null);
    assert_eq!(result.rows[0][4], Value::List(vec![]));
}

#[test]
fn test_count_star() {
    let engine = Engine::open_memory();
    seed_people(&engine);
    let result = engine
        .execute("MATCH (n:Person) RETURN count(*) AS c", Params::new())
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(5)]]);
}

#[test]
fn test_sum_skips_non_numeric() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (n:Mixed {v: 1})", Params::new()).unwrap();
    engine.execute("CREATE (n:Mixed {v: 'nope'})", Params::new()).unwrap();
    engine.execute("CREATE (n:Mixed {v: 2.5})", Params::new()).unwrap();

    let result = engine
        .execute("MATCH (n:Mixed) RETURN sum(n.v) AS s", Params::new())
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Float(3.5)]]);
}

// ============================================================================
// The embedding-status scenario: two WITH stages, DISTINCT counts, and
// aggregate arithmetic
// ============================================================================

#[test]
fn test_with_chain_and_aggregate_arithmetic() {
    let engine = Engine::open_memory();

    // 10 files; the first 3 carry embeddings
    for i in 0..10 {
        let query = if i < 3 {
            "CREATE (f:File {idx: $i, embedding: [0.1, 0.2]})"
        } else {
            "CREATE (f:File {idx: $i})"
        };
        let mut params = Params::new();
        params.insert("i".into(), Value::Int(i));
        engine.execute(query, params).unwrap();
    }
    // 10 chunks under files 0..4 (2 each); 6 chunks carry embeddings
    for i in 0..10 {
        let file = i / 2;
        let query = if i < 6 {
            "MATCH (f:File {idx: $file}) \
             CREATE (c:FileChunk {idx: $i, embedding: [0.3, 0.4]}) \
             CREATE (f)-[:HAS_CHUNK]->(c)"
        } else {
            "MATCH (f:File {idx: $file}) \
             CREATE (c:FileChunk {idx: $i}) \
             CREATE (f)-[:HAS_CHUNK]->(c)"
        };
        let mut params = Params::new();
        params.insert("file".into(), Value::Int(file));
        params.insert("i".into(), Value::Int(i));
        engine.execute(query, params).unwrap();
    }

    let result = engine
        .execute(
            "MATCH (f:File) OPTIONAL MATCH (f)-[:HAS_CHUNK]->(c:FileChunk) \
             WITH f, c, \
             CASE WHEN c IS NOT NULL AND c.embedding IS NOT NULL THEN 1 ELSE 0 END AS ch, \
             CASE WHEN f.embedding IS NOT NULL THEN 1 ELSE 0 END AS fh \
             WITH count(DISTINCT f) AS tf, count(DISTINCT c) AS tc, sum(ch)+sum(fh) AS te \
             RETURN tf, tc, te",
            Params::new(),
        )
        .unwrap();

    assert_eq!(result.columns, vec!["tf", "tc", "te"]);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Value::Int(10));
    assert_eq!(result.rows[0][1], Value::Int(10));
    // 3 embedded files x 2 chunk rows each + 6 embedded chunks
    assert_eq!(result.rows[0][2], Value::Int(12));
}

// ============================================================================
// WITH-stage aggregation feeding a filter
// ============================================================================

#[test]
fn test_with_aggregation_then_where() {
    let engine = Engine::open_memory();
    seed_people(&engine);

    let result = engine
        .execute(
            "MATCH (n:Person) WITH n.city AS city, count(n) AS c WHERE c > 2 RETURN city",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::String("Bergen".into())]]);
}

#[test]
fn test_aggregate_difference() {
    let engine = Engine::open_memory();
    seed_people(&engine);

    let result = engine
        .execute(
            "MATCH (n:Person) RETURN max(n.age) - min(n.age) AS spread",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(15)]]);
}
