//! End-to-end tests for the engine shell: result caching and label
//! invalidation, explicit transactions, EXPLAIN/PROFILE, CALL, UNION,
//! callbacks, and cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use nornicdb::{CancelToken, Engine, Params, Value};

// ============================================================================
// Result cache
// ============================================================================

#[test]
fn test_result_cache_hits_within_ttl() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (n:Person {name:'Ada'})", Params::new()).unwrap();

    let first = engine
        .execute("MATCH (n:Person) RETURN count(n) AS c", Params::new())
        .unwrap();
    let stats_before = engine.result_cache_stats();
    let second = engine
        .execute("MATCH (n:Person) RETURN count(n) AS c", Params::new())
        .unwrap();
    let stats_after = engine.result_cache_stats();

    assert_eq!(first.rows, second.rows);
    assert_eq!(stats_after.hits, stats_before.hits + 1);
}

#[test]
fn test_whitespace_normalization_shares_cache_entries() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (n:Person)", Params::new()).unwrap();

    engine.execute("MATCH (n:Person) RETURN count(n) AS c", Params::new()).unwrap();
    let before = engine.result_cache_stats().hits;
    engine
        .execute("MATCH   (n:Person)\n RETURN  count(n) AS c", Params::new())
        .unwrap();
    assert_eq!(engine.result_cache_stats().hits, before + 1);
}

#[test]
fn test_write_invalidates_touched_label_only() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (n:Person {name:'Ada'})", Params::new()).unwrap();
    engine.execute("CREATE (n:Company {name:'Initech'})", Params::new()).unwrap();

    // Prime both cache entries
    engine.execute("MATCH (n:Person) RETURN count(n) AS c", Params::new()).unwrap();
    engine.execute("MATCH (n:Company) RETURN count(n) AS c", Params::new()).unwrap();

    // Write touching Person evicts the Person entry but not Company
    engine.execute("CREATE (n:Person {name:'Bob'})", Params::new()).unwrap();

    let person = engine
        .execute("MATCH (n:Person) RETURN count(n) AS c", Params::new())
        .unwrap();
    assert_eq!(person.rows, vec![vec![Value::Int(2)]]);

    let before = engine.result_cache_stats().hits;
    engine.execute("MATCH (n:Company) RETURN count(n) AS c", Params::new()).unwrap();
    assert_eq!(engine.result_cache_stats().hits, before + 1);
}

#[test]
fn test_cache_entries_keyed_by_params() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (n:Person {name:'Ada'})", Params::new()).unwrap();
    engine.execute("CREATE (n:Person {name:'Bob'})", Params::new()).unwrap();

    let query = "MATCH (n:Person) WHERE n.name = $name RETURN count(n) AS c";
    let mut ada = Params::new();
    ada.insert("name".into(), Value::from("Ada"));
    let mut bob = Params::new();
    bob.insert("name".into(), Value::from("Bob"));

    let first = engine.execute(query, ada.clone()).unwrap();
    let second = engine.execute(query, bob).unwrap();
    assert_eq!(first.rows, second.rows);

    // Same query + same params is the cache hit
    let before = engine.result_cache_stats().hits;
    engine.execute(query, ada).unwrap();
    assert_eq!(engine.result_cache_stats().hits, before + 1);
}

// ============================================================================
// Transactions
// ============================================================================

#[test]
fn test_explicit_transaction_commit() {
    let engine = Engine::open_memory();

    engine.execute("BEGIN", Params::new()).unwrap();
    engine.execute("CREATE (n:Person {name:'Ada'})", Params::new()).unwrap();
    engine.execute("COMMIT", Params::new()).unwrap();

    let result = engine
        .execute("MATCH (n:Person) RETURN count(n) AS c", Params::new())
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(1)]]);
}

#[test]
fn test_explicit_transaction_rollback() {
    let engine = Engine::open_memory();

    engine.execute("BEGIN", Params::new()).unwrap();
    engine.execute("CREATE (n:Person {name:'Ada'})", Params::new()).unwrap();
    engine.execute("ROLLBACK", Params::new()).unwrap();

    let result = engine
        .execute("MATCH (n:Person) RETURN count(n) AS c", Params::new())
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(0)]]);
}

#[test]
fn test_transaction_control_errors() {
    let engine = Engine::open_memory();

    assert!(engine.execute("COMMIT", Params::new()).is_err());
    assert!(engine.execute("ROLLBACK", Params::new()).is_err());

    engine.execute("BEGIN", Params::new()).unwrap();
    assert!(engine.execute("BEGIN", Params::new()).is_err());
    engine.execute("ROLLBACK", Params::new()).unwrap();
}

#[test]
fn test_error_in_explicit_tx_leaves_it_open() {
    let engine = Engine::open_memory();

    engine.execute("BEGIN", Params::new()).unwrap();
    engine.execute("CREATE (n:Person {name:'Ada'})", Params::new()).unwrap();
    // A failing statement does not close the transaction
    assert!(engine.execute("MATCH (n RETURN n", Params::new()).is_err());
    engine.execute("COMMIT", Params::new()).unwrap();

    let result = engine
        .execute("MATCH (n:Person) RETURN count(n) AS c", Params::new())
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(1)]]);
}

// ============================================================================
// EXPLAIN / PROFILE (scenario 6)
// ============================================================================

#[test]
fn test_explain_builds_operator_tree() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (n:Person {age: 30})", Params::new()).unwrap();

    let result = engine
        .execute("EXPLAIN MATCH (n:Person) WHERE n.age > 21 RETURN n", Params::new())
        .unwrap();
    assert_eq!(result.columns, vec!["Plan"]);
    assert_eq!(result.rows.len(), 1);
    let plan = match &result.rows[0][0] {
        Value::String(s) => s.clone(),
        other => panic!("expected plan text, got {other:?}"),
    };
    assert!(plan.contains("NodeByLabelScan(:Person)"));
    assert!(plan.contains("Filter"));
    assert!(plan.contains("ProduceResults"));
    assert!(plan.contains("estimated rows"));

    // EXPLAIN does not execute: no rows were scanned into a data result
    assert_eq!(result.stats.nodes_created, 0);
}

#[test]
fn test_profile_executes_and_reports() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (n:Person {age: 30})", Params::new()).unwrap();

    let result = engine
        .execute("PROFILE MATCH (n:Person) RETURN count(n) AS c", Params::new())
        .unwrap();
    let plan = match &result.rows[0][0] {
        Value::String(s) => s.clone(),
        other => panic!("expected plan text, got {other:?}"),
    };
    assert!(plan.contains("rows:"));
    assert!(plan.contains("db hits"));
    assert!(plan.contains("time:"));
}

// ============================================================================
// CALL procedures
// ============================================================================

#[test]
fn test_call_db_labels_and_yield() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (n:Person)", Params::new()).unwrap();
    engine.execute("CREATE (n:Company)", Params::new()).unwrap();

    let result = engine.execute("CALL db.labels()", Params::new()).unwrap();
    assert_eq!(result.columns, vec!["label"]);
    assert_eq!(result.rows.len(), 2);

    let result = engine
        .execute("CALL db.labels() YIELD label RETURN label ORDER BY label", Params::new())
        .unwrap();
    assert_eq!(
        result.rows,
        vec![
            vec![Value::String("Company".into())],
            vec![Value::String("Person".into())]
        ]
    );
}

#[test]
fn test_call_unknown_procedure_errors() {
    let engine = Engine::open_memory();
    let err = engine.execute("CALL apoc.no.such.proc()", Params::new()).unwrap_err();
    assert!(matches!(err, nornicdb::Error::NotFound(_)));
}

#[test]
fn test_registered_plugin_procedure() {
    let engine = Engine::open_memory();
    engine.register_procedure(
        "gds.echo",
        Arc::new(|_ctx, args| {
            Ok(nornicdb::procedures::ProcedureOutput {
                columns: vec!["value".into()],
                rows: vec![vec![args.first().cloned().unwrap_or(Value::Null)]],
            })
        }),
    );

    let result = engine.execute("CALL gds.echo(41) YIELD value RETURN value + 1 AS v", Params::new()).unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(42)]]);
}

#[test]
fn test_vector_query_with_embedder() {
    let engine = Engine::open_memory();
    engine.set_embedder(|_text| Ok(vec![1.0, 0.0]));

    engine
        .execute("CREATE (d:Doc {title: 'near', embedding: [1.0, 0.0]})", Params::new())
        .unwrap();
    engine
        .execute("CREATE (d:Doc {title: 'far', embedding: [0.0, 1.0]})", Params::new())
        .unwrap();

    let result = engine
        .execute(
            "CALL db.index.vector.queryNodes('docs', 1, 'some query') YIELD node, score \
             RETURN node.title, score",
            Params::new(),
        )
        .unwrap();
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0], Value::String("near".into()));
    assert_eq!(result.rows[0][1], Value::Float(1.0));
}

// ============================================================================
// UNION
// ============================================================================

#[test]
fn test_union_dedup_and_all() {
    let engine = Engine::open_memory();

    let result = engine
        .execute("RETURN 1 AS x UNION RETURN 1 AS x", Params::new())
        .unwrap();
    assert_eq!(result.rows.len(), 1);

    let result = engine
        .execute("RETURN 1 AS x UNION ALL RETURN 1 AS x", Params::new())
        .unwrap();
    assert_eq!(result.rows.len(), 2);
}

#[test]
fn test_union_column_mismatch_errors() {
    let engine = Engine::open_memory();
    assert!(engine
        .execute("RETURN 1 AS x UNION RETURN 2 AS y", Params::new())
        .is_err());
}

// ============================================================================
// SHOW
// ============================================================================

#[test]
fn test_show_procedures_and_functions_and_database() {
    let engine = Engine::open_memory();

    let result = engine.execute("SHOW PROCEDURES", Params::new()).unwrap();
    let names: Vec<String> = result
        .rows
        .iter()
        .map(|r| match &r[0] {
            Value::String(s) => s.clone(),
            other => panic!("expected string, got {other:?}"),
        })
        .collect();
    assert!(names.contains(&"db.labels".to_string()));
    assert!(names.contains(&"nornicdb.cache.stats".to_string()));

    let result = engine.execute("SHOW FUNCTIONS", Params::new()).unwrap();
    assert!(!result.rows.is_empty());

    let result = engine.execute("SHOW DATABASE", Params::new()).unwrap();
    assert_eq!(result.rows[0][0], Value::String("nornicdb".into()));
}

#[test]
fn test_cache_stats_procedure() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (n:Person)", Params::new()).unwrap();
    engine.execute("MATCH (n:Person) RETURN count(n) AS c", Params::new()).unwrap();

    let result = engine.execute("CALL nornicdb.cache.stats()", Params::new()).unwrap();
    assert_eq!(result.columns, vec!["cache", "hits", "misses", "size"]);
    assert_eq!(result.rows.len(), 3);
}

// ============================================================================
// Callbacks
// ============================================================================

#[test]
fn test_node_created_callback_fires_per_node() {
    let engine = Engine::open_memory();
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    engine.set_node_created_callback(move |_node| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    engine
        .execute("CREATE (a:Person) CREATE (b:Person) CREATE (a)-[:KNOWS]->(b)", Params::new())
        .unwrap();
    assert_eq!(created.load(Ordering::Relaxed), 2);
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_pre_cancelled_query_errors() {
    let engine = Engine::open_memory();
    engine.execute("CREATE (n:Person)", Params::new()).unwrap();

    let token = CancelToken::new();
    token.cancel();
    let err = engine
        .execute_with(token, "MATCH (n:Person) RETURN n", Params::new())
        .unwrap_err();
    assert!(matches!(err, nornicdb::Error::Cancelled));
}

// ============================================================================
// Deferred flush toggle
// ============================================================================

#[test]
fn test_defer_flush_toggle_is_accepted() {
    let engine = Engine::open_memory();
    engine.set_defer_flush(true);
    engine.execute("CREATE (n:Person)", Params::new()).unwrap();
    engine.set_defer_flush(false);
    engine.execute("CREATE (n:Person)", Params::new()).unwrap();

    let result = engine
        .execute("MATCH (n:Person) RETURN count(n) AS c", Params::new())
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Int(2)]]);
}
