//! `nornicdb.*` engine administration procedures.

use super::{ProcedureContext, ProcedureOutput};
use crate::model::Value;
use crate::Result;

/// `nornicdb.cache.stats()` — counters for every cache the engine runs.
pub fn cache_stats(ctx: &ProcedureContext, _args: &[Value]) -> Result<ProcedureOutput> {
    let result_stats = ctx.result_cache.stats();
    let row = |name: &str, hits: u64, misses: u64, size: usize| {
        vec![
            Value::String(name.into()),
            Value::Int(hits as i64),
            Value::Int(misses as i64),
            Value::Int(size as i64),
        ]
    };
    Ok(ProcedureOutput {
        columns: vec!["cache".into(), "hits".into(), "misses".into(), "size".into()],
        rows: vec![
            row("plan", ctx.plan_cache.hits(), ctx.plan_cache.misses(), ctx.plan_cache.len()),
            row("result", result_stats.hits, result_stats.misses, result_stats.size),
            row(
                "nodeLookup",
                ctx.node_cache.hits(),
                ctx.node_cache.misses(),
                ctx.node_cache.len(),
            ),
        ],
    })
}

/// `nornicdb.cache.clear()` — drop result and node-lookup caches.
pub fn cache_clear(ctx: &ProcedureContext, _args: &[Value]) -> Result<ProcedureOutput> {
    ctx.result_cache.invalidate_all();
    ctx.node_cache.invalidate();
    Ok(ProcedureOutput {
        columns: vec!["cleared".into()],
        rows: vec![vec![Value::Bool(true)]],
    })
}

/// `nornicdb.schema()` — indexes and constraints as one table.
pub fn schema(ctx: &ProcedureContext, _args: &[Value]) -> Result<ProcedureOutput> {
    let schema = ctx.storage.schema()?;
    let mut rows = Vec::new();
    for index in schema.indexes {
        rows.push(vec![
            Value::String("INDEX".into()),
            Value::String(index.name),
            Value::String(index.label),
            Value::List(index.properties.into_iter().map(Value::String).collect()),
            Value::String(format!("{:?}", index.index_type).to_uppercase()),
        ]);
    }
    for constraint in schema.constraints {
        rows.push(vec![
            Value::String("CONSTRAINT".into()),
            Value::String(constraint.name),
            Value::String(constraint.label),
            Value::List(vec![Value::String(constraint.property)]),
            Value::String("UNIQUE".into()),
        ]);
    }
    Ok(ProcedureOutput {
        columns: vec![
            "kind".into(),
            "name".into(),
            "label".into(),
            "properties".into(),
            "type".into(),
        ],
        rows,
    })
}
