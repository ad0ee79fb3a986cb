//! Clause executors and the statement pipeline.
//!
//! A statement is split into clause segments by keyword probing and
//! executed left to right over a growing set of binding rows — each MATCH
//! opens a new expansion over the rows produced so far, which is what
//! makes interleaved forms (MATCH…CREATE, CREATE…WITH…DELETE, multi-MATCH
//! blocks) fall out of one loop. Parameters are substituted here, inside
//! the executor, after routing decisions have been made.

pub mod call_clause;
pub mod compound;
pub mod context;
pub mod create_clause;
pub mod delete_clause;
pub mod explain;
pub mod foreach_clause;
pub mod load_csv;
pub mod match_clause;
pub mod merge_clause;
pub mod projection;
pub mod result;
pub mod schema_clause;
pub mod set_clause;
pub mod transaction;

use context::QueryContext;
use projection::ProjectionSpec;
use result::ExecutionResult;

use crate::cypher::ast::split_clauses;
use crate::cypher::pattern::split_patterns;
use crate::cypher::text::{
    find_keyword, find_keyword_top_level, leading_keyword, split_by_keyword,
    substitute_parameters,
};
use crate::eval::{self, Bindings};
use crate::model::Value;
use crate::{Error, Result};

/// Route one normalized statement. Transactions, EXPLAIN/PROFILE, and
/// caching are the engine's concern; everything else lands here.
pub fn dispatch(ctx: &mut QueryContext, statement: &str) -> Result<ExecutionResult> {
    match leading_keyword(statement).as_str() {
        "SHOW" => return schema_clause::execute_show(ctx, statement),
        "DROP" => return schema_clause::execute_drop(ctx, statement),
        "LOAD" => {
            let substituted = substitute_parameters(statement, &ctx.params)?;
            return load_csv::execute(ctx, &substituted);
        }
        "CREATE" => {
            let after = statement["CREATE".len()..].trim_start();
            match leading_keyword(after).as_str() {
                "CONSTRAINT" => return schema_clause::execute_create_constraint(ctx, statement),
                "INDEX" | "FULLTEXT" | "VECTOR" => {
                    return schema_clause::execute_create_index(ctx, statement);
                }
                _ => {}
            }
        }
        _ => {}
    }

    // UNION / UNION ALL at the top level
    let (parts, dedup) = split_union(statement);
    if parts.len() > 1 {
        return execute_union(ctx, &parts, dedup);
    }

    let substituted = substitute_parameters(statement, &ctx.params)?;

    if leading_keyword(&substituted) == "MATCH" {
        if let Some(result) = compound::try_fast_path(ctx, &substituted)? {
            return Ok(result);
        }
    }

    run_segments(ctx, vec![Bindings::new()], &substituted)
}

/// Run a statement pipeline starting from the given rows. Substitutes
/// parameters first.
pub(crate) fn run_pipeline(
    ctx: &mut QueryContext,
    rows: Vec<Bindings>,
    text: &str,
) -> Result<ExecutionResult> {
    let substituted = substitute_parameters(text, &ctx.params)?;
    run_segments(ctx, rows, &substituted)
}

/// FOREACH body execution: update clauses over pre-built rows, output
/// discarded.
pub(crate) fn run_update_clauses(
    ctx: &mut QueryContext,
    rows: Vec<Bindings>,
    text: &str,
) -> Result<()> {
    run_segments(ctx, rows, text).map(|_| ())
}

fn run_segments(
    ctx: &mut QueryContext,
    mut rows: Vec<Bindings>,
    text: &str,
) -> Result<ExecutionResult> {
    let segments = split_clauses(text);
    if segments.is_empty() {
        return Err(Error::UnsupportedQuery(format!(
            "Unrecognized statement `{text}`"
        )));
    }

    let mut produced: Option<projection::Projected> = None;
    let mut call_columns: Option<Vec<String>> = None;

    let mut i = 0usize;
    while i < segments.len() {
        ctx.cancel.check()?;
        let (keyword, body) = &segments[i];
        match keyword.as_str() {
            "MATCH" | "OPTIONAL MATCH" => {
                // A directly following WHERE participates in matching
                let where_text = segments
                    .get(i + 1)
                    .filter(|(k, _)| k == "WHERE")
                    .map(|(_, b)| b.as_str());
                let patterns = split_patterns(body);
                rows = match_clause::expand(
                    ctx,
                    rows,
                    &patterns,
                    keyword == "OPTIONAL MATCH",
                    where_text,
                )?;
                if where_text.is_some() {
                    i += 1;
                }
                produced = None;
                call_columns = None;
            }
            "WHERE" => {
                let mut kept = Vec::with_capacity(rows.len());
                for row in rows {
                    if eval::evaluate(&ctx.eval(&row), body)?.is_truthy() {
                        kept.push(row);
                    }
                }
                rows = kept;
            }
            "CREATE" => {
                for row in &mut rows {
                    create_clause::execute(ctx, row, body)?;
                }
                produced = None;
                call_columns = None;
            }
            "MERGE" => {
                let mut merged = Vec::new();
                for row in &rows {
                    merged.extend(merge_clause::execute(ctx, row, body)?);
                }
                rows = merged;
                produced = None;
                call_columns = None;
            }
            "DELETE" | "DETACH DELETE" => {
                delete_clause::execute(ctx, &rows, body, keyword == "DETACH DELETE")?;
            }
            "SET" => {
                for row in &mut rows {
                    set_clause::apply_set(ctx, row, body)?;
                }
            }
            "REMOVE" => {
                for row in &mut rows {
                    set_clause::apply_remove(ctx, row, body)?;
                }
            }
            "UNWIND" => {
                let (expr, alias) =
                    split_by_keyword(body, "AS").ok_or_else(|| Error::SyntaxError {
                        position: 0,
                        message: format!("UNWIND requires AS alias (in `{body}`)"),
                    })?;
                let mut unwound = Vec::new();
                for row in &rows {
                    ctx.cancel.check()?;
                    match eval::evaluate(&ctx.eval(row), expr)? {
                        Value::List(items) => {
                            for item in items {
                                let mut new_row = row.clone();
                                new_row.set(alias.to_string(), item);
                                unwound.push(new_row);
                            }
                        }
                        Value::Null => {}
                        single => {
                            let mut new_row = row.clone();
                            new_row.set(alias.to_string(), single);
                            unwound.push(new_row);
                        }
                    }
                }
                rows = unwound;
                produced = None;
                call_columns = None;
            }
            "WITH" | "RETURN" => {
                let (distinct, items_text) = match find_keyword(body, "DISTINCT") {
                    Some(0) => (true, body["DISTINCT".len()..].trim()),
                    _ => (false, body.as_str()),
                };
                let mut spec = ProjectionSpec {
                    items_text: items_text.to_string(),
                    distinct,
                    ..Default::default()
                };
                // Trailing modifiers belong to this projection
                let mut j = i + 1;
                while let Some((next_kw, next_body)) = segments.get(j) {
                    match next_kw.as_str() {
                        "ORDER BY" => spec.order_by = Some(next_body.clone()),
                        "SKIP" => {
                            spec.skip = next_body.split_whitespace().next().and_then(|t| t.parse().ok())
                        }
                        "LIMIT" => {
                            spec.limit =
                                next_body.split_whitespace().next().and_then(|t| t.parse().ok())
                        }
                        _ => break,
                    }
                    j += 1;
                }
                let projected = projection::project(ctx, &rows, &spec)?;
                rows = projected.rows.clone();
                if keyword == "RETURN" {
                    produced = Some(projected);
                } else {
                    produced = None;
                }
                call_columns = None;
                i = j - 1;
            }
            "CALL" => {
                let outcome = call_clause::execute(ctx, rows, body)?;
                rows = outcome.rows;
                call_columns = Some(outcome.columns);
                produced = None;
            }
            "FOREACH" => {
                for row in &rows {
                    foreach_clause::execute(ctx, row, body)?;
                }
            }
            // Already consumed by the preceding RETURN/WITH lookahead
            "ORDER BY" | "SKIP" | "LIMIT" => {}
            other => {
                return Err(Error::UnsupportedQuery(format!(
                    "Clause `{other}` is not supported here"
                )));
            }
        }
        i += 1;
    }

    if let Some(projected) = produced {
        let table: Vec<Vec<Value>> = projected
            .table
            .iter()
            .map(|row| row.iter().map(result::to_output_value).collect())
            .collect();
        return Ok(ExecutionResult {
            columns: projected.columns,
            rows: table,
            stats: ctx.stats.clone(),
            plan: None,
        });
    }
    if let Some(columns) = call_columns {
        let table: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| result::to_output_value(row.get(c).unwrap_or(&Value::Null)))
                    .collect()
            })
            .collect();
        return Ok(ExecutionResult {
            columns,
            rows: table,
            stats: ctx.stats.clone(),
            plan: None,
        });
    }
    Ok(ExecutionResult::with_stats(ctx.stats.clone()))
}

// ============================================================================
// UNION
// ============================================================================

/// Split on top-level UNION / UNION ALL. Returns the side texts and
/// whether deduplication applies (any plain UNION separator).
fn split_union(text: &str) -> (Vec<String>, bool) {
    let mut parts = Vec::new();
    let mut dedup = false;
    let mut rest = text;
    loop {
        match find_keyword_top_level(rest, "UNION") {
            Some(i) => {
                parts.push(rest[..i].trim().to_string());
                let mut after = rest[i + "UNION".len()..].trim_start();
                if find_keyword_top_level(after, "ALL") == Some(0) {
                    after = after["ALL".len()..].trim_start();
                } else {
                    dedup = true;
                }
                rest = after;
            }
            None => {
                parts.push(rest.trim().to_string());
                break;
            }
        }
    }
    (parts, dedup)
}

fn execute_union(
    ctx: &mut QueryContext,
    parts: &[String],
    dedup: bool,
) -> Result<ExecutionResult> {
    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<Value>> = Vec::new();

    for part in parts {
        let result = run_pipeline(ctx, vec![Bindings::new()], part)?;
        if columns.is_empty() {
            columns = result.columns;
        } else if columns != result.columns {
            return Err(Error::SyntaxError {
                position: 0,
                message: format!(
                    "All sub queries in a UNION must have the same column names: {:?} vs {:?}",
                    columns, result.columns
                ),
            });
        }
        rows.extend(result.rows);
    }

    if dedup {
        let mut seen: Vec<String> = Vec::new();
        rows.retain(|row| {
            let key = format!("{row:?}");
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
    }

    Ok(ExecutionResult { columns, rows, stats: ctx.stats.clone(), plan: None })
}
