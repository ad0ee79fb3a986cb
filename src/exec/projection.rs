//! RETURN/WITH projection: column computation, implicit GROUP BY
//! aggregation, DISTINCT, ORDER BY, SKIP, LIMIT.

use std::collections::HashMap;

use super::context::QueryContext;
use crate::cypher::text::{
    encode_cypher_literal, find_keyword, find_keyword_top_level, matching_close,
    split_by_keyword, split_top_level_commas, top_level_positions,
};
use crate::eval::{self, Bindings};
use crate::model::Value;
use crate::{Error, Result};

const AGGREGATE_NAMES: &[&str] = &["count", "sum", "avg", "min", "max", "collect"];

/// One projection clause with its trailing modifiers.
#[derive(Debug, Clone, Default)]
pub struct ProjectionSpec {
    pub items_text: String,
    pub distinct: bool,
    pub order_by: Option<String>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

/// Projection output: named columns, the raw value table, and per-row
/// binding scopes for downstream clauses (WITH chaining).
#[derive(Debug, Clone, Default)]
pub struct Projected {
    pub columns: Vec<String>,
    pub table: Vec<Vec<Value>>,
    pub rows: Vec<Bindings>,
}

struct Item {
    expr: String,
    column: String,
}

/// Run a projection over input rows.
pub fn project(ctx: &QueryContext, input: &[Bindings], spec: &ProjectionSpec) -> Result<Projected> {
    let items = parse_items(&spec.items_text, input)?;

    // (scope for ORDER BY, output values) per row
    let mut computed: Vec<(Bindings, Vec<Value>)> = if items
        .iter()
        .any(|item| contains_aggregate(&item.expr))
    {
        aggregate(ctx, input, &items)?
    } else {
        let mut out = Vec::with_capacity(input.len());
        for row in input {
            ctx.cancel.check()?;
            let mut values = Vec::with_capacity(items.len());
            for item in &items {
                values.push(eval::evaluate(&ctx.eval(row), &item.expr)?);
            }
            out.push((row.clone(), values));
        }
        out
    };

    // DISTINCT: dedup by the stringified row
    if spec.distinct {
        let mut seen: Vec<String> = Vec::new();
        computed.retain(|(_, values)| {
            let key: String = values.iter().map(encode_cypher_literal).collect::<Vec<_>>().join("\u{1}");
            if seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        });
    }

    // ORDER BY evaluates in the combined scope: original bindings plus
    // projected aliases
    if let Some(order) = &spec.order_by {
        let keys = parse_order_keys(order);
        let mut decorated: Vec<(Vec<(Value, bool)>, (Bindings, Vec<Value>))> = Vec::new();
        for (scope, values) in computed {
            let mut merged = scope.clone();
            for (item, value) in items.iter().zip(&values) {
                merged.set(item.column.clone(), value.clone());
            }
            let mut sort_key = Vec::with_capacity(keys.len());
            for (expr, ascending) in &keys {
                let value =
                    eval::evaluate(&ctx.eval(&merged), expr).unwrap_or(Value::Null);
                sort_key.push((value, *ascending));
            }
            decorated.push((sort_key, (scope, values)));
        }
        decorated.sort_by(|a, b| {
            for ((av, asc), (bv, _)) in a.0.iter().zip(&b.0) {
                let ord = av.sort_cmp(bv);
                let ord = if *asc { ord } else { ord.reverse() };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
        computed = decorated.into_iter().map(|(_, row)| row).collect();
    }

    // SKIP then LIMIT
    let skipped = spec.skip.unwrap_or(0);
    let computed: Vec<(Bindings, Vec<Value>)> = computed
        .into_iter()
        .skip(skipped)
        .take(spec.limit.unwrap_or(usize::MAX))
        .collect();

    let columns: Vec<String> = items.iter().map(|i| i.column.clone()).collect();
    let mut table = Vec::with_capacity(computed.len());
    let mut rows = Vec::with_capacity(computed.len());
    for (_, values) in &computed {
        let mut bindings = Bindings::new();
        for (item, value) in items.iter().zip(values) {
            bindings.set(item.column.clone(), value.clone());
        }
        rows.push(bindings);
        table.push(values.clone());
    }

    Ok(Projected { columns, table, rows })
}

fn parse_items(body: &str, input: &[Bindings]) -> Result<Vec<Item>> {
    let body = body.trim();
    if body == "*" {
        // RETURN * / WITH *: every bound variable, sorted for stable
        // column order
        let mut names: Vec<String> = input
            .first()
            .map(|row| row.names().cloned().collect())
            .unwrap_or_default();
        names.sort();
        return Ok(names
            .into_iter()
            .map(|name| Item { expr: name.clone(), column: name })
            .collect());
    }
    let mut items = Vec::new();
    for segment in split_top_level_commas(body) {
        if segment.is_empty() {
            return Err(Error::SyntaxError {
                position: 0,
                message: format!("Empty projection item in `{body}`"),
            });
        }
        match split_by_keyword(segment, "AS") {
            Some((expr, alias)) => items.push(Item {
                expr: expr.to_string(),
                column: alias.to_string(),
            }),
            None => items.push(Item {
                expr: segment.to_string(),
                column: segment.to_string(),
            }),
        }
    }
    Ok(items)
}

fn parse_order_keys(order: &str) -> Vec<(String, bool)> {
    split_top_level_commas(order)
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(|item| {
            let upper = item.to_uppercase();
            if upper.ends_with(" DESC") || upper.ends_with(" DESCENDING") {
                let cut = item.len() - if upper.ends_with(" DESCENDING") { 11 } else { 5 };
                (item[..cut].trim().to_string(), false)
            } else if upper.ends_with(" ASC") || upper.ends_with(" ASCENDING") {
                let cut = item.len() - if upper.ends_with(" ASCENDING") { 10 } else { 4 };
                (item[..cut].trim().to_string(), true)
            } else {
                (item.to_string(), true)
            }
        })
        .collect()
}

/// Does an expression invoke an aggregation function anywhere outside
/// string literals?
pub fn contains_aggregate(expr: &str) -> bool {
    AGGREGATE_NAMES.iter().copied().any(|name| {
        let mut from = 0;
        while let Some(i) = find_keyword(&expr[from..], name) {
            let at = from + i;
            let rest = expr[at + name.len()..].trim_start();
            if rest.starts_with('(') {
                return true;
            }
            from = at + name.len();
        }
        false
    })
}

// ============================================================================
// Aggregation with implicit GROUP BY
// ============================================================================

fn aggregate(
    ctx: &QueryContext,
    input: &[Bindings],
    items: &[Item],
) -> Result<Vec<(Bindings, Vec<Value>)>> {
    // Non-aggregate columns are the grouping keys
    let key_indexes: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| !contains_aggregate(&item.expr))
        .map(|(i, _)| i)
        .collect();

    // Partition rows by grouping-key tuple, preserving encounter order
    let mut group_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (Vec<Value>, Vec<&Bindings>)> = HashMap::new();
    for row in input {
        ctx.cancel.check()?;
        let mut key_values = Vec::with_capacity(key_indexes.len());
        for &i in &key_indexes {
            key_values.push(eval::evaluate(&ctx.eval(row), &items[i].expr)?);
        }
        let key: String = key_values
            .iter()
            .map(encode_cypher_literal)
            .collect::<Vec<_>>()
            .join("\u{1}");
        if let Some(group) = groups.get_mut(&key) {
            group.1.push(row);
        } else {
            group_order.push(key.clone());
            groups.insert(key, (key_values, vec![row]));
        }
    }

    // A fully-aggregated projection over empty input still yields one row
    if groups.is_empty() && key_indexes.is_empty() {
        let empty: Vec<&Bindings> = Vec::new();
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(aggregate_expression(ctx, &item.expr, &empty)?);
        }
        return Ok(vec![(Bindings::new(), values)]);
    }

    let mut out = Vec::with_capacity(groups.len());
    for key in group_order {
        let Some((key_values, rows)) = groups.remove(&key) else {
            continue;
        };
        let representative =
            rows.first().map(|r| (*r).clone()).unwrap_or_default();
        let mut values = Vec::with_capacity(items.len());
        let mut key_iter = key_values.into_iter();
        for (i, item) in items.iter().enumerate() {
            if key_indexes.contains(&i) {
                values.push(key_iter.next().unwrap_or(Value::Null));
            } else {
                values.push(aggregate_expression(ctx, &item.expr, &rows)?);
            }
        }
        out.push((representative, values));
    }
    Ok(out)
}

/// Evaluate an aggregate column over a group. Supports arithmetic of
/// aggregates (`sum(a) + sum(b)`) by splitting at top-level +/-.
fn aggregate_expression(
    ctx: &QueryContext,
    expr: &str,
    rows: &[&Bindings],
) -> Result<Value> {
    let expr = expr.trim();

    // Whole expression is a single aggregate call
    if let Some(value) = try_single_aggregate(ctx, expr, rows)? {
        return Ok(value);
    }

    // Split signed terms at top-level +/-
    let mut boundaries: Vec<(usize, char)> = Vec::new();
    for op in ['+', '-'] {
        for pos in top_level_positions(expr, op) {
            let before = expr[..pos].trim_end();
            if before.is_empty() || before.ends_with(['+', '-', '*', '/', '(', ',']) {
                continue;
            }
            boundaries.push((pos, op));
        }
    }
    if boundaries.is_empty() {
        // No aggregate arithmetic — evaluate against the first group row
        return match rows.first() {
            Some(row) => eval::evaluate(&ctx.eval(row), expr),
            None => Ok(Value::Null),
        };
    }
    boundaries.sort_by_key(|(pos, _)| *pos);

    let mut acc: Option<Value> = None;
    let mut term_start = 0usize;
    let mut pending_sign = '+';
    for (pos, op) in boundaries.into_iter().chain([(expr.len(), '+')]) {
        let term = expr[term_start..pos].trim();
        term_start = pos + 1;
        if term.is_empty() {
            pending_sign = op;
            continue;
        }
        let value = match try_single_aggregate(ctx, term, rows)? {
            Some(v) => v,
            None => match rows.first() {
                Some(row) => eval::evaluate(&ctx.eval(row), term)?,
                None => Value::Null,
            },
        };
        acc = Some(match acc {
            None => apply_sign(&value, pending_sign)?,
            Some(current) => combine(&current, &value, pending_sign)?,
        });
        pending_sign = op;
    }
    Ok(acc.unwrap_or(Value::Null))
}

fn apply_sign(value: &Value, sign: char) -> Result<Value> {
    if sign == '+' {
        return Ok(value.clone());
    }
    match value {
        Value::Int(i) => Ok(Value::Int(-i)),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::Null => Ok(Value::Null),
        other => Err(Error::TypeError {
            expected: "numeric".into(),
            got: other.type_name().into(),
        }),
    }
}

fn combine(left: &Value, right: &Value, op: char) -> Result<Value> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => {
            Ok(Value::Int(if op == '+' { a + b } else { a - b }))
        }
        _ => {
            let (Some(a), Some(b)) = (left.as_float(), right.as_float()) else {
                return Err(Error::TypeError {
                    expected: "numeric".into(),
                    got: format!("{}, {}", left.type_name(), right.type_name()),
                });
            };
            Ok(Value::Float(if op == '+' { a + b } else { a - b }))
        }
    }
}

/// If `expr` is exactly one aggregate call, compute it over the group.
fn try_single_aggregate(
    ctx: &QueryContext,
    expr: &str,
    rows: &[&Bindings],
) -> Result<Option<Value>> {
    let Some(paren) = expr.find('(') else {
        return Ok(None);
    };
    let name = expr[..paren].trim().to_lowercase();
    if !AGGREGATE_NAMES.contains(&name.as_str()) {
        return Ok(None);
    }
    if matching_close(expr, paren) != Some(expr.len() - 1) {
        return Ok(None);
    }
    let inner = expr[paren + 1..expr.len() - 1].trim();
    let (distinct, arg) = match find_keyword_top_level(inner, "DISTINCT") {
        Some(0) => (true, inner["DISTINCT".len()..].trim_start()),
        _ => (false, inner),
    };
    Ok(Some(compute_aggregate(ctx, &name, distinct, arg, rows)?))
}

fn compute_aggregate(
    ctx: &QueryContext,
    name: &str,
    distinct: bool,
    arg: &str,
    rows: &[&Bindings],
) -> Result<Value> {
    // count(*) and bare count() count rows directly
    if name == "count" && (arg.is_empty() || arg == "*") {
        return Ok(Value::Int(rows.len() as i64));
    }

    let mut values: Vec<Value> = Vec::new();
    for row in rows {
        ctx.cancel.check()?;
        let value = eval::evaluate(&ctx.eval(row), arg)?;
        if !value.is_null() {
            values.push(value);
        }
    }
    if distinct {
        let mut deduped: Vec<Value> = Vec::new();
        for value in values {
            if !deduped.iter().any(|v| v.cypher_eq(&value)) {
                deduped.push(value);
            }
        }
        values = deduped;
    }

    match name {
        "count" => Ok(Value::Int(values.len() as i64)),
        "sum" => {
            let mut int_sum = 0i64;
            let mut float_sum = 0f64;
            let mut saw_float = false;
            for value in &values {
                match value {
                    Value::Int(i) => int_sum += i,
                    Value::Float(f) => {
                        saw_float = true;
                        float_sum += f;
                    }
                    _ => {} // non-numeric values are skipped
                }
            }
            if saw_float {
                Ok(Value::Float(int_sum as f64 + float_sum))
            } else {
                Ok(Value::Int(int_sum))
            }
        }
        "avg" => {
            let numerics: Vec<f64> = values.iter().filter_map(Value::as_float).collect();
            if numerics.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Float(numerics.iter().sum::<f64>() / numerics.len() as f64))
            }
        }
        "min" => Ok(values
            .into_iter()
            .reduce(|a, b| {
                if b.sort_cmp(&a) == std::cmp::Ordering::Less { b } else { a }
            })
            .unwrap_or(Value::Null)),
        "max" => Ok(values
            .into_iter()
            .reduce(|a, b| {
                if b.sort_cmp(&a) == std::cmp::Ordering::Greater { b } else { a }
            })
            .unwrap_or(Value::Null)),
        "collect" => Ok(Value::List(values)),
        _ => Err(Error::UnsupportedQuery(format!("Unknown aggregate `{name}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_aggregate() {
        assert!(contains_aggregate("count(n)"));
        assert!(contains_aggregate("sum(a) + sum(b)"));
        assert!(contains_aggregate("count(DISTINCT f)"));
        assert!(!contains_aggregate("n.count"));
        assert!(!contains_aggregate("'count(x)'"));
        assert!(!contains_aggregate("n.name"));
    }

    #[test]
    fn test_parse_order_keys() {
        let keys = parse_order_keys("n.age DESC, n.name");
        assert_eq!(keys, vec![("n.age".to_string(), false), ("n.name".to_string(), true)]);
        let keys = parse_order_keys("n.age ASCENDING");
        assert_eq!(keys, vec![("n.age".to_string(), true)]);
    }
}
