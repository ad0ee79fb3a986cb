//! Builtin scalar function table.
//!
//! Functions receive the raw argument text so that binding forms (reduce,
//! the quantifiers) can extend scope before evaluating. Unknown functions
//! return NULL rather than erroring; unknown *procedures* are handled by
//! the CALL executor and do error.

use crate::cypher::text::{
    find_char_top_level, find_keyword_top_level, split_top_level_commas,
};
use crate::model::{Direction, Value};
use crate::storage::relationships_for;
use crate::{Error, Result};

use super::{EvalContext, evaluate, spatial, temporal};

/// Dispatch `name(raw_args)`.
pub fn call(ctx: &EvalContext, name: &str, raw_args: &str) -> Result<Value> {
    let lower = name.to_lowercase();

    // Binding forms get the raw text
    match lower.as_str() {
        "reduce" => return eval_reduce(ctx, raw_args),
        "all" | "any" | "none" | "single" => return eval_quantifier(ctx, &lower, raw_args),
        "coalesce" => {
            for arg in split_args(raw_args) {
                let value = evaluate(ctx, arg)?;
                if !value.is_null() {
                    return Ok(value);
                }
            }
            return Ok(Value::Null);
        }
        _ => {}
    }

    // Aggregations in pure expression context do not aggregate: they pass
    // the argument through (count() with no argument counts the one row).
    if matches!(lower.as_str(), "count" | "sum" | "avg" | "min" | "max" | "collect") {
        let args = split_args(raw_args);
        return match args.first() {
            None => Ok(Value::Int(1)),
            Some(&"*") => Ok(Value::Int(1)),
            Some(first) => {
                let first = first.trim();
                let first = match find_keyword_top_level(first, "DISTINCT") {
                    Some(0) => first["DISTINCT".len()..].trim_start(),
                    _ => first,
                };
                evaluate(ctx, first)
            }
        };
    }

    let arg_texts = split_args(raw_args);
    let args: Vec<Value> = arg_texts
        .iter()
        .map(|t| evaluate(ctx, t))
        .collect::<Result<_>>()?;

    let wrong_args = || Error::TypeError {
        expected: format!("valid arguments for {name}()"),
        got: raw_args.to_string(),
    };

    match lower.as_str() {
        // ====================================================================
        // Identity and graph metadata
        // ====================================================================
        "id" => match args.first() {
            Some(Value::Node(n)) => Ok(Value::Int(n.id.0 as i64)),
            Some(Value::Relationship(r)) => Ok(Value::Int(r.id.0 as i64)),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "elementid" => match args.first() {
            Some(Value::Node(n)) => Ok(Value::String(format!("4:nornicdb:{}", n.id))),
            Some(Value::Relationship(r)) => Ok(Value::String(format!("5:nornicdb:{}", r.id))),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "labels" => match args.first() {
            Some(Value::Node(n)) => Ok(Value::List(
                n.labels.iter().map(|l| Value::String(l.clone())).collect(),
            )),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "type" => match args.first() {
            Some(Value::Relationship(r)) => Ok(Value::String(r.rel_type.clone())),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "keys" => match args.first() {
            Some(Value::Node(n)) => {
                let mut keys: Vec<String> = n.properties.keys().cloned().collect();
                keys.sort();
                Ok(Value::List(keys.into_iter().map(Value::String).collect()))
            }
            Some(Value::Relationship(r)) => {
                let mut keys: Vec<String> = r.properties.keys().cloned().collect();
                keys.sort();
                Ok(Value::List(keys.into_iter().map(Value::String).collect()))
            }
            Some(Value::Map(m)) => {
                let mut keys: Vec<String> = m.keys().cloned().collect();
                keys.sort();
                Ok(Value::List(keys.into_iter().map(Value::String).collect()))
            }
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "properties" => match args.first() {
            Some(Value::Node(n)) => Ok(Value::Map(n.properties.clone())),
            Some(Value::Relationship(r)) => Ok(Value::Map(r.properties.clone())),
            Some(Value::Map(m)) => Ok(Value::Map(m.clone())),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "haslabels" => match (args.first(), args.get(1)) {
            (Some(Value::Node(n)), Some(Value::List(labels))) => Ok(Value::Bool(
                labels
                    .iter()
                    .all(|l| l.as_str().is_some_and(|name| n.has_label(name))),
            )),
            (Some(Value::Null), _) => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "startnode" | "endnode" => {
            let Some(Value::Relationship(rel)) = args.first() else {
                return match args.first() {
                    Some(Value::Null) => Ok(Value::Null),
                    _ => Err(wrong_args()),
                };
            };
            let storage = ctx.storage.ok_or_else(|| {
                Error::UnsupportedQuery(format!("{name}() requires graph access"))
            })?;
            let node_id = if lower == "startnode" { rel.src } else { rel.dst };
            Ok(storage
                .get_node(node_id)?
                .map(|n| Value::Node(Box::new(n)))
                .unwrap_or(Value::Null))
        }
        "degree" | "indegree" | "outdegree" => {
            let Some(Value::Node(node)) = args.first() else {
                return match args.first() {
                    Some(Value::Null) => Ok(Value::Null),
                    _ => Err(wrong_args()),
                };
            };
            let storage = ctx.storage.ok_or_else(|| {
                Error::UnsupportedQuery(format!("{name}() requires graph access"))
            })?;
            let dir = match lower.as_str() {
                "indegree" => Direction::Incoming,
                "outdegree" => Direction::Outgoing,
                _ => Direction::Both,
            };
            let mut rels = relationships_for(storage, node.id, dir)?;
            // Optional second argument filters by relationship type
            if let Some(Value::String(rel_type)) = args.get(1) {
                rels.retain(|r| r.rel_type == *rel_type);
            }
            Ok(Value::Int(rels.len() as i64))
        }
        "nodes" => match args.first() {
            Some(Value::Path(p)) => Ok(Value::List(
                p.nodes.iter().cloned().map(|n| Value::Node(Box::new(n))).collect(),
            )),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "relationships" => match args.first() {
            Some(Value::Path(p)) => Ok(Value::List(
                p.relationships
                    .iter()
                    .cloned()
                    .map(|r| Value::Relationship(Box::new(r)))
                    .collect(),
            )),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },

        // ====================================================================
        // Lists
        // ====================================================================
        "head" => match args.first() {
            Some(Value::List(l)) => Ok(l.first().cloned().unwrap_or(Value::Null)),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "last" => match args.first() {
            Some(Value::List(l)) => Ok(l.last().cloned().unwrap_or(Value::Null)),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "tail" => match args.first() {
            Some(Value::List(l)) => Ok(Value::List(l.iter().skip(1).cloned().collect())),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "size" => match args.first() {
            Some(Value::List(l)) => Ok(Value::Int(l.len() as i64)),
            Some(Value::String(s)) => Ok(Value::Int(s.chars().count() as i64)),
            Some(Value::Map(m)) => Ok(Value::Int(m.len() as i64)),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "length" => match args.first() {
            Some(Value::Path(p)) => Ok(Value::Int(p.len() as i64)),
            Some(Value::List(l)) => Ok(Value::Int(l.len() as i64)),
            Some(Value::String(s)) => Ok(Value::Int(s.chars().count() as i64)),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "range" => {
            let start = args.first().and_then(Value::as_int).ok_or_else(wrong_args)?;
            let end = args.get(1).and_then(Value::as_int).ok_or_else(wrong_args)?;
            let step = match args.get(2) {
                Some(v) => v.as_int().ok_or_else(wrong_args)?,
                None => 1,
            };
            if step == 0 {
                return Err(wrong_args());
            }
            let mut out = Vec::new();
            let mut i = start;
            while (step > 0 && i <= end) || (step < 0 && i >= end) {
                out.push(Value::Int(i));
                i += step;
            }
            Ok(Value::List(out))
        }
        "reverse" => match args.first() {
            Some(Value::List(l)) => Ok(Value::List(l.iter().rev().cloned().collect())),
            Some(Value::String(s)) => Ok(Value::String(s.chars().rev().collect())),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },

        // ====================================================================
        // Conversions
        // ====================================================================
        "tostring" => match args.first() {
            Some(Value::Null) | None => Ok(Value::Null),
            Some(v) => Ok(Value::String(v.to_string())),
        },
        "tostringornull" => match args.first() {
            Some(Value::Null) | None => Ok(Value::Null),
            Some(v) => Ok(Value::String(v.to_string())),
        },
        "tointeger" | "toint" | "tointegerornull" => {
            let or_null = lower == "tointegerornull";
            match args.first() {
                Some(Value::Int(i)) => Ok(Value::Int(*i)),
                Some(Value::Float(f)) => Ok(Value::Int(*f as i64)),
                Some(Value::Bool(b)) => Ok(Value::Int(*b as i64)),
                Some(Value::String(s)) => Ok(s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .or_else(|_| s.trim().parse::<f64>().map(|f| Value::Int(f as i64)))
                    .unwrap_or(Value::Null)),
                Some(Value::Null) | None => Ok(Value::Null),
                _ if or_null => Ok(Value::Null),
                _ => Err(wrong_args()),
            }
        }
        "tofloat" | "tofloatornull" => {
            let or_null = lower == "tofloatornull";
            match args.first() {
                Some(Value::Float(f)) => Ok(Value::Float(*f)),
                Some(Value::Int(i)) => Ok(Value::Float(*i as f64)),
                Some(Value::String(s)) => Ok(s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .unwrap_or(Value::Null)),
                Some(Value::Null) | None => Ok(Value::Null),
                _ if or_null => Ok(Value::Null),
                _ => Err(wrong_args()),
            }
        }
        "toboolean" | "tobooleanornull" => {
            let or_null = lower == "tobooleanornull";
            match args.first() {
                Some(Value::Bool(b)) => Ok(Value::Bool(*b)),
                Some(Value::Int(i)) => Ok(Value::Bool(*i != 0)),
                Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Ok(Value::Null),
                },
                Some(Value::Null) | None => Ok(Value::Null),
                _ if or_null => Ok(Value::Null),
                _ => Err(wrong_args()),
            }
        }

        // ====================================================================
        // Strings
        // ====================================================================
        "tolower" => string_fn(&args, wrong_args, |s| s.to_lowercase()),
        "toupper" => string_fn(&args, wrong_args, |s| s.to_uppercase()),
        "trim" => trim_fn(&args, wrong_args, TrimSide::Both),
        "ltrim" => trim_fn(&args, wrong_args, TrimSide::Left),
        "rtrim" => trim_fn(&args, wrong_args, TrimSide::Right),
        "btrim" => trim_fn(&args, wrong_args, TrimSide::Both),
        "replace" => match (args.first(), args.get(1), args.get(2)) {
            (Some(Value::String(s)), Some(Value::String(from)), Some(Value::String(to))) => {
                Ok(Value::String(s.replace(from.as_str(), to)))
            }
            (Some(Value::Null), _, _) => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "split" => match (args.first(), args.get(1)) {
            (Some(Value::String(s)), Some(Value::String(sep))) => Ok(Value::List(
                s.split(sep.as_str())
                    .map(|p| Value::String(p.to_string()))
                    .collect(),
            )),
            (Some(Value::Null), _) => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "substring" => match (args.first(), args.get(1)) {
            (Some(Value::String(s)), Some(start)) => {
                let start = start.as_int().ok_or_else(wrong_args)?.max(0) as usize;
                let chars: Vec<char> = s.chars().collect();
                let end = match args.get(2) {
                    Some(len) => {
                        let len = len.as_int().ok_or_else(wrong_args)?.max(0) as usize;
                        (start + len).min(chars.len())
                    }
                    None => chars.len(),
                };
                if start >= chars.len() {
                    Ok(Value::String(String::new()))
                } else {
                    Ok(Value::String(chars[start..end].iter().collect()))
                }
            }
            (Some(Value::Null), _) => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "left" => match (args.first(), args.get(1)) {
            (Some(Value::String(s)), Some(n)) => {
                let n = n.as_int().ok_or_else(wrong_args)?.max(0) as usize;
                Ok(Value::String(s.chars().take(n).collect()))
            }
            (Some(Value::Null), _) => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "right" => match (args.first(), args.get(1)) {
            (Some(Value::String(s)), Some(n)) => {
                let n = n.as_int().ok_or_else(wrong_args)?.max(0) as usize;
                let chars: Vec<char> = s.chars().collect();
                let start = chars.len().saturating_sub(n);
                Ok(Value::String(chars[start..].iter().collect()))
            }
            (Some(Value::Null), _) => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "format" => format_string(&args, wrong_args),

        // ====================================================================
        // Math
        // ====================================================================
        "abs" => match args.first() {
            Some(Value::Int(i)) => Ok(Value::Int(i.abs())),
            Some(Value::Float(f)) => Ok(Value::Float(f.abs())),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "sign" => match args.first() {
            Some(Value::Int(i)) => Ok(Value::Int(i.signum())),
            Some(Value::Float(f)) => Ok(Value::Int(if *f > 0.0 {
                1
            } else if *f < 0.0 {
                -1
            } else {
                0
            })),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "ceil" => float_fn(&args, wrong_args, f64::ceil),
        "floor" => float_fn(&args, wrong_args, f64::floor),
        "round" => match args.get(1).and_then(Value::as_int) {
            Some(precision) => {
                let x = args.first().and_then(Value::as_float).ok_or_else(wrong_args)?;
                let factor = 10f64.powi(precision as i32);
                Ok(Value::Float((x * factor).round() / factor))
            }
            None => float_fn(&args, wrong_args, f64::round),
        },
        "sqrt" => float_fn(&args, wrong_args, f64::sqrt),
        "exp" => float_fn(&args, wrong_args, f64::exp),
        "log" => float_fn(&args, wrong_args, f64::ln),
        "log10" => float_fn(&args, wrong_args, f64::log10),
        "power" => match (args.first().and_then(Value::as_float), args.get(1).and_then(Value::as_float)) {
            (Some(base), Some(exp)) => Ok(Value::Float(base.powf(exp))),
            _ => match args.first() {
                Some(Value::Null) | None => Ok(Value::Null),
                _ => Err(wrong_args()),
            },
        },
        "sin" => float_fn(&args, wrong_args, f64::sin),
        "cos" => float_fn(&args, wrong_args, f64::cos),
        "tan" => float_fn(&args, wrong_args, f64::tan),
        "asin" => float_fn(&args, wrong_args, f64::asin),
        "acos" => float_fn(&args, wrong_args, f64::acos),
        "atan" => float_fn(&args, wrong_args, f64::atan),
        "atan2" => match (args.first().and_then(Value::as_float), args.get(1).and_then(Value::as_float)) {
            (Some(y), Some(x)) => Ok(Value::Float(y.atan2(x))),
            _ => Ok(Value::Null),
        },
        "sinh" => float_fn(&args, wrong_args, f64::sinh),
        "cosh" => float_fn(&args, wrong_args, f64::cosh),
        "tanh" => float_fn(&args, wrong_args, f64::tanh),
        "coth" => float_fn(&args, wrong_args, |x| x.cosh() / x.sinh()),
        "radians" => float_fn(&args, wrong_args, f64::to_radians),
        "degrees" => float_fn(&args, wrong_args, f64::to_degrees),
        "pi" => Ok(Value::Float(std::f64::consts::PI)),
        "e" => Ok(Value::Float(std::f64::consts::E)),
        "rand" => Ok(Value::Float(rand::random::<f64>())),
        "randomuuid" => Ok(Value::String(uuid::Uuid::new_v4().to_string())),

        // ====================================================================
        // Predicates
        // ====================================================================
        "exists" => match args.first() {
            Some(Value::Null) | None => Ok(Value::Bool(false)),
            Some(_) => Ok(Value::Bool(true)),
        },
        "isempty" => match args.first() {
            Some(Value::List(l)) => Ok(Value::Bool(l.is_empty())),
            Some(Value::Map(m)) => Ok(Value::Bool(m.is_empty())),
            Some(Value::String(s)) => Ok(Value::Bool(s.is_empty())),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "isnan" => match args.first() {
            Some(Value::Float(f)) => Ok(Value::Bool(f.is_nan())),
            Some(Value::Int(_)) => Ok(Value::Bool(false)),
            Some(Value::Null) | None => Ok(Value::Null),
            _ => Err(wrong_args()),
        },
        "nullif" => match (args.first(), args.get(1)) {
            (Some(a), Some(b)) => {
                if a.cypher_eq(b) {
                    Ok(Value::Null)
                } else {
                    Ok(a.clone())
                }
            }
            _ => Err(wrong_args()),
        },
        "valuetype" => match args.first() {
            Some(v) => Ok(Value::String(v.type_name().to_string())),
            None => Err(wrong_args()),
        },

        // ====================================================================
        // Temporal, spatial, vector
        // ====================================================================
        "timestamp" | "datetime" | "date" | "time" | "localdatetime" | "localtime"
        | "duration" | "duration.between" => temporal::call(&lower, &args),
        name if name.starts_with("date.")
            || name.starts_with("datetime.")
            || name.starts_with("time.") =>
        {
            let component = name.rsplit('.').next().unwrap_or_default();
            match args.first() {
                Some(Value::Null) | None => Ok(Value::Null),
                Some(v) => Ok(v.temporal_component(component).unwrap_or(Value::Null)),
            }
        }
        "point" | "distance" | "point.distance" | "withinbbox" | "point.withinbbox"
        | "vector.similarity.cosine" | "vector.similarity.euclidean" => {
            spatial::call(&lower, &args)
        }

        _ => {
            tracing::debug!(function = name, "unknown function evaluates to NULL");
            Ok(Value::Null)
        }
    }
}

fn split_args(raw: &str) -> Vec<&str> {
    let raw = raw.trim();
    if raw.is_empty() {
        Vec::new()
    } else {
        split_top_level_commas(raw)
    }
}

enum TrimSide {
    Left,
    Right,
    Both,
}

fn string_fn(
    args: &[Value],
    wrong_args: impl Fn() -> Error,
    f: impl Fn(&str) -> String,
) -> Result<Value> {
    match args.first() {
        Some(Value::String(s)) => Ok(Value::String(f(s))),
        Some(Value::Null) | None => Ok(Value::Null),
        _ => Err(wrong_args()),
    }
}

fn trim_fn(args: &[Value], wrong_args: impl Fn() -> Error, side: TrimSide) -> Result<Value> {
    let Some(first) = args.first() else {
        return Ok(Value::Null);
    };
    let s = match first {
        Value::String(s) => s,
        Value::Null => return Ok(Value::Null),
        _ => return Err(wrong_args()),
    };
    let out = match args.get(1) {
        Some(Value::String(cut)) => {
            let cut: Vec<char> = cut.chars().collect();
            let pred = |c: char| cut.contains(&c);
            match side {
                TrimSide::Left => s.trim_start_matches(pred).to_string(),
                TrimSide::Right => s.trim_end_matches(pred).to_string(),
                TrimSide::Both => s.trim_matches(pred).to_string(),
            }
        }
        _ => match side {
            TrimSide::Left => s.trim_start().to_string(),
            TrimSide::Right => s.trim_end().to_string(),
            TrimSide::Both => s.trim().to_string(),
        },
    };
    Ok(Value::String(out))
}

fn float_fn(
    args: &[Value],
    wrong_args: impl Fn() -> Error,
    f: impl Fn(f64) -> f64,
) -> Result<Value> {
    match args.first() {
        Some(Value::Null) | None => Ok(Value::Null),
        Some(v) => match v.as_float() {
            Some(x) => Ok(Value::Float(f(x))),
            None => Err(wrong_args()),
        },
    }
}

/// sprintf-style formatting: `%s`, `%d`, `%f`, `%.Nf`, `%%`.
fn format_string(args: &[Value], wrong_args: impl Fn() -> Error) -> Result<Value> {
    let Some(Value::String(fmt)) = args.first() else {
        return Err(wrong_args());
    };
    let mut out = String::with_capacity(fmt.len());
    let mut next_arg = 1usize;
    let mut chars = fmt.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        if chars.peek() == Some(&'%') {
            out.push('%');
            chars.next();
            continue;
        }
        // Optional precision: %.2f
        let mut precision: Option<usize> = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                digits.push(chars.next().unwrap_or('0'));
            }
            precision = digits.parse().ok();
        }
        let conv = chars.next().ok_or_else(&wrong_args)?;
        let arg = args.get(next_arg).ok_or_else(&wrong_args)?;
        next_arg += 1;
        match conv {
            's' => out.push_str(&arg.to_string()),
            'd' => {
                let i = arg.as_int().ok_or_else(&wrong_args)?;
                out.push_str(&i.to_string());
            }
            'f' => {
                let f = arg.as_float().ok_or_else(&wrong_args)?;
                match precision {
                    Some(p) => out.push_str(&format!("{f:.p$}")),
                    None => out.push_str(&format!("{f}")),
                }
            }
            _ => return Err(wrong_args()),
        }
    }
    Ok(Value::String(out))
}

// ============================================================================
// Binding forms
// ============================================================================

/// `reduce(acc = init, x IN list | expr)`
fn eval_reduce(ctx: &EvalContext, raw: &str) -> Result<Value> {
    let syntax = || Error::SyntaxError {
        position: 0,
        message: format!("Malformed reduce(): `{raw}`"),
    };
    let eq = find_char_top_level(raw, '=', 0).ok_or_else(syntax)?;
    let acc_name = raw[..eq].trim().to_string();
    let rest = &raw[eq + 1..];
    let comma = find_char_top_level(rest, ',', 0).ok_or_else(syntax)?;
    let init = rest[..comma].trim();
    let iter_part = rest[comma + 1..].trim();

    let in_at = find_keyword_top_level(iter_part, "IN").ok_or_else(syntax)?;
    let var = iter_part[..in_at].trim().to_string();
    let after_in = &iter_part[in_at + 2..];
    let pipe = find_char_top_level(after_in, '|', 0).ok_or_else(syntax)?;
    let list_expr = after_in[..pipe].trim();
    let body = after_in[pipe + 1..].trim();

    let mut acc = evaluate(ctx, init)?;
    let Value::List(items) = evaluate(ctx, list_expr)? else {
        return Ok(Value::Null);
    };
    let mut scope = ctx.bindings.clone();
    for item in items {
        scope.set(acc_name.clone(), acc.clone());
        scope.set(var.clone(), item);
        acc = evaluate(&ctx.rebind(&scope), body)?;
    }
    Ok(acc)
}

/// `all/any/none/single(x IN list WHERE predicate)`
fn eval_quantifier(ctx: &EvalContext, which: &str, raw: &str) -> Result<Value> {
    let syntax = || Error::SyntaxError {
        position: 0,
        message: format!("Malformed {which}(): `{raw}`"),
    };
    let in_at = find_keyword_top_level(raw, "IN").ok_or_else(syntax)?;
    let var = raw[..in_at].trim().to_string();
    let after_in = &raw[in_at + 2..];
    let where_at = find_keyword_top_level(after_in, "WHERE").ok_or_else(syntax)?;
    let list_expr = after_in[..where_at].trim();
    let predicate = after_in[where_at + "WHERE".len()..].trim();

    let Value::List(items) = evaluate(ctx, list_expr)? else {
        return Ok(Value::Null);
    };
    let mut matches = 0usize;
    let total = items.len();
    let mut scope = ctx.bindings.clone();
    for item in items {
        scope.set(var.clone(), item);
        if evaluate(&ctx.rebind(&scope), predicate)?.is_truthy() {
            matches += 1;
        }
    }
    Ok(Value::Bool(match which {
        "all" => matches == total,
        "any" => matches > 0,
        "none" => matches == 0,
        "single" => matches == 1,
        _ => false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Bindings;
    use crate::model::{Node, NodeId};
    use pretty_assertions::assert_eq;

    fn eval(expr: &str) -> Value {
        let bindings = Bindings::new();
        evaluate(&EvalContext::new(&bindings), expr).unwrap()
    }

    #[test]
    fn test_coalesce() {
        assert_eq!(eval("coalesce(NULL, NULL, 3)"), Value::Int(3));
        assert_eq!(eval("coalesce(NULL)"), Value::Null);
        assert_eq!(eval("coalesce('a', 'b')"), Value::String("a".into()));
    }

    #[test]
    fn test_list_functions() {
        assert_eq!(eval("head([1, 2, 3])"), Value::Int(1));
        assert_eq!(eval("last([1, 2, 3])"), Value::Int(3));
        assert_eq!(eval("tail([1, 2, 3])"), Value::List(vec![Value::Int(2), Value::Int(3)]));
        assert_eq!(eval("size([1, 2, 3])"), Value::Int(3));
        assert_eq!(eval("size('abc')"), Value::Int(3));
        assert_eq!(
            eval("range(1, 3)"),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(
            eval("range(3, 1, -1)"),
            Value::List(vec![Value::Int(3), Value::Int(2), Value::Int(1)])
        );
        assert_eq!(eval("reverse([1, 2])"), Value::List(vec![Value::Int(2), Value::Int(1)]));
        assert_eq!(eval("reverse('ab')"), Value::String("ba".into()));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(eval("toInteger('42')"), Value::Int(42));
        assert_eq!(eval("toInteger('nope')"), Value::Null);
        assert_eq!(eval("toFloat('2.5')"), Value::Float(2.5));
        assert_eq!(eval("toString(42)"), Value::String("42".into()));
        assert_eq!(eval("toBoolean('true')"), Value::Bool(true));
        assert_eq!(eval("toIntegerOrNull([1])"), Value::Null);
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(eval("toUpper('ab')"), Value::String("AB".into()));
        assert_eq!(eval("toLower('AB')"), Value::String("ab".into()));
        assert_eq!(eval("trim('  x  ')"), Value::String("x".into()));
        assert_eq!(eval("ltrim('  x')"), Value::String("x".into()));
        assert_eq!(eval("btrim('xxaxx', 'x')"), Value::String("a".into()));
        assert_eq!(eval("replace('aaa', 'a', 'b')"), Value::String("bbb".into()));
        assert_eq!(
            eval("split('a,b', ',')"),
            Value::List(vec![Value::String("a".into()), Value::String("b".into())])
        );
        assert_eq!(eval("substring('hello', 1, 3)"), Value::String("ell".into()));
        assert_eq!(eval("left('hello', 2)"), Value::String("he".into()));
        assert_eq!(eval("right('hello', 2)"), Value::String("lo".into()));
    }

    #[test]
    fn test_math_functions() {
        assert_eq!(eval("abs(-3)"), Value::Int(3));
        assert_eq!(eval("sign(-9)"), Value::Int(-1));
        assert_eq!(eval("ceil(1.2)"), Value::Float(2.0));
        assert_eq!(eval("floor(1.8)"), Value::Float(1.0));
        assert_eq!(eval("round(2.5)"), Value::Float(3.0));
        assert_eq!(eval("round(2.345, 2)"), Value::Float(2.35));
        assert_eq!(eval("sqrt(9)"), Value::Float(3.0));
        assert_eq!(eval("power(2, 10)"), Value::Float(1024.0));
        assert_eq!(eval("pi()"), Value::Float(std::f64::consts::PI));
    }

    #[test]
    fn test_format() {
        assert_eq!(
            eval("format('User %s: age %d, balance $%.2f', 'Bob', 25, 100.50)"),
            Value::String("User Bob: age 25, balance $100.50".into())
        );
        assert_eq!(eval("format('100%%')"), Value::String("100%".into()));
    }

    #[test]
    fn test_predicates() {
        assert_eq!(eval("isEmpty([])"), Value::Bool(true));
        assert_eq!(eval("isEmpty('x')"), Value::Bool(false));
        assert_eq!(eval("nullIf(1, 1)"), Value::Null);
        assert_eq!(eval("nullIf(1, 2)"), Value::Int(1));
        assert_eq!(eval("valueType(1)"), Value::String("INTEGER".into()));
        assert_eq!(eval("exists(NULL)"), Value::Bool(false));
        assert_eq!(eval("exists(1)"), Value::Bool(true));
    }

    #[test]
    fn test_quantifiers() {
        assert_eq!(eval("all(x IN [1, 2, 3] WHERE x > 0)"), Value::Bool(true));
        assert_eq!(eval("any(x IN [1, 2, 3] WHERE x > 2)"), Value::Bool(true));
        assert_eq!(eval("none(x IN [1, 2, 3] WHERE x > 5)"), Value::Bool(true));
        assert_eq!(eval("single(x IN [1, 2, 3] WHERE x = 2)"), Value::Bool(true));
        assert_eq!(eval("single(x IN [1, 2, 2] WHERE x = 2)"), Value::Bool(false));
    }

    #[test]
    fn test_reduce() {
        assert_eq!(eval("reduce(s = 0, x IN [1, 2, 3] | s + x)"), Value::Int(6));
        assert_eq!(
            eval("reduce(acc = '', w IN ['a', 'b'] | acc + w)"),
            Value::String("ab".into())
        );
    }

    #[test]
    fn test_aggregates_pass_through_in_scalar_context() {
        assert_eq!(eval("count(1)"), Value::Int(1));
        assert_eq!(eval("sum(5)"), Value::Int(5));
    }

    #[test]
    fn test_unknown_function_is_null() {
        assert_eq!(eval("definitelyNotAFunction(1, 2)"), Value::Null);
    }

    #[test]
    fn test_labels_and_id() {
        let node = Node::new(NodeId(3)).with_labels(["Person"]);
        let mut bindings = Bindings::new();
        bindings.set("n", Value::Node(Box::new(node)));
        let ctx = EvalContext::new(&bindings);
        assert_eq!(
            evaluate(&ctx, "labels(n)").unwrap(),
            Value::List(vec![Value::String("Person".into())])
        );
        assert_eq!(evaluate(&ctx, "id(n)").unwrap(), Value::Int(3));
        assert_eq!(
            evaluate(&ctx, "keys(n)").unwrap(),
            Value::List(vec![])
        );
    }
}
