//! Schema DDL (CREATE/DROP INDEX and CONSTRAINT) and SHOW commands.

use super::context::QueryContext;
use super::result::ExecutionResult;
use crate::cypher::pattern::parse_node_pattern;
use crate::cypher::text::{
    find_char_top_level, find_keyword_top_level, leading_keyword, matching_close,
    split_top_level_commas,
};
use crate::model::Value;
use crate::storage::{ConstraintDef, ConstraintType, IndexDef, IndexType};
use crate::{Error, Result};

fn syntax(message: String) -> Error {
    Error::SyntaxError { position: 0, message }
}

// ============================================================================
// SHOW
// ============================================================================

pub fn execute_show(ctx: &QueryContext, statement: &str) -> Result<ExecutionResult> {
    let rest = statement["SHOW".len()..].trim();
    let what = leading_keyword(rest);
    match what.as_str() {
        "INDEXES" | "INDEX" => {
            let schema = ctx.storage.schema()?;
            Ok(ExecutionResult {
                columns: vec![
                    "name".into(),
                    "labelsOrTypes".into(),
                    "properties".into(),
                    "type".into(),
                ],
                rows: schema
                    .indexes
                    .into_iter()
                    .map(|i| {
                        vec![
                            Value::String(i.name),
                            Value::List(vec![Value::String(i.label)]),
                            Value::List(i.properties.into_iter().map(Value::String).collect()),
                            Value::String(index_type_name(i.index_type).into()),
                        ]
                    })
                    .collect(),
                ..Default::default()
            })
        }
        "CONSTRAINTS" | "CONSTRAINT" => {
            let schema = ctx.storage.schema()?;
            Ok(ExecutionResult {
                columns: vec![
                    "name".into(),
                    "labelsOrTypes".into(),
                    "properties".into(),
                    "type".into(),
                ],
                rows: schema
                    .constraints
                    .into_iter()
                    .map(|c| {
                        vec![
                            Value::String(c.name),
                            Value::List(vec![Value::String(c.label)]),
                            Value::List(vec![Value::String(c.property)]),
                            Value::String("UNIQUENESS".into()),
                        ]
                    })
                    .collect(),
                ..Default::default()
            })
        }
        "PROCEDURES" | "PROCEDURE" => Ok(ExecutionResult {
            columns: vec!["name".into()],
            rows: ctx
                .procedures
                .names()
                .into_iter()
                .map(|n| vec![Value::String(n)])
                .collect(),
            ..Default::default()
        }),
        "FUNCTIONS" | "FUNCTION" => Ok(ExecutionResult {
            columns: vec!["name".into()],
            rows: BUILTIN_FUNCTIONS
                .iter()
                .map(|n| vec![Value::String((*n).into())])
                .collect(),
            ..Default::default()
        }),
        "DATABASE" | "DATABASES" => Ok(ExecutionResult {
            columns: vec!["name".into(), "currentStatus".into(), "default".into()],
            rows: vec![vec![
                Value::String("nornicdb".into()),
                Value::String("online".into()),
                Value::Bool(true),
            ]],
            ..Default::default()
        }),
        other => Err(Error::UnsupportedQuery(format!("SHOW {other} is not supported"))),
    }
}

fn index_type_name(index_type: IndexType) -> &'static str {
    match index_type {
        IndexType::Range => "RANGE",
        IndexType::FullText => "FULLTEXT",
        IndexType::Vector => "VECTOR",
    }
}

/// The function names surfaced by SHOW FUNCTIONS, sorted.
const BUILTIN_FUNCTIONS: &[&str] = &[
    "abs", "acos", "all", "any", "asin", "atan", "atan2", "avg", "btrim", "ceil", "coalesce",
    "collect", "cos", "cosh", "coth", "count", "date", "datetime", "degree", "degrees", "distance",
    "duration", "e", "elementId", "endNode", "exists", "exp", "floor", "format", "hasLabels",
    "head", "id", "inDegree", "isEmpty", "isNaN", "keys", "labels", "last", "left", "length",
    "localdatetime", "localtime", "log", "log10", "ltrim", "max", "min", "none", "nullIf",
    "outDegree", "pi", "point", "power", "properties", "radians", "rand", "randomUUID", "range",
    "reduce", "replace", "reverse", "right", "round", "rtrim", "sign", "sin", "single", "sinh",
    "size", "split", "sqrt", "startNode", "substring", "sum", "tail", "tan", "tanh", "time",
    "timestamp", "toBoolean", "toFloat", "toInteger", "toLower", "toString", "toUpper", "trim",
    "type", "valueType",
];

// ============================================================================
// CREATE INDEX / CONSTRAINT
// ============================================================================

/// `CREATE CONSTRAINT [name] [IF NOT EXISTS] FOR (n:Label) REQUIRE
/// n.prop IS UNIQUE`
pub fn execute_create_constraint(ctx: &QueryContext, statement: &str) -> Result<ExecutionResult> {
    let after = statement[find_keyword_top_level(statement, "CONSTRAINT")
        .ok_or_else(|| syntax("Expected CONSTRAINT".into()))?
        + "CONSTRAINT".len()..]
        .trim();

    let for_at = find_keyword_top_level(after, "FOR")
        .ok_or_else(|| syntax(format!("Expected FOR in `{statement}`")))?;
    let name_part = after[..for_at].trim();
    let name_part = strip_if_not_exists(name_part);

    let rest = after[for_at + "FOR".len()..].trim();
    let (label, var) = parse_single_label_pattern(rest)?;

    let require_at = find_keyword_top_level(rest, "REQUIRE")
        .ok_or_else(|| syntax(format!("Expected REQUIRE in `{statement}`")))?;
    let requirement = rest[require_at + "REQUIRE".len()..].trim();
    let unique_at = find_keyword_top_level(requirement, "IS UNIQUE")
        .ok_or_else(|| syntax(format!("Only IS UNIQUE constraints are supported (in `{statement}`)")))?;
    let property_expr = requirement[..unique_at].trim();
    let property = property_expr
        .strip_prefix(&format!("{var}."))
        .unwrap_or(property_expr)
        .trim()
        .to_string();

    let name = if name_part.is_empty() {
        format!("constraint_{}_{}", label.to_lowercase(), property.to_lowercase())
    } else {
        name_part.to_string()
    };

    ctx.storage.create_constraint(ConstraintDef {
        name,
        label,
        property,
        constraint_type: ConstraintType::Unique,
    })?;
    Ok(ExecutionResult::empty())
}

/// `CREATE [FULLTEXT|VECTOR] INDEX [name] [IF NOT EXISTS] FOR (n:Label)
/// ON (n.p1[, n.p2]) [OPTIONS {...}]`
pub fn execute_create_index(ctx: &QueryContext, statement: &str) -> Result<ExecutionResult> {
    let index_type = if find_keyword_top_level(statement, "FULLTEXT").is_some() {
        IndexType::FullText
    } else if find_keyword_top_level(statement, "VECTOR").is_some() {
        IndexType::Vector
    } else {
        IndexType::Range
    };

    let after = statement[find_keyword_top_level(statement, "INDEX")
        .ok_or_else(|| syntax("Expected INDEX".into()))?
        + "INDEX".len()..]
        .trim();

    let for_at = find_keyword_top_level(after, "FOR")
        .ok_or_else(|| syntax(format!("Expected FOR in `{statement}`")))?;
    let name_part = strip_if_not_exists(after[..for_at].trim());

    let rest = after[for_at + "FOR".len()..].trim();
    let (label, var) = parse_single_label_pattern(rest)?;

    let on_at = find_keyword_top_level(rest, "ON")
        .ok_or_else(|| syntax(format!("Expected ON in `{statement}`")))?;
    let mut on_part = rest[on_at + "ON".len()..].trim();
    if let Some(options_at) = find_keyword_top_level(on_part, "OPTIONS") {
        on_part = on_part[..options_at].trim();
    }
    // `EACH` appears in fulltext syntax; tolerate and skip it
    if find_keyword_top_level(on_part, "EACH") == Some(0) {
        on_part = on_part["EACH".len()..].trim();
    }
    let properties = parse_property_list(on_part, &var)?;

    let name = if name_part.is_empty() {
        format!("index_{}_{}", label.to_lowercase(), properties.join("_").to_lowercase())
    } else {
        name_part.to_string()
    };

    ctx.storage.create_index(IndexDef { name, label, properties, index_type })?;
    Ok(ExecutionResult::empty())
}

/// `DROP INDEX name` / `DROP CONSTRAINT name` — metadata removal only.
pub fn execute_drop(ctx: &QueryContext, statement: &str) -> Result<ExecutionResult> {
    let rest = statement["DROP".len()..].trim();
    let what = leading_keyword(rest);
    let name = rest[what.len()..]
        .trim()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();
    match what.as_str() {
        "INDEX" => ctx.storage.drop_index(&name)?,
        "CONSTRAINT" => ctx.storage.drop_constraint(&name)?,
        other => return Err(Error::UnsupportedQuery(format!("DROP {other} is not supported"))),
    }
    Ok(ExecutionResult::empty())
}

// ============================================================================
// Shared parsing helpers
// ============================================================================

fn strip_if_not_exists(text: &str) -> &str {
    match find_keyword_top_level(text, "IF NOT EXISTS") {
        Some(i) => text[..i].trim(),
        None => text,
    }
}

/// Parse `(n:Label)` and return (label, variable).
fn parse_single_label_pattern(rest: &str) -> Result<(String, String)> {
    let open = find_char_top_level(rest, '(', 0)
        .ok_or_else(|| syntax(format!("Expected a node pattern in `{rest}`")))?;
    let close = matching_close(rest, open)
        .ok_or_else(|| syntax(format!("Unclosed node pattern in `{rest}`")))?;
    let pattern = parse_node_pattern(&rest[open..=close])?;
    let label = pattern
        .labels
        .first()
        .cloned()
        .ok_or_else(|| syntax(format!("Expected a label in `{rest}`")))?;
    Ok((label, pattern.variable.unwrap_or_else(|| "n".into())))
}

/// Parse `(n.p1, n.p2)` or a bare `n.p1`.
fn parse_property_list(on_part: &str, var: &str) -> Result<Vec<String>> {
    let inner = if on_part.starts_with('(') && matching_close(on_part, 0) == Some(on_part.len() - 1)
    {
        &on_part[1..on_part.len() - 1]
    } else {
        on_part
    };
    let prefix = format!("{var}.");
    let properties: Vec<String> = split_top_level_commas(inner)
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(|item| item.strip_prefix(&prefix).unwrap_or(item).trim().to_string())
        .collect();
    if properties.is_empty() {
        return Err(syntax(format!("Expected at least one property in `{on_part}`")));
    }
    Ok(properties)
}
