//! Expression evaluation over runtime values.
//!
//! The evaluator operates on raw expression text and a binding map —
//! there is no expression AST on the hot path. Dispatch is by prefix and
//! shape, with every split performed at bracket depth 0 outside string
//! literals. Precedence, loosest first: OR, XOR, AND, NOT, comparison,
//! additive, multiplicative, unary minus, postfix/primary.
//!
//! NULL behavior follows the engine's comparison contract: any comparison
//! involving NULL is false (only `IS [NOT] NULL` sees NULL), while
//! arithmetic propagates NULL.

pub mod case;
pub mod functions;
pub mod regex_cache;
pub mod spatial;
pub mod temporal;

use std::collections::HashMap;

use crate::cypher::text::{
    find_char_top_level, find_keyword_top_level, find_keyword_top_level_from, find_str_top_level,
    matching_close, split_top_level_commas,
};
use crate::cypher::pattern::parse_property_block;
use crate::model::Value;
use crate::storage::GraphStorage;
use crate::{Error, Result};

// ============================================================================
// Bindings
// ============================================================================

/// Variable bindings carried through a statement: nodes, relationships,
/// paths, and plain values all live in one map.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn merge(&mut self, other: &Bindings) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Evaluation context: bindings plus optional storage access for the
/// graph-aware builtins (degree, startNode, endNode).
pub struct EvalContext<'a> {
    pub bindings: &'a Bindings,
    pub storage: Option<&'a dyn GraphStorage>,
}

impl<'a> EvalContext<'a> {
    pub fn new(bindings: &'a Bindings) -> Self {
        Self { bindings, storage: None }
    }

    pub fn with_storage(bindings: &'a Bindings, storage: &'a dyn GraphStorage) -> Self {
        Self { bindings, storage: Some(storage) }
    }

    /// Same storage, different bindings — used by comprehensions and
    /// quantifiers to extend scope.
    pub fn rebind<'b>(&'b self, bindings: &'b Bindings) -> EvalContext<'b> {
        EvalContext { bindings, storage: self.storage }
    }
}

/// Evaluate an expression against the context.
pub fn evaluate(ctx: &EvalContext, expr: &str) -> Result<Value> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(Error::SyntaxError {
            position: 0,
            message: "Empty expression".into(),
        });
    }
    eval_or(ctx, expr)
}

// ============================================================================
// CASE-aware scanning
//
// CASE … END carries no brackets, so depth tracking alone cannot protect
// its interior from operator splits. Every split below masks the spans of
// top-level CASE expressions first.
// ============================================================================

fn case_spans(expr: &str) -> Vec<(usize, usize)> {
    let mut marks: Vec<(usize, bool)> = Vec::new();
    for (kw, is_open) in [("CASE", true), ("END", false)] {
        let mut from = 0;
        while let Some(i) = find_keyword_top_level_from(expr, kw, from) {
            marks.push((i, is_open));
            from = i + kw.len();
        }
    }
    marks.sort_by_key(|(pos, _)| *pos);

    let mut spans = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    for (pos, is_open) in marks {
        if is_open {
            stack.push(pos);
        } else if let Some(start) = stack.pop() {
            if stack.is_empty() {
                spans.push((start, pos + "END".len()));
            }
        }
    }
    spans
}

fn inside_spans(spans: &[(usize, usize)], pos: usize) -> bool {
    spans.iter().any(|(start, end)| *start <= pos && pos < *end)
}

fn find_keyword_outside_case(expr: &str, spans: &[(usize, usize)], keyword: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(i) = find_keyword_top_level_from(expr, keyword, from) {
        if !inside_spans(spans, i) {
            return Some(i);
        }
        from = i + keyword.len();
    }
    None
}

// ============================================================================
// Logical level
// ============================================================================

fn split_keyword_operands<'t>(text: &'t str, keyword: &str) -> Vec<&'t str> {
    let spans = case_spans(text);
    let mut parts = Vec::new();
    let mut prev = 0usize;
    let mut from = 0usize;
    while let Some(i) = find_keyword_top_level_from(text, keyword, from) {
        from = i + keyword.len();
        if inside_spans(&spans, i) {
            continue;
        }
        parts.push(text[prev..i].trim());
        prev = from;
    }
    parts.push(text[prev..].trim());
    parts
}

fn eval_or(ctx: &EvalContext, expr: &str) -> Result<Value> {
    let parts = split_keyword_operands(expr, "OR");
    if parts.len() == 1 {
        return eval_xor(ctx, expr);
    }
    for part in parts {
        if eval_xor(ctx, part)?.is_truthy() {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn eval_xor(ctx: &EvalContext, expr: &str) -> Result<Value> {
    let parts = split_keyword_operands(expr, "XOR");
    if parts.len() == 1 {
        return eval_and(ctx, expr);
    }
    let mut acc = false;
    for part in parts {
        acc ^= eval_and(ctx, part)?.is_truthy();
    }
    Ok(Value::Bool(acc))
}

fn eval_and(ctx: &EvalContext, expr: &str) -> Result<Value> {
    let spans = case_spans(expr);
    // The AND that closes a BETWEEN belongs to the comparison, not here.
    let mut and_positions: Vec<usize> = Vec::new();
    let mut from = 0;
    while let Some(i) = find_keyword_top_level_from(expr, "AND", from) {
        from = i + 3;
        if !inside_spans(&spans, i) {
            and_positions.push(i);
        }
    }
    if !and_positions.is_empty() {
        let mut between_from = 0;
        while let Some(b) = find_keyword_top_level_from(expr, "BETWEEN", between_from) {
            between_from = b + "BETWEEN".len();
            if inside_spans(&spans, b) {
                continue;
            }
            if let Some(pos) = and_positions.iter().position(|&a| a > b) {
                and_positions.remove(pos);
            }
        }
    }
    if and_positions.is_empty() {
        return eval_not(ctx, expr);
    }
    let mut prev = 0usize;
    let mut parts: Vec<&str> = Vec::new();
    for &i in &and_positions {
        parts.push(expr[prev..i].trim());
        prev = i + 3;
    }
    parts.push(expr[prev..].trim());
    for part in parts {
        if !eval_not(ctx, part)?.is_truthy() {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn eval_not(ctx: &EvalContext, expr: &str) -> Result<Value> {
    if find_keyword_top_level(expr, "NOT") == Some(0) {
        let rest = expr["NOT".len()..].trim_start();
        let value = eval_not(ctx, rest)?;
        return Ok(Value::Bool(!value.is_truthy()));
    }
    eval_comparison(ctx, expr)
}

// ============================================================================
// Comparison level
// ============================================================================

fn eval_comparison(ctx: &EvalContext, expr: &str) -> Result<Value> {
    let spans = case_spans(expr);

    // Postfix null tests first: they are the only comparisons NULL passes
    if let Some(i) = find_keyword_outside_case(expr, &spans, "IS NOT NULL") {
        if expr[i + "IS NOT NULL".len()..].trim().is_empty() {
            let value = eval_additive(ctx, expr[..i].trim())?;
            return Ok(Value::Bool(!value.is_null()));
        }
    }
    if let Some(i) = find_keyword_outside_case(expr, &spans, "IS NULL") {
        if expr[i + "IS NULL".len()..].trim().is_empty() {
            let value = eval_additive(ctx, expr[..i].trim())?;
            return Ok(Value::Bool(value.is_null()));
        }
    }

    if let Some(i) = find_keyword_outside_case(expr, &spans, "BETWEEN") {
        let lhs = expr[..i].trim();
        let bounds = expr[i + "BETWEEN".len()..].trim();
        let and = find_keyword_top_level(bounds, "AND").ok_or_else(|| Error::SyntaxError {
            position: i,
            message: format!("BETWEEN requires AND (in `{expr}`)"),
        })?;
        let low = bounds[..and].trim();
        let high = bounds[and + 3..].trim();
        let value = eval_additive(ctx, lhs)?;
        let low = eval_additive(ctx, low)?;
        let high = eval_additive(ctx, high)?;
        let ge = matches!(
            value.neo4j_cmp(&low),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        );
        let le = matches!(
            value.neo4j_cmp(&high),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        );
        return Ok(Value::Bool(ge && le));
    }

    for (keyword, op) in [
        ("STARTS WITH", StringCompare::StartsWith),
        ("ENDS WITH", StringCompare::EndsWith),
        ("CONTAINS", StringCompare::Contains),
    ] {
        if let Some(i) = find_keyword_outside_case(expr, &spans, keyword) {
            let lv = eval_additive(ctx, expr[..i].trim())?;
            let rv = eval_additive(ctx, expr[i + keyword.len()..].trim())?;
            return Ok(match (&lv, &rv) {
                (Value::String(a), Value::String(b)) => Value::Bool(match op {
                    StringCompare::StartsWith => a.starts_with(b.as_str()),
                    StringCompare::EndsWith => a.ends_with(b.as_str()),
                    StringCompare::Contains => a.contains(b.as_str()),
                }),
                _ => Value::Bool(false),
            });
        }
    }

    if let Some(i) = find_keyword_outside_case(expr, &spans, "IN") {
        let item = eval_additive(ctx, expr[..i].trim())?;
        let list = eval_additive(ctx, expr[i + 2..].trim())?;
        return Ok(match (&item, &list) {
            (Value::Null, _) | (_, Value::Null) => Value::Bool(false),
            (_, Value::List(items)) => Value::Bool(items.iter().any(|v| v.cypher_eq(&item))),
            _ => Value::Bool(false),
        });
    }

    if let Some((i, op)) = find_comparison_operator(expr, &spans) {
        let lhs = expr[..i].trim();
        let rhs = expr[i + op.len()..].trim();
        let lv = eval_additive(ctx, lhs)?;
        let rv = eval_additive(ctx, rhs)?;

        if op == "=~" {
            return eval_regex_match(&lv, &rv);
        }
        if lv.is_null() || rv.is_null() {
            return Ok(Value::Bool(false));
        }
        use std::cmp::Ordering::*;
        let result = match op {
            "=" => lv.cypher_eq(&rv),
            "<>" | "!=" => !lv.cypher_eq(&rv),
            "<" => lv.neo4j_cmp(&rv) == Some(Less),
            "<=" => matches!(lv.neo4j_cmp(&rv), Some(Less | Equal)),
            ">" => lv.neo4j_cmp(&rv) == Some(Greater),
            ">=" => matches!(lv.neo4j_cmp(&rv), Some(Greater | Equal)),
            _ => false,
        };
        return Ok(Value::Bool(result));
    }

    eval_additive(ctx, expr)
}

enum StringCompare {
    StartsWith,
    EndsWith,
    Contains,
}

/// First top-level comparison operator, longest match at each position.
fn find_comparison_operator(
    expr: &str,
    spans: &[(usize, usize)],
) -> Option<(usize, &'static str)> {
    let mut best: Option<(usize, &'static str)> = None;
    for op in ["<=", ">=", "<>", "!=", "=~", "=", "<", ">"] {
        let mut from = 0;
        while let Some(i) = find_str_top_level(expr, op, from) {
            if inside_spans(spans, i) {
                from = i + op.len();
                continue;
            }
            // Skip the shorter operator inside a longer one already found
            // at the same position (e.g. `=` inside `<=` or `=~`).
            let shadowed = best.is_some_and(|(bi, bop)| bi <= i && i < bi + bop.len());
            if !shadowed {
                match best {
                    Some((bi, _)) if bi <= i => {}
                    _ => best = Some((i, op)),
                }
                break;
            }
            from = i + op.len();
        }
    }
    best
}

fn eval_regex_match(lv: &Value, rv: &Value) -> Result<Value> {
    match (lv, rv) {
        (Value::String(s), Value::String(pattern)) => {
            // Cypher `=~` is a full-string match
            let anchored = format!("^(?:{pattern})$");
            let re = regex_cache::compiled(&anchored)?;
            Ok(Value::Bool(re.is_match(s)))
        }
        _ => Ok(Value::Bool(false)),
    }
}

// ============================================================================
// Arithmetic level
// ============================================================================

/// Is the +/- at `pos` a binary operator (vs unary sign or exponent)?
fn is_binary_sign(expr: &str, pos: usize) -> bool {
    let before = expr[..pos].trim_end();
    let Some(prev) = before.chars().next_back() else {
        return false;
    };
    if "+-*/%^=<>(,[{".contains(prev) {
        return false;
    }
    // Scientific notation: 1e-5
    if (prev == 'e' || prev == 'E')
        && before.len() >= 2
        && before[..before.len() - 1].ends_with(|c: char| c.is_ascii_digit())
        && expr[pos + 1..].starts_with(|c: char| c.is_ascii_digit())
    {
        return false;
    }
    true
}

fn eval_additive(ctx: &EvalContext, expr: &str) -> Result<Value> {
    let spans = case_spans(expr);
    // Split at the last binary +/- for left associativity
    let mut split: Option<(usize, char)> = None;
    for op in ['+', '-'] {
        for pos in crate::cypher::text::top_level_positions(expr, op) {
            if inside_spans(&spans, pos) {
                continue;
            }
            if is_binary_sign(expr, pos) && split.is_none_or(|(best, _)| pos > best) {
                split = Some((pos, op));
            }
        }
    }
    let Some((pos, op)) = split else {
        return eval_multiplicative(ctx, expr);
    };
    let lv = eval_additive(ctx, expr[..pos].trim())?;
    let rv = eval_multiplicative(ctx, expr[pos + 1..].trim())?;
    if op == '+' { eval_add(&lv, &rv) } else { eval_numeric(&lv, &rv, '-') }
}

fn eval_multiplicative(ctx: &EvalContext, expr: &str) -> Result<Value> {
    let spans = case_spans(expr);
    let mut split: Option<(usize, char)> = None;
    for op in ['*', '/', '%'] {
        for pos in crate::cypher::text::top_level_positions(expr, op) {
            // A leading `*` is not an operator (RETURN *), nor one right
            // after another operator.
            if expr[..pos].trim_end().is_empty() || inside_spans(&spans, pos) {
                continue;
            }
            if is_binary_sign(expr, pos) && split.is_none_or(|(best, _)| pos > best) {
                split = Some((pos, op));
            }
        }
    }
    let Some((pos, op)) = split else {
        return eval_unary(ctx, expr);
    };
    let lv = eval_multiplicative(ctx, expr[..pos].trim())?;
    let rv = eval_unary(ctx, expr[pos + 1..].trim())?;
    eval_numeric(&lv, &rv, op)
}

fn eval_unary(ctx: &EvalContext, expr: &str) -> Result<Value> {
    if let Some(rest) = expr.strip_prefix('-') {
        let value = eval_unary(ctx, rest.trim_start())?;
        return match value {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Null => Ok(Value::Null),
            other => Err(Error::TypeError {
                expected: "numeric".into(),
                got: other.type_name().into(),
            }),
        };
    }
    if let Some(rest) = expr.strip_prefix('+') {
        return eval_unary(ctx, rest.trim_start());
    }
    eval_primary(ctx, expr)
}

fn eval_add(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 + b)),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + *b as f64)),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::String(a), b) if b.is_numeric() => Ok(Value::String(format!("{a}{b}"))),
        (a, Value::String(b)) if a.is_numeric() => Ok(Value::String(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            let mut out = a.clone();
            out.extend(b.clone());
            Ok(Value::List(out))
        }
        (Value::List(a), b) => {
            let mut out = a.clone();
            out.push(b.clone());
            Ok(Value::List(out))
        }
        _ => Err(Error::TypeError {
            expected: "compatible operands for +".into(),
            got: format!("{}, {}", left.type_name(), right.type_name()),
        }),
    }
}

fn eval_numeric(left: &Value, right: &Value, op: char) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if !left.is_numeric() || !right.is_numeric() {
        return Err(Error::TypeError {
            expected: "numeric".into(),
            got: format!("{}, {}", left.type_name(), right.type_name()),
        });
    }
    if matches!(op, '/' | '%') && right.as_float() == Some(0.0) {
        return Err(Error::TypeError {
            expected: "non-zero divisor".into(),
            got: "0".into(),
        });
    }
    // Division always yields a float, even for two integers
    if op == '/' {
        let (a, b) = (left.as_float().unwrap_or(0.0), right.as_float().unwrap_or(0.0));
        return Ok(Value::Float(a / b));
    }
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
            '-' => a - b,
            '*' => a * b,
            _ => a % b,
        })),
        _ => {
            let (a, b) = (left.as_float().unwrap_or(0.0), right.as_float().unwrap_or(0.0));
            Ok(Value::Float(match op {
                '-' => a - b,
                '*' => a * b,
                _ => a % b,
            }))
        }
    }
}

// ============================================================================
// Primary level
// ============================================================================

fn eval_primary(ctx: &EvalContext, expr: &str) -> Result<Value> {
    let expr = expr.trim();

    // Parenthesized sub-expression spanning the whole text
    if expr.starts_with('(') && matching_close(expr, 0) == Some(expr.len() - 1) {
        return evaluate(ctx, &expr[1..expr.len() - 1]);
    }

    // String literal
    if let Some(s) = decode_string_literal(expr) {
        return Ok(Value::String(s));
    }

    // Numeric literal
    if let Ok(i) = expr.parse::<i64>() {
        return Ok(Value::Int(i));
    }
    if let Ok(f) = expr.parse::<f64>() {
        if expr.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            return Ok(Value::Float(f));
        }
    }

    let upper_all = expr.to_uppercase();
    match upper_all.as_str() {
        "NULL" => return Ok(Value::Null),
        "TRUE" => return Ok(Value::Bool(true)),
        "FALSE" => return Ok(Value::Bool(false)),
        _ => {}
    }

    // CASE expression spanning the whole text
    if find_keyword_top_level(expr, "CASE") == Some(0)
        && case_spans(expr) == [(0, expr.len())]
    {
        return case::evaluate_case(ctx, expr);
    }

    // List literal or comprehension
    if expr.starts_with('[') && matching_close(expr, 0) == Some(expr.len() - 1) {
        let body = expr[1..expr.len() - 1].trim();
        if body.is_empty() {
            return Ok(Value::List(Vec::new()));
        }
        if find_keyword_top_level(body, "IN").is_some()
            && (find_char_top_level(body, '|', 0).is_some()
                || find_keyword_top_level(body, "WHERE").is_some())
        {
            return eval_list_comprehension(ctx, body);
        }
        let items = split_top_level_commas(body)
            .into_iter()
            .map(|item| evaluate(ctx, item))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Value::List(items));
    }

    // Map literal
    if expr.starts_with('{') && matching_close(expr, 0) == Some(expr.len() - 1) {
        let mut map = HashMap::new();
        for (key, raw) in parse_property_block(expr)? {
            map.insert(key, evaluate(ctx, &raw)?);
        }
        return Ok(Value::Map(map));
    }

    // Leftover parameter — substitution happens before evaluation
    if let Some(name) = expr.strip_prefix('$') {
        return Err(Error::NotFound(format!("Expected parameter(s): {name}")));
    }

    // Function call spanning the whole text
    if let Some(paren) = find_char_top_level(expr, '(', 0) {
        let name = expr[..paren].trim();
        if !name.is_empty()
            && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
            && matching_close(expr, paren) == Some(expr.len() - 1)
        {
            return functions::call(ctx, name, expr[paren + 1..expr.len() - 1].trim());
        }
    }

    // Label test: `var:Label1:Label2`
    if let Some(value) = eval_label_test(ctx, expr)? {
        return Ok(value);
    }

    // Bare variable
    if !expr.is_empty() && expr.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return match ctx.bindings.get(expr) {
            Some(value) => Ok(value.clone()),
            None => Err(Error::NotFound(format!("Variable `{expr}` not defined"))),
        };
    }

    // Postfix chain: property access and indexing
    eval_postfix_chain(ctx, expr)
}

fn eval_label_test(ctx: &EvalContext, expr: &str) -> Result<Option<Value>> {
    let mut segments = expr.split(':');
    let var = segments.next().unwrap_or("").trim();
    if var.is_empty() || !var.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Ok(None);
    }
    let labels: Vec<&str> = segments.map(str::trim).collect();
    if labels.is_empty()
        || labels
            .iter()
            .any(|l| l.is_empty() || !l.chars().all(|c| c.is_alphanumeric() || c == '_'))
    {
        return Ok(None);
    }
    match ctx.bindings.get(var) {
        Some(Value::Node(node)) => {
            Ok(Some(Value::Bool(labels.iter().all(|l| node.has_label(l)))))
        }
        Some(Value::Null) | None => Ok(Some(Value::Bool(false))),
        Some(_) => Ok(Some(Value::Bool(false))),
    }
}

// ============================================================================
// Postfix: property access, indexing, slicing
// ============================================================================

fn eval_postfix_chain(ctx: &EvalContext, expr: &str) -> Result<Value> {
    // Base ends at the first top-level `.` or `[` past position 0
    let dot = find_char_top_level(expr, '.', 1);
    let bracket = crate::cypher::text::top_level_positions(expr, '[')
        .into_iter()
        .find(|&i| i > 0);
    let split = match (dot, bracket) {
        (Some(d), Some(b)) => d.min(b),
        (Some(d), None) => d,
        (None, Some(b)) => b,
        (None, None) => {
            return Err(Error::SyntaxError {
                position: 0,
                message: format!("Unable to parse expression `{expr}`"),
            });
        }
    };

    let mut value = eval_primary(ctx, expr[..split].trim())?;
    let mut rest = &expr[split..];

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let name: String = after
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if name.is_empty() {
                return Err(Error::SyntaxError {
                    position: 0,
                    message: format!("Expected property name in `{expr}`"),
                });
            }
            value = access_property(&value, &name)?;
            rest = &after[name.len()..];
        } else if rest.starts_with('[') {
            let close = matching_close(rest, 0).ok_or_else(|| Error::SyntaxError {
                position: 0,
                message: format!("Unclosed `[` in `{expr}`"),
            })?;
            let inner = rest[1..close].trim();
            value = if let Some(range) = find_str_top_level(inner, "..", 0) {
                index_slice(ctx, &value, inner, range)?
            } else {
                index_value(&value, &evaluate(ctx, inner)?)?
            };
            rest = &rest[close + 1..];
        } else {
            return Err(Error::SyntaxError {
                position: 0,
                message: format!("Unexpected trailing input in `{expr}`"),
            });
        }
    }
    Ok(value)
}

/// Property access over every container the runtime knows: nodes (with
/// the fixed-semantic names), relationships, maps, temporal values,
/// points, durations.
pub fn access_property(value: &Value, name: &str) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Node(node) => Ok(match name {
            "id" => Value::Int(node.id.0 as i64),
            "embedding" => node.embedding_summary(),
            "has_embedding" => Value::Bool(node.has_embedding()),
            _ => node.get(name).cloned().unwrap_or(Value::Null),
        }),
        Value::Relationship(rel) => Ok(match name {
            "id" => Value::Int(rel.id.0 as i64),
            _ => rel.get(name).cloned().unwrap_or(Value::Null),
        }),
        Value::Map(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        Value::Point(p) => Ok(match name {
            "x" | "longitude" => Value::Float(p.x),
            "y" | "latitude" => Value::Float(p.y),
            "z" | "height" => p.z.map(Value::Float).unwrap_or(Value::Null),
            "srid" => Value::Int(p.srid as i64),
            _ => Value::Null,
        }),
        Value::Duration(d) => Ok(match name {
            "months" => Value::Int(d.months),
            "days" => Value::Int(d.days),
            "seconds" => Value::Int(d.seconds),
            "nanoseconds" => Value::Int(d.nanos as i64),
            _ => Value::Null,
        }),
        temporal @ (Value::Date(_)
        | Value::Time(_)
        | Value::DateTime(_)
        | Value::LocalDateTime(_)
        | Value::LocalTime(_)) => Ok(temporal.temporal_component(name).unwrap_or(Value::Null)),
        other => Err(Error::TypeError {
            expected: "a value with properties".into(),
            got: other.type_name().into(),
        }),
    }
}

fn index_value(value: &Value, index: &Value) -> Result<Value> {
    match (value, index) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::List(items), Value::Int(i)) => {
            let len = items.len() as i64;
            let idx = if *i < 0 { len + i } else { *i };
            if idx < 0 || idx >= len {
                Ok(Value::Null)
            } else {
                Ok(items[idx as usize].clone())
            }
        }
        (Value::Map(map), Value::String(key)) => {
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::Node(node), Value::String(key)) => Ok(access_property(&Value::Node(node.clone()), key)?),
        _ => Err(Error::TypeError {
            expected: "list[int] or map[string]".into(),
            got: format!("{}[{}]", value.type_name(), index.type_name()),
        }),
    }
}

fn index_slice(ctx: &EvalContext, value: &Value, inner: &str, range_at: usize) -> Result<Value> {
    let Value::List(items) = value else {
        return Err(Error::TypeError {
            expected: "list".into(),
            got: value.type_name().into(),
        });
    };
    let len = items.len() as i64;
    let resolve = |raw: &str, fallback: i64| -> Result<i64> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(fallback);
        }
        match evaluate(ctx, raw)? {
            Value::Int(i) => Ok(if i < 0 { len + i } else { i }),
            other => Err(Error::TypeError {
                expected: "integer slice bound".into(),
                got: other.type_name().into(),
            }),
        }
    };
    let start = resolve(&inner[..range_at], 0)?.clamp(0, len);
    let end = resolve(&inner[range_at + 2..], len)?.clamp(0, len);
    if start >= end {
        return Ok(Value::List(Vec::new()));
    }
    Ok(Value::List(items[start as usize..end as usize].to_vec()))
}

// ============================================================================
// List comprehension
// ============================================================================

/// `[x IN list WHERE pred | mapped]` — body arrives without brackets.
fn eval_list_comprehension(ctx: &EvalContext, body: &str) -> Result<Value> {
    let in_at = find_keyword_top_level(body, "IN").ok_or_else(|| Error::SyntaxError {
        position: 0,
        message: format!("Expected IN in list comprehension `{body}`"),
    })?;
    let var = body[..in_at].trim().to_string();
    let rest = &body[in_at + 2..];

    let pipe_at = find_char_top_level(rest, '|', 0);
    let where_at = find_keyword_top_level(rest, "WHERE");

    let list_end = match (where_at, pipe_at) {
        (Some(w), Some(p)) => w.min(p),
        (Some(w), None) => w,
        (None, Some(p)) => p,
        (None, None) => rest.len(),
    };
    let list_expr = rest[..list_end].trim();
    let predicate = where_at.map(|w| {
        let end = pipe_at.filter(|p| *p > w).unwrap_or(rest.len());
        rest[w + "WHERE".len()..end].trim()
    });
    let mapping = pipe_at.map(|p| rest[p + 1..].trim());

    let Value::List(items) = evaluate(ctx, list_expr)? else {
        return Ok(Value::Null);
    };

    let mut out = Vec::new();
    let mut scope = ctx.bindings.clone();
    for item in items {
        scope.set(var.clone(), item.clone());
        let inner = ctx.rebind(&scope);
        if let Some(pred) = predicate {
            if !evaluate(&inner, pred)?.is_truthy() {
                continue;
            }
        }
        match mapping {
            Some(map_expr) => out.push(evaluate(&inner, map_expr)?),
            None => out.push(item),
        }
    }
    Ok(Value::List(out))
}

// ============================================================================
// String literal decoding
// ============================================================================

/// Decode a quoted literal spanning the entire text; None otherwise.
/// Handles backslash escapes and doubled-quote escaping (`''` / `""`).
fn decode_string_literal(text: &str) -> Option<String> {
    let mut chars = text.chars().peekable();
    let quote = match chars.next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return None,
    };
    let mut out = String::with_capacity(text.len());
    loop {
        match chars.next() {
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some(c) => out.push(c),
                None => return None,
            },
            Some(c) if c == quote => {
                if chars.peek() == Some(&quote) {
                    out.push(quote);
                    chars.next();
                } else {
                    // Closing quote must end the text
                    return if chars.next().is_none() { Some(out) } else { None };
                }
            }
            Some(c) => out.push(c),
            None => return None,
        }
    }
}
