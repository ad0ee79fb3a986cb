//! CASE expression evaluation, both forms:
//!
//! - simple:   `CASE expr WHEN v1 THEN r1 ... [ELSE d] END`
//! - searched: `CASE WHEN pred1 THEN r1 ... [ELSE d] END`
//!
//! Splitting is done on word-boundary WHEN/THEN/ELSE/END at depth 0,
//! respecting strings, with nested CASE expressions tracked by level so an
//! inner CASE's keywords never terminate the outer one.

use super::{EvalContext, evaluate};
use crate::cypher::text::find_keyword_top_level_from;
use crate::model::Value;
use crate::{Error, Result};

struct CaseParts<'t> {
    test: Option<&'t str>,
    whens: Vec<(&'t str, &'t str)>,
    else_expr: Option<&'t str>,
}

/// Evaluate a full `CASE ... END` expression.
pub fn evaluate_case(ctx: &EvalContext, expr: &str) -> Result<Value> {
    let parts = parse_case(expr)?;

    if let Some(test) = parts.test {
        // Simple form: evaluate the test once, compare by value equality
        let test_value = evaluate(ctx, test)?;
        for (when, then) in &parts.whens {
            let when_value = evaluate(ctx, when)?;
            if test_value.cypher_eq(&when_value) {
                return evaluate(ctx, then);
            }
        }
    } else {
        // Searched form: each WHEN is a boolean predicate
        for (when, then) in &parts.whens {
            if evaluate(ctx, when)?.is_truthy() {
                return evaluate(ctx, then);
            }
        }
    }

    match parts.else_expr {
        Some(else_expr) => evaluate(ctx, else_expr),
        None => Ok(Value::Null),
    }
}

fn parse_case(expr: &str) -> Result<CaseParts<'_>> {
    let expr = expr.trim();
    let syntax = |message: String| Error::SyntaxError { position: 0, message };

    if find_keyword_top_level_from(expr, "CASE", 0) != Some(0) {
        return Err(syntax(format!("Expected CASE at start of `{expr}`")));
    }
    let body = expr["CASE".len()..].trim();

    // Collect level-0 markers, tracking nested CASE/END pairs
    let mut markers: Vec<(usize, &'static str)> = Vec::new();
    for kw in ["CASE", "WHEN", "THEN", "ELSE", "END"] {
        let mut from = 0;
        while let Some(i) = find_keyword_top_level_from(body, kw, from) {
            markers.push((i, kw));
            from = i + kw.len();
        }
    }
    markers.sort_by_key(|(pos, _)| *pos);

    let mut level = 0i32;
    let mut outer: Vec<(usize, &'static str)> = Vec::new();
    for (pos, kw) in markers {
        match kw {
            "CASE" => level += 1,
            "END" if level > 0 => level -= 1,
            _ if level > 0 => {}
            _ => outer.push((pos, kw)),
        }
    }

    let Some(&(end_pos, "END")) = outer.last() else {
        return Err(syntax(format!("CASE without matching END in `{expr}`")));
    };
    if !body[end_pos + "END".len()..].trim().is_empty() {
        return Err(syntax(format!("Trailing input after END in `{expr}`")));
    }
    let outer = &outer[..outer.len() - 1];

    let first_when = outer
        .iter()
        .find(|(_, kw)| *kw == "WHEN")
        .map(|(pos, _)| *pos)
        .ok_or_else(|| syntax(format!("CASE without WHEN in `{expr}`")))?;
    let test = {
        let head = body[..first_when].trim();
        (!head.is_empty()).then_some(head)
    };

    let mut whens = Vec::new();
    let mut else_expr = None;
    let mut i = 0;
    while i < outer.len() {
        match outer[i] {
            (when_pos, "WHEN") => {
                let (then_pos, _) = outer
                    .get(i + 1)
                    .filter(|(_, kw)| *kw == "THEN")
                    .ok_or_else(|| syntax(format!("WHEN without THEN in `{expr}`")))?;
                let then_end = outer.get(i + 2).map(|(p, _)| *p).unwrap_or(end_pos);
                whens.push((
                    body[when_pos + "WHEN".len()..*then_pos].trim(),
                    body[*then_pos + "THEN".len()..then_end].trim(),
                ));
                i += 2;
            }
            (else_pos, "ELSE") => {
                else_expr = Some(body[else_pos + "ELSE".len()..end_pos].trim());
                i += 1;
            }
            _ => i += 1,
        }
    }

    Ok(CaseParts { test, whens, else_expr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Bindings;

    fn eval(expr: &str) -> Value {
        let bindings = Bindings::new();
        evaluate_case(&EvalContext::new(&bindings), expr).unwrap()
    }

    #[test]
    fn test_searched_case() {
        assert_eq!(
            eval("CASE WHEN 2 > 1 THEN 'big' ELSE 'small' END"),
            Value::String("big".into())
        );
        assert_eq!(
            eval("CASE WHEN 1 > 2 THEN 'big' ELSE 'small' END"),
            Value::String("small".into())
        );
    }

    #[test]
    fn test_simple_case() {
        assert_eq!(
            eval("CASE 2 WHEN 1 THEN 'one' WHEN 2 THEN 'two' ELSE 'many' END"),
            Value::String("two".into())
        );
        assert_eq!(
            eval("CASE 9 WHEN 1 THEN 'one' WHEN 2 THEN 'two' ELSE 'many' END"),
            Value::String("many".into())
        );
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(
            eval("CASE WHEN true THEN 1 WHEN true THEN 2 END"),
            Value::Int(1)
        );
    }

    #[test]
    fn test_no_match_no_else_is_null() {
        assert_eq!(eval("CASE 5 WHEN 1 THEN 'one' END"), Value::Null);
    }

    #[test]
    fn test_nested_case() {
        assert_eq!(
            eval("CASE WHEN true THEN CASE WHEN false THEN 1 ELSE 2 END ELSE 3 END"),
            Value::Int(2)
        );
    }

    #[test]
    fn test_keywords_in_strings_ignored() {
        assert_eq!(
            eval("CASE WHEN true THEN 'WHEN in a string' END"),
            Value::String("WHEN in a string".into())
        );
    }
}
