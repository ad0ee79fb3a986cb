//! FOREACH execution: `FOREACH (x IN list | update clauses)`.

use super::context::QueryContext;
use crate::cypher::text::{find_char_top_level, find_keyword_top_level, matching_close};
use crate::eval::{self, Bindings};
use crate::model::Value;
use crate::{Error, Result};

/// Run the update clauses once per list element, for one input row.
/// The loop variable is scoped to the body; bindings do not leak out.
pub fn execute(ctx: &mut QueryContext, row: &Bindings, body: &str) -> Result<()> {
    let trimmed = body.trim();
    let (var, list_expr, updates) = parse_foreach(trimmed)?;

    let list = eval::evaluate(&ctx.eval(row), list_expr)?;
    let items = match list {
        Value::List(items) => items,
        Value::Null => return Ok(()),
        other => {
            return Err(Error::TypeError {
                expected: "a list in FOREACH".into(),
                got: other.type_name().into(),
            });
        }
    };

    for item in items {
        ctx.cancel.check()?;
        let mut scope = row.clone();
        scope.set(var.to_string(), item);
        super::run_update_clauses(ctx, vec![scope], updates)?;
    }
    Ok(())
}

fn parse_foreach(body: &str) -> Result<(&str, &str, &str)> {
    let syntax = |message: String| Error::SyntaxError { position: 0, message };
    if !body.starts_with('(') || matching_close(body, 0) != Some(body.len() - 1) {
        return Err(syntax(format!("FOREACH requires a parenthesized body (in `{body}`)")));
    }
    let inner = body[1..body.len() - 1].trim();
    let in_at = find_keyword_top_level(inner, "IN")
        .ok_or_else(|| syntax(format!("FOREACH requires IN (in `{inner}`)")))?;
    let var = inner[..in_at].trim();
    let rest = &inner[in_at + 2..];
    let pipe = find_char_top_level(rest, '|', 0)
        .ok_or_else(|| syntax(format!("FOREACH requires `|` (in `{inner}`)")))?;
    Ok((var, rest[..pipe].trim(), rest[pipe + 1..].trim()))
}
