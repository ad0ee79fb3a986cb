//! CALL … YIELD execution.

use super::context::QueryContext;
use crate::cypher::text::{matching_close, split_top_level_commas};
use crate::eval::{self, Bindings};
use crate::model::Value;
use crate::{Error, Result};

/// Outcome of a CALL segment: the joined rows plus the column names the
/// procedure contributed (used when CALL terminates the statement).
pub struct CallOutcome {
    pub rows: Vec<Bindings>,
    pub columns: Vec<String>,
}

/// Execute `name(args) [YIELD cols]` once per input row, producing the
/// cross join of input rows with procedure rows.
pub fn execute(ctx: &QueryContext, input: Vec<Bindings>, body: &str) -> Result<CallOutcome> {
    let (call_part, yields) = split_yield(body);

    let (name, raw_args) = parse_invocation(call_part)?;
    let arg_texts: Vec<&str> = if raw_args.trim().is_empty() {
        Vec::new()
    } else {
        split_top_level_commas(raw_args)
    };

    let registry = ctx.procedures;
    let proc_ctx = ctx.procedure_context();

    let mut columns: Vec<String> = Vec::new();
    let mut out_rows: Vec<Bindings> = Vec::new();

    for row in &input {
        ctx.cancel.check()?;
        let mut args: Vec<Value> = Vec::with_capacity(arg_texts.len());
        for text in &arg_texts {
            args.push(eval::evaluate(&ctx.eval(row), text)?);
        }
        embed_query_argument(ctx, &name, &mut args)?;

        let output = registry.call(&proc_ctx, &name, &args)?;

        let selected: Vec<(usize, String)> = match &yields {
            Some(names) => {
                let mut picks = Vec::with_capacity(names.len());
                for yield_name in names {
                    let idx = output
                        .columns
                        .iter()
                        .position(|c| c == yield_name)
                        .ok_or_else(|| {
                            Error::SyntaxError {
                                position: 0,
                                message: format!(
                                    "Unknown YIELD column `{yield_name}` for procedure `{name}`"
                                ),
                            }
                        })?;
                    picks.push((idx, yield_name.clone()));
                }
                picks
            }
            None => output.columns.iter().cloned().enumerate().collect(),
        };
        if columns.is_empty() {
            columns = selected.iter().map(|(_, n)| n.clone()).collect();
        }

        for proc_row in &output.rows {
            let mut joined = row.clone();
            for (idx, col_name) in &selected {
                joined.set(
                    col_name.clone(),
                    proc_row.get(*idx).cloned().unwrap_or(Value::Null),
                );
            }
            out_rows.push(joined);
        }
    }

    Ok(CallOutcome { rows: out_rows, columns })
}

fn split_yield(body: &str) -> (&str, Option<Vec<String>>) {
    match crate::cypher::text::find_keyword_top_level(body, "YIELD") {
        Some(i) => {
            let names = split_top_level_commas(body[i + "YIELD".len()..].trim())
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            (body[..i].trim(), Some(names))
        }
        None => (body.trim(), None),
    }
}

fn parse_invocation(call_part: &str) -> Result<(String, &str)> {
    match call_part.find('(') {
        Some(paren) => {
            let close = matching_close(call_part, paren).ok_or_else(|| Error::SyntaxError {
                position: paren,
                message: format!("Unclosed argument list in CALL `{call_part}`"),
            })?;
            Ok((
                call_part[..paren].trim().to_string(),
                call_part[paren + 1..close].trim(),
            ))
        }
        None => Ok((call_part.trim().to_string(), "")),
    }
}

/// The vector query procedure accepts a text query when an embedder is
/// installed: the string argument is embedded into the query vector
/// before dispatch.
fn embed_query_argument(ctx: &QueryContext, name: &str, args: &mut [Value]) -> Result<()> {
    if name != "db.index.vector.queryNodes" {
        return Ok(());
    }
    let Some(embedder) = ctx.embedder else {
        return Ok(());
    };
    if let Some(Value::String(query_text)) = args.get(2) {
        let vector = embedder(query_text)?;
        args[2] = Value::List(vector.into_iter().map(|f| Value::Float(f as f64)).collect());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_yield() {
        let (call, yields) = split_yield("db.labels() YIELD label");
        assert_eq!(call, "db.labels()");
        assert_eq!(yields, Some(vec!["label".to_string()]));

        let (call, yields) = split_yield("db.labels()");
        assert_eq!(call, "db.labels()");
        assert_eq!(yields, None);
    }

    #[test]
    fn test_parse_invocation() {
        let (name, args) = parse_invocation("db.index.vector.queryNodes('idx', 5, [1.0])").unwrap();
        assert_eq!(name, "db.index.vector.queryNodes");
        assert_eq!(args, "'idx', 5, [1.0]");

        let (name, args) = parse_invocation("db.labels").unwrap();
        assert_eq!(name, "db.labels");
        assert_eq!(args, "");
    }
}
