//! LOAD CSV execution.
//!
//! `LOAD CSV [WITH HEADERS] FROM 'file:///path' AS row [FIELDTERMINATOR ';']`
//! followed by the rest of the statement, which runs once per record with
//! `row` bound to a list (or a map when WITH HEADERS is given).

use super::context::QueryContext;
use super::result::ExecutionResult;
use crate::cypher::text::{find_keyword_top_level, leading_keyword};
use crate::eval::Bindings;
use crate::model::Value;
use crate::{Error, Result};

pub fn execute(ctx: &mut QueryContext, statement: &str) -> Result<ExecutionResult> {
    let spec = parse_load_csv(statement)?;

    let path = spec
        .url
        .strip_prefix("file://")
        .map(|p| p.trim_start_matches('/'))
        .map(|p| format!("/{p}"))
        .unwrap_or_else(|| spec.url.clone());
    if spec.url.starts_with("http://") || spec.url.starts_with("https://") {
        return Err(Error::UnsupportedQuery(
            "LOAD CSV from remote URLs is not supported; use file:// paths".into(),
        ));
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::StorageError(format!("Cannot read CSV `{path}`: {e}")))?;

    let mut records = parse_csv(&content, spec.terminator);
    let headers = if spec.with_headers && !records.is_empty() {
        Some(records.remove(0))
    } else {
        None
    };

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        ctx.cancel.check()?;
        let value = match &headers {
            Some(names) => Value::Map(
                names
                    .iter()
                    .cloned()
                    .zip(record.into_iter().map(Value::String))
                    .collect(),
            ),
            None => Value::List(record.into_iter().map(Value::String).collect()),
        };
        let mut bindings = Bindings::new();
        bindings.set(spec.alias.clone(), value);
        rows.push(bindings);
    }

    if spec.rest.is_empty() {
        return Ok(ExecutionResult::with_stats(ctx.stats.clone()));
    }
    super::run_pipeline(ctx, rows, &spec.rest)
}

struct LoadCsvSpec {
    with_headers: bool,
    url: String,
    alias: String,
    terminator: char,
    rest: String,
}

fn parse_load_csv(statement: &str) -> Result<LoadCsvSpec> {
    let syntax = |message: String| Error::SyntaxError { position: 0, message };

    let mut rest = statement.trim();
    if !leading_keyword(rest).eq_ignore_ascii_case("LOAD") {
        return Err(syntax("Expected LOAD CSV".into()));
    }
    rest = rest["LOAD".len()..].trim_start();
    if !leading_keyword(rest).eq_ignore_ascii_case("CSV") {
        return Err(syntax("Expected CSV after LOAD".into()));
    }
    rest = rest["CSV".len()..].trim_start();

    let with_headers = find_keyword_top_level(rest, "WITH HEADERS") == Some(0);
    if with_headers {
        rest = rest["WITH HEADERS".len()..].trim_start();
    }

    if find_keyword_top_level(rest, "FROM") != Some(0) {
        return Err(syntax("Expected FROM in LOAD CSV".into()));
    }
    rest = rest["FROM".len()..].trim_start();

    let url = parse_quoted(rest).ok_or_else(|| syntax("Expected a quoted URL in LOAD CSV".into()))?;
    rest = rest[url.len() + 2..].trim_start();

    if find_keyword_top_level(rest, "AS") != Some(0) {
        return Err(syntax("Expected AS alias in LOAD CSV".into()));
    }
    rest = rest["AS".len()..].trim_start();
    let alias: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if alias.is_empty() {
        return Err(syntax("Expected an alias after AS".into()));
    }
    rest = rest[alias.len()..].trim_start();

    let mut terminator = ',';
    if find_keyword_top_level(rest, "FIELDTERMINATOR") == Some(0) {
        rest = rest["FIELDTERMINATOR".len()..].trim_start();
        let quoted = parse_quoted(rest)
            .ok_or_else(|| syntax("Expected a quoted FIELDTERMINATOR".into()))?;
        terminator = quoted.chars().next().unwrap_or(',');
        rest = rest[quoted.len() + 2..].trim_start();
    }

    Ok(LoadCsvSpec {
        with_headers,
        url,
        alias,
        terminator,
        rest: rest.trim().to_string(),
    })
}

fn parse_quoted(text: &str) -> Option<String> {
    let mut chars = text.chars();
    let quote = chars.next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let mut out = String::new();
    for ch in chars {
        if ch == quote {
            return Some(out);
        }
        out.push(ch);
    }
    None
}

/// Minimal CSV reader: double-quoted fields with `""` escaping, custom
/// field terminator, CRLF tolerant. Blank lines are skipped.
fn parse_csv(content: &str, terminator: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();
        while let Some(ch) = chars.next() {
            if in_quotes {
                if ch == '"' {
                    if chars.peek() == Some(&'"') {
                        field.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    field.push(ch);
                }
            } else if ch == '"' && field.is_empty() {
                in_quotes = true;
            } else if ch == terminator {
                fields.push(std::mem::take(&mut field));
            } else {
                field.push(ch);
            }
        }
        fields.push(field);
        records.push(fields);
    }
    records
}
