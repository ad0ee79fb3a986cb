//! Lexical utilities for clause routing.
//!
//! The router and executors work on raw query text; every scan here is
//! string-literal aware (single and double quotes, backslash escapes) and,
//! where noted, bracket-depth aware. Keywords match case-insensitively on
//! word boundaries. Multi-word keywords ("ORDER BY", "DETACH DELETE") are
//! matched against whitespace-normalized text, which the engine produces
//! once per statement before routing.

use std::collections::HashMap;

use crate::model::Value;
use crate::{Error, Result};

/// Scanner state threaded through every text walk: are we inside a quoted
/// string, and how deep inside (), [], {} are we.
#[derive(Debug, Clone, Copy, Default)]
struct ScanState {
    quote: Option<char>,
    escaped: bool,
    depth: i32,
}

impl ScanState {
    fn in_string(&self) -> bool {
        self.quote.is_some()
    }

    /// Advance past `ch`. Call after inspecting the position.
    fn advance(&mut self, ch: char) {
        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if ch == '\\' {
                self.escaped = true;
            } else if ch == q {
                self.quote = None;
            }
            return;
        }
        match ch {
            '\'' | '"' => self.quote = Some(ch),
            '(' | '[' | '{' => self.depth += 1,
            ')' | ']' | '}' => self.depth -= 1,
            _ => {}
        }
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Case-insensitive keyword match at byte offset `at`, with word
/// boundaries on both sides. A space in `keyword` matches exactly one
/// space in the text.
fn keyword_at(text: &str, at: usize, keyword: &str) -> bool {
    let rest = &text[at..];
    if rest.len() < keyword.len() {
        return false;
    }
    if !rest
        .chars()
        .zip(keyword.chars())
        .take(keyword.chars().count())
        .all(|(a, b)| a.eq_ignore_ascii_case(&b))
    {
        return false;
    }
    if at > 0 {
        if let Some(prev) = text[..at].chars().next_back() {
            if is_word_char(prev) {
                return false;
            }
        }
    }
    match rest[keyword.len()..].chars().next() {
        Some(next) => !is_word_char(next),
        None => true,
    }
}

fn find_keyword_impl(text: &str, keyword: &str, start: usize, top_level_only: bool) -> Option<usize> {
    let mut state = ScanState::default();
    for (i, ch) in text.char_indices() {
        if i >= start
            && !state.in_string()
            && (!top_level_only || state.depth == 0)
            && keyword_at(text, i, keyword)
        {
            return Some(i);
        }
        state.advance(ch);
    }
    None
}

/// First occurrence of `keyword` outside string literals, at any depth.
pub fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    find_keyword_impl(text, keyword, 0, false)
}

pub fn find_keyword_from(text: &str, keyword: &str, start: usize) -> Option<usize> {
    find_keyword_impl(text, keyword, start, false)
}

/// First occurrence outside strings *and* outside any brackets. Clause
/// routing uses this form so that e.g. WHERE inside a list comprehension
/// is not mistaken for the clause.
pub fn find_keyword_top_level(text: &str, keyword: &str) -> Option<usize> {
    find_keyword_impl(text, keyword, 0, true)
}

pub fn find_keyword_top_level_from(text: &str, keyword: &str, start: usize) -> Option<usize> {
    find_keyword_impl(text, keyword, start, true)
}

pub fn contains_keyword(text: &str, keyword: &str) -> bool {
    find_keyword(text, keyword).is_some()
}

/// Split around the first top-level occurrence: (before, after-keyword).
pub fn split_by_keyword<'a>(text: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    find_keyword_top_level(text, keyword)
        .map(|i| (text[..i].trim(), text[i + keyword.len()..].trim()))
}

/// Split the text into segments separated by top-level occurrences of the
/// keyword. The keyword itself is dropped.
pub fn split_all_by_keyword<'a>(text: &'a str, keyword: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(i) = find_keyword_top_level(rest, keyword) {
        parts.push(rest[..i].trim());
        rest = &rest[i + keyword.len()..];
    }
    parts.push(rest.trim());
    parts
}

/// Split on commas at depth 0, outside strings. Empty segments are kept —
/// callers treat them as syntax errors.
pub fn split_top_level_commas(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut state = ScanState::default();
    let mut seg_start = 0usize;
    for (i, ch) in text.char_indices() {
        if ch == ',' && !state.in_string() && state.depth == 0 {
            parts.push(text[seg_start..i].trim());
            seg_start = i + 1;
        }
        state.advance(ch);
    }
    parts.push(text[seg_start..].trim());
    parts
}

/// Find a substring at depth 0 outside strings, with no word-boundary
/// requirement (operator search: `<=`, `=~`, `..`).
pub fn find_str_top_level(text: &str, pat: &str, start: usize) -> Option<usize> {
    let mut state = ScanState::default();
    for (i, ch) in text.char_indices() {
        if i >= start
            && !state.in_string()
            && state.depth == 0
            && text[i..].starts_with(pat)
        {
            return Some(i);
        }
        state.advance(ch);
    }
    None
}

/// All depth-0, outside-string positions of a character.
pub fn top_level_positions(text: &str, target: char) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut from = 0;
    while let Some(i) = find_char_top_level(text, target, from) {
        positions.push(i);
        from = i + target.len_utf8();
    }
    positions
}

/// Find a single character at depth 0 outside strings.
pub fn find_char_top_level(text: &str, target: char, start: usize) -> Option<usize> {
    let mut state = ScanState::default();
    for (i, ch) in text.char_indices() {
        if i >= start && ch == target && !state.in_string() && state.depth == 0 {
            return Some(i);
        }
        state.advance(ch);
    }
    None
}

/// Index of the bracket closing the one at `open`, honoring strings and
/// nesting. `open` must point at one of `(`, `[`, `{`.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    let open_ch = text[open..].chars().next()?;
    let close_ch = match open_ch {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        _ => return None,
    };
    let mut state = ScanState::default();
    let mut level = 0i32;
    for (i, ch) in text.char_indices() {
        if i < open {
            state.advance(ch);
            continue;
        }
        if !state.in_string() {
            if ch == open_ch {
                level += 1;
            } else if ch == close_ch {
                level -= 1;
                if level == 0 {
                    return Some(i);
                }
            }
        }
        state.advance(ch);
    }
    None
}

/// Integer literal following the keyword (`LIMIT 5`, `SKIP 10`).
fn extract_count_after(text: &str, keyword: &str) -> Result<Option<usize>> {
    let Some(i) = find_keyword_top_level(text, keyword) else {
        return Ok(None);
    };
    let rest = text[i + keyword.len()..].trim_start();
    let token: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
    token
        .parse::<usize>()
        .map(Some)
        .map_err(|_| Error::SyntaxError {
            position: i,
            message: format!("Expected a non-negative integer after {keyword}, got `{token}`"),
        })
}

pub fn extract_limit(text: &str) -> Result<Option<usize>> {
    extract_count_after(text, "LIMIT")
}

pub fn extract_skip(text: &str) -> Result<Option<usize>> {
    extract_count_after(text, "SKIP")
}

/// Validate quotes and brackets balance. Unbalanced punctuation is a
/// statement-fatal syntax error.
pub fn check_balanced(text: &str) -> Result<()> {
    let mut state = ScanState::default();
    let mut stack: Vec<(char, usize)> = Vec::new();
    for (i, ch) in text.char_indices() {
        if !state.in_string() {
            match ch {
                '(' | '[' | '{' => stack.push((ch, i)),
                ')' | ']' | '}' => {
                    let expected = match ch {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match stack.pop() {
                        Some((open, _)) if open == expected => {}
                        _ => {
                            return Err(Error::SyntaxError {
                                position: i,
                                message: format!("Unbalanced `{ch}`"),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        state.advance(ch);
    }
    if state.in_string() {
        return Err(Error::SyntaxError {
            position: text.len(),
            message: "Unterminated string literal".into(),
        });
    }
    if let Some((open, pos)) = stack.pop() {
        return Err(Error::SyntaxError {
            position: pos,
            message: format!("Unclosed `{open}`"),
        });
    }
    Ok(())
}

/// Collapse whitespace runs outside string literals to a single space and
/// trim the ends. Cache keys and keyword probing both rely on this.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = ScanState::default();
    let mut pending_space = false;
    for ch in text.chars() {
        if !state.in_string() && ch.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(ch);
        }
        state.advance(ch);
    }
    out
}

/// First word of the text, uppercased — the routing key.
pub fn leading_keyword(text: &str) -> String {
    text.trim_start()
        .chars()
        .take_while(|c| is_word_char(*c))
        .collect::<String>()
        .to_uppercase()
}

// ============================================================================
// Parameter substitution
// ============================================================================

/// Replace `$name` occurrences outside string literals with Cypher literal
/// encodings of the parameter values.
///
/// Runs *after* clause routing so that keyword tokens inside parameter
/// values cannot be misclassified, and `$name` inside a quoted literal is
/// preserved byte-for-byte.
pub fn substitute_parameters(text: &str, params: &HashMap<String, Value>) -> Result<String> {
    let mut out = String::with_capacity(text.len() * 2);
    let mut state = ScanState::default();
    let mut chars = text.char_indices().peekable();
    while let Some((_, ch)) = chars.next() {
        if ch == '$' && !state.in_string() {
            let mut name = String::new();
            while let Some(&(_, next)) = chars.peek() {
                if is_word_char(next) {
                    name.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                out.push('$');
            } else {
                match params.get(&name) {
                    Some(value) => out.push_str(&encode_cypher_literal(value)),
                    None => {
                        return Err(Error::NotFound(format!("Expected parameter(s): {name}")));
                    }
                }
            }
            continue;
        }
        out.push(ch);
        state.advance(ch);
    }
    Ok(out)
}

/// Stable Cypher literal encoding of a runtime value: integers as digits,
/// floats with round-trip precision, strings single-quoted with `'` → `''`,
/// booleans lowercase, null as NULL, lists and maps recursively.
pub fn encode_cypher_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{f:?}"),
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''")),
        Value::List(items) => {
            let encoded: Vec<String> = items.iter().map(encode_cypher_literal).collect();
            format!("[{}]", encoded.join(", "))
        }
        Value::Map(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let encoded: Vec<String> = keys
                .iter()
                .map(|k| format!("{k}: {}", encode_cypher_literal(&map[*k])))
                .collect();
            format!("{{{}}}", encoded.join(", "))
        }
        // Temporal, spatial, and graph values have no literal form; they
        // round-trip through their string rendering.
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}
