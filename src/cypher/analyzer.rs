//! Query analysis: the cached-per-statement `QueryInfo`.
//!
//! A `QueryInfo` is produced from normalized text and owned by the plan
//! cache. It records the referenced label set (cache invalidation keys),
//! the read-only classification, and a TTL hint, and builds the
//! lightweight AST lazily under single-flight semantics — concurrent
//! `ast()` calls block on one build and then share the same `Arc`.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use super::ast::{self, Query};
use super::text;
use crate::Result;

/// TTL hint for plain data queries.
pub const DATA_TTL: Duration = Duration::from_secs(60);
/// TTL hint for schema and SHOW queries, which change rarely.
pub const SCHEMA_TTL: Duration = Duration::from_secs(300);

/// Cached analysis of one normalized statement.
pub struct QueryInfo {
    text: String,
    labels: BTreeSet<String>,
    read_only: bool,
    ttl: Duration,
    ast: OnceLock<Result<Arc<Query>>>,
}

impl QueryInfo {
    /// Analyze normalized text. Cheap — the AST is not built here.
    pub fn analyze(normalized: &str) -> Self {
        let leading = text::leading_keyword(normalized);
        let ttl = if matches!(leading.as_str(), "SHOW" | "DROP")
            || (leading == "CREATE"
                && (text::contains_keyword(normalized, "INDEX")
                    || text::contains_keyword(normalized, "CONSTRAINT")))
        {
            SCHEMA_TTL
        } else {
            DATA_TTL
        };
        Self {
            text: normalized.to_string(),
            labels: extract_labels(normalized),
            read_only: ast::classify_read_only(normalized),
            ttl,
            ast: OnceLock::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Labels the statement reads or writes, for cache invalidation.
    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The lazily built AST. Identity-stable: every call returns the same
    /// `Arc` for the lifetime of this `QueryInfo`, and the builder runs at
    /// most once even under concurrent callers.
    pub fn ast(&self) -> Result<Arc<Query>> {
        self.ast
            .get_or_init(|| ast::build_query(&self.text).map(Arc::new))
            .clone()
    }
}

impl std::fmt::Debug for QueryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryInfo")
            .field("text", &self.text)
            .field("labels", &self.labels)
            .field("read_only", &self.read_only)
            .finish()
    }
}

/// Bracket-aware label scan.
///
/// A `:Identifier` names a node label when the innermost open bracket is a
/// parenthesis (node pattern) or when it appears outside all brackets
/// (`WHERE n:Person`). Inside `[` it is a relationship type and inside `{`
/// a map key, neither of which participates in label-scoped invalidation.
pub fn extract_labels(text: &str) -> BTreeSet<String> {
    let mut labels = BTreeSet::new();
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' | '[' | '{' => stack.push(ch),
            ')' | ']' | '}' => {
                stack.pop();
            }
            ':' => {
                let in_node_context = matches!(stack.last(), None | Some('('));
                if !in_node_context {
                    continue;
                }
                let mut label = String::new();
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        label.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if !label.is_empty() && !label.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                    labels.insert(label);
                }
            }
            _ => {}
        }
    }
    labels
}
