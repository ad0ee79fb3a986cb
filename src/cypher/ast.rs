//! Lightweight Cypher AST.
//!
//! The pipeline executes from text; this AST exists for analysis — cache
//! invalidation, EXPLAIN operator trees, read-only classification. It is
//! built on demand from normalized text and intentionally shallow:
//! expressions are shape-classified, with anything deeper kept as raw
//! text for the evaluator.

use super::pattern::{self, PathPattern};
use super::text;
use crate::{Error, Result};

/// Coarse statement classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Match,
    Create,
    Merge,
    Delete,
    Set,
    Remove,
    Unwind,
    With,
    Return,
    Call,
    Foreach,
    Load,
    Show,
    Schema,
    Union,
    Other,
}

/// A complete analyzed statement: ordered clause list plus classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
    pub query_type: QueryType,
    pub is_read_only: bool,
}

/// One top-level clause with its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match { optional: bool, patterns: Vec<PathPattern> },
    Create { patterns: Vec<PathPattern> },
    Merge { pattern: PathPattern },
    Where(AstExpression),
    With { items: Vec<ProjectionItem> },
    Return { distinct: bool, items: Vec<ProjectionItem> },
    Delete { detach: bool, targets: Vec<String> },
    Set { assignments: Vec<String> },
    Remove { targets: Vec<String> },
    Unwind { expression: AstExpression, alias: String },
    Call { procedure: String, arguments: Vec<AstExpression>, yields: Vec<String> },
    OrderBy { keys: Vec<(AstExpression, bool)> },
    Skip(usize),
    Limit(usize),
}

/// A projected column: expression plus optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    pub expression: AstExpression,
    pub alias: Option<String>,
    /// Original text, used as the column name when no alias is given.
    pub text: String,
}

/// Shape-classified expression. `Raw` covers every form the shallow
/// classifier does not decompose (operators, CASE bodies, comprehensions).
#[derive(Debug, Clone, PartialEq)]
pub enum AstExpression {
    Literal(LiteralKind),
    Parameter(String),
    Variable(String),
    Property { variable: String, name: String },
    Function { name: String, distinct: bool, args: Vec<AstExpression> },
    List(Vec<AstExpression>),
    Map(Vec<(String, AstExpression)>),
    Case(String),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralKind {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AstExpression {
    /// Classify the top-level shape of an expression without evaluating it.
    pub fn classify(expr: &str) -> AstExpression {
        let trimmed = expr.trim();
        let upper = trimmed.to_uppercase();

        if upper == "NULL" {
            return AstExpression::Literal(LiteralKind::Null);
        }
        if upper == "TRUE" {
            return AstExpression::Literal(LiteralKind::Bool(true));
        }
        if upper == "FALSE" {
            return AstExpression::Literal(LiteralKind::Bool(false));
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return AstExpression::Literal(LiteralKind::Int(i));
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return AstExpression::Literal(LiteralKind::Float(f));
        }
        if trimmed.len() >= 2
            && (trimmed.starts_with('\'') && trimmed.ends_with('\'')
                || trimmed.starts_with('"') && trimmed.ends_with('"'))
            && text::find_char_top_level(&trimmed[1..trimmed.len() - 1], ' ', 0).is_none()
        {
            return AstExpression::Literal(LiteralKind::String(
                trimmed[1..trimmed.len() - 1].to_string(),
            ));
        }
        if let Some(name) = trimmed.strip_prefix('$') {
            if name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return AstExpression::Parameter(name.to_string());
            }
        }
        if upper.starts_with("CASE") && upper.ends_with("END") {
            return AstExpression::Case(trimmed.to_string());
        }
        if trimmed.starts_with('[')
            && text::matching_close(trimmed, 0) == Some(trimmed.len() - 1)
            && !text::contains_keyword(trimmed, "IN")
        {
            let body = trimmed[1..trimmed.len() - 1].trim();
            if body.is_empty() {
                return AstExpression::List(Vec::new());
            }
            return AstExpression::List(
                text::split_top_level_commas(body)
                    .into_iter()
                    .map(AstExpression::classify)
                    .collect(),
            );
        }
        if trimmed.starts_with('{') && text::matching_close(trimmed, 0) == Some(trimmed.len() - 1) {
            if let Ok(props) = pattern::parse_property_block(trimmed) {
                return AstExpression::Map(
                    props
                        .into_iter()
                        .map(|(k, v)| (k, AstExpression::classify(&v)))
                        .collect(),
                );
            }
        }
        // name(args) — possibly dotted, possibly DISTINCT inside
        if let Some(paren) = trimmed.find('(') {
            let name = trimmed[..paren].trim();
            if !name.is_empty()
                && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
                && text::matching_close(trimmed, paren) == Some(trimmed.len() - 1)
            {
                let inner = trimmed[paren + 1..trimmed.len() - 1].trim();
                let (distinct, inner) = match text::find_keyword(inner, "DISTINCT") {
                    Some(0) => (true, inner["DISTINCT".len()..].trim_start()),
                    _ => (false, inner),
                };
                let args = if inner.is_empty() || inner == "*" {
                    Vec::new()
                } else {
                    text::split_top_level_commas(inner)
                        .into_iter()
                        .map(AstExpression::classify)
                        .collect()
                };
                return AstExpression::Function {
                    name: name.to_string(),
                    distinct,
                    args,
                };
            }
        }
        // var.prop
        if let Some((var, prop)) = trimmed.split_once('.') {
            if !var.is_empty()
                && var.chars().all(|c| c.is_alphanumeric() || c == '_')
                && !prop.is_empty()
                && prop.chars().all(|c| c.is_alphanumeric() || c == '_')
            {
                return AstExpression::Property {
                    variable: var.to_string(),
                    name: prop.to_string(),
                };
            }
        }
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return AstExpression::Variable(trimmed.to_string());
        }
        AstExpression::Raw(trimmed.to_string())
    }
}

// ============================================================================
// Builder
// ============================================================================

const CLAUSE_KEYWORDS: &[&str] = &[
    "OPTIONAL MATCH",
    "MATCH",
    "CREATE",
    "MERGE",
    "WHERE",
    "WITH",
    "RETURN",
    "DETACH DELETE",
    "DELETE",
    "SET",
    "REMOVE",
    "UNWIND",
    "CALL",
    "FOREACH",
    "ORDER BY",
    "SKIP",
    "LIMIT",
];

/// Split normalized text into (keyword, body) clause segments in source
/// order. Keywords are matched at depth 0 only, so pattern interiors and
/// comprehensions cannot produce phantom clauses.
pub fn split_clauses(text: &str) -> Vec<(String, String)> {
    // `ON CREATE SET` / `ON MATCH SET` belong to MERGE, not to the CREATE,
    // MATCH, or SET clauses.
    let preceded_by = |i: usize, words: &[&str]| {
        let head = text[..i].trim_end();
        words.iter().any(|w| {
            head.len() >= w.len()
                && head[head.len() - w.len()..].eq_ignore_ascii_case(w)
                && head[..head.len() - w.len()].ends_with([' ', ')', ']', '}'])
        })
    };
    let mut marks: Vec<(usize, &str)> = Vec::new();
    for kw in CLAUSE_KEYWORDS.iter().copied() {
        let mut from = 0;
        while let Some(i) = text::find_keyword_top_level_from(text, kw, from) {
            from = i + kw.len();
            match kw {
                "CREATE" | "MATCH" if preceded_by(i, &["ON"]) => continue,
                "SET" if preceded_by(i, &["ON CREATE", "ON MATCH"]) => continue,
                _ => {}
            }
            // Longer keyword containing this position already recorded
            // ("OPTIONAL MATCH" vs "MATCH", "DETACH DELETE" vs "DELETE")
            if !marks.iter().any(|(pos, existing)| {
                *pos <= i && i < pos + existing.len()
            }) {
                marks.push((i, kw));
            }
        }
    }
    marks.sort_by_key(|(pos, _)| *pos);

    let mut out = Vec::new();
    for (idx, (pos, kw)) in marks.iter().enumerate() {
        let body_start = pos + kw.len();
        let body_end = marks.get(idx + 1).map(|(next, _)| *next).unwrap_or(text.len());
        out.push((
            kw.to_string(),
            text[body_start..body_end].trim().to_string(),
        ));
    }
    out
}

/// Build the lightweight AST for a normalized statement.
pub fn build_query(text: &str) -> Result<Query> {
    text::check_balanced(text)?;
    let is_read_only = classify_read_only(text);
    let leading = text::leading_keyword(text);
    let query_type = match leading.as_str() {
        "MATCH" | "OPTIONAL" => QueryType::Match,
        "CREATE" => {
            if text::find_keyword(text, "INDEX").is_some()
                || text::find_keyword(text, "CONSTRAINT").is_some()
            {
                QueryType::Schema
            } else {
                QueryType::Create
            }
        }
        "MERGE" => QueryType::Merge,
        "DELETE" | "DETACH" => QueryType::Delete,
        "SET" => QueryType::Set,
        "REMOVE" => QueryType::Remove,
        "UNWIND" => QueryType::Unwind,
        "WITH" => QueryType::With,
        "RETURN" => QueryType::Return,
        "CALL" => QueryType::Call,
        "FOREACH" => QueryType::Foreach,
        "LOAD" => QueryType::Load,
        "SHOW" => QueryType::Show,
        "DROP" => QueryType::Schema,
        _ => QueryType::Other,
    };
    let query_type = if text::find_keyword_top_level(text, "UNION").is_some() {
        QueryType::Union
    } else {
        query_type
    };

    let mut clauses = Vec::new();
    for (keyword, body) in split_clauses(text) {
        let clause = match keyword.as_str() {
            "MATCH" | "OPTIONAL MATCH" => {
                let pattern_text = match text::find_keyword_top_level(&body, "WHERE") {
                    Some(i) => body[..i].trim(),
                    None => body.as_str(),
                };
                let patterns = pattern::split_patterns(pattern_text)
                    .into_iter()
                    .filter(|p| !p.is_empty())
                    .map(pattern::parse_path_pattern)
                    .collect::<Result<Vec<_>>>()?;
                Clause::Match { optional: keyword == "OPTIONAL MATCH", patterns }
            }
            "CREATE" => {
                if query_type == QueryType::Schema {
                    continue;
                }
                let patterns = pattern::split_patterns(&body)
                    .into_iter()
                    .filter(|p| !p.is_empty())
                    .map(pattern::parse_path_pattern)
                    .collect::<Result<Vec<_>>>()?;
                Clause::Create { patterns }
            }
            "MERGE" => {
                let pattern_text = match text::find_keyword_top_level(&body, "ON") {
                    Some(i) => body[..i].trim(),
                    None => body.as_str(),
                };
                Clause::Merge { pattern: pattern::parse_path_pattern(pattern_text)? }
            }
            "WHERE" => Clause::Where(AstExpression::classify(&body)),
            "WITH" => Clause::With { items: parse_projection_items(&body) },
            "RETURN" => {
                let (distinct, rest) = match text::find_keyword(&body, "DISTINCT") {
                    Some(0) => (true, body["DISTINCT".len()..].trim()),
                    _ => (false, body.as_str()),
                };
                Clause::Return { distinct, items: parse_projection_items(rest) }
            }
            "DELETE" | "DETACH DELETE" => Clause::Delete {
                detach: keyword == "DETACH DELETE",
                targets: text::split_top_level_commas(&body)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            },
            "SET" => Clause::Set {
                assignments: text::split_top_level_commas(&body)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            },
            "REMOVE" => Clause::Remove {
                targets: text::split_top_level_commas(&body)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            },
            "UNWIND" => {
                let (expr, alias) = text::split_by_keyword(&body, "AS").ok_or_else(|| {
                    Error::SyntaxError {
                        position: 0,
                        message: format!("UNWIND requires AS alias (in `{body}`)"),
                    }
                })?;
                Clause::Unwind {
                    expression: AstExpression::classify(expr),
                    alias: alias.to_string(),
                }
            }
            "CALL" => {
                let (call_part, yields) = match text::split_by_keyword(&body, "YIELD") {
                    Some((c, y)) => (
                        c.to_string(),
                        text::split_top_level_commas(y)
                            .into_iter()
                            .map(str::to_string)
                            .collect(),
                    ),
                    None => (body.clone(), Vec::new()),
                };
                let (procedure, arguments) = match call_part.find('(') {
                    Some(paren) => {
                        let name = call_part[..paren].trim().to_string();
                        let close = text::matching_close(&call_part, paren).ok_or_else(|| {
                            Error::SyntaxError {
                                position: paren,
                                message: "Unclosed procedure argument list".into(),
                            }
                        })?;
                        let inner = call_part[paren + 1..close].trim();
                        let args = if inner.is_empty() {
                            Vec::new()
                        } else {
                            text::split_top_level_commas(inner)
                                .into_iter()
                                .map(AstExpression::classify)
                                .collect()
                        };
                        (name, args)
                    }
                    None => (call_part.trim().to_string(), Vec::new()),
                };
                Clause::Call { procedure, arguments, yields }
            }
            "ORDER BY" => {
                let keys = text::split_top_level_commas(&body)
                    .into_iter()
                    .map(|item| {
                        let upper = item.to_ascii_uppercase();
                        if upper.ends_with(" DESC") {
                            (AstExpression::classify(item[..item.len() - 5].trim()), false)
                        } else if upper.ends_with(" ASC") {
                            (AstExpression::classify(item[..item.len() - 4].trim()), true)
                        } else {
                            (AstExpression::classify(item), true)
                        }
                    })
                    .collect();
                Clause::OrderBy { keys }
            }
            "SKIP" => {
                let n = body
                    .split_whitespace()
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| Error::SyntaxError {
                        position: 0,
                        message: format!("Invalid SKIP count `{body}`"),
                    })?;
                Clause::Skip(n)
            }
            "LIMIT" => {
                let n = body
                    .split_whitespace()
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| Error::SyntaxError {
                        position: 0,
                        message: format!("Invalid LIMIT count `{body}`"),
                    })?;
                Clause::Limit(n)
            }
            // FOREACH bodies are executed textually; the AST only records
            // presence, which the analyzer does not currently need.
            _ => continue,
        };
        clauses.push(clause);
    }

    Ok(Query { clauses, query_type, is_read_only })
}

fn parse_projection_items(body: &str) -> Vec<ProjectionItem> {
    text::split_top_level_commas(body)
        .into_iter()
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (expr, alias) = match text::split_by_keyword(item, "AS") {
                Some((e, a)) => (e.to_string(), Some(a.to_string())),
                None => (item.to_string(), None),
            };
            ProjectionItem {
                expression: AstExpression::classify(&expr),
                alias,
                text: expr,
            }
        })
        .collect()
}

/// A statement is read-only iff no write keyword appears outside string
/// literals.
pub fn classify_read_only(text: &str) -> bool {
    const WRITE_KEYWORDS: &[&str] = &["CREATE", "MERGE", "DELETE", "SET", "REMOVE", "DROP"];
    !WRITE_KEYWORDS
        .iter()
        .copied()
        .any(|kw| text::contains_keyword(text, kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_literals() {
        assert_eq!(AstExpression::classify("42"), AstExpression::Literal(LiteralKind::Int(42)));
        assert_eq!(
            AstExpression::classify("3.5"),
            AstExpression::Literal(LiteralKind::Float(3.5))
        );
        assert_eq!(
            AstExpression::classify("'hi'"),
            AstExpression::Literal(LiteralKind::String("hi".into()))
        );
        assert_eq!(AstExpression::classify("null"), AstExpression::Literal(LiteralKind::Null));
    }

    #[test]
    fn test_classify_property_and_variable() {
        assert_eq!(
            AstExpression::classify("n.name"),
            AstExpression::Property { variable: "n".into(), name: "name".into() }
        );
        assert_eq!(AstExpression::classify("n"), AstExpression::Variable("n".into()));
    }

    #[test]
    fn test_classify_function() {
        match AstExpression::classify("count(DISTINCT n)") {
            AstExpression::Function { name, distinct, args } => {
                assert_eq!(name, "count");
                assert!(distinct);
                assert_eq!(args, vec![AstExpression::Variable("n".into())]);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_dotted_function() {
        match AstExpression::classify("vector.similarity.cosine(a, b)") {
            AstExpression::Function { name, .. } => {
                assert_eq!(name, "vector.similarity.cosine");
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn test_split_clauses_order() {
        let clauses =
            split_clauses("MATCH (n:Person) WHERE n.age > 21 RETURN n.name ORDER BY n.age LIMIT 5");
        let keywords: Vec<&str> = clauses.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keywords, vec!["MATCH", "WHERE", "RETURN", "ORDER BY", "LIMIT"]);
    }

    #[test]
    fn test_split_clauses_optional_match_not_double_counted() {
        let clauses = split_clauses("MATCH (f:File) OPTIONAL MATCH (f)-[:HAS]->(c) RETURN f, c");
        let keywords: Vec<&str> = clauses.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keywords, vec!["MATCH", "OPTIONAL MATCH", "RETURN"]);
    }

    #[test]
    fn test_build_query_read_classification() {
        let q = build_query("MATCH (n:Person) RETURN n").unwrap();
        assert!(q.is_read_only);
        assert_eq!(q.query_type, QueryType::Match);

        let q = build_query("CREATE (n:Person)").unwrap();
        assert!(!q.is_read_only);
        assert_eq!(q.query_type, QueryType::Create);
    }

    #[test]
    fn test_read_only_ignores_keywords_in_strings() {
        assert!(classify_read_only("MATCH (n) WHERE n.name = 'CREATE me' RETURN n"));
        assert!(!classify_read_only("MATCH (n) SET n.x = 1"));
    }

    #[test]
    fn test_build_query_patterns() {
        let q = build_query("MATCH (a:Person)-[:KNOWS]->(b) RETURN a, b").unwrap();
        match &q.clauses[0] {
            Clause::Match { optional, patterns } => {
                assert!(!optional);
                assert_eq!(patterns.len(), 1);
                assert_eq!(patterns[0].parts.len(), 3);
            }
            other => panic!("expected match clause, got {other:?}"),
        }
    }

    #[test]
    fn test_unbalanced_is_syntax_error() {
        assert!(build_query("MATCH (n RETURN n").is_err());
    }
}
