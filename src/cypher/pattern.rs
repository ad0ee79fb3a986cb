//! Pattern parsing: node patterns, relationship patterns, property maps.
//!
//! Parsing is done by explicit bracket-depth tracking — nested property
//! maps, lists, and quoted strings rule out anything regex-shaped.
//! Property values are kept as raw expression text; the evaluator turns
//! them into runtime values at execution time, which is what lets a value
//! be a literal, a list, a nested map, or a function call.

use smallvec::SmallVec;

use super::text::{find_char_top_level, matching_close, split_top_level_commas};
use crate::{Error, Result};

/// Parsed `(v:Label1:Label2 {props})`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: SmallVec<[String; 2]>,
    /// (key, raw value text) in source order.
    pub properties: Vec<(String, String)>,
}

/// Parsed `-[r:TYPE1|TYPE2 *min..max {props}]->` (either direction, or
/// undirected).
#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub variable: Option<String>,
    pub rel_types: Vec<String>,
    pub direction: PatternDirection,
    pub properties: Vec<(String, String)>,
    pub var_length: Option<VarLength>,
}

/// Pattern direction as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternDirection {
    /// `->`
    Right,
    /// `<-`
    Left,
    /// `-`
    Undirected,
}

/// Variable-length bounds `*min..max`; both ends optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarLength {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

/// One element of a path pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PatternPart {
    Node(NodePattern),
    Rel(RelPattern),
}

/// A full path pattern: alternating nodes and relationships, optionally
/// bound to a path variable (`p = (a)-[:T]->(b)`).
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub path_var: Option<String>,
    pub parts: Vec<PatternPart>,
}

impl PathPattern {
    pub fn is_node_only(&self) -> bool {
        self.parts.len() == 1
    }

    pub fn node_patterns(&self) -> impl Iterator<Item = &NodePattern> {
        self.parts.iter().filter_map(|p| match p {
            PatternPart::Node(n) => Some(n),
            PatternPart::Rel(_) => None,
        })
    }
}

fn syntax_error(fragment: &str, message: impl Into<String>) -> Error {
    Error::SyntaxError {
        position: 0,
        message: format!("{} (in `{}`)", message.into(), fragment.trim()),
    }
}

/// Split a comma-separated pattern list at depth 0.
pub fn split_patterns(text: &str) -> Vec<&str> {
    split_top_level_commas(text)
}

/// Parse the inside of a `{...}` property block into (key, raw value)
/// pairs. `text` includes the braces.
pub fn parse_property_block(text: &str) -> Result<Vec<(String, String)>> {
    let trimmed = text.trim();
    if !trimmed.starts_with('{') {
        return Err(syntax_error(text, "Expected `{` to open a property map"));
    }
    let close = matching_close(trimmed, 0)
        .ok_or_else(|| syntax_error(text, "Unclosed property map"))?;
    let body = trimmed[1..close].trim();
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let mut props = Vec::new();
    for entry in split_top_level_commas(body) {
        let colon = find_char_top_level(entry, ':', 0)
            .ok_or_else(|| syntax_error(entry, "Expected `key: value` in property map"))?;
        let key = entry[..colon].trim();
        let value = entry[colon + 1..].trim();
        if key.is_empty() || value.is_empty() {
            return Err(syntax_error(entry, "Empty key or value in property map"));
        }
        let key = key.trim_matches('`');
        props.push((key.to_string(), value.to_string()));
    }
    Ok(props)
}

/// Parse `(v:Label1:Label2 {props})`. `text` includes the parentheses.
pub fn parse_node_pattern(text: &str) -> Result<NodePattern> {
    let trimmed = text.trim();
    if !trimmed.starts_with('(') {
        return Err(syntax_error(text, "Expected `(` to open a node pattern"));
    }
    let close = matching_close(trimmed, 0)
        .ok_or_else(|| syntax_error(text, "Unclosed node pattern"))?;
    if close != trimmed.len() - 1 {
        return Err(syntax_error(text, "Trailing input after node pattern"));
    }
    let body = trimmed[1..close].trim();
    parse_node_body(body, text)
}

fn parse_node_body(body: &str, fragment: &str) -> Result<NodePattern> {
    let mut pattern = NodePattern::default();
    if body.is_empty() {
        return Ok(pattern);
    }

    // Property block starts at the first top-level `{`
    let (head, props) = match find_char_top_level(body, '{', 0) {
        Some(brace) => {
            let close = matching_close(body, brace)
                .ok_or_else(|| syntax_error(fragment, "Unclosed property map"))?;
            if !body[close + 1..].trim().is_empty() {
                return Err(syntax_error(fragment, "Trailing input after property map"));
            }
            (body[..brace].trim(), parse_property_block(&body[brace..=close])?)
        }
        None => (body, Vec::new()),
    };
    pattern.properties = props;

    // head: `var`, `:Label`, `var:Label1:Label2`, or empty
    let mut segments = head.split(':');
    let var = segments.next().unwrap_or("").trim();
    if !var.is_empty() {
        pattern.variable = Some(var.trim_matches('`').to_string());
    }
    for label in segments {
        let label = label.trim().trim_matches('`');
        if label.is_empty() {
            return Err(syntax_error(fragment, "Empty label in node pattern"));
        }
        pattern.labels.push(label.to_string());
    }
    Ok(pattern)
}

/// Parse the bracket body of a relationship pattern (without brackets):
/// `r:TYPE1|TYPE2 *1..3 {props}`.
fn parse_rel_body(body: &str, direction: PatternDirection, fragment: &str) -> Result<RelPattern> {
    let mut rel = RelPattern {
        variable: None,
        rel_types: Vec::new(),
        direction,
        properties: Vec::new(),
        var_length: None,
    };
    let mut rest = body.trim();

    // Property block
    if let Some(brace) = find_char_top_level(rest, '{', 0) {
        let close = matching_close(rest, brace)
            .ok_or_else(|| syntax_error(fragment, "Unclosed property map"))?;
        if !rest[close + 1..].trim().is_empty() {
            return Err(syntax_error(fragment, "Trailing input after property map"));
        }
        rel.properties = parse_property_block(&rest[brace..=close])?;
        rest = rest[..brace].trim_end();
    }

    // Variable-length suffix `*`, `*2`, `*1..3`, `*..3`, `*1..`
    if let Some(star) = find_char_top_level(rest, '*', 0) {
        let spec = rest[star + 1..].trim();
        rel.var_length = Some(parse_var_length(spec, fragment)?);
        rest = rest[..star].trim_end();
    }

    // `var:TYPE1|TYPE2`, `:TYPE`, `var`, or empty
    if let Some(colon) = rest.find(':') {
        let var = rest[..colon].trim();
        if !var.is_empty() {
            rel.variable = Some(var.trim_matches('`').to_string());
        }
        for rel_type in rest[colon + 1..].split('|') {
            let rel_type = rel_type.trim().trim_start_matches(':').trim().trim_matches('`');
            if rel_type.is_empty() {
                return Err(syntax_error(fragment, "Empty relationship type"));
            }
            rel.rel_types.push(rel_type.to_string());
        }
    } else if !rest.is_empty() {
        rel.variable = Some(rest.trim_matches('`').to_string());
    }
    Ok(rel)
}

fn parse_var_length(spec: &str, fragment: &str) -> Result<VarLength> {
    if spec.is_empty() {
        return Ok(VarLength { min: None, max: None });
    }
    let parse_bound = |s: &str| -> Result<Option<u32>> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<u32>()
            .map(Some)
            .map_err(|_| syntax_error(fragment, format!("Invalid variable-length bound `{s}`")))
    };
    match spec.split_once("..") {
        Some((lo, hi)) => Ok(VarLength { min: parse_bound(lo)?, max: parse_bound(hi)? }),
        None => {
            let exact = parse_bound(spec)?;
            Ok(VarLength { min: exact, max: exact })
        }
    }
}

/// Parse a full path pattern: `p = (a)-[r:T]->(b)<-[:U]-(c)`.
pub fn parse_path_pattern(text: &str) -> Result<PathPattern> {
    let mut rest = text.trim();
    let mut path_var = None;

    // `p = (...)` — a path variable binding before the first paren
    if !rest.starts_with('(') {
        if let Some(eq) = find_char_top_level(rest, '=', 0) {
            let var = rest[..eq].trim();
            if !var.is_empty() && var.chars().all(|c| c.is_alphanumeric() || c == '_') {
                path_var = Some(var.to_string());
                rest = rest[eq + 1..].trim_start();
            }
        }
    }

    let mut parts = Vec::new();
    let mut cursor = 0usize;
    loop {
        let remaining = rest[cursor..].trim_start();
        let offset = cursor + (rest[cursor..].len() - remaining.len());
        if !remaining.starts_with('(') {
            return Err(syntax_error(text, "Expected `(` to start a node pattern"));
        }
        let close = matching_close(rest, offset)
            .ok_or_else(|| syntax_error(text, "Unclosed node pattern"))?;
        parts.push(PatternPart::Node(parse_node_pattern(&rest[offset..=close])?));
        cursor = close + 1;

        let after = rest[cursor..].trim_start();
        if after.is_empty() {
            break;
        }
        let rel_offset = cursor + (rest[cursor..].len() - after.len());
        let (rel, consumed) = parse_rel_segment(rest, rel_offset, text)?;
        parts.push(PatternPart::Rel(rel));
        cursor = consumed;
    }

    Ok(PathPattern { path_var, parts })
}

/// Parse a relationship segment beginning at `start` in `text`:
/// `-[...]->`, `<-[...]-`, `-->`, `<--`, or plain `--`/`-`.
/// Returns the pattern and the byte offset just past the segment.
fn parse_rel_segment(text: &str, start: usize, fragment: &str) -> Result<(RelPattern, usize)> {
    let bytes = text.as_bytes();
    let skip_spaces = |mut i: usize| {
        while bytes.get(i) == Some(&b' ') {
            i += 1;
        }
        i
    };
    let mut i = start;
    let mut left_arrow = false;

    if bytes.get(i) == Some(&b'<') {
        left_arrow = true;
        i = skip_spaces(i + 1);
    }
    if bytes.get(i) != Some(&b'-') {
        return Err(syntax_error(fragment, "Expected `-` in relationship pattern"));
    }
    i = skip_spaces(i + 1);

    let mut body = "";
    if bytes.get(i) == Some(&b'[') {
        let close = matching_close(text, i)
            .ok_or_else(|| syntax_error(fragment, "Unclosed `[` in relationship pattern"))?;
        body = &text[i + 1..close];
        i = skip_spaces(close + 1);
    }

    if bytes.get(i) != Some(&b'-') {
        return Err(syntax_error(fragment, "Expected `-` after relationship bracket"));
    }
    i += 1;

    let mut right_arrow = false;
    if bytes.get(i) == Some(&b'>') {
        right_arrow = true;
        i += 1;
    }

    let direction = match (left_arrow, right_arrow) {
        (true, false) => PatternDirection::Left,
        (false, true) => PatternDirection::Right,
        (false, false) => PatternDirection::Undirected,
        (true, true) => {
            return Err(syntax_error(fragment, "Relationship cannot point both ways"));
        }
    };

    Ok((parse_rel_body(body, direction, fragment)?, i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_simple_node() {
        let p = parse_node_pattern("(n:Person)").unwrap();
        assert_eq!(p.variable.as_deref(), Some("n"));
        assert_eq!(p.labels.as_slice(), ["Person".to_string()]);
        assert!(p.properties.is_empty());
    }

    #[test]
    fn test_parse_node_multiple_labels_and_props() {
        let p = parse_node_pattern("(u:User:Admin {name: 'Ada', age: 30})").unwrap();
        assert_eq!(p.variable.as_deref(), Some("u"));
        assert_eq!(p.labels.as_slice(), ["User".to_string(), "Admin".to_string()]);
        assert_eq!(
            p.properties,
            vec![
                ("name".to_string(), "'Ada'".to_string()),
                ("age".to_string(), "30".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_node_anonymous() {
        let p = parse_node_pattern("(:City)").unwrap();
        assert_eq!(p.variable, None);
        assert_eq!(p.labels.as_slice(), ["City".to_string()]);

        let p = parse_node_pattern("()").unwrap();
        assert_eq!(p.variable, None);
        assert!(p.labels.is_empty());
    }

    #[test]
    fn test_parse_node_nested_property_values() {
        let p = parse_node_pattern("(n {tags: ['a', 'b'], meta: {x: 1, y: [2, 3]}})").unwrap();
        assert_eq!(
            p.properties,
            vec![
                ("tags".to_string(), "['a', 'b']".to_string()),
                ("meta".to_string(), "{x: 1, y: [2, 3]}".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_node_function_call_value_kept_raw() {
        let p = parse_node_pattern("(n {created: timestamp(), id: randomUUID()})").unwrap();
        assert_eq!(p.properties[0].1, "timestamp()");
        assert_eq!(p.properties[1].1, "randomUUID()");
    }

    #[test]
    fn test_parse_path_right() {
        let p = parse_path_pattern("(a:Person)-[r:KNOWS]->(b:Person)").unwrap();
        assert_eq!(p.parts.len(), 3);
        match &p.parts[1] {
            PatternPart::Rel(rel) => {
                assert_eq!(rel.variable.as_deref(), Some("r"));
                assert_eq!(rel.rel_types, vec!["KNOWS"]);
                assert_eq!(rel.direction, PatternDirection::Right);
            }
            other => panic!("expected rel, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_path_left_and_undirected() {
        let p = parse_path_pattern("(a)<-[:OWNS]-(b)--(c)").unwrap();
        assert_eq!(p.parts.len(), 5);
        match (&p.parts[1], &p.parts[3]) {
            (PatternPart::Rel(first), PatternPart::Rel(second)) => {
                assert_eq!(first.direction, PatternDirection::Left);
                assert_eq!(second.direction, PatternDirection::Undirected);
                assert!(second.rel_types.is_empty());
            }
            other => panic!("expected rels, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_rel_multiple_types_and_props() {
        let p = parse_path_pattern("(a)-[r:KNOWS|LIKES {since: 2020}]->(b)").unwrap();
        match &p.parts[1] {
            PatternPart::Rel(rel) => {
                assert_eq!(rel.rel_types, vec!["KNOWS", "LIKES"]);
                assert_eq!(rel.properties, vec![("since".to_string(), "2020".to_string())]);
            }
            other => panic!("expected rel, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_var_length() {
        let p = parse_path_pattern("(a)-[:KNOWS*1..3]->(b)").unwrap();
        match &p.parts[1] {
            PatternPart::Rel(rel) => {
                assert_eq!(rel.var_length, Some(VarLength { min: Some(1), max: Some(3) }));
            }
            other => panic!("expected rel, got {other:?}"),
        }

        let p = parse_path_pattern("(a)-[*..2]->(b)").unwrap();
        match &p.parts[1] {
            PatternPart::Rel(rel) => {
                assert_eq!(rel.var_length, Some(VarLength { min: None, max: Some(2) }));
            }
            other => panic!("expected rel, got {other:?}"),
        }

        let p = parse_path_pattern("(a)-[*]->(b)").unwrap();
        match &p.parts[1] {
            PatternPart::Rel(rel) => {
                assert_eq!(rel.var_length, Some(VarLength { min: None, max: None }));
            }
            other => panic!("expected rel, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_path_variable() {
        let p = parse_path_pattern("p = (a)-[:KNOWS]->(b)").unwrap();
        assert_eq!(p.path_var.as_deref(), Some("p"));
        assert_eq!(p.parts.len(), 3);
    }

    #[test]
    fn test_split_patterns_respects_depth() {
        let parts = split_patterns("(a {x: 1, y: 2}), (b)-[:T]->(c)");
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_malformed_patterns_error() {
        assert!(parse_node_pattern("n:Person)").is_err());
        assert!(parse_node_pattern("(n:Person").is_err());
        assert!(parse_path_pattern("(a)-[r:T(b)").is_err());
        assert!(parse_property_block("{a 1}").is_err());
    }
}
