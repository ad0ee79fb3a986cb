//! MATCH execution: node scans, relationship expansion, shortestPath.
//!
//! Patterns are solved against storage row by row, carrying bindings
//! forward. A comma-separated pattern list is conjunctive: later patterns
//! see the variables bound by earlier ones, and unrelated patterns
//! produce a cartesian product.

use smallvec::SmallVec;

use super::context::QueryContext;
use crate::cypher::pattern::{
    self, NodePattern, PathPattern, PatternDirection, PatternPart, RelPattern,
};
use crate::cypher::text;
use crate::eval::{self, Bindings};
use crate::model::{Node, Path, Relationship, Value};
use crate::storage::relationships_for;
use crate::{Error, Result};

/// Default hop limit for unbounded variable-length and shortestPath
/// traversals.
const MAX_TRAVERSAL_DEPTH: u32 = 15;

/// Expand input rows through one MATCH clause.
///
/// `where_filter` is the WHERE attached to this MATCH; for OPTIONAL MATCH
/// it participates in matching (a row whose matches all fail the filter
/// keeps a null-extended row instead of disappearing).
pub fn expand(
    ctx: &QueryContext,
    input: Vec<Bindings>,
    pattern_texts: &[&str],
    optional: bool,
    where_filter: Option<&str>,
) -> Result<Vec<Bindings>> {
    let mut output = Vec::new();
    for row in input {
        ctx.cancel.check()?;
        let mut matched = vec![row.clone()];
        for pattern_text in pattern_texts.iter().copied() {
            let mut next = Vec::new();
            for m in &matched {
                next.extend(solve_pattern_text(ctx, m, pattern_text)?);
            }
            matched = next;
            if matched.is_empty() {
                break;
            }
        }
        if let Some(filter) = where_filter {
            let mut filtered = Vec::new();
            for m in matched {
                if eval::evaluate(&ctx.eval(&m), filter)?.is_truthy() {
                    filtered.push(m);
                }
            }
            matched = filtered;
        }
        if matched.is_empty() {
            if optional {
                let mut extended = row.clone();
                for var in pattern_variables(pattern_texts) {
                    if !extended.contains(&var) {
                        extended.set(var, Value::Null);
                    }
                }
                output.push(extended);
            }
            // Non-optional: the row is dropped
        } else {
            output.extend(matched);
        }
    }
    Ok(output)
}

/// All variables a pattern list would bind, for null-extension of
/// OPTIONAL MATCH misses.
fn pattern_variables(pattern_texts: &[&str]) -> Vec<String> {
    let mut vars = Vec::new();
    for text in pattern_texts.iter().copied() {
        let (path_var, inner) = split_path_var(text);
        if let Some(v) = path_var {
            vars.push(v);
        }
        let inner = strip_shortest_path(inner).unwrap_or(inner);
        if let Ok(parsed) = pattern::parse_path_pattern(inner) {
            for part in &parsed.parts {
                let var = match part {
                    PatternPart::Node(n) => n.variable.clone(),
                    PatternPart::Rel(r) => r.variable.clone(),
                };
                if let Some(v) = var {
                    vars.push(v);
                }
            }
        }
    }
    vars
}

/// Solve one comma-segment pattern against a single row.
pub fn solve_pattern_text(
    ctx: &QueryContext,
    row: &Bindings,
    pattern_text: &str,
) -> Result<Vec<Bindings>> {
    let (path_var, inner) = split_path_var(pattern_text);

    if let Some(body) = strip_shortest_path(inner) {
        let parsed = pattern::parse_path_pattern(body)?;
        return solve_shortest_path(ctx, row, &parsed, path_var);
    }

    let mut parsed = pattern::parse_path_pattern(inner)?;
    if parsed.path_var.is_none() {
        parsed.path_var = path_var;
    }
    solve_pattern(ctx, row, &parsed)
}

fn split_path_var(pattern_text: &str) -> (Option<String>, &str) {
    let trimmed = pattern_text.trim();
    if trimmed.starts_with('(') {
        return (None, trimmed);
    }
    if let Some(eq) = text::find_char_top_level(trimmed, '=', 0) {
        let var = trimmed[..eq].trim();
        if !var.is_empty() && var.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return (Some(var.to_string()), trimmed[eq + 1..].trim_start());
        }
    }
    (None, trimmed)
}

fn strip_shortest_path(inner: &str) -> Option<&str> {
    let trimmed = inner.trim();
    if trimmed.len() >= "shortestPath(".len()
        && trimmed[.."shortestPath(".len() - 1].eq_ignore_ascii_case("shortestPath")
        && trimmed.as_bytes().get("shortestPath".len()) == Some(&b'(')
        && text::matching_close(trimmed, "shortestPath".len()) == Some(trimmed.len() - 1)
    {
        Some(trimmed["shortestPath(".len()..trimmed.len() - 1].trim())
    } else {
        None
    }
}

/// Solve a parsed path pattern against a single row of bindings.
pub fn solve_pattern(
    ctx: &QueryContext,
    row: &Bindings,
    parsed: &PathPattern,
) -> Result<Vec<Bindings>> {
    let Some(PatternPart::Node(first)) = parsed.parts.first() else {
        return Err(Error::SyntaxError {
            position: 0,
            message: "Pattern must start with a node".into(),
        });
    };

    // Partial solutions: bindings plus the path walked so far
    let mut partials: Vec<(Bindings, Path)> = Vec::new();
    for node in node_candidates(ctx, row, first)? {
        let mut bound = row.clone();
        bind_node_var(&mut bound, first, &node);
        partials.push((bound, Path::single(node)));
    }

    let mut index = 1;
    while index < parsed.parts.len() {
        let Some(PatternPart::Rel(rel)) = parsed.parts.get(index) else {
            break;
        };
        let Some(PatternPart::Node(target)) = parsed.parts.get(index + 1) else {
            return Err(Error::SyntaxError {
                position: 0,
                message: "Relationship must be followed by a node".into(),
            });
        };
        ctx.cancel.check()?;

        let mut next = Vec::new();
        for (bindings, path) in partials {
            for (hop_rels, end_node) in traverse(ctx, &bindings, &path, rel, target)? {
                let mut bound = bindings.clone();
                let mut new_path = path.clone();
                for (r, n) in &hop_rels {
                    new_path.append(r.clone(), n.clone());
                }
                if let Some(var) = &rel.variable {
                    if rel.var_length.is_some() {
                        bound.set(
                            var.clone(),
                            Value::List(
                                hop_rels
                                    .iter()
                                    .map(|(r, _)| Value::Relationship(Box::new(r.clone())))
                                    .collect(),
                            ),
                        );
                    } else if let Some((r, _)) = hop_rels.first() {
                        bound.set(var.clone(), Value::Relationship(Box::new(r.clone())));
                    }
                }
                bind_node_var(&mut bound, target, &end_node);
                next.push((bound, new_path));
            }
        }
        partials = next;
        if partials.is_empty() {
            break;
        }
        index += 2;
    }

    Ok(partials
        .into_iter()
        .map(|(mut bindings, path)| {
            if let Some(var) = &parsed.path_var {
                bindings.set(var.clone(), Value::Path(Box::new(path)));
            }
            bindings
        })
        .collect())
}

fn bind_node_var(bindings: &mut Bindings, pattern: &NodePattern, node: &Node) {
    if let Some(var) = &pattern.variable {
        bindings.set(var.clone(), Value::Node(Box::new(node.clone())));
    }
}

/// Candidate nodes for a node pattern given current bindings: an already
/// bound variable wins, then the first label's index, then a full scan.
fn node_candidates(
    ctx: &QueryContext,
    row: &Bindings,
    pattern: &NodePattern,
) -> Result<Vec<Node>> {
    if let Some(var) = &pattern.variable {
        match row.get(var) {
            Some(Value::Node(node)) => {
                return Ok(if node_matches(ctx, row, node, pattern)? {
                    vec![(**node).clone()]
                } else {
                    Vec::new()
                });
            }
            Some(Value::Null) => return Ok(Vec::new()),
            Some(other) => {
                return Err(Error::TypeError {
                    expected: "a node".into(),
                    got: other.type_name().into(),
                });
            }
            None => {}
        }
    }
    let candidates = match pattern.labels.first() {
        Some(label) => ctx.storage.nodes_by_label(label)?,
        None => ctx.storage.all_nodes()?,
    };
    let mut matched = Vec::new();
    for node in candidates {
        if node_matches(ctx, row, &node, pattern)? {
            matched.push(node);
        }
    }
    Ok(matched)
}

/// Does a node satisfy a pattern's labels and property constraints?
fn node_matches(
    ctx: &QueryContext,
    row: &Bindings,
    node: &Node,
    pattern: &NodePattern,
) -> Result<bool> {
    if !pattern.labels.iter().all(|l| node.has_label(l)) {
        return Ok(false);
    }
    properties_match(ctx, row, &pattern.properties, |key| node.get(key))
}

fn rel_matches(
    ctx: &QueryContext,
    row: &Bindings,
    rel: &Relationship,
    pattern: &RelPattern,
) -> Result<bool> {
    if !pattern.rel_types.is_empty() && !pattern.rel_types.iter().any(|t| *t == rel.rel_type) {
        return Ok(false);
    }
    properties_match(ctx, row, &pattern.properties, |key| rel.get(key))
}

fn properties_match<'v>(
    ctx: &QueryContext,
    row: &Bindings,
    constraints: &[(String, String)],
    get: impl Fn(&str) -> Option<&'v Value>,
) -> Result<bool> {
    for (key, raw) in constraints {
        let expected = eval::evaluate(&ctx.eval(row), raw)?;
        match get(key) {
            Some(actual) if actual.cypher_eq(&expected) => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// One relationship segment: either a single hop or a variable-length
/// walk. Returns, per solution, the hop list and the final node.
/// Relationships already used earlier in the path are excluded, per
/// Cypher's relationship-uniqueness rule.
fn traverse(
    ctx: &QueryContext,
    row: &Bindings,
    path: &Path,
    rel: &RelPattern,
    target: &NodePattern,
) -> Result<Vec<(SmallVec<[(Relationship, Node); 1]>, Node)>> {
    let from = path.end().clone();
    let (min, max) = match rel.var_length {
        None => (1, 1),
        Some(vl) => (vl.min.unwrap_or(1), vl.max.unwrap_or(MAX_TRAVERSAL_DEPTH)),
    };

    let mut results = Vec::new();
    // Zero-length match: `*0..` binds the start node itself
    if min == 0 && node_matches(ctx, row, &from, target)? && bound_target_ok(row, target, &from) {
        results.push((SmallVec::new(), from.clone()));
    }
    // Frontier of partial walks: (hops so far, tip node)
    let mut frontier: Vec<(SmallVec<[(Relationship, Node); 1]>, Node)> =
        vec![(SmallVec::new(), from)];

    for depth in 1..=max {
        ctx.cancel.check()?;
        let mut next_frontier = Vec::new();
        for (hops, tip) in &frontier {
            for candidate in step_candidates(ctx, tip, rel.direction)? {
                if !rel_matches(ctx, row, &candidate, rel)? {
                    continue;
                }
                // Relationship uniqueness across the whole pattern
                if path.relationships.iter().any(|r| r.id == candidate.id)
                    || hops.iter().any(|(r, _)| r.id == candidate.id)
                {
                    continue;
                }
                let other_id = match rel.direction {
                    PatternDirection::Right => candidate.dst,
                    PatternDirection::Left => candidate.src,
                    PatternDirection::Undirected => {
                        candidate.other_node(tip.id).unwrap_or(candidate.dst)
                    }
                };
                let Some(other) = ctx.storage.get_node(other_id)? else {
                    continue;
                };
                let mut new_hops = hops.clone();
                new_hops.push((candidate, other.clone()));
                if depth >= min && node_matches(ctx, row, &other, target)?
                    && bound_target_ok(row, target, &other)
                {
                    results.push((new_hops.clone(), other.clone()));
                }
                if depth < max {
                    next_frontier.push((new_hops, other));
                }
            }
        }
        frontier = next_frontier;
        if frontier.is_empty() {
            break;
        }
    }
    Ok(results)
}

/// If the target variable is already bound, the reached node must be it.
fn bound_target_ok(row: &Bindings, target: &NodePattern, reached: &Node) -> bool {
    match target.variable.as_ref().and_then(|v| row.get(v)) {
        Some(Value::Node(bound)) => bound.id == reached.id,
        _ => true,
    }
}

fn step_candidates(
    ctx: &QueryContext,
    from: &Node,
    direction: PatternDirection,
) -> Result<Vec<Relationship>> {
    match direction {
        PatternDirection::Right => ctx.storage.outgoing_relationships(from.id),
        PatternDirection::Left => ctx.storage.incoming_relationships(from.id),
        PatternDirection::Undirected => {
            relationships_for(ctx.storage, from.id, crate::model::Direction::Both)
        }
    }
}

// ============================================================================
// shortestPath
// ============================================================================

/// `shortestPath((a)-[:T*..n]->(b))` — breadth-first search, so the first
/// path found per (start, end) pair is minimal.
fn solve_shortest_path(
    ctx: &QueryContext,
    row: &Bindings,
    parsed: &PathPattern,
    path_var: Option<String>,
) -> Result<Vec<Bindings>> {
    let [PatternPart::Node(start), PatternPart::Rel(rel), PatternPart::Node(end)] =
        parsed.parts.as_slice()
    else {
        return Err(Error::UnsupportedQuery(
            "shortestPath() requires a single relationship pattern".into(),
        ));
    };
    let max = rel.var_length.and_then(|vl| vl.max).unwrap_or(MAX_TRAVERSAL_DEPTH);

    let mut output = Vec::new();
    for start_node in node_candidates(ctx, row, start)? {
        ctx.cancel.check()?;
        let mut visited: Vec<crate::model::NodeId> = vec![start_node.id];
        let mut queue: Vec<Path> = vec![Path::single(start_node.clone())];
        let mut found: Option<Path> = None;

        'search: for _depth in 0..max {
            let mut next_queue = Vec::new();
            for path in &queue {
                let tip = path.end().clone();
                for candidate in step_candidates(ctx, &tip, rel.direction)? {
                    if !rel_matches(ctx, row, &candidate, rel)? {
                        continue;
                    }
                    let other_id = match rel.direction {
                        PatternDirection::Right => candidate.dst,
                        PatternDirection::Left => candidate.src,
                        PatternDirection::Undirected => {
                            candidate.other_node(tip.id).unwrap_or(candidate.dst)
                        }
                    };
                    if visited.contains(&other_id) {
                        continue;
                    }
                    let Some(other) = ctx.storage.get_node(other_id)? else {
                        continue;
                    };
                    let mut new_path = path.clone();
                    new_path.append(candidate, other.clone());
                    if node_matches(ctx, row, &other, end)? && bound_target_ok(row, end, &other) {
                        found = Some(new_path);
                        break 'search;
                    }
                    visited.push(other_id);
                    next_queue.push(new_path);
                }
            }
            queue = next_queue;
            if queue.is_empty() {
                break;
            }
        }

        if let Some(path) = found {
            let mut bound = row.clone();
            bind_node_var(&mut bound, start, path.start());
            bind_node_var(&mut bound, end, path.end());
            if let Some(var) = &rel.variable {
                bound.set(
                    var.clone(),
                    Value::List(
                        path.relationships
                            .iter()
                            .map(|r| Value::Relationship(Box::new(r.clone())))
                            .collect(),
                    ),
                );
            }
            if let Some(var) = path_var.as_ref().or(parsed.path_var.as_ref()) {
                bound.set(var.clone(), Value::Path(Box::new(path)));
            }
            output.push(bound);
        }
    }
    Ok(output)
}
