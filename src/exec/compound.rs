//! Compound-statement fast paths.
//!
//! A small set of interleaved-clause shapes that dominate ingest
//! workloads is recognized by keyword probing and served without running
//! the generic pipeline. The contract: a fast path must be
//! observationally equivalent to the generic path for the statements it
//! accepts — anything it cannot prove equivalent falls through by
//! returning `None`.
//!
//! The generic compound handling itself (MATCH-rooted blocks executed
//! sequentially, bindings carried across blocks) lives in the pipeline:
//! every MATCH segment opens a new expansion over the rows produced so
//! far.

use super::context::QueryContext;
use super::create_clause;
use super::result::ExecutionResult;
use crate::cache::NodeLookupCache;
use crate::cypher::ast::split_clauses;
use crate::cypher::pattern::{
    self, NodePattern, PatternDirection, PatternPart,
};
use crate::eval::Bindings;
use crate::model::{Node, Value};
use crate::Result;

/// Try the `MATCH (a:…), (b:…) CREATE (a)-[r:T]->(b) DELETE r` shape
/// (and its property-qualified twin). Returns None when the statement
/// does not match the template.
pub fn try_fast_path(ctx: &mut QueryContext, statement: &str) -> Result<Option<ExecutionResult>> {
    let segments = split_clauses(statement);
    let [(match_kw, match_body), (create_kw, create_body), (delete_kw, delete_body)] =
        segments.as_slice()
    else {
        return Ok(None);
    };
    if match_kw != "MATCH" || create_kw != "CREATE" || delete_kw != "DELETE" {
        return Ok(None);
    }

    // MATCH: exactly two node-only, variable-bound, single-label patterns
    let match_patterns = pattern::split_patterns(match_body);
    let [left_text, right_text] = match_patterns.as_slice() else {
        return Ok(None);
    };
    let (Ok(left), Ok(right)) = (
        pattern::parse_node_pattern(*left_text),
        pattern::parse_node_pattern(*right_text),
    ) else {
        return Ok(None);
    };
    let (Some(left_var), Some(right_var)) = (left.variable.clone(), right.variable.clone()) else {
        return Ok(None);
    };
    if left.labels.is_empty() || right.labels.is_empty() {
        return Ok(None);
    }

    // CREATE: a single (a)-[r:T]->(b) between the matched variables
    let create_patterns = pattern::split_patterns(create_body);
    let [create_text] = create_patterns.as_slice() else {
        return Ok(None);
    };
    let Ok(create_pattern) = pattern::parse_path_pattern(*create_text) else {
        return Ok(None);
    };
    let [PatternPart::Node(src), PatternPart::Rel(rel), PatternPart::Node(dst)] =
        create_pattern.parts.as_slice()
    else {
        return Ok(None);
    };
    if rel.direction != PatternDirection::Right
        || rel.var_length.is_some()
        || rel.rel_types.len() != 1
    {
        return Ok(None);
    }
    let (Some(rel_var), Some(src_var), Some(dst_var)) =
        (rel.variable.clone(), src.variable.clone(), dst.variable.clone())
    else {
        return Ok(None);
    };
    if src_var != left_var || dst_var != right_var {
        return Ok(None);
    }

    // DELETE: exactly the created relationship
    if delete_body.trim() != rel_var {
        return Ok(None);
    }

    tracing::debug!(statement, "compound fast path engaged");

    let empty = Bindings::new();
    let Some(src_node) = lookup_endpoint(ctx, &empty, &left)? else {
        return Ok(Some(ExecutionResult::with_stats(ctx.stats.clone())));
    };
    let Some(dst_node) = lookup_endpoint(ctx, &empty, &right)? else {
        return Ok(Some(ExecutionResult::with_stats(ctx.stats.clone())));
    };

    let rel_type = &rel.rel_types[0];
    let props = create_clause::evaluate_properties(ctx, &empty, &rel.properties)?;
    let rel_id = ctx.storage.create_relationship(src_node.id, dst_node.id, rel_type, props)?;
    ctx.stats.relationships_created += 1;
    ctx.storage.delete_relationship(rel_id)?;
    ctx.stats.relationships_deleted += 1;

    Ok(Some(ExecutionResult::with_stats(ctx.stats.clone())))
}

/// Resolve one endpoint by label (or label + properties), memoized in the
/// node-lookup cache.
fn lookup_endpoint(
    ctx: &QueryContext,
    row: &Bindings,
    pattern: &NodePattern,
) -> Result<Option<Node>> {
    let label = &pattern.labels[0];
    let props = create_clause::evaluate_properties(ctx, row, &pattern.properties)?;
    let mut prop_pairs: Vec<(String, Value)> = props.into_iter().collect();
    prop_pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let key = NodeLookupCache::key(label, &prop_pairs);

    if let Some(node) = ctx.node_cache.get(&key) {
        return Ok(Some(node));
    }

    let found = if prop_pairs.is_empty() {
        ctx.storage.first_node_by_label(label)?
    } else {
        ctx.storage
            .nodes_by_label(label)?
            .into_iter()
            .filter(|node| {
                prop_pairs
                    .iter()
                    .all(|(k, v)| node.get(k).is_some_and(|actual| actual.cypher_eq(v)))
            })
            .min_by_key(|node| node.id.0)
    };

    if let Some(node) = &found {
        ctx.node_cache.put(key, node.clone());
    }
    Ok(found)
}
