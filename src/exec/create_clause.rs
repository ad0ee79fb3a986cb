//! CREATE execution.
//!
//! All node parts of a pattern list are created (or resolved from
//! bindings) before any relationship, so inline endpoints and
//! variable-referenced endpoints behave identically.

use super::context::QueryContext;
use crate::cypher::pattern::{self, NodePattern, PatternDirection, PatternPart};
use crate::eval::{self, Bindings};
use crate::model::{Node, PropertyMap, Value};
use crate::{Error, Result};

/// Execute a CREATE clause body against one row of bindings.
pub fn execute(ctx: &mut QueryContext, row: &mut Bindings, body: &str) -> Result<()> {
    for pattern_text in pattern::split_patterns(body) {
        if pattern_text.is_empty() {
            continue;
        }
        let parsed = pattern::parse_path_pattern(pattern_text)?;
        create_path(ctx, row, &parsed.parts)?;
    }
    Ok(())
}

fn create_path(
    ctx: &mut QueryContext,
    row: &mut Bindings,
    parts: &[PatternPart],
) -> Result<()> {
    // Resolve every node position first
    let mut nodes: Vec<Node> = Vec::new();
    for part in parts {
        if let PatternPart::Node(node_pattern) = part {
            nodes.push(resolve_or_create_node(ctx, row, node_pattern)?);
        }
    }

    // Then the relationships between consecutive positions
    let mut node_index = 0usize;
    for part in parts {
        let PatternPart::Rel(rel) = part else {
            continue;
        };
        let (left, right) = (&nodes[node_index], &nodes[node_index + 1]);
        let (src, dst) = match rel.direction {
            PatternDirection::Right => (left.id, right.id),
            PatternDirection::Left => (right.id, left.id),
            PatternDirection::Undirected => {
                return Err(Error::SyntaxError {
                    position: 0,
                    message: "Only directed relationships are supported in CREATE".into(),
                });
            }
        };
        let rel_type = rel.rel_types.first().ok_or_else(|| Error::SyntaxError {
            position: 0,
            message: "CREATE requires a relationship type".into(),
        })?;
        let props = evaluate_properties(ctx, row, &rel.properties)?;
        let rel_id = ctx.storage.create_relationship(src, dst, rel_type, props)?;
        ctx.stats.relationships_created += 1;
        if let Some(var) = &rel.variable {
            if let Some(created) = ctx.storage.get_relationship(rel_id)? {
                row.set(var.clone(), Value::Relationship(Box::new(created)));
            }
        }
        node_index += 1;
    }
    Ok(())
}

/// Use the bound node when the variable already resolves to one (pattern
/// reuse like `CREATE (a)-[:T]->(b)` after MATCH); otherwise create it.
fn resolve_or_create_node(
    ctx: &mut QueryContext,
    row: &mut Bindings,
    pattern: &NodePattern,
) -> Result<Node> {
    if let Some(var) = &pattern.variable {
        match row.get(var) {
            Some(Value::Node(node)) => return Ok((**node).clone()),
            Some(other) if !other.is_null() => {
                return Err(Error::TypeError {
                    expected: "a node".into(),
                    got: other.type_name().into(),
                });
            }
            _ => {}
        }
    }

    let props = evaluate_properties(ctx, row, &pattern.properties)?;
    let (props, embedding) = split_native_embedding(props);
    let labels: Vec<String> = pattern.labels.iter().cloned().collect();
    let id = ctx.storage.create_node(&labels, props, embedding)?;
    ctx.stats.nodes_created += 1;

    let node = ctx
        .storage
        .get_node(id)?
        .ok_or_else(|| Error::StorageError(format!("Created node {id} not found")))?;
    ctx.notify_node_created(&node);
    if let Some(var) = &pattern.variable {
        row.set(var.clone(), Value::Node(Box::new(node.clone())));
    }
    Ok(node)
}

pub fn evaluate_properties(
    ctx: &QueryContext,
    row: &Bindings,
    raw: &[(String, String)],
) -> Result<PropertyMap> {
    let mut props = PropertyMap::new();
    for (key, value_text) in raw {
        props.insert(key.clone(), eval::evaluate(&ctx.eval(row), value_text)?);
    }
    Ok(props)
}

/// An `embedding` property whose value is a numeric list belongs in the
/// node's native vector slot, not the property map.
pub fn split_native_embedding(mut props: PropertyMap) -> (PropertyMap, Option<Vec<f32>>) {
    let embedding = match props.get("embedding") {
        Some(value) => value.as_f64_vec().map(|v| v.into_iter().map(|f| f as f32).collect()),
        None => None,
    };
    if embedding.is_some() {
        props.remove("embedding");
    }
    (props, embedding)
}
