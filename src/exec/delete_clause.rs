//! DELETE / DETACH DELETE execution.

use std::collections::HashSet;

use super::context::QueryContext;
use crate::cypher::text::split_top_level_commas;
use crate::eval::Bindings;
use crate::model::{NodeId, RelId, Value};
use crate::storage::detach_delete_node;
use crate::{Error, Result};

/// Delete the named variables across every row. Rows frequently bind the
/// same entity more than once; each node or relationship is deleted at
/// most once.
pub fn execute(
    ctx: &mut QueryContext,
    rows: &[Bindings],
    targets_text: &str,
    detach: bool,
) -> Result<()> {
    let targets: Vec<&str> = split_top_level_commas(targets_text)
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect();

    let mut deleted_nodes: HashSet<NodeId> = HashSet::new();
    let mut deleted_rels: HashSet<RelId> = HashSet::new();

    for row in rows {
        ctx.cancel.check()?;
        for target in &targets {
            let Some(value) = row.get(target.trim()) else {
                return Err(Error::NotFound(format!("Variable `{target}` not defined")));
            };
            match value {
                Value::Node(node) => {
                    delete_node(ctx, node.id, detach, &mut deleted_nodes, &mut deleted_rels)?;
                }
                Value::Relationship(rel) => {
                    if deleted_rels.insert(rel.id) && ctx.storage.delete_relationship(rel.id)? {
                        ctx.stats.relationships_deleted += 1;
                    }
                }
                Value::Path(path) => {
                    for rel in &path.relationships {
                        if deleted_rels.insert(rel.id) && ctx.storage.delete_relationship(rel.id)? {
                            ctx.stats.relationships_deleted += 1;
                        }
                    }
                    for node in &path.nodes {
                        delete_node(ctx, node.id, detach, &mut deleted_nodes, &mut deleted_rels)?;
                    }
                }
                Value::Null => {} // OPTIONAL MATCH miss
                other => {
                    return Err(Error::TypeError {
                        expected: "a node, relationship, or path".into(),
                        got: other.type_name().into(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn delete_node(
    ctx: &mut QueryContext,
    id: NodeId,
    detach: bool,
    deleted_nodes: &mut HashSet<NodeId>,
    deleted_rels: &mut HashSet<RelId>,
) -> Result<()> {
    if !deleted_nodes.insert(id) {
        return Ok(());
    }
    if detach {
        for rel in crate::storage::relationships_for(ctx.storage, id, crate::model::Direction::Both)? {
            deleted_rels.insert(rel.id);
        }
        let (existed, removed_rels) = detach_delete_node(ctx.storage, id)?;
        if existed {
            ctx.stats.nodes_deleted += 1;
        }
        ctx.stats.relationships_deleted += removed_rels;
    } else {
        // Fails if relationships remain (storage enforces it)
        if ctx.storage.delete_node(id)? {
            ctx.stats.nodes_deleted += 1;
        }
    }
    Ok(())
}
