//! SET and REMOVE execution.

use super::context::QueryContext;
use crate::cypher::text::{find_char_top_level, find_str_top_level, split_top_level_commas};
use crate::eval::{self, Bindings};
use crate::model::Value;
use crate::{Error, Result};

/// Apply a SET clause body (comma-separated assignments) to one row.
pub fn apply_set(ctx: &mut QueryContext, row: &mut Bindings, body: &str) -> Result<()> {
    for assignment in split_top_level_commas(body) {
        if assignment.is_empty() {
            continue;
        }
        apply_one_assignment(ctx, row, assignment)?;
    }
    Ok(())
}

fn apply_one_assignment(ctx: &mut QueryContext, row: &mut Bindings, text: &str) -> Result<()> {
    // `var += map` — merge
    if let Some(plus_eq) = find_str_top_level(text, "+=", 0) {
        let var = text[..plus_eq].trim();
        let value = eval::evaluate(&ctx.eval(row), text[plus_eq + 2..].trim())?;
        let Value::Map(entries) = value else {
            return Err(Error::TypeError {
                expected: "a map on the right of +=".into(),
                got: value.type_name().into(),
            });
        };
        return mutate_entity(ctx, row, var, |target| {
            for (key, value) in entries {
                target.set_property(key, value);
            }
            Ok(())
        });
    }

    if let Some(eq) = find_char_top_level(text, '=', 0) {
        let lhs = text[..eq].trim();
        let value = eval::evaluate(&ctx.eval(row), text[eq + 1..].trim())?;

        // `var.prop = expr`
        if let Some((var, prop)) = lhs.split_once('.') {
            let (var, prop) = (var.trim().to_string(), prop.trim().to_string());
            return mutate_entity(ctx, row, &var, |target| {
                target.set_property(prop, value);
                Ok(())
            });
        }

        // `var = map` — replace all properties
        let Value::Map(entries) = value else {
            return Err(Error::TypeError {
                expected: "a map on the right of =".into(),
                got: value.type_name().into(),
            });
        };
        return mutate_entity(ctx, row, lhs, |target| {
            target.clear_properties();
            for (key, value) in entries {
                target.set_property(key, value);
            }
            Ok(())
        });
    }

    // `var:Label[:Label2]` — label addition
    if let Some(colon) = text.find(':') {
        let var = text[..colon].trim().to_string();
        let labels: Vec<String> = text[colon + 1..]
            .split(':')
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        return mutate_entity(ctx, row, &var, |target| {
            for label in labels {
                target.add_label(label);
            }
            Ok(())
        });
    }

    Err(Error::SyntaxError {
        position: 0,
        message: format!("Malformed SET item `{text}`"),
    })
}

/// Apply a REMOVE clause body to one row. Removed properties count as
/// `properties_set`, matching Neo4j's counters.
pub fn apply_remove(ctx: &mut QueryContext, row: &mut Bindings, body: &str) -> Result<()> {
    for target in split_top_level_commas(body) {
        if target.is_empty() {
            continue;
        }
        if let Some((var, prop)) = target.split_once('.') {
            let (var, prop) = (var.trim().to_string(), prop.trim().to_string());
            mutate_entity(ctx, row, &var, |entity| {
                entity.remove_property(&prop);
                Ok(())
            })?;
        } else if let Some(colon) = target.find(':') {
            let var = target[..colon].trim().to_string();
            let labels: Vec<String> = target[colon + 1..]
                .split(':')
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            mutate_entity(ctx, row, &var, |entity| {
                for label in labels {
                    entity.remove_label(&label);
                }
                Ok(())
            })?;
        } else {
            return Err(Error::SyntaxError {
                position: 0,
                message: format!("Malformed REMOVE item `{target}`"),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Mutation plumbing
// ============================================================================

/// A mutable view over the entity bound to a variable. Collects counter
/// deltas while the closure edits a working copy; the storage write and
/// binding refresh happen afterwards.
struct EntityEdit {
    node: Option<crate::model::Node>,
    rel: Option<crate::model::Relationship>,
    properties_set: u64,
    labels_added: u64,
    labels_removed: u64,
}

impl EntityEdit {
    fn set_property(&mut self, key: String, value: Value) {
        self.properties_set += 1;
        if let Some(node) = &mut self.node {
            // Embedding writes route to the native vector slot
            if key == "embedding" {
                match value.as_f64_vec() {
                    Some(vec) => {
                        node.embedding = Some(vec.into_iter().map(|f| f as f32).collect());
                        return;
                    }
                    None if value.is_null() => {
                        node.embedding = None;
                        return;
                    }
                    None => {}
                }
            }
            if value.is_null() {
                node.properties.remove(&key);
            } else {
                node.properties.insert(key, value);
            }
        } else if let Some(rel) = &mut self.rel {
            if value.is_null() {
                rel.properties.remove(&key);
            } else {
                rel.properties.insert(key, value);
            }
        }
    }

    fn remove_property(&mut self, key: &str) {
        self.properties_set += 1;
        if let Some(node) = &mut self.node {
            if key == "embedding" {
                node.embedding = None;
            }
            node.properties.remove(key);
        } else if let Some(rel) = &mut self.rel {
            rel.properties.remove(key);
        }
    }

    fn clear_properties(&mut self) {
        if let Some(node) = &mut self.node {
            node.properties.clear();
        } else if let Some(rel) = &mut self.rel {
            rel.properties.clear();
        }
    }

    fn add_label(&mut self, label: String) {
        if let Some(node) = &mut self.node {
            if !node.has_label(&label) {
                node.labels.push(label);
                self.labels_added += 1;
            }
        }
    }

    fn remove_label(&mut self, label: &str) {
        if let Some(node) = &mut self.node {
            if node.has_label(label) {
                node.labels.retain(|l| l != label);
                self.labels_removed += 1;
            }
        }
    }
}

fn mutate_entity(
    ctx: &mut QueryContext,
    row: &mut Bindings,
    var: &str,
    edit: impl FnOnce(&mut EntityEdit) -> Result<()>,
) -> Result<()> {
    let mut view = match row.get(var) {
        Some(Value::Node(node)) => EntityEdit {
            node: Some((**node).clone()),
            rel: None,
            properties_set: 0,
            labels_added: 0,
            labels_removed: 0,
        },
        Some(Value::Relationship(rel)) => EntityEdit {
            node: None,
            rel: Some((**rel).clone()),
            properties_set: 0,
            labels_added: 0,
            labels_removed: 0,
        },
        Some(Value::Null) => return Ok(()), // OPTIONAL MATCH miss: no-op
        Some(other) => {
            return Err(Error::TypeError {
                expected: "a node or relationship".into(),
                got: other.type_name().into(),
            });
        }
        None => return Err(Error::NotFound(format!("Variable `{var}` not defined"))),
    };

    edit(&mut view)?;

    if let Some(node) = view.node {
        ctx.storage.update_node(&node)?;
        row.set(var.to_string(), Value::Node(Box::new(node)));
    } else if let Some(rel) = view.rel {
        ctx.storage.update_relationship(&rel)?;
        row.set(var.to_string(), Value::Relationship(Box::new(rel)));
    }
    ctx.stats.properties_set += view.properties_set;
    ctx.stats.labels_added += view.labels_added;
    ctx.stats.labels_removed += view.labels_removed;
    Ok(())
}
