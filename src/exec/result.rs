//! Result and statistics model.

use std::collections::HashMap;

use crate::model::{Node, Path, Relationship, Value};

/// Counters accumulated over the lifetime of a single statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub nodes_created: u64,
    pub nodes_deleted: u64,
    pub relationships_created: u64,
    pub relationships_deleted: u64,
    pub properties_set: u64,
    pub labels_added: u64,
    pub labels_removed: u64,
}

impl QueryStats {
    pub fn contains_updates(&self) -> bool {
        self.nodes_created
            + self.nodes_deleted
            + self.relationships_created
            + self.relationships_deleted
            + self.properties_set
            + self.labels_added
            + self.labels_removed
            > 0
    }
}

/// The shape every statement returns: named columns, rows of values, and
/// the update counters. `plan` carries the rendered operator tree for
/// EXPLAIN/PROFILE.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub stats: QueryStats,
    pub plan: Option<String>,
}

impl ExecutionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_stats(stats: QueryStats) -> Self {
        Self { stats, ..Self::default() }
    }

    /// Value of a named column in a row, for tests and embedders.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }
}

/// Convert a runtime value into its wire shape: nodes and relationships
/// surface as maps with `_nodeId`/`_edgeId`, and embeddings surface only
/// as summary descriptors, never as raw vectors.
pub fn to_output_value(value: &Value) -> Value {
    match value {
        Value::Node(node) => node_to_map(node),
        Value::Relationship(rel) => relationship_to_map(rel),
        Value::Path(path) => path_to_map(path),
        Value::List(items) => Value::List(items.iter().map(to_output_value).collect()),
        Value::Map(map) => Value::Map(
            map.iter().map(|(k, v)| (k.clone(), to_output_value(v))).collect(),
        ),
        other => other.clone(),
    }
}

fn node_to_map(node: &Node) -> Value {
    let mut map: HashMap<String, Value> = node
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), to_output_value(v)))
        .collect();
    map.insert("_nodeId".into(), Value::Int(node.id.0 as i64));
    map.insert(
        "labels".into(),
        Value::List(node.labels.iter().map(|l| Value::String(l.clone())).collect()),
    );
    if node.has_embedding() {
        map.insert("embedding".into(), node.embedding_summary());
    }
    Value::Map(map)
}

fn relationship_to_map(rel: &Relationship) -> Value {
    let mut map: HashMap<String, Value> = rel
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), to_output_value(v)))
        .collect();
    map.insert("_edgeId".into(), Value::Int(rel.id.0 as i64));
    map.insert("_type".into(), Value::String(rel.rel_type.clone()));
    map.insert("_startNodeId".into(), Value::Int(rel.src.0 as i64));
    map.insert("_endNodeId".into(), Value::Int(rel.dst.0 as i64));
    Value::Map(map)
}

fn path_to_map(path: &Path) -> Value {
    Value::Map(
        [
            (
                "nodes".to_string(),
                Value::List(path.nodes.iter().map(|n| node_to_map(n)).collect()),
            ),
            (
                "relationships".to_string(),
                Value::List(path.relationships.iter().map(|r| relationship_to_map(r)).collect()),
            ),
            ("length".to_string(), Value::Int(path.len() as i64)),
        ]
        .into_iter()
        .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;

    #[test]
    fn test_node_surfaces_as_map_without_raw_embedding() {
        let mut node = Node::new(NodeId(4)).with_labels(["Doc"]).with_property("title", "x");
        node.embedding = Some(vec![0.1; 768]);

        match to_output_value(&Value::Node(Box::new(node))) {
            Value::Map(map) => {
                assert_eq!(map.get("_nodeId"), Some(&Value::Int(4)));
                assert_eq!(map.get("title"), Some(&Value::String("x".into())));
                match map.get("embedding") {
                    Some(Value::Map(summary)) => {
                        assert_eq!(summary.get("dimensions"), Some(&Value::Int(768)));
                        // The raw vector never appears
                        assert!(summary.get("values").is_none());
                    }
                    other => panic!("expected summary map, got {other:?}"),
                }
            }
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn test_stats_contains_updates() {
        let mut stats = QueryStats::default();
        assert!(!stats.contains_updates());
        stats.properties_set = 1;
        assert!(stats.contains_updates());
    }
}
