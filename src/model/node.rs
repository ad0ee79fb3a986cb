//! Node in the property graph.

use serde::{Deserialize, Serialize};

use super::{PropertyMap, Value};

/// Opaque node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in the property graph.
///
/// The `embedding` field is the native vector slot: `SET n.embedding = [...]`
/// writes here instead of the property map, and query results only ever
/// expose a structural summary of it, never the raw vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
    pub embedding: Option<Vec<f32>>,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            labels: Vec::new(),
            properties: PropertyMap::new(),
            embedding: None,
        }
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// True when the node carries a vector, either natively or as an
    /// `embedding` property left over from an import.
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some() || self.properties.contains_key("embedding")
    }

    /// Structural summary of the embedding. Raw vectors never leave the
    /// storage layer through query results.
    pub fn embedding_summary(&self) -> Value {
        match (&self.embedding, self.properties.get("embedding")) {
            (Some(vec), _) => Value::Map(
                [
                    ("dimensions".to_string(), Value::Int(vec.len() as i64)),
                    ("status".to_string(), Value::String("present".into())),
                ]
                .into_iter()
                .collect(),
            ),
            (None, Some(Value::List(items))) => Value::Map(
                [
                    ("dimensions".to_string(), Value::Int(items.len() as i64)),
                    ("status".to_string(), Value::String("property".into())),
                ]
                .into_iter()
                .collect(),
            ),
            _ => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_summary_hides_raw_vector() {
        let mut node = Node::new(NodeId(1));
        assert_eq!(node.embedding_summary(), Value::Null);
        assert!(!node.has_embedding());

        node.embedding = Some(vec![0.1, 0.2, 0.3]);
        assert!(node.has_embedding());
        match node.embedding_summary() {
            Value::Map(m) => {
                assert_eq!(m.get("dimensions"), Some(&Value::Int(3)));
                assert_eq!(m.get("status"), Some(&Value::String("present".into())));
            }
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn test_has_label() {
        let node = Node::new(NodeId(1)).with_labels(["Person", "Admin"]);
        assert!(node.has_label("Person"));
        assert!(node.has_label("Admin"));
        assert!(!node.has_label("Robot"));
    }
}
