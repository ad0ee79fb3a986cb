//! Short-lived node lookup memoization.
//!
//! Maps `Label:{prop:value,…}` to the most recent node satisfying that
//! constraint. Read-mostly: lookups take the shared lock, stores the
//! exclusive one. Invalidated wholesale whenever a node-deleting write
//! occurs — relationship-only deletes leave it intact.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::model::{Node, Value};

pub struct NodeLookupCache {
    map: RwLock<HashMap<String, Node>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NodeLookupCache {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Canonical cache key for a label + property constraint. Properties
    /// are sorted so key construction is order-insensitive.
    pub fn key(label: &str, props: &[(String, Value)]) -> String {
        let mut parts: Vec<String> = props
            .iter()
            .map(|(k, v)| format!("{k}:{}", crate::cypher::text::encode_cypher_literal(v)))
            .collect();
        parts.sort();
        format!("{label}:{{{}}}", parts.join(","))
    }

    pub fn get(&self, key: &str) -> Option<Node> {
        let found = self.map.read().get(key).cloned();
        match &found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn put(&self, key: String, node: Node) {
        self.map.write().insert(key, node);
    }

    /// Drop everything. Called after any write that deletes nodes.
    pub fn invalidate(&self) {
        self.map.write().clear();
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl Default for NodeLookupCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;

    #[test]
    fn test_key_is_order_insensitive() {
        let a = NodeLookupCache::key(
            "Person",
            &[("a".into(), Value::Int(1)), ("b".into(), Value::from("x"))],
        );
        let b = NodeLookupCache::key(
            "Person",
            &[("b".into(), Value::from("x")), ("a".into(), Value::Int(1))],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_get_put_invalidate() {
        let cache = NodeLookupCache::new();
        let key = NodeLookupCache::key("Person", &[("name".into(), Value::from("Ada"))]);

        assert!(cache.get(&key).is_none());
        cache.put(key.clone(), Node::new(NodeId(1)));
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);

        cache.invalidate();
        assert!(cache.get(&key).is_none());
    }
}
