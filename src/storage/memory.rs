//! In-memory storage backend.
//!
//! This is the reference implementation of `GraphStorage`: hashmaps and a
//! label index behind `parking_lot` locks, atomic id counters, and an
//! undo-log transaction so ROLLBACK actually reverts writes.
//!
//! ## Limitations
//!
//! - **Single active transaction**: the undo log covers one transaction at
//!   a time. Statements are serialized by the session layer, so this is
//!   not a throughput constraint, but concurrent explicit transactions
//!   from different sessions are rejected.
//! - **No property indexes**: `create_index()` only records metadata.
//!   Property lookups scan the label.
//!
//! Use this backend for embedding the engine without persistence and for
//! exercising the query pipeline in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use super::{
    ConstraintDef, GraphSchema, GraphStorage, IndexDef, StorageTransaction, TxId,
};
use crate::model::*;
use crate::{Error, Result};

// ============================================================================
// MemoryStorage
// ============================================================================

/// In-memory property graph storage.
pub struct MemoryStorage {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    relationships: RwLock<HashMap<RelId, Relationship>>,
    /// node_id → incident relationship ids (both directions)
    adjacency: RwLock<HashMap<NodeId, Vec<RelId>>>,
    /// label → node ids carrying it
    label_index: RwLock<HashMap<String, Vec<NodeId>>>,
    schema: RwLock<GraphSchema>,
    /// Active transaction's undo log, None outside a transaction.
    undo: Mutex<Option<UndoLog>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
    next_tx_id: AtomicU64,
}

struct UndoLog {
    tx_id: TxId,
    ops: Vec<UndoOp>,
}

/// Inverse operations, applied in reverse order on rollback.
enum UndoOp {
    RemoveNode(NodeId),
    RestoreNode(Node),
    RemoveRel(RelId),
    RestoreRel(Relationship),
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                relationships: RwLock::new(HashMap::new()),
                adjacency: RwLock::new(HashMap::new()),
                label_index: RwLock::new(HashMap::new()),
                schema: RwLock::new(GraphSchema::default()),
                undo: Mutex::new(None),
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInner {
    fn log(&self, op: UndoOp) {
        if let Some(undo) = self.undo.lock().as_mut() {
            undo.ops.push(op);
        }
    }

    fn raw_insert_node(&self, node: Node) {
        let id = node.id;
        {
            let mut idx = self.label_index.write();
            for label in &node.labels {
                let ids = idx.entry(label.clone()).or_default();
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        self.nodes.write().insert(id, node);
        self.adjacency.write().entry(id).or_default();
    }

    fn raw_remove_node(&self, id: NodeId) -> Option<Node> {
        let removed = self.nodes.write().remove(&id);
        self.adjacency.write().remove(&id);
        if let Some(node) = &removed {
            let mut idx = self.label_index.write();
            for label in &node.labels {
                if let Some(ids) = idx.get_mut(label) {
                    ids.retain(|nid| *nid != id);
                }
            }
        }
        removed
    }

    fn raw_insert_rel(&self, rel: Relationship) {
        let (id, src, dst) = (rel.id, rel.src, rel.dst);
        self.relationships.write().insert(id, rel);
        let mut adj = self.adjacency.write();
        adj.entry(src).or_default().push(id);
        if src != dst {
            adj.entry(dst).or_default().push(id);
        }
    }

    fn raw_remove_rel(&self, id: RelId) -> Option<Relationship> {
        let removed = self.relationships.write().remove(&id);
        if let Some(rel) = &removed {
            let mut adj = self.adjacency.write();
            if let Some(rels) = adj.get_mut(&rel.src) {
                rels.retain(|rid| *rid != id);
            }
            if rel.src != rel.dst {
                if let Some(rels) = adj.get_mut(&rel.dst) {
                    rels.retain(|rid| *rid != id);
                }
            }
        }
        removed
    }

    /// Unique-constraint check: no *other* node with the same label may
    /// carry the same value for the constrained property.
    fn check_constraints(&self, candidate: &Node, ignore: Option<NodeId>) -> Result<()> {
        let schema = self.schema.read();
        if schema.constraints.is_empty() {
            return Ok(());
        }
        let nodes = self.nodes.read();
        let idx = self.label_index.read();
        for constraint in &schema.constraints {
            if !candidate.labels.iter().any(|l| *l == constraint.label) {
                continue;
            }
            let Some(value) = candidate.get(&constraint.property) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let ids = idx.get(&constraint.label).cloned().unwrap_or_default();
            for id in ids {
                if Some(id) == ignore || id == candidate.id {
                    continue;
                }
                if let Some(existing) = nodes.get(&id) {
                    if existing.get(&constraint.property).is_some_and(|v| v.cypher_eq(value)) {
                        return Err(Error::unique_violation(
                            &constraint.label,
                            &constraint.property,
                            value,
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// Handle for the active undo-log transaction.
pub struct MemoryTx {
    id: TxId,
    inner: Arc<MemoryInner>,
    finished: bool,
}

impl MemoryTx {
    fn finish(&mut self, rollback: bool) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let log = self.inner.undo.lock().take();
        let Some(log) = log else {
            return Err(Error::TxError("no active transaction".into()));
        };
        if log.tx_id != self.id {
            return Err(Error::TxError("transaction handle is stale".into()));
        }
        if rollback {
            for op in log.ops.into_iter().rev() {
                match op {
                    UndoOp::RemoveNode(id) => {
                        self.inner.raw_remove_node(id);
                    }
                    UndoOp::RestoreNode(node) => {
                        // A restored node may replace a mutated copy
                        self.inner.raw_remove_node(node.id);
                        self.inner.raw_insert_node(node);
                    }
                    UndoOp::RemoveRel(id) => {
                        self.inner.raw_remove_rel(id);
                    }
                    UndoOp::RestoreRel(rel) => {
                        self.inner.raw_remove_rel(rel.id);
                        self.inner.raw_insert_rel(rel);
                    }
                }
            }
        }
        Ok(())
    }
}

impl StorageTransaction for MemoryTx {
    fn id(&self) -> TxId {
        self.id
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish(false)
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish(true)
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        // Abandoned transactions roll back, on every exit path.
        let _ = self.finish(true);
    }
}

// ============================================================================
// GraphStorage impl
// ============================================================================

impl GraphStorage for MemoryStorage {
    fn create_node(
        &self,
        labels: &[String],
        props: PropertyMap,
        embedding: Option<Vec<f32>>,
    ) -> Result<NodeId> {
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node {
            id,
            labels: labels.to_vec(),
            properties: props,
            embedding,
        };
        self.inner.check_constraints(&node, None)?;
        self.inner.log(UndoOp::RemoveNode(id));
        self.inner.raw_insert_node(node);
        Ok(id)
    }

    fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    fn update_node(&self, node: &Node) -> Result<()> {
        let old = self
            .inner
            .nodes
            .read()
            .get(&node.id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Node {}", node.id)))?;
        self.inner.check_constraints(node, Some(node.id))?;
        self.inner.log(UndoOp::RestoreNode(old.clone()));

        // Labels may have changed — rebuild the index entries for this node
        {
            let mut idx = self.inner.label_index.write();
            for label in &old.labels {
                if let Some(ids) = idx.get_mut(label) {
                    ids.retain(|nid| *nid != node.id);
                }
            }
            for label in &node.labels {
                let ids = idx.entry(label.clone()).or_default();
                if !ids.contains(&node.id) {
                    ids.push(node.id);
                }
            }
        }
        self.inner.nodes.write().insert(node.id, node.clone());
        Ok(())
    }

    fn delete_node(&self, id: NodeId) -> Result<bool> {
        {
            let adj = self.inner.adjacency.read();
            if let Some(rels) = adj.get(&id) {
                if !rels.is_empty() {
                    return Err(Error::ConstraintViolation(format!(
                        "Cannot delete node {id} because it still has {} relationships. \
                         Use DETACH DELETE to delete the node and its relationships.",
                        rels.len()
                    )));
                }
            }
        }
        match self.inner.raw_remove_node(id) {
            Some(node) => {
                self.inner.log(UndoOp::RestoreNode(node));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>> {
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();
        let ids = idx.get(label).cloned().unwrap_or_default();
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }

    fn first_node_by_label(&self, label: &str) -> Result<Option<Node>> {
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();
        Ok(idx
            .get(label)
            .and_then(|ids| ids.iter().min_by_key(|id| id.0))
            .and_then(|id| nodes.get(id).cloned()))
    }

    fn all_nodes(&self) -> Result<Vec<Node>> {
        let mut all: Vec<Node> = self.inner.nodes.read().values().cloned().collect();
        all.sort_by_key(|n| n.id.0);
        Ok(all)
    }

    fn create_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&src) {
                return Err(Error::NotFound(format!("Source node {src}")));
            }
            if !nodes.contains_key(&dst) {
                return Err(Error::NotFound(format!("Target node {dst}")));
            }
        }
        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        let rel = Relationship {
            id,
            src,
            dst,
            rel_type: rel_type.to_string(),
            properties: props,
        };
        self.inner.log(UndoOp::RemoveRel(id));
        self.inner.raw_insert_rel(rel);
        Ok(id)
    }

    fn get_relationship(&self, id: RelId) -> Result<Option<Relationship>> {
        Ok(self.inner.relationships.read().get(&id).cloned())
    }

    fn update_relationship(&self, rel: &Relationship) -> Result<()> {
        let old = self
            .inner
            .relationships
            .read()
            .get(&rel.id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Relationship {}", rel.id)))?;
        self.inner.log(UndoOp::RestoreRel(old));
        self.inner.relationships.write().insert(rel.id, rel.clone());
        Ok(())
    }

    fn delete_relationship(&self, id: RelId) -> Result<bool> {
        match self.inner.raw_remove_rel(id) {
            Some(rel) => {
                self.inner.log(UndoOp::RestoreRel(rel));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn outgoing_relationships(&self, node: NodeId) -> Result<Vec<Relationship>> {
        let adj = self.inner.adjacency.read();
        let rels = self.inner.relationships.read();
        let rel_ids = adj.get(&node).cloned().unwrap_or_default();
        Ok(rel_ids
            .iter()
            .filter_map(|rid| rels.get(rid))
            .filter(|r| r.src == node)
            .cloned()
            .collect())
    }

    fn incoming_relationships(&self, node: NodeId) -> Result<Vec<Relationship>> {
        let adj = self.inner.adjacency.read();
        let rels = self.inner.relationships.read();
        let rel_ids = adj.get(&node).cloned().unwrap_or_default();
        Ok(rel_ids
            .iter()
            .filter_map(|rid| rels.get(rid))
            .filter(|r| r.dst == node)
            .cloned()
            .collect())
    }

    fn all_relationships(&self) -> Result<Vec<Relationship>> {
        let mut all: Vec<Relationship> =
            self.inner.relationships.read().values().cloned().collect();
        all.sort_by_key(|r| r.id.0);
        Ok(all)
    }

    fn node_count(&self) -> Result<u64> {
        Ok(self.inner.nodes.read().len() as u64)
    }

    fn relationship_count(&self) -> Result<u64> {
        Ok(self.inner.relationships.read().len() as u64)
    }

    fn schema(&self) -> Result<GraphSchema> {
        Ok(self.inner.schema.read().clone())
    }

    fn create_index(&self, def: IndexDef) -> Result<()> {
        let mut schema = self.inner.schema.write();
        if schema.indexes.iter().any(|i| i.name == def.name) {
            return Err(Error::TxError(format!("An index named `{}` already exists", def.name)));
        }
        schema.indexes.push(def);
        Ok(())
    }

    fn drop_index(&self, name: &str) -> Result<()> {
        self.inner.schema.write().indexes.retain(|i| i.name != name);
        Ok(())
    }

    fn create_constraint(&self, def: ConstraintDef) -> Result<()> {
        let mut schema = self.inner.schema.write();
        if schema.constraints.iter().any(|c| c.name == def.name) {
            return Err(Error::TxError(format!(
                "A constraint named `{}` already exists",
                def.name
            )));
        }
        schema.constraints.push(def);
        Ok(())
    }

    fn drop_constraint(&self, name: &str) -> Result<()> {
        self.inner.schema.write().constraints.retain(|c| c.name != name);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // Writes apply immediately; nothing buffered.
        Ok(())
    }

    fn begin(&self) -> Result<Box<dyn StorageTransaction>> {
        let mut undo = self.inner.undo.lock();
        if undo.is_some() {
            return Err(Error::TxError("a transaction is already active".into()));
        }
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        *undo = Some(UndoLog { tx_id: id, ops: Vec::new() });
        drop(undo);
        Ok(Box::new(MemoryTx {
            id,
            inner: Arc::clone(&self.inner),
            finished: false,
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ConstraintType;

    #[test]
    fn test_create_and_get_node() {
        let db = MemoryStorage::new();
        let mut props = PropertyMap::new();
        props.insert("name".into(), Value::from("Ada"));

        let id = db.create_node(&["Person".into()], props, None).unwrap();
        let node = db.get_node(id).unwrap().unwrap();

        assert_eq!(node.labels, vec!["Person"]);
        assert_eq!(node.get("name"), Some(&Value::from("Ada")));
    }

    #[test]
    fn test_create_relationship_and_adjacency() {
        let db = MemoryStorage::new();
        let a = db.create_node(&["Person".into()], PropertyMap::new(), None).unwrap();
        let b = db.create_node(&["Person".into()], PropertyMap::new(), None).unwrap();

        let rid = db.create_relationship(a, b, "KNOWS", PropertyMap::new()).unwrap();
        let rel = db.get_relationship(rid).unwrap().unwrap();
        assert_eq!(rel.src, a);
        assert_eq!(rel.dst, b);

        assert_eq!(db.outgoing_relationships(a).unwrap().len(), 1);
        assert_eq!(db.incoming_relationships(b).unwrap().len(), 1);
        assert_eq!(db.outgoing_relationships(b).unwrap().len(), 0);
    }

    #[test]
    fn test_cannot_delete_connected_node() {
        let db = MemoryStorage::new();
        let a = db.create_node(&["Person".into()], PropertyMap::new(), None).unwrap();
        let b = db.create_node(&["Person".into()], PropertyMap::new(), None).unwrap();
        db.create_relationship(a, b, "KNOWS", PropertyMap::new()).unwrap();

        assert!(db.delete_node(a).is_err());

        let (existed, removed) = crate::storage::detach_delete_node(&db, a).unwrap();
        assert!(existed);
        assert_eq!(removed, 1);
        assert!(db.get_node(a).unwrap().is_none());
        assert_eq!(db.relationship_count().unwrap(), 0);
    }

    #[test]
    fn test_update_node_relabels_index() {
        let db = MemoryStorage::new();
        let id = db.create_node(&["Person".into()], PropertyMap::new(), None).unwrap();

        let mut node = db.get_node(id).unwrap().unwrap();
        node.labels = vec!["Robot".into()];
        db.update_node(&node).unwrap();

        assert!(db.nodes_by_label("Person").unwrap().is_empty());
        assert_eq!(db.nodes_by_label("Robot").unwrap().len(), 1);
    }

    #[test]
    fn test_unique_constraint_rejects_duplicate() {
        let db = MemoryStorage::new();
        db.create_constraint(ConstraintDef {
            name: "c1".into(),
            label: "Person".into(),
            property: "email".into(),
            constraint_type: ConstraintType::Unique,
        })
        .unwrap();

        let mut props = PropertyMap::new();
        props.insert("email".into(), Value::from("ada@example.com"));
        db.create_node(&["Person".into()], props.clone(), None).unwrap();

        let err = db.create_node(&["Person".into()], props, None).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[test]
    fn test_rollback_undoes_creates_and_deletes() {
        let db = MemoryStorage::new();
        let keep = db.create_node(&["Person".into()], PropertyMap::new(), None).unwrap();

        let tx = db.begin().unwrap();
        let created = db.create_node(&["Person".into()], PropertyMap::new(), None).unwrap();
        db.delete_node(keep).unwrap();
        tx.rollback().unwrap();

        assert!(db.get_node(created).unwrap().is_none());
        assert!(db.get_node(keep).unwrap().is_some());
        assert_eq!(db.node_count().unwrap(), 1);
    }

    #[test]
    fn test_commit_keeps_writes() {
        let db = MemoryStorage::new();
        let tx = db.begin().unwrap();
        let id = db.create_node(&["Person".into()], PropertyMap::new(), None).unwrap();
        tx.commit().unwrap();
        assert!(db.get_node(id).unwrap().is_some());
    }

    #[test]
    fn test_nested_begin_rejected() {
        let db = MemoryStorage::new();
        let _tx = db.begin().unwrap();
        assert!(matches!(db.begin(), Err(Error::TxError(_))));
    }

    #[test]
    fn test_dropped_tx_rolls_back() {
        let db = MemoryStorage::new();
        let created;
        {
            let _tx = db.begin().unwrap();
            created = db.create_node(&["Person".into()], PropertyMap::new(), None).unwrap();
        }
        assert!(db.get_node(created).unwrap().is_none());
    }
}
