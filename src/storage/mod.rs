//! # Storage Trait
//!
//! This is THE contract between the query pipeline and any storage engine.
//! Every operation the executors need is defined here; the pipeline makes
//! no assumption about what sits behind it (in-memory maps, an on-disk
//! store, a remote server).
//!
//! The trait is synchronous: the execution model is parallel threads, and
//! backends block on their own I/O. Backends must be internally
//! thread-safe — an `Engine` is shared across concurrent query requests.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::{Error, Result};

pub use memory::MemoryStorage;

// ============================================================================
// Schema metadata (index / constraint DDL)
// ============================================================================

/// Type of secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexType {
    /// Default range index for equality and range scans.
    Range,
    /// Full-text search index.
    FullText,
    /// Vector similarity index over node embeddings.
    Vector,
}

/// Type of schema constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintType {
    /// Property value must be unique among nodes carrying the label.
    Unique,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    pub label: String,
    pub properties: Vec<String>,
    pub index_type: IndexType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDef {
    pub name: String,
    pub label: String,
    pub property: String,
    pub constraint_type: ConstraintType,
}

/// Snapshot of the schema objects a backend knows about. Consumed by
/// `SHOW INDEXES` / `SHOW CONSTRAINTS` and by constraint DDL.
#[derive(Debug, Clone, Default)]
pub struct GraphSchema {
    pub indexes: Vec<IndexDef>,
    pub constraints: Vec<ConstraintDef>,
}

// ============================================================================
// Transactions
// ============================================================================

/// Opaque transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub u64);

/// A live storage transaction.
///
/// Obtained from [`GraphStorage::begin`]. Writes issued while the
/// transaction is open are undone by `rollback`. Implementations must
/// release the transaction on drop (rollback) if neither `commit` nor
/// `rollback` was called — the executor relies on this for cleanup on
/// every exit path, including panics.
pub trait StorageTransaction: Send {
    fn id(&self) -> TxId;
    fn commit(self: Box<Self>) -> Result<()>;
    fn rollback(self: Box<Self>) -> Result<()>;
}

// ============================================================================
// GraphStorage Trait
// ============================================================================

/// The universal storage contract.
///
/// Backends should return `Error::StorageError` for operations they cannot
/// handle rather than panicking. Nodes returned from reads are snapshots:
/// the executors treat them as read-only and route every mutation back
/// through this trait.
pub trait GraphStorage: Send + Sync + 'static {
    // ========================================================================
    // Node CRUD
    // ========================================================================

    /// Create a node. `embedding` lands in the node's native vector slot,
    /// never in the property map.
    fn create_node(
        &self,
        labels: &[String],
        props: PropertyMap,
        embedding: Option<Vec<f32>>,
    ) -> Result<NodeId>;

    /// Get a node by id. Returns None if not found.
    fn get_node(&self, id: NodeId) -> Result<Option<Node>>;

    /// Replace a node's labels, properties, and embedding with the given
    /// snapshot. The id must exist.
    fn update_node(&self, node: &Node) -> Result<()>;

    /// Delete a node. Returns true if it existed.
    /// Fails if the node still has relationships (Neo4j semantics).
    fn delete_node(&self, id: NodeId) -> Result<bool>;

    /// All nodes carrying the label.
    fn nodes_by_label(&self, label: &str) -> Result<Vec<Node>>;

    /// First node carrying the label, if any. Backends with ordered ids
    /// return the lowest id; the lookup-cache fast path depends only on
    /// it being deterministic between writes.
    fn first_node_by_label(&self, label: &str) -> Result<Option<Node>>;

    /// Return all nodes (no label filter).
    fn all_nodes(&self) -> Result<Vec<Node>>;

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    fn create_relationship(
        &self,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId>;

    fn get_relationship(&self, id: RelId) -> Result<Option<Relationship>>;

    /// Replace a relationship's properties with the given snapshot.
    fn update_relationship(&self, rel: &Relationship) -> Result<()>;

    /// Delete a relationship. Returns true if it existed.
    fn delete_relationship(&self, id: RelId) -> Result<bool>;

    /// Relationships leaving the node.
    fn outgoing_relationships(&self, node: NodeId) -> Result<Vec<Relationship>>;

    /// Relationships arriving at the node.
    fn incoming_relationships(&self, node: NodeId) -> Result<Vec<Relationship>>;

    fn all_relationships(&self) -> Result<Vec<Relationship>>;

    // ========================================================================
    // Counts
    // ========================================================================

    fn node_count(&self) -> Result<u64>;
    fn relationship_count(&self) -> Result<u64>;

    // ========================================================================
    // Schema / DDL
    // ========================================================================

    /// Snapshot of indexes and constraints.
    fn schema(&self) -> Result<GraphSchema>;

    fn create_index(&self, def: IndexDef) -> Result<()>;

    fn drop_index(&self, name: &str) -> Result<()>;

    fn create_constraint(&self, def: ConstraintDef) -> Result<()>;

    fn drop_constraint(&self, name: &str) -> Result<()>;

    // ========================================================================
    // Write-behind
    // ========================================================================

    /// Flush buffered writes. No-op for backends that write through.
    fn flush(&self) -> Result<()>;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a transaction. At most one may be active at a time per
    /// backend; the session layer serializes statements, so this is not a
    /// throughput constraint.
    fn begin(&self) -> Result<Box<dyn StorageTransaction>>;
}

/// Convenience: relationships of a node filtered by direction.
pub fn relationships_for(
    storage: &dyn GraphStorage,
    node: NodeId,
    dir: Direction,
) -> Result<Vec<Relationship>> {
    match dir {
        Direction::Outgoing => storage.outgoing_relationships(node),
        Direction::Incoming => storage.incoming_relationships(node),
        Direction::Both => {
            let mut rels = storage.outgoing_relationships(node)?;
            for rel in storage.incoming_relationships(node)? {
                // Self-loops appear in both lists once
                if !rels.iter().any(|r| r.id == rel.id) {
                    rels.push(rel);
                }
            }
            Ok(rels)
        }
    }
}

/// Detach-delete helper: remove all incident relationships, then the node.
pub fn detach_delete_node(storage: &dyn GraphStorage, id: NodeId) -> Result<(bool, u64)> {
    let mut removed_rels = 0u64;
    for rel in relationships_for(storage, id, Direction::Both)? {
        if storage.delete_relationship(rel.id)? {
            removed_rels += 1;
        }
    }
    let existed = storage.delete_node(id)?;
    Ok((existed, removed_rels))
}

impl Error {
    /// Uniform constraint-violation message used by backends.
    pub fn unique_violation(label: &str, property: &str, value: &Value) -> Error {
        Error::ConstraintViolation(format!(
            "Node already exists with label `{label}` and property `{property}` = {value}"
        ))
    }
}
