//! # NornicDB — Neo4j-compatible Cypher query engine
//!
//! A Cypher execution core over pluggable graph storage. The engine
//! routes and executes a pragmatic Neo4j-compatible clause subset,
//! evaluates expressions over heterogeneous runtime values, and keeps
//! label-aware result caches coherent under concurrent access.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStorage` is the contract between the query
//!    pipeline and storage — the core owns no persistent state
//! 2. **Clean DTOs**: `Node`, `Relationship`, `Value` cross all boundaries
//! 3. **Text-driven routing**: clauses are dispatched by keyword probing,
//!    isolated in `cypher`, so a full parser could replace it later
//! 4. **Shared executor**: one `Engine` serves concurrent sessions;
//!    caches are the only shared mutable state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nornicdb::{Engine, MemoryStorage, Params};
//!
//! # fn example() -> nornicdb::Result<()> {
//! let engine = Engine::new(MemoryStorage::new());
//!
//! let mut params = Params::new();
//! params.insert("name".into(), nornicdb::Value::from("Ada"));
//! engine.execute("CREATE (n:Person {name: $name})", params)?;
//!
//! let result = engine.execute("MATCH (n:Person) RETURN n.name", Params::new())?;
//! for row in &result.rows {
//!     println!("{:?}", row[0]);
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cache;
pub mod config;
pub mod cypher;
pub mod engine;
pub mod eval;
pub mod exec;
pub mod model;
pub mod procedures;
pub mod storage;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{Direction, IsoDuration, Node, NodeId, Path, Point, PropertyMap, RelId, Relationship, Value};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{
    ConstraintDef, ConstraintType, GraphSchema, GraphStorage, IndexDef, IndexType, MemoryStorage,
    StorageTransaction, TxId,
};

// ============================================================================
// Re-exports: Engine & execution
// ============================================================================

pub use config::EngineConfig;
pub use engine::{Engine, Params};
pub use exec::context::CancelToken;
pub use exec::result::{ExecutionResult, QueryStats};

// ============================================================================
// Error Types
// ============================================================================

/// Crate-wide error. Clone-able so that a failed lazy AST build can be
/// memoized and surfaced to every caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Cypher syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Transaction error: {0}")]
    TxError(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("The query was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
