//! # Cypher Text Layer
//!
//! Clause routing works directly on query text: keyword probing, pattern
//! parsing by bracket-depth tracking, and a lightweight on-demand AST for
//! analysis. There is deliberately no full grammar — the supported
//! Neo4j-compatible subset is dispatched by shape, and the pragmatic
//! choice is isolated here so a real parser could replace it without
//! touching the executors.

pub mod analyzer;
pub mod ast;
pub mod pattern;
pub mod text;

pub use analyzer::QueryInfo;
