//! Procedure execution for `CALL name(args) [YIELD cols]`.
//!
//! Procedures are dispatched by dotted name through a registry. Built-ins
//! cover schema metadata (`db.*`, `dbms.*`) and engine administration
//! (`nornicdb.*`); plugin families (`apoc.path.*`, `apoc.algo.*`,
//! `gds.*`) are installed through [`ProcedureRegistry::register`] by the
//! embedding application. Unknown procedures are an error — unlike
//! unknown functions, which evaluate to NULL.

pub mod db_metadata;
pub mod dbms_components;
pub mod nornicdb_admin;
pub mod vector_index;

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{NodeLookupCache, PlanCache, ResultCache};
use crate::model::Value;
use crate::storage::GraphStorage;
use crate::{Error, Result};

/// Everything a procedure may touch.
pub struct ProcedureContext<'a> {
    pub storage: &'a dyn GraphStorage,
    pub plan_cache: &'a PlanCache,
    pub result_cache: &'a ResultCache,
    pub node_cache: &'a NodeLookupCache,
}

/// Tabular procedure result.
#[derive(Debug, Clone, Default)]
pub struct ProcedureOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Function signature for procedure implementations.
pub type ProcedureFn =
    Arc<dyn Fn(&ProcedureContext, &[Value]) -> Result<ProcedureOutput> + Send + Sync + 'static>;

/// Registry of available procedures.
pub struct ProcedureRegistry {
    procedures: HashMap<String, ProcedureFn>,
}

impl ProcedureRegistry {
    /// Create a registry with all built-in procedures registered.
    pub fn new() -> Self {
        let mut registry = Self { procedures: HashMap::new() };

        registry.register("db.labels", Arc::new(db_metadata::labels));
        registry.register("db.relationshipTypes", Arc::new(db_metadata::relationship_types));
        registry.register("db.propertyKeys", Arc::new(db_metadata::property_keys));
        registry.register("dbms.components", Arc::new(dbms_components::execute));
        registry.register("db.index.vector.queryNodes", Arc::new(vector_index::query_nodes));
        registry.register("nornicdb.cache.stats", Arc::new(nornicdb_admin::cache_stats));
        registry.register("nornicdb.cache.clear", Arc::new(nornicdb_admin::cache_clear));
        registry.register("nornicdb.schema", Arc::new(nornicdb_admin::schema));

        registry
    }

    /// Register (or replace) a procedure under a dotted name. This is the
    /// extension point for apoc/gds-style plugin packs.
    pub fn register(&mut self, name: &str, func: ProcedureFn) {
        self.procedures.insert(name.to_string(), func);
    }

    pub fn get(&self, name: &str) -> Option<&ProcedureFn> {
        self.procedures.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    /// All registered names, sorted (SHOW PROCEDURES).
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.procedures.keys().cloned().collect();
        names.sort();
        names
    }

    /// Invoke a procedure with already-substituted arguments.
    pub fn call(
        &self,
        ctx: &ProcedureContext,
        name: &str,
        args: &[Value],
    ) -> Result<ProcedureOutput> {
        let func = self.get(name).ok_or_else(|| {
            Error::NotFound(format!(
                "There is no procedure with the name `{name}` registered for this database instance"
            ))
        })?;
        func(ctx, args)
    }
}

impl Default for ProcedureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn test_ctx<'a>(
        storage: &'a MemoryStorage,
        plan: &'a PlanCache,
        result: &'a ResultCache,
        node: &'a NodeLookupCache,
    ) -> ProcedureContext<'a> {
        ProcedureContext { storage, plan_cache: plan, result_cache: result, node_cache: node }
    }

    #[test]
    fn test_registry_has_builtins() {
        let registry = ProcedureRegistry::new();
        assert!(registry.contains("db.labels"));
        assert!(registry.contains("db.relationshipTypes"));
        assert!(registry.contains("db.propertyKeys"));
        assert!(registry.contains("dbms.components"));
        assert!(registry.contains("db.index.vector.queryNodes"));
        assert!(registry.contains("nornicdb.cache.stats"));
    }

    #[test]
    fn test_unknown_procedure_errors() {
        let registry = ProcedureRegistry::new();
        let storage = MemoryStorage::new();
        let plan = PlanCache::new(8);
        let result = ResultCache::new(8, true);
        let node = NodeLookupCache::new();
        let ctx = test_ctx(&storage, &plan, &result, &node);

        let err = registry.call(&ctx, "apoc.missing.thing", &[]).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_register_plugin_procedure() {
        let mut registry = ProcedureRegistry::new();
        registry.register(
            "gds.echo",
            Arc::new(|_ctx, args| {
                Ok(ProcedureOutput {
                    columns: vec!["value".into()],
                    rows: vec![vec![args.first().cloned().unwrap_or(Value::Null)]],
                })
            }),
        );
        assert!(registry.contains("gds.echo"));
    }
}
