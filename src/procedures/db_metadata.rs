//! `db.*` schema metadata procedures.
//!
//! The storage interface exposes scans, not label catalogs, so these
//! derive their answers from the live graph. Output is sorted for
//! stable, Neo4j Browser-friendly results.

use std::collections::BTreeSet;

use super::{ProcedureContext, ProcedureOutput};
use crate::model::Value;
use crate::Result;

/// `db.labels()` — every label present on at least one node.
pub fn labels(ctx: &ProcedureContext, _args: &[Value]) -> Result<ProcedureOutput> {
    let mut labels: BTreeSet<String> = BTreeSet::new();
    for node in ctx.storage.all_nodes()? {
        labels.extend(node.labels.iter().cloned());
    }
    Ok(ProcedureOutput {
        columns: vec!["label".into()],
        rows: labels.into_iter().map(|l| vec![Value::String(l)]).collect(),
    })
}

/// `db.relationshipTypes()` — every relationship type in use.
pub fn relationship_types(ctx: &ProcedureContext, _args: &[Value]) -> Result<ProcedureOutput> {
    let mut types: BTreeSet<String> = BTreeSet::new();
    for rel in ctx.storage.all_relationships()? {
        types.insert(rel.rel_type);
    }
    Ok(ProcedureOutput {
        columns: vec!["relationshipType".into()],
        rows: types.into_iter().map(|t| vec![Value::String(t)]).collect(),
    })
}

/// `db.propertyKeys()` — union of property keys across nodes and
/// relationships.
pub fn property_keys(ctx: &ProcedureContext, _args: &[Value]) -> Result<ProcedureOutput> {
    let mut keys: BTreeSet<String> = BTreeSet::new();
    for node in ctx.storage.all_nodes()? {
        keys.extend(node.properties.keys().cloned());
    }
    for rel in ctx.storage.all_relationships()? {
        keys.extend(rel.properties.keys().cloned());
    }
    Ok(ProcedureOutput {
        columns: vec!["propertyKey".into()],
        rows: keys.into_iter().map(|k| vec![Value::String(k)]).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{NodeLookupCache, PlanCache, ResultCache};
    use crate::model::PropertyMap;
    use crate::storage::{GraphStorage, MemoryStorage};

    #[test]
    fn test_labels_sorted_and_deduplicated() {
        let storage = MemoryStorage::new();
        let mut props = PropertyMap::new();
        props.insert("name".into(), Value::from("Ada"));
        storage.create_node(&["Person".into()], props, None).unwrap();
        storage.create_node(&["Person".into(), "Admin".into()], PropertyMap::new(), None).unwrap();

        let plan = PlanCache::new(8);
        let result = ResultCache::new(8, true);
        let node = NodeLookupCache::new();
        let ctx = ProcedureContext {
            storage: &storage,
            plan_cache: &plan,
            result_cache: &result,
            node_cache: &node,
        };

        let out = labels(&ctx, &[]).unwrap();
        assert_eq!(out.columns, vec!["label"]);
        assert_eq!(
            out.rows,
            vec![
                vec![Value::String("Admin".into())],
                vec![Value::String("Person".into())]
            ]
        );

        let keys = property_keys(&ctx, &[]).unwrap();
        assert_eq!(keys.rows, vec![vec![Value::String("name".into())]]);
    }
}
