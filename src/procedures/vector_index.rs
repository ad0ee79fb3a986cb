//! `db.index.vector.queryNodes(indexName, k, queryVector)`.
//!
//! Scores nodes carrying a native embedding by cosine similarity and
//! returns the top k. The index name selects a vector index from the
//! schema when one exists (restricting candidates to its label);
//! otherwise every embedded node is a candidate.

use super::{ProcedureContext, ProcedureOutput};
use crate::model::Value;
use crate::{Error, Result};

pub fn query_nodes(ctx: &ProcedureContext, args: &[Value]) -> Result<ProcedureOutput> {
    let index_name = match args.first() {
        Some(Value::String(s)) => s.clone(),
        _ => {
            return Err(Error::TypeError {
                expected: "an index name string".into(),
                got: args.first().map(|v| v.type_name()).unwrap_or("nothing").into(),
            });
        }
    };
    let k = args.get(1).and_then(Value::as_int).unwrap_or(10).max(0) as usize;
    let query: Vec<f32> = match args.get(2).and_then(Value::as_f64_vec) {
        Some(v) => v.into_iter().map(|f| f as f32).collect(),
        None => {
            return Err(Error::TypeError {
                expected: "a numeric query vector".into(),
                got: args.get(2).map(|v| v.type_name()).unwrap_or("nothing").into(),
            });
        }
    };

    let label_filter = ctx
        .storage
        .schema()?
        .indexes
        .into_iter()
        .find(|i| i.name == index_name)
        .map(|i| i.label);

    let candidates = match &label_filter {
        Some(label) => ctx.storage.nodes_by_label(label)?,
        None => ctx.storage.all_nodes()?,
    };

    let mut scored: Vec<(f64, Value)> = candidates
        .into_iter()
        .filter_map(|node| {
            let embedding = node.embedding.as_ref()?;
            let score = cosine(embedding, &query)?;
            Some((score, Value::Node(Box::new(node))))
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);

    Ok(ProcedureOutput {
        columns: vec!["node".into(), "score".into()],
        rows: scored
            .into_iter()
            .map(|(score, node)| vec![node, Value::Float(score)])
            .collect(),
    })
}

fn cosine(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0f64;
    let mut norm_a = 0f64;
    let mut norm_b = 0f64;
    for (x, y) in a.iter().zip(b) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{NodeLookupCache, PlanCache, ResultCache};
    use crate::model::PropertyMap;
    use crate::storage::{GraphStorage, MemoryStorage};

    #[test]
    fn test_query_nodes_ranks_by_similarity() {
        let storage = MemoryStorage::new();
        storage
            .create_node(&["Doc".into()], PropertyMap::new(), Some(vec![1.0, 0.0]))
            .unwrap();
        storage
            .create_node(&["Doc".into()], PropertyMap::new(), Some(vec![0.0, 1.0]))
            .unwrap();
        storage.create_node(&["Doc".into()], PropertyMap::new(), None).unwrap();

        let plan = PlanCache::new(8);
        let result = ResultCache::new(8, true);
        let node = NodeLookupCache::new();
        let ctx = ProcedureContext {
            storage: &storage,
            plan_cache: &plan,
            result_cache: &result,
            node_cache: &node,
        };

        let out = query_nodes(
            &ctx,
            &[
                Value::from("docs"),
                Value::Int(2),
                Value::List(vec![Value::Float(1.0), Value::Float(0.0)]),
            ],
        )
        .unwrap();

        assert_eq!(out.columns, vec!["node", "score"]);
        assert_eq!(out.rows.len(), 2);
        // Best match first
        assert_eq!(out.rows[0][1], Value::Float(1.0));
    }
}
