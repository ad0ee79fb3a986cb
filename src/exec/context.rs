//! Per-statement execution context and cancellation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cache::{NodeLookupCache, PlanCache, ResultCache};
use crate::eval::{Bindings, EvalContext};
use crate::exec::result::QueryStats;
use crate::model::{Node, Value};
use crate::procedures::ProcedureRegistry;
use crate::storage::GraphStorage;
use crate::{Error, Result};

/// Parameter map for one statement.
pub type Params = HashMap<String, Value>;

/// Cooperative cancellation token. Cheap to clone; long scans check it
/// between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Error out of the current executor if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Callback invoked synchronously for every node a statement creates.
pub type NodeCreatedFn = dyn Fn(&Node) + Send + Sync;

/// Callback that turns text into an embedding vector.
pub type EmbedderFn = dyn Fn(&str) -> Result<Vec<f32>> + Send + Sync;

/// Everything one statement execution needs. Built by the engine per
/// statement; executors thread `&mut` through the pipeline.
pub struct QueryContext<'a> {
    pub storage: &'a dyn GraphStorage,
    pub procedures: &'a ProcedureRegistry,
    pub plan_cache: &'a PlanCache,
    pub result_cache: &'a ResultCache,
    pub node_cache: &'a NodeLookupCache,
    pub embedder: Option<&'a EmbedderFn>,
    pub node_created: Option<&'a NodeCreatedFn>,
    pub cancel: CancelToken,
    pub params: Params,
    pub stats: QueryStats,
}

impl<'a> QueryContext<'a> {
    /// Evaluator view over a row of bindings, with graph access wired in.
    pub fn eval<'b>(&'b self, bindings: &'b Bindings) -> EvalContext<'b> {
        EvalContext::with_storage(bindings, self.storage)
    }

    pub fn procedure_context(&self) -> crate::procedures::ProcedureContext<'_> {
        crate::procedures::ProcedureContext {
            storage: self.storage,
            plan_cache: self.plan_cache,
            result_cache: self.result_cache,
            node_cache: self.node_cache,
        }
    }

    pub fn notify_node_created(&self, node: &Node) {
        if let Some(callback) = self.node_created {
            callback(node);
        }
    }
}
