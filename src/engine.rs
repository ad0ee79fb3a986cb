//! The `Engine`: the sole query entry point.
//!
//! One engine instance is shared across concurrent sessions. It owns the
//! caches, the procedure registry, the transaction coordinator, and the
//! optional callbacks; storage is consumed through the `GraphStorage`
//! trait and never assumed to be anything in particular.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::cache::{NodeLookupCache, PlanCache, ResultCache, param_hash};
use crate::config::EngineConfig;
use crate::cypher::text::{leading_keyword, normalize_whitespace};
use crate::eval::Bindings;
use crate::exec::context::{CancelToken, EmbedderFn, NodeCreatedFn, QueryContext};
use crate::exec::result::ExecutionResult;
use crate::exec::transaction::TransactionCoordinator;
use crate::exec::{self, explain};
use crate::procedures::{ProcedureFn, ProcedureRegistry};
use crate::storage::GraphStorage;
use crate::{Error, Result};

pub use crate::exec::context::Params;

pub struct Engine {
    storage: Arc<dyn GraphStorage>,
    config: EngineConfig,
    plan_cache: PlanCache,
    result_cache: ResultCache,
    node_cache: NodeLookupCache,
    procedures: RwLock<ProcedureRegistry>,
    coordinator: TransactionCoordinator,
    embedder: RwLock<Option<Box<EmbedderFn>>>,
    node_created: RwLock<Option<Box<NodeCreatedFn>>>,
    defer_flush: AtomicBool,
}

impl Engine {
    pub fn new<S: GraphStorage>(storage: S) -> Self {
        Self::with_config(storage, EngineConfig::default())
    }

    pub fn with_config<S: GraphStorage>(storage: S, config: EngineConfig) -> Self {
        Self {
            plan_cache: PlanCache::new(config.plan_cache_capacity),
            result_cache: ResultCache::new(
                config.result_cache_capacity,
                config.result_cache_enabled,
            ),
            node_cache: NodeLookupCache::new(),
            procedures: RwLock::new(ProcedureRegistry::new()),
            coordinator: TransactionCoordinator::new(),
            embedder: RwLock::new(None),
            node_created: RwLock::new(None),
            defer_flush: AtomicBool::new(config.defer_flush),
            storage: Arc::new(storage),
            config,
        }
    }

    /// In-memory engine for embedding and tests.
    pub fn open_memory() -> Self {
        Self::new(crate::storage::MemoryStorage::new())
    }

    // ========================================================================
    // Configuration hooks
    // ========================================================================

    /// Install the embedding callback used by vector query procedures.
    pub fn set_embedder(&self, f: impl Fn(&str) -> Result<Vec<f32>> + Send + Sync + 'static) {
        *self.embedder.write() = Some(Box::new(f));
    }

    /// Install the new-node notifier, invoked synchronously on the writer
    /// path.
    pub fn set_node_created_callback(&self, f: impl Fn(&crate::model::Node) + Send + Sync + 'static) {
        *self.node_created.write() = Some(Box::new(f));
    }

    /// Toggle write-behind deferral: when set, an outer layer performs
    /// the flush instead of the engine flushing after each statement.
    pub fn set_defer_flush(&self, defer: bool) {
        self.defer_flush.store(defer, Ordering::Relaxed);
    }

    /// Register a plugin procedure (`apoc.*`, `gds.*`, …).
    pub fn register_procedure(&self, name: &str, f: ProcedureFn) {
        self.procedures.write().register(name, f);
    }

    pub fn storage(&self) -> &Arc<dyn GraphStorage> {
        &self.storage
    }

    pub fn result_cache_stats(&self) -> crate::cache::CacheStats {
        self.result_cache.stats()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Execute a Cypher statement with parameters.
    pub fn execute(&self, query: &str, params: Params) -> Result<ExecutionResult> {
        self.execute_with(CancelToken::new(), query, params)
    }

    /// Execute with an externally controlled cancellation token.
    pub fn execute_with(
        &self,
        cancel: CancelToken,
        query: &str,
        params: Params,
    ) -> Result<ExecutionResult> {
        let text = query.trim().trim_end_matches(';').trim();
        if text.is_empty() {
            return Err(Error::SyntaxError {
                position: 0,
                message: "Empty statement".into(),
            });
        }

        // Transaction control statements bypass the pipeline entirely
        match leading_keyword(text).as_str() {
            "BEGIN" => {
                self.coordinator.begin(self.storage.as_ref())?;
                return Ok(ExecutionResult::empty());
            }
            "COMMIT" => {
                self.coordinator.commit()?;
                if !self.defer_flush.load(Ordering::Relaxed) {
                    self.storage.flush()?;
                }
                return Ok(ExecutionResult::empty());
            }
            "ROLLBACK" => {
                self.coordinator.rollback()?;
                return Ok(ExecutionResult::empty());
            }
            _ => {}
        }

        // EXPLAIN / PROFILE prefixes
        let (mode, inner_text) = match leading_keyword(text).as_str() {
            "EXPLAIN" => (Some(false), text["EXPLAIN".len()..].trim_start()),
            "PROFILE" => (Some(true), text["PROFILE".len()..].trim_start()),
            _ => (None, text),
        };

        let normalized = normalize_whitespace(inner_text);
        crate::cypher::text::check_balanced(&normalized)?;
        let info = self.plan_cache.get_or_analyze(&normalized);
        let read_only = info.is_read_only();

        // Result cache: read-only statements outside explicit transactions.
        // CALL is excluded — procedures may carry side effects.
        let params_hash = param_hash(&params);
        let cacheable = mode.is_none()
            && read_only
            && leading_keyword(&normalized) != "CALL"
            && !self.coordinator.is_active();
        if cacheable {
            if let Some(hit) = self.result_cache.get(&normalized, params_hash) {
                return Ok(hit);
            }
        }

        // Assemble the per-statement context
        let procedures = self.procedures.read();
        let embedder = self.embedder.read();
        let node_created = self.node_created.read();
        let mut ctx = QueryContext {
            storage: self.storage.as_ref(),
            procedures: &procedures,
            plan_cache: &self.plan_cache,
            result_cache: &self.result_cache,
            node_cache: &self.node_cache,
            embedder: embedder.as_deref(),
            node_created: node_created.as_deref(),
            cancel,
            params,
            stats: Default::default(),
        };

        let run = |ctx: &mut QueryContext| -> Result<ExecutionResult> {
            match mode {
                Some(profile) => {
                    let ast = info.ast()?;
                    explain::execute(ctx, ast.as_ref(), &normalized, profile)
                }
                None => exec::dispatch(ctx, &normalized),
            }
        };

        // EXPLAIN never executes; PROFILE of a write statement writes
        let executes_writes = !read_only && mode != Some(false);

        let outcome = if self.coordinator.is_active() {
            // Statement errors leave the explicit transaction open; the
            // client decides whether to ROLLBACK
            self.coordinator.run_in_explicit(|| run(&mut ctx))
        } else if executes_writes {
            let result = self
                .coordinator
                .run_implicit_write(self.storage.as_ref(), || run(&mut ctx));
            if result.is_ok() && !self.defer_flush.load(Ordering::Relaxed) {
                self.storage.flush()?;
            }
            result
        } else {
            run(&mut ctx)
        };

        let result = outcome?;

        if executes_writes {
            // Label-scoped invalidation; unknown label sets clear all
            self.result_cache.invalidate_labels(info.labels());
            // Node-lookup entries survive relationship-only deletes
            if ctx.stats.nodes_deleted > 0 {
                self.node_cache.invalidate();
            }
        }

        if cacheable {
            // Schema/SHOW queries keep their longer hint; plain data
            // queries use the configured TTL
            let ttl = if info.ttl() == crate::cypher::analyzer::SCHEMA_TTL {
                info.ttl()
            } else {
                self.config.default_result_ttl
            };
            self.result_cache
                .insert(&normalized, params_hash, &result, ttl, info.labels().clone());
        }

        Ok(result)
    }

    /// Strict-ACID single statement: same as `execute`, but the flush is
    /// forced synchronously even when deferred flushing is enabled.
    pub fn execute_sync(&self, query: &str, params: Params) -> Result<ExecutionResult> {
        let result = self.execute_with(CancelToken::new(), query, params)?;
        self.storage.flush()?;
        Ok(result)
    }

    /// Direct expression evaluation helper for embedders and tests:
    /// `RETURN <expr>` without the statement overhead.
    pub fn evaluate_expression(&self, expr: &str) -> Result<crate::model::Value> {
        let bindings = Bindings::new();
        let ctx = crate::eval::EvalContext::with_storage(&bindings, self.storage.as_ref());
        crate::eval::evaluate(&ctx, expr)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
