//! Shared caches: parsed plans, query results, node lookups.
//!
//! These are the only shared mutable state in the core. All three are
//! internally synchronized; an `Engine` is shared across threads and
//! leans on that.

pub mod node_cache;
pub mod plan_cache;
pub mod result_cache;

pub use node_cache::NodeLookupCache;
pub use plan_cache::PlanCache;
pub use result_cache::{CacheStats, ResultCache, ResultCacheEntry, param_hash};
