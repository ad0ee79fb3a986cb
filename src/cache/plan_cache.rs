//! Parsed-plan cache: normalized query text → `QueryInfo`.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::cypher::QueryInfo;

/// Bounded LRU of query analyses. Readers share `Arc<QueryInfo>`s, so a
/// hit costs one map lookup and a refcount bump.
pub struct PlanCache {
    inner: Mutex<LruCache<String, Arc<QueryInfo>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PlanCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN),
            )),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fetch the analysis for normalized text, analyzing on miss.
    pub fn get_or_analyze(&self, normalized: &str) -> Arc<QueryInfo> {
        let mut cache = self.inner.lock();
        if let Some(info) = cache.get(normalized) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(info);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let info = Arc::new(QueryInfo::analyze(normalized));
        cache.put(normalized.to_string(), Arc::clone(&info));
        info
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
