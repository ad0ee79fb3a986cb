//! Label-aware result cache with per-entry TTL.
//!
//! Keyed by (normalized query, stable parameter hash). Only read-only
//! statements are cacheable. Writes evict every entry whose touched-label
//! set intersects the written labels; writes whose labels cannot be
//! determined clear the whole cache.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::exec::result::{ExecutionResult, QueryStats};
use crate::model::Value;

/// Stable hash of a parameter map: key-sorted canonical encoding, so
/// logically equal maps always collide into the same cache slot.
pub fn param_hash(params: &std::collections::HashMap<String, Value>) -> u64 {
    let canonical: BTreeMap<&String, String> = params
        .iter()
        .map(|(k, v)| (k, crate::cypher::text::encode_cypher_literal(v)))
        .collect();
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    canonical.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    query: String,
    param_hash: u64,
}

/// One cached result with its expiry and invalidation key set.
#[derive(Debug, Clone)]
pub struct ResultCacheEntry {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub stats: QueryStats,
    pub expires_at: Instant,
    pub labels_touched: BTreeSet<String>,
}

/// Counters surfaced through `nornicdb.cache.stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub size: usize,
}

pub struct ResultCache {
    inner: Mutex<LruCache<CacheKey, ResultCacheEntry>>,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl ResultCache {
    pub fn new(capacity: usize, enabled: bool) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN),
            )),
            enabled,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Look up a live entry. Expired entries are removed on sight.
    pub fn get(&self, query: &str, params_hash: u64) -> Option<ExecutionResult> {
        if !self.enabled {
            return None;
        }
        let key = CacheKey { query: query.to_string(), param_hash: params_hash };
        let mut cache = self.inner.lock();
        match cache.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(query, "result cache hit");
                Some(ExecutionResult {
                    columns: entry.columns.clone(),
                    rows: entry.rows.clone(),
                    stats: entry.stats.clone(),
                    plan: None,
                })
            }
            Some(_) => {
                cache.pop(&key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a read-only result. The caller guarantees read-only-ness;
    /// failed queries must never reach here.
    pub fn insert(
        &self,
        query: &str,
        params_hash: u64,
        result: &ExecutionResult,
        ttl: Duration,
        labels_touched: BTreeSet<String>,
    ) {
        if !self.enabled {
            return;
        }
        let entry = ResultCacheEntry {
            columns: result.columns.clone(),
            rows: result.rows.clone(),
            stats: result.stats.clone(),
            expires_at: Instant::now() + ttl,
            labels_touched,
        };
        self.inner
            .lock()
            .put(CacheKey { query: query.to_string(), param_hash: params_hash }, entry);
    }

    /// Evict every entry whose label set intersects `labels`.
    pub fn invalidate_labels(&self, labels: &BTreeSet<String>) {
        if labels.is_empty() {
            self.invalidate_all();
            return;
        }
        let mut cache = self.inner.lock();
        let doomed: Vec<CacheKey> = cache
            .iter()
            .filter(|(_, entry)| !entry.labels_touched.is_disjoint(labels))
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            cache.pop(&key);
            self.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Writes that cannot name their labels clear everything.
    pub fn invalidate_all(&self) {
        let mut cache = self.inner.lock();
        let evicted = cache.len() as u64;
        cache.clear();
        self.invalidations.fetch_add(evicted, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            size: self.inner.lock().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_of(value: i64) -> ExecutionResult {
        ExecutionResult {
            columns: vec!["c".into()],
            rows: vec![vec![Value::Int(value)]],
            stats: QueryStats::default(),
            plan: None,
        }
    }

    fn labels(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = ResultCache::new(10, true);
        cache.insert("Q", 1, &result_of(7), Duration::from_secs(60), labels(&["Person"]));

        let hit = cache.get("Q", 1).unwrap();
        assert_eq!(hit.rows, vec![vec![Value::Int(7)]]);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_different_params_miss() {
        let cache = ResultCache::new(10, true);
        cache.insert("Q", 1, &result_of(7), Duration::from_secs(60), labels(&[]));
        assert!(cache.get("Q", 2).is_none());
    }

    #[test]
    fn test_expired_entry_misses() {
        let cache = ResultCache::new(10, true);
        cache.insert("Q", 1, &result_of(7), Duration::from_secs(0), labels(&["Person"]));
        assert!(cache.get("Q", 1).is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_label_invalidation_is_scoped() {
        let cache = ResultCache::new(10, true);
        cache.insert("P", 0, &result_of(1), Duration::from_secs(60), labels(&["Person"]));
        cache.insert("C", 0, &result_of(2), Duration::from_secs(60), labels(&["Company"]));

        cache.invalidate_labels(&labels(&["Person"]));
        assert!(cache.get("P", 0).is_none());
        assert!(cache.get("C", 0).is_some());
    }

    #[test]
    fn test_unknown_labels_clear_everything() {
        let cache = ResultCache::new(10, true);
        cache.insert("P", 0, &result_of(1), Duration::from_secs(60), labels(&["Person"]));
        cache.invalidate_labels(&BTreeSet::new());
        assert!(cache.get("P", 0).is_none());
    }

    #[test]
    fn test_disabled_cache_never_stores() {
        let cache = ResultCache::new(10, false);
        cache.insert("Q", 1, &result_of(7), Duration::from_secs(60), labels(&[]));
        assert!(cache.get("Q", 1).is_none());
    }

    #[test]
    fn test_param_hash_is_order_insensitive() {
        let mut a = std::collections::HashMap::new();
        a.insert("x".to_string(), Value::Int(1));
        a.insert("y".to_string(), Value::from("s"));
        let mut b = std::collections::HashMap::new();
        b.insert("y".to_string(), Value::from("s"));
        b.insert("x".to_string(), Value::Int(1));
        assert_eq!(param_hash(&a), param_hash(&b));

        b.insert("x".to_string(), Value::Int(2));
        assert_ne!(param_hash(&a), param_hash(&b));
    }
}
