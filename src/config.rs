//! Engine configuration.

use std::time::Duration;

/// Tunables for the query pipeline caches and the flush policy.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum entries in the parsed-plan cache.
    pub plan_cache_capacity: usize,
    /// Maximum entries in the result cache.
    pub result_cache_capacity: usize,
    /// Enable or disable result caching entirely.
    pub result_cache_enabled: bool,
    /// Fallback TTL when a query carries no hint.
    pub default_result_ttl: Duration,
    /// Start with deferred flushing (an outer layer flushes instead).
    pub defer_flush: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            plan_cache_capacity: 1000,
            result_cache_capacity: 1000,
            result_cache_enabled: true,
            default_result_ttl: Duration::from_secs(60),
            defer_flush: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `NORNICDB_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();

        fn parse<T: std::str::FromStr>(var: &str, fallback: T) -> T {
            std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(fallback)
        }

        EngineConfig {
            plan_cache_capacity: parse("NORNICDB_PLAN_CACHE_MAX_ENTRIES", defaults.plan_cache_capacity),
            result_cache_capacity: parse(
                "NORNICDB_RESULT_CACHE_MAX_ENTRIES",
                defaults.result_cache_capacity,
            ),
            result_cache_enabled: parse("NORNICDB_RESULT_CACHE_ENABLED", defaults.result_cache_enabled),
            default_result_ttl: Duration::from_secs(parse(
                "NORNICDB_RESULT_CACHE_TTL_SECS",
                defaults.default_result_ttl.as_secs(),
            )),
            defer_flush: parse("NORNICDB_DEFER_FLUSH", defaults.defer_flush),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.plan_cache_capacity, 1000);
        assert!(config.result_cache_enabled);
        assert!(!config.defer_flush);
    }
}
