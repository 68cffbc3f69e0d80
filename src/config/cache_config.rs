use std::env;

/// Tuning knobs for the sharded SLRU response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of message-cache entries.
    pub max_size: usize,
    /// Fraction of `max_size` set aside for the RRset-tier cache.
    pub rrset_cache_ratio: f64,
    /// Fraction of remaining TTL at which an entry is refreshed in the
    /// background instead of waiting for it to expire.
    pub prefetch_ratio: f64,
    /// Number of independent shards the cache is split across.
    pub shard_count: usize,
    /// TTL floor applied to negative (NXDOMAIN/NODATA) responses that
    /// don't carry DNSSEC-proven denial ranges.
    pub negative_ttl: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            rrset_cache_ratio: 0.25,
            prefetch_ratio: crate::cache::entry::DEFAULT_PREFETCH_RATIO,
            shard_count: 16,
            negative_ttl: 300,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_size: env::var("VIGIL_CACHE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_size),
            rrset_cache_ratio: env::var("VIGIL_RRSET_CACHE_RATIO")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rrset_cache_ratio),
            prefetch_ratio: env::var("VIGIL_PREFETCH_RATIO")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.prefetch_ratio),
            shard_count: env::var("VIGIL_CACHE_SHARD_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.shard_count),
            negative_ttl: env::var("VIGIL_NEGATIVE_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.negative_ttl),
        }
    }
}
