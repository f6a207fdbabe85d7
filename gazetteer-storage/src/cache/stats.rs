//! Cache usage statistics.

use gazetteer_core::Timestamp;
use serde::Serialize;
use std::time::Duration;

/// Point-in-time statistics of a composite-key cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of `get` calls that found a record.
    pub hits: u64,
    /// Number of `get` calls that found nothing.
    pub misses: u64,
    /// Number of full reloads since construction. Survives `reset_stats`.
    pub reloads: u64,
    /// `hits + misses`.
    pub total_requests: u64,
    /// Percentage of requests that hit, 0 when there were none.
    pub hit_rate: f64,
    /// Entries in the current snapshot, 0 when unloaded.
    pub size: usize,
    pub ttl: Option<Duration>,
    pub last_reload: Option<Timestamp>,
    pub is_expired: bool,
}

impl CacheStats {
    /// Hit rate as a percentage.
    pub fn hit_rate_percent(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            100.0 * hits as f64 / total as f64
        }
    }
}
