//! Reactive cache store integration.
//!
//! # Data Flow
//! ```text
//! QueryExecutor
//!     → get(key): memoized fresh entry? return without fetching
//!     → set(key, envelope) after every live success
//!
//! FallbackResolver
//!     → get(key): last-known-good entry, even if stale or invalidated
//!
//! MutationQueue
//!     → invalidate(prefix) after a successful write
//! ```
//!
//! # Design Decisions
//! - Values are stored as JSON so one store serves every payload type
//! - Invalidation marks entries stale instead of deleting them, so they
//!   remain available as fallback data
//! - Garbage collection is explicit (`MemoryCache::evict_expired`)

pub mod memory;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use memory::MemoryCache;

/// A cached envelope and its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The serialized `Envelope<T>`.
    pub value: serde_json::Value,
    /// Epoch-ms of the last write.
    pub updated_at: u64,
    /// Set by `invalidate`; cleared by the next write.
    pub invalidated: bool,
}

impl CacheEntry {
    /// Fresh entries may be served in place of a live call.
    pub fn is_fresh(&self, now_millis: u64, stale_time: Duration) -> bool {
        !self.invalidated && now_millis.saturating_sub(self.updated_at) < stale_time.as_millis() as u64
    }
}

/// Key-value cache shared by queries and mutations.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn set(&self, key: &str, value: serde_json::Value);
    /// Mark every entry whose key starts with `prefix` as stale.
    /// Returns the number of entries touched.
    fn invalidate(&self, prefix: &str) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_respects_stale_time_and_invalidation() {
        let mut entry = CacheEntry {
            value: serde_json::json!({"data": 1}),
            updated_at: 10_000,
            invalidated: false,
        };
        assert!(entry.is_fresh(10_500, Duration::from_secs(1)));
        assert!(!entry.is_fresh(11_000, Duration::from_secs(1)));

        entry.invalidated = true;
        assert!(!entry.is_fresh(10_500, Duration::from_secs(1)));
    }
}
