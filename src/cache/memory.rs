//! In-memory cache store.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use super::{CacheEntry, CacheStore};
use crate::clock::{Clock, SystemClock};

/// Thread-safe cache keyed by query key.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    /// Drop entries not written for longer than `gc_time`.
    pub fn evict_expired(&self, gc_time: Duration) -> usize {
        let now = self.clock.now_millis();
        let horizon = gc_time.as_millis() as u64;
        let before = self.inner.len();
        self.inner
            .retain(|_, entry| now.saturating_sub(entry.updated_at) < horizon);
        let evicted = before - self.inner.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired cache entries");
        }
        evicted
    }

    /// Sweep expired entries until shutdown. Runs four sweeps per `gc_time`.
    pub async fn run_gc(self, gc_time: Duration, mut shutdown: broadcast::Receiver<()>) {
        let every = (gc_time / 4).max(Duration::from_secs(1));
        tracing::info!(
            gc_time_secs = gc_time.as_secs(),
            sweep_secs = every.as_secs(),
            "Cache eviction starting"
        );

        let mut ticker = time::interval(every);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.evict_expired(gc_time);
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Cache eviction stopping");
                    break;
                }
            }
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    fn set(&self, key: &str, value: serde_json::Value) {
        let entry = CacheEntry {
            value,
            updated_at: self.clock.now_millis(),
            invalidated: false,
        };
        self.inner.insert(key.to_string(), entry);
    }

    fn invalidate(&self, prefix: &str) -> usize {
        let mut touched = 0;
        for mut entry in self.inner.iter_mut() {
            if entry.key().starts_with(prefix) {
                entry.value_mut().invalidated = true;
                touched += 1;
            }
        }
        tracing::debug!(prefix, touched, "Invalidated cache entries");
        touched
    }
}
