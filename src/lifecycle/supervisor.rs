//! Background task supervision.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::cache::MemoryCache;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::health::{ConnectionHealthTracker, HealthMonitor};
use crate::lifecycle::shutdown::Shutdown;
use crate::mutation::MutationQueue;
use crate::query::QueryExecutor;

/// Owns every background task of the layer and joins them on shutdown.
pub struct Supervisor {
    shutdown: Shutdown,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            shutdown: Shutdown::new(),
            tasks: Vec::new(),
        }
    }

    /// Spawn a named task that receives the shutdown signal.
    pub fn spawn<F, Fut>(&mut self, name: impl Into<String>, task: F)
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        tracing::debug!(task = %name, "Spawning background task");
        let handle = tokio::spawn(task(self.shutdown.subscribe()));
        self.tasks.push((name, handle));
    }

    /// Active and event-driven health monitoring for the tracker's domain.
    pub fn spawn_monitor(&mut self, tracker: Arc<ConnectionHealthTracker>) {
        let name = format!("health-monitor:{}", tracker.domain());
        let monitor = HealthMonitor::new(tracker);
        self.spawn(name, move |shutdown| monitor.run(shutdown));
    }

    pub fn spawn_refetch(&mut self, executor: Arc<QueryExecutor>) {
        let name = format!("refetch:{}", executor.domain());
        let handle = executor.spawn_refetch_on_reconnect(self.shutdown.subscribe());
        self.tasks.push((name, handle));
    }

    pub fn spawn_replay<I, T, F, Fut>(&mut self, queue: Arc<MutationQueue<I, T, F>>)
    where
        I: Serialize + DeserializeOwned + Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Envelope<T>, ApiError>> + Send,
    {
        let name = format!("replay:{}:{}", queue.domain(), queue.method());
        let handle = queue.spawn_replay_on_reconnect(self.shutdown.subscribe());
        self.tasks.push((name, handle));
    }

    /// Periodic eviction of cache entries older than `gc_time`.
    pub fn spawn_cache_gc(&mut self, cache: MemoryCache, gc_time: Duration) {
        self.spawn("cache-gc", move |shutdown| cache.run_gc(gc_time, shutdown));
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every task and wait up to `grace` for each; abort stragglers.
    pub async fn shutdown(self, grace: Duration) {
        self.shutdown.trigger();

        for (name, mut handle) in self.tasks {
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(Ok(())) => tracing::debug!(task = %name, "Task stopped"),
                Ok(Err(e)) => tracing::error!(task = %name, error = %e, "Task failed"),
                Err(_) => {
                    tracing::warn!(task = %name, "Task did not stop in time, aborting");
                    handle.abort();
                }
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::HealthConfig;
    use crate::health::SimulatedNetwork;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn shutdown_joins_monitor_and_listeners() {
        let tracker = Arc::new(ConnectionHealthTracker::new(
            "cart",
            HealthConfig::default(),
            Arc::new(SimulatedNetwork::online()),
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(0)),
        ));
        let cache = Arc::new(crate::cache::MemoryCache::new());
        let executor = Arc::new(QueryExecutor::new(
            tracker.clone(),
            cache,
            Arc::new(ManualClock::new(0)),
        ));

        let mut supervisor = Supervisor::new();
        supervisor.spawn_monitor(tracker);
        supervisor.spawn_refetch(executor);
        assert_eq!(supervisor.task_count(), 2);

        tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown(Duration::from_secs(1)))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cache_gc_task_evicts_stale_entries() {
        use crate::cache::CacheStore;
        use serde_json::json;

        let clock = Arc::new(ManualClock::new(0));
        let cache = crate::cache::MemoryCache::with_clock(clock.clone());
        let gc_time = crate::config::QueryConfig::default().gc_time();
        cache.set("cart/items", json!({"data": [1]}));
        clock.advance(Duration::from_secs(31 * 60));
        cache.set("cart/total", json!({"data": 1}));

        let mut supervisor = Supervisor::new();
        supervisor.spawn_cache_gc(cache.clone(), gc_time);

        tokio::time::timeout(Duration::from_secs(60), async {
            while cache.get("cart/items").is_some() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert!(cache.get("cart/total").is_some());

        clock.advance(Duration::from_secs(31 * 60));
        tokio::time::timeout(gc_time, async {
            while !cache.is_empty() {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
        .await
        .unwrap();

        supervisor.shutdown(Duration::from_secs(1)).await;
    }
}
