//! Network-aware query execution.
//!
//! # Responsibilities
//! - Gate reads on connection health before touching the network
//! - Serve fallback data while gated, or when live attempts run out
//! - Retry transient failures with backoff while the domain looks healthy
//! - Feed every live outcome back into the tracker
//! - Remember which keys were served offline so they refetch on reconnect

use std::future::Future;
use std::sync::Arc;

use dashmap::DashSet;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;

use crate::cache::CacheStore;
use crate::clock::Clock;
use crate::envelope::{DataSource, Envelope, QueryResult};
use crate::error::{ApiError, Error, Result};
use crate::health::ConnectionHealthTracker;
use crate::observability::metrics;
use crate::query::fallback::{Fallback, FallbackResolver, FallbackSources};
use crate::query::policy::{OfflineBehavior, QueryPolicy};
use crate::resilience::with_timeout;

pub struct QueryExecutor {
    tracker: Arc<ConnectionHealthTracker>,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    resolver: FallbackResolver,
    offline_served: DashSet<String>,
}

impl QueryExecutor {
    pub fn new(
        tracker: Arc<ConnectionHealthTracker>,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let resolver = FallbackResolver::new(tracker.domain(), cache.clone(), clock.clone());
        Self {
            tracker,
            cache,
            clock,
            resolver,
            offline_served: DashSet::new(),
        }
    }

    pub fn tracker(&self) -> &Arc<ConnectionHealthTracker> {
        &self.tracker
    }

    pub fn domain(&self) -> &str {
        self.tracker.domain()
    }

    /// Read `key` through the health gate.
    ///
    /// `fetch` is called once per live attempt with a clone of `params`.
    /// Transient failures are absorbed into fallback data unless the policy
    /// asks for errors; validation, auth and not-found failures always
    /// surface.
    pub async fn execute<P, T, F, Fut>(
        &self,
        key: &str,
        params: P,
        fetch: F,
        policy: &QueryPolicy<T>,
    ) -> Result<QueryResult<T>>
    where
        P: Clone,
        T: Serialize + DeserializeOwned + Clone,
        F: Fn(P) -> Fut,
        Fut: Future<Output = std::result::Result<Envelope<T>, ApiError>>,
    {
        let domain = self.domain();
        self.tracker.check_connection();

        if self.tracker.should_use_fallback() {
            tracing::debug!(domain, key, "Using fallback data due to connection state");

            if let Some(fallback) = self.resolve_fallback(key, policy) {
                return Ok(self.offline_result(key, fallback));
            }

            match policy.offline_behavior {
                OfflineBehavior::Error => {
                    return Err(self.unavailable());
                }
                OfflineBehavior::Silent => {
                    return Ok(self.empty_result(key, None));
                }
                OfflineBehavior::Fallback
                    if !policy.allow_degraded_attempt || self.tracker.is_resource_exhausted() =>
                {
                    return Err(self.unavailable());
                }
                OfflineBehavior::Fallback => {
                    tracing::debug!(domain, key, "No fallback available, attempting degraded fetch");
                }
            }
        } else if let Some(result) = self.memoized(key, policy) {
            return Ok(result);
        }

        let error = match self.fetch_live(key, params, &fetch, policy).await {
            Ok(envelope) => {
                return Ok(self.live_result(key, envelope));
            }
            Err(error) => error,
        };

        if policy.offline_behavior == OfflineBehavior::Error || !error.kind.is_transient() {
            return Err(error.into());
        }

        if let Some(fallback) = self.resolve_fallback(key, policy) {
            tracing::debug!(
                domain,
                key,
                kind = %error.kind,
                "Live fetch failed, serving fallback data"
            );
            return Ok(self.offline_result(key, fallback));
        }

        if policy.offline_behavior == OfflineBehavior::Silent {
            return Ok(self.empty_result(key, Some(&error)));
        }

        Err(error.into())
    }

    /// Run the live attempt loop. Returns the last failure once retries stop.
    async fn fetch_live<P, T, F, Fut>(
        &self,
        key: &str,
        params: P,
        fetch: &F,
        policy: &QueryPolicy<T>,
    ) -> std::result::Result<Envelope<T>, ApiError>
    where
        P: Clone,
        T: Serialize,
        F: Fn(P) -> Fut,
        Fut: Future<Output = std::result::Result<Envelope<T>, ApiError>>,
    {
        let domain = self.domain();
        let mut failures = 0u32;

        loop {
            match with_timeout(policy.timeout, fetch(params.clone())).await {
                Ok(envelope) => {
                    self.tracker.mark_success();
                    metrics::record_live_call(domain, "success");
                    match serde_json::to_value(&envelope) {
                        Ok(value) => self.cache.set(key, value),
                        Err(e) => {
                            tracing::warn!(domain, key, error = %e, "Failed to cache response");
                        }
                    }
                    return Ok(envelope);
                }
                Err(error) => {
                    failures += 1;
                    self.tracker.mark_failure(&error);
                    metrics::record_live_call(domain, "failure");

                    let reachable = !self.tracker.should_use_fallback();
                    if !policy.retry.should_retry(error.kind, failures, reachable) {
                        return Err(error);
                    }

                    let delay = policy.retry.delay_for(failures);
                    tracing::debug!(
                        domain,
                        key,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        kind = %error.kind,
                        "Retrying query"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn resolve_fallback<T>(&self, key: &str, policy: &QueryPolicy<T>) -> Option<Fallback<T>>
    where
        T: DeserializeOwned + Clone,
    {
        self.resolver.resolve(
            key,
            FallbackSources {
                mock: policy.mock.as_ref(),
                default_value: policy.default_value.as_ref(),
            },
        )
    }

    /// A fresh cache entry stands in for a live call.
    fn memoized<T>(&self, key: &str, policy: &QueryPolicy<T>) -> Option<QueryResult<T>>
    where
        T: DeserializeOwned,
    {
        let entry = self.cache.get(key)?;
        if !entry.is_fresh(self.clock.now_millis(), policy.stale_time) {
            return None;
        }
        let envelope: Envelope<T> = serde_json::from_value(entry.value).ok()?;
        tracing::debug!(domain = %self.domain(), key, "Serving fresh cached data");
        Some(self.live_result(key, envelope))
    }

    fn live_result<T>(&self, key: &str, envelope: Envelope<T>) -> QueryResult<T> {
        self.offline_served.remove(key);
        QueryResult {
            data: Some(envelope.data),
            meta: envelope.meta,
            is_offline_data: false,
            source: DataSource::Live,
            last_online_update: self.tracker.last_online(),
            offline_timestamp: None,
        }
    }

    fn offline_result<T>(&self, key: &str, fallback: Fallback<T>) -> QueryResult<T> {
        self.offline_served.insert(key.to_string());
        metrics::record_fallback(self.domain(), fallback.source.as_str());
        QueryResult {
            data: Some(fallback.envelope.data),
            meta: fallback.envelope.meta,
            is_offline_data: true,
            source: fallback.source,
            last_online_update: self.tracker.last_online(),
            offline_timestamp: Some(self.clock.now_millis()),
        }
    }

    fn empty_result<T>(&self, key: &str, error: Option<&ApiError>) -> QueryResult<T> {
        let now = self.clock.now_millis();
        self.offline_served.insert(key.to_string());
        metrics::record_fallback(self.domain(), DataSource::Empty.as_str());

        let mut meta = json!({ "offline": true, "timestamp": now });
        if let Some(error) = error {
            meta["error"] = json!({
                "kind": error.kind,
                "code": error.code,
                "message": error.message,
            });
        }

        QueryResult {
            data: None,
            meta: Some(meta),
            is_offline_data: true,
            source: DataSource::Empty,
            last_online_update: self.tracker.last_online(),
            offline_timestamp: Some(now),
        }
    }

    fn unavailable(&self) -> Error {
        if self.tracker.is_resource_exhausted() {
            return Error::resource_exhausted(self.domain());
        }
        let reason = if self.tracker.is_online() {
            "connection is degraded"
        } else {
            "device is offline"
        };
        Error::network_unavailable(self.domain(), reason)
    }

    /// Keys last answered with offline data.
    pub fn offline_served(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.offline_served.iter().map(|k| k.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Mark every key last served offline as stale so the next read goes live.
    pub fn invalidate_offline_served(&self) -> usize {
        let keys: Vec<String> = self.offline_served.iter().map(|k| k.key().clone()).collect();
        let mut touched = 0;
        for key in &keys {
            touched += self.cache.invalidate(key);
            self.offline_served.remove(key);
        }
        if !keys.is_empty() {
            tracing::info!(
                domain = %self.domain(),
                keys = keys.len(),
                "Invalidated offline-served queries after reconnect"
            );
        }
        touched
    }

    /// Invalidate offline-served keys on every offline→online transition.
    pub fn spawn_refetch_on_reconnect(
        self: Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let mut online = self.tracker.subscribe();
        tokio::spawn(async move {
            let mut was_online = *online.borrow_and_update();
            loop {
                tokio::select! {
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let now_online = *online.borrow_and_update();
                        if now_online && !was_online {
                            self.invalidate_offline_served();
                        }
                        was_online = now_online;
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!(domain = %self.domain(), "Refetch listener stopping");
                        break;
                    }
                }
            }
        })
    }
}
