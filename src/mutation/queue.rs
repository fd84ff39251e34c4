//! Offline mutation queue.
//!
//! # Responsibilities
//! - Gate writes on connection health
//! - Fail fast on resource exhaustion, before any queueing decision
//! - Hold gated writes in a persisted FIFO outbox
//! - Replay the outbox after reconnect, requeueing or abandoning failures
//! - Publish queue events so abandoned writes are never lost silently
//!
//! The outbox mutex is never held across an `.await`. Replay works on a
//! snapshot; writes queued while it runs wait for the next pass.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::config::MutationConfig;
use crate::envelope::{Envelope, MutationOutcome};
use crate::error::{ApiError, Error, Result};
use crate::health::ConnectionHealthTracker;
use crate::mutation::outbox::{self, QueuedMutation};
use crate::mutation::policy::{MutationPolicy, OfflineMode};
use crate::observability::metrics;
use crate::resilience::with_timeout;
use crate::storage::{keys, StateStore};

/// Outbox lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Queued { id: Uuid, position: usize },
    Replayed { id: Uuid },
    Requeued { id: Uuid, retry_count: u32 },
    /// Dropped after exhausting its replay budget.
    Abandoned {
        id: Uuid,
        payload: serde_json::Value,
        retry_count: u32,
        error: Error,
    },
}

/// Tally of one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub replayed: usize,
    pub requeued: usize,
    pub abandoned: usize,
}

impl ReplayReport {
    pub fn attempted(&self) -> usize {
        self.replayed + self.requeued + self.abandoned
    }
}

pub struct MutationQueue<I, T, F> {
    domain: String,
    method: String,
    storage_key: String,
    tracker: Arc<ConnectionHealthTracker>,
    store: Arc<dyn StateStore>,
    cache: Arc<dyn CacheStore>,
    submit: F,
    replay_policy: MutationPolicy,
    max_replay_retries: u32,
    pending: Mutex<Vec<QueuedMutation<I>>>,
    replay_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<QueueEvent>,
    _output: PhantomData<fn() -> T>,
}

impl<I, T, F> MutationQueue<I, T, F>
where
    I: Serialize + DeserializeOwned + Clone,
{
    /// Create the queue for `(tracker.domain(), method)`, restoring any
    /// persisted outbox.
    pub fn new(
        method: impl Into<String>,
        tracker: Arc<ConnectionHealthTracker>,
        store: Arc<dyn StateStore>,
        cache: Arc<dyn CacheStore>,
        submit: F,
        config: &MutationConfig,
    ) -> Self {
        let domain = tracker.domain().to_string();
        let method = method.into();
        let storage_key = keys::offline_mutations(&domain, &method);

        let restored: Vec<QueuedMutation<I>> = outbox::load(store.as_ref(), &storage_key);
        if !restored.is_empty() {
            tracing::info!(
                domain = %domain,
                method = %method,
                count = restored.len(),
                "Restored offline mutations"
            );
        }
        metrics::record_queue_depth(&domain, restored.len());

        let (events, _) = broadcast::channel(64);

        Self {
            domain,
            method,
            storage_key,
            tracker,
            store,
            cache,
            submit,
            replay_policy: MutationPolicy::from_config(config),
            max_replay_retries: config.max_replay_retries,
            pending: Mutex::new(restored),
            replay_lock: tokio::sync::Mutex::new(()),
            events,
            _output: PhantomData,
        }
    }

    /// Policy applied to replayed writes (timeout and cache invalidation).
    pub fn with_replay_policy(mut self, policy: MutationPolicy) -> Self {
        self.replay_policy = policy;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn pending_len(&self) -> usize {
        self.lock_pending().len()
    }

    /// Copy of the outbox, oldest first.
    pub fn pending(&self) -> Vec<QueuedMutation<I>> {
        self.lock_pending().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Submit a write through the health gate.
    pub async fn execute<Fut>(&self, input: I, policy: &MutationPolicy) -> Result<MutationOutcome<T>>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = std::result::Result<Envelope<T>, ApiError>>,
    {
        self.tracker.check_connection();

        if self.tracker.is_resource_exhausted() {
            tracing::warn!(domain = %self.domain, method = %self.method, "API calls disabled due to resource limitations");
            return Err(Error::resource_exhausted(&self.domain));
        }

        // A degraded but online gate still sends writes live.
        if self.tracker.should_use_fallback() && !self.tracker.is_online() {
            match policy.offline_mode {
                OfflineMode::Error => {
                    return Err(Error::network_unavailable(
                        &self.domain,
                        "this action cannot be performed while offline",
                    ));
                }
                OfflineMode::Queue => {
                    let (id, position) = self.enqueue(input);
                    return Ok(MutationOutcome::Queued { id, position });
                }
                OfflineMode::Optimistic => {
                    tracing::debug!(domain = %self.domain, method = %self.method, "Attempting optimistic write while offline");
                }
            }
        }

        let envelope = self.submit_live(input, policy).await?;
        Ok(MutationOutcome::Completed(envelope))
    }

    /// One live submit with outcome bookkeeping. Never retried inline.
    async fn submit_live<Fut>(&self, input: I, policy: &MutationPolicy) -> std::result::Result<Envelope<T>, ApiError>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = std::result::Result<Envelope<T>, ApiError>>,
    {
        match with_timeout(policy.timeout, (self.submit)(input)).await {
            Ok(envelope) => {
                self.tracker.mark_success();
                metrics::record_live_call(&self.domain, "success");
                for prefix in &policy.invalidate {
                    let touched = self.cache.invalidate(prefix);
                    tracing::debug!(domain = %self.domain, prefix = %prefix, touched, "Invalidated cached queries");
                }
                Ok(envelope)
            }
            Err(error) => {
                self.tracker.mark_failure(&error);
                metrics::record_live_call(&self.domain, "failure");
                Err(error)
            }
        }
    }

    fn enqueue(&self, input: I) -> (Uuid, usize) {
        let entry = QueuedMutation::new(input, self.tracker.now_millis());
        let id = entry.id;
        let position = {
            let mut pending = self.lock_pending();
            pending.push(entry);
            outbox::save(self.store.as_ref(), &self.storage_key, &pending);
            pending.len()
        };

        metrics::record_queue_depth(&self.domain, position);
        tracing::info!(
            domain = %self.domain,
            method = %self.method,
            id = %id,
            position,
            "Mutation queued for later execution"
        );
        let _ = self.events.send(QueueEvent::Queued { id, position });
        (id, position)
    }

    /// Replay the outbox in FIFO order.
    ///
    /// Each failure (a gate denial included) requeues the entry with one more
    /// retry until the cap, after which it is abandoned and published.
    pub async fn replay_pending<Fut>(&self) -> ReplayReport
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = std::result::Result<Envelope<T>, ApiError>>,
    {
        let _guard = self.replay_lock.lock().await;

        let snapshot = {
            let mut pending = self.lock_pending();
            let snapshot = std::mem::take(&mut *pending);
            outbox::save::<I>(self.store.as_ref(), &self.storage_key, &[]);
            snapshot
        };

        let mut report = ReplayReport::default();
        if snapshot.is_empty() {
            return report;
        }

        tracing::info!(
            domain = %self.domain,
            method = %self.method,
            count = snapshot.len(),
            "Processing offline mutations"
        );

        self.tracker.check_connection();
        let mut requeue = Vec::new();
        for mut entry in snapshot {
            let outcome = if self.tracker.should_use_fallback() {
                Err(Error::network_unavailable(&self.domain, "gate closed during replay"))
            } else {
                self.submit_live(entry.payload.clone(), &self.replay_policy)
                    .await
                    .map_err(Error::from)
            };

            match outcome {
                Ok(_) => {
                    report.replayed += 1;
                    tracing::debug!(domain = %self.domain, id = %entry.id, "Queued mutation replayed");
                    let _ = self.events.send(QueueEvent::Replayed { id: entry.id });
                }
                Err(error) if entry.retry_count < self.max_replay_retries => {
                    entry.retry_count += 1;
                    report.requeued += 1;
                    tracing::warn!(
                        domain = %self.domain,
                        id = %entry.id,
                        retry_count = entry.retry_count,
                        error = %error,
                        "Queued mutation failed, requeueing"
                    );
                    let _ = self.events.send(QueueEvent::Requeued {
                        id: entry.id,
                        retry_count: entry.retry_count,
                    });
                    requeue.push(entry);
                }
                Err(error) => {
                    report.abandoned += 1;
                    metrics::record_abandoned(&self.domain);
                    tracing::error!(
                        domain = %self.domain,
                        method = %self.method,
                        id = %entry.id,
                        retry_count = entry.retry_count,
                        error = %error,
                        "Queued mutation abandoned after max retries"
                    );
                    let payload = serde_json::to_value(&entry.payload).unwrap_or_default();
                    let _ = self.events.send(QueueEvent::Abandoned {
                        id: entry.id,
                        payload,
                        retry_count: entry.retry_count,
                        error,
                    });
                }
            }
        }

        let depth = {
            let mut pending = self.lock_pending();
            let arrived = std::mem::take(&mut *pending);
            requeue.extend(arrived);
            *pending = requeue;
            outbox::save(self.store.as_ref(), &self.storage_key, &pending);
            pending.len()
        };
        metrics::record_queue_depth(&self.domain, depth);

        tracing::info!(
            domain = %self.domain,
            method = %self.method,
            replayed = report.replayed,
            requeued = report.requeued,
            abandoned = report.abandoned,
            "Offline mutation replay finished"
        );
        report
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<QueuedMutation<I>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<I, T, F> MutationQueue<I, T, F>
where
    I: Serialize + DeserializeOwned + Clone + Send + 'static,
    T: Send + 'static,
    F: Send + Sync + 'static,
{
    /// Replay on every offline→online transition while the outbox is non-empty.
    ///
    /// An outbox restored from storage is replayed once at start when the
    /// tracker already reports online.
    pub fn spawn_replay_on_reconnect<Fut>(
        self: Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = std::result::Result<Envelope<T>, ApiError>> + Send,
    {
        let mut online = self.tracker.subscribe();
        tokio::spawn(async move {
            let mut was_online = *online.borrow_and_update();
            if was_online && self.pending_len() > 0 {
                self.replay_pending().await;
            }
            loop {
                tokio::select! {
                    changed = online.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let now_online = *online.borrow_and_update();
                        if now_online && !was_online && self.pending_len() > 0 {
                            self.replay_pending().await;
                        }
                        was_online = now_online;
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!(domain = %self.domain, method = %self.method, "Replay listener stopping");
                        break;
                    }
                }
            }
        })
    }
}
