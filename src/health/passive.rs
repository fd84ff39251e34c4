//! Passive health tracking from call outcomes.
//!
//! # Responsibilities
//! - Reset the failure counter on success
//! - Count failures and stamp the time of the last one
//! - Latch resource exhaustion when a failure is classified as such
//! - Persist every change so it survives restarts
//!
//! Failures only count when a live call was actually attempted. Gate
//! denials never reach this module.

use crate::error::{ApiError, ErrorKind};
use crate::health::state::ConnectionHealth;
use crate::health::tracker::ConnectionHealthTracker;
use crate::observability::metrics;
use crate::storage::keys;

impl ConnectionHealthTracker {
    /// Report a successful live call. Idempotent.
    pub fn mark_success(&self) {
        let previous = self.state.rcu(|current| {
            let mut next = ConnectionHealth::clone(current);
            next.consecutive_failures = 0;
            next.last_failure_at = None;
            next.resource_exhausted = false;
            next.resource_exhausted_at = None;
            next
        });

        if previous.consecutive_failures == 0
            && previous.last_failure_at.is_none()
            && !previous.resource_exhausted
        {
            return;
        }

        self.store.set(&keys::failure_count(&self.domain), "0".to_string());
        self.store.remove(&keys::last_attempt(&self.domain));
        if previous.resource_exhausted {
            self.clear_resource_keys();
        }

        tracing::debug!(domain = %self.domain, "Connection success marked");
    }

    /// Report a failed live call.
    pub fn mark_failure(&self, error: &ApiError) {
        let now = self.clock.now_millis();
        let exhausted = error.kind == ErrorKind::Resource;

        let previous = self.state.rcu(|current| {
            let mut next = ConnectionHealth::clone(current);
            next.consecutive_failures = next.consecutive_failures.saturating_add(1);
            next.last_failure_at = Some(now);
            if exhausted {
                next.resource_exhausted = true;
                next.resource_exhausted_at = Some(now);
            }
            next
        });
        let failures = previous.consecutive_failures.saturating_add(1);

        self.store
            .set(&keys::failure_count(&self.domain), failures.to_string());
        self.store
            .set(&keys::last_attempt(&self.domain), now.to_string());

        tracing::warn!(
            domain = %self.domain,
            consecutive_failures = failures,
            kind = %error.kind,
            error = %error,
            "Connection failure marked"
        );

        if exhausted {
            self.store
                .set(&keys::resource_error(&self.domain), "true".to_string());
            self.store
                .set(&keys::resource_error_timestamp(&self.domain), now.to_string());
            self.store
                .set(keys::GLOBAL_RESOURCE_ERROR, "true".to_string());
            self.store
                .set(keys::GLOBAL_RESOURCE_ERROR_TIMESTAMP, now.to_string());
            metrics::record_resource_exhausted(&self.domain);
            tracing::error!(domain = %self.domain, error = %error, "Resource error detected");
        }
    }

    /// Suspend live calls until `enable_api_calls`.
    pub fn disable_api_calls(&self) {
        self.state.rcu(|current| {
            let mut next = ConnectionHealth::clone(current);
            next.resource_exhausted = true;
            next.resource_exhausted_at = None;
            next
        });
        self.store.remove(&keys::resource_error_timestamp(&self.domain));
        self.store
            .set(&keys::resource_error(&self.domain), "true".to_string());
        self.store
            .set(keys::GLOBAL_RESOURCE_ERROR, "true".to_string());
        tracing::info!(domain = %self.domain, "API calls manually disabled");
    }

    /// Lift a manual or detected suspension.
    pub fn enable_api_calls(&self) {
        self.state.rcu(|current| {
            let mut next = ConnectionHealth::clone(current);
            next.resource_exhausted = false;
            next.resource_exhausted_at = None;
            next
        });
        self.clear_resource_keys();
        tracing::info!(domain = %self.domain, "API calls enabled");
    }

    /// The app-wide keys are only a mirror; expiry reads the domain's own record.
    fn clear_resource_keys(&self) {
        self.store.remove(&keys::resource_error(&self.domain));
        self.store.remove(&keys::resource_error_timestamp(&self.domain));
        self.store.remove(keys::GLOBAL_RESOURCE_ERROR);
        self.store.remove(keys::GLOBAL_RESOURCE_ERROR_TIMESTAMP);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::clock::ManualClock;
    use crate::config::HealthConfig;
    use crate::error::ApiError;
    use crate::health::platform::SimulatedNetwork;
    use crate::health::tracker::ConnectionHealthTracker;
    use crate::storage::{MemoryStore, StateStore};

    fn setup() -> (ConnectionHealthTracker, MemoryStore, Arc<ManualClock>) {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(50_000));
        let tracker = ConnectionHealthTracker::new(
            "products",
            HealthConfig::default(),
            Arc::new(SimulatedNetwork::online()),
            Arc::new(store.clone()),
            clock.clone(),
        );
        (tracker, store, clock)
    }

    #[test]
    fn failures_accumulate_and_persist() {
        let (tracker, store, _) = setup();
        tracker.mark_failure(&ApiError::network("refused"));
        tracker.mark_failure(&ApiError::server("502"));

        let health = tracker.snapshot();
        assert_eq!(health.consecutive_failures, 2);
        assert_eq!(health.last_failure_at, Some(50_000));
        assert_eq!(store.get("products_failure_count").as_deref(), Some("2"));
        assert_eq!(store.get("products_last_attempt").as_deref(), Some("50000"));
        assert!(!health.resource_exhausted);
    }

    #[test]
    fn success_resets_counter_and_persisted_timestamp() {
        let (tracker, store, _) = setup();
        tracker.mark_failure(&ApiError::network("refused"));
        tracker.mark_success();

        let health = tracker.snapshot();
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.last_failure_at, None);
        assert_eq!(store.get("products_failure_count").as_deref(), Some("0"));
        assert!(store.get("products_last_attempt").is_none());

        tracker.mark_success();
        assert_eq!(tracker.snapshot(), health);
    }

    #[test]
    fn resource_failure_latches_exhaustion() {
        let (tracker, store, _) = setup();
        tracker.mark_failure(&ApiError::from_transport("net::ERR_INSUFFICIENT_RESOURCES"));

        assert!(tracker.is_resource_exhausted());
        assert!(tracker.should_use_fallback());
        assert_eq!(store.get("products_resource_error").as_deref(), Some("true"));
        assert_eq!(store.get("has_resource_error").as_deref(), Some("true"));
        assert_eq!(store.get("resource_error_timestamp").as_deref(), Some("50000"));
        assert_eq!(
            store.get("products_resource_error_timestamp").as_deref(),
            Some("50000")
        );
        assert_eq!(tracker.snapshot().resource_exhausted_at, Some(50_000));
    }

    #[test]
    fn degraded_window_closes_after_thirty_seconds() {
        let (tracker, _, clock) = setup();
        for _ in 0..3 {
            tracker.mark_failure(&ApiError::network("reset"));
        }
        assert!(tracker.should_use_fallback());

        clock.advance(Duration::from_secs(31));
        assert!(!tracker.should_use_fallback());
    }

    #[test]
    fn manual_toggle_round_trips() {
        let (tracker, store, _) = setup();
        tracker.disable_api_calls();
        assert!(tracker.should_use_fallback());
        assert_eq!(store.get("products_resource_error").as_deref(), Some("true"));

        tracker.enable_api_calls();
        assert!(!tracker.should_use_fallback());
        assert!(store.get("products_resource_error").is_none());
        assert!(store.get("has_resource_error").is_none());
    }
}
