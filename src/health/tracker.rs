//! Connection health tracker.
//!
//! # Responsibilities
//! - Own the health record for one domain
//! - Sample platform signals and recompute volatile fields
//! - Answer the single gating question: should callers skip the network?
//! - Publish online/offline transitions to subscribers
//!
//! Outcome reporting (`mark_success`, `mark_failure`) lives in `passive.rs`;
//! the periodic poll and event loop lives in `active.rs`.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::clock::{Clock, SystemClock};
use crate::config::HealthConfig;
use crate::health::platform::ConnectivityProbe;
use crate::health::state::{ConnectionHealth, ConnectionQuality};
use crate::observability::metrics;
use crate::storage::{keys, StateStore};

/// Single source of truth for "can we call the network right now, and how well".
pub struct ConnectionHealthTracker {
    pub(super) domain: String,
    pub(super) config: HealthConfig,
    pub(super) probe: Arc<dyn ConnectivityProbe>,
    pub(super) store: Arc<dyn StateStore>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) state: ArcSwap<ConnectionHealth>,
    online_tx: watch::Sender<bool>,
}

impl ConnectionHealthTracker {
    /// Create a tracker for `domain`, restoring persisted counters from `store`.
    pub fn new(
        domain: impl Into<String>,
        config: HealthConfig,
        probe: Arc<dyn ConnectivityProbe>,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let domain = domain.into();
        let now = clock.now_millis();
        let sample = probe.sample();
        let online = sample.reachable.unwrap_or(true);
        let quality = ConnectionQuality::classify(online, sample.effective_type.as_deref());

        let read_millis = |key: &str| store.get(key).and_then(|v| v.parse::<u64>().ok());
        let domain_flag = store.get(&keys::resource_error(&domain)).as_deref() == Some("true");
        let global_flag = store.get(keys::GLOBAL_RESOURCE_ERROR).as_deref() == Some("true");
        let resource_exhausted = domain_flag || global_flag;
        // A domain flag without its own timestamp was set by hand.
        let resource_exhausted_at = if domain_flag {
            read_millis(&keys::resource_error_timestamp(&domain))
        } else if global_flag {
            read_millis(keys::GLOBAL_RESOURCE_ERROR_TIMESTAMP)
        } else {
            None
        };
        let consecutive_failures = store
            .get(&keys::failure_count(&domain))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let last_failure_at = store
            .get(&keys::last_attempt(&domain))
            .and_then(|v| v.parse().ok());

        if consecutive_failures > 0 || resource_exhausted {
            tracing::info!(
                domain = %domain,
                consecutive_failures,
                resource_exhausted,
                "Restored persisted connection health"
            );
        }

        let health = ConnectionHealth {
            domain: domain.clone(),
            is_online: online,
            connection_quality: quality,
            connection_type: sample.connection_type,
            effective_type: sample.effective_type,
            downlink_mbps: sample.downlink_mbps,
            rtt_ms: sample.rtt_ms,
            save_data: sample.save_data,
            consecutive_failures,
            last_failure_at,
            resource_exhausted,
            resource_exhausted_at,
            last_checked: now,
            last_online: online.then_some(now),
            last_offline: (!online).then_some(now),
        };

        let (online_tx, _) = watch::channel(online);
        metrics::record_online(&domain, online);

        Self {
            domain,
            config,
            probe,
            store,
            clock,
            state: ArcSwap::from_pointee(health),
            online_tx,
        }
    }

    /// Tracker with default thresholds and the system clock.
    pub fn with_defaults(
        domain: impl Into<String>,
        probe: Arc<dyn ConnectivityProbe>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self::new(
            domain,
            HealthConfig::default(),
            probe,
            store,
            Arc::new(SystemClock),
        )
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    pub fn probe(&self) -> &Arc<dyn ConnectivityProbe> {
        &self.probe
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Current health record.
    pub fn snapshot(&self) -> ConnectionHealth {
        ConnectionHealth::clone(&self.state.load())
    }

    pub fn is_online(&self) -> bool {
        self.state.load().is_online
    }

    pub fn is_resource_exhausted(&self) -> bool {
        self.state.load().resource_exhausted
    }

    pub fn last_online(&self) -> Option<u64> {
        self.state.load().last_online
    }

    /// Receive the online flag whenever it flips.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online_tx.subscribe()
    }

    /// Sample the platform and refresh volatile fields. Never fails.
    pub fn check_connection(&self) -> ConnectionHealth {
        self.expire_resource_flag();

        let sample = self.probe.sample();
        let now = self.clock.now_millis();
        let online = sample.reachable.unwrap_or(true);
        let quality = ConnectionQuality::classify(online, sample.effective_type.as_deref());

        let previous = self.state.rcu(|current| {
            let mut next = ConnectionHealth::clone(current);
            next.is_online = online;
            next.connection_quality = quality;
            next.connection_type = sample.connection_type.clone();
            next.effective_type = sample.effective_type.clone();
            next.downlink_mbps = sample.downlink_mbps;
            next.rtt_ms = sample.rtt_ms;
            next.save_data = sample.save_data;
            next.last_checked = now;
            if online {
                next.last_online = Some(now);
            } else {
                next.last_offline = Some(now);
            }
            next
        });

        tracing::debug!(
            domain = %self.domain,
            online,
            quality = quality.as_str(),
            effective_type = ?sample.effective_type,
            "Connection status checked"
        );

        if previous.is_online != online {
            self.publish_transition(online);
        }

        self.snapshot()
    }

    /// Whether callers must skip live calls and use fallbacks instead.
    pub fn should_use_fallback(&self) -> bool {
        let health = self.state.load();
        if !health.is_online || health.resource_exhausted {
            return true;
        }
        health.is_degraded(
            self.clock.now_millis(),
            self.config.failure_threshold,
            self.config.failure_window().as_millis() as u64,
        )
    }

    /// Force the offline state without consulting the platform.
    pub fn simulate_offline(&self) {
        let now = self.clock.now_millis();
        let previous = self.state.rcu(|current| {
            let mut next = ConnectionHealth::clone(current);
            next.is_online = false;
            next.connection_quality = ConnectionQuality::Offline;
            next.last_checked = now;
            next.last_offline = Some(now);
            next
        });
        tracing::debug!(domain = %self.domain, "Simulating offline mode");
        if previous.is_online {
            self.publish_transition(false);
        }
    }

    /// Force the online state, keeping the platform's bandwidth hints.
    pub fn simulate_online(&self) {
        let sample = self.probe.sample();
        let now = self.clock.now_millis();
        let quality = ConnectionQuality::classify(true, sample.effective_type.as_deref());
        let previous = self.state.rcu(|current| {
            let mut next = ConnectionHealth::clone(current);
            next.is_online = true;
            next.connection_quality = quality;
            next.effective_type = sample.effective_type.clone();
            next.last_checked = now;
            next.last_online = Some(now);
            next
        });
        tracing::debug!(domain = %self.domain, "Simulating online mode");
        if !previous.is_online {
            self.publish_transition(true);
        }
    }

    fn publish_transition(&self, online: bool) {
        if online {
            tracing::info!(domain = %self.domain, "Connection restored");
        } else {
            tracing::warn!(domain = %self.domain, "Connection lost");
        }
        metrics::record_online(&self.domain, online);
        self.online_tx.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        });
    }

    /// Clear an exhaustion flag detected longer ago than the reset window.
    fn expire_resource_flag(&self) {
        let (exhausted, detected_at) = {
            let health = self.state.load();
            (health.resource_exhausted, health.resource_exhausted_at)
        };
        let (true, Some(detected_at)) = (exhausted, detected_at) else {
            return;
        };

        let now = self.clock.now_millis();
        if now.saturating_sub(detected_at) > self.config.resource_reset().as_millis() as u64 {
            self.enable_api_calls();
            tracing::info!(
                domain = %self.domain,
                "Resource error timeout expired, re-enabling API calls"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::health::platform::{PlatformSnapshot, SimulatedNetwork};
    use crate::storage::MemoryStore;
    use std::time::Duration;

    fn tracker(
        network: &SimulatedNetwork,
        store: &MemoryStore,
        clock: &Arc<ManualClock>,
    ) -> ConnectionHealthTracker {
        ConnectionHealthTracker::new(
            "cart",
            HealthConfig::default(),
            Arc::new(network.clone()),
            Arc::new(store.clone()),
            clock.clone(),
        )
    }

    #[test]
    fn samples_quality_from_hints() {
        let network = SimulatedNetwork::new(PlatformSnapshot::online().with_effective_type("3g"));
        let clock = Arc::new(ManualClock::new(1_000));
        let tracker = tracker(&network, &MemoryStore::new(), &clock);

        let health = tracker.check_connection();
        assert!(health.is_online);
        assert_eq!(health.connection_quality, ConnectionQuality::Fair);
        assert!(health.is_slow_connection());

        network.go_offline();
        clock.advance(Duration::from_secs(1));
        let health = tracker.check_connection();
        assert_eq!(health.connection_quality, ConnectionQuality::Offline);
        assert_eq!(health.last_offline, Some(2_000));
        assert_eq!(health.last_online, Some(1_000));
    }

    #[test]
    fn missing_signal_counts_as_online_unknown() {
        let network = SimulatedNetwork::new(PlatformSnapshot::default());
        let clock = Arc::new(ManualClock::new(0));
        let tracker = tracker(&network, &MemoryStore::new(), &clock);

        let health = tracker.check_connection();
        assert!(health.is_online);
        assert_eq!(health.connection_quality, ConnectionQuality::Unknown);
    }

    #[test]
    fn restores_persisted_fields() {
        let store = MemoryStore::new();
        store.set("cart_failure_count", "2".into());
        store.set("cart_last_attempt", "500".into());
        store.set("has_resource_error", "true".into());

        let clock = Arc::new(ManualClock::new(1_000));
        let tracker = tracker(&SimulatedNetwork::online(), &store, &clock);
        let health = tracker.snapshot();
        assert_eq!(health.consecutive_failures, 2);
        assert_eq!(health.last_failure_at, Some(500));
        assert!(health.resource_exhausted);
    }

    #[tokio::test]
    async fn publishes_online_transitions() {
        let network = SimulatedNetwork::online();
        let clock = Arc::new(ManualClock::new(0));
        let tracker = tracker(&network, &MemoryStore::new(), &clock);
        let mut rx = tracker.subscribe();

        network.go_offline();
        tracker.check_connection();
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());

        network.go_online();
        tracker.check_connection();
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }

    #[test]
    fn simulated_modes_override_platform() {
        let network = SimulatedNetwork::online();
        let clock = Arc::new(ManualClock::new(0));
        let tracker = tracker(&network, &MemoryStore::new(), &clock);

        tracker.simulate_offline();
        assert!(tracker.should_use_fallback());
        tracker.simulate_online();
        assert!(!tracker.should_use_fallback());
    }

    #[test]
    fn resource_flag_expires_after_reset_window() {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let tracker = tracker(&SimulatedNetwork::online(), &store, &clock);

        tracker.mark_failure(&crate::error::ApiError::resource("ERR_INSUFFICIENT_RESOURCES"));
        tracker.check_connection();
        assert!(tracker.is_resource_exhausted());

        clock.advance(Duration::from_secs(601));
        tracker.check_connection();
        assert!(!tracker.is_resource_exhausted());
        assert!(store.get("has_resource_error").is_none());
    }

    #[test]
    fn each_domain_expires_on_its_own_clock() {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let network = SimulatedNetwork::online();
        let domain = |name: &str| {
            ConnectionHealthTracker::new(
                name,
                HealthConfig::default(),
                Arc::new(network.clone()),
                Arc::new(store.clone()),
                clock.clone(),
            )
        };
        let cart = domain("cart");
        let products = domain("products");

        let exhausted = crate::error::ApiError::from_transport("net::ERR_INSUFFICIENT_RESOURCES");
        cart.mark_failure(&exhausted);
        products.mark_failure(&exhausted);

        clock.advance(Duration::from_secs(601));
        products.check_connection();
        assert!(!products.is_resource_exhausted());
        assert!(store.get("resource_error_timestamp").is_none());

        cart.check_connection();
        assert!(!cart.is_resource_exhausted());
        assert!(!cart.should_use_fallback());

        clock.advance(Duration::from_secs(3_600));
        cart.check_connection();
        assert!(!cart.is_resource_exhausted());
        assert!(store.get("cart_resource_error_timestamp").is_none());
    }

    #[test]
    fn staggered_exhaustion_keeps_later_domain_latched() {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let network = SimulatedNetwork::online();
        let domain = |name: &str| {
            ConnectionHealthTracker::new(
                name,
                HealthConfig::default(),
                Arc::new(network.clone()),
                Arc::new(store.clone()),
                clock.clone(),
            )
        };
        let cart = domain("cart");
        let products = domain("products");

        let exhausted = crate::error::ApiError::resource("ERR_INSUFFICIENT_RESOURCES");
        products.mark_failure(&exhausted);
        clock.advance(Duration::from_secs(300));
        cart.mark_failure(&exhausted);

        clock.advance(Duration::from_secs(301));
        products.check_connection();
        cart.check_connection();
        assert!(!products.is_resource_exhausted());
        assert!(cart.is_resource_exhausted());

        clock.advance(Duration::from_secs(300));
        cart.check_connection();
        assert!(!cart.is_resource_exhausted());
    }

    #[test]
    fn restored_exhaustion_keeps_detection_time() {
        let store = MemoryStore::new();
        store.set("cart_resource_error", "true".into());
        store.set("cart_resource_error_timestamp", "1000".into());

        let clock = Arc::new(ManualClock::new(2_000));
        let tracker = tracker(&SimulatedNetwork::online(), &store, &clock);
        assert_eq!(tracker.snapshot().resource_exhausted_at, Some(1_000));

        clock.advance(Duration::from_secs(601));
        tracker.check_connection();
        assert!(!tracker.is_resource_exhausted());
    }

    #[test]
    fn manual_disable_does_not_expire() {
        let store = MemoryStore::new();
        let clock = Arc::new(ManualClock::new(0));
        let tracker = tracker(&SimulatedNetwork::online(), &store, &clock);

        tracker.disable_api_calls();
        clock.advance(Duration::from_secs(3_600));
        tracker.check_connection();
        assert!(tracker.is_resource_exhausted());
        assert!(tracker.should_use_fallback());
    }
}
