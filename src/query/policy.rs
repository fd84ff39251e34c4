//! Per-call read policy.

use std::time::Duration;

use crate::config::QueryConfig;
use crate::resilience::RetryPolicy;

/// What a read does when the gate is closed and no fallback exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfflineBehavior {
    /// Serve substitute data; surface the failure only if there is none.
    #[default]
    Fallback,
    /// Fail with the underlying error or `NetworkUnavailable`.
    Error,
    /// Return an empty result tagged offline.
    Silent,
}

#[derive(Debug, Clone)]
pub struct QueryPolicy<T> {
    pub offline_behavior: OfflineBehavior,
    /// Static substitute served after the cache.
    pub mock: Option<T>,
    /// Last-resort default value.
    pub default_value: Option<T>,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    /// Attempt a live call while gated when no fallback data exists.
    pub allow_degraded_attempt: bool,
    /// Cached entries younger than this satisfy a read without fetching.
    pub stale_time: Duration,
}

impl<T> QueryPolicy<T> {
    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            offline_behavior: OfflineBehavior::Fallback,
            mock: None,
            default_value: None,
            retry: RetryPolicy::from_config(config),
            timeout: config.timeout(),
            allow_degraded_attempt: false,
            stale_time: config.stale_time(),
        }
    }

    pub fn offline_behavior(mut self, behavior: OfflineBehavior) -> Self {
        self.offline_behavior = behavior;
        self
    }

    pub fn with_mock(mut self, mock: T) -> Self {
        self.mock = Some(mock);
        self
    }

    pub fn with_default(mut self, default_value: T) -> Self {
        self.default_value = Some(default_value);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn allow_degraded_attempt(mut self) -> Self {
        self.allow_degraded_attempt = true;
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }
}

impl<T> Default for QueryPolicy<T> {
    fn default() -> Self {
        Self::from_config(&QueryConfig::default())
    }
}
