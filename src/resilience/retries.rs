//! Retry policy for read operations.
//!
//! Reads retry only `network` and `server` failures, only while the domain
//! still looks reachable, and only within the configured attempt budget.

use std::time::Duration;

use rand::Rng;

use crate::config::QueryConfig;
use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(
            config.retries,
            config.retry_base_delay_ms,
            config.retry_max_delay_ms,
        )
    }

    /// Whether a failure after `failures` failed attempts earns another try.
    pub fn should_retry(&self, kind: ErrorKind, failures: u32, reachable: bool) -> bool {
        reachable && kind.is_retryable() && failures <= self.max_retries
    }

    /// Wait before the retry following `failures` failed attempts.
    pub fn delay_for(&self, failures: u32) -> Duration {
        backoff(failures, self.base_delay_ms, self.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&QueryConfig::default())
    }
}

/// `base * 2^(attempt - 1)`, capped at `max`, plus up to 10% jitter.
/// Attempt 0 never waits.
fn backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let capped = base_ms
        .saturating_mul(1u64 << (attempt - 1).min(32))
        .min(max_ms);
    let jitter = match capped / 10 {
        0 => 0,
        range => rand::thread_rng().gen_range(0..range),
    };
    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_transient_kinds_within_budget() {
        let policy = RetryPolicy::new(3, 10, 100);
        assert!(policy.should_retry(ErrorKind::Network, 1, true));
        assert!(policy.should_retry(ErrorKind::Server, 3, true));
        assert!(!policy.should_retry(ErrorKind::Server, 4, true));
    }

    #[test]
    fn never_retries_terminal_kinds() {
        let policy = RetryPolicy::new(3, 10, 100);
        for kind in [
            ErrorKind::Validation,
            ErrorKind::Auth,
            ErrorKind::NotFound,
            ErrorKind::Resource,
            ErrorKind::Offline,
        ] {
            assert!(!policy.should_retry(kind, 1, true), "{kind} must not retry");
        }
    }

    #[test]
    fn does_not_retry_while_unreachable() {
        let policy = RetryPolicy::new(3, 10, 100);
        assert!(!policy.should_retry(ErrorKind::Network, 1, false));
    }

    #[test]
    fn zero_budget_never_retries() {
        assert!(!RetryPolicy::none().should_retry(ErrorKind::Network, 1, true));
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::new(5, 1_000, 30_000);
        assert_eq!(policy.delay_for(0), Duration::ZERO);

        let first = policy.delay_for(1);
        assert!(first >= Duration::from_millis(1_000) && first < Duration::from_millis(1_100));
        let third = policy.delay_for(3);
        assert!(third >= Duration::from_millis(4_000) && third < Duration::from_millis(4_400));

        let capped = policy.delay_for(40);
        assert!(capped >= Duration::from_millis(30_000) && capped < Duration::from_millis(33_000));
    }

    #[test]
    fn zero_base_never_waits() {
        assert_eq!(RetryPolicy::new(3, 0, 0).delay_for(2), Duration::ZERO);
    }
}
