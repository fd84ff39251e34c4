//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the data-access layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct NetawareConfig {
    /// Connection health tracking.
    pub health: HealthConfig,

    /// Read-path defaults.
    pub query: QueryConfig,

    /// Write-path defaults.
    pub mutation: MutationConfig,

    /// Durable state location.
    pub storage: StorageConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Connection health configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Platform poll interval in seconds.
    pub poll_interval_secs: u64,

    /// Consecutive failures that short-circuit to fallback.
    pub failure_threshold: u32,

    /// How long, in seconds, the failure short-circuit stays active after
    /// the last failure.
    pub failure_window_secs: u64,

    /// Seconds after which a resource-exhaustion flag clears itself.
    pub resource_reset_secs: u64,
}

impl HealthConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn failure_window(&self) -> Duration {
        Duration::from_secs(self.failure_window_secs)
    }

    pub fn resource_reset(&self) -> Duration {
        Duration::from_secs(self.resource_reset_secs)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            failure_threshold: 3,
            failure_window_secs: 30,
            resource_reset_secs: 600,
        }
    }
}

/// Read-path configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Retry attempts for retryable failures.
    pub retries: u32,

    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,

    /// Cached entries younger than this are served without fetching.
    pub stale_time_secs: u64,

    /// Cached entries older than this are evicted.
    pub gc_time_secs: u64,

    /// Base delay for exponential backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl QueryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }

    pub fn gc_time(&self) -> Duration {
        Duration::from_secs(self.gc_time_secs)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            timeout_ms: 30_000,
            stale_time_secs: 5 * 60,
            gc_time_secs: 30 * 60,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
        }
    }
}

/// Write-path configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Failed replays tolerated before a queued mutation is abandoned.
    pub max_replay_retries: u32,

    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl MutationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            max_replay_retries: 3,
            timeout_ms: 30_000,
        }
    }
}

/// Durable state configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding persisted state. In-memory only when absent.
    pub path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
