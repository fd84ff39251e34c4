//! Per-call write policy.

use std::time::Duration;

use crate::config::MutationConfig;

/// What a write does while the health gate is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OfflineMode {
    /// Store in the outbox and acknowledge as pending.
    #[default]
    Queue,
    /// Fail with `NetworkUnavailable`.
    Error,
    /// Attempt the live call anyway.
    Optimistic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationPolicy {
    pub offline_mode: OfflineMode,
    /// Cache key prefixes marked stale after a successful write.
    pub invalidate: Vec<String>,
    pub timeout: Duration,
}

impl MutationPolicy {
    pub fn from_config(config: &MutationConfig) -> Self {
        Self {
            offline_mode: OfflineMode::Queue,
            invalidate: Vec::new(),
            timeout: config.timeout(),
        }
    }

    pub fn offline_mode(mut self, mode: OfflineMode) -> Self {
        self.offline_mode = mode;
        self
    }

    pub fn invalidates(mut self, prefix: impl Into<String>) -> Self {
        self.invalidate.push(prefix.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for MutationPolicy {
    fn default() -> Self {
        Self::from_config(&MutationConfig::default())
    }
}
