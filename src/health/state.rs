//! Connection health record.
//!
//! # Fields
//! - Volatile: reachability, quality and raw bandwidth hints, recomputed by
//!   every `check_connection`
//! - Persisted: failure counter, last failure time, exhaustion flag
//!
//! # Quality mapping
//! ```text
//! offline                     → Offline
//! slow-2g | 2g                → Poor
//! 3g                          → Fair
//! 4g                          → Good
//! anything else / no hint     → Unknown
//! ```

use serde::Serialize;

/// Coarse connection quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Offline,
    Poor,
    Fair,
    Good,
    Unknown,
}

impl ConnectionQuality {
    /// Derive quality from reachability and the platform's effective-type hint.
    pub fn classify(online: bool, effective_type: Option<&str>) -> Self {
        if !online {
            return ConnectionQuality::Offline;
        }
        match effective_type {
            Some("slow-2g") | Some("2g") => ConnectionQuality::Poor,
            Some("3g") => ConnectionQuality::Fair,
            Some("4g") => ConnectionQuality::Good,
            _ => ConnectionQuality::Unknown,
        }
    }

    pub fn is_slow(self) -> bool {
        matches!(self, ConnectionQuality::Poor | ConnectionQuality::Fair)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionQuality::Offline => "offline",
            ConnectionQuality::Poor => "poor",
            ConnectionQuality::Fair => "fair",
            ConnectionQuality::Good => "good",
            ConnectionQuality::Unknown => "unknown",
        }
    }
}

/// Everything the tracker believes about one domain's connectivity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionHealth {
    pub domain: String,

    pub is_online: bool,
    pub connection_quality: ConnectionQuality,
    pub connection_type: Option<String>,
    pub effective_type: Option<String>,
    pub downlink_mbps: Option<f64>,
    pub rtt_ms: Option<u32>,
    pub save_data: Option<bool>,

    pub consecutive_failures: u32,
    /// Epoch-ms.
    pub last_failure_at: Option<u64>,
    pub resource_exhausted: bool,
    /// Epoch-ms at which exhaustion was detected. `None` while not exhausted
    /// or when calls were disabled by hand, which never expires.
    pub resource_exhausted_at: Option<u64>,

    /// Epoch-ms of the last platform sample.
    pub last_checked: u64,
    pub last_online: Option<u64>,
    pub last_offline: Option<u64>,
}

impl ConnectionHealth {
    pub fn is_slow_connection(&self) -> bool {
        self.connection_quality.is_slow()
    }

    /// True while the failure short-circuit is active.
    pub fn is_degraded(&self, now_millis: u64, threshold: u32, window_millis: u64) -> bool {
        match self.last_failure_at {
            Some(at) => {
                self.consecutive_failures >= threshold && now_millis.saturating_sub(at) < window_millis
            }
            None => false,
        }
    }
}
