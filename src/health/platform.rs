//! Platform connectivity signals.
//!
//! # Responsibilities
//! - Sample reachability and bandwidth hints on demand
//! - Publish `online` / `offline` / connection-change events
//!
//! Absent hints are `None`; absent reachability is treated as reachable.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

/// A point-in-time reading of the platform's connectivity signals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformSnapshot {
    /// `None` when the platform exposes no reachability signal.
    pub reachable: Option<bool>,
    pub connection_type: Option<String>,
    /// `slow-2g`, `2g`, `3g` or `4g` where available.
    pub effective_type: Option<String>,
    pub downlink_mbps: Option<f64>,
    pub rtt_ms: Option<u32>,
    pub save_data: Option<bool>,
}

impl PlatformSnapshot {
    pub fn online() -> Self {
        Self {
            reachable: Some(true),
            ..Self::default()
        }
    }

    pub fn offline() -> Self {
        Self {
            reachable: Some(false),
            ..Self::default()
        }
    }

    pub fn with_effective_type(mut self, effective_type: impl Into<String>) -> Self {
        self.effective_type = Some(effective_type.into());
        self
    }
}

/// Connectivity change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformEvent {
    Online,
    Offline,
    /// Bandwidth or connection type changed.
    ConnectionChanged,
}

/// Source of platform connectivity signals.
pub trait ConnectivityProbe: Send + Sync {
    /// Read the current signals. Must not fail.
    fn sample(&self) -> PlatformSnapshot;

    /// Subscribe to change events, when the platform offers them.
    fn subscribe(&self) -> Option<broadcast::Receiver<PlatformEvent>> {
        None
    }
}

/// In-process connectivity source driven by explicit calls.
///
/// Used by tests and by hosts that learn about connectivity from elsewhere
/// (an OS hook, a sidecar) and forward it here.
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    snapshot: Arc<Mutex<PlatformSnapshot>>,
    events: broadcast::Sender<PlatformEvent>,
}

impl SimulatedNetwork {
    pub fn new(initial: PlatformSnapshot) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            snapshot: Arc::new(Mutex::new(initial)),
            events,
        }
    }

    pub fn online() -> Self {
        Self::new(PlatformSnapshot::online())
    }

    pub fn offline() -> Self {
        Self::new(PlatformSnapshot::offline())
    }

    pub fn go_online(&self) {
        self.update(|s| s.reachable = Some(true));
        let _ = self.events.send(PlatformEvent::Online);
    }

    pub fn go_offline(&self) {
        self.update(|s| s.reachable = Some(false));
        let _ = self.events.send(PlatformEvent::Offline);
    }

    /// Change bandwidth hints without touching reachability.
    pub fn set_effective_type(&self, effective_type: Option<&str>) {
        self.update(|s| s.effective_type = effective_type.map(str::to_string));
        let _ = self.events.send(PlatformEvent::ConnectionChanged);
    }

    fn update(&self, f: impl FnOnce(&mut PlatformSnapshot)) {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut snapshot);
    }
}

impl Default for SimulatedNetwork {
    fn default() -> Self {
        Self::online()
    }
}

impl ConnectivityProbe for SimulatedNetwork {
    fn sample(&self) -> PlatformSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<PlatformEvent>> {
        Some(self.events.subscribe())
    }
}
