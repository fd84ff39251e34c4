//! Simplified API gate.
//!
//! A stateless permission check for call sites that need no fallback and no
//! queueing: calls are allowed while the platform reports reachability and
//! the manual toggle is on. Outcome reports only feed auxiliary metadata.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::clock::{Clock, SystemClock};
use crate::error::{ApiError, Error, ErrorKind};
use crate::health::platform::ConnectivityProbe;
use crate::health::state::ConnectionQuality;

/// Informational data; never consulted by `should_use_api`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateMetadata {
    pub quality: Option<ConnectionQuality>,
    pub last_success_at: Option<u64>,
    pub recent_failures: u32,
    pub last_error_kind: Option<ErrorKind>,
}

pub struct SimplifiedApiGate {
    domain: String,
    probe: Arc<dyn ConnectivityProbe>,
    clock: Arc<dyn Clock>,
    enabled: AtomicBool,
    metadata: ArcSwap<GateMetadata>,
}

impl SimplifiedApiGate {
    pub fn new(domain: impl Into<String>, probe: Arc<dyn ConnectivityProbe>) -> Self {
        Self::with_clock(domain, probe, Arc::new(SystemClock))
    }

    pub fn with_clock(
        domain: impl Into<String>,
        probe: Arc<dyn ConnectivityProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            domain: domain.into(),
            probe,
            clock,
            enabled: AtomicBool::new(true),
            metadata: ArcSwap::from_pointee(GateMetadata::default()),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// `online && api_calls_enabled`.
    pub fn should_use_api(&self) -> bool {
        let online = self.probe.sample().reachable.unwrap_or(true);
        online && self.enabled.load(Ordering::SeqCst)
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        tracing::info!(domain = %self.domain, "API gate enabled");
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        tracing::info!(domain = %self.domain, "API gate disabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn metadata(&self) -> GateMetadata {
        GateMetadata::clone(&self.metadata.load())
    }

    pub fn mark_success(&self) {
        let now = self.clock.now_millis();
        let quality = self.sample_quality();
        self.metadata.rcu(|current| {
            let mut next = GateMetadata::clone(current);
            next.quality = Some(quality);
            next.last_success_at = Some(now);
            next.recent_failures = 0;
            next.last_error_kind = None;
            next
        });
    }

    pub fn mark_failure(&self, error: &ApiError) {
        let quality = self.sample_quality();
        self.metadata.rcu(|current| {
            let mut next = GateMetadata::clone(current);
            next.quality = Some(quality);
            next.recent_failures = next.recent_failures.saturating_add(1);
            next.last_error_kind = Some(error.kind);
            next
        });
        tracing::warn!(domain = %self.domain, kind = %error.kind, error = %error, "Gated call failed");
    }

    /// Fail with `NetworkUnavailable` when calls are not permitted.
    pub fn guard(&self) -> Result<(), Error> {
        if self.should_use_api() {
            Ok(())
        } else {
            Err(Error::network_unavailable(
                &self.domain,
                "this action cannot be performed while offline",
            ))
        }
    }

    /// Run `call` if permitted, recording its outcome.
    pub async fn call<T, Fut>(&self, call: Fut) -> Result<T, Error>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.guard()?;
        match call.await {
            Ok(value) => {
                self.mark_success();
                Ok(value)
            }
            Err(err) => {
                self.mark_failure(&err);
                Err(err.into())
            }
        }
    }

    fn sample_quality(&self) -> ConnectionQuality {
        let sample = self.probe.sample();
        ConnectionQuality::classify(
            sample.reachable.unwrap_or(true),
            sample.effective_type.as_deref(),
        )
    }
}
