//! Active connection monitoring.
//!
//! # Responsibilities
//! - Re-sample the platform on a fixed interval
//! - React to platform `online` / `offline` / change events immediately
//! - Stop, and drop the event subscription, on shutdown

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time;

use crate::health::platform::PlatformEvent;
use crate::health::tracker::ConnectionHealthTracker;

pub struct HealthMonitor {
    tracker: Arc<ConnectionHealthTracker>,
    interval: Duration,
}

impl HealthMonitor {
    /// Monitor polling at the tracker's configured interval.
    pub fn new(tracker: Arc<ConnectionHealthTracker>) -> Self {
        let interval = tracker.config().poll_interval();
        Self { tracker, interval }
    }

    pub fn with_interval(tracker: Arc<ConnectionHealthTracker>, interval: Duration) -> Self {
        Self { tracker, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let domain = self.tracker.domain().to_string();
        let mut events = self.tracker.probe().subscribe();

        tracing::info!(
            domain = %domain,
            interval_secs = self.interval.as_secs(),
            platform_events = events.is_some(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tracker.check_connection();
                }
                event = next_event(&mut events) => {
                    match event {
                        Ok(event) => {
                            tracing::debug!(domain = %domain, ?event, "Platform connectivity event");
                            self.tracker.check_connection();
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(domain = %domain, skipped, "Platform events lagged");
                            self.tracker.check_connection();
                        }
                        Err(RecvError::Closed) => {
                            tracing::debug!(domain = %domain, "Platform event source closed, polling only");
                            events = None;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(domain = %domain, "Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<PlatformEvent>>,
) -> Result<PlatformEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
