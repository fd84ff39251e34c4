//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Tracker, executor, queue, gate produce:
//!     → logging.rs (structured events carrying a `domain` field)
//!     → metrics.rs (counters and gauges labelled by domain)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
