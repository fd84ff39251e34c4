//! Network-aware data access.
//!
//! Reads and writes against remote resources that keep working through
//! connectivity loss, degraded bandwidth and transient resource exhaustion.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──▶ QueryExecutor ──┬──▶ fetch (HttpResource or any closure)
//!          │                   └──▶ FallbackResolver (cache → mock → default)
//!          │
//!          └─▶ MutationQueue ──┬──▶ submit
//!                              └──▶ outbox (StateStore) ──▶ replay on reconnect
//!
//!   both consult ConnectionHealthTracker (one per domain)
//!        ▲ check_connection ◀── HealthMonitor (poll + platform events)
//!        ▲ mark_success / mark_failure ◀── every live call outcome
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod mutation;
pub mod observability;
pub mod query;
pub mod resilience;
pub mod storage;

pub use cache::{CacheStore, MemoryCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::NetawareConfig;
pub use envelope::{DataSource, Envelope, MutationOutcome, QueryResult};
pub use error::{ApiError, Error, ErrorKind, Result};
pub use health::{ConnectionHealthTracker, SimplifiedApiGate};
pub use lifecycle::{Shutdown, Supervisor};
pub use mutation::{MutationPolicy, MutationQueue, OfflineMode};
pub use query::{OfflineBehavior, QueryExecutor, QueryPolicy};
pub use storage::StateStore;
