//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Live call to a collaborator:
//!     → timeouts.rs (enforce per-call deadline, cancel on expiry)
//!     → On failure: retries.rs (check kind and budget)
//!     → jittered exponential delay before the next attempt
//! ```
//!
//! # Design Decisions
//! - Every collaborator call has a deadline
//! - Only reads are retried inline; writes fail or get queued
//! - Retry decisions match on `ErrorKind`, never on messages

pub mod retries;
pub mod timeouts;

pub use retries::RetryPolicy;
pub use timeouts::with_timeout;
