//! Resilient writes with an offline outbox.
//!
//! # Data Flow
//! ```text
//! execute(input, policy)
//!     → tracker.check_connection()
//!     → resource exhausted?  fail fast, outbox untouched
//!     → gated?  error | enqueue (outbox.rs persists) | optimistic live attempt
//!     → live submit: mark_success + cache invalidation, or mark_failure
//!
//! online transition
//!     → replay_pending(): FIFO pass over a snapshot of the outbox
//!     → failure: requeue with retries + 1, abandon past the cap
//! ```

pub mod outbox;
pub mod policy;
pub mod queue;

pub use outbox::QueuedMutation;
pub use policy::{MutationPolicy, OfflineMode};
pub use queue::{MutationQueue, QueueEvent, ReplayReport};
