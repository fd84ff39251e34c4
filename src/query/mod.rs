//! Resilient reads.
//!
//! # Data Flow
//! ```text
//! execute(key, params, fetch, policy)
//!     → tracker.check_connection()
//!     → gate closed?  fallback.rs (cache → mock → default → none)
//!     → fresh cache entry?  serve it without fetching
//!     → live fetch under timeout, retried for network/server failures
//!     → success: mark_success, write cache
//!     → failure: mark_failure, absorb into fallback unless behavior = error
//! ```

pub mod executor;
pub mod fallback;
pub mod policy;

pub use executor::QueryExecutor;
pub use fallback::{Fallback, FallbackResolver, FallbackSources};
pub use policy::{OfflineBehavior, QueryPolicy};
