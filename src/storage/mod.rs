//! Durable key-value state store.
//!
//! # Data Flow
//! ```text
//! ConnectionHealthTracker
//!     → {domain}_failure_count / {domain}_last_attempt
//!     → {domain}_resource_error / {domain}_resource_error_timestamp
//!     → has_resource_error / resource_error_timestamp (app-wide mirror)
//!
//! MutationQueue
//!     → offline_mutations_{domain}_{method} (JSON outbox)
//! ```
//!
//! # Design Decisions
//! - Stores are injected, one handle shared by every domain
//! - Writes are best-effort: a failed write is logged, never surfaced
//! - Values are plain strings so the layout stays inspectable

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A string key-value store that survives restarts (or pretends to, in tests).
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// Persisted key names.
pub mod keys {
    /// App-wide exhaustion flag.
    pub const GLOBAL_RESOURCE_ERROR: &str = "has_resource_error";
    /// Epoch-ms at which exhaustion was last detected in any domain.
    pub const GLOBAL_RESOURCE_ERROR_TIMESTAMP: &str = "resource_error_timestamp";

    pub fn failure_count(domain: &str) -> String {
        format!("{domain}_failure_count")
    }

    pub fn last_attempt(domain: &str) -> String {
        format!("{domain}_last_attempt")
    }

    pub fn resource_error(domain: &str) -> String {
        format!("{domain}_resource_error")
    }

    /// Epoch-ms at which this domain's exhaustion was detected.
    pub fn resource_error_timestamp(domain: &str) -> String {
        format!("{domain}_resource_error_timestamp")
    }

    pub fn offline_mutations(domain: &str, method: &str) -> String {
        format!("offline_mutations_{domain}_{method}")
    }
}
