//! HTTP collaborator.
//!
//! # Data Flow
//! ```text
//! QueryExecutor / MutationQueue
//!     → fetch or submit closure
//!     → client.rs (join path onto base URL, send, decode envelope)
//!     → failures classified into ApiError at this boundary
//! ```

pub mod client;

pub use client::HttpResource;
