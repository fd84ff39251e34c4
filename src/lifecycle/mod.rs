//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor (supervisor.rs):
//!     spawn health monitors, replay and refetch listeners
//!     → each task holds a shutdown receiver
//!
//! Shutdown (shutdown.rs):
//!     trigger → every task leaves its select! loop → joined with a deadline
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → supervisor shutdown
//! ```
//!
//! # Design Decisions
//! - Background tasks never outlive the supervisor that spawned them
//! - Shutdown has a deadline: stragglers are aborted

pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use supervisor::Supervisor;
