//! Connection health subsystem.
//!
//! # Data Flow
//! ```text
//! Active monitoring (active.rs):
//!     Periodic timer / platform event
//!     → tracker.check_connection()
//!     → volatile fields refreshed, online flag published
//!
//! Passive tracking (passive.rs):
//!     Live call outcome reported
//!     → failure counter / exhaustion latch updated and persisted
//!
//! Gate (tracker.rs):
//!     should_use_fallback = offline
//!                         || resource_exhausted
//!                         || (failures >= 3 && last failure < 30s ago)
//! ```
//!
//! # Design Decisions
//! - One tracker per domain; domains never share counters
//! - The health record is swapped atomically, last write wins
//! - `gate.rs` is a separate, simpler gate that keeps no failure state

pub mod active;
pub mod gate;
pub mod passive;
pub mod platform;
pub mod state;
pub mod tracker;

pub use active::HealthMonitor;
pub use gate::{GateMetadata, SimplifiedApiGate};
pub use platform::{ConnectivityProbe, PlatformEvent, PlatformSnapshot, SimulatedNetwork};
pub use state::{ConnectionHealth, ConnectionQuality};
pub use tracker::ConnectionHealthTracker;
