//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (active.rs):
//!     → full discovery refresh (fetch_services ∪ registry names)
//!     → registry sync (prunes vanished instances; failed lookups leave the bucket alone)
//!     → probe every instance concurrently: GET http://host:port{health_check_path}
//!     → 200 = healthy, anything else or no answer = unhealthy
//! ```
//!
//! # Design Decisions
//! - Unhealthy instances are never removed by probing, only by discovery
//! - A failing cycle is logged and backed off; the loop never exits on its own
//! - Stopped through an explicit handle at shutdown

pub mod active;

pub use active::{HealthCheckHandle, HealthChecker};
