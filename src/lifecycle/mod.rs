//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → transport → discovery backend → registry seed → balancer + proxy
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → stop accepting → drain in-flight requests
//!     → stop health checker (grace period) → shut down discovery
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{bootstrap, Gateway, StartupError};
