//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Idempotent request with retries enabled:
//!     → retries.rs (replay the whole proxy call on BadGateway)
//!     → backoff.rs (fixed delay, or exponential with jitter)
//! ```
//!
//! # Design Decisions
//! - Disabled by default; the proxy itself makes exactly one attempt
//! - Timeouts live in the transport, not here

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
