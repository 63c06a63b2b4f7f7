//! Instance registry subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery backend result (Vec<ServiceInstance>)
//!     → store.rs sync (merge, keep health, prune)
//!     → per-service snapshot (Arc<Vec<Arc<ServiceInstance>>>)
//!     → readers: proxy (selection), health endpoints
//!     → writer of health flags: health checker only
//! ```

pub mod instance;
pub mod store;

pub use instance::{unix_now, HealthStatus, ServiceInstance};
pub use store::{InstanceHealth, InstanceList, ServiceHealthSummary, ServiceRegistry};
