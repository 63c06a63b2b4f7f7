//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy, health checker, discovery backends produce:
//!     → logging.rs (structured tracing events, json or pretty)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (log aggregation)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID (`x-request-id`) is attached to the request span by the HTTP layer
//! - Metrics are recorded through the `metrics` facade; the exporter is optional

pub mod logging;
pub mod metrics;
