//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID + trace layers)
//!     → /health, /health/ready, /health/live   → status.rs
//!     → /services, /services/{service}/...     → services.rs
//!     → /{service}/{path...}                   → proxy (optionally with retries)
//!     → response streamed back to the client
//! ```

pub mod request;
pub mod server;
pub mod services;
pub mod status;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
