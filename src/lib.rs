//! Service-mesh API gateway library.
//!
//! Routes `/{service}/{path...}` to a healthy instance of `service`, found
//! through a pluggable discovery backend (static mapping, Consul catalog or
//! Redis hashes) and kept fresh by a periodic health checker.

pub mod config;
pub mod discovery;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod proxy;
pub mod registry;
pub mod resilience;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::{bootstrap, Gateway, Shutdown};
