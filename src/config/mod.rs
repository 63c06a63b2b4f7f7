//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → sections handed to each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BackoffKind, BalancingPolicy, ConsulConfig, DiscoveryConfig, DiscoveryKind, GatewayConfig,
    HealthCheckConfig, ListenerConfig, LogFormat, ObservabilityConfig, RedisConfig, RetryConfig,
    ShutdownConfig, StaticServiceConfig, UpstreamConfig,
};
