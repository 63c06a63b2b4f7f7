//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     DiscoveryConfig.backend (static | consul | redis)
//!     → initialize() builds exactly one backend
//!     → Arc<dyn DiscoveryBackend> handed to proxy and health checker
//!
//! Per lookup:
//!     fetch_instances(service)
//!         → static mapping / Consul catalog / Redis hash
//!         → Ok(Vec<ServiceInstance>) (fresh, healthy by default)
//!         → Err(DiscoveryError) on any failure
//!     list_instances(service)
//!         → fetch_instances, with the error logged and degraded to empty
//! ```
//!
//! # Design Decisions
//! - Backend chosen once; no backend-specific code outside this module
//! - Registry writers use `fetch_*` so a failed query never reads as "no instances"
//! - Initialization failure is fatal at startup

pub mod consul;
pub mod redis_hash;
pub mod static_backend;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DiscoveryConfig, DiscoveryKind};
use crate::observability::metrics;
use crate::proxy::transport::Transport;
use crate::registry::ServiceInstance;

pub use self::consul::ConsulDiscovery;
pub use self::redis_hash::RedisDiscovery;
pub use self::static_backend::StaticDiscovery;

/// Errors raised inside discovery backends.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid discovery configuration: {0}")]
    Config(String),

    #[error("discovery backend unreachable: {0}")]
    Connection(String),

    #[error("discovery query failed: {0}")]
    Query(String),

    #[error("malformed discovery response: {0}")]
    Decode(String),
}

/// A source of truth for service instances.
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    fn kind(&self) -> DiscoveryKind;

    /// Fresh lookup of a service's instances.
    async fn fetch_instances(&self, service: &str) -> Result<Vec<ServiceInstance>, DiscoveryError>;

    /// Names of the services this backend knows about.
    async fn fetch_services(&self) -> Result<Vec<String>, DiscoveryError>;

    /// Fresh lookup of a service's instances. Empty on failure.
    async fn list_instances(&self, service: &str) -> Vec<ServiceInstance> {
        match self.fetch_instances(service).await {
            Ok(instances) => instances,
            Err(e) => {
                report_failure(self.kind(), Some(service), &e);
                Vec::new()
            }
        }
    }

    /// Names of the services this backend knows about. Empty on failure.
    async fn list_services(&self) -> Vec<String> {
        match self.fetch_services().await {
            Ok(names) => names,
            Err(e) => {
                report_failure(self.kind(), None, &e);
                Vec::new()
            }
        }
    }

    /// Release backend resources.
    async fn shutdown(&self);
}

/// Build and connect the configured backend.
pub async fn initialize(
    config: &DiscoveryConfig,
    transport: Arc<dyn Transport>,
) -> Result<Arc<dyn DiscoveryBackend>, DiscoveryError> {
    tracing::info!(backend = %config.backend, "Initializing service discovery");

    let backend: Arc<dyn DiscoveryBackend> = match config.backend {
        DiscoveryKind::Static => Arc::new(StaticDiscovery::new(&config.services)),
        DiscoveryKind::Consul => Arc::new(ConsulDiscovery::new(&config.consul, transport)?),
        DiscoveryKind::Redis => Arc::new(RedisDiscovery::connect(&config.redis).await?),
    };

    tracing::info!(backend = %config.backend, "Service discovery initialized");
    Ok(backend)
}

/// Log a failed backend query and count it.
pub fn report_failure(kind: DiscoveryKind, service: Option<&str>, error: &DiscoveryError) {
    match service {
        Some(service) => {
            tracing::error!(backend = %kind, service = %service, error = %error, "Failed to get service instances")
        }
        None => tracing::error!(backend = %kind, error = %error, "Failed to list services"),
    }
    metrics::record_discovery_failure(kind.as_str());
}
