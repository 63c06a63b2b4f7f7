//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Initialize subsystems in dependency order
//! - Seed the registry before the first request arrives
//!
//! # Design Decisions
//! - Fail fast: a discovery backend that cannot initialize aborts startup
//! - One connection pool; the proxy's view is bounded by `max_connections`,
//!   the health checker and Consul backend use the unbounded control-plane view

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::discovery::{self, DiscoveryBackend, DiscoveryError};
use crate::health::HealthChecker;
use crate::load_balancer;
use crate::proxy::{ForwardingProxy, HttpTransport, Transport};
use crate::registry::ServiceRegistry;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("discovery initialization failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Every long-lived component, wired together.
pub struct Gateway {
    pub config: GatewayConfig,
    pub transport: Arc<HttpTransport>,
    pub registry: Arc<ServiceRegistry>,
    pub discovery: Arc<dyn DiscoveryBackend>,
    pub proxy: ForwardingProxy,
    pub health_checker: HealthChecker,
}

/// Build the gateway from a configuration.
pub async fn bootstrap(config: GatewayConfig) -> Result<Gateway, StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;

    let transport = Arc::new(HttpTransport::new(&config.upstream));
    let shared: Arc<dyn Transport> = transport.clone();
    let control: Arc<dyn Transport> = Arc::new(transport.control_plane());

    let discovery = discovery::initialize(&config.discovery, control.clone()).await?;
    let registry = Arc::new(ServiceRegistry::new());

    let health_checker = HealthChecker::new(
        registry.clone(),
        discovery.clone(),
        control,
        config.health_check.clone(),
    );
    health_checker.refresh().await;

    let services = registry.service_names();
    tracing::info!(
        backend = %discovery.kind(),
        services = services.len(),
        instances = registry.all_instances().len(),
        "Registry seeded"
    );

    let balancer = load_balancer::from_policy(config.upstream.load_balancing);
    tracing::debug!(policy = ?config.upstream.load_balancing, "Load balancer ready");

    let proxy = ForwardingProxy::new(
        registry.clone(),
        discovery.clone(),
        balancer,
        shared,
        Duration::from_secs(config.upstream.timeout_secs),
    );

    Ok(Gateway {
        config,
        transport,
        registry,
        discovery,
        proxy,
        health_checker,
    })
}
